use std::env;
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use curation_service::models::GeoPoint;
use curation_service::services::{PgAssetLookup, PgCandidateRepository, RedisPrecomputedSource};
use curation_service::{Config, CurationService};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  curation-cli curated <category|all> [<lat> <lng>] [limit]");
    eprintln!("  curation-cli featured <category|all> [limit]");
    eprintln!();
    eprintln!("Requires DATABASE_URL and REDIS_URL. Tunables use the CURATION_ prefix.");
    process::exit(1);
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        usage();
    }

    let config = Config::from_env().context("Failed to load config")?;
    let service = build_service(&config).await?;
    let category = Some(args[2].as_str());

    let output = match args[1].as_str() {
        "curated" => {
            let (geo, limit) = match args.len() {
                3 => (None, 0),
                4 => (None, parse_limit(&args[3])?),
                5 => (Some(parse_geo(&args[3], &args[4])?), 0),
                6 => (Some(parse_geo(&args[3], &args[4])?), parse_limit(&args[5])?),
                _ => usage(),
            };
            let selection = service.get_curated_selection(category, geo, limit).await?;
            info!(
                source = selection.source_tag.as_str(),
                total = selection.total_count,
                "Curated selection computed"
            );
            serde_json::to_string_pretty(&selection)?
        }
        "featured" => {
            let limit = match args.len() {
                3 => 0,
                4 => parse_limit(&args[3])?,
                _ => usage(),
            };
            let featured = service.get_featured_selection(category, limit).await?;
            serde_json::to_string_pretty(&featured)?
        }
        _ => usage(),
    };

    println!("{}", output);
    Ok(())
}

async fn build_service(config: &Config) -> Result<CurationService> {
    let Some(database_url) = config.adapters.database_url.as_deref() else {
        bail!("DATABASE_URL must be set");
    };
    let Some(redis_url) = config.adapters.redis_url.as_deref() else {
        bail!("REDIS_URL must be set");
    };

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url)
        .await
        .context("Failed to connect to Postgres")?;
    let precomputed = RedisPrecomputedSource::connect(redis_url)
        .await
        .context("Failed to connect to Redis")?;

    Ok(CurationService::new(
        config,
        Arc::new(precomputed),
        Arc::new(PgCandidateRepository::new(pool.clone())),
        Arc::new(PgAssetLookup::new(pool)),
    ))
}

fn parse_limit(raw: &str) -> Result<i64> {
    raw.parse()
        .with_context(|| format!("limit must be an integer, got {raw}"))
}

fn parse_geo(lat: &str, lng: &str) -> Result<GeoPoint> {
    let lat: f64 = lat.parse().with_context(|| format!("invalid latitude {lat}"))?;
    let lng: f64 = lng.parse().with_context(|| format!("invalid longitude {lng}"))?;
    Ok(GeoPoint::new(lat, lng))
}
