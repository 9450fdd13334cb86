//! Classify and cache `metadata.domain_type` for jobs created without it.
//!
//! Existing values are never overwritten.
//!
//! ```bash
//! cargo run --bin backfill_domain_types -- --dry-run
//! cargo run --bin backfill_domain_types -- --batch-size 1000
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use outreach_core::domains::outreach::activities::backfill::backfill_domain_types;
use outreach_core::domains::outreach::PostgresStore;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "backfill_domain_types")]
#[command(about = "Fill in the cached email domain type on historic jobs")]
struct Cli {
    /// Jobs classified per round trip
    #[arg(long, default_value_t = 500)]
    batch_size: i64,

    /// Classify one batch and report, without writing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,outreach_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let _ = dotenvy::dotenv();
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .context("Failed to connect to database")?;
    let store = PostgresStore::new(pool);

    let report = backfill_domain_types(cli.batch_size.max(1), cli.dry_run, &store).await?;

    println!(
        "{} {} jobs",
        if cli.dry_run { "Would update" } else { "Updated" },
        report.scanned
    );
    for (domain_type, count) in &report.by_type {
        println!("  {:<10} {}", domain_type, count);
    }

    Ok(())
}
