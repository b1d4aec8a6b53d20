use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use echotrace_collector::{Collector, CollectorConfig};
use echotrace_common::{Config, JobFilters, JobStatus, Platform};
use echotrace_lake::{MergeFilters, PartitionMerger, PartitionStore};
use echotrace_store::{migrate, JobStore, PayloadStore, PostStore};
use listening_client::ListeningClient;

#[derive(Parser)]
#[command(name = "echotrace", about = "Reply collection and partition merge")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit collection jobs for awaiting posts.
    SubmitBatch {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Poll outstanding jobs and persist finished collections.
    PollBatch {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Requeue empty jobs for another attempt.
    RequeueEmpty {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        platform: Option<Platform>,
        #[arg(long)]
        campaign: Option<String>,
        #[arg(long)]
        country: Option<String>,
    },
    /// Count jobs by status and filters.
    Count {
        #[arg(long)]
        status: Option<JobStatus>,
        #[arg(long)]
        platform: Option<Platform>,
        #[arg(long)]
        campaign: Option<String>,
        #[arg(long)]
        country: Option<String>,
    },
    /// Merge raw payloads into partitioned columnar storage.
    Merge {
        #[arg(long)]
        campaign: Option<String>,
        #[arg(long)]
        platform: Option<Platform>,
        /// Process every document, relying on identity dedup alone.
        #[arg(long)]
        skip_timestamp_filter: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("echotrace=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::SubmitBatch { limit } => {
            let collector = build_collector().await?;
            let report = collector.submit_batch(limit).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::PollBatch { limit } => {
            let collector = build_collector().await?;
            let report = collector.poll_batch(limit).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::RequeueEmpty {
            limit,
            platform,
            campaign,
            country,
        } => {
            let collector = build_collector().await?;
            let filters = JobFilters {
                platform,
                campaign,
                country,
                post_id: None,
            };
            let report = collector.requeue_empty(&filters, limit).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Count {
            status,
            platform,
            campaign,
            country,
        } => {
            let collector = build_collector().await?;
            let filters = JobFilters {
                platform,
                campaign,
                country,
                post_id: None,
            };
            let count = collector.count(status, &filters).await?;
            println!("{count}");
        }
        Command::Merge {
            campaign,
            platform,
            skip_timestamp_filter,
        } => {
            let config = Config::merge_from_env();
            let payloads = PayloadStore::local(&config.payload_store_path)?;
            let partitions = PartitionStore::local(&config.lake_store_path)?;
            let merger = PartitionMerger::new(payloads, partitions);
            let filters = MergeFilters { campaign, platform };
            let report = merger.merge(&filters, skip_timestamp_filter).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

async fn build_collector() -> Result<Collector> {
    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    migrate(&pool).await?;

    let client = match &config.listening_base_url {
        Some(base) => {
            ListeningClient::with_base_url(config.listening_api_token.clone(), base.clone())
        }
        None => ListeningClient::new(config.listening_api_token.clone()),
    };

    Ok(Collector::new(
        Arc::new(client),
        Arc::new(PostStore::new(pool.clone())),
        Arc::new(JobStore::new(pool)),
        Arc::new(PayloadStore::local(&config.payload_store_path)?),
        CollectorConfig::default(),
    ))
}
