//! Partitions tweet statuses across several collections.
//!
//! Usage:
//!   cargo run --example partitioning -- [config.toml] [statuses-dir]
//!
//! Without a config file the defaults are used: an in-memory store with two
//! collections. Without a statuses directory a few sample statuses are
//! generated and imported from a temporary directory.

use std::path::PathBuf;
use std::sync::Arc;

use docstore_partition::client::{DocumentClient, RedbDocumentClient, ThrottledClient};
use docstore_partition::import::import_directory;
use docstore_partition::models::user_partition_key;
use docstore_partition::{telemetry, Config, PartitionKey, PartitionedSession, RetryExecutor};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    telemetry::init(&config.log.level);

    let inner = Arc::new(match &config.store.path {
        Some(path) => RedbDocumentClient::open(path)?,
        None => RedbDocumentClient::in_memory()?,
    });

    let statuses_dir = args.next().map(PathBuf::from);
    match config.throttle_config()? {
        Some(throttle) => {
            let client = Arc::new(ThrottledClient::new(inner, throttle));
            run(client, &config, statuses_dir).await
        }
        None => run(inner, &config, statuses_dir).await,
    }
}

async fn run<C: DocumentClient + 'static>(
    client: Arc<C>,
    config: &Config,
    statuses_dir: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let executor = RetryExecutor::new(config.retry_policy());
    let mut session = PartitionedSession::new(client, executor);

    let scope = session
        .register_hash_scope(
            &config.partitioning.database_id,
            &config.partitioning.collection_ids,
            &config.partition_config()?,
            user_partition_key(),
        )
        .await?;

    // Keep the temporary directory alive until the import is done.
    let sample = tempfile::tempdir()?;
    let dir = match statuses_dir {
        Some(dir) => dir,
        None => {
            write_sample_statuses(sample.path())?;
            sample.path().to_path_buf()
        }
    };

    let report = import_directory(&session, &scope, &dir).await?;
    println!(
        "imported {} statuses, {} failed",
        report.imported,
        report.failed.len()
    );

    for size in session.collection_sizes(&scope).await? {
        println!("{}: {} documents", size.id, size.documents);
    }

    let user = PartitionKey::Int(1);
    let feed = session.read_feed(&scope, Some(&user), 10).await?;
    println!("collection holding user 1 returned {} documents", feed.len());

    Ok(())
}

fn write_sample_statuses(dir: &std::path::Path) -> std::io::Result<()> {
    for i in 0..20i64 {
        let status = serde_json::json!({
            "status_id": 1_000 + i,
            "text": format!("sample status {i} #partitioning"),
            "user": {
                "user_id": i % 5,
                "name": format!("User {}", i % 5),
                "screen_name": format!("user{}", i % 5)
            },
            "created_at": 1_420_070_400 + i,
            "retweet_count": i * 3,
            "entities": {"hashtags": [{"text": "partitioning", "indices": [0, 13]}]}
        });
        std::fs::write(dir.join(format!("{i:03}.json")), status.to_string())?;
    }
    Ok(())
}
