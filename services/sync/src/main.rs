use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use newsroom_config::{init_tracing, AppConfig};
use newsroom_db::article::pg_repository::PgArticleRepository;
use newsroom_db::lock::pg_repository::PgLockRepository;

use newsroom_sync::source::client::{ContentClient, ContentClientConfig};
use newsroom_sync::sync::options::{options_from_env, parse_csv_account_ids};
use newsroom_sync::sync::{SyncOrchestrator, SyncSettings};

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env().expect("failed to load configuration");
    init_tracing(&config.log_level);

    tracing::info!(service = "newsroom-sync", "starting");

    let account_ids =
        parse_csv_account_ids("SYNC_ACCOUNT_IDS").unwrap_or_else(|e| panic!("{e}"));
    let options = options_from_env().unwrap_or_else(|e| panic!("{e}"));

    let Some(client_config) = ContentClientConfig::from_env() else {
        tracing::info!("no content API credentials found, skipping sync");
        return;
    };

    let pool = newsroom_db::create_pool(&config.database_url)
        .await
        .expect("failed to connect to database");

    let client = ContentClient::new(client_config).expect("failed to create content client");
    let orchestrator = Arc::new(SyncOrchestrator::new(
        PgLockRepository::new(pool.clone()),
        PgArticleRepository::new(pool),
        client,
        SyncSettings::from_config(&config),
    )
    .expect("invalid sync settings"));

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested, cancelling running syncs");
                shutdown.cancel();
            }
        });
    }

    tracing::info!(
        accounts = ?account_ids,
        scope = ?options.scope,
        item_limit = ?options.item_limit,
        "starting account syncs"
    );

    let mut runs = JoinSet::new();
    for account_id in account_ids {
        let orchestrator = Arc::clone(&orchestrator);
        let options = options.clone();
        let shutdown = shutdown.clone();
        runs.spawn(async move { orchestrator.run(&account_id, &options, &shutdown).await });
    }

    let mut failed = 0usize;
    while let Some(joined) = runs.join_next().await {
        match joined {
            Ok(result) if result.success => {
                tracing::info!(
                    account_id = %result.account_id,
                    created = result.stats.created,
                    updated = result.stats.updated,
                    skipped = result.stats.skipped,
                    failed = result.stats.failed,
                    "account sync completed"
                );
            }
            Ok(result) => {
                failed += 1;
                tracing::warn!(
                    account_id = %result.account_id,
                    outcome = ?result.outcome,
                    reason = ?result.reason,
                    message = %result.message,
                    "account sync did not complete"
                );
            }
            Err(e) => {
                failed += 1;
                tracing::error!(error = %e, "account sync task failed");
            }
        }
    }

    tracing::info!(failed_accounts = failed, "sync service finished");
}
