use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::deposit_indexer::DepositIndexer;

/// Runs the deposit indexer on a fixed interval until the returned task is aborted.
///
/// Errors are logged and the work is retried on the next tick.
pub fn spawn_deposit_indexer_task(mut deposit_indexer: DepositIndexer) -> JoinHandle<()> {
    tokio::spawn(async move {
        let run_interval = deposit_indexer.config().run_interval;

        info!("started deposit indexer task (interval: {run_interval:?})");

        loop {
            tokio::time::sleep(run_interval).await;

            debug!("running deposit indexer");

            if let Err(error) = deposit_indexer.run().await {
                error!("deposit indexer error: {error:?}");
            }
        }
    })
}
