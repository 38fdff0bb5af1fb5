use std::{sync::Arc, time::Duration};

use tokio::{
    sync::watch,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, info};

use crate::services::vote_coordinator::VoteCoordinator;

/// Run [`VoteCoordinator::reconcile`] every `period` until `shutdown` flips to `true`.
///
/// A pass that overruns its period delays the next one instead of bursting.
pub async fn run(
    coordinator: Arc<VoteCoordinator>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(period_ms = period.as_millis() as u64, "vote reconciliation started");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let report = coordinator.reconcile().await;
                debug!(checked = report.checked, "reconciliation tick");
            }
        }
    }

    info!("vote reconciliation stopped");
}
