use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the store and the vote cache, logging whichever is unreachable.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let store_ok = match state.store().health_check().await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "store health check failed");
            false
        }
    };
    let cache_ok = match state.ledger().health_check().await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "vote cache health check failed (degraded mode)");
            false
        }
    };

    HealthResponse::from_probes(store_ok, cache_ok)
}
