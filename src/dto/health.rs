use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Whether the durable store answered.
    pub store: bool,
    /// Whether the vote cache answered.
    pub cache: bool,
}

impl HealthResponse {
    /// Build the response from the probe results; any failing dependency means degraded.
    pub fn from_probes(store: bool, cache: bool) -> Self {
        let status = if store && cache { "ok" } else { "degraded" };
        Self {
            status: status.to_string(),
            store,
            cache,
        }
    }
}
