//! Shared Redis connection for the cache and rate-limit backends.

use redis::aio::ConnectionManager;
use tracing::info;

use super::error::InfraError;

/// Open a multiplexed connection that reconnects on failure. Cheap to clone.
pub async fn connect(url: &str) -> Result<ConnectionManager, InfraError> {
    let client = redis::Client::open(url)
        .map_err(|err| InfraError::cache(format!("invalid redis url: {err}")))?;
    let conn = ConnectionManager::new(client)
        .await
        .map_err(|err| InfraError::cache(format!("failed to connect to redis: {err}")))?;

    info!(target: "bloghub::infra::redis", "Connected to redis");
    Ok(conn)
}
