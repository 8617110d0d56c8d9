use std::future::Future;
use std::time::Duration;

use keybridge_core::DeviceError;
use tokio::time::Instant;

/// Run `fut` until `deadline`; expiry becomes [`DeviceError::Timeout`].
pub async fn within<T, E, F>(deadline: Instant, budget: Duration, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<DeviceError>,
{
    tokio::time::timeout_at(deadline, fut)
        .await
        .unwrap_or_else(|_| Err(DeviceError::Timeout(budget).into()))
}
