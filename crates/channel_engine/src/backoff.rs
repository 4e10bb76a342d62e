use std::future::Future;

use crawl_logging::crawl_warn;

use crate::sleeper::Sleeper;
use crate::ServiceError;

/// Runs `op` until it returns something other than a rate-limit directive.
///
/// Each `RateLimited` suspends for exactly the signaled duration and then
/// re-runs the same operation; nothing else is attempted in between.
pub(crate) async fn retry_on_flood_wait<T, F, Fut>(
    sleeper: &dyn Sleeper,
    label: &str,
    mut op: F,
) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    loop {
        match op().await {
            Err(ServiceError::RateLimited { retry_after }) => {
                crawl_warn!(
                    "Rate limited on {}, waiting {}s before retrying",
                    label,
                    retry_after.as_secs()
                );
                sleeper.sleep(retry_after).await;
            }
            other => return other,
        }
    }
}
