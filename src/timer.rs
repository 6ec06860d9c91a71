//! Suspension used for pacing and planning timeouts.

use std::time::Duration;

/// Suspends the current task for `duration`. Zero returns immediately.
pub async fn sleep(duration: Duration) {
    if duration.is_zero() {
        return;
    }
    backend_sleep(duration).await;
}

#[cfg(target_arch = "wasm32")]
async fn backend_sleep(duration: Duration) {
    let millis = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
    gloo_timers::future::TimeoutFuture::new(millis).await;
}

#[cfg(not(target_arch = "wasm32"))]
async fn backend_sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}
