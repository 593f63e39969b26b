#![allow(dead_code)]

pub mod http;
pub mod log_capture;
pub mod mock_adapter;
pub mod mock_llm;
pub mod mock_notifier;

use std::future::Future;
use std::time::Duration;

/// Poll `condition` until it holds or two seconds pass
pub async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = std::time::Instant::now();
    while start.elapsed() < Duration::from_secs(2) {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Timed out waiting for condition");
}
