//! Abort a slow request from another task.

use fetchkit::{AbortController, RequestInit};
use std::time::Duration;

#[tokio::main]
async fn main() {
    let controller = AbortController::new();

    let aborter = {
        let controller = controller.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            controller.abort_with("took longer than 500ms");
        })
    };

    let result = fetchkit::fetch(
        "https://httpbin.org/delay/5",
        RequestInit::new().signal(controller.signal()),
    )
    .await;

    match result {
        Ok(resp) => println!("Finished first: {}", resp.status()),
        Err(e) if e.is_cancellation() => println!("Aborted: {e}"),
        Err(e) => println!("Failed: {e}"),
    }
    let _ = aborter.await;
}
