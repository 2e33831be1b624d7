//! Periodic self-ping so idle-suspending hosts keep the process awake.
//! Failures are logged and otherwise ignored.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Single GET against `url`, returning the HTTP status.
pub async fn ping(client: &reqwest::Client, url: &str) -> Result<reqwest::StatusCode, reqwest::Error> {
    let resp = client.get(url).send().await?;
    Ok(resp.status())
}

/// Spawns the ping loop. The first tick is skipped since the server only just started.
pub fn spawn(url: String, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let client = match reqwest::Client::builder().timeout(PING_TIMEOUT).build() {
            Ok(c) => c,
            Err(e) => {
                warn!("keepalive disabled, http client unavailable: {e}");
                return;
            }
        };
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match ping(&client, &url).await {
                Ok(status) => info!(%status, "keepalive response"),
                Err(e) => warn!("keepalive error: {e}"),
            }
        }
    })
}
