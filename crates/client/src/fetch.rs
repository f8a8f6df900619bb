//! One-shot HTTP reads against the training server.

use anyhow::Context;
use skylink_protocol::{ActorEntry, ServerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

pub fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("http client init failed")
}

/// `GET /config`. Never fails: any error is logged and the fallback target
/// (origin, no obstacles) is returned instead.
pub async fn fetch_server_config(http: &reqwest::Client, base: &str) -> ServerConfig {
    match try_fetch_config(http, base).await {
        Ok(cfg) => {
            info!(
                x = cfg.target_position.x,
                y = cfg.target_position.y,
                z = cfg.target_position.z,
                obstacles = cfg.obstacles.len(),
                "loaded server config"
            );
            cfg
        }
        Err(e) => {
            warn!(error = %format!("{e:#}"), "failed to fetch server config, using fallback");
            ServerConfig::fallback()
        }
    }
}

async fn try_fetch_config(http: &reqwest::Client, base: &str) -> anyhow::Result<ServerConfig> {
    let url = format!("{base}/config");
    let response = http
        .get(&url)
        .send()
        .await
        .with_context(|| format!("{url}: request error"))?
        .error_for_status()
        .with_context(|| format!("{url}: bad status"))?;
    response
        .json::<ServerConfig>()
        .await
        .with_context(|| format!("{url}: invalid payload"))
}

/// `GET /actors`.
pub async fn fetch_actors(http: &reqwest::Client, base: &str) -> anyhow::Result<Vec<ActorEntry>> {
    let url = format!("{base}/actors");
    let response = http
        .get(&url)
        .send()
        .await
        .with_context(|| format!("{url}: request error"))?
        .error_for_status()
        .with_context(|| format!("{url}: bad status"))?;
    response
        .json::<Vec<ActorEntry>>()
        .await
        .with_context(|| format!("{url}: invalid payload"))
}

type Slot = Option<Arc<ServerConfig>>;

/// Write side of the config completion signal. Publishing consumes it.
pub struct ConfigPublisher {
    tx: watch::Sender<Slot>,
}

/// Read side: any number of dependents can wait for the config.
#[derive(Clone)]
pub struct ConfigSignal {
    rx: watch::Receiver<Slot>,
}

pub fn config_signal() -> (ConfigPublisher, ConfigSignal) {
    let (tx, rx) = watch::channel(None);
    (ConfigPublisher { tx }, ConfigSignal { rx })
}

impl ConfigPublisher {
    pub fn publish(self, config: ServerConfig) {
        self.tx.send_replace(Some(Arc::new(config)));
    }
}

impl ConfigSignal {
    pub fn get(&self) -> Option<Arc<ServerConfig>> {
        self.rx.borrow().clone()
    }

    /// Resolves once the config is published; immediately if it already was.
    pub async fn wait(&mut self) -> anyhow::Result<Arc<ServerConfig>> {
        let slot = self
            .rx
            .wait_for(Option::is_some)
            .await
            .context("config publisher dropped before publishing")?;
        slot.clone()
            .context("config slot empty after wait")
    }
}
