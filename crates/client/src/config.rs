use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use skylink_engine::SessionOptions;
use skylink_protocol::TrainingMode;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Client settings. Every field has a default so a partial YAML file works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base HTTP URL of the training server.
    pub server: String,
    pub ws_path: String,
    pub seed: u64,
    /// Start training in this mode as soon as the link is open.
    pub start: Option<TrainingMode>,
    pub reset_grace_ms: u64,
    pub http_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "http://127.0.0.1:8000".to_string(),
            ws_path: "/ws".to_string(),
            seed: 0,
            start: None,
            reset_grace_ms: 2_000,
            http_timeout_ms: 5_000,
        }
    }
}

impl ClientConfig {
    /// `<config dir>/skylink/client.yaml`, e.g. `~/.config/skylink/client.yaml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("skylink").join("client.yaml"))
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read client config: {}", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("parse client config: {}", path.display()))
    }

    /// An explicit path must exist; the default path is optional.
    pub fn load_or_default(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn base_url(&self) -> &str {
        self.server.trim_end_matches('/')
    }

    pub fn ws_url(&self) -> anyhow::Result<String> {
        let base = self.base_url();
        let rest = if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if base.starts_with("ws://") || base.starts_with("wss://") {
            base.to_string()
        } else {
            bail!("unsupported server url scheme: {}", self.server);
        };
        let path = self.ws_path.trim_start_matches('/');
        Ok(format!("{rest}/{path}"))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            seed: self.seed,
            reset_grace: Duration::from_millis(self.reset_grace_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StartMode {
    Hover,
    #[value(alias = "p2p")]
    Position,
}

impl From<StartMode> for TrainingMode {
    fn from(m: StartMode) -> Self {
        match m {
            StartMode::Hover => TrainingMode::Hover,
            StartMode::Position => TrainingMode::PositionToPosition,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "skylink-client", about = "Headless client for the drone training link")]
pub struct Cli {
    /// YAML config file (defaults to <config dir>/skylink/client.yaml if present).
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Training server base URL, e.g. http://127.0.0.1:8000
    #[arg(long)]
    pub server: Option<String>,
    #[arg(long)]
    pub ws_path: Option<String>,
    #[arg(long)]
    pub seed: Option<u64>,
    /// Start training right after connecting.
    #[arg(long, value_enum)]
    pub start: Option<StartMode>,
    #[arg(long)]
    pub grace_ms: Option<u64>,
    #[arg(long)]
    pub http_timeout_ms: Option<u64>,
    /// Log filter, same syntax as RUST_LOG.
    #[arg(long)]
    pub log: Option<String>,
}

impl Cli {
    pub fn resolve(&self) -> anyhow::Result<ClientConfig> {
        let mut cfg = ClientConfig::load_or_default(self.config.as_deref())?;
        self.apply(&mut cfg);
        Ok(cfg)
    }

    pub fn apply(&self, cfg: &mut ClientConfig) {
        if let Some(server) = &self.server {
            cfg.server = server.clone();
        }
        if let Some(path) = &self.ws_path {
            cfg.ws_path = path.clone();
        }
        if let Some(seed) = self.seed {
            cfg.seed = seed;
        }
        if let Some(start) = self.start {
            cfg.start = Some(start.into());
        }
        if let Some(ms) = self.grace_ms {
            cfg.reset_grace_ms = ms;
        }
        if let Some(ms) = self.http_timeout_ms {
            cfg.http_timeout_ms = ms;
        }
    }
}
