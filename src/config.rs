use anyhow::{anyhow, Context};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LOG_FILTER: &str = "hosteld=info";
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Opened at startup; otherwise the client sends `workspace.select`.
    pub workspace: Option<PathBuf>,
    pub log_filter: String,
    pub busy_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            workspace: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let workspace = non_empty("HOSTELD_WORKSPACE").map(PathBuf::from);
        let log_filter = non_empty("HOSTELD_LOG")
            .or_else(|| non_empty("RUST_LOG"))
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        let busy_timeout = match non_empty("HOSTELD_BUSY_TIMEOUT_MS") {
            Some(raw) => {
                let ms: u64 = raw
                    .parse()
                    .with_context(|| format!("HOSTELD_BUSY_TIMEOUT_MS must be milliseconds, got {raw:?}"))?;
                if ms == 0 {
                    return Err(anyhow!("HOSTELD_BUSY_TIMEOUT_MS must be greater than zero"));
                }
                Duration::from_millis(ms)
            }
            None => Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        };

        Ok(Config {
            workspace,
            log_filter,
            busy_timeout,
        })
    }
}
