use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Runtime settings for the capture server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Where `capture_frame` and snapshot mode write the bitmap by default.
    pub snapshot_path: PathBuf,
    /// How many times a frame pull is attempted before giving up.
    pub frame_poll_attempts: u32,
    pub frame_poll_interval_ms: u64,
    /// `tracing` filter used when `RUST_LOG` is unset. stdout and stderr carry
    /// protocol responses, so logging is off unless asked for.
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("test.bmp"),
            frame_poll_attempts: 500,
            frame_poll_interval_ms: 10,
            log_filter: "off".to_owned(),
        }
    }
}

impl ServerConfig {
    pub const ENV_SNAPSHOT_PATH: &'static str = "WGCAP_SNAPSHOT_PATH";
    pub const ENV_POLL_ATTEMPTS: &'static str = "WGCAP_POLL_ATTEMPTS";
    pub const ENV_POLL_INTERVAL_MS: &'static str = "WGCAP_POLL_INTERVAL_MS";
    pub const ENV_LOG: &'static str = "WGCAP_LOG";

    /// Defaults overridden by `WGCAP_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`ServerConfig::from_env`] with an arbitrary variable source.
    /// Unparseable values are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(path) = lookup(Self::ENV_SNAPSHOT_PATH).filter(|p| !p.is_empty()) {
            cfg.snapshot_path = PathBuf::from(path);
        }
        if let Some(attempts) = parse_var(&lookup, Self::ENV_POLL_ATTEMPTS) {
            cfg.frame_poll_attempts = attempts;
        }
        if let Some(ms) = parse_var(&lookup, Self::ENV_POLL_INTERVAL_MS) {
            cfg.frame_poll_interval_ms = ms;
        }
        if let Some(filter) = lookup(Self::ENV_LOG).filter(|f| !f.is_empty()) {
            cfg.log_filter = filter;
        }

        cfg
    }

    pub fn frame_poll_interval(&self) -> Duration {
        Duration::from_millis(self.frame_poll_interval_ms)
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring {key}={raw:?}: not a valid number");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ServerConfig;
    use std::path::PathBuf;

    #[test]
    fn environment_overrides_defaults() {
        let cfg = ServerConfig::from_lookup(|key| match key {
            "WGCAP_SNAPSHOT_PATH" => Some("C:\\caps\\shot.bmp".into()),
            "WGCAP_POLL_ATTEMPTS" => Some(" 42 ".into()),
            "WGCAP_POLL_INTERVAL_MS" => Some("soon".into()),
            _ => None,
        });

        assert_eq!(cfg.snapshot_path, PathBuf::from("C:\\caps\\shot.bmp"));
        assert_eq!(cfg.frame_poll_attempts, 42);
        assert_eq!(cfg.frame_poll_interval_ms, ServerConfig::default().frame_poll_interval_ms);
    }

    #[test]
    fn unset_or_empty_variables_keep_defaults() {
        let cfg = ServerConfig::from_lookup(|key| match key {
            "WGCAP_SNAPSHOT_PATH" | "WGCAP_LOG" => Some(String::new()),
            _ => None,
        });
        assert_eq!(cfg, ServerConfig::default());
        assert_eq!(cfg.log_filter, "off");

        let cfg = ServerConfig::from_lookup(|key| (key == "WGCAP_LOG").then(|| "wgcap=debug".to_owned()));
        assert_eq!(cfg.log_filter, "wgcap=debug");
    }
}
