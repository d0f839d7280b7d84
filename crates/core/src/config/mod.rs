use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{sync::RateLimits, PreviewerError, Result};

/// Browser timers take a signed 32-bit millisecond delay.
const MAX_START_DELAY_MS: u64 = i32::MAX as u64;

/// Top-level configuration structure for the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Pause between the play button being pressed and the first line
    /// starting, giving preloaded media a moment to settle.
    pub start_delay_ms: u64,
    /// Range of playback rates the media elements accept.
    pub rate_limits: RateLimits,
    /// Id of the element the web front end mounts into.
    pub canvas_id: String,
    /// Upper bound on the number of events a simulation may process.
    pub max_simulation_steps: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            start_delay_ms: 1000,
            rate_limits: RateLimits::default(),
            canvas_id: "canvas".to_string(),
            max_simulation_steps: 10_000,
        }
    }
}

impl PlayerConfig {
    /// Reads a JSON configuration file. Fields missing from the file keep
    /// their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        tracing::debug!(?path, ?config, "loaded player config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.rate_limits.validate()?;
        if self.start_delay_ms > MAX_START_DELAY_MS {
            return Err(PreviewerError::InvalidInput(format!(
                "start delay of {} ms exceeds {MAX_START_DELAY_MS} ms",
                self.start_delay_ms
            )));
        }
        Ok(())
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: PlayerConfig = serde_json::from_str(r#"{ "start_delay_ms": 250 }"#).unwrap();
        assert_eq!(config.start_delay(), Duration::from_millis(250));
        assert_eq!(config.canvas_id, "canvas");
        assert_eq!(config.rate_limits, RateLimits::default());
    }

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_from_disk() {
        let file = write_config(
            r#"{ "canvas_id": "stage", "rate_limits": { "min": 0.5, "max": 4.0 } }"#,
        );

        let config = PlayerConfig::load(file.path()).unwrap();

        assert_eq!(config.canvas_id, "stage");
        assert_eq!(config.rate_limits.max, 4.0);
        assert_eq!(config.start_delay_ms, 1000);
    }

    #[test]
    fn inverted_rate_limits_are_rejected_on_load() {
        let file = write_config(r#"{ "rate_limits": { "min": 4.0, "max": 1.0 } }"#);
        let err = PlayerConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, PreviewerError::InvalidInput(_)));
    }

    #[test]
    fn oversized_start_delay_is_rejected() {
        let config = PlayerConfig {
            start_delay_ms: u64::MAX,
            ..PlayerConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(PlayerConfig::default().validate().is_ok());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = PlayerConfig::load("/nonexistent/previewer.json").unwrap_err();
        assert!(matches!(err, PreviewerError::Io(_)));
    }
}
