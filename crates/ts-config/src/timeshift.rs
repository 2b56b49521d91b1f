use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::live::LiveConfig;
use crate::logging::LoggingConfig;
use crate::reader::ReaderConfig;
use crate::validate;

// ---------------------------------------------------------------------------
// Raw TOML structure (intermediate representation)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TimeshiftConfigRaw {
    #[serde(default)]
    reader: ReaderConfig,
    #[serde(default)]
    live: LiveConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// TimeshiftConfig (resolved, validated)
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct TimeshiftConfig {
    pub reader: ReaderConfig,
    pub live: LiveConfig,
    pub logging: LoggingConfig,
}

impl TimeshiftConfig {
    /// Read and parse a `timeshift.toml` file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.as_ref().display()))?;
        content.parse()
    }
}

impl FromStr for TimeshiftConfig {
    type Err = anyhow::Error;

    /// Parse a TOML string into a validated [`TimeshiftConfig`].
    fn from_str(toml_str: &str) -> anyhow::Result<Self> {
        let raw: TimeshiftConfigRaw = toml::from_str(toml_str)?;

        let mut reader = raw.reader;
        // Accept "ts" and ".ts" alike; the catalog compares bare extensions.
        if let Some(stripped) = reader.segment_extension.strip_prefix('.') {
            reader.segment_extension = stripped.to_string();
        }

        let config = TimeshiftConfig {
            reader,
            live: raw.live,
            logging: raw.logging,
        };

        validate::validate(&config)?;

        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
