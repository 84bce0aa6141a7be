// src/config.rs
use std::net::SocketAddr;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::ndef;

pub const CONFIG_PATH_VAR: &str = "NFC_WRITER_CONFIG";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// URI tail written after the `http://www.` identifier code.
    pub uri: String,
    pub include_application_record: bool,
    pub application_id: String,
    /// Lock tags after writing. Irreversible.
    pub write_protect: bool,
    /// Write as soon as a tag is presented instead of waiting for a request.
    pub write_on_tap: bool,
    pub listen_addr: SocketAddr,
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            uri: "smartwhere.com/nfc.html".into(),
            include_application_record: false,
            application_id: "com.tapwise.nfcreadtag".into(),
            write_protect: false,
            write_on_tap: false,
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 3500)),
            poll_interval_ms: 500,
        }
    }
}

impl Config {
    /// Loads from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults, then the JSON file named by `NFC_WRITER_CONFIG`, then
    /// individual `NFC_WRITER_*` overrides.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_PATH_VAR) {
            Some(path) => {
                let text = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Read { path, source })?;
                serde_json::from_str(&text)?
            }
            None => Config::default(),
        };

        if let Some(uri) = lookup("NFC_WRITER_URI") {
            config.uri = uri;
        }
        if let Some(app_id) = lookup("NFC_WRITER_APP_ID") {
            config.application_id = app_id;
        }
        if let Some(value) = lookup("NFC_WRITER_AAR") {
            config.include_application_record = parse_bool("NFC_WRITER_AAR", value)?;
        }
        if let Some(value) = lookup("NFC_WRITER_WRITE_PROTECT") {
            config.write_protect = parse_bool("NFC_WRITER_WRITE_PROTECT", value)?;
        }
        if let Some(value) = lookup("NFC_WRITER_WRITE_ON_TAP") {
            config.write_on_tap = parse_bool("NFC_WRITER_WRITE_ON_TAP", value)?;
        }
        if let Some(value) = lookup("NFC_WRITER_LISTEN") {
            config.listen_addr = value.parse().map_err(|_| ConfigError::InvalidValue {
                key: "NFC_WRITER_LISTEN",
                value,
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        ndef::build_uri_message(&self.uri, false, "").map_err(|_| ConfigError::InvalidValue {
            key: "uri",
            value: self.uri.clone(),
        })?;
        Ok(())
    }
}

fn parse_bool(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue { key, value }),
    }
}
