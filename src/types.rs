// src/types.rs
#![allow(non_camel_case_types)]

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::negotiator::{DiscoveryNotice, WriteOutcome};

// Messages sent TO the WebSocket client (Frontend)
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum OutgoingMessage {
    READER_STATUS { success: bool },
    READER_ERROR { error: String },
    CARD_STATUS { success: bool, message: String },
    TAG_STATUS {
        supported: bool,
        writable: bool,
        message: String,
    },
    WRITE_RESULT { status: u8, message: String },
}

impl From<DiscoveryNotice> for OutgoingMessage {
    fn from(notice: DiscoveryNotice) -> Self {
        OutgoingMessage::TAG_STATUS {
            supported: notice.is_supported(),
            writable: notice == DiscoveryNotice::Writable,
            message: notice.message().into(),
        }
    }
}

impl From<&WriteOutcome> for OutgoingMessage {
    fn from(outcome: &WriteOutcome) -> Self {
        OutgoingMessage::WRITE_RESULT {
            status: outcome.status().code(),
            message: outcome.message().into(),
        }
    }
}

// Messages received FROM the WebSocket client
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum IncomingMessage {
    GET_READER_STATUS,
    WRITE_TAG {
        #[serde(default)]
        uri: Option<String>,
        #[serde(default)]
        write_protect: Option<bool>,
    },
}

/// Everything needed to build and write one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub uri: String,
    pub include_application_record: bool,
    pub application_id: String,
    pub write_protect: bool,
}

impl WriteRequest {
    pub fn from_config(config: &Config) -> Self {
        Self {
            uri: config.uri.clone(),
            include_application_record: config.include_application_record,
            application_id: config.application_id.clone(),
            write_protect: config.write_protect,
        }
    }

    /// Config defaults with any per-request overrides applied.
    pub fn with_overrides(config: &Config, uri: Option<String>, write_protect: Option<bool>) -> Self {
        let mut request = Self::from_config(config);
        if let Some(uri) = uri {
            request.uri = uri;
        }
        if let Some(write_protect) = write_protect {
            request.write_protect = write_protect;
        }
        request
    }
}

// Internal commands sent from WS Server -> NFC Thread
#[derive(Debug)]
pub enum NfcCommand {
    Write(WriteRequest),
    CheckReaderStatus,
}
