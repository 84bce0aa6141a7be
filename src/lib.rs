//! Writes a URI NDEF message to Ultralight-family NFC tags.
//!
//! The pure parts (message building, capability classification and the write
//! negotiation) work against the [`tag::TagHandle`] traits. The PC/SC reader
//! loop that feeds them real tags is behind the `pcsc` feature.

pub mod apdu;
pub mod cards;
pub mod config;
pub mod error;
pub mod ndef;
pub mod negotiator;
pub mod nfc_service;
pub mod tag;
pub mod tech;
pub mod types;
pub mod ws;

pub use error::{ConfigError, Error, TagError};
pub use ndef::{NdefMessage, NdefRecord, build_uri_message};
pub use negotiator::{
    DiscoveryNotice, Writability, WriteOutcome, WriteStatus, negotiate_write, on_tag_discovered,
    probe_writable,
};
pub use tag::TagHandle;
pub use tech::{TagTech, is_supported};
