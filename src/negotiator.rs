// src/negotiator.rs
use std::panic::{self, AssertUnwindSafe};

use log::{debug, error, info, warn};

use crate::error::{Error, TagError};
use crate::ndef::{self, NdefMessage};
use crate::tag::{Connection, NdefFormatableTech, NdefTech, TagHandle};
use crate::tech;
use crate::types::WriteRequest;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WriteStatus {
    Failure,
    Success,
}

impl WriteStatus {
    /// 0 for failure, 1 for success.
    pub fn code(self) -> u8 {
        match self {
            WriteStatus::Failure => 0,
            WriteStatus::Success => 1,
        }
    }
}

/// Result of one write attempt, ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    status: WriteStatus,
    message: String,
}

impl WriteOutcome {
    pub fn status(&self) -> WriteStatus {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_success(&self) -> bool {
        self.status == WriteStatus::Success
    }
}

impl From<Error> for WriteOutcome {
    fn from(err: Error) -> Self {
        Self {
            status: WriteStatus::Failure,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Written {
    PreFormatted,
    Formatted,
}

impl From<Written> for WriteOutcome {
    fn from(written: Written) -> Self {
        let message = match written {
            Written::PreFormatted => "Wrote message to pre-formatted tag.",
            Written::Formatted => "Formatted tag and wrote message",
        };
        Self {
            status: WriteStatus::Success,
            message: message.to_string(),
        }
    }
}

/// Writes `message` to `tag`, formatting it first if it is blank.
///
/// Always produces an outcome; nothing the tag does escapes as an error.
/// When `write_protect` is set the tag is locked after a successful write to a
/// pre-formatted tag. The lock result is logged but does not change the outcome.
pub fn negotiate_write<T: TagHandle + ?Sized>(
    tag: &mut T,
    message: &NdefMessage,
    write_protect: bool,
) -> WriteOutcome {
    let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
        match tag.ndef() {
            Some(ndef) => write_formatted(ndef, message, write_protect),
            None => match tag.ndef_formatable() {
                Some(formatable) => format_and_write(formatable, message),
                None => Err(Error::UnsupportedTag),
            },
        }
    }));

    let outcome = match attempt {
        Ok(Ok(written)) => WriteOutcome::from(written),
        Ok(Err(err)) => WriteOutcome::from(err),
        Err(_) => {
            error!("tag adapter panicked during write");
            WriteOutcome::from(Error::IoFailure)
        }
    };

    info!(
        "write finished: status={} message={:?}",
        outcome.status().code(),
        outcome.message()
    );
    outcome
}

fn write_formatted(
    ndef: &mut dyn NdefTech,
    message: &NdefMessage,
    write_protect: bool,
) -> Result<Written, Error> {
    let mut conn = Connection::open(ndef).map_err(|err| {
        warn!("ndef connect failed: {}", err);
        Error::IoFailure
    })?;

    if !conn.is_writable() {
        return Err(Error::ReadOnlyTag);
    }

    let size = message.byte_len();
    let max = conn.max_size();
    if size > max {
        return Err(Error::CapacityExceeded { max, size });
    }

    conn.write_ndef_message(message).map_err(|err| {
        warn!("ndef write failed: {}", err);
        Error::IoFailure
    })?;
    debug!("wrote {} byte message", size);

    if write_protect {
        match conn.make_read_only() {
            Ok(true) => info!("tag locked"),
            Ok(false) => warn!("tag refused to lock"),
            Err(err) => warn!("lock failed: {}", err),
        }
    }

    Ok(Written::PreFormatted)
}

fn format_and_write(
    formatable: &mut dyn NdefFormatableTech,
    message: &NdefMessage,
) -> Result<Written, Error> {
    let mut conn = Connection::open(formatable).map_err(|err| {
        warn!("connect for format failed: {}", err);
        Error::FormatFailure
    })?;
    conn.format(message).map_err(format_fault)?;
    Ok(Written::Formatted)
}

fn format_fault(err: TagError) -> Error {
    warn!("format failed: {}", err);
    if err.is_io() {
        Error::FormatFailure
    } else {
        Error::IoFailure
    }
}

/// Builds the message described by `request` and negotiates writing it.
pub fn write_request<T: TagHandle + ?Sized>(tag: &mut T, request: &WriteRequest) -> WriteOutcome {
    match ndef::build_uri_message(
        &request.uri,
        request.include_application_record,
        &request.application_id,
    ) {
        Ok(message) => negotiate_write(tag, &message, request.write_protect),
        Err(err) => {
            warn!("cannot build message for {:?}: {}", request.uri, err);
            WriteOutcome::from(err)
        }
    }
}

/// Lightweight check of whether an NDEF tag will accept a write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Writability {
    Writable,
    ReadOnly,
    NotNdef,
    ReadFailed,
}

pub fn probe_writable<T: TagHandle + ?Sized>(tag: &mut T) -> Writability {
    let Some(ndef) = tag.ndef() else {
        return Writability::NotNdef;
    };

    match Connection::open(ndef) {
        Ok(conn) if conn.is_writable() => Writability::Writable,
        Ok(_) => Writability::ReadOnly,
        Err(err) => {
            warn!("Failed to read tag: {}", err);
            Writability::ReadFailed
        }
    }
}

/// What the host tells the user about a freshly discovered tag.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DiscoveryNotice {
    Unsupported,
    Writable,
    NotWritable,
}

impl DiscoveryNotice {
    pub fn message(self) -> &'static str {
        match self {
            DiscoveryNotice::Unsupported => "This tag type is not supported",
            DiscoveryNotice::Writable => "The tag can be written",
            DiscoveryNotice::NotWritable => "This tag is not writable",
        }
    }

    pub fn is_supported(self) -> bool {
        self != DiscoveryNotice::Unsupported
    }
}

/// Classifies a discovered tag and, if supported, probes its writability.
pub fn on_tag_discovered<S, T>(tech_identifiers: &[S], tag: &mut T) -> DiscoveryNotice
where
    S: AsRef<str>,
    T: TagHandle + ?Sized,
{
    let techs = tech::parse_tech_list(tech_identifiers);
    if !tech::is_supported(&techs) {
        debug!("unsupported tag technologies: {:?}", techs);
        return DiscoveryNotice::Unsupported;
    }

    match probe_writable(tag) {
        Writability::Writable => DiscoveryNotice::Writable,
        other => {
            debug!("tag not writable: {:?}", other);
            DiscoveryNotice::NotWritable
        }
    }
}
