//! Write negotiation against in-memory tags.

use nfc_tag_writer::error::TagError;
use nfc_tag_writer::ndef::{NdefMessage, build_uri_message};
use nfc_tag_writer::negotiator::{
    DiscoveryNotice, Writability, WriteStatus, negotiate_write, on_tag_discovered, probe_writable,
    write_request,
};
use nfc_tag_writer::tag::{NdefFormatableTech, NdefTech, TagHandle, TagTechnology};
use nfc_tag_writer::types::WriteRequest;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Kind {
    Formatted,
    Formatable,
    Neither,
}

#[derive(Default)]
struct MockTech {
    writable: bool,
    max_size: usize,
    connect_err: Option<TagError>,
    write_err: Option<TagError>,
    lock_err: Option<TagError>,
    format_err: Option<TagError>,
    panic_on_write: bool,

    connected: bool,
    connects: u32,
    closes: u32,
    written: Option<Vec<u8>>,
    formatted: Option<Vec<u8>>,
    locked: bool,
}

impl TagTechnology for MockTech {
    fn connect(&mut self) -> Result<(), TagError> {
        self.connects += 1;
        if let Some(err) = self.connect_err.clone() {
            return Err(err);
        }
        self.connected = true;
        Ok(())
    }

    fn close(&mut self) {
        self.closes += 1;
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

impl NdefTech for MockTech {
    fn is_writable(&self) -> bool {
        self.writable
    }

    fn max_size(&self) -> usize {
        self.max_size
    }

    fn write_ndef_message(&mut self, message: &NdefMessage) -> Result<(), TagError> {
        assert!(self.connected, "write without connection");
        if self.panic_on_write {
            panic!("driver bug");
        }
        if let Some(err) = self.write_err.clone() {
            return Err(err);
        }
        self.written = Some(message.to_bytes());
        Ok(())
    }

    fn make_read_only(&mut self) -> Result<bool, TagError> {
        if let Some(err) = self.lock_err.clone() {
            return Err(err);
        }
        self.locked = true;
        Ok(true)
    }
}

impl NdefFormatableTech for MockTech {
    fn format(&mut self, message: &NdefMessage) -> Result<(), TagError> {
        assert!(self.connected, "format without connection");
        if let Some(err) = self.format_err.clone() {
            return Err(err);
        }
        self.formatted = Some(message.to_bytes());
        Ok(())
    }
}

struct MockTag {
    kind: Kind,
    techs: Vec<&'static str>,
    tech: MockTech,
}

impl MockTag {
    fn new(kind: Kind, tech: MockTech) -> Self {
        let ndef_marker = match kind {
            Kind::Formatable => "android.nfc.tech.NdefFormatable",
            _ => "android.nfc.tech.Ndef",
        };
        Self {
            kind,
            techs: vec![
                "android.nfc.tech.NfcA",
                "android.nfc.tech.MifareUltralight",
                ndef_marker,
            ],
            tech,
        }
    }

    fn formatted(writable: bool, max_size: usize) -> Self {
        Self::new(
            Kind::Formatted,
            MockTech {
                writable,
                max_size,
                ..Default::default()
            },
        )
    }
}

impl TagHandle for MockTag {
    fn tech_list(&self) -> Vec<String> {
        self.techs.iter().map(|t| t.to_string()).collect()
    }

    fn ndef(&mut self) -> Option<&mut dyn NdefTech> {
        match self.kind {
            Kind::Formatted => Some(&mut self.tech),
            _ => None,
        }
    }

    fn ndef_formatable(&mut self) -> Option<&mut dyn NdefFormatableTech> {
        match self.kind {
            Kind::Formatable => Some(&mut self.tech),
            _ => None,
        }
    }
}

fn message() -> NdefMessage {
    build_uri_message("smartwhere.com/nfc.html", false, "").unwrap()
}

/// A single URI record serializing to exactly 50 bytes.
fn fifty_byte_message() -> NdefMessage {
    let uri = format!("example.com/{}", "x".repeat(33));
    let message = build_uri_message(&uri, false, "").unwrap();
    assert_eq!(message.byte_len(), 50);
    message
}

#[test]
fn writes_pre_formatted_tag() {
    let mut tag = MockTag::formatted(true, 137);
    let msg = message();

    let outcome = negotiate_write(&mut tag, &msg, false);

    assert_eq!(outcome.status(), WriteStatus::Success);
    assert_eq!(outcome.status().code(), 1);
    assert_eq!(outcome.message(), "Wrote message to pre-formatted tag.");
    assert_eq!(tag.tech.written, Some(msg.to_bytes()));
    assert!(!tag.tech.locked);
    assert_eq!((tag.tech.connects, tag.tech.closes), (1, 1));
    assert!(!tag.tech.connected);
}

#[test]
fn message_exactly_at_capacity_fits() {
    let msg = fifty_byte_message();
    let mut tag = MockTag::formatted(true, 50);

    let outcome = negotiate_write(&mut tag, &msg, false);
    assert!(outcome.is_success());
}

#[test]
fn capacity_exceeded_reports_sizes() {
    let msg = fifty_byte_message();
    let mut tag = MockTag::formatted(true, 10);

    let outcome = negotiate_write(&mut tag, &msg, false);

    assert_eq!(outcome.status().code(), 0);
    assert_eq!(outcome.message(), "Tag capacity is 10 bytes, message is 50 bytes.");
    assert!(tag.tech.written.is_none());
    assert_eq!(tag.tech.closes, 1);
}

#[test]
fn read_only_tag_is_refused() {
    let mut tag = MockTag::formatted(false, 137);

    let outcome = negotiate_write(&mut tag, &message(), true);

    assert_eq!(outcome.status().code(), 0);
    assert_eq!(outcome.message(), "Tag is read-only");
    assert!(tag.tech.written.is_none());
    assert!(!tag.tech.locked);
    assert_eq!(tag.tech.closes, 1);
}

#[test]
fn tag_without_ndef_support() {
    let mut tag = MockTag::new(Kind::Neither, MockTech::default());

    let outcome = negotiate_write(&mut tag, &message(), false);

    assert_eq!(outcome.status().code(), 0);
    assert_eq!(outcome.message(), "Tag doesn't support NDEF.");
    assert_eq!(tag.tech.connects, 0);
}

#[test]
fn formatted_connect_failure_is_io_failure() {
    let mut tag = MockTag::new(
        Kind::Formatted,
        MockTech {
            writable: true,
            max_size: 137,
            connect_err: Some(TagError::TagLost),
            ..Default::default()
        },
    );

    let outcome = negotiate_write(&mut tag, &message(), false);

    assert_eq!(outcome.message(), "Failed to write tag");
    assert_eq!(tag.tech.closes, 1);
}

#[test]
fn write_failure_is_io_failure() {
    let mut tag = MockTag::new(
        Kind::Formatted,
        MockTech {
            writable: true,
            max_size: 137,
            write_err: Some(TagError::Io("crc".into())),
            ..Default::default()
        },
    );

    let outcome = negotiate_write(&mut tag, &message(), true);

    assert_eq!(outcome.status().code(), 0);
    assert_eq!(outcome.message(), "Failed to write tag");
    assert!(!tag.tech.locked);
    assert!(!tag.tech.connected);
}

#[test]
fn write_protect_locks_after_write() {
    let mut tag = MockTag::formatted(true, 137);

    let outcome = negotiate_write(&mut tag, &message(), true);

    assert!(outcome.is_success());
    assert!(tag.tech.locked);
}

#[test]
fn lock_failure_does_not_change_outcome() {
    let mut tag = MockTag::new(
        Kind::Formatted,
        MockTech {
            writable: true,
            max_size: 137,
            lock_err: Some(TagError::Io("nak".into())),
            ..Default::default()
        },
    );

    let outcome = negotiate_write(&mut tag, &message(), true);

    assert_eq!(outcome.status().code(), 1);
    assert_eq!(outcome.message(), "Wrote message to pre-formatted tag.");
    assert!(tag.tech.written.is_some());
}

#[test]
fn formats_blank_tag() {
    let mut tag = MockTag::new(Kind::Formatable, MockTech::default());
    let msg = message();

    let outcome = negotiate_write(&mut tag, &msg, false);

    assert_eq!(outcome.status().code(), 1);
    assert_eq!(outcome.message(), "Formatted tag and wrote message");
    assert_eq!(tag.tech.formatted, Some(msg.to_bytes()));
    assert_eq!(tag.tech.closes, 1);
}

#[test]
fn formatable_connect_failure_is_format_failure() {
    let mut tag = MockTag::new(
        Kind::Formatable,
        MockTech {
            connect_err: Some(TagError::Io("field off".into())),
            ..Default::default()
        },
    );

    let outcome = negotiate_write(&mut tag, &message(), false);

    assert_eq!(outcome.status().code(), 0);
    assert_eq!(outcome.message(), "Failed to format tag.");
    assert_eq!(tag.tech.closes, 1);
}

#[test]
fn formatable_malformed_connect_is_format_failure() {
    let mut tag = MockTag::new(
        Kind::Formatable,
        MockTech {
            connect_err: Some(TagError::Protocol("short read of block 3".into())),
            ..Default::default()
        },
    );

    let outcome = negotiate_write(&mut tag, &message(), false);

    assert_eq!(outcome.status().code(), 0);
    assert_eq!(outcome.message(), "Failed to format tag.");
    assert!(tag.tech.formatted.is_none());
}

#[test]
fn format_io_failure_is_format_failure() {
    let mut tag = MockTag::new(
        Kind::Formatable,
        MockTech {
            format_err: Some(TagError::TagLost),
            ..Default::default()
        },
    );

    let outcome = negotiate_write(&mut tag, &message(), false);
    assert_eq!(outcome.message(), "Failed to format tag.");
}

#[test]
fn malformed_format_response_falls_through_to_catch_all() {
    let mut tag = MockTag::new(
        Kind::Formatable,
        MockTech {
            format_err: Some(TagError::Protocol("bad ack".into())),
            ..Default::default()
        },
    );

    let outcome = negotiate_write(&mut tag, &message(), false);
    assert_eq!(outcome.message(), "Failed to write tag");
}

#[test]
fn adapter_panic_becomes_failure_and_releases_tag() {
    let mut tag = MockTag::new(
        Kind::Formatted,
        MockTech {
            writable: true,
            max_size: 137,
            panic_on_write: true,
            ..Default::default()
        },
    );

    let outcome = negotiate_write(&mut tag, &message(), false);

    assert_eq!(outcome.status().code(), 0);
    assert_eq!(outcome.message(), "Failed to write tag");
    assert_eq!(tag.tech.closes, 1);
    assert!(!tag.tech.connected);
}

#[test]
fn non_ascii_request_never_touches_tag() {
    let mut tag = MockTag::formatted(true, 137);
    let request = WriteRequest {
        uri: "café.fr/menu".into(),
        include_application_record: false,
        application_id: String::new(),
        write_protect: false,
    };

    let outcome = write_request(&mut tag, &request);

    assert_eq!(outcome.status().code(), 0);
    assert_eq!(outcome.message(), "URI must contain only ASCII characters");
    assert_eq!(tag.tech.connects, 0);
}

#[test]
fn request_with_application_record() {
    let mut tag = MockTag::formatted(true, 137);
    let request = WriteRequest {
        uri: "smartwhere.com/nfc.html".into(),
        include_application_record: true,
        application_id: "com.tapwise.nfcreadtag".into(),
        write_protect: false,
    };

    let outcome = write_request(&mut tag, &request);

    assert!(outcome.is_success());
    let written = tag.tech.written.unwrap();
    assert_eq!(written.len(), 68);
    assert!(written.ends_with(b"android.com:pkgcom.tapwise.nfcreadtag"));
}

#[test]
fn probe_reports_writability() {
    assert_eq!(
        probe_writable(&mut MockTag::formatted(true, 48)),
        Writability::Writable
    );
    assert_eq!(
        probe_writable(&mut MockTag::formatted(false, 48)),
        Writability::ReadOnly
    );
    assert_eq!(
        probe_writable(&mut MockTag::new(Kind::Formatable, MockTech::default())),
        Writability::NotNdef
    );

    let mut lost = MockTag::new(
        Kind::Formatted,
        MockTech {
            connect_err: Some(TagError::TagLost),
            ..Default::default()
        },
    );
    assert_eq!(probe_writable(&mut lost), Writability::ReadFailed);
    assert_eq!(lost.tech.closes, 1);
}

#[test]
fn discovery_notices() {
    let mut tag = MockTag::formatted(true, 137);
    let techs = tag.tech_list();
    assert_eq!(on_tag_discovered(&techs, &mut tag), DiscoveryNotice::Writable);
    assert!(!tag.tech.connected);

    let mut tag = MockTag::formatted(false, 137);
    let techs = tag.tech_list();
    assert_eq!(on_tag_discovered(&techs, &mut tag), DiscoveryNotice::NotWritable);

    // blank tags are supported but have no NDEF view to probe yet
    let mut tag = MockTag::new(Kind::Formatable, MockTech::default());
    let techs = tag.tech_list();
    assert_eq!(on_tag_discovered(&techs, &mut tag), DiscoveryNotice::NotWritable);
}

#[test]
fn unsupported_technologies_skip_connection() {
    let mut tag = MockTag::formatted(true, 137);
    let techs = ["android.nfc.tech.NfcA", "android.nfc.tech.MifareClassic"];

    let notice = on_tag_discovered(&techs, &mut tag);

    assert_eq!(notice, DiscoveryNotice::Unsupported);
    assert_eq!(notice.message(), "This tag type is not supported");
    assert_eq!(tag.tech.connects, 0);
}
