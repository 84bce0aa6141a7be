// src/ndef.rs
use crate::error::Error;

/// URI identifier code for "http://www.", the only prefix we emit.
pub const URI_PREFIX_HTTP_WWW: u8 = 0x01;

/// Well-known record type for URIs.
pub const RTD_URI: &[u8] = b"U";

/// External type used by Android to route a tag to an application.
pub const ANDROID_APP_RECORD_TYPE: &[u8] = b"android.com:pkg";

// Record header flags
const FLAG_MB: u8 = 0x80;
const FLAG_ME: u8 = 0x40;
const FLAG_SR: u8 = 0x10;
const FLAG_IL: u8 = 0x08;

// Type 2 TLV tags
const TLV_NDEF: u8 = 0x03;
const TLV_TERMINATOR: u8 = 0xFE;

/// Type Name Format: how to interpret a record's type field.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Tnf {
    Empty,
    WellKnown,
    Mime,
    AbsoluteUri,
    External,
    Unknown,
    Unchanged,
}

impl Tnf {
    pub fn bits(self) -> u8 {
        match self {
            Tnf::Empty => 0x00,
            Tnf::WellKnown => 0x01,
            Tnf::Mime => 0x02,
            Tnf::AbsoluteUri => 0x03,
            Tnf::External => 0x04,
            Tnf::Unknown => 0x05,
            Tnf::Unchanged => 0x06,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefRecord {
    pub tnf: Tnf,
    pub record_type: Vec<u8>,
    pub id: Vec<u8>,
    pub payload: Vec<u8>,
}

impl NdefRecord {
    /// Well-known URI record with the fixed `http://www.` identifier code.
    ///
    /// The tail is stored as given; no prefix matching is done.
    pub fn uri(uri: &str) -> Result<Self, Error> {
        if !uri.is_ascii() {
            return Err(Error::UnsupportedEncoding);
        }

        let mut payload = Vec::with_capacity(uri.len() + 1);
        payload.push(URI_PREFIX_HTTP_WWW);
        payload.extend_from_slice(uri.as_bytes());

        Ok(Self {
            tnf: Tnf::WellKnown,
            record_type: RTD_URI.to_vec(),
            id: Vec::new(),
            payload,
        })
    }

    /// Android Application Record carrying a package name.
    pub fn application(application_id: &str) -> Self {
        Self {
            tnf: Tnf::External,
            record_type: ANDROID_APP_RECORD_TYPE.to_vec(),
            id: Vec::new(),
            payload: application_id.as_bytes().to_vec(),
        }
    }

    fn is_short(&self) -> bool {
        self.payload.len() < 256
    }

    /// Serialized size of this record, independent of its position.
    pub fn byte_len(&self) -> usize {
        let payload_len_field = if self.is_short() { 1 } else { 4 };
        let id_len_field = if self.id.is_empty() { 0 } else { 1 };

        1 + 1
            + payload_len_field
            + id_len_field
            + self.record_type.len()
            + self.id.len()
            + self.payload.len()
    }

    fn write_to(&self, out: &mut Vec<u8>, mb: bool, me: bool) {
        // Bit 7: MB, Bit 6: ME, Bit 5: CF(0), Bit 4: SR, Bit 3: IL, Bits 2-0: TNF
        let mut header = self.tnf.bits();
        if mb {
            header |= FLAG_MB;
        }
        if me {
            header |= FLAG_ME;
        }
        if self.is_short() {
            header |= FLAG_SR;
        }
        if !self.id.is_empty() {
            header |= FLAG_IL;
        }

        out.push(header);
        out.push(self.record_type.len() as u8);

        if self.is_short() {
            out.push(self.payload.len() as u8);
        } else {
            out.extend_from_slice(&(self.payload.len() as u32).to_be_bytes());
        }

        if !self.id.is_empty() {
            out.push(self.id.len() as u8);
        }

        out.extend_from_slice(&self.record_type);
        out.extend_from_slice(&self.id);
        out.extend_from_slice(&self.payload);
    }
}

/// An ordered, non-empty sequence of records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefMessage {
    records: Vec<NdefRecord>,
}

impl NdefMessage {
    pub fn new(first: NdefRecord) -> Self {
        Self {
            records: vec![first],
        }
    }

    pub fn push(&mut self, record: NdefRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[NdefRecord] {
        &self.records
    }

    /// Serialized size in bytes, computed without encoding.
    pub fn byte_len(&self) -> usize {
        self.records.iter().map(NdefRecord::byte_len).sum()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len());
        let last = self.records.len() - 1;
        for (i, record) in self.records.iter().enumerate() {
            record.write_to(&mut out, i == 0, i == last);
        }
        out
    }
}

/// Builds the message written to every tag: a URI record, optionally
/// followed by an application record.
pub fn build_uri_message(
    uri: &str,
    include_application_record: bool,
    application_id: &str,
) -> Result<NdefMessage, Error> {
    let mut message = NdefMessage::new(NdefRecord::uri(uri)?);
    if include_application_record {
        message.push(NdefRecord::application(application_id));
    }
    Ok(message)
}

/// Wraps an encoded message in an NDEF TLV for Type 2 tag memory.
pub fn wrap_in_tlv(ndef_bytes: &[u8]) -> Vec<u8> {
    let mut tlv = Vec::with_capacity(ndef_bytes.len() + 5);
    tlv.push(TLV_NDEF);

    if ndef_bytes.len() < 0xFF {
        tlv.push(ndef_bytes.len() as u8);
    } else {
        tlv.push(0xFF);
        tlv.extend_from_slice(&(ndef_bytes.len() as u16).to_be_bytes());
    }

    tlv.extend_from_slice(ndef_bytes);
    tlv.push(TLV_TERMINATOR);

    tlv
}

/// Largest message that fits a Type 2 data area once TLV framing is added.
pub fn tlv_capacity(data_area: usize) -> usize {
    // short form: T + L + terminator
    if data_area <= 0xFE + 3 {
        data_area.saturating_sub(3)
    } else {
        // long form: T + 0xFF + 2-byte L + terminator
        data_area.saturating_sub(5).min(0xFFFE)
    }
}
