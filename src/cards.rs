// src/cards.rs
use log::{debug, info};

use crate::apdu::{self, CardTransport};
use crate::error::TagError;
use crate::ndef::{self, NdefMessage};
use crate::tag::{NdefFormatableTech, NdefTech, TagHandle, TagTechnology};
use crate::tech::TagTech;

// PC/SC registered application provider id inside contactless ATRs
const ATR_RID: [u8; 5] = [0xA0, 0x00, 0x00, 0x03, 0x06];

const STANDARD_ISO14443A_3: u8 = 0x03;

pub const CARD_NAME_MIFARE_1K: u16 = 0x0001;
pub const CARD_NAME_MIFARE_4K: u16 = 0x0002;
pub const CARD_NAME_ULTRALIGHT: u16 = 0x0003; // Ultralight / NTAG21x
pub const CARD_NAME_MIFARE_MINI: u16 = 0x0026;

const PAGE_SIZE: usize = 4;
const LOCK_PAGE: u8 = 2;
const CC_PAGE: u8 = 3;
const FIRST_DATA_PAGE: u8 = 4;

const CC_MAGIC: u8 = 0xE1;
const CC_VERSION_1_0: u8 = 0x10;
const CC_READ_ONLY: u8 = 0x0F;

/// Data area written by `format`, in units of 8 bytes (48 bytes, the
/// smallest Ultralight).
const FORMAT_SIZE_UNITS: u8 = 0x06;

/// Standard byte and card name from a PC/SC contactless ATR.
pub fn parse_atr(atr: &[u8]) -> Option<(u8, u16)> {
    let pos = atr.windows(ATR_RID.len()).position(|w| w == ATR_RID)?;
    let rest = &atr[pos + ATR_RID.len()..];
    match rest {
        [standard, hi, lo, ..] => Some((*standard, u16::from_be_bytes([*hi, *lo]))),
        _ => None,
    }
}

/// Technologies implied by the ATR alone.
pub fn techs_from_atr(atr: &[u8]) -> Vec<TagTech> {
    let mut techs = Vec::new();
    let Some((standard, card_name)) = parse_atr(atr) else {
        return techs;
    };

    if standard == STANDARD_ISO14443A_3 {
        techs.push(TagTech::NfcA);
    }
    match card_name {
        CARD_NAME_ULTRALIGHT => techs.push(TagTech::MifareUltralight),
        CARD_NAME_MIFARE_1K | CARD_NAME_MIFARE_4K | CARD_NAME_MIFARE_MINI => {
            techs.push(TagTech::MifareClassic)
        }
        _ => {}
    }
    techs
}

/// Type 2 capability container (page 3).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CapabilityContainer(pub [u8; 4]);

impl CapabilityContainer {
    pub fn is_ndef(&self) -> bool {
        self.0[0] == CC_MAGIC
    }

    pub fn is_blank(&self) -> bool {
        self.0 == [0; 4]
    }

    /// Data area size in bytes.
    pub fn data_area(&self) -> usize {
        self.0[2] as usize * 8
    }

    pub fn can_write(&self) -> bool {
        self.0[3] & 0x0F == 0x00
    }

    fn read_only(&self) -> Self {
        let mut cc = self.0;
        cc[3] = CC_READ_ONLY;
        Self(cc)
    }
}

/// An Ultralight-family tag reached through a PC/SC reader.
pub struct Type2Tag<C: CardTransport> {
    card: C,
    uid: Vec<u8>,
    techs: Vec<TagTech>,
    cc: Option<CapabilityContainer>,
    connected: bool,
}

impl<C: CardTransport> Type2Tag<C> {
    /// Reads the ATR and, for Ultralight tags, the capability container.
    pub fn discover(card: C) -> Result<Self, TagError> {
        let atr = card.atr()?;
        let mut techs = techs_from_atr(&atr);
        let uid = apdu::get_uid(&card).unwrap_or_default();

        let mut cc = None;
        if techs.contains(&TagTech::MifareUltralight) {
            let container = read_cc(&card)?;
            if container.is_ndef() {
                techs.push(TagTech::Ndef);
            } else if container.is_blank() {
                techs.push(TagTech::NdefFormatable);
            }
            cc = Some(container);
        }

        info!(
            "discovered tag uid={} atr={} techs={:?}",
            hex::encode(&uid),
            hex::encode(&atr),
            techs
        );

        Ok(Self {
            card,
            uid,
            techs,
            cc,
            connected: false,
        })
    }

    pub fn uid(&self) -> &[u8] {
        &self.uid
    }

    pub fn capability_container(&self) -> Option<CapabilityContainer> {
        self.cc
    }

    fn ensure_connected(&self) -> Result<(), TagError> {
        if self.connected {
            Ok(())
        } else {
            Err(TagError::Io("not connected".into()))
        }
    }

    fn write_pages(&self, first_page: u8, data: &[u8]) -> Result<(), TagError> {
        // Pages are 4 bytes, pad the tail with zeros
        let mut padded = data.to_vec();
        while padded.len() % PAGE_SIZE != 0 {
            padded.push(0x00);
        }

        let mut page = first_page;
        for chunk in padded.chunks(PAGE_SIZE) {
            apdu::update_binary(&self.card, page, chunk)?;
            page = page
                .checked_add(1)
                .ok_or_else(|| TagError::Protocol("page address overflow".into()))?;
        }
        Ok(())
    }

    fn write_tlv(&self, message: &NdefMessage, data_area: usize) -> Result<(), TagError> {
        let tlv = ndef::wrap_in_tlv(&message.to_bytes());
        if tlv.len() > data_area {
            return Err(TagError::Io(format!(
                "message needs {} bytes, data area is {}",
                tlv.len(),
                data_area
            )));
        }
        debug!("writing {} byte tlv", tlv.len());
        self.write_pages(FIRST_DATA_PAGE, &tlv)
    }
}

fn read_cc<C: CardTransport + ?Sized>(card: &C) -> Result<CapabilityContainer, TagError> {
    let page = apdu::read_binary(card, CC_PAGE, PAGE_SIZE as u8)?;
    let mut cc = [0u8; 4];
    cc.copy_from_slice(&page[..PAGE_SIZE]);
    Ok(CapabilityContainer(cc))
}

impl<C: CardTransport> TagHandle for Type2Tag<C> {
    fn tech_list(&self) -> Vec<String> {
        self.techs
            .iter()
            .map(|tech| tech.platform_name().to_string())
            .collect()
    }

    fn ndef(&mut self) -> Option<&mut dyn NdefTech> {
        if self.techs.contains(&TagTech::Ndef) {
            Some(self)
        } else {
            None
        }
    }

    fn ndef_formatable(&mut self) -> Option<&mut dyn NdefFormatableTech> {
        if self.techs.contains(&TagTech::NdefFormatable) {
            Some(self)
        } else {
            None
        }
    }
}

impl<C: CardTransport> TagTechnology for Type2Tag<C> {
    fn connect(&mut self) -> Result<(), TagError> {
        // the tag may have left the field since discovery
        self.cc = Some(read_cc(&self.card)?);
        self.connected = true;
        Ok(())
    }

    fn close(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

impl<C: CardTransport> NdefTech for Type2Tag<C> {
    fn is_writable(&self) -> bool {
        self.cc.is_some_and(|cc| cc.is_ndef() && cc.can_write())
    }

    fn max_size(&self) -> usize {
        self.cc
            .map(|cc| ndef::tlv_capacity(cc.data_area()))
            .unwrap_or(0)
    }

    fn write_ndef_message(&mut self, message: &NdefMessage) -> Result<(), TagError> {
        self.ensure_connected()?;
        let cc = self
            .cc
            .ok_or_else(|| TagError::Protocol("missing capability container".into()))?;
        self.write_tlv(message, cc.data_area())
    }

    fn make_read_only(&mut self) -> Result<bool, TagError> {
        self.ensure_connected()?;
        let Some(cc) = self.cc else {
            return Ok(false);
        };

        let locked = cc.read_only();
        apdu::update_binary(&self.card, CC_PAGE, &locked.0)?;

        // static lock bytes live in bytes 2 and 3 of page 2
        let mut lock_page = apdu::read_binary(&self.card, LOCK_PAGE, PAGE_SIZE as u8)?;
        lock_page.truncate(PAGE_SIZE);
        lock_page[2] = 0xFF;
        lock_page[3] = 0xFF;
        apdu::update_binary(&self.card, LOCK_PAGE, &lock_page)?;

        self.cc = Some(locked);
        Ok(true)
    }
}

impl<C: CardTransport> NdefFormatableTech for Type2Tag<C> {
    fn format(&mut self, message: &NdefMessage) -> Result<(), TagError> {
        self.ensure_connected()?;

        let cc = CapabilityContainer([CC_MAGIC, CC_VERSION_1_0, FORMAT_SIZE_UNITS, 0x00]);
        // content first: the CC is one-time programmable, so it goes last
        self.write_tlv(message, cc.data_area())?;
        apdu::update_binary(&self.card, CC_PAGE, &cc.0)?;

        self.cc = Some(cc);
        self.techs.retain(|tech| *tech != TagTech::NdefFormatable);
        self.techs.push(TagTech::Ndef);
        Ok(())
    }
}
