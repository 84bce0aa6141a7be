// src/tech.rs
use std::collections::HashMap;

use lazy_static::lazy_static;

/// Technology markers a discovered tag can report.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TagTech {
    NfcA,
    NfcB,
    NfcF,
    NfcV,
    IsoDep,
    MifareClassic,
    MifareUltralight,
    Ndef,
    NdefFormatable,
    NfcBarcode,
}

lazy_static! {
    static ref PLATFORM_NAMES: HashMap<&'static str, TagTech> = TagTech::ALL
        .iter()
        .map(|tech| (tech.platform_name(), *tech))
        .collect();
}

impl TagTech {
    pub const ALL: [TagTech; 10] = [
        TagTech::NfcA,
        TagTech::NfcB,
        TagTech::NfcF,
        TagTech::NfcV,
        TagTech::IsoDep,
        TagTech::MifareClassic,
        TagTech::MifareUltralight,
        TagTech::Ndef,
        TagTech::NdefFormatable,
        TagTech::NfcBarcode,
    ];

    pub fn from_platform_name(name: &str) -> Option<Self> {
        PLATFORM_NAMES.get(name).copied()
    }

    pub fn platform_name(self) -> &'static str {
        match self {
            TagTech::NfcA => "android.nfc.tech.NfcA",
            TagTech::NfcB => "android.nfc.tech.NfcB",
            TagTech::NfcF => "android.nfc.tech.NfcF",
            TagTech::NfcV => "android.nfc.tech.NfcV",
            TagTech::IsoDep => "android.nfc.tech.IsoDep",
            TagTech::MifareClassic => "android.nfc.tech.MifareClassic",
            TagTech::MifareUltralight => "android.nfc.tech.MifareUltralight",
            TagTech::Ndef => "android.nfc.tech.Ndef",
            TagTech::NdefFormatable => "android.nfc.tech.NdefFormatable",
            TagTech::NfcBarcode => "android.nfc.tech.NfcBarcode",
        }
    }
}

/// Maps raw platform names to markers, dropping names we don't know.
pub fn parse_tech_list<S: AsRef<str>>(names: &[S]) -> Vec<TagTech> {
    names
        .iter()
        .filter_map(|name| {
            let tech = TagTech::from_platform_name(name.as_ref());
            if tech.is_none() {
                log::debug!("ignoring unknown tag technology {:?}", name.as_ref());
            }
            tech
        })
        .collect()
}

/// True for Ultralight-family NFC-A tags that are NDEF formatted or formatable.
pub fn is_supported(techs: &[TagTech]) -> bool {
    let mut ultralight = false;
    let mut nfc_a = false;
    let mut ndef = false;

    for tech in techs {
        match tech {
            TagTech::MifareUltralight => ultralight = true,
            TagTech::NfcA => nfc_a = true,
            TagTech::Ndef | TagTech::NdefFormatable => ndef = true,
            _ => {}
        }
    }

    ultralight && nfc_a && ndef
}
