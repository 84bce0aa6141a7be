// src/tag.rs
use std::ops::{Deref, DerefMut};

use crate::error::TagError;
use crate::ndef::NdefMessage;

/// A tag present in the field for one discovery event.
pub trait TagHandle {
    /// Raw technology names as reported by the platform.
    fn tech_list(&self) -> Vec<String>;

    /// NDEF view, if the tag is already NDEF formatted.
    fn ndef(&mut self) -> Option<&mut dyn NdefTech>;

    /// Formatting view, if the tag is blank but can take NDEF.
    fn ndef_formatable(&mut self) -> Option<&mut dyn NdefFormatableTech>;
}

/// I/O session on one technology of a tag.
pub trait TagTechnology {
    fn connect(&mut self) -> Result<(), TagError>;

    /// Must be safe to call when not connected.
    fn close(&mut self);

    fn is_connected(&self) -> bool;
}

pub trait NdefTech: TagTechnology {
    fn is_writable(&self) -> bool;

    /// Largest NDEF message in bytes the tag can hold.
    fn max_size(&self) -> usize;

    fn write_ndef_message(&mut self, message: &NdefMessage) -> Result<(), TagError>;

    /// Permanently write-protects the tag. Returns `false` if the tag
    /// cannot be locked.
    fn make_read_only(&mut self) -> Result<bool, TagError>;
}

pub trait NdefFormatableTech: TagTechnology {
    /// Formats the tag and writes `message` as its first content.
    fn format(&mut self, message: &NdefMessage) -> Result<(), TagError>;
}

/// A connected technology, closed again when dropped.
pub struct Connection<'a, T: TagTechnology + ?Sized> {
    tech: &'a mut T,
}

impl<'a, T: TagTechnology + ?Sized> Connection<'a, T> {
    pub fn open(tech: &'a mut T) -> Result<Self, TagError> {
        if let Err(err) = tech.connect() {
            // a half-open session still has to be released
            tech.close();
            return Err(err);
        }
        Ok(Self { tech })
    }
}

impl<T: TagTechnology + ?Sized> Deref for Connection<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.tech
    }
}

impl<T: TagTechnology + ?Sized> DerefMut for Connection<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.tech
    }
}

impl<T: TagTechnology + ?Sized> Drop for Connection<'_, T> {
    fn drop(&mut self) {
        self.tech.close();
    }
}
