// src/apdu.rs
use crate::error::TagError;

/// Anything that can exchange pseudo-APDUs with a contactless card.
pub trait CardTransport {
    /// Sends `apdu` and returns the full response, status word included.
    fn transmit(&self, apdu: &[u8]) -> Result<Vec<u8>, TagError>;

    /// Answer-to-reset as reported by the reader.
    fn atr(&self) -> Result<Vec<u8>, TagError>;
}

impl<C: CardTransport + ?Sized> CardTransport for &C {
    fn transmit(&self, apdu: &[u8]) -> Result<Vec<u8>, TagError> {
        (**self).transmit(apdu)
    }

    fn atr(&self) -> Result<Vec<u8>, TagError> {
        (**self).atr()
    }
}

#[cfg(feature = "pcsc")]
impl CardTransport for pcsc::Card {
    fn transmit(&self, apdu: &[u8]) -> Result<Vec<u8>, TagError> {
        let mut recv_buffer = [0u8; pcsc::MAX_BUFFER_SIZE];
        pcsc::Card::transmit(self, apdu, &mut recv_buffer)
            .map(|resp| resp.to_vec())
            .map_err(pcsc_error)
    }

    fn atr(&self) -> Result<Vec<u8>, TagError> {
        let mut names_buf = [0u8; 128];
        let mut atr_buf = [0u8; pcsc::MAX_ATR_SIZE];
        let status = self
            .status2(&mut names_buf, &mut atr_buf)
            .map_err(pcsc_error)?;
        Ok(status.atr().to_vec())
    }
}

#[cfg(feature = "pcsc")]
fn pcsc_error(err: pcsc::Error) -> TagError {
    match err {
        pcsc::Error::RemovedCard | pcsc::Error::ResetCard | pcsc::Error::NoSmartcard => {
            TagError::TagLost
        }
        other => TagError::Io(other.to_string()),
    }
}

fn is_success(resp: &[u8]) -> bool {
    // 0x90 0x00 is Success
    resp.len() >= 2 && resp[resp.len() - 2] == 0x90 && resp[resp.len() - 1] == 0x00
}

fn status_word(resp: &[u8]) -> String {
    match resp {
        [.., sw1, sw2] => format!("{:02X}{:02X}", sw1, sw2),
        _ => "none".into(),
    }
}

/// GET DATA for the UID: FF CA 00 00 00
pub fn get_uid<C: CardTransport + ?Sized>(card: &C) -> Result<Vec<u8>, TagError> {
    let resp = card.transmit(&[0xFF, 0xCA, 0x00, 0x00, 0x00])?;
    if is_success(&resp) {
        Ok(resp[..resp.len() - 2].to_vec())
    } else {
        Err(TagError::Protocol(format!("get uid failed: sw={}", status_word(&resp))))
    }
}

pub fn read_binary<C: CardTransport + ?Sized>(
    card: &C,
    block: u8,
    length: u8,
) -> Result<Vec<u8>, TagError> {
    // Read: FF B0 00 Block Len
    let apdu = [0xFF, 0xB0, 0x00, block, length];
    let resp = card.transmit(&apdu)?;

    if !is_success(&resp) {
        return Err(TagError::Protocol(format!(
            "read of block {} failed: sw={}",
            block,
            status_word(&resp)
        )));
    }

    // Return data without status word
    let data = &resp[..resp.len() - 2];
    if data.len() < length as usize {
        return Err(TagError::Protocol(format!(
            "short read of block {}: {} of {} bytes",
            block,
            data.len(),
            length
        )));
    }
    Ok(data.to_vec())
}

pub fn update_binary<C: CardTransport + ?Sized>(
    card: &C,
    block: u8,
    data: &[u8],
) -> Result<(), TagError> {
    // Write: FF D6 00 Block Len [Data]
    let mut apdu = vec![0xFF, 0xD6, 0x00, block, data.len() as u8];
    apdu.extend_from_slice(data);

    let resp = card.transmit(&apdu)?;
    if is_success(&resp) {
        Ok(())
    } else {
        Err(TagError::Io(format!(
            "write of block {} failed: sw={}",
            block,
            status_word(&resp)
        )))
    }
}
