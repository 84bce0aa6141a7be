// src/nfc_service.rs
use crossbeam_channel::Sender;
use log::{debug, error};

use crate::apdu::CardTransport;
use crate::cards::Type2Tag;
use crate::negotiator;
use crate::tag::TagHandle;
use crate::types::{OutgoingMessage, WriteRequest};

#[cfg(feature = "pcsc")]
use crate::config::Config;
#[cfg(feature = "pcsc")]
use crate::types::NfcCommand;
#[cfg(feature = "pcsc")]
use crossbeam_channel::Receiver;
#[cfg(feature = "pcsc")]
use log::{info, warn};
#[cfg(feature = "pcsc")]
use pcsc::{Context, PNP_NOTIFICATION, Protocols, ReaderState, Scope, ShareMode, State};
#[cfg(feature = "pcsc")]
use std::ffi::{CStr, CString};
#[cfg(feature = "pcsc")]
use std::time::Duration;

/// How far a tag in the field got.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TagVisit {
    /// Discovery failed, usually because the tag left the field.
    Unreadable,
    Unsupported,
    /// Supported, but no write was requested.
    Inspected,
    /// A write was negotiated and a `WRITE_RESULT` sent.
    Written,
}

impl TagVisit {
    /// Whether a queued write request was used up by this visit.
    pub fn consumed_request(self) -> bool {
        self == TagVisit::Written
    }
}

/// Runs discovery on `card`, reports it, then writes `request` if the tag is supported.
pub fn visit_tag<C: CardTransport>(
    card: C,
    request: Option<&WriteRequest>,
    tx: &Sender<OutgoingMessage>,
) -> TagVisit {
    let mut tag = match Type2Tag::discover(card) {
        Ok(tag) => tag,
        Err(err) => {
            error!("Failed to read tag: {}", err);
            let _ = tx.send(OutgoingMessage::CARD_STATUS {
                success: false,
                message: "Failed to read tag".into(),
            });
            return TagVisit::Unreadable;
        }
    };

    let notice = negotiator::on_tag_discovered(&tag.tech_list(), &mut tag);
    let _ = tx.send(OutgoingMessage::from(notice));

    if !notice.is_supported() {
        return TagVisit::Unsupported;
    }
    let Some(request) = request else {
        return TagVisit::Inspected;
    };

    let outcome = negotiator::write_request(&mut tag, request);
    let _ = tx.send(OutgoingMessage::from(&outcome));
    TagVisit::Written
}

#[cfg(feature = "pcsc")]
pub fn run(config: Config, tx: Sender<OutgoingMessage>, rx: Receiver<NfcCommand>) {
    info!("Starting NFC Service (Event Driven)...");

    let ctx = match Context::establish(Scope::User) {
        Ok(ctx) => ctx,
        Err(err) => {
            error!("Failed to establish context: {}", err);
            let _ = tx.send(OutgoingMessage::READER_ERROR {
                error: err.to_string(),
            });
            return;
        }
    };

    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    let mut readers_buf = [0; 2048];
    let mut reader_names: Vec<CString> = Vec::new();
    let mut pending: Option<WriteRequest> = None;

    let mut reader_states = vec![ReaderState::new(PNP_NOTIFICATION(), State::UNAWARE)];

    loop {
        // 1. Wait for State Change
        if let Err(err) = ctx.get_status_change(poll_interval, &mut reader_states) {
            if err != pcsc::Error::Timeout {
                error!("PCSC Error: {}", err);
                std::thread::sleep(Duration::from_secs(1));
                continue;
            }
        }

        // 2. CHECK FOR COMMANDS
        while let Ok(cmd) = rx.try_recv() {
            match cmd {
                NfcCommand::Write(request) => {
                    info!("Received write request for uri {:?}", request.uri);
                    if !write_to_present_tag(&ctx, &reader_names, &request, &tx) {
                        let _ = tx.send(OutgoingMessage::CARD_STATUS {
                            success: false,
                            message: "Present a tag to write".into(),
                        });
                        pending = Some(request);
                    }
                }
                NfcCommand::CheckReaderStatus => {
                    refresh_readers(&ctx, &mut readers_buf, &mut reader_names, &tx);
                }
            }
        }

        // 3. PROCESS EVENTS
        let mut readers_changed = false;

        // Check PnP (Index 0)
        if reader_states[0].event_state().intersects(State::CHANGED) {
            info!("Hardware change detected");
            readers_changed = true;
            reader_states[0].sync_current_state();
        }

        // Check Readers (Indices 1..)
        for i in 1..reader_states.len() {
            let Some(name) = reader_names.get(i - 1).cloned() else {
                continue;
            };
            let rs = &reader_states[i];

            if rs.event_state().intersects(State::CHANGED) {
                let current = rs.event_state();

                // Tag presented
                if current.intersects(State::PRESENT)
                    && !rs.current_state().intersects(State::PRESENT)
                {
                    info!("Tag presented on {:?}", name);
                    let queued = pending.is_some();
                    let request = pending
                        .take()
                        .or_else(|| config.write_on_tap.then(|| WriteRequest::from_config(&config)));
                    let visit = handle_tag(&ctx, &name, request.as_ref(), &tx);
                    // keep a queued request for the next tag unless it was written
                    if queued && !visit.is_some_and(TagVisit::consumed_request) {
                        debug!("Keeping pending write after {:?}", visit);
                        pending = request;
                    }
                }

                // Tag removed
                if current.intersects(State::EMPTY) && rs.current_state().intersects(State::PRESENT)
                {
                    info!("Tag removed from {:?}", name);
                    let _ = tx.send(OutgoingMessage::CARD_STATUS {
                        success: false,
                        message: "Tag removed!".into(),
                    });
                }

                reader_states[i].sync_current_state();
            }
        }

        // 4. REFRESH LIST
        if readers_changed {
            refresh_readers(&ctx, &mut readers_buf, &mut reader_names, &tx);
            // keep the PnP state (index 0), rebuild the rest
            reader_states.truncate(1);
            for name in &reader_names {
                reader_states.push(ReaderState::new(name.clone(), State::UNAWARE));
            }
        }
    }
}

#[cfg(feature = "pcsc")]
fn refresh_readers(
    ctx: &Context,
    readers_buf: &mut [u8],
    reader_names: &mut Vec<CString>,
    tx: &Sender<OutgoingMessage>,
) {
    match ctx.list_readers(readers_buf) {
        Ok(iter) => {
            *reader_names = iter.map(CString::from).collect();
            debug!("readers: {:?}", reader_names);
            let _ = tx.send(OutgoingMessage::READER_STATUS {
                success: !reader_names.is_empty(),
            });
        }
        Err(err) => {
            warn!("Failed to list readers: {}", err);
            reader_names.clear();
            let _ = tx.send(OutgoingMessage::READER_STATUS { success: false });
        }
    }
}

/// Connects to the tag in `reader_name` and visits it.
/// Returns None when no tag could be reached.
#[cfg(feature = "pcsc")]
fn handle_tag(
    ctx: &Context,
    reader_name: &CStr,
    request: Option<&WriteRequest>,
    tx: &Sender<OutgoingMessage>,
) -> Option<TagVisit> {
    let card = match ctx.connect(reader_name, ShareMode::Shared, Protocols::ANY) {
        Ok(card) => card,
        Err(err) => {
            debug!("No tag on {:?}: {}", reader_name, err);
            return None;
        }
    };

    let _ = tx.send(OutgoingMessage::CARD_STATUS {
        success: true,
        message: "Tag detected!".into(),
    });

    Some(visit_tag(card, request, tx))
}

#[cfg(feature = "pcsc")]
fn write_to_present_tag(
    ctx: &Context,
    reader_names: &[CString],
    request: &WriteRequest,
    tx: &Sender<OutgoingMessage>,
) -> bool {
    if reader_names.is_empty() {
        let _ = tx.send(OutgoingMessage::READER_ERROR {
            error: "No reader connected".into(),
        });
        return false;
    }

    reader_names.iter().any(|name| {
        handle_tag(ctx, name, Some(request), tx).is_some_and(TagVisit::consumed_request)
    })
}
