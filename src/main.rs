use crossbeam_channel::unbounded;
use log::{error, info};
use tokio::sync::broadcast;

use nfc_tag_writer::config::Config;
use nfc_tag_writer::{nfc_service, types, ws};

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            error!("Invalid configuration: {}", err);
            std::process::exit(1);
        }
    };
    info!("Starting NFC tag writer with {:?}", config);

    // Channel: WS -> NFC (Commands)
    // Crossbeam (sync) because the NFC thread blocks
    let (cmd_tx, cmd_rx) = unbounded::<types::NfcCommand>();

    // Channel: NFC -> WS (Events), broadcast to every WS client
    let (event_tx, event_rx) = broadcast::channel::<types::OutgoingMessage>(100);

    // Bridge NFC thread -> broadcast
    let (bridge_tx, bridge_rx) = unbounded::<types::OutgoingMessage>();

    let service_config = config.clone();
    std::thread::spawn(move || {
        nfc_service::run(service_config, bridge_tx, cmd_rx);
    });

    std::thread::spawn(move || {
        while let Ok(msg) = bridge_rx.recv() {
            let _ = event_tx.send(msg);
        }
    });

    ws::start_server(config, cmd_tx, event_rx).await;
}
