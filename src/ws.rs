// src/ws.rs
use crate::config::Config;
use crate::types::{IncomingMessage, NfcCommand, OutgoingMessage, WriteRequest};
use crossbeam_channel::Sender;
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::broadcast;
use warp::Filter;

pub async fn start_server(
    config: Config,
    nfc_cmd_tx: Sender<NfcCommand>,
    mut nfc_event_rx: broadcast::Receiver<OutgoingMessage>,
) {
    // Shared Broadcast Channel for WS Clients
    let (ws_tx, _) = broadcast::channel::<OutgoingMessage>(32);
    let ws_tx = Arc::new(ws_tx);

    // 1. Task to forward NFC Events -> All WS Clients
    let ws_tx_clone = ws_tx.clone();
    tokio::spawn(async move {
        while let Ok(msg) = nfc_event_rx.recv().await {
            let _ = ws_tx_clone.send(msg);
        }
    });

    // 2. WS route on the root path
    let listen_addr = config.listen_addr;
    let config = Arc::new(config);
    let ws_route = warp::path::end()
        .and(warp::ws())
        .map(move |ws: warp::ws::Ws| {
            let nfc_cmd_tx = nfc_cmd_tx.clone();
            let ws_tx = ws_tx.clone();
            let config = config.clone();

            ws.on_upgrade(move |socket| handle_connection(socket, config, nfc_cmd_tx, ws_tx))
        });

    let routes = ws_route.with(warp::cors().allow_any_origin());

    info!("WebSocket server running on ws://{}", listen_addr);
    warp::serve(routes).run(listen_addr).await;
}

async fn handle_connection(
    ws: warp::ws::WebSocket,
    config: Arc<Config>,
    nfc_cmd_tx: Sender<NfcCommand>,
    ws_tx: Arc<broadcast::Sender<OutgoingMessage>>,
) {
    let (mut client_ws_tx, mut client_ws_rx) = ws.split();
    let mut rx_broadcast = ws_tx.subscribe();

    // Spawn task to send Broadcasts -> Client
    tokio::spawn(async move {
        while let Ok(msg) = rx_broadcast.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(err) => {
                    error!("Failed to serialize {:?}: {}", msg, err);
                    continue;
                }
            };
            if client_ws_tx
                .send(warp::ws::Message::text(json))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    // Handle incoming messages from Client
    while let Some(result) = client_ws_rx.next().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(err) => {
                warn!("WebSocket error: {}", err);
                break;
            }
        };

        let Ok(text) = msg.to_str() else {
            continue;
        };

        match serde_json::from_str::<IncomingMessage>(text) {
            Ok(parsed) => {
                let _ = nfc_cmd_tx.send(to_command(&config, parsed));
            }
            Err(err) => debug!("Ignoring message {:?}: {}", text, err),
        }
    }
}

fn to_command(config: &Config, msg: IncomingMessage) -> NfcCommand {
    match msg {
        IncomingMessage::GET_READER_STATUS => NfcCommand::CheckReaderStatus,
        IncomingMessage::WRITE_TAG { uri, write_protect } => {
            NfcCommand::Write(WriteRequest::with_overrides(config, uri, write_protect))
        }
    }
}
