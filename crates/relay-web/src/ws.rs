//! The dashboard's live feed: one WebSocket per client, fed by the
//! router's and consensus engine's broadcast channels (§4.7, "dashboard
//! live stream"). Purely observational — nothing a client sends over
//! this socket is read.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Serialize;
use tracing::debug;

use relay_storage::StoreBackend;

use crate::state::DashboardState;

#[derive(Debug, Serialize)]
#[serde(tag = "stream", rename_all = "snake_case")]
enum Frame {
    Router(relay_router::RouterEvent),
    Consensus(relay_consensus::ConsensusEvent),
}

pub async fn upgrade<B: StoreBackend + Send + Sync + 'static>(
    ws: WebSocketUpgrade,
    State(state): State<DashboardState<B>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_events(socket, state))
}

async fn stream_events<B: StoreBackend + Send + Sync + 'static>(
    mut socket: WebSocket,
    state: DashboardState<B>,
) {
    let mut router_events = state.router.subscribe_events();
    let mut consensus_events = state.consensus.subscribe_events();

    loop {
        let frame = tokio::select! {
            router_event = router_events.recv() => match router_event {
                Ok(event) => Frame::Router(event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "dashboard websocket lagged on router events");
                    continue;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            consensus_event = consensus_events.recv() => match consensus_event {
                Ok(event) => Frame::Consensus(event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "dashboard websocket lagged on consensus events");
                    continue;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        };

        let Ok(text) = serde_json::to_string(&frame) else {
            continue;
        };
        if socket.send(Message::Text(text.into())).await.is_err() {
            break;
        }
    }
}
