/**
 * WEBSOCKET RELAIS - Une tâche par connexion
 *
 * RÔLE :
 * Possède la socket : lit les trames entrantes dans l'ordre d'arrivée et
 * écrit ce que le registre met dans la file de la connexion.
 *
 * FONCTIONNEMENT :
 * - Rôle fixé par le premier jeton `Sec-WebSocket-Protocol`, renvoyé au client
 * - Le push initial est en tête de file avant l'inscription au registre :
 *   aucune diffusion ne peut le doubler
 * - Cycle de vie : Open → Active → Closing → Closed
 * - Texte et binaire UTF-8 vont au routeur, le binaire illisible est abandonné
 * - Un pong remet le drapeau alive de la connexion à true
 */

use crate::http::AppState;
use crate::models::Role;
use crate::registry::{ConnectionId, Outbound};
use crate::router::Dispatch;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::header::SEC_WEBSOCKET_PROTOCOL;
use axum::http::HeaderMap;
use axum::response::Response;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use tokio::sync::mpsc;

/// Cycle de vie d'une connexion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Open,
    Active,
    Closing,
    Closed,
}

/// GET / avec upgrade
pub async fn relay_socket(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(app): State<AppState>,
) -> Response {
    let token = protocol_token(&headers);
    let role = Role::from_protocol(token.as_deref(), &app.config.observer_protocol);

    // les navigateurs refusent la poignée de main si le jeton n'est pas renvoyé
    let ws = match token {
        Some(token) => ws.protocols([token]),
        None => ws,
    };
    ws.on_upgrade(move |socket| run_connection(socket, role, app))
}

fn protocol_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SEC_WEBSOCKET_PROTOCOL)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').map(str::trim).find(|t| !t.is_empty()))
        .map(str::to_string)
}

async fn run_connection(socket: WebSocket, role: Role, app: AppState) {
    let (sink, stream) = socket.split();
    serve_connection(stream, sink, role, app).await;
}

/// Inscrit la connexion, le push initial déjà en tête de sa file
fn open_connection(app: &AppState, role: Role) -> (ConnectionId, mpsc::UnboundedReceiver<Outbound>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let _ = tx.send(Outbound::Text(app.router.greeting()));
    (app.registry.register(role, tx), rx)
}

async fn serve_connection<R, W, E>(mut inbound: R, mut sink: W, role: Role, app: AppState)
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    W: Sink<Message> + Unpin,
    E: Display,
{
    let mut phase = Phase::Open;
    let (id, mut outbound) = open_connection(&app, role);
    transition(id, &mut phase, Phase::Active);

    while phase == Phase::Active {
        tokio::select! {
            frame = inbound.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_inbound(&app, id, text.as_str()).await,
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => handle_inbound(&app, id, text).await,
                    Err(e) => log::debug!("[relay] dropped binary frame from {}: {}", id, e),
                },
                Some(Ok(Message::Pong(_))) => {
                    let _ = app.registry.mark_alive(id);
                }
                Some(Ok(Message::Ping(_))) => {}
                Some(Ok(Message::Close(_))) | None => transition(id, &mut phase, Phase::Closing),
                Some(Err(e)) => {
                    log::debug!("[relay] socket error on {}: {}", id, e);
                    transition(id, &mut phase, Phase::Closing);
                }
            },
            queued = outbound.recv() => match queued.and_then(into_message) {
                Some(message) => {
                    if sink.send(message).await.is_err() {
                        transition(id, &mut phase, Phase::Closing);
                    }
                }
                None => transition(id, &mut phase, Phase::Closing),
            },
        }
    }

    // sans effet si le superviseur de vivacité est passé avant
    let _ = app.registry.unregister(id);
    let _ = sink.send(Message::Close(None)).await;
    transition(id, &mut phase, Phase::Closed);
}

/// `None` pour une fermeture demandée par le registre
fn into_message(queued: Outbound) -> Option<Message> {
    match queued {
        Outbound::Text(text) => Some(Message::Text(text.into())),
        Outbound::Ping => Some(Message::Ping(Default::default())),
        Outbound::Close => None,
    }
}

async fn handle_inbound(app: &AppState, id: ConnectionId, text: &str) {
    let router = app.router.clone();
    let frame = text.to_owned();
    // l'append disque se fait hors des workers du runtime ; l'attente garde l'ordre des trames
    let handled = match tokio::task::spawn_blocking(move || router.handle_frame(id, &frame)).await {
        Ok(handled) => handled,
        Err(e) => {
            log::error!("[relay] frame task for {} failed: {}", id, e);
            return;
        }
    };

    match handled {
        Ok(Dispatch::Relayed { sample, persisted, delivered }) => log::debug!(
            "[relay] sample at {} from {} (stored: {}) delivered to {} peers",
            sample.timestamp,
            id,
            persisted,
            delivered
        ),
        Ok(Dispatch::History { sent }) => log::debug!("[relay] sent {} samples of history to {}", sent, id),
        Ok(Dispatch::Ignored) => {}
        Err(e) if e.is_dropped_frame() => log::debug!("[relay] dropped frame from {}: {}", id, e),
        Err(e) => log::warn!("[relay] frame from {} not handled: {}", id, e),
    }
}

fn transition(id: ConnectionId, phase: &mut Phase, next: Phase) {
    log::debug!("[relay] {} {:?} -> {:?}", id, phase, next);
    *phase = next;
}
