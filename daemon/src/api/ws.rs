// WebSocket push channel for dashboards.
//
// On connect the server sends the current agent set as an `initial_state`
// frame, then forwards every system event as it is emitted. The bus
// subscription is dropped when the socket closes; frames for a socket that
// is no longer open are discarded.

use actix_web::{web, HttpRequest, HttpResponse};
use actix_ws::Message;
use futures_util::StreamExt;
use log::{debug, trace};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;

use aegis_common::event::EventEnvelope;

use super::AppState;

pub async fn websocket(
    req: HttpRequest,
    body: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let (response, mut session, mut stream) = actix_ws::handle(&req, body)?;

    let (tx, mut rx) = mpsc::unbounded_channel::<EventEnvelope>();
    let subscription = state.events.subscribe(Arc::new(move |envelope| {
        // a closed receiver just means the socket went away
        let _ = tx.send(envelope.clone());
    }));

    let events = Arc::clone(&state.events);
    let initial = json!({
        "type": "initial_state",
        "data": { "agents": state.orchestrator.get_all_agents() },
    });

    actix_web::rt::spawn(async move {
        if session.text(initial.to_string()).await.is_err() {
            events.unsubscribe(subscription);
            return;
        }
        debug!("websocket client connected");

        loop {
            tokio::select! {
                envelope = rx.recv() => {
                    let Some(envelope) = envelope else { break };
                    let Ok(frame) = serde_json::to_string(&envelope) else { continue };
                    if session.text(frame).await.is_err() {
                        // socket is no longer open, drop the message and leave
                        break;
                    }
                }
                message = stream.next() => {
                    match message {
                        Some(Ok(Message::Ping(bytes))) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => trace!("ignoring inbound websocket frame"),
                    }
                }
            }
        }

        events.unsubscribe(subscription);
        let _ = session.close(None).await;
        debug!("websocket client disconnected");
    });

    Ok(response)
}
