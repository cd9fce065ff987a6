use crate::stream::session::{
    Action, Frame, SessionLimits, StreamSession, TransferResult,
};
use crate::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use std::collections::VecDeque;
use tracing::{debug, warn};

pub async fn stream_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let limits = SessionLimits {
        max_upload_size: state.config.stream.max_upload_size,
        api_token: state.config.app.api_token.clone(),
    };
    let mut session = StreamSession::new(limits);
    debug!("watermark stream session opened");

    while let Some(message) = socket.recv().await {
        let frame = match message {
            Ok(Message::Text(text)) => Frame::Text(text.to_string()),
            Ok(Message::Binary(data)) => Frame::Binary(data.to_vec()),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => break,
            Err(e) => {
                debug!("watermark stream read error: {}", e);
                break;
            }
        };

        let mut queue: VecDeque<Action> = match session.on_frame(frame) {
            Ok(actions) => actions.into(),
            Err(e) => {
                warn!("watermark stream rejected: {}", e);
                if e.wants_result_frame() {
                    let result = TransferResult::failure(e.to_string());
                    let _ = send_json(&mut socket, &result).await;
                }
                break;
            }
        };

        while let Some(action) = queue.pop_front() {
            match action {
                Action::Ack(ack) => {
                    if send_json(&mut socket, &ack).await.is_err() {
                        return;
                    }
                }
                Action::Result(result) => {
                    if send_json(&mut socket, &result).await.is_err() {
                        return;
                    }
                }
                Action::Output(data) => {
                    if socket.send(Message::Binary(data.into())).await.is_err() {
                        return;
                    }
                }
                Action::Process(file) => {
                    debug!(
                        "processing streamed upload {} ({} bytes)",
                        file.filename,
                        file.data.len()
                    );
                    let outcome = state
                        .pipeline
                        .process(file.data, &file.filename)
                        .await
                        .map(|rendered| rendered.data)
                        .map_err(|e| e.to_string());
                    queue.extend(session.on_result(outcome));
                }
            }
        }

        if session.is_closed() {
            break;
        }
    }

    debug!("watermark stream session closed");
}

async fn send_json<T: serde::Serialize>(
    socket: &mut WebSocket,
    value: &T,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(value).unwrap_or_default();
    socket.send(Message::Text(text.into())).await
}
