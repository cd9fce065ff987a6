use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// First message of every transfer, always JSON.
#[derive(Debug, Deserialize)]
pub struct TransferHeader {
    pub token: Option<String>,
    pub filename: String,
    pub size: u64,
    pub chunks: Option<u32>,
    #[allow(dead_code)]
    pub chunk_size: Option<u64>,
}

/// Flow-control gate: the sender waits for this before the next chunk.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ChunkAck {
    pub chunk_received: bool,
    pub index: u32,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct TransferResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_filename: Option<String>,
}

impl TransferResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            timestamp: Some(chrono::Local::now().to_rfc3339()),
            output_size: None,
            output_filename: None,
        }
    }

    fn success(original_filename: &str, output_size: u64) -> Self {
        Self {
            success: true,
            message: "image watermarked successfully".to_string(),
            timestamp: Some(chrono::Local::now().to_rfc3339()),
            output_size: Some(output_size),
            output_filename: Some(format!("watermarked_{}", original_filename)),
        }
    }
}

/// An incoming WebSocket frame, reduced to what the protocol cares about.
#[derive(Debug)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// What the driver must do next. The machine never touches the socket or the
/// pipeline itself.
#[derive(Debug)]
pub enum Action {
    Ack(ChunkAck),
    Result(TransferResult),
    Output(Vec<u8>),
    Process(PendingFile),
}

/// A fully reassembled upload, ready for the watermark pipeline.
#[derive(Debug)]
pub struct PendingFile {
    pub filename: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("declared size of {declared} bytes exceeds the {limit} byte upload limit")]
    PayloadTooLarge { declared: u64, limit: u64 },

    #[error("invalid API token")]
    Unauthorized,
}

impl SessionError {
    /// Header-stage rejections get a failure result before the close; a
    /// mid-stream protocol violation closes without one.
    pub fn wants_result_frame(&self) -> bool {
        !matches!(self, SessionError::Protocol(_))
    }
}

#[derive(Debug, Clone)]
pub struct SessionLimits {
    pub max_upload_size: u64,
    pub api_token: Option<String>,
}

enum State {
    AwaitingHeader,
    ReceivingBody(Transfer),
    Processing { filename: String },
    Closed,
}

struct Transfer {
    filename: String,
    declared_size: u64,
    multi_chunk: bool,
    chunks_received: u32,
    buffer: Vec<u8>,
}

/// Per-connection protocol state machine. One file transfer is live at a
/// time; after a result is delivered the session loops back to await the
/// next header on the same connection. Any [`SessionError`] closes the
/// machine for good.
pub struct StreamSession {
    limits: SessionLimits,
    state: State,
}

impl StreamSession {
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            limits,
            state: State::AwaitingHeader,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    pub fn on_frame(&mut self, frame: Frame) -> Result<Vec<Action>, SessionError> {
        let state = std::mem::replace(&mut self.state, State::Closed);
        match (state, frame) {
            (State::AwaitingHeader, Frame::Text(text)) => self.accept_header(&text),
            (State::AwaitingHeader, Frame::Binary(_)) => Err(SessionError::Protocol(
                "binary frame received before a transfer header".to_string(),
            )),
            (State::ReceivingBody(transfer), Frame::Binary(data)) => {
                self.accept_chunk(transfer, data)
            }
            (State::ReceivingBody(_), Frame::Text(_)) => Err(SessionError::Protocol(
                "control frame received while a transfer is in progress".to_string(),
            )),
            (State::Processing { .. }, _) => Err(SessionError::Protocol(
                "frame received while a file is being processed".to_string(),
            )),
            (State::Closed, _) => {
                Err(SessionError::Protocol("session is closed".to_string()))
            }
        }
        // On Err the replaced state stays Closed, which is exactly the
        // terminal behavior the protocol requires.
    }

    /// Feeds the pipeline outcome back in after an [`Action::Process`]. The
    /// session returns to awaiting the next header either way.
    pub fn on_result(&mut self, outcome: Result<Vec<u8>, String>) -> Vec<Action> {
        let state = std::mem::replace(&mut self.state, State::Closed);
        let State::Processing { filename } = state else {
            return Vec::new();
        };
        self.state = State::AwaitingHeader;

        match outcome {
            Ok(data) => {
                let result = TransferResult::success(&filename, data.len() as u64);
                vec![Action::Result(result), Action::Output(data)]
            }
            Err(message) => vec![Action::Result(TransferResult::failure(message))],
        }
    }

    fn accept_header(&mut self, text: &str) -> Result<Vec<Action>, SessionError> {
        let header: TransferHeader = serde_json::from_str(text)
            .map_err(|e| SessionError::Protocol(format!("malformed header: {}", e)))?;

        if let Some(expected) = &self.limits.api_token {
            if header.token.as_deref() != Some(expected.as_str()) {
                return Err(SessionError::Unauthorized);
            }
        }

        if header.size == 0 {
            return Err(SessionError::Protocol(
                "declared size must be positive".to_string(),
            ));
        }
        if header.size > self.limits.max_upload_size {
            return Err(SessionError::PayloadTooLarge {
                declared: header.size,
                limit: self.limits.max_upload_size,
            });
        }

        debug!(
            "transfer header accepted: {} ({} bytes, {} chunk(s))",
            header.filename,
            header.size,
            header.chunks.unwrap_or(1)
        );

        self.state = State::ReceivingBody(Transfer {
            filename: header.filename,
            declared_size: header.size,
            multi_chunk: header.chunks.unwrap_or(1) > 1,
            chunks_received: 0,
            buffer: Vec::with_capacity(header.size as usize),
        });
        Ok(Vec::new())
    }

    fn accept_chunk(
        &mut self,
        mut transfer: Transfer,
        data: Vec<u8>,
    ) -> Result<Vec<Action>, SessionError> {
        let new_total = transfer.buffer.len() as u64 + data.len() as u64;
        if new_total > transfer.declared_size {
            return Err(SessionError::Protocol(format!(
                "received {} bytes but the header declared {}",
                new_total, transfer.declared_size
            )));
        }

        transfer.buffer.extend_from_slice(&data);
        transfer.chunks_received += 1;

        if new_total == transfer.declared_size {
            // The declared size is the only completion signal; a chunk count
            // in the header never overrides it.
            let Transfer {
                filename, buffer, ..
            } = transfer;
            self.state = State::Processing {
                filename: filename.clone(),
            };
            return Ok(vec![Action::Process(PendingFile {
                filename,
                data: buffer,
            })]);
        }

        let actions = if transfer.multi_chunk {
            vec![Action::Ack(ChunkAck {
                chunk_received: true,
                index: transfer.chunks_received,
            })]
        } else {
            Vec::new()
        };
        self.state = State::ReceivingBody(transfer);
        Ok(actions)
    }
}
