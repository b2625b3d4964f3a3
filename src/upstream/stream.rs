//! Streaming an upstream response to the caller while it is still arriving.
//!
//! The client side holds a [`ResponseSink`]; the HTTP handler holds the
//! matching [`PendingResponse`]. The head (status, content type) is sent once
//! before any body bytes. Dropping the sink before the head is sent tells the
//! handler the call failed. An abort travels on its own channel so it is
//! seen even when the body buffer is full.

use axum::body::{Body, Bytes};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::stream;
use std::io;
use tokio::sync::{mpsc, oneshot};

/// Chunks buffered between the upstream reader and the caller.
const STREAM_BUFFER_CHUNKS: usize = 16;

/// Status line and content type of a streamed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub content_type: Option<String>,
}

/// How a call delivers its response body.
#[derive(Debug)]
pub enum Delivery {
    /// Read the whole body for inspection only.
    Buffer,
    /// Copy the body to the caller as it arrives, inspecting JSON on the side.
    Stream(ResponseSink),
}

/// Writer half handed to the upstream client.
#[derive(Debug)]
pub struct ResponseSink {
    head: Option<oneshot::Sender<ResponseHead>>,
    body: mpsc::Sender<io::Result<Bytes>>,
    abort: Option<oneshot::Sender<io::Error>>,
    caller_gone: bool,
}

/// Reader half kept by the HTTP handler.
#[derive(Debug)]
pub struct PendingResponse {
    head: oneshot::Receiver<ResponseHead>,
    body: BodyReader,
}

#[derive(Debug)]
struct BodyReader {
    chunks: mpsc::Receiver<io::Result<Bytes>>,
    abort: Option<oneshot::Receiver<io::Error>>,
    failed: bool,
}

impl BodyReader {
    /// Next item for the caller. A fired abort wins over queued chunks, and
    /// the end of the chunk stream waits for the abort handle to settle.
    async fn next(mut self) -> Option<(io::Result<Bytes>, Self)> {
        if self.failed {
            return None;
        }
        let Some(mut abort) = self.abort.take() else {
            return self.chunks.recv().await.map(|chunk| (chunk, self));
        };

        let chunk = tokio::select! {
            biased;
            fired = &mut abort => match fired {
                Ok(error) => return Some((Err(error), self.finished())),
                // Handle dropped without aborting.
                Err(_) => return self.chunks.recv().await.map(|chunk| (chunk, self)),
            },
            chunk = self.chunks.recv() => chunk,
        };

        match chunk {
            Some(chunk) => {
                self.abort = Some(abort);
                Some((chunk, self))
            }
            None => match abort.await {
                Ok(error) => Some((Err(error), self.finished())),
                Err(_) => None,
            },
        }
    }

    fn finished(mut self) -> Self {
        self.chunks.close();
        self.abort = None;
        self.failed = true;
        self
    }
}

/// Create a connected sink / pending response pair.
pub fn response_channel() -> (ResponseSink, PendingResponse) {
    let (head_tx, head_rx) = oneshot::channel();
    let (body_tx, body_rx) = mpsc::channel(STREAM_BUFFER_CHUNKS);
    let (abort_tx, abort_rx) = oneshot::channel();
    (
        ResponseSink {
            head: Some(head_tx),
            body: body_tx,
            abort: Some(abort_tx),
            caller_gone: false,
        },
        PendingResponse {
            head: head_rx,
            body: BodyReader {
                chunks: body_rx,
                abort: Some(abort_rx),
                failed: false,
            },
        },
    )
}

impl ResponseSink {
    /// Send the status line. Later calls are ignored.
    pub fn send_head(&mut self, head: ResponseHead) {
        if let Some(tx) = self.head.take() {
            if tx.send(head).is_err() {
                self.caller_gone = true;
            }
        }
    }

    /// Forward one chunk. Returns false once the caller has gone away.
    pub async fn send_chunk(&mut self, chunk: Bytes) -> bool {
        if self.caller_gone {
            return false;
        }
        if self.body.send(Ok(chunk)).await.is_err() {
            self.caller_gone = true;
        }
        !self.caller_gone
    }

    /// Handle that can abort the stream after the sink itself was dropped.
    /// Only the first call gets a live handle.
    pub fn abort_handle(&mut self) -> StreamAbort {
        StreamAbort {
            tx: self.abort.take(),
        }
    }

    pub fn caller_gone(&self) -> bool {
        self.caller_gone
    }
}

/// Terminates a partially streamed body with an error so the caller's
/// connection is closed instead of ending cleanly. Dropping it without
/// calling [`StreamAbort::abort`] lets the body finish normally.
#[derive(Debug)]
pub struct StreamAbort {
    tx: Option<oneshot::Sender<io::Error>>,
}

impl StreamAbort {
    pub fn abort(self, reason: &str) {
        if let Some(tx) = self.tx {
            let _ = tx.send(io::Error::new(io::ErrorKind::TimedOut, reason.to_string()));
        }
    }
}

impl PendingResponse {
    /// Wait for the head. `None` means the call ended without one.
    pub async fn head(&mut self) -> Option<ResponseHead> {
        (&mut self.head).await.ok()
    }

    /// Build the caller's response around the streamed body.
    pub fn into_response(self, head: ResponseHead) -> Response {
        let body = stream::unfold(self.body, BodyReader::next);

        let mut response = Body::from_stream(body).into_response();
        *response.status_mut() = head.status;
        if let Some(ct) = head
            .content_type
            .and_then(|ct| header::HeaderValue::from_str(&ct).ok())
        {
            response.headers_mut().insert(header::CONTENT_TYPE, ct);
        }
        response
    }
}
