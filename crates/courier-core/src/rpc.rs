//! Request/response shapes passed through the call pipeline.

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::error::CallError;

/// Where a remote file lives. Resolved by the protocol layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileLocation {
    Document {
        id: i64,
        access_hash: i64,
        file_reference: Bytes,
        thumb_size: String,
    },
    PeerPhoto {
        peer_id: i64,
        photo_id: i64,
        big: bool,
    },
}

/// One bounded read of a remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRequest {
    pub location: FileLocation,
    pub offset: u64,
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    GetFile(ChunkRequest),
    /// Any other method, already encoded by the caller.
    Raw { method: &'static str, payload: Bytes },
}

impl Request {
    pub fn method(&self) -> &'static str {
        match self {
            Request::GetFile(_) => "upload.getFile",
            Request::Raw { method, .. } => method,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// File bytes. Empty means end of file.
    File(Bytes),
    /// Content lives on a CDN data center; not followed by this client.
    CdnRedirect { dc_id: i32 },
    Raw(Bytes),
}

impl Response {
    pub fn type_name(&self) -> &'static str {
        match self {
            Response::File(_) => "upload.file",
            Response::CdnRedirect { .. } => "upload.fileCdnRedirect",
            Response::Raw(_) => "raw",
        }
    }

    /// Bytes of an `upload.file` response.
    pub fn into_file_bytes(self) -> Result<Bytes, CallError> {
        match self {
            Response::File(bytes) => Ok(bytes),
            other => Err(CallError::UnexpectedResponseType(other.type_name())),
        }
    }
}

/// Per-call context. Cloning shares the cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run `fut` unless the call is cancelled first.
    pub async fn guard<F, T>(&self, fut: F) -> Result<T, CallError>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(CallError::Cancelled),
            out = fut => Ok(out),
        }
    }
}
