//! Chunked content retrieval.
//!
//! Reads a remote file as a strictly sequential series of bounded
//! `upload.getFile` requests through the call pipeline. Offsets advance by
//! exactly the chunk limit; an empty chunk marks end of file.

use bytes::{Bytes, BytesMut};

use courier_core::{CallContext, CallError, ChunkRequest, FileLocation, Request};

use crate::invoker::{Invoker, SharedInvoker};

/// 1 MiB, the largest chunk the server serves in one read.
pub const DEFAULT_CHUNK_LIMIT: u32 = 1_048_576;

/// Chunk offsets and limits must be aligned to this.
pub const CHUNK_ALIGNMENT: u32 = 4096;

/// A failed fetch, carrying everything read before the failure.
#[derive(Debug, thiserror::Error)]
#[error("fetch failed after {} bytes: {source}", .partial.len())]
pub struct FetchError {
    pub partial: Bytes,
    #[source]
    pub source: CallError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("chunk limit {0} must be a non-zero multiple of 4096")]
pub struct InvalidChunkLimit(pub u32);

#[derive(Clone)]
pub struct ChunkedFetcher {
    invoker: SharedInvoker,
    limit: u32,
}

impl ChunkedFetcher {
    pub fn new(invoker: SharedInvoker) -> Self {
        Self {
            invoker,
            limit: DEFAULT_CHUNK_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Result<Self, InvalidChunkLimit> {
        if limit == 0 || limit % CHUNK_ALIGNMENT != 0 {
            return Err(InvalidChunkLimit(limit));
        }
        self.limit = limit;
        Ok(self)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// One read of up to `limit` bytes at `offset`.
    pub async fn fetch_chunk(
        &self,
        ctx: &CallContext,
        location: &FileLocation,
        offset: u64,
    ) -> Result<Bytes, CallError> {
        let request = Request::GetFile(ChunkRequest {
            location: location.clone(),
            offset,
            limit: self.limit,
        });
        self.invoker.invoke(ctx, &request).await?.into_file_bytes()
    }

    /// Read the whole file. On failure the bytes read so far are returned
    /// inside the error.
    pub async fn fetch_all(
        &self,
        ctx: &CallContext,
        location: &FileLocation,
    ) -> Result<Bytes, FetchError> {
        let mut buffer = BytesMut::new();
        let mut offset: u64 = 0;

        loop {
            let chunk = match self.fetch_chunk(ctx, location, offset).await {
                Ok(chunk) => chunk,
                Err(source) => {
                    tracing::debug!(offset, read = buffer.len(), error = %source, "fetch aborted");
                    return Err(FetchError {
                        partial: buffer.freeze(),
                        source,
                    });
                }
            };

            if chunk.is_empty() {
                break;
            }

            tracing::trace!(offset, len = chunk.len(), "chunk received");
            buffer.extend_from_slice(&chunk);
            offset += u64::from(self.limit);
        }

        tracing::debug!(total = buffer.len(), "fetch complete");
        Ok(buffer.freeze())
    }
}

impl std::fmt::Debug for ChunkedFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedFetcher")
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}
