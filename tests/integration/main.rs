//! Courier integration test harness.
//!
//! Every test builds real clients through `ClientFactory` and talks to an
//! in-process scripted remote. Faults are queued on the remote and consumed
//! in order before it falls back to serving its file.
//!
//!   cargo test --test integration

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use courier_client::{Invoker, SharedInvoker, Transport, TransportOptions};
use courier_core::{BuildError, CallContext, CallError, FileLocation, Request, Response};

mod fetch;
mod pipeline;

// ── Harness ───────────────────────────────────────────────────────────────────

/// One injected misbehaviour.
#[derive(Debug, Clone)]
pub enum Fault {
    Error(CallError),
    Panic(&'static str),
    /// Hold the round trip open, ignoring cancellation, then serve.
    Stall(std::time::Duration),
    Reply(Response),
}

/// Scripted remote serving a single file.
pub struct Remote {
    file: Bytes,
    faults: Mutex<VecDeque<Fault>>,
    requests: Mutex<Vec<Request>>,
}

impl Remote {
    pub fn new(file_len: usize) -> Arc<Self> {
        let data: Vec<u8> = (0..file_len).map(|i| (i % 253) as u8).collect();
        Arc::new(Self {
            file: Bytes::from(data),
            faults: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn inject(&self, faults: impl IntoIterator<Item = Fault>) {
        self.faults.lock().unwrap().extend(faults);
    }

    pub fn file(&self) -> &Bytes {
        &self.file
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Offsets of every `upload.getFile` seen, in arrival order.
    pub fn offsets(&self) -> Vec<u64> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| match r {
                Request::GetFile(c) => Some(c.offset),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Invoker for Remote {
    async fn invoke(&self, _: &CallContext, request: &Request) -> Result<Response, CallError> {
        self.requests.lock().unwrap().push(request.clone());

        let fault = self.faults.lock().unwrap().pop_front();
        match fault {
            Some(Fault::Error(e)) => return Err(e),
            Some(Fault::Panic(msg)) => panic!("{msg}"),
            Some(Fault::Reply(resp)) => return Ok(resp),
            Some(Fault::Stall(d)) => tokio::time::sleep(d).await,
            None => {}
        }

        match request {
            Request::GetFile(chunk) => {
                let len = self.file.len();
                let start = (chunk.offset as usize).min(len);
                let end = (start + chunk.limit as usize).min(len);
                Ok(Response::File(self.file.slice(start..end)))
            }
            Request::Raw { .. } => Ok(Response::Raw(Bytes::from_static(b"ok"))),
        }
    }
}

/// Protocol layer that hands out the scripted remote and keeps the options
/// it was opened with.
pub struct Loopback {
    pub remote: Arc<Remote>,
    pub opened: Mutex<Vec<TransportOptions>>,
}

impl Loopback {
    pub fn new(remote: Arc<Remote>) -> Arc<Self> {
        Arc::new(Self {
            remote,
            opened: Mutex::new(Vec::new()),
        })
    }
}

impl Transport for Loopback {
    fn open(&self, options: TransportOptions) -> Result<SharedInvoker, BuildError> {
        self.opened.lock().unwrap().push(options);
        Ok(self.remote.clone())
    }
}

pub fn document() -> FileLocation {
    FileLocation::Document {
        id: 5_112_233_445_566,
        access_hash: -8_812_000_001,
        file_reference: Bytes::from_static(b"\x02\x41\x7f"),
        thumb_size: String::new(),
    }
}

pub fn raw(method: &'static str) -> Request {
    Request::Raw {
        method,
        payload: Bytes::new(),
    }
}

pub const MIB: usize = 1_048_576;
