//! Blocking HTTP GET transport.
//!
//! Each request runs on its own worker thread using `ureq`. Events travel back
//! over a channel and are dispatched to sinks by [`HttpTransport::pump`] on the
//! thread that owns the transport, which keeps every callback on one timeline.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::Read;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use serde::Deserialize;

use crate::transport::{InFlight, Transport, TransportEvent, TransportSink, dispatch};

/// Configuration for HTTP fetching.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpTransportConfig {
    /// Per-request timeout.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Bytes read from the body between progress events.
    pub read_chunk: usize,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            read_chunk: 64 * 1024,
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        if !secs.is_finite() || secs <= 0.0 {
            return Err(serde::de::Error::custom("timeout must be a positive number of seconds"));
        }
        Ok(Duration::from_secs_f64(secs))
    }
}

type Envelope = (u64, TransportEvent);

/// Transport backed by `ureq` worker threads.
pub struct HttpTransport {
    config: HttpTransportConfig,
    tx: Sender<Envelope>,
    rx: Receiver<Envelope>,
    sinks: Rc<RefCell<HashMap<u64, TransportSink>>>,
    next_id: Cell<u64>,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            config,
            tx,
            rx,
            sinks: Rc::new(RefCell::new(HashMap::new())),
            next_id: Cell::new(0),
        }
    }

    /// Requests whose sink is still attached.
    pub fn open_requests(&self) -> usize {
        self.sinks.borrow().len()
    }

    /// Dispatch every event that has already arrived. Never blocks.
    pub fn pump(&self) -> usize {
        let mut delivered = 0;
        while let Ok((id, event)) = self.rx.try_recv() {
            if dispatch(&self.sinks, id, event) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Wait up to `timeout` for the first event, then drain like [`pump`](Self::pump).
    pub fn pump_timeout(&self, timeout: Duration) -> usize {
        match self.rx.recv_timeout(timeout) {
            Ok((id, event)) => {
                let first = usize::from(dispatch(&self.sinks, id, event));
                first + self.pump()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, sink: TransportSink) -> Box<dyn InFlight> {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.sinks.borrow_mut().insert(id, sink);

        let cancel = Arc::new(AtomicBool::new(false));
        let worker = Worker {
            id,
            url: url.to_string(),
            config: self.config.clone(),
            tx: self.tx.clone(),
            cancel: cancel.clone(),
        };
        std::thread::spawn(move || worker.run());

        Box::new(HttpRequest {
            id,
            cancel,
            sinks: Rc::downgrade(&self.sinks),
        })
    }
}

struct HttpRequest {
    id: u64,
    cancel: Arc<AtomicBool>,
    sinks: std::rc::Weak<RefCell<HashMap<u64, TransportSink>>>,
}

impl InFlight for HttpRequest {
    fn abort(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        if let Some(sinks) = self.sinks.upgrade() {
            sinks.borrow_mut().remove(&self.id);
        }
    }
}

struct Worker {
    id: u64,
    url: String,
    config: HttpTransportConfig,
    tx: Sender<Envelope>,
    cancel: Arc<AtomicBool>,
}

impl Worker {
    fn is_canceled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn send(&self, event: TransportEvent) {
        if !self.is_canceled() {
            let _ = self.tx.send((self.id, event));
        }
    }

    fn run(self) {
        let started = Instant::now();
        let event = match self.fetch() {
            Ok(Some(event)) => event,
            Ok(None) => {
                tracing::debug!(url = %self.url, "http fetch canceled");
                return;
            }
            Err(e) => TransportEvent::Failed(e),
        };
        tracing::debug!(
            url = %self.url,
            took_ms = started.elapsed().as_millis() as u64,
            "http fetch finished"
        );
        self.send(event);
    }

    /// Returns `Ok(None)` when canceled mid-read.
    fn fetch(&self) -> Result<Option<TransportEvent>, String> {
        let resp = match ureq::get(&self.url)
            .config()
            .timeout_per_call(Some(self.config.timeout))
            .build()
            .call()
        {
            Ok(resp) => resp,
            Err(ureq::Error::StatusCode(status)) => {
                return Ok(Some(TransportEvent::Response {
                    status,
                    body: Vec::new(),
                }));
            }
            Err(e) => return Err(format!("http request failed: {e}")),
        };

        let status = resp.status().as_u16();
        let total = resp
            .headers()
            .get("Content-Length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());

        let (_, body) = resp.into_parts();
        let mut reader = body.into_reader();
        let mut payload = Vec::with_capacity(total.unwrap_or(0).min(64 * 1024 * 1024) as usize);
        let mut chunk = vec![0u8; self.config.read_chunk.max(1)];
        loop {
            if self.is_canceled() {
                return Ok(None);
            }
            let n = reader
                .read(&mut chunk)
                .map_err(|e| format!("http read failed: {e}"))?;
            if n == 0 {
                break;
            }
            payload.extend_from_slice(&chunk[..n]);
            self.send(TransportEvent::Progress {
                loaded: payload.len() as u64,
                total,
            });
        }

        Ok(Some(TransportEvent::Response {
            status,
            body: payload,
        }))
    }
}
