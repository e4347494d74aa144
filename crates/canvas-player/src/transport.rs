//! Network transport capability.
//!
//! A [`Transport`] performs a binary GET and reports what happens through a
//! sink callback. Events are always delivered from the owner's event pump,
//! never from inside [`Transport::get`], so callers may finish their own
//! bookkeeping before the first event arrives.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

/// One observation from an in-flight request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// Partial data arrived. `total` is the declared length when known.
    Progress { loaded: u64, total: Option<u64> },
    /// The response finished with `status` and the full body.
    Response { status: u16, body: Vec<u8> },
    /// The request failed before a response could be read.
    Failed(String),
}

impl TransportEvent {
    /// `true` for events after which the request produces nothing else.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}

pub type TransportSink = Box<dyn FnMut(TransportEvent)>;

/// Handle to a request that can still be cancelled.
pub trait InFlight {
    /// Cancel the request. The sink is not called again afterwards.
    fn abort(&mut self);
}

/// Injected network capability used by sources.
pub trait Transport {
    fn get(&self, url: &str, sink: TransportSink) -> Box<dyn InFlight>;
}

type SinkMap = Rc<RefCell<HashMap<u64, TransportSink>>>;

/// Deliver `event` to request `id`, keeping the sink for non-terminal events.
///
/// The sink is removed from the map while it runs so it may start or abort
/// other requests on the same transport.
pub(crate) fn dispatch(sinks: &SinkMap, id: u64, event: TransportEvent) -> bool {
    let Some(mut sink) = sinks.borrow_mut().remove(&id) else {
        return false;
    };
    let terminal = event.is_terminal();
    sink(event);
    if !terminal {
        sinks.borrow_mut().entry(id).or_insert(sink);
    }
    true
}

/// Abort handle that simply forgets the sink.
pub(crate) struct DetachHandle {
    pub(crate) id: u64,
    pub(crate) sinks: std::rc::Weak<RefCell<HashMap<u64, TransportSink>>>,
}

impl InFlight for DetachHandle {
    fn abort(&mut self) {
        if let Some(sinks) = self.sinks.upgrade() {
            sinks.borrow_mut().remove(&self.id);
        }
    }
}

/// Canned reply served by [`MemoryTransport`].
#[derive(Clone, Debug)]
pub struct MemoryResponse {
    pub status: u16,
    pub body: Vec<u8>,
    /// Declared length reported with progress events; `None` hides it.
    pub declared_len: Option<u64>,
    /// Number of progress events emitted before the response.
    pub progress_steps: usize,
}

impl MemoryResponse {
    pub fn ok(body: Vec<u8>) -> Self {
        let len = body.len() as u64;
        Self {
            status: 200,
            body,
            declared_len: Some(len),
            progress_steps: 2,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
            declared_len: None,
            progress_steps: 0,
        }
    }
}

/// In-process transport serving registered payloads.
///
/// Requests are queued by [`Transport::get`] and only answered by
/// [`MemoryTransport::flush`] or [`MemoryTransport::step`].
#[derive(Default)]
pub struct MemoryTransport {
    routes: RefCell<HashMap<String, MemoryResponse>>,
    sinks: SinkMap,
    queue: RefCell<VecDeque<(u64, TransportEvent)>>,
    next_id: std::cell::Cell<u64>,
    requested: RefCell<Vec<String>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the reply for `url`. Unknown URLs fail with a transport error.
    pub fn route(&self, url: impl Into<String>, response: MemoryResponse) {
        self.routes.borrow_mut().insert(url.into(), response);
    }

    /// URLs requested so far, in order.
    pub fn requested(&self) -> Vec<String> {
        self.requested.borrow().clone()
    }

    /// Requests whose sink is still attached.
    pub fn open_requests(&self) -> usize {
        self.sinks.borrow().len()
    }

    /// Deliver the next queued event. Returns `false` when nothing is queued.
    pub fn step(&self) -> bool {
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some((id, event)) = next else {
                return false;
            };
            if dispatch(&self.sinks, id, event) {
                return true;
            }
        }
    }

    /// Deliver every queued event. Returns the number delivered.
    pub fn flush(&self) -> usize {
        let mut delivered = 0;
        while self.step() {
            delivered += 1;
        }
        delivered
    }

    /// Push an arbitrary event to request `index` (0-based, in request order).
    ///
    /// Used to simulate a transport that keeps firing after cancellation.
    pub fn inject(&self, index: u64, event: TransportEvent) {
        self.queue.borrow_mut().push_back((index + 1, event));
    }

    fn script(&self, id: u64, url: &str) {
        let reply = self.routes.borrow().get(url).cloned();
        let mut queue = self.queue.borrow_mut();
        let Some(reply) = reply else {
            queue.push_back((id, TransportEvent::Failed(format!("no route for {url}"))));
            return;
        };
        let len = reply.body.len() as u64;
        let steps = reply.progress_steps as u64;
        for step in 1..=steps {
            queue.push_back((
                id,
                TransportEvent::Progress {
                    loaded: len * step / steps,
                    total: reply.declared_len,
                },
            ));
        }
        queue.push_back((
            id,
            TransportEvent::Response {
                status: reply.status,
                body: reply.body,
            },
        ));
    }
}

impl Transport for MemoryTransport {
    fn get(&self, url: &str, sink: TransportSink) -> Box<dyn InFlight> {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.requested.borrow_mut().push(url.to_string());
        self.sinks.borrow_mut().insert(id, sink);
        self.script(id, url);
        Box::new(DetachHandle {
            id,
            sinks: Rc::downgrade(&self.sinks),
        })
    }
}
