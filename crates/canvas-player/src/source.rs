//! One-shot media acquisition.
//!
//! A [`Source`] fetches a resource through an injected [`Transport`], tracks
//! progress, and on success runs the completion protocol:
//!
//! 1. mark established/completed, progress = 1
//! 2. `hook_on_established()`
//! 3. `on_established(&source)`
//! 4. `on_completed(&source)`
//! 5. `destination.write(payload)`
//!
//! Each step finishes before the next begins. Failures never run the protocol;
//! they are reported once through `on_failed`. After completion, failure or
//! [`Source::destroy`], transport events are ignored.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use canvas_player_types::AcquisitionState;

use crate::error::{AcquisitionError, SourceError};
use crate::transport::{InFlight, Transport, TransportEvent};

/// Consumer of the bytes a source acquires.
pub trait Destination {
    fn write(&mut self, bytes: Vec<u8>);
}

/// Callbacks invoked by a source. All are optional.
#[derive(Default)]
pub struct SourceCallbacks {
    /// Internal collaborator hook, runs before any consumer is notified.
    pub hook_on_established: Option<Box<dyn FnOnce()>>,
    pub on_established: Option<Box<dyn FnOnce(&Source)>>,
    pub on_completed: Option<Box<dyn FnOnce(&Source)>>,
    /// Observes every progress update that changed `progress`.
    pub on_progress: Option<Box<dyn FnMut(&Source, f64)>>,
    pub on_failed: Option<Box<dyn FnOnce(&Source, &AcquisitionError)>>,
}

/// Source construction parameters.
#[derive(Clone, Debug, Default)]
pub struct SourceOptions {
    /// The resource is an unbounded live stream.
    pub streaming: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Loading,
    Completed,
    Failed,
    Aborted,
}

struct SourceState {
    phase: Phase,
    progress: f64,
    established: bool,
    completed: bool,
    received: u64,
    failure: Option<AcquisitionError>,
}

struct SourceInner {
    url: String,
    streaming: bool,
    transport: Rc<dyn Transport>,
    state: RefCell<SourceState>,
    callbacks: RefCell<SourceCallbacks>,
    destination: RefCell<Option<Weak<RefCell<dyn Destination>>>>,
    request: RefCell<Option<Box<dyn InFlight>>>,
    destroyed: Cell<bool>,
}

/// Cloneable handle to one acquisition.
#[derive(Clone)]
pub struct Source {
    inner: Rc<SourceInner>,
}

impl Source {
    pub fn new(
        url: impl Into<String>,
        options: SourceOptions,
        transport: Rc<dyn Transport>,
        callbacks: SourceCallbacks,
    ) -> Self {
        Self {
            inner: Rc::new(SourceInner {
                url: url.into(),
                streaming: options.streaming,
                transport,
                state: RefCell::new(SourceState {
                    phase: Phase::Idle,
                    progress: 0.0,
                    established: false,
                    completed: false,
                    received: 0,
                    failure: None,
                }),
                callbacks: RefCell::new(callbacks),
                destination: RefCell::new(None),
                request: RefCell::new(None),
                destroyed: Cell::new(false),
            }),
        }
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn is_streaming(&self) -> bool {
        self.inner.streaming
    }

    /// Fraction of the declared length received so far.
    pub fn progress(&self) -> f64 {
        self.inner.state.borrow().progress
    }

    pub fn is_established(&self) -> bool {
        self.inner.state.borrow().established
    }

    pub fn is_completed(&self) -> bool {
        self.inner.state.borrow().completed
    }

    /// Bytes received according to the latest progress event.
    pub fn bytes_received(&self) -> u64 {
        self.inner.state.borrow().received
    }

    pub fn failure(&self) -> Option<AcquisitionError> {
        self.inner.state.borrow().failure.clone()
    }

    /// Current acquisition outcome.
    pub fn state(&self) -> AcquisitionState {
        let st = self.inner.state.borrow();
        match st.phase {
            Phase::Idle => AcquisitionState::Pending,
            Phase::Loading if st.received == 0 => AcquisitionState::Pending,
            Phase::Loading => AcquisitionState::Progress {
                fraction: st.progress,
            },
            Phase::Completed => AcquisitionState::Established,
            Phase::Failed => AcquisitionState::Failed {
                reason: st
                    .failure
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_default(),
            },
            Phase::Aborted => AcquisitionState::Aborted,
        }
    }

    /// Bind the consumer. The source keeps only a weak reference.
    pub fn connect<D: Destination + 'static>(
        &self,
        destination: &Rc<RefCell<D>>,
    ) -> Result<(), SourceError> {
        let weak = Rc::downgrade(destination);
        let weak: Weak<RefCell<dyn Destination>> = weak;
        self.connect_weak(weak)
    }

    /// Bind an already type-erased consumer.
    pub fn connect_weak(
        &self,
        destination: Weak<RefCell<dyn Destination>>,
    ) -> Result<(), SourceError> {
        if self.inner.destroyed.get() {
            return Err(SourceError::Destroyed);
        }
        if self.inner.state.borrow().phase != Phase::Idle {
            return Err(SourceError::AlreadyStarted);
        }
        let mut slot = self.inner.destination.borrow_mut();
        if slot.is_some() {
            return Err(SourceError::AlreadyConnected);
        }
        *slot = Some(destination);
        Ok(())
    }

    /// Begin the acquisition. Allowed once, after [`connect`](Self::connect).
    pub fn start(&self) -> Result<(), SourceError> {
        if self.inner.destroyed.get() {
            return Err(SourceError::Destroyed);
        }
        if self.inner.state.borrow().phase != Phase::Idle {
            return Err(SourceError::AlreadyStarted);
        }
        if self.inner.destination.borrow().is_none() {
            return Err(SourceError::NotConnected);
        }
        self.inner.state.borrow_mut().phase = Phase::Loading;

        let weak = Rc::downgrade(&self.inner);
        let sink = Box::new(move |event: TransportEvent| {
            if let Some(inner) = weak.upgrade() {
                Source { inner }.on_transport_event(event);
            }
        });
        tracing::debug!(url = %self.inner.url, "source start");
        let request = self.inner.transport.get(&self.inner.url, sink);
        *self.inner.request.borrow_mut() = Some(request);
        Ok(())
    }

    /// Reserved for pausable transports; one-shot fetches have nothing to resume.
    pub fn resume(&self) {}

    /// Cancel any in-flight request. Safe to call at any time, any number of times.
    pub fn destroy(&self) {
        if self.inner.destroyed.replace(true) {
            return;
        }
        let request = self.inner.request.borrow_mut().take();
        if let Some(mut request) = request {
            request.abort();
        }
        {
            let mut st = self.inner.state.borrow_mut();
            if matches!(st.phase, Phase::Idle | Phase::Loading) {
                st.phase = Phase::Aborted;
                tracing::debug!(url = %self.inner.url, "source aborted");
            }
        }
        // Drop callbacks so captured state is released with the source.
        drop(std::mem::take(&mut *self.inner.callbacks.borrow_mut()));
    }

    fn is_live(&self) -> bool {
        !self.inner.destroyed.get() && self.inner.state.borrow().phase == Phase::Loading
    }

    fn on_transport_event(&self, event: TransportEvent) {
        if !self.is_live() {
            return;
        }
        match event {
            TransportEvent::Progress { loaded, total } => self.on_progress(loaded, total),
            TransportEvent::Response { status, body } => {
                self.inner.request.borrow_mut().take();
                if status != 200 {
                    self.fail(AcquisitionError::Status(status));
                } else if body.is_empty() {
                    self.fail(AcquisitionError::EmptyPayload);
                } else {
                    self.on_load(body);
                }
            }
            TransportEvent::Failed(reason) => {
                self.inner.request.borrow_mut().take();
                self.fail(AcquisitionError::Transport(reason));
            }
        }
    }

    fn on_progress(&self, loaded: u64, total: Option<u64>) {
        let fraction = {
            let mut st = self.inner.state.borrow_mut();
            st.received = loaded;
            match total.filter(|t| *t > 0) {
                Some(total) => {
                    st.progress = (loaded as f64 / total as f64).min(1.0);
                    st.progress
                }
                // Unknown length: progress stays indeterminate.
                None => return,
            }
        };

        let callback = self.inner.callbacks.borrow_mut().on_progress.take();
        if let Some(mut callback) = callback {
            callback(self, fraction);
            if !self.inner.destroyed.get() {
                let mut cbs = self.inner.callbacks.borrow_mut();
                if cbs.on_progress.is_none() {
                    cbs.on_progress = Some(callback);
                }
            }
        }
    }

    fn on_load(&self, payload: Vec<u8>) {
        {
            let mut st = self.inner.state.borrow_mut();
            st.phase = Phase::Completed;
            st.established = true;
            st.completed = true;
            st.progress = 1.0;
            st.received = st.received.max(payload.len() as u64);
        }
        tracing::info!(url = %self.inner.url, bytes = payload.len(), "source completed");

        let callbacks = std::mem::take(&mut *self.inner.callbacks.borrow_mut());

        if let Some(hook) = callbacks.hook_on_established {
            hook();
        }
        if self.inner.destroyed.get() {
            return;
        }
        if let Some(callback) = callbacks.on_established {
            callback(self);
        }
        if self.inner.destroyed.get() {
            return;
        }
        if let Some(callback) = callbacks.on_completed {
            callback(self);
        }
        if self.inner.destroyed.get() {
            return;
        }

        let destination = self
            .inner
            .destination
            .borrow()
            .as_ref()
            .and_then(|weak| weak.upgrade());
        match destination {
            Some(destination) => destination.borrow_mut().write(payload),
            None => {
                tracing::warn!(url = %self.inner.url, "source destination dropped before write")
            }
        }
    }

    fn fail(&self, error: AcquisitionError) {
        {
            let mut st = self.inner.state.borrow_mut();
            st.phase = Phase::Failed;
            st.failure = Some(error.clone());
        }
        tracing::warn!(url = %self.inner.url, error = %error, "source failed");
        let callback = self.inner.callbacks.borrow_mut().on_failed.take();
        drop(std::mem::take(&mut *self.inner.callbacks.borrow_mut()));
        if let Some(callback) = callback {
            callback(self, &error);
        }
    }
}
