//! Decoder-less reference player.
//!
//! [`HeadlessPlayer`] acquires the media through a [`Source`] and keeps the
//! payload in memory. It reports the same lifecycle a real decoder would
//! (`load` after the payload lands, `play`/`pause`/`stop` as state changes),
//! which is enough to drive a [`Coordinator`](crate::Coordinator) end to end.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use canvas_player_types::FrameSize;
use serde::Deserialize;

use crate::error::PlayerError;
use crate::player::{AudioOutput, Player, PlayerFactory, PlayerHooks, PlayerInit, VideoSurface};
use crate::scheduler::Scheduler;
use crate::source::{Destination, Source, SourceOptions};
use crate::transport::Transport;

/// What the headless decoder pretends to find in the stream.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HeadlessConfig {
    /// Natural frame size reported after load.
    pub frame_size: Option<FrameSize>,
    /// Expose an audio output.
    pub audio: bool,
    /// The audio output starts unlocked (no gesture needed).
    pub audio_unlocked: bool,
}

impl Default for HeadlessConfig {
    /// Locked audio, unknown frame size.
    fn default() -> Self {
        Self {
            frame_size: None,
            audio: true,
            audio_unlocked: false,
        }
    }
}

/// In-memory destination holding the acquired payload.
pub struct MediaBuffer {
    bytes: Vec<u8>,
    writes: usize,
    scheduler: Scheduler,
    on_loaded: Option<Box<dyn FnOnce()>>,
}

impl MediaBuffer {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            bytes: Vec::new(),
            writes: 0,
            scheduler,
            on_loaded: None,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of writes received.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl Destination for MediaBuffer {
    fn write(&mut self, bytes: Vec<u8>) {
        self.bytes = bytes;
        self.writes += 1;
        // Readiness is reported after the source's completion phase returns.
        if let Some(on_loaded) = self.on_loaded.take() {
            self.scheduler.defer(on_loaded);
        }
    }
}

/// Audio gate that unlocks on the scheduler turn after a request.
pub struct HeadlessAudio {
    unlocked: Rc<Cell<bool>>,
    requests: Cell<u32>,
    scheduler: Scheduler,
}

impl HeadlessAudio {
    pub fn new(scheduler: Scheduler, unlocked: bool) -> Self {
        Self {
            unlocked: Rc::new(Cell::new(unlocked)),
            requests: Cell::new(0),
            scheduler,
        }
    }

    /// Unlock requests received so far.
    pub fn requests(&self) -> u32 {
        self.requests.get()
    }
}

impl AudioOutput for HeadlessAudio {
    fn is_unlocked(&self) -> bool {
        self.unlocked.get()
    }

    fn unlock(&self, on_unlocked: Box<dyn FnOnce()>) {
        self.requests.set(self.requests.get() + 1);
        if self.unlocked.get() {
            on_unlocked();
            return;
        }
        let unlocked = self.unlocked.clone();
        self.scheduler.defer(move || {
            unlocked.set(true);
            on_unlocked();
        });
    }
}

pub struct HeadlessPlayer {
    hooks: PlayerHooks,
    streaming: bool,
    loop_playback: bool,
    video: bool,
    frame_size: Option<FrameSize>,
    audio: Option<Rc<HeadlessAudio>>,
    buffer: Rc<RefCell<MediaBuffer>>,
    source: RefCell<Option<Source>>,
    playing: Cell<bool>,
    loaded: Cell<bool>,
    warmed_up: Cell<bool>,
    destroyed: Cell<bool>,
}

impl HeadlessPlayer {
    pub fn source(&self) -> Option<Source> {
        self.source.borrow().clone()
    }

    /// Payload bytes buffered so far.
    pub fn buffered_len(&self) -> usize {
        self.buffer.borrow().len()
    }

    pub fn buffer_writes(&self) -> usize {
        self.buffer.borrow().writes()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get()
    }

    /// The warm-up step ran ahead of the established callbacks.
    pub fn is_warmed_up(&self) -> bool {
        self.warmed_up.get()
    }

    pub fn is_looping(&self) -> bool {
        self.loop_playback
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    pub fn audio(&self) -> Option<Rc<HeadlessAudio>> {
        self.audio.clone()
    }

    fn on_loaded(&self) {
        if self.destroyed.get() {
            return;
        }
        self.loaded.set(true);
        tracing::debug!(bytes = self.buffered_len(), "headless player loaded");
        (self.hooks.load)();
    }
}

impl Player for HeadlessPlayer {
    fn play(&self) {
        if self.destroyed.get() || self.playing.replace(true) {
            return;
        }
        (self.hooks.play)();
    }

    fn pause(&self) {
        if self.destroyed.get() || !self.playing.replace(false) {
            return;
        }
        (self.hooks.pause)();
    }

    fn stop(&self) {
        if self.destroyed.get() {
            return;
        }
        self.pause();
        (self.hooks.stop)();
    }

    fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        self.playing.set(false);
        let source = self.source.borrow_mut().take();
        if let Some(source) = source {
            source.destroy();
        }
    }

    fn is_playing(&self) -> bool {
        self.playing.get()
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn video(&self) -> Option<VideoSurface> {
        if !self.video {
            return None;
        }
        Some(VideoSurface {
            destination: self.frame_size.filter(|_| self.loaded.get()),
        })
    }

    fn audio_out(&self) -> Option<Rc<dyn AudioOutput>> {
        self.audio.clone().map(|audio| audio as Rc<dyn AudioOutput>)
    }
}

/// Builds [`HeadlessPlayer`]s over a shared transport and scheduler.
pub struct HeadlessPlayerFactory {
    transport: Rc<dyn Transport>,
    scheduler: Scheduler,
    config: HeadlessConfig,
    last: RefCell<Option<Rc<HeadlessPlayer>>>,
}

impl HeadlessPlayerFactory {
    pub fn new(transport: Rc<dyn Transport>, scheduler: Scheduler, config: HeadlessConfig) -> Self {
        Self {
            transport,
            scheduler,
            config,
            last: RefCell::new(None),
        }
    }

    /// The most recently created player.
    pub fn last_player(&self) -> Option<Rc<HeadlessPlayer>> {
        self.last.borrow().clone()
    }
}

impl PlayerFactory for HeadlessPlayerFactory {
    fn create(&self, init: PlayerInit) -> Result<Rc<dyn Player>, PlayerError> {
        let PlayerInit {
            url,
            options,
            hooks,
            source: mut callbacks,
        } = init;

        let audio = (options.audio && self.config.audio).then(|| {
            Rc::new(HeadlessAudio::new(
                self.scheduler.clone(),
                self.config.audio_unlocked,
            ))
        });
        let buffer = Rc::new(RefCell::new(MediaBuffer::new(self.scheduler.clone())));
        let player = Rc::new(HeadlessPlayer {
            hooks,
            streaming: options.streaming,
            loop_playback: options.loop_playback,
            video: options.video,
            frame_size: self.config.frame_size,
            audio,
            buffer: buffer.clone(),
            source: RefCell::new(None),
            playing: Cell::new(false),
            loaded: Cell::new(false),
            warmed_up: Cell::new(false),
            destroyed: Cell::new(false),
        });

        let weak = Rc::downgrade(&player);
        buffer.borrow_mut().on_loaded = Some(Box::new(move || {
            if let Some(player) = weak.upgrade() {
                player.on_loaded();
            }
        }));

        let caller_hook = callbacks.hook_on_established.take();
        let weak = Rc::downgrade(&player);
        callbacks.hook_on_established = Some(Box::new(move || {
            if let Some(player) = weak.upgrade() {
                player.warmed_up.set(true);
            }
            if let Some(hook) = caller_hook {
                hook();
            }
        }));

        let source = Source::new(
            url,
            SourceOptions {
                streaming: options.streaming,
            },
            self.transport.clone(),
            callbacks,
        );
        source.connect(&buffer)?;
        source.start()?;
        *player.source.borrow_mut() = Some(source);

        *self.last.borrow_mut() = Some(player.clone());
        Ok(player)
    }
}
