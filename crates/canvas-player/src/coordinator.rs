//! Playback lifecycle coordinator.
//!
//! Binds one wrapper element to one player. The coordinator owns every
//! visibility change of the overlays (play button, poster, unmute button) and
//! reconciles three independent event streams:
//!
//! - player hooks (`play`, `pause`, `stop`, `load`),
//! - source acquisition callbacks (progress, established, failure),
//! - user gestures on the wrapper or the unmute button.
//!
//! None of these is assumed to arrive before another.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use canvas_player_types::{
    AcquisitionState, CanvasTarget, ElementId, LifecycleState, PlayerOptions, Rect,
};

use crate::dom::{Dom, DomEvent, EventKind, Listener, ListenerId, ListenerOptions};
use crate::error::{AcquisitionError, PlayerError};
use crate::player::{Hook, Player, PlayerFactory, PlayerHooks, PlayerInit};
use crate::scaffold::{self, WrapperTarget};
use crate::scheduler::Scheduler;
use crate::source::{Source, SourceCallbacks};
use crate::unlock::UnlockMachine;

static NEXT_SESSION: AtomicU64 = AtomicU64::new(0);

/// Caller-supplied lifecycle hooks.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    pub play: Option<Hook>,
    pub pause: Option<Hook>,
    pub stop: Option<Hook>,
    pub load: Option<Hook>,
    pub destroy: Option<Hook>,
    /// The media could not be acquired.
    pub error: Option<Rc<dyn Fn(&AcquisitionError)>>,
}

impl LifecycleHooks {
    pub fn on_play(mut self, f: impl Fn() + 'static) -> Self {
        self.play = Some(Rc::new(f));
        self
    }

    pub fn on_pause(mut self, f: impl Fn() + 'static) -> Self {
        self.pause = Some(Rc::new(f));
        self
    }

    pub fn on_stop(mut self, f: impl Fn() + 'static) -> Self {
        self.stop = Some(Rc::new(f));
        self
    }

    pub fn on_load(mut self, f: impl Fn() + 'static) -> Self {
        self.load = Some(Rc::new(f));
        self
    }

    pub fn on_destroy(mut self, f: impl Fn() + 'static) -> Self {
        self.destroy = Some(Rc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&AcquisitionError) + 'static) -> Self {
        self.error = Some(Rc::new(f));
        self
    }
}

fn call(hook: &Option<Hook>) {
    if let Some(hook) = hook {
        hook();
    }
}

/// Hooks plus the pass-through source callbacks.
#[derive(Default)]
pub struct SessionCallbacks {
    pub hooks: LifecycleHooks,
    pub source: SourceCallbacks,
}

/// Capabilities injected into every coordinator.
#[derive(Clone)]
pub struct Environment {
    pub dom: Rc<dyn Dom>,
    pub scheduler: Scheduler,
    pub factory: Rc<dyn PlayerFactory>,
}

/// Elements the coordinator created or resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Elements {
    pub wrapper: ElementId,
    pub canvas: ElementId,
    pub play_button: Option<ElementId>,
    pub poster: Option<ElementId>,
    pub unmute_button: Option<ElementId>,
}

struct UnlockBinding {
    target: ElementId,
    listeners: Vec<ListenerId>,
}

struct Inner {
    session_id: u64,
    dom: Rc<dyn Dom>,
    scheduler: Scheduler,
    options: PlayerOptions,
    hooks: LifecycleHooks,
    wrapper_rect: Rect,
    els: RefCell<Elements>,
    player: RefCell<Option<Rc<dyn Player>>>,
    unlock: RefCell<UnlockMachine>,
    unlock_binding: RefCell<Option<UnlockBinding>>,
    click_listener: Cell<Option<ListenerId>>,
    acquisition: RefCell<AcquisitionState>,
    destroyed: Cell<bool>,
}

/// One player session bound to a wrapper element.
pub struct Coordinator {
    inner: Rc<Inner>,
}

impl Coordinator {
    /// Build the DOM scaffold, construct the player and wire every hook.
    pub fn new(
        env: &Environment,
        wrapper: impl Into<WrapperTarget>,
        url: &str,
        options: PlayerOptions,
        callbacks: SessionCallbacks,
    ) -> Result<Self, PlayerError> {
        let dom = env.dom.clone();
        let wrapper = scaffold::resolve_wrapper(&*dom, &wrapper.into())?;
        if let Some(owner) = dom.session(wrapper) {
            return Err(PlayerError::WrapperInUse(owner));
        }
        scaffold::ensure_positioned(&*dom, wrapper);
        let wrapper_rect = dom.bounding_rect(wrapper);
        let canvas = scaffold::init_canvas(&*dom, wrapper, options.canvas.as_ref())?;
        let play_button = options
            .need_play_button()
            .then(|| scaffold::create_play_button(&*dom, wrapper));
        let poster_planned = options.has_poster() && !options.autoplay && !options.streaming;

        let session_id = NEXT_SESSION.fetch_add(1, Ordering::Relaxed) + 1;
        let inner = Rc::new(Inner {
            session_id,
            dom: dom.clone(),
            scheduler: env.scheduler.clone(),
            options: options.clone(),
            hooks: callbacks.hooks,
            wrapper_rect,
            els: RefCell::new(Elements {
                wrapper,
                canvas,
                play_button,
                poster: None,
                unmute_button: None,
            }),
            player: RefCell::new(None),
            unlock: RefCell::new(UnlockMachine::new()),
            unlock_binding: RefCell::new(None),
            click_listener: Cell::new(None),
            acquisition: RefCell::new(AcquisitionState::Pending),
            destroyed: Cell::new(false),
        });

        // Autoplay is driven from the load hook so overlay state stays consistent.
        let mut player_options = options.clone();
        player_options.autoplay = false;
        player_options.canvas = Some(CanvasTarget::Element(canvas));
        if poster_planned {
            player_options.decode_first_frame = false;
        }
        let created = env.factory.create(PlayerInit {
            url: url.to_string(),
            options: player_options,
            hooks: Inner::player_hooks(&inner),
            source: Inner::source_callbacks(&inner, callbacks.source),
        });
        let player = match created {
            Ok(player) => player,
            Err(e) => {
                // Leave the wrapper as the caller handed it over.
                if options.canvas.is_none() {
                    dom.remove_child(wrapper, canvas);
                }
                if let Some(button) = play_button {
                    dom.remove_child(wrapper, button);
                }
                tracing::warn!(
                    session = session_id,
                    url,
                    error = %e,
                    "player construction failed"
                );
                return Err(e);
            }
        };
        *inner.player.borrow_mut() = Some(player.clone());
        dom.set_session(wrapper, Some(session_id));

        let streaming = player.is_streaming();
        if poster_planned && !streaming {
            if let Some(src) = options.poster.as_deref() {
                let poster = scaffold::create_poster(&*dom, wrapper, src);
                inner.els.borrow_mut().poster = Some(poster);
            }
        }

        if !streaming {
            Inner::attach_click(&inner);
        }

        if options.autoplay || streaming {
            if let Some(button) = play_button {
                scaffold::hide(&*dom, button);
            }
        }

        match player.audio_out() {
            Some(audio) if !audio.is_unlocked() => {
                Inner::attach_unlock(&inner, options.autoplay || streaming);
            }
            Some(_) => *inner.unlock.borrow_mut() = UnlockMachine::unlocked(),
            None => {}
        }

        tracing::debug!(
            session = session_id,
            url,
            streaming,
            autoplay = options.autoplay,
            poster = inner.els.borrow().poster.is_some(),
            "player session ready"
        );
        Ok(Self { inner })
    }

    pub fn play(&self) {
        if let Some(player) = self.inner.player() {
            player.play();
        }
    }

    pub fn pause(&self) {
        if let Some(player) = self.inner.player() {
            player.pause();
        }
    }

    pub fn stop(&self) {
        if let Some(player) = self.inner.player() {
            player.stop();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.inner.player().is_some_and(|p| p.is_playing())
    }

    pub fn player(&self) -> Option<Rc<dyn Player>> {
        self.inner.player()
    }

    pub fn elements(&self) -> Elements {
        *self.inner.els.borrow()
    }

    pub fn session_id(&self) -> u64 {
        self.inner.session_id
    }

    /// Wrapper bounding box captured at construction.
    pub fn wrapper_rect(&self) -> Rect {
        self.inner.wrapper_rect
    }

    pub fn options(&self) -> &PlayerOptions {
        &self.inner.options
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    /// Current on-screen and playback state.
    ///
    /// Audio that was unlocked without a gesture is picked up here and ends
    /// the unlock workaround.
    pub fn lifecycle(&self) -> LifecycleState {
        self.inner.sync_external_unlock();
        let els = self.elements();
        let dom = &*self.inner.dom;
        let visible = |el: Option<ElementId>| el.is_some_and(|el| scaffold::is_visible(dom, el));
        LifecycleState {
            is_playing: self.is_playing(),
            need_play_button: self.inner.options.need_play_button(),
            audio_unlocked: self.inner.unlock.borrow().is_unlocked(),
            poster_visible: visible(els.poster),
            play_button_visible: visible(els.play_button),
            unlock_button_visible: visible(els.unmute_button),
            acquisition: self.inner.acquisition.borrow().clone(),
            destroyed: self.inner.destroyed.get(),
        }
    }

    /// Tear the session down: player first, then DOM content, then the
    /// wrapper's back-reference. Safe to call more than once.
    pub fn destroy(&self) {
        let inner = &self.inner;
        if inner.destroyed.replace(true) {
            return;
        }
        let wrapper = inner.els.borrow().wrapper;
        inner.detach_unlock_listeners();
        if let Some(id) = inner.click_listener.take() {
            inner.dom.remove_listener(wrapper, id);
        }

        let player = inner.player.borrow_mut().take();
        if let Some(player) = player {
            player.destroy();
        }
        inner.dom.clear_children(wrapper);
        if inner.dom.session(wrapper) == Some(inner.session_id) {
            inner.dom.set_session(wrapper, None);
        }
        tracing::debug!(session = inner.session_id, "player session destroyed");
        call(&inner.hooks.destroy);
    }
}

impl Inner {
    fn player(&self) -> Option<Rc<dyn Player>> {
        self.player.borrow().clone()
    }

    fn player_hooks(this: &Rc<Self>) -> PlayerHooks {
        fn bind(weak: &Weak<Inner>, f: fn(&Rc<Inner>)) -> Hook {
            let weak = weak.clone();
            Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    if !inner.destroyed.get() {
                        f(&inner);
                    }
                }
            })
        }
        let weak = Rc::downgrade(this);
        PlayerHooks {
            play: bind(&weak, Inner::on_play),
            pause: bind(&weak, Inner::on_pause),
            stop: bind(&weak, Inner::on_stop),
            load: bind(&weak, Inner::on_load),
        }
    }

    /// Wrap the caller's source callbacks with coordinator bookkeeping.
    fn source_callbacks(this: &Rc<Self>, caller: SourceCallbacks) -> SourceCallbacks {
        let SourceCallbacks {
            hook_on_established,
            on_established,
            on_completed,
            mut on_progress,
            on_failed,
        } = caller;

        let weak = Rc::downgrade(this);
        let w_established = weak.clone();
        let w_progress = weak.clone();
        let w_failed = weak;

        SourceCallbacks {
            hook_on_established,
            on_established: Some(Box::new(move |source: &Source| {
                if let Some(inner) = w_established.upgrade() {
                    *inner.acquisition.borrow_mut() = AcquisitionState::Established;
                }
                if let Some(callback) = on_established {
                    callback(source);
                }
            })),
            on_completed,
            on_progress: Some(Box::new(move |source: &Source, fraction: f64| {
                if let Some(inner) = w_progress.upgrade() {
                    *inner.acquisition.borrow_mut() = AcquisitionState::Progress { fraction };
                }
                if let Some(callback) = on_progress.as_mut() {
                    callback(source, fraction);
                }
            })),
            on_failed: Some(Box::new(move |source: &Source, error: &AcquisitionError| {
                if let Some(inner) = w_failed.upgrade() {
                    inner.on_source_failed(error);
                }
                if let Some(callback) = on_failed {
                    callback(source, error);
                }
            })),
        }
    }

    fn on_play(this: &Rc<Self>) {
        let els = *this.els.borrow();
        if let Some(button) = els.play_button {
            scaffold::hide(&*this.dom, button);
        }
        if let Some(poster) = els.poster {
            scaffold::hide(&*this.dom, poster);
        }
        call(&this.hooks.play);
    }

    fn on_pause(this: &Rc<Self>) {
        if let Some(button) = this.els.borrow().play_button {
            scaffold::show(&*this.dom, button);
        }
        call(&this.hooks.pause);
    }

    fn on_stop(this: &Rc<Self>) {
        if let Some(poster) = this.els.borrow().poster {
            scaffold::show(&*this.dom, poster);
        }
        call(&this.hooks.stop);
    }

    fn on_load(this: &Rc<Self>) {
        if this.options.autoplay {
            if let Some(player) = this.player() {
                player.play();
            }
        }
        Inner::schedule_wrapper_resize(this);
        call(&this.hooks.load);
    }

    fn on_source_failed(&self, error: &AcquisitionError) {
        *self.acquisition.borrow_mut() = AcquisitionState::Failed {
            reason: error.to_string(),
        };
        tracing::warn!(session = self.session_id, error = %error, "media acquisition failed");
        if self.destroyed.get() {
            return;
        }
        // Offer the play button again only where it can act and nothing is playing.
        let idle = self
            .player()
            .is_some_and(|p| !p.is_streaming() && !p.is_playing());
        if idle {
            if let Some(button) = self.els.borrow().play_button {
                scaffold::show(&*self.dom, button);
            }
        }
        if let Some(hook) = &self.hooks.error {
            hook(error);
        }
    }

    /// Resize the wrapper to the decoded frame size on the next scheduler turn.
    fn schedule_wrapper_resize(this: &Rc<Self>) {
        if !this.options.auto_set_wrapper_size {
            return;
        }
        let has_destination = this
            .player()
            .and_then(|p| p.video())
            .is_some_and(|v| v.destination.is_some());
        if !has_destination {
            return;
        }
        let weak = Rc::downgrade(this);
        this.scheduler.defer(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.destroyed.get() {
                return;
            }
            let size = inner
                .player()
                .and_then(|p| p.video())
                .and_then(|v| v.destination);
            let Some(size) = size else {
                return;
            };
            let wrapper = inner.els.borrow().wrapper;
            inner.dom.set_style(wrapper, "width", &format!("{}px", size.width));
            inner.dom.set_style(wrapper, "height", &format!("{}px", size.height));
            tracing::debug!(
                session = inner.session_id,
                width = size.width,
                height = size.height,
                "wrapper resized"
            );
        });
    }

    fn attach_click(this: &Rc<Self>) {
        let weak = Rc::downgrade(this);
        let listener: Listener = Rc::new(move |_ev: &mut DomEvent| {
            if let Some(inner) = weak.upgrade() {
                inner.on_click();
            }
        });
        let wrapper = this.els.borrow().wrapper;
        let id = this
            .dom
            .add_listener(wrapper, EventKind::Click, ListenerOptions::default(), listener);
        this.click_listener.set(Some(id));
    }

    fn on_click(&self) {
        if !self.options.control || self.destroyed.get() {
            return;
        }
        let Some(player) = self.player() else {
            return;
        };
        if player.is_playing() {
            player.pause();
        } else {
            player.play();
        }
    }

    /// Listen for the first gesture that may unlock audio.
    ///
    /// With `dedicated`, a separate unmute button is the trigger so the user
    /// does not have to toggle playback to hear sound.
    fn attach_unlock(this: &Rc<Self>, dedicated: bool) {
        let wrapper = this.els.borrow().wrapper;
        let target = if dedicated {
            let button = scaffold::create_unmute_button(&*this.dom, wrapper);
            this.els.borrow_mut().unmute_button = Some(button);
            button
        } else {
            wrapper
        };

        let weak = Rc::downgrade(this);
        let listener: Listener = Rc::new(move |ev: &mut DomEvent| {
            if let Some(inner) = weak.upgrade() {
                Inner::on_unlock_gesture(&inner, ev);
            }
        });
        let touch = this.dom.add_listener(
            target,
            EventKind::TouchStart,
            ListenerOptions { capture: false },
            listener.clone(),
        );
        let click = this
            .dom
            .add_listener(target, EventKind::Click, ListenerOptions { capture: true }, listener);
        *this.unlock_binding.borrow_mut() = Some(UnlockBinding {
            target,
            listeners: vec![touch, click],
        });
    }

    fn on_unlock_gesture(this: &Rc<Self>, ev: &mut DomEvent) {
        if this.destroyed.get() {
            return;
        }
        if this.els.borrow().unmute_button.is_some() {
            ev.prevent_default();
            ev.stop_propagation();
        }

        let requested = this.unlock.borrow_mut().on_gesture();
        if !requested {
            return;
        }
        let Some(audio) = this.player().and_then(|p| p.audio_out()) else {
            this.unlock.borrow_mut().on_request_dropped();
            return;
        };
        tracing::debug!(session = this.session_id, "audio unlock requested");
        let weak = Rc::downgrade(this);
        audio.unlock(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_audio_unlocked();
            }
        }));
    }

    fn on_audio_unlocked(&self) {
        let first = self.unlock.borrow_mut().on_unlocked();
        if !first {
            return;
        }
        if let Some(button) = self.els.borrow().unmute_button {
            scaffold::hide(&*self.dom, button);
        }
        self.detach_unlock_listeners();
        tracing::debug!(session = self.session_id, "audio unlocked");
    }

    fn sync_external_unlock(&self) {
        if self.destroyed.get() || self.unlock.borrow().is_unlocked() {
            return;
        }
        let unlocked = self
            .player()
            .and_then(|p| p.audio_out())
            .is_some_and(|audio| audio.is_unlocked());
        if unlocked {
            self.on_audio_unlocked();
        }
    }

    fn detach_unlock_listeners(&self) {
        let binding = self.unlock_binding.borrow_mut().take();
        if let Some(binding) = binding {
            for id in binding.listeners {
                self.dom.remove_listener(binding.target, id);
            }
        }
    }
}
