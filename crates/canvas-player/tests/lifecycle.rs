use std::cell::{Cell, RefCell};
use std::rc::Rc;

use canvas_player::dom::{Dom, EventKind, MemoryDom};
use canvas_player::headless::{HeadlessConfig, HeadlessPlayerFactory};
use canvas_player::scheduler::Scheduler;
use canvas_player::transport::{MemoryResponse, MemoryTransport, TransportEvent};
use canvas_player::{
    AcquisitionError, Coordinator, Environment, LifecycleHooks, Player, PlayerError,
    PlayerFactory, PlayerInit, SessionCallbacks, Source, SourceCallbacks,
};
use canvas_player_types::{AcquisitionState, CanvasTarget, ElementId, FrameSize, PlayerOptions};

const URL: &str = "http://media.local/clip.ts";

struct Rig {
    dom: Rc<MemoryDom>,
    transport: Rc<MemoryTransport>,
    scheduler: Scheduler,
    factory: Rc<HeadlessPlayerFactory>,
    wrapper: ElementId,
}

impl Rig {
    fn new(config: HeadlessConfig) -> Self {
        let dom = Rc::new(MemoryDom::new());
        let wrapper = dom.create_with_id(dom.body(), "div", "video");
        let transport = Rc::new(MemoryTransport::new());
        transport.route(URL, MemoryResponse::ok(vec![0x47; 188 * 4]));
        let scheduler = Scheduler::new();
        let factory = Rc::new(HeadlessPlayerFactory::new(
            transport.clone(),
            scheduler.clone(),
            config,
        ));
        Self {
            dom,
            transport,
            scheduler,
            factory,
            wrapper,
        }
    }

    fn env(&self) -> Environment {
        Environment {
            dom: self.dom.clone(),
            scheduler: self.scheduler.clone(),
            factory: self.factory.clone(),
        }
    }

    fn mount(&self, options: PlayerOptions) -> Coordinator {
        self.mount_with(options, SessionCallbacks::default())
    }

    fn mount_with(&self, options: PlayerOptions, callbacks: SessionCallbacks) -> Coordinator {
        Coordinator::new(&self.env(), "#video", URL, options, callbacks).unwrap()
    }

    /// Deliver every network event and run every deferred task.
    fn settle(&self) {
        self.transport.flush();
        self.scheduler.run_until_idle();
    }
}

#[test]
fn autoplay_suppresses_poster_and_hides_play_button() {
    let rig = Rig::new(HeadlessConfig::default());
    let c = rig.mount(PlayerOptions {
        autoplay: true,
        streaming: false,
        poster: Some("p.jpg".to_string()),
        ..PlayerOptions::default()
    });

    let els = c.elements();
    assert!(els.poster.is_none());
    let state = c.lifecycle();
    assert!(!state.play_button_visible);
    assert!(!state.poster_visible);
    assert!(state.unlock_button_visible);
    assert!(!state.is_playing);

    rig.settle();
    let state = c.lifecycle();
    assert!(state.is_playing);
    assert_eq!(state.acquisition, AcquisitionState::Established);
}

#[test]
fn wrapper_click_toggles_playback_and_play_button() {
    let rig = Rig::new(HeadlessConfig::default());
    let c = rig.mount(PlayerOptions {
        autoplay: false,
        control: true,
        pic_mode: false,
        ..PlayerOptions::default()
    });
    rig.settle();
    assert!(c.elements().play_button.is_some());
    assert!(c.lifecycle().play_button_visible);

    rig.dom.click(rig.wrapper);
    assert!(c.is_playing());
    assert!(!c.lifecycle().play_button_visible);

    rig.dom.click(rig.wrapper);
    assert!(!c.is_playing());
    assert!(c.lifecycle().play_button_visible);

    // The first click doubled as the audio unlock gesture.
    rig.scheduler.run_until_idle();
    assert!(c.lifecycle().audio_unlocked);
}

#[test]
fn poster_hides_on_play_and_returns_on_each_stop() {
    let rig = Rig::new(HeadlessConfig {
        audio: false,
        ..HeadlessConfig::default()
    });
    let c = rig.mount(PlayerOptions {
        poster: Some("p.jpg".to_string()),
        ..PlayerOptions::default()
    });
    rig.settle();
    let poster = c.elements().poster.unwrap();
    assert_eq!(rig.dom.attribute(poster, "src").as_deref(), Some("p.jpg"));
    assert!(c.lifecycle().poster_visible);

    c.play();
    assert!(!c.lifecycle().poster_visible);
    c.pause();
    assert!(!c.lifecycle().poster_visible, "pause keeps the poster hidden");
    c.play();
    c.stop();
    assert!(c.lifecycle().poster_visible);
    assert!(c.lifecycle().play_button_visible);
    c.play();
    assert!(!c.lifecycle().poster_visible);
}

#[test]
fn clicks_are_ignored_without_controls() {
    let rig = Rig::new(HeadlessConfig::default());
    let c = rig.mount(PlayerOptions {
        control: false,
        ..PlayerOptions::default()
    });
    rig.settle();
    for _ in 0..3 {
        rig.dom.click(rig.wrapper);
        rig.scheduler.run_until_idle();
        assert!(!c.is_playing());
    }
    assert!(!c.lifecycle().need_play_button);
}

#[test]
fn audio_unlock_requested_once_across_gestures() {
    let rig = Rig::new(HeadlessConfig::default());
    let c = rig.mount(PlayerOptions {
        autoplay: true,
        ..PlayerOptions::default()
    });
    rig.settle();
    let button = c.elements().unmute_button.unwrap();
    let audio = rig.factory.last_player().unwrap().audio().unwrap();

    // Both gestures land before the unlock completes.
    rig.dom.touch_start(button);
    rig.dom.touch_start(button);
    assert_eq!(audio.requests(), 1);
    assert!(!c.lifecycle().audio_unlocked);

    rig.scheduler.run_turn();
    let state = c.lifecycle();
    assert!(state.audio_unlocked);
    assert!(!state.unlock_button_visible);
    assert_eq!(rig.dom.listener_count(button, EventKind::TouchStart), 0);
    assert_eq!(rig.dom.listener_count(button, EventKind::Click), 0);

    rig.dom.touch_start(button);
    rig.dom.click(button);
    rig.scheduler.run_until_idle();
    assert_eq!(audio.requests(), 1);
    assert!(c.lifecycle().audio_unlocked);
}

#[test]
fn destroy_mid_acquisition_prevents_write() {
    let rig = Rig::new(HeadlessConfig::default());
    let c = rig.mount(PlayerOptions::default());
    assert!(rig.transport.step());
    c.destroy();

    rig.transport.inject(
        0,
        TransportEvent::Response {
            status: 200,
            body: vec![1, 2, 3],
        },
    );
    rig.settle();

    let player = rig.factory.last_player().unwrap();
    assert_eq!(player.buffer_writes(), 0);
    assert!(!player.is_loaded());
    assert_eq!(player.source().map(|s| s.state()), None);
    assert_eq!(rig.transport.open_requests(), 0);
}

#[test]
fn standalone_source_destroy_reports_aborted() {
    let transport = Rc::new(MemoryTransport::new());
    transport.route(URL, MemoryResponse::ok(vec![9; 16]));
    let buffer = Rc::new(RefCell::new(Vec::<u8>::new()));
    struct Collect(Rc<RefCell<Vec<u8>>>);
    impl canvas_player::Destination for Collect {
        fn write(&mut self, bytes: Vec<u8>) {
            self.0.borrow_mut().extend(bytes);
        }
    }
    let dest = Rc::new(RefCell::new(Collect(buffer.clone())));
    let source = Source::new(
        URL,
        Default::default(),
        transport.clone(),
        SourceCallbacks::default(),
    );
    source.connect(&dest).unwrap();
    source.start().unwrap();
    transport.step();
    source.destroy();
    transport.flush();
    assert_eq!(source.state(), AcquisitionState::Aborted);
    assert!(buffer.borrow().is_empty());
}

#[test]
fn acquisition_failure_reaches_error_hook_then_callback() {
    let rig = Rig::new(HeadlessConfig::default());
    rig.transport.route(URL, MemoryResponse::status(404));
    let log = Rc::new(RefCell::new(Vec::new()));
    let (hook_log, cb_log) = (log.clone(), log.clone());
    let c = rig.mount_with(
        PlayerOptions {
            autoplay: true,
            ..PlayerOptions::default()
        },
        SessionCallbacks {
            hooks: LifecycleHooks::default()
                .on_error(move |e| hook_log.borrow_mut().push(format!("error: {e}"))),
            source: SourceCallbacks {
                on_failed: Some(Box::new(move |_src: &Source, e: &AcquisitionError| {
                    cb_log.borrow_mut().push(format!("failed: {e}"))
                })),
                ..SourceCallbacks::default()
            },
        },
    );
    rig.settle();

    assert_eq!(
        *log.borrow(),
        vec!["error: http status 404".to_string(), "failed: http status 404".to_string()]
    );
    let state = c.lifecycle();
    assert_eq!(
        state.acquisition,
        AcquisitionState::Failed {
            reason: "http status 404".to_string()
        }
    );
    assert!(!state.is_playing);
    assert!(state.play_button_visible);
}

#[test]
fn progress_is_tracked_in_lifecycle() {
    let rig = Rig::new(HeadlessConfig::default());
    let mut response = MemoryResponse::ok(vec![0; 400]);
    response.progress_steps = 4;
    rig.transport.route(URL, response);
    let fractions = Rc::new(RefCell::new(Vec::new()));
    let seen = fractions.clone();
    let c = rig.mount_with(
        PlayerOptions::default(),
        SessionCallbacks {
            source: SourceCallbacks {
                on_progress: Some(Box::new(move |_src: &Source, f: f64| seen.borrow_mut().push(f))),
                ..SourceCallbacks::default()
            },
            ..SessionCallbacks::default()
        },
    );
    assert_eq!(c.lifecycle().acquisition, AcquisitionState::Pending);
    rig.transport.step();
    assert_eq!(c.lifecycle().acquisition, AcquisitionState::Progress { fraction: 0.25 });
    rig.settle();
    assert_eq!(*fractions.borrow(), vec![0.25, 0.5, 0.75, 1.0]);
    assert_eq!(c.lifecycle().acquisition, AcquisitionState::Established);
}

#[test]
fn wrapper_resize_waits_for_the_turn_after_load() {
    let rig = Rig::new(HeadlessConfig {
        frame_size: Some(FrameSize {
            width: 480,
            height: 270,
        }),
        ..HeadlessConfig::default()
    });
    let loads = Rc::new(Cell::new(0));
    let l = loads.clone();
    let _c = rig.mount_with(
        PlayerOptions {
            auto_set_wrapper_size: true,
            ..PlayerOptions::default()
        },
        SessionCallbacks {
            hooks: LifecycleHooks::default().on_load(move || l.set(l.get() + 1)),
            ..SessionCallbacks::default()
        },
    );
    rig.transport.flush();
    assert_eq!(loads.get(), 0);

    rig.scheduler.run_turn();
    assert_eq!(loads.get(), 1);
    assert_eq!(rig.dom.style(rig.wrapper, "width"), None);

    rig.scheduler.run_turn();
    assert_eq!(rig.dom.style(rig.wrapper, "width").as_deref(), Some("480px"));
    assert_eq!(rig.dom.style(rig.wrapper, "height").as_deref(), Some("270px"));
}

#[test]
fn streaming_session_uses_dedicated_unmute_button() {
    let rig = Rig::new(HeadlessConfig::default());
    let c = rig.mount(PlayerOptions {
        streaming: true,
        poster: Some("p.jpg".to_string()),
        ..PlayerOptions::default()
    });
    let els = c.elements();
    assert!(els.poster.is_none());
    assert!(els.unmute_button.is_some());
    assert!(!c.lifecycle().play_button_visible);
    // No click-to-toggle; the unlock listeners sit on the unmute button.
    assert_eq!(rig.dom.listener_count(rig.wrapper, EventKind::Click), 0);
}

#[test]
fn destroy_releases_wrapper_for_a_new_session() {
    let rig = Rig::new(HeadlessConfig::default());
    let destroyed = Rc::new(Cell::new(0));
    let d = destroyed.clone();
    let first = rig.mount_with(
        PlayerOptions::default(),
        SessionCallbacks {
            hooks: LifecycleHooks::default().on_destroy(move || d.set(d.get() + 1)),
            ..SessionCallbacks::default()
        },
    );

    let busy = Coordinator::new(
        &rig.env(),
        "#video",
        URL,
        PlayerOptions::default(),
        SessionCallbacks::default(),
    );
    assert!(matches!(busy, Err(PlayerError::WrapperInUse(_))));

    first.destroy();
    first.destroy();
    assert_eq!(destroyed.get(), 1);
    assert!(rig.dom.children(rig.wrapper).is_empty());
    assert_eq!(rig.dom.session(rig.wrapper), None);

    let second = rig.mount(PlayerOptions::default());
    assert_ne!(second.session_id(), first.session_id());
    rig.settle();
    assert_eq!(second.lifecycle().acquisition, AcquisitionState::Established);
}

#[test]
fn failure_while_playing_keeps_play_button_hidden() {
    let rig = Rig::new(HeadlessConfig::default());
    rig.transport.route(URL, MemoryResponse::status(404));
    let c = rig.mount(PlayerOptions::default());
    c.play();
    rig.settle();

    let state = c.lifecycle();
    assert!(matches!(state.acquisition, AcquisitionState::Failed { .. }));
    assert!(state.is_playing);
    assert!(!state.play_button_visible);
}

#[test]
fn failure_on_streaming_session_keeps_play_button_hidden() {
    let rig = Rig::new(HeadlessConfig::default());
    rig.transport.route(URL, MemoryResponse::status(503));
    let errors = Rc::new(Cell::new(0));
    let e = errors.clone();
    let c = rig.mount_with(
        PlayerOptions {
            streaming: true,
            ..PlayerOptions::default()
        },
        SessionCallbacks {
            hooks: LifecycleHooks::default().on_error(move |_| e.set(e.get() + 1)),
            ..SessionCallbacks::default()
        },
    );
    rig.settle();

    assert_eq!(errors.get(), 1);
    assert!(!c.lifecycle().play_button_visible);
}

struct BrokenFactory;

impl PlayerFactory for BrokenFactory {
    fn create(&self, _init: PlayerInit) -> Result<Rc<dyn Player>, PlayerError> {
        Err(PlayerError::Backend(anyhow::anyhow!("decoder unavailable")))
    }
}

#[test]
fn failed_player_construction_leaves_wrapper_untouched() {
    let rig = Rig::new(HeadlessConfig::default());
    let env = Environment {
        factory: Rc::new(BrokenFactory),
        ..rig.env()
    };
    for _ in 0..2 {
        let err = Coordinator::new(
            &env,
            "#video",
            URL,
            PlayerOptions::default(),
            SessionCallbacks::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, PlayerError::Backend(_)));
        assert!(err.to_string().contains("decoder unavailable"));
    }
    assert!(rig.dom.children(rig.wrapper).is_empty());
    assert_eq!(rig.dom.session(rig.wrapper), None);

    // An explicit canvas belongs to the caller and stays in place.
    let canvas = rig.dom.create_with_id(rig.wrapper, "canvas", "screen");
    let err = Coordinator::new(
        &env,
        "#video",
        URL,
        PlayerOptions {
            canvas: Some(CanvasTarget::Selector("#screen".to_string())),
            ..PlayerOptions::default()
        },
        SessionCallbacks::default(),
    );
    assert!(err.is_err());
    assert_eq!(rig.dom.children(rig.wrapper), vec![canvas]);

    let c = rig.mount(PlayerOptions::default());
    assert_eq!(rig.dom.session(rig.wrapper), Some(c.session_id()));
}
