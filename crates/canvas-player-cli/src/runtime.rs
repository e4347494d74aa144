//! CLI runtime helpers.
//!
//! Owns the event loop: pumps the transport, runs scheduler turns and watches
//! the Ctrl-C flag between iterations.

use std::cell::RefCell;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use canvas_player::config::PlayerConfig;
use canvas_player::dom::MemoryDom;
use canvas_player::headless::HeadlessPlayerFactory;
use canvas_player::http_transport::{HttpTransport, HttpTransportConfig};
use canvas_player::scheduler::Scheduler;
use canvas_player::transport::{MemoryResponse, MemoryTransport};
use canvas_player::{
    Coordinator, Destination, Environment, LifecycleHooks, SessionCallbacks, Source,
    SourceCallbacks, SourceOptions, Transport,
};
use canvas_player_types::{AcquisitionState, Rect};

const PUMP_INTERVAL: Duration = Duration::from_millis(50);
const WRAPPER_ID: &str = "player";

/// Set a shared flag on Ctrl-C instead of exiting, so sessions can be torn down.
pub fn install_interrupt_flag() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = flag.clone();
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::Relaxed);
    })
    .context("install ctrl-c handler")?;
    Ok(flag)
}

/// Writes the acquired payload to a file or stdout.
struct FileDestination {
    path: Option<PathBuf>,
    written: usize,
    error: Option<std::io::Error>,
}

impl FileDestination {
    fn new(path: Option<&Path>) -> Self {
        Self {
            path: path.map(Path::to_path_buf),
            written: 0,
            error: None,
        }
    }
}

impl Destination for FileDestination {
    fn write(&mut self, bytes: Vec<u8>) {
        let result = match &self.path {
            Some(path) => std::fs::write(path, &bytes),
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(&bytes).and_then(|_| stdout.flush())
            }
        };
        match result {
            Ok(()) => self.written = bytes.len(),
            Err(e) => self.error = Some(e),
        }
    }
}

/// Fetch `url` over HTTP into `out` (stdout when `None`).
pub fn run_fetch(
    url: &str,
    out: Option<&Path>,
    http: HttpTransportConfig,
    interrupted: Arc<AtomicBool>,
) -> Result<()> {
    let transport = Rc::new(HttpTransport::new(http));
    let destination = Rc::new(RefCell::new(FileDestination::new(out)));

    let progress_url = url.to_string();
    let callbacks = SourceCallbacks {
        on_progress: Some(Box::new(move |source: &Source, fraction: f64| {
            tracing::info!(
                url = %progress_url,
                received = source.bytes_received(),
                percent = (fraction * 100.0).round() as u32,
                "progress"
            );
        })),
        ..SourceCallbacks::default()
    };
    let source = Source::new(url, SourceOptions::default(), transport.clone(), callbacks);
    source.connect(&destination)?;
    source.start()?;

    while !source.state().is_settled() {
        if interrupted.load(Ordering::Relaxed) {
            source.destroy();
            bail!("fetch {url}: interrupted");
        }
        transport.pump_timeout(PUMP_INTERVAL);
    }

    match source.state() {
        AcquisitionState::Established => {
            let dest = destination.borrow();
            if let Some(e) = &dest.error {
                bail!("write payload: {e}");
            }
            tracing::info!(url, bytes = dest.written, out = ?out, "fetch complete");
            Ok(())
        }
        AcquisitionState::Failed { reason } => bail!("fetch {url}: {reason}"),
        other => bail!("fetch {url}: ended in state {other:?}"),
    }
}

/// Options for [`run_simulate`] after config and flags are merged.
pub struct SimulateConfig {
    pub url: String,
    pub file: Option<PathBuf>,
    pub clicks: u32,
    pub touch: bool,
    pub config: PlayerConfig,
}

enum Backend {
    Memory(Rc<MemoryTransport>),
    Http(Rc<HttpTransport>),
}

impl Backend {
    fn transport(&self) -> Rc<dyn Transport> {
        match self {
            Backend::Memory(t) => t.clone() as Rc<dyn Transport>,
            Backend::Http(t) => t.clone() as Rc<dyn Transport>,
        }
    }

    fn pump(&self) -> usize {
        match self {
            Backend::Memory(t) => t.flush(),
            Backend::Http(t) => t.pump_timeout(PUMP_INTERVAL),
        }
    }
}

/// Run a full session against an in-memory document and print the final
/// lifecycle snapshot as JSON.
pub fn run_simulate(sim: SimulateConfig, interrupted: Arc<AtomicBool>) -> Result<()> {
    let SimulateConfig {
        url,
        file,
        clicks,
        touch,
        config,
    } = sim;

    let backend = match &file {
        Some(path) => {
            let body = std::fs::read(path).with_context(|| format!("read media file {:?}", path))?;
            let transport = Rc::new(MemoryTransport::new());
            transport.route(url.clone(), MemoryResponse::ok(body));
            Backend::Memory(transport)
        }
        None => Backend::Http(Rc::new(HttpTransport::new(config.http.clone()))),
    };
    let deadline = Instant::now() + config.http.timeout + Duration::from_secs(1);

    let dom = Rc::new(MemoryDom::new());
    let wrapper = dom.create_with_id(dom.body(), "div", WRAPPER_ID);
    dom.set_rect(
        wrapper,
        Rect {
            x: 0.0,
            y: 0.0,
            width: 640.0,
            height: 360.0,
        },
    );
    let scheduler = Scheduler::new();
    let env = Environment {
        dom: dom.clone(),
        scheduler: scheduler.clone(),
        factory: Rc::new(HeadlessPlayerFactory::new(
            backend.transport(),
            scheduler.clone(),
            config.headless.clone(),
        )),
    };

    let hooks = LifecycleHooks::default()
        .on_play(|| tracing::info!("play"))
        .on_pause(|| tracing::info!("pause"))
        .on_stop(|| tracing::info!("stop"))
        .on_load(|| tracing::info!("load"))
        .on_destroy(|| tracing::info!("destroy"))
        .on_error(|e| tracing::warn!(error = %e, "acquisition error"));
    let coordinator = Coordinator::new(
        &env,
        format!("#{WRAPPER_ID}"),
        &url,
        config.player.clone(),
        SessionCallbacks {
            hooks,
            ..SessionCallbacks::default()
        },
    )?;

    while !coordinator.lifecycle().acquisition.is_settled() {
        if interrupted.load(Ordering::Relaxed) {
            coordinator.destroy();
            bail!("simulate {url}: interrupted");
        }
        if Instant::now() > deadline {
            coordinator.destroy();
            bail!("simulate {url}: no response within {:?}", config.http.timeout);
        }
        backend.pump();
        scheduler.run_until_idle();
    }
    scheduler.run_until_idle();

    if touch {
        let trigger = coordinator.elements().unmute_button.unwrap_or(wrapper);
        dom.touch_start(trigger);
        scheduler.run_until_idle();
    }
    for _ in 0..clicks {
        dom.click(wrapper);
        scheduler.run_until_idle();
    }

    let state = coordinator.lifecycle();
    let json = serde_json::to_string_pretty(&state).context("serialize lifecycle state")?;
    println!("{json}");
    coordinator.destroy();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_destination_writes_payload() {
        let path = std::env::temp_dir()
            .join(format!("canvas-player-test-{}.bin", std::process::id()));
        let mut dest = FileDestination::new(Some(&path));
        dest.write(vec![1, 2, 3]);
        assert!(dest.error.is_none());
        assert_eq!(dest.written, 3);
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn file_destination_records_io_error() {
        let mut dest = FileDestination::new(Some(Path::new("/nonexistent-dir/out.bin")));
        dest.write(vec![1]);
        assert!(dest.error.is_some());
        assert_eq!(dest.written, 0);
    }
}
