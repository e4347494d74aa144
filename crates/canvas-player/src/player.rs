//! Player/decoder contract consumed by the coordinator.
//!
//! Implementations receive [`PlayerHooks`] at construction and call them as
//! playback changes. Hooks may re-enter the player (the `load` hook calls
//! `play()` for autoplay), so implementations must not hold internal borrows
//! while a hook runs.

use std::rc::Rc;

use canvas_player_types::{FrameSize, PlayerOptions};

use crate::error::PlayerError;
use crate::source::SourceCallbacks;

pub type Hook = Rc<dyn Fn()>;

/// Lifecycle notifications a player emits.
#[derive(Clone)]
pub struct PlayerHooks {
    pub play: Hook,
    pub pause: Hook,
    pub stop: Hook,
    /// The media is ready to play.
    pub load: Hook,
}

impl Default for PlayerHooks {
    fn default() -> Self {
        let noop: Hook = Rc::new(|| {});
        Self {
            play: noop.clone(),
            pause: noop.clone(),
            stop: noop.clone(),
            load: noop,
        }
    }
}

/// Everything a factory needs to build one player.
pub struct PlayerInit {
    pub url: String,
    pub options: PlayerOptions,
    pub hooks: PlayerHooks,
    /// Callbacks to install on the source the player creates.
    pub source: SourceCallbacks,
}

/// Rendering surface description.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VideoSurface {
    /// Natural size of the decoded frames once known.
    pub destination: Option<FrameSize>,
}

/// Audio sink that may require a user gesture before it can play.
pub trait AudioOutput {
    fn is_unlocked(&self) -> bool;
    /// Ask for playback permission; `on_unlocked` runs once it is granted.
    fn unlock(&self, on_unlocked: Box<dyn FnOnce()>);
}

pub trait Player {
    fn play(&self);
    fn pause(&self);
    fn stop(&self);
    /// Release decoder and network resources.
    fn destroy(&self);
    fn is_playing(&self) -> bool;
    fn is_streaming(&self) -> bool;
    fn video(&self) -> Option<VideoSurface>;
    fn audio_out(&self) -> Option<Rc<dyn AudioOutput>>;
}

pub trait PlayerFactory {
    fn create(&self, init: PlayerInit) -> Result<Rc<dyn Player>, PlayerError>;
}
