//! Canvas player shell: media acquisition plus lifecycle coordination.
//!
//! A [`Coordinator`] binds a wrapper element to a [`Player`], builds the
//! overlay scaffold, and keeps play button, poster and unmute button in step
//! with playback. Media bytes are fetched by a [`Source`] over an injected
//! [`Transport`] and handed to a [`Destination`] once complete.

pub mod button_view;
pub mod config;
pub mod coordinator;
pub mod dom;
pub mod error;
pub mod headless;
pub mod http_transport;
pub mod player;
pub mod scaffold;
pub mod scheduler;
pub mod source;
pub mod transport;
pub mod unlock;

pub use coordinator::{Coordinator, Elements, Environment, LifecycleHooks, SessionCallbacks};
pub use error::{AcquisitionError, PlayerError, SourceError};
pub use player::{AudioOutput, Player, PlayerFactory, PlayerHooks, PlayerInit};
pub use source::{Destination, Source, SourceCallbacks, SourceOptions};
pub use transport::Transport;
