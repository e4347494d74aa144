use serde::{Deserialize, Serialize};

/// Opaque handle to an element owned by a DOM environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

/// Where the rendering surface comes from when one is supplied explicitly.
///
/// `None` in [`PlayerOptions::canvas`] means "create a canvas inside the wrapper".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CanvasTarget {
    /// Resolve an existing element by selector.
    Selector(String),
    /// Reuse an element the caller already holds.
    Element(ElementId),
}

/// Width/height pair in CSS pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

/// Element bounding box snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Playback options accepted by the coordinator and forwarded to the player.
///
/// Field defaults mirror the widget defaults: controls on, first frame decoded
/// eagerly, progressive loading in 1 MiB chunks, everything else off.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerOptions {
    /// Explicit rendering surface; a canvas is created when absent.
    pub canvas: Option<CanvasTarget>,
    /// Poster image URL shown until playback starts.
    pub poster: Option<String>,
    /// Start playing as soon as the player reports `load`.
    pub autoplay: bool,
    /// Resize the wrapper to the decoded frame size after `load`.
    pub auto_set_wrapper_size: bool,
    /// Loop playback at the end of the media.
    #[serde(rename = "loop")]
    pub loop_playback: bool,
    /// Enable click-to-toggle and the manual play button.
    pub control: bool,
    /// Decode and render the first frame before playback starts.
    pub decode_first_frame: bool,
    /// Minimal picture mode: no play button overlay.
    pub pic_mode: bool,
    /// Load the resource in chunks rather than one request.
    pub progressive: bool,
    /// Chunk size in bytes for progressive loading.
    pub chunk_size: usize,
    /// The resource is a live/unbounded stream.
    pub streaming: bool,
    /// Decode the audio track.
    pub audio: bool,
    /// Decode the video track.
    pub video: bool,
    /// Maximum tolerated audio lag in seconds before resync.
    pub max_audio_lag: Option<f64>,
    /// Video elementary stream buffer in bytes.
    pub video_buffer_size: Option<usize>,
    /// Audio elementary stream buffer in bytes.
    pub audio_buffer_size: Option<usize>,
    /// Pause automatically when the page is hidden.
    pub pause_when_hidden: bool,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            canvas: None,
            poster: None,
            autoplay: false,
            auto_set_wrapper_size: false,
            loop_playback: false,
            control: true,
            decode_first_frame: true,
            pic_mode: false,
            progressive: true,
            chunk_size: 1024 * 1024,
            streaming: false,
            audio: true,
            video: true,
            max_audio_lag: None,
            video_buffer_size: None,
            audio_buffer_size: None,
            pause_when_hidden: true,
        }
    }
}

impl PlayerOptions {
    /// Whether the manual play button overlay is wanted.
    pub fn need_play_button(&self) -> bool {
        self.control && !self.pic_mode
    }

    /// Whether a poster URL is present and non-empty.
    pub fn has_poster(&self) -> bool {
        self.poster.as_deref().is_some_and(|p| !p.trim().is_empty())
    }
}

/// Observable outcome of one media acquisition.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AcquisitionState {
    /// Not started, or started without any measurable progress yet.
    #[default]
    Pending,
    /// Bytes are arriving; `fraction` is received/total.
    Progress { fraction: f64 },
    /// The full payload was received.
    Established,
    /// The request failed or returned a non-success status.
    Failed { reason: String },
    /// The acquisition was cancelled before it settled.
    Aborted,
}

impl AcquisitionState {
    /// `true` once no further acquisition events can change the state.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Established | Self::Failed { .. } | Self::Aborted)
    }
}

/// Snapshot of the coordinator's on-screen and playback state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LifecycleState {
    /// Playback is currently active.
    pub is_playing: bool,
    /// A manual play affordance was requested (controls on, not picture mode).
    pub need_play_button: bool,
    /// Audio output has been unlocked by a user gesture (or never needed one).
    pub audio_unlocked: bool,
    /// The poster overlay exists and is visible.
    pub poster_visible: bool,
    /// The play button overlay exists and is visible.
    pub play_button_visible: bool,
    /// The dedicated unmute button exists and is visible.
    pub unlock_button_visible: bool,
    /// Latest acquisition outcome reported by the source.
    pub acquisition: AcquisitionState,
    /// The session has been torn down.
    pub destroyed: bool,
}
