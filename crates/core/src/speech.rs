//! Speech synthesis contracts and playback settings.
//!
//! The synthesis engine is external; the core consumes it through two
//! narrow traits. [`SpeechEngine`] constructs a live [`Speech`] handle for
//! one page's texts; the handle coordinates actual audio playback of those
//! segments. At most one handle exists per session at any time.
//!
//! Completion is a single terminal event per handle: the engine fires the
//! `on_end` sender exactly once, with `Ok(())` on natural completion or an
//! error on an engine fault. An explicit [`Speech::stop`] drops the sender
//! unfired — a stopped handle is not a finished one, and the orchestrator
//! must not advance because of it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::{RecitoError, Result};

/// Playback state as reported to the host UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackState {
    Stopped,
    Loading,
    Playing,
    Paused,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PlaybackState::Stopped => "STOPPED",
            PlaybackState::Loading => "LOADING",
            PlaybackState::Playing => "PLAYING",
            PlaybackState::Paused => "PAUSED",
        };
        f.write_str(name)
    }
}

/// Default prosody values used when settings leave a field unset.
pub mod defaults {
    pub const RATE: f32 = 1.0;
    pub const PITCH: f32 = 1.0;
    pub const VOLUME: f32 = 1.0;
}

/// User settings, external and read-only to the core. Unset fields fall
/// back to [`defaults`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub rate: Option<f32>,
    #[serde(default)]
    pub pitch: Option<f32>,
    #[serde(default)]
    pub volume: Option<f32>,
    #[serde(default)]
    pub voice_name: Option<String>,
}

/// Options a speech handle is constructed with.
#[derive(Debug, Clone)]
pub struct SpeechOptions {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    /// Language the texts will be spoken in.
    pub lang: Option<String>,
    /// Resolved voice name, if any; the engine keeps its default otherwise.
    pub voice_name: Option<String>,
}

impl SpeechOptions {
    /// Merges user settings over the defaults table. Language and voice are
    /// resolved later, by the session.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            rate: settings.rate.unwrap_or(defaults::RATE),
            pitch: settings.pitch.unwrap_or(defaults::PITCH),
            volume: settings.volume.unwrap_or(defaults::VOLUME),
            lang: None,
            voice_name: None,
        }
    }
}

/// Terminal outcome of one speech handle: natural completion or an engine
/// fault.
pub type SpeechOutcome = Result<()>;

/// A live speech handle coordinating audio playback of one page's segments.
///
/// `forward`/`rewind` seek within the page and fail with
/// [`RecitoError::CannotSeek`] at segment boundaries so the caller can fall
/// back to a page-level jump.
#[async_trait]
pub trait Speech: Send {
    async fn play(&mut self) -> Result<()>;
    async fn pause(&mut self) -> Result<()>;
    /// Stops playback and drops the terminal event sender unfired.
    async fn stop(&mut self) -> Result<()>;
    async fn forward(&mut self) -> Result<()>;
    async fn rewind(&mut self) -> Result<()>;
    /// Positions playback at the last segment without starting it.
    async fn goto_end(&mut self) -> Result<()>;
    async fn state(&self) -> PlaybackState;
}

/// Constructs speech handles. Implemented by the host's synthesis adapter.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Builds a handle for `texts`. The engine must send on `on_end`
    /// exactly once — when playback finishes naturally or faults — and
    /// drop it unfired when the handle is explicitly stopped.
    async fn create(
        &self, texts: Vec<String>, options: SpeechOptions, on_end: oneshot::Sender<SpeechOutcome>,
    ) -> Result<Box<dyn Speech>>;
}

/// Supplies the external user settings.
#[async_trait]
pub trait SettingsSource: Send + Sync {
    async fn get_settings(&self) -> Result<Settings>;
}

/// Settings source that always returns defaults.
pub struct DefaultSettings;

#[async_trait]
impl SettingsSource for DefaultSettings {
    async fn get_settings(&self) -> Result<Settings> {
        Ok(Settings::default())
    }
}

/// Voice catalog with no voices.
pub struct EmptyCatalog;

#[async_trait]
impl crate::voice::VoiceCatalog for EmptyCatalog {
    async fn get_voices(&self) -> Result<Vec<crate::voice::Voice>> {
        Ok(Vec::new())
    }
}

impl PlaybackState {
    /// Parses the engine's state string ("PLAYING", "PAUSED", ...).
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "STOPPED" => Ok(PlaybackState::Stopped),
            "LOADING" => Ok(PlaybackState::Loading),
            "PLAYING" => Ok(PlaybackState::Playing),
            "PAUSED" => Ok(PlaybackState::Paused),
            other => Err(RecitoError::Speech(format!("unknown playback state: {other}"))),
        }
    }
}
