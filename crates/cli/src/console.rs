//! Console adapters for the playback session.
//!
//! "Speaking" on a terminal means printing: the engine here builds handles
//! that write their segments to stdout and complete immediately. It keeps
//! the full session pipeline honest (settings, voice resolution, language,
//! page sequencing) without an audio backend.

use std::path::Path;

use async_trait::async_trait;
use owo_colors::OwoColorize;
use recito_core::{
    PlaybackState, RecitoError, Result, Settings, SettingsSource, Speech, SpeechEngine, SpeechOptions, SpeechOutcome,
    Voice, VoiceCatalog,
};
use tokio::sync::oneshot;

/// Speech engine that prints segments instead of synthesizing audio.
pub struct ConsoleEngine {
    pub verbose: bool,
}

#[async_trait]
impl SpeechEngine for ConsoleEngine {
    async fn create(
        &self, texts: Vec<String>, options: SpeechOptions, on_end: oneshot::Sender<SpeechOutcome>,
    ) -> Result<Box<dyn Speech>> {
        if self.verbose {
            eprintln!(
                "  {} {}",
                "Voice:".dimmed(),
                options.voice_name.as_deref().unwrap_or("(engine default)").bright_white()
            );
            eprintln!(
                "  {} {}",
                "Language:".dimmed(),
                options.lang.as_deref().unwrap_or("(unspecified)").bright_white()
            );
            eprintln!(
                "  {} {}",
                "Prosody:".dimmed(),
                format!("rate {} pitch {} volume {}", options.rate, options.pitch, options.volume).bright_white()
            );
        }
        Ok(Box::new(ConsoleSpeech { texts, pos: 0, state: PlaybackState::Stopped, on_end: Some(on_end) }))
    }
}

/// One page's worth of printable segments.
pub struct ConsoleSpeech {
    texts: Vec<String>,
    pos: usize,
    state: PlaybackState,
    on_end: Option<oneshot::Sender<SpeechOutcome>>,
}

#[async_trait]
impl Speech for ConsoleSpeech {
    async fn play(&mut self) -> Result<()> {
        self.state = PlaybackState::Playing;
        while self.pos < self.texts.len() {
            println!("{}", self.texts[self.pos]);
            println!();
            self.pos += 1;
        }
        self.state = PlaybackState::Stopped;
        if let Some(tx) = self.on_end.take() {
            let _ = tx.send(Ok(()));
        }
        Ok(())
    }

    async fn pause(&mut self) -> Result<()> {
        self.state = PlaybackState::Paused;
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.state = PlaybackState::Stopped;
        self.on_end.take();
        Ok(())
    }

    async fn forward(&mut self) -> Result<()> {
        if self.pos + 1 < self.texts.len() {
            self.pos += 1;
            Ok(())
        } else {
            Err(RecitoError::CannotSeek)
        }
    }

    async fn rewind(&mut self) -> Result<()> {
        if self.pos > 0 {
            self.pos -= 1;
            Ok(())
        } else {
            Err(RecitoError::CannotSeek)
        }
    }

    async fn goto_end(&mut self) -> Result<()> {
        self.pos = self.texts.len().saturating_sub(1);
        Ok(())
    }

    async fn state(&self) -> PlaybackState {
        self.state
    }
}

/// Settings fixed at the command line.
pub struct StaticSettings(pub Settings);

#[async_trait]
impl SettingsSource for StaticSettings {
    async fn get_settings(&self) -> Result<Settings> {
        Ok(self.0.clone())
    }
}

/// Voice catalog loaded from a JSON file.
pub struct FileCatalog {
    voices: Vec<Voice>,
}

impl FileCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| RecitoError::VoiceCatalog(format!("{}: {err}", path.display())))?;
        let voices = serde_json::from_str(&raw).map_err(|err| RecitoError::VoiceCatalog(err.to_string()))?;
        Ok(Self { voices })
    }
}

#[async_trait]
impl VoiceCatalog for FileCatalog {
    async fn get_voices(&self) -> Result<Vec<Voice>> {
        Ok(self.voices.clone())
    }
}
