//! The playback orchestrator.
//!
//! A [`Session`] owns one [`DocumentSource`] and at most one live speech
//! handle, and sequences pages through a driver task: fetch the current
//! page's texts, detect the language, resolve a voice, build a speech
//! handle, play it, and react to its terminal event by advancing to the
//! next page. The session's own end is a one-shot terminal event delivered
//! to whoever created it: `Ok(())` at end of document, an error on a
//! synthesis fault.
//!
//! Races between overlapping asynchronous loads are settled at install
//! time: a freshly built speech handle is only activated if the session
//! was not stopped and no other handle was installed while its page was
//! loading; a handle that loses that race is discarded silently. Every
//! play, page seek, and stop bumps a generation counter, and a driver
//! re-checks that its generation is still current before advancing the
//! index, clearing the active handle, or firing the end event, so a stale
//! driver waking on a superseded terminal event steps aside.
//!
//! Lifetime is owned by whoever issues `play()`; nothing here is a global.

use std::sync::Arc;

use tokio::sync::{Mutex, oneshot};
use tracing::{debug, warn};

use crate::language::{DETECTION_FLOOR_CHARS, LanguageProbe, detect_language, reconcile_language};
use crate::source::{DocumentInfo, DocumentSource};
use crate::speech::{
    DefaultSettings, EmptyCatalog, PlaybackState, SettingsSource, Speech, SpeechEngine, SpeechOptions,
};
use crate::voice::{VoiceCatalog, resolve_voice_name};
use crate::{RecitoError, Result};

/// Receives the session's terminal event exactly once: `Ok(())` when the
/// document finishes naturally, an error when synthesis faults.
pub type SessionEnd = oneshot::Receiver<Result<()>>;

struct Inner {
    current_index: i32,
    active: Option<Box<dyn Speech>>,
    /// Set by `stop()`; in-flight loads observing it discard their handle.
    stopped: bool,
    /// A fetch is outstanding and no handle exists yet.
    loading: bool,
    /// `play()` has established a current index at least once.
    started: bool,
    /// Bumped on every play, page seek, and stop. A driver only mutates
    /// the session while its generation is current.
    generation: u64,
    end_tx: Option<oneshot::Sender<Result<()>>>,
}

#[derive(Clone)]
struct Shared {
    source: Arc<dyn DocumentSource>,
    engine: Arc<dyn SpeechEngine>,
    settings: Arc<dyn SettingsSource>,
    voices: Arc<dyn VoiceCatalog>,
    probe: Option<Arc<dyn LanguageProbe>>,
    detection_floor: usize,
    inner: Arc<Mutex<Inner>>,
}

/// Builder for a [`Session`].
pub struct SessionBuilder {
    source: Arc<dyn DocumentSource>,
    engine: Arc<dyn SpeechEngine>,
    settings: Arc<dyn SettingsSource>,
    voices: Arc<dyn VoiceCatalog>,
    probe: Option<Arc<dyn LanguageProbe>>,
    detection_floor: usize,
}

impl SessionBuilder {
    /// Attaches an external settings store.
    pub fn settings(mut self, settings: Arc<dyn SettingsSource>) -> Self {
        self.settings = settings;
        self
    }

    /// Attaches a voice catalog.
    pub fn voices(mut self, voices: Arc<dyn VoiceCatalog>) -> Self {
        self.voices = voices;
        self
    }

    /// Attaches a language detection probe. Without one, the document's
    /// declared language is used as-is.
    pub fn probe(mut self, probe: Arc<dyn LanguageProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Overrides the detection confidence floor.
    pub fn detection_floor(mut self, floor: usize) -> Self {
        self.detection_floor = floor;
        self
    }

    /// Builds the session and its terminal end event.
    pub fn build(self) -> (Session, SessionEnd) {
        let (end_tx, end_rx) = oneshot::channel();
        let shared = Shared {
            source: self.source,
            engine: self.engine,
            settings: self.settings,
            voices: self.voices,
            probe: self.probe,
            detection_floor: self.detection_floor,
            inner: Arc::new(Mutex::new(Inner {
                current_index: 0,
                active: None,
                stopped: false,
                loading: false,
                started: false,
                generation: 0,
                end_tx: Some(end_tx),
            })),
        };
        (Session { shared }, end_rx)
    }
}

/// The live playback session over one document.
pub struct Session {
    shared: Shared,
}

impl Session {
    /// Starts building a session over a source and a synthesis engine.
    pub fn builder(source: Arc<dyn DocumentSource>, engine: Arc<dyn SpeechEngine>) -> SessionBuilder {
        SessionBuilder {
            source,
            engine,
            settings: Arc::new(DefaultSettings),
            voices: Arc::new(EmptyCatalog),
            probe: None,
            detection_floor: DETECTION_FLOOR_CHARS,
        }
    }

    /// Starts or resumes playback.
    ///
    /// With a live handle this resumes it. Otherwise the source's current
    /// index is snapshotted and the page driver starts reading from it.
    pub async fn play(&self) -> Result<DocumentInfo> {
        let info = self.shared.source.ready().await?;

        {
            let mut inner = self.shared.inner.lock().await;
            if let Some(speech) = inner.active.as_mut() {
                speech.play().await?;
                return Ok(info);
            }
        }

        let index = self.shared.source.get_current_index().await?;
        let generation = {
            let mut inner = self.shared.inner.lock().await;
            if inner.active.is_some() {
                // A concurrent load finished while we were fetching the
                // index; treat this call as a resume.
                if let Some(speech) = inner.active.as_mut() {
                    speech.play().await?;
                }
                return Ok(info);
            }
            inner.current_index = index;
            inner.started = true;
            inner.stopped = false;
            inner.loading = true;
            inner.generation += 1;
            inner.generation
        };
        self.shared.clone().spawn_driver(false, generation);
        Ok(info)
    }

    /// Pauses the active handle; a no-op without one.
    pub async fn pause(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock().await;
        if let Some(speech) = inner.active.as_mut() {
            speech.pause().await?;
        }
        Ok(())
    }

    /// Stops playback, clears the handle, and closes the source. Safe to
    /// call while a load is outstanding: the late-arriving handle is
    /// discarded.
    pub async fn stop(&self) -> Result<()> {
        let taken = {
            let mut inner = self.shared.inner.lock().await;
            inner.stopped = true;
            inner.loading = false;
            inner.generation += 1;
            inner.active.take()
        };
        if let Some(mut speech) = taken {
            speech.stop().await?;
        }
        self.shared.source.close().await
    }

    /// Tears the session down. Tolerates a source whose readiness already
    /// failed.
    pub async fn close(&self) {
        let _ = self.shared.source.ready().await;
        let taken = {
            let mut inner = self.shared.inner.lock().await;
            inner.stopped = true;
            inner.loading = false;
            inner.generation += 1;
            inner.active.take()
        };
        if let Some(mut speech) = taken {
            if let Err(err) = speech.stop().await {
                warn!(%err, "speech handle refused to stop during close");
            }
        }
        if let Err(err) = self.shared.source.close().await {
            warn!(%err, "source refused to close");
        }
    }

    /// Reported playback state: the active handle's state, else LOADING
    /// while a fetch is outstanding or the source is settling, else
    /// STOPPED.
    pub async fn get_state(&self) -> PlaybackState {
        let inner = self.shared.inner.lock().await;
        if let Some(speech) = inner.active.as_ref() {
            return speech.state().await;
        }
        if inner.loading || self.shared.source.is_waiting() {
            PlaybackState::Loading
        } else {
            PlaybackState::Stopped
        }
    }

    /// Seeks forward one segment, falling back to the next page at a
    /// segment boundary.
    pub async fn forward(&self) -> Result<()> {
        self.seek(1, "forward").await
    }

    /// Seeks back one segment; across a page boundary playback resumes at
    /// the **end** of the previous page's content.
    pub async fn rewind(&self) -> Result<()> {
        self.seek(-1, "rewind").await
    }

    async fn seek(&self, step: i32, op: &'static str) -> Result<()> {
        let mut inner = self.shared.inner.lock().await;
        if !inner.started || inner.stopped {
            // A stopped session is gone; seeking must not resurrect it.
            return Err(RecitoError::NotActive(op));
        }
        if let Some(speech) = inner.active.as_mut() {
            let result = if step > 0 { speech.forward().await } else { speech.rewind().await };
            match result {
                Ok(()) => return Ok(()),
                Err(RecitoError::CannotSeek) => {} // page boundary, fall through
                Err(err) => return Err(err),
            }
        }
        // Page-level jump: tear down the current handle and restart the
        // driver on the neighboring index.
        let taken = inner.active.take();
        inner.current_index += step;
        inner.loading = true;
        inner.generation += 1;
        let generation = inner.generation;
        debug!(index = inner.current_index, op, "page-level seek");
        drop(inner);
        if let Some(mut speech) = taken {
            speech.stop().await?;
        }
        self.shared.clone().spawn_driver(step < 0, generation);
        Ok(())
    }
}

impl Shared {
    fn spawn_driver(self, rewound: bool, generation: u64) {
        tokio::spawn(async move {
            self.run(rewound, generation).await;
        });
    }

    /// The page loop: reads the current page, speaks it, advances on the
    /// handle's terminal event. Runs until end of document, a fault, a lost
    /// install race, or a newer generation taking over.
    async fn run(self, mut rewound: bool, generation: u64) {
        loop {
            let index = {
                let inner = self.inner.lock().await;
                if inner.generation != generation {
                    return;
                }
                inner.current_index
            };
            let texts = match self.source.get_texts(index, false).await {
                Ok(texts) => texts,
                Err(err) => {
                    // A source fault reads as end-of-document, by contract.
                    debug!(%err, index, "page fetch failed, treating as end of document");
                    None
                }
            };
            let Some(texts) = texts else {
                self.finish(generation, Ok(())).await;
                return;
            };
            if texts.iter().all(|t| t.trim().is_empty()) {
                let mut inner = self.inner.lock().await;
                if inner.generation != generation || inner.stopped {
                    return;
                }
                inner.current_index += 1;
                continue;
            }

            let (mut speech, done) = match self.build_speech(index, texts).await {
                Ok(pair) => pair,
                Err(err) => {
                    self.finish(generation, Err(err)).await;
                    return;
                }
            };

            {
                let mut inner = self.inner.lock().await;
                if inner.generation != generation || inner.stopped || inner.active.is_some() {
                    // Lost the install race (a stop, a seek, or a competing
                    // load won); the freshly built handle is discarded
                    // silently.
                    debug!(index, "discarding speech handle after lost install race");
                    return;
                }
                if rewound {
                    speech.goto_end().await.ok();
                }
                if let Err(err) = speech.play().await {
                    drop(inner);
                    self.finish(generation, Err(err)).await;
                    return;
                }
                inner.active = Some(speech);
                inner.loading = false;
            }
            rewound = false;

            match done.await {
                Ok(Ok(())) => {
                    let mut inner = self.inner.lock().await;
                    if inner.generation != generation {
                        // A navigation or stop superseded this driver while
                        // the terminal event was in flight; the index and the
                        // new handle belong to it now.
                        return;
                    }
                    inner.active = None;
                    if inner.stopped {
                        return;
                    }
                    inner.current_index += 1;
                    inner.loading = true;
                }
                Ok(Err(err)) => {
                    self.finish(generation, Err(err)).await;
                    return;
                }
                Err(_) => {
                    // Sender dropped without firing: the handle was stopped
                    // out from under us. Nothing more to do.
                    return;
                }
            }
        }
    }

    async fn build_speech(
        &self, index: i32, texts: Vec<String>,
    ) -> Result<(Box<dyn Speech>, oneshot::Receiver<Result<()>>)> {
        let declared = match self.source.ready().await {
            Ok(info) => info.language,
            Err(_) => None,
        };
        let lang = match &self.probe {
            Some(probe) => {
                let detected =
                    detect_language(&*self.source, &texts, index + 1, probe.as_ref(), self.detection_floor).await;
                reconcile_language(declared, detected)
            }
            None => declared,
        };

        let settings = self.settings.get_settings().await.unwrap_or_default();
        let mut options = SpeechOptions::from_settings(&settings);
        options.lang = lang;

        let catalog = match self.voices.get_voices().await {
            Ok(catalog) => catalog,
            Err(err) => {
                debug!(%err, "voice catalog unavailable, keeping engine default voice");
                Vec::new()
            }
        };
        options.voice_name = resolve_voice_name(&catalog, settings.voice_name.as_deref(), options.lang.as_deref());

        let (tx, rx) = oneshot::channel();
        let speech = self.engine.create(texts, options, tx).await?;
        Ok((speech, rx))
    }

    /// Fires the session's end event, provided this driver still owns the
    /// session. A superseded driver must not declare the session over.
    async fn finish(&self, generation: u64, result: Result<()>) {
        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            return;
        }
        inner.active = None;
        inner.loading = false;
        if let Some(tx) = inner.end_tx.take() {
            let _ = tx.send(result);
        }
    }
}
