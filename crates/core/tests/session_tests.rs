//! Integration tests for the playback orchestrator: page sequencing, the
//! stop-versus-load race guard, page-boundary navigation, and fault paths,
//! driven against scripted source and engine doubles.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;

use recito_core::{
    DocumentInfo, DocumentSource, LanguageGuess, LanguageProbe, PlaybackState, RecitoError, Result, Session, Settings,
    SettingsSource, Speech, SpeechEngine, SpeechOptions, SpeechOutcome, Voice, VoiceCatalog, VoiceTier,
};

#[derive(Clone, Copy, PartialEq)]
enum EngineMode {
    /// Fires the terminal event with success as soon as play is called.
    AutoComplete,
    /// Stays playing until stopped externally.
    Hold,
    /// Fires the terminal event with an engine fault on play.
    FailOnPlay,
    /// Parks each handle's terminal event sender in the log so the test
    /// decides when (and whether) it fires.
    External,
}

#[derive(Default)]
struct EngineLog {
    created: Vec<Vec<String>>,
    options: Vec<SpeechOptions>,
    played: usize,
    goto_end: usize,
    pending: Vec<oneshot::Sender<SpeechOutcome>>,
}

struct ScriptedEngine {
    mode: EngineMode,
    log: Arc<Mutex<EngineLog>>,
}

impl ScriptedEngine {
    fn new(mode: EngineMode) -> (Arc<Self>, Arc<Mutex<EngineLog>>) {
        let log = Arc::new(Mutex::new(EngineLog::default()));
        (Arc::new(Self { mode, log: log.clone() }), log)
    }
}

#[async_trait]
impl SpeechEngine for ScriptedEngine {
    async fn create(
        &self, texts: Vec<String>, options: SpeechOptions, on_end: oneshot::Sender<SpeechOutcome>,
    ) -> Result<Box<dyn Speech>> {
        let mut log = self.log.lock().unwrap();
        log.created.push(texts);
        log.options.push(options);
        let on_end = if self.mode == EngineMode::External {
            log.pending.push(on_end);
            None
        } else {
            Some(on_end)
        };
        Ok(Box::new(ScriptedSpeech {
            mode: self.mode,
            log: self.log.clone(),
            state: PlaybackState::Stopped,
            on_end,
        }))
    }
}

struct ScriptedSpeech {
    mode: EngineMode,
    log: Arc<Mutex<EngineLog>>,
    state: PlaybackState,
    on_end: Option<oneshot::Sender<SpeechOutcome>>,
}

#[async_trait]
impl Speech for ScriptedSpeech {
    async fn play(&mut self) -> Result<()> {
        self.state = PlaybackState::Playing;
        self.log.lock().unwrap().played += 1;
        match self.mode {
            EngineMode::AutoComplete => {
                if let Some(tx) = self.on_end.take() {
                    let _ = tx.send(Ok(()));
                }
            }
            EngineMode::FailOnPlay => {
                if let Some(tx) = self.on_end.take() {
                    let _ = tx.send(Err(RecitoError::Speech("synthesizer exploded".to_string())));
                }
            }
            EngineMode::Hold | EngineMode::External => {}
        }
        Ok(())
    }

    async fn pause(&mut self) -> Result<()> {
        self.state = PlaybackState::Paused;
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.state = PlaybackState::Stopped;
        self.on_end.take(); // dropped unfired
        Ok(())
    }

    async fn forward(&mut self) -> Result<()> {
        Err(RecitoError::CannotSeek)
    }

    async fn rewind(&mut self) -> Result<()> {
        Err(RecitoError::CannotSeek)
    }

    async fn goto_end(&mut self) -> Result<()> {
        self.log.lock().unwrap().goto_end += 1;
        Ok(())
    }

    async fn state(&self) -> PlaybackState {
        self.state
    }
}

struct FakeSource {
    pages: Vec<Vec<String>>,
    current: i32,
    delay: Duration,
    language: Option<String>,
    fail_fetch: bool,
    fetch_log: Mutex<Vec<(i32, bool)>>,
}

impl FakeSource {
    fn new(pages: Vec<Vec<String>>) -> Self {
        Self {
            pages,
            current: 0,
            delay: Duration::ZERO,
            language: None,
            fail_fetch: false,
            fetch_log: Mutex::new(Vec::new()),
        }
    }

    fn pages_of(texts: &[&str]) -> Vec<Vec<String>> {
        texts.iter().map(|t| vec![t.to_string()]).collect()
    }
}

#[async_trait]
impl DocumentSource for FakeSource {
    async fn ready(&self) -> Result<DocumentInfo> {
        Ok(DocumentInfo { language: self.language.clone(), seekable: true })
    }

    fn is_waiting(&self) -> bool {
        false
    }

    async fn get_current_index(&self) -> Result<i32> {
        Ok(self.current)
    }

    async fn get_texts(&self, index: i32, quiet: bool) -> Result<Option<Vec<String>>> {
        self.fetch_log.lock().unwrap().push((index, quiet));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_fetch {
            return Err(RecitoError::Source("fetch refused".to_string()));
        }
        if index < 0 {
            return Ok(None);
        }
        Ok(self.pages.get(index as usize).cloned())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never became true");
}

#[tokio::test(start_paused = true)]
async fn test_pages_read_in_order_to_end_of_document() {
    let source = Arc::new(FakeSource::new(FakeSource::pages_of(&["page zero", "page one"])));
    let (engine, log) = ScriptedEngine::new(EngineMode::AutoComplete);
    let (session, end) = Session::builder(source, engine).build();

    session.play().await.unwrap();
    let outcome = end.await.expect("end event must fire");
    assert!(outcome.is_ok());

    let log = log.lock().unwrap();
    assert_eq!(log.created.len(), 2);
    assert_eq!(log.created[0], vec!["page zero"]);
    assert_eq!(log.created[1], vec!["page one"]);
    drop(log);
    assert_eq!(session.get_state().await, PlaybackState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_fetch_discards_late_handle() {
    let mut source = FakeSource::new(FakeSource::pages_of(&["slow page"]));
    source.delay = Duration::from_millis(100);
    let (engine, log) = ScriptedEngine::new(EngineMode::Hold);
    let (session, _end) = Session::builder(Arc::new(source), engine).build();

    session.play().await.unwrap();
    assert_eq!(session.get_state().await, PlaybackState::Loading);
    session.stop().await.unwrap();

    // Let the in-flight fetch resolve; its handle must lose the race.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(session.get_state().await, PlaybackState::Stopped);
    assert_eq!(log.lock().unwrap().played, 0);
}

#[tokio::test(start_paused = true)]
async fn test_empty_pages_are_skipped() {
    let pages = vec![Vec::new(), vec!["real text".to_string()]];
    let source = Arc::new(FakeSource::new(pages));
    let (engine, log) = ScriptedEngine::new(EngineMode::AutoComplete);
    let (session, end) = Session::builder(source, engine).build();

    session.play().await.unwrap();
    assert!(end.await.unwrap().is_ok());
    let log = log.lock().unwrap();
    assert_eq!(log.created.len(), 1);
    assert_eq!(log.created[0], vec!["real text"]);
}

#[tokio::test(start_paused = true)]
async fn test_source_fault_reads_as_end_of_document() {
    let mut source = FakeSource::new(Vec::new());
    source.fail_fetch = true;
    let (engine, log) = ScriptedEngine::new(EngineMode::AutoComplete);
    let (session, end) = Session::builder(Arc::new(source), engine).build();

    session.play().await.unwrap();
    assert!(end.await.unwrap().is_ok());
    assert_eq!(log.lock().unwrap().created.len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_speech_fault_propagates_to_end_event() {
    let source = Arc::new(FakeSource::new(FakeSource::pages_of(&["doomed page"])));
    let (engine, _log) = ScriptedEngine::new(EngineMode::FailOnPlay);
    let (session, end) = Session::builder(source, engine).build();

    session.play().await.unwrap();
    let outcome = end.await.unwrap();
    assert!(matches!(outcome, Err(RecitoError::Speech(_))));
    assert_eq!(session.get_state().await, PlaybackState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_pause_and_resume_reuse_the_handle() {
    let source = Arc::new(FakeSource::new(FakeSource::pages_of(&["held page"])));
    let (engine, log) = ScriptedEngine::new(EngineMode::Hold);
    let (session, _end) = Session::builder(source, engine).build();

    session.play().await.unwrap();
    wait_until(|| log.lock().unwrap().played == 1).await;
    assert_eq!(session.get_state().await, PlaybackState::Playing);

    session.pause().await.unwrap();
    assert_eq!(session.get_state().await, PlaybackState::Paused);

    session.play().await.unwrap();
    assert_eq!(session.get_state().await, PlaybackState::Playing);
    assert_eq!(log.lock().unwrap().created.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_forward_falls_back_to_next_page() {
    let source = Arc::new(FakeSource::new(FakeSource::pages_of(&["page zero", "page one"])));
    let (engine, log) = ScriptedEngine::new(EngineMode::Hold);
    let (session, _end) = Session::builder(source, engine).build();

    session.play().await.unwrap();
    wait_until(|| log.lock().unwrap().played == 1).await;

    session.forward().await.unwrap();
    wait_until(|| log.lock().unwrap().created.len() == 2).await;
    let log = log.lock().unwrap();
    assert_eq!(log.created[1], vec!["page one"]);
    assert_eq!(log.goto_end, 0);
}

#[tokio::test(start_paused = true)]
async fn test_rewind_resumes_at_end_of_previous_page() {
    let mut source = FakeSource::new(FakeSource::pages_of(&["page zero", "page one"]));
    source.current = 1;
    let source = Arc::new(source);
    let (engine, log) = ScriptedEngine::new(EngineMode::Hold);
    let (session, _end) = Session::builder(source.clone(), engine).build();

    session.play().await.unwrap();
    wait_until(|| log.lock().unwrap().played == 1).await;
    assert_eq!(log.lock().unwrap().created[0], vec!["page one"]);

    session.rewind().await.unwrap();
    wait_until(|| log.lock().unwrap().created.len() == 2).await;
    wait_until(|| log.lock().unwrap().played == 2).await;

    let log = log.lock().unwrap();
    // Exactly one page back, positioned at the end of its content.
    assert_eq!(log.created[1], vec!["page zero"]);
    assert_eq!(log.goto_end, 1);
    drop(log);
    let fetches = source.fetch_log.lock().unwrap();
    assert!(fetches.contains(&(0, false)));
}

#[tokio::test(start_paused = true)]
async fn test_end_event_racing_forward_advances_once() {
    let source = Arc::new(FakeSource::new(FakeSource::pages_of(&["page zero", "page one", "page two"])));
    let (engine, log) = ScriptedEngine::new(EngineMode::External);
    let (session, _end) = Session::builder(source.clone(), engine).build();

    session.play().await.unwrap();
    wait_until(|| log.lock().unwrap().played == 1).await;

    // Page zero's terminal event fires just as the user seeks forward; the
    // index must move exactly once, to page one.
    let first_end = log.lock().unwrap().pending.remove(0);
    let _ = first_end.send(Ok(()));
    session.forward().await.unwrap();

    wait_until(|| log.lock().unwrap().played == 2).await;
    tokio::time::sleep(Duration::from_millis(400)).await;

    {
        let log = log.lock().unwrap();
        assert_eq!(log.created.len(), 2);
        assert_eq!(log.created[1], vec!["page one"]);
    }
    let fetched_two = source.fetch_log.lock().unwrap().iter().any(|&(i, _)| i == 2);
    assert!(!fetched_two, "page two fetched while page one was still playing");
    assert_eq!(session.get_state().await, PlaybackState::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_seek_after_stop_is_not_active() {
    let source = Arc::new(FakeSource::new(FakeSource::pages_of(&["page zero", "page one"])));
    let (engine, log) = ScriptedEngine::new(EngineMode::Hold);
    let (session, _end) = Session::builder(source, engine).build();

    session.play().await.unwrap();
    wait_until(|| log.lock().unwrap().played == 1).await;
    session.stop().await.unwrap();

    assert!(matches!(session.forward().await, Err(RecitoError::NotActive("forward"))));
    assert!(matches!(session.rewind().await, Err(RecitoError::NotActive("rewind"))));

    // No driver restarts against the closed source.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(log.lock().unwrap().created.len(), 1);
    assert_eq!(session.get_state().await, PlaybackState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_seek_without_session_is_not_active() {
    let source = Arc::new(FakeSource::new(Vec::new()));
    let (engine, _log) = ScriptedEngine::new(EngineMode::Hold);
    let (session, _end) = Session::builder(source, engine).build();

    assert!(matches!(session.forward().await, Err(RecitoError::NotActive("forward"))));
    assert!(matches!(session.rewind().await, Err(RecitoError::NotActive("rewind"))));
}

struct StaticSettings(Settings);

#[async_trait]
impl SettingsSource for StaticSettings {
    async fn get_settings(&self) -> Result<Settings> {
        Ok(self.0.clone())
    }
}

struct StaticCatalog(Vec<Voice>);

#[async_trait]
impl VoiceCatalog for StaticCatalog {
    async fn get_voices(&self) -> Result<Vec<Voice>> {
        Ok(self.0.clone())
    }
}

struct StaticProbe(&'static str);

#[async_trait]
impl LanguageProbe for StaticProbe {
    async fn detect(&self, _text: &str) -> Result<Vec<LanguageGuess>> {
        Ok(vec![LanguageGuess { language: self.0.to_string(), confidence: 0.9 }])
    }
}

#[tokio::test(start_paused = true)]
async fn test_settings_language_and_voice_flow_into_options() {
    let mut source = FakeSource::new(FakeSource::pages_of(&["une page de texte"]));
    source.language = Some("fr-FR".to_string());
    let (engine, log) = ScriptedEngine::new(EngineMode::AutoComplete);
    let settings = Settings { rate: Some(1.5), ..Settings::default() };
    let voices = vec![Voice {
        name: "Michelle".to_string(),
        lang: Some("fr-FR".to_string()),
        gender: None,
        tier: VoiceTier::Local,
    }];
    let (session, end) = Session::builder(Arc::new(source), engine)
        .settings(Arc::new(StaticSettings(settings)))
        .voices(Arc::new(StaticCatalog(voices)))
        .probe(Arc::new(StaticProbe("fr")))
        .build();

    session.play().await.unwrap();
    assert!(end.await.unwrap().is_ok());

    let log = log.lock().unwrap();
    let options = &log.options[0];
    assert_eq!(options.rate, 1.5);
    // Declared fr-FR is a regional variant of detected fr: kept.
    assert_eq!(options.lang.as_deref(), Some("fr-FR"));
    assert_eq!(options.voice_name.as_deref(), Some("Michelle"));
}

#[tokio::test(start_paused = true)]
async fn test_detection_overrides_mismatched_declaration() {
    let mut source = FakeSource::new(FakeSource::pages_of(&["ein deutscher Text"]));
    source.language = Some("fr".to_string());
    let (engine, log) = ScriptedEngine::new(EngineMode::AutoComplete);
    let (session, end) = Session::builder(Arc::new(source), engine)
        .probe(Arc::new(StaticProbe("de")))
        .detection_floor(10)
        .build();

    session.play().await.unwrap();
    assert!(end.await.unwrap().is_ok());
    assert_eq!(log.lock().unwrap().options[0].lang.as_deref(), Some("de"));
}
