//! The `DocumentSource` contract and the generic bundled sources.
//!
//! A source abstracts one logical document as a 0-based page index space of
//! unknown length. Text is re-fetched per index; the source owns no
//! long-lived text. `None` from [`DocumentSource::get_texts`] is the one
//! and only end-of-document signal.
//!
//! A *quiet* read is a fetch that must not perturb visible scroll or
//! navigation state; the orchestrator uses them for language look-ahead
//! while the user is parked on an earlier page.

use std::sync::Mutex;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::Result;
use crate::extract::{ExtractConfig, extract_texts_with_config};
use crate::node::ContentNode;
use crate::paragraphs::reconstruct_paragraphs;

/// Sentinel page index meaning "read the active text selection instead of
/// a page".
pub const SELECTION_INDEX: i32 = -100;

/// Blank-line runs separating paragraphs in raw selected text.
static SELECTION_SPLITTER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:\r?\n){2,}").unwrap());

/// URLs read terribly; they are replaced with a short phrase.
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());

/// What a source reports once it has settled.
#[derive(Debug, Clone, Default)]
pub struct DocumentInfo {
    /// Declared document language, if any.
    pub language: Option<String>,
    /// Whether forward/rewind page jumps are meaningful for this source.
    pub seekable: bool,
}

impl DocumentInfo {
    /// Builds info from a declared language tag.
    ///
    /// A bare "en" declaration is distrusted: foreign-language pages
    /// frequently mislabel themselves as English, so it is treated as
    /// undeclared and left to detection.
    pub fn with_declared_language(lang: Option<&str>, seekable: bool) -> Self {
        let language = lang.filter(|l| *l != "en").map(|l| l.to_string());
        Self { language, seekable }
    }
}

/// One logical document, exposed as a page index space.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Resolves once the source has settled enough to describe itself.
    async fn ready(&self) -> Result<DocumentInfo>;

    /// True while the source has not yet produced a first result.
    fn is_waiting(&self) -> bool;

    /// The page the user is currently looking at, or [`SELECTION_INDEX`].
    async fn get_current_index(&self) -> Result<i32>;

    /// The speakable strings for `index`, or `None` at end of document.
    /// Quiet reads must not move any visible viewport position.
    async fn get_texts(&self, index: i32, quiet: bool) -> Result<Option<Vec<String>>>;

    /// Releases whatever the source holds.
    async fn close(&self) -> Result<()>;
}

/// Replaces raw URLs in an emitted string with a speakable phrase.
pub fn remove_links(text: &str) -> String {
    URL_PATTERN.replace_all(text, "this URL.").into_owned()
}

/// Splits raw selected text into paragraphs.
pub fn split_selection(text: &str) -> Vec<String> {
    SELECTION_SPLITTER
        .split(text.trim())
        .filter(|p| !p.trim().is_empty())
        .map(|p| p.to_string())
        .collect()
}

/// A single-page source over a fixed list of paragraphs; what selection
/// playback uses.
pub struct SimpleSource {
    texts: Vec<String>,
    declared_language: Option<String>,
}

impl SimpleSource {
    pub fn new(texts: Vec<String>) -> Self {
        Self { texts, declared_language: None }
    }

    /// Splits raw text on blank-line runs, one page.
    pub fn from_text(text: &str) -> Self {
        Self::new(split_selection(text))
    }

    /// Sets the declared language tag.
    pub fn declared_language(mut self, lang: &str) -> Self {
        self.declared_language = Some(lang.to_string());
        self
    }
}

#[async_trait]
impl DocumentSource for SimpleSource {
    async fn ready(&self) -> Result<DocumentInfo> {
        Ok(DocumentInfo::with_declared_language(self.declared_language.as_deref(), false))
    }

    fn is_waiting(&self) -> bool {
        false
    }

    async fn get_current_index(&self) -> Result<i32> {
        Ok(0)
    }

    async fn get_texts(&self, index: i32, _quiet: bool) -> Result<Option<Vec<String>>> {
        Ok(if index == 0 { Some(self.texts.clone()) } else { None })
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// A single-page source over one content tree, extracted on demand.
///
/// When the host reports an active text selection, the current index is
/// [`SELECTION_INDEX`] and playback reads the selection instead of the
/// page.
pub struct TreeSource {
    root: ContentNode,
    config: ExtractConfig,
    declared_language: Option<String>,
    selection: Option<String>,
}

impl TreeSource {
    pub fn new(root: ContentNode) -> Self {
        Self { root, config: ExtractConfig::default(), declared_language: None, selection: None }
    }

    /// Sets the page's declared language tag.
    pub fn declared_language(mut self, lang: &str) -> Self {
        self.declared_language = Some(lang.to_string());
        self
    }

    /// Sets the active text selection, if the user has one.
    pub fn selection(mut self, text: &str) -> Self {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            self.selection = Some(trimmed.to_string());
        }
        self
    }

    /// Overrides the extraction configuration.
    pub fn extract_config(mut self, config: ExtractConfig) -> Self {
        self.config = config;
        self
    }
}

#[async_trait]
impl DocumentSource for TreeSource {
    async fn ready(&self) -> Result<DocumentInfo> {
        Ok(DocumentInfo::with_declared_language(self.declared_language.as_deref(), false))
    }

    fn is_waiting(&self) -> bool {
        false
    }

    async fn get_current_index(&self) -> Result<i32> {
        Ok(if self.selection.is_some() { SELECTION_INDEX } else { 0 })
    }

    async fn get_texts(&self, index: i32, _quiet: bool) -> Result<Option<Vec<String>>> {
        if index == SELECTION_INDEX {
            let selection = self.selection.as_deref().unwrap_or("");
            return Ok(Some(split_selection(selection)));
        }
        if index != 0 {
            return Ok(None);
        }
        let texts = extract_texts_with_config(&self.root, &self.config)
            .iter()
            .map(|t| remove_links(t))
            .collect();
        Ok(Some(texts))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// A paginated source over per-page content trees sharing one viewport.
///
/// The viewport scroll position is a shared mutable resource: a normal read
/// scrolls the page into view; a quiet read saves and restores the prior
/// position before returning.
pub struct PagedSource {
    pages: Vec<ContentNode>,
    config: ExtractConfig,
    declared_language: Option<String>,
    page_height: f32,
    scroll_top: Mutex<f32>,
    /// Bounded wait for client-side rendering before a page reads as empty.
    poll_window: Duration,
}

impl PagedSource {
    pub fn new(pages: Vec<ContentNode>) -> Self {
        Self {
            pages,
            config: ExtractConfig::default(),
            declared_language: None,
            page_height: 1000.0,
            scroll_top: Mutex::new(0.0),
            poll_window: Duration::from_millis(2000),
        }
    }

    pub fn declared_language(mut self, lang: &str) -> Self {
        self.declared_language = Some(lang.to_string());
        self
    }

    pub fn poll_window(mut self, window: Duration) -> Self {
        self.poll_window = window;
        self
    }

    /// Current viewport scroll position, for hosts mirroring it to a UI.
    pub fn scroll_position(&self) -> f32 {
        *self.scroll_top.lock().expect("viewport lock poisoned")
    }

    fn page_texts(&self, index: usize) -> Vec<String> {
        let lines = extract_texts_with_config(&self.pages[index], &self.config);
        reconstruct_paragraphs(&lines).iter().map(|t| remove_links(t)).collect()
    }
}

#[async_trait]
impl DocumentSource for PagedSource {
    async fn ready(&self) -> Result<DocumentInfo> {
        Ok(DocumentInfo::with_declared_language(self.declared_language.as_deref(), true))
    }

    fn is_waiting(&self) -> bool {
        false
    }

    async fn get_current_index(&self) -> Result<i32> {
        let scroll = self.scroll_position();
        // The page whose top sits past the middle of the viewport is the
        // one after the current page.
        let mut index = self.pages.len() as i32 - 1;
        for i in 0..self.pages.len() {
            if i as f32 * self.page_height > scroll + self.page_height / 2.0 {
                index = i as i32 - 1;
                break;
            }
        }
        Ok(index.max(0))
    }

    async fn get_texts(&self, index: i32, quiet: bool) -> Result<Option<Vec<String>>> {
        if index < 0 || index as usize >= self.pages.len() {
            return Ok(None);
        }
        let page = index as usize;
        let saved = self.scroll_position();
        {
            let mut scroll = self.scroll_top.lock().expect("viewport lock poisoned");
            *scroll = page as f32 * self.page_height;
        }
        let result = poll_texts(|| async { Ok(Some(self.page_texts(page))) }, self.poll_window).await;
        if quiet {
            let mut scroll = self.scroll_top.lock().expect("viewport lock poisoned");
            *scroll = saved;
        }
        result
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Interval between retries while waiting out client-side rendering.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Retries a text fetch every [`POLL_INTERVAL`] while it yields an empty
/// page, up to `window`; a page still empty when the window elapses is
/// treated as genuinely empty. `None` (end of document) returns at once.
pub async fn poll_texts<F, Fut>(mut fetch: F, window: Duration) -> Result<Option<Vec<String>>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<Vec<String>>>>,
{
    let mut remaining = window;
    loop {
        tokio::time::sleep(POLL_INTERVAL).await;
        let texts = fetch().await?;
        match texts {
            Some(t) if t.is_empty() && remaining > POLL_INTERVAL => {
                remaining -= POLL_INTERVAL;
                debug!(remaining_ms = remaining.as_millis() as u64, "page empty, polling again");
            }
            other => return Ok(other),
        }
    }
}
