//! Language detection over accumulated page text.
//!
//! Detection quality collapses on short samples, so text is accumulated
//! starting at the current page and, when that alone is under the
//! confidence floor, pulled from subsequent pages via quiet reads until the
//! floor is met or the document runs out. The accumulated sample goes to an
//! external probe once; the highest-confidence guess that is not
//! "undetermined" wins.
//!
//! Detection faults are swallowed: playback proceeds with the document's
//! declared or default language.

use async_trait::async_trait;
use tracing::debug;

use crate::Result;
use crate::source::DocumentSource;

/// Characters of sample text below which detection keeps accumulating.
pub const DETECTION_FLOOR_CHARS: usize = 1000;

/// ISO 639-ish code detectors report for "undetermined".
const UNDETERMINED: &str = "und";

/// One guess from the external detector.
#[derive(Debug, Clone)]
pub struct LanguageGuess {
    /// Detected language tag.
    pub language: String,
    /// Relative confidence, higher is better.
    pub confidence: f64,
}

/// External language detection function.
#[async_trait]
pub trait LanguageProbe: Send + Sync {
    async fn detect(&self, text: &str) -> Result<Vec<LanguageGuess>>;
}

/// Detects the language of the document starting from the given page.
///
/// `texts` is the current page's content; `next_index` the first page to
/// pull quietly when more sample is needed. Returns `None` when the probe
/// fails or nothing but "und" comes back.
pub async fn detect_language(
    source: &dyn DocumentSource, texts: &[String], next_index: i32, probe: &dyn LanguageProbe, floor: usize,
) -> Option<String> {
    let mut sample = String::new();
    combine_texts(&mut sample, texts, floor);

    let mut index = next_index;
    while sample.chars().count() < floor {
        match source.get_texts(index, true).await {
            Ok(Some(more)) => combine_texts(&mut sample, &more, floor),
            Ok(None) => break,
            Err(err) => {
                debug!(%err, index, "quiet read failed during language accumulation");
                break;
            }
        }
        index += 1;
    }

    let guesses = match probe.detect(&sample).await {
        Ok(guesses) => guesses,
        Err(err) => {
            debug!(%err, "language probe failed, keeping declared language");
            return None;
        }
    };
    let best = guesses
        .into_iter()
        .filter(|g| g.language != UNDETERMINED)
        .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap_or(std::cmp::Ordering::Equal))?;
    debug!(language = %best.language, confidence = best.confidence, "detected language");
    Some(best.language)
}

/// Reconciles a detected language with the document's declared tag.
///
/// When the declared tag is a regional variant of the detected language
/// ("en-GB" vs detected "en"), the declared tag is kept; otherwise the
/// detected tag overrides.
pub fn reconcile_language(declared: Option<String>, detected: Option<String>) -> Option<String> {
    match (declared, detected) {
        (Some(declared), Some(detected)) => {
            if declared.starts_with(&detected) {
                Some(declared)
            } else {
                Some(detected)
            }
        }
        (None, Some(detected)) => Some(detected),
        (declared, None) => declared,
    }
}

fn combine_texts(sample: &mut String, texts: &[String], floor: usize) {
    for text in texts {
        if sample.chars().count() >= floor {
            break;
        }
        sample.push_str(text);
        sample.push(' ');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{DocumentInfo, SimpleSource};
    use std::sync::Mutex;

    struct FixedProbe {
        guesses: Vec<LanguageGuess>,
        samples: Mutex<Vec<String>>,
    }

    impl FixedProbe {
        fn new(guesses: Vec<(&str, f64)>) -> Self {
            Self {
                guesses: guesses
                    .into_iter()
                    .map(|(language, confidence)| LanguageGuess { language: language.to_string(), confidence })
                    .collect(),
                samples: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LanguageProbe for FixedProbe {
        async fn detect(&self, text: &str) -> Result<Vec<LanguageGuess>> {
            self.samples.lock().unwrap().push(text.to_string());
            Ok(self.guesses.clone())
        }
    }

    struct QuietCountingSource {
        pages: Vec<Vec<String>>,
        quiet_reads: Mutex<Vec<(i32, bool)>>,
    }

    #[async_trait]
    impl DocumentSource for QuietCountingSource {
        async fn ready(&self) -> Result<DocumentInfo> {
            Ok(DocumentInfo::default())
        }

        fn is_waiting(&self) -> bool {
            false
        }

        async fn get_current_index(&self) -> Result<i32> {
            Ok(0)
        }

        async fn get_texts(&self, index: i32, quiet: bool) -> Result<Option<Vec<String>>> {
            self.quiet_reads.lock().unwrap().push((index, quiet));
            Ok(self.pages.get(index as usize).cloned())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_highest_confidence_non_und_wins() {
        let source = SimpleSource::new(vec![]);
        let probe = FixedProbe::new(vec![("und", 0.9), ("fr", 0.6), ("de", 0.3)]);
        let texts = vec!["x".repeat(1200)];
        let detected = detect_language(&source, &texts, 1, &probe, DETECTION_FLOOR_CHARS).await;
        assert_eq!(detected.as_deref(), Some("fr"));
    }

    #[tokio::test]
    async fn test_accumulates_quietly_until_floor() {
        let source = QuietCountingSource {
            pages: vec![vec!["page zero".to_string()], vec!["x".repeat(600)], vec!["y".repeat(600)]],
            quiet_reads: Mutex::new(Vec::new()),
        };
        let probe = FixedProbe::new(vec![("es", 0.8)]);
        let first_page = vec!["short opener".to_string()];
        let detected = detect_language(&source, &first_page, 1, &probe, DETECTION_FLOOR_CHARS).await;
        assert_eq!(detected.as_deref(), Some("es"));

        let reads = source.quiet_reads.lock().unwrap();
        assert_eq!(reads.as_slice(), &[(1, true), (2, true)]);
        let sample = &probe.samples.lock().unwrap()[0];
        assert!(sample.chars().count() >= DETECTION_FLOOR_CHARS);
    }

    #[tokio::test]
    async fn test_stops_at_end_of_document() {
        let source = QuietCountingSource { pages: vec![], quiet_reads: Mutex::new(Vec::new()) };
        let probe = FixedProbe::new(vec![("it", 0.7)]);
        let first_page = vec!["tiny".to_string()];
        let detected = detect_language(&source, &first_page, 1, &probe, DETECTION_FLOOR_CHARS).await;
        assert_eq!(detected.as_deref(), Some("it"));
        assert_eq!(source.quiet_reads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_probe_failure_swallowed() {
        struct FailingProbe;
        #[async_trait]
        impl LanguageProbe for FailingProbe {
            async fn detect(&self, _text: &str) -> Result<Vec<LanguageGuess>> {
                Err(crate::RecitoError::Detection("offline".to_string()))
            }
        }
        let source = SimpleSource::new(vec![]);
        let texts = vec!["x".repeat(1200)];
        let detected = detect_language(&source, &texts, 1, &FailingProbe, DETECTION_FLOOR_CHARS).await;
        assert!(detected.is_none());
    }

    #[test]
    fn test_reconcile_keeps_regional_variant() {
        assert_eq!(
            reconcile_language(Some("en-GB".to_string()), Some("en".to_string())),
            Some("en-GB".to_string())
        );
        assert_eq!(
            reconcile_language(Some("fr".to_string()), Some("de".to_string())),
            Some("de".to_string())
        );
        assert_eq!(reconcile_language(None, Some("ja".to_string())), Some("ja".to_string()));
        assert_eq!(reconcile_language(Some("ko".to_string()), None), Some("ko".to_string()));
    }
}
