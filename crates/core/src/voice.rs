//! Voice catalog model and automatic voice selection.
//!
//! Selection is tiered: an explicitly named voice is definitive; otherwise
//! the catalog is searched by language in quality order — natively rendered
//! voices first, then anything local, then anything non-premium, then
//! anything at all. The first tier with a match wins outright; tiers are
//! never blended.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Voice gender, when the catalog reports one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
}

/// Quality/cost class of a synthesis voice.
///
/// `Premium` implies remote delivery; the tiers form strictly widening
/// sets during selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceTier {
    /// Rendered by the local engine at high quality.
    Native,
    /// Any other locally rendered voice.
    Local,
    /// Streamed from a remote service.
    Remote,
    /// Paid remote voice.
    Premium,
}

impl Default for VoiceTier {
    fn default() -> Self {
        VoiceTier::Local
    }
}

/// One entry of the external voice catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voice {
    /// Engine-unique voice name.
    pub name: String,
    /// BCP-47-ish language tag ("en-US", "fr"), if declared.
    #[serde(default)]
    pub lang: Option<String>,
    /// Gender, if declared.
    #[serde(default)]
    pub gender: Option<Gender>,
    /// Quality tier.
    #[serde(default)]
    pub tier: VoiceTier,
}

/// Supplies the available synthesis voices.
#[async_trait]
pub trait VoiceCatalog: Send + Sync {
    async fn get_voices(&self) -> Result<Vec<Voice>>;
}

/// Finds a voice by exact name. Definitive; skips all language logic.
pub fn find_voice_by_name<'a>(voices: &'a [Voice], name: &str) -> Option<&'a Voice> {
    voices.iter().find(|v| v.name == name)
}

/// Picks the best voice for a language tag, or `None` if nothing in the
/// catalog speaks it (the caller keeps whatever default voice it had).
pub fn select_voice<'a>(voices: &'a [Voice], lang: &str) -> Option<&'a Voice> {
    for tier in 0..4 {
        let candidates: Vec<&Voice> = voices
            .iter()
            .filter(|v| match tier {
                0 => v.tier == VoiceTier::Native,
                1 => matches!(v.tier, VoiceTier::Native | VoiceTier::Local),
                2 => v.tier != VoiceTier::Premium,
                _ => true,
            })
            .collect();
        if let Some(voice) = find_voice_by_lang(&candidates, lang) {
            return Some(voice);
        }
    }
    None
}

/// Resolves the voice name for a playback session: an explicit settings
/// name wins unchanged, otherwise language-tiered selection runs.
pub fn resolve_voice_name(voices: &[Voice], voice_name: Option<&str>, lang: Option<&str>) -> Option<String> {
    if let Some(name) = voice_name {
        return Some(
            find_voice_by_name(voices, name)
                .map(|v| v.name.clone())
                .unwrap_or_else(|| name.to_string()),
        );
    }
    lang.and_then(|l| select_voice(voices, l)).map(|v| v.name.clone())
}

/// Language tie-break within one tier.
///
/// Among voices sharing the primary subtag: exact primary+region match
/// first (female preferred), then a voice with no region, then a
/// region-mismatched voice — with en-US winning the mismatch slot when the
/// requested language is English.
fn find_voice_by_lang<'a>(voices: &[&'a Voice], lang: &str) -> Option<&'a Voice> {
    let requested = parse_lang(lang);
    let mut exact_female: Option<&'a Voice> = None;
    let mut exact: Option<&'a Voice> = None;
    let mut regionless: Option<&'a Voice> = None;
    let mut mismatched: Option<&'a Voice> = None;

    for voice in voices.iter().copied() {
        let Some(voice_lang) = &voice.lang else { continue };
        let candidate = parse_lang(voice_lang);
        if candidate.primary != requested.primary {
            continue;
        }
        if candidate.region == requested.region {
            if voice.gender == Some(Gender::Female) {
                exact_female.get_or_insert(voice);
            } else {
                exact.get_or_insert(voice);
            }
        } else if candidate.region.is_empty() {
            regionless.get_or_insert(voice);
        } else if candidate.primary == "en" && candidate.region == "us" {
            mismatched = Some(voice);
        } else {
            mismatched.get_or_insert(voice);
        }
    }
    exact_female.or(exact).or(regionless).or(mismatched)
}

struct LangTag {
    primary: String,
    region: String,
}

fn parse_lang(lang: &str) -> LangTag {
    let lower = lang.to_ascii_lowercase().replace('_', "-");
    match lower.split_once('-') {
        Some((primary, region)) => LangTag { primary: primary.to_string(), region: region.to_string() },
        None => LangTag { primary: lower, region: String::new() },
    }
}
