pub mod error;
pub mod extract;
pub mod language;
pub mod node;
pub mod paragraphs;
pub mod session;
pub mod source;
pub mod speech;
pub mod voice;

pub use error::{RecitoError, Result};
pub use extract::{BlockOutline, ExtractConfig, extract_outline, extract_texts, extract_texts_with_config};
pub use language::{DETECTION_FLOOR_CHARS, LanguageGuess, LanguageProbe, detect_language, reconcile_language};
pub use node::{ContentNode, Layout};
pub use paragraphs::reconstruct_paragraphs;
pub use session::{Session, SessionBuilder, SessionEnd};
pub use source::{
    DocumentInfo, DocumentSource, PagedSource, SELECTION_INDEX, SimpleSource, TreeSource, poll_texts, remove_links,
    split_selection,
};
pub use speech::{
    DefaultSettings, EmptyCatalog, PlaybackState, Settings, SettingsSource, Speech, SpeechEngine, SpeechOptions,
    SpeechOutcome, defaults,
};
pub use voice::{Gender, Voice, VoiceCatalog, VoiceTier, find_voice_by_name, resolve_voice_name, select_voice};
