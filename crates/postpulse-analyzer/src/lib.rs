pub mod document;
pub mod emergency;
pub mod error;
pub mod fallback;
pub mod name;
pub mod orchestrator;
pub mod profile;
pub mod rate_limit;
pub mod recency;
pub mod scanner;
pub mod source;

pub use document::{DocumentQuery, FragmentQuery, PageDocument, PageFragment};
pub use error::AnalyzerError;
pub use fallback::{FallbackEstimate, FallbackEstimator};
pub use name::{is_loosely_valid_profile_name, is_valid_profile_name, NameExtractor, NameStrategy};
pub use orchestrator::{Analyzer, AnalyzerSettings, SourceAnalysis};
pub use profile::{load_profile, EmergencyTuning, FallbackTuning, HeuristicsProfile, SelectorTable};
pub use rate_limit::FixedWindowLimiter;
pub use recency::{RecencyClassifier, RecencyVerdict, RecencyWindow};
pub use scanner::ContentScanner;
pub use source::{document_fingerprint, DocumentSource, FileSource, HttpSource, StaticSource};
