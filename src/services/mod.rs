// HumanScore Core Services

pub mod config_store;
pub mod detection;
pub mod providers;
pub mod response_cache;
pub mod text_processor;

pub use config_store::*;
pub use providers::{GeminiClient, ProviderError};
pub use response_cache::ResponseCache;
pub use text_processor::*;

pub use detection::{Detector, DetectorError, RuleEngine, SemanticAnalyzer, StatisticsAnalyzer};
