// Detection Module
// Text humanness detection organized into specialized submodules:
// - rules / rule_engine: ten heuristic detectors fanned out concurrently
// - statistics: lexical diversity, sentence structure and trigram perplexity
// - scoring: dimension scores and multiplicative red-flag penalties
// - fusion: tier gates and weighted fusion of the analysis layers
// - semantic: optional LLM collaborator
// - analyzer: the request pipeline tying it all together

pub mod analyzer;
pub mod fusion;
pub mod rule_engine;
pub mod rules;
pub mod scoring;
pub mod semantic;
pub mod statistics;
pub mod suggestions;

pub use analyzer::{Detector, DetectorError};
pub use fusion::{active_weights, fuse_confidence, fuse_scores, needs_semantic, needs_statistics, LayerSignal};
pub use rule_engine::RuleEngine;
pub use rules::{build_rules, Rule};
pub use scoring::{rule_confidence, RedFlagPenalty, ScoreCalculator, RED_FLAG_FLOOR};
pub use semantic::{GeminiSemanticAnalyzer, SemanticAnalyzer, SemanticError};
pub use statistics::{analyze_statistics, StatisticsAnalyzer, StatisticsResult};
pub use suggestions::{suggestion_for, suggestions_for};
