// Detection Pipeline
// Request -> rule engine -> scoring -> (optional) tiered multimodal fusion -> result

use super::fusion::{
    active_weights, fuse_confidence, fuse_scores, fusion_explanation, needs_semantic, needs_statistics, LayerSignal,
};
use super::rule_engine::RuleEngine;
use super::scoring::{rule_confidence, ScoreCalculator};
use super::semantic::{layer_details, GeminiSemanticAnalyzer, SemanticAnalyzer, SemanticError};
use super::statistics::{StatisticsAnalyzer, StatisticsResult};
use super::suggestions::{model_suggestions, suggestions_for};
use crate::models::{
    DetectionRequest, DetectionResult, MultimodalResult, RiskLevel, RuleLayerDetails, RuleResult, SemanticAnalysis,
    Score, Suggestion,
};
use crate::services::config_store::{AppConfig, ConfigError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

const MAX_MAIN_ISSUES: usize = 5;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Semantic layer unavailable: {0}")]
    Semantic(#[from] SemanticError),
}

pub struct Detector {
    config: AppConfig,
    engine: RuleEngine,
    scorer: ScoreCalculator,
    statistics: StatisticsAnalyzer,
    semantic: Option<Arc<dyn SemanticAnalyzer>>,
}

impl Detector {
    /// Validates `config` and wires the built-in detectors. When the semantic layer is
    /// switched on, a missing API key fails here rather than during analysis.
    pub fn new(config: AppConfig) -> Result<Self, DetectorError> {
        config.validate()?;

        let semantic: Option<Arc<dyn SemanticAnalyzer>> =
            if config.semantic.enabled && config.multimodal.enable_semantic {
                config.semantic.validate()?;
                Some(Arc::new(GeminiSemanticAnalyzer::new(config.semantic.clone())?))
            } else {
                None
            };

        let engine = RuleEngine::from_config(&config);
        info!(
            "[DETECTOR] ready rules={} multimodal={} semantic={}",
            engine.count_enabled_rules(),
            config.multimodal.enabled,
            semantic.is_some()
        );

        Ok(Self {
            scorer: ScoreCalculator::new(config.scoring),
            statistics: StatisticsAnalyzer::new(),
            engine,
            config,
            semantic,
        })
    }

    /// Replaces the semantic collaborator.
    pub fn with_semantic(mut self, analyzer: Arc<dyn SemanticAnalyzer>) -> Self {
        self.semantic = Some(analyzer);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    pub fn has_semantic(&self) -> bool {
        self.semantic.is_some()
    }

    /// Runs the full pipeline. Never fails for any text; collaborator trouble
    /// only removes that layer from the fusion.
    pub async fn analyze(&self, request: DetectionRequest) -> DetectionResult {
        let start = Instant::now();
        let text = request.text;

        let rule_results = match &request.rules {
            Some(subset) => self.engine.check_subset(&text, subset).await,
            None => self.engine.check(&text).await,
        };
        let mut score = self.scorer.calculate(&rule_results);
        let mut suggestions = suggestions_for(&rule_results);

        let multimodal = if request.multimodal || self.config.multimodal.enabled {
            let fused = self.fuse(&text, &rule_results, &score).await;
            score.total = fused.final_score;
            if fused.semantic_layer_details.is_some() {
                suggestions.extend(self.written_suggestions(&text, &rule_results).await);
            }
            Some(fused)
        } else {
            None
        };

        let risk_level = RiskLevel::from_score(score.total);
        let process_time_ms = start.elapsed().as_millis() as u64;
        info!(
            "[DETECTOR] score={:.2} risk={} detected={} time_ms={}",
            score.total,
            risk_level.label(),
            rule_results.iter().filter(|r| r.detected).count(),
            process_time_ms
        );

        DetectionResult {
            request_id: uuid::Uuid::new_v4().to_string(),
            text,
            score,
            rule_results,
            suggestions,
            risk_level,
            process_time_ms,
            detected_at: chrono::Utc::now().to_rfc3339(),
            multimodal,
        }
    }

    /// Tiered fusion over the rule score.
    async fn fuse(&self, text: &str, rule_results: &[RuleResult], score: &Score) -> MultimodalResult {
        let settings = &self.config.multimodal;
        let thresholds = &settings.confidence_thresholds;
        let tiered = settings.tiered_trigger;

        let rule_signal = LayerSignal::new(score.total, rule_confidence(score.total, rule_results));

        let statistics: Option<StatisticsResult> =
            if settings.enable_statistics && (!tiered || needs_statistics(rule_signal.confidence, thresholds)) {
                Some(self.statistics.analyze(text))
            } else {
                debug!(
                    "[MULTIMODAL] statistics skipped (rule confidence {:.2})",
                    rule_signal.confidence
                );
                None
            };
        let statistics_signal = statistics
            .as_ref()
            .map(|s| LayerSignal::new(s.human_score, 1.0 - s.ai_probability));

        // A skipped statistics layer stands in with the rule confidence
        let gate_confidence = statistics_signal.map_or(rule_signal.confidence, |s| s.confidence);
        let semantic: Option<SemanticAnalysis> = match &self.semantic {
            Some(analyzer)
                if settings.enable_semantic
                    && (!tiered || needs_semantic(rule_signal.confidence, gate_confidence, thresholds)) =>
            {
                self.run_semantic(analyzer.as_ref(), text).await
            }
            _ => {
                debug!("[MULTIMODAL] semantic layer not invoked");
                None
            }
        };
        let semantic_signal = semantic
            .as_ref()
            .map(|s| LayerSignal::new(100.0 - s.ai_probability, 1.0 - s.ai_probability / 100.0));

        let (detection_mode, layer_weights) =
            active_weights(&settings.weights, statistics_signal.is_some(), semantic_signal.is_some());

        let mut result = MultimodalResult {
            rule_layer_score: rule_signal.score,
            statistics_layer_score: statistics_signal.map(|s| s.score),
            semantic_layer_score: semantic_signal.map(|s| s.score),
            layer_weights,
            detection_mode,
            rule_confidence: rule_signal.confidence,
            statistics_confidence: statistics_signal.map(|s| s.confidence),
            semantic_confidence: semantic_signal.map(|s| s.confidence),
            rule_layer_details: rule_layer_details(rule_results, score),
            statistics_layer_details: statistics.as_ref().map(StatisticsResult::layer_details),
            semantic_layer_details: semantic.as_ref().map(layer_details),
            final_score: fuse_scores(rule_signal, statistics_signal, semantic_signal, &layer_weights),
            confidence: fuse_confidence(rule_signal, statistics_signal, semantic_signal, &layer_weights),
            fusion_explanation: String::new(),
        };
        result.fusion_explanation = fusion_explanation(&result);
        info!("[MULTIMODAL] {}", result.fusion_explanation);
        result
    }

    /// Asks the collaborator for rewrites of the detected issues. Failure keeps
    /// the template suggestions only.
    async fn written_suggestions(&self, text: &str, rule_results: &[RuleResult]) -> Vec<Suggestion> {
        let Some(analyzer) = &self.semantic else {
            return Vec::new();
        };
        let issues: Vec<String> = rule_results
            .iter()
            .filter(|r| r.detected)
            .map(|r| r.message.clone())
            .collect();

        let deadline = self.semantic_deadline();
        match tokio::time::timeout(deadline, analyzer.generate_suggestions(text, &issues)).await {
            Ok(Ok(written)) => {
                debug!("[MULTIMODAL] {} written suggestions for {} issues", written.len(), issues.len());
                model_suggestions(&written)
            }
            Ok(Err(e)) => {
                warn!("[MULTIMODAL] suggestion generation failed, keeping templates: {}", e);
                Vec::new()
            }
            Err(_) => {
                let e = SemanticError::Timeout(deadline.as_secs());
                warn!("[MULTIMODAL] suggestion generation: {}, keeping templates", e);
                Vec::new()
            }
        }
    }

    /// Calls the collaborator under an overall deadline; any failure drops the layer.
    async fn run_semantic(&self, analyzer: &dyn SemanticAnalyzer, text: &str) -> Option<SemanticAnalysis> {
        let deadline = self.semantic_deadline();
        match tokio::time::timeout(deadline, analyzer.analyze_text(text)).await {
            Ok(Ok(analysis)) => Some(analysis),
            Ok(Err(e)) => {
                warn!("[MULTIMODAL] semantic layer failed, continuing without it: {}", e);
                None
            }
            Err(_) => {
                let e = SemanticError::Timeout(deadline.as_secs());
                warn!("[MULTIMODAL] {}, continuing without it", e);
                None
            }
        }
    }

    /// Room for every retry attempt plus the backoff between them.
    fn semantic_deadline(&self) -> Duration {
        let semantic = &self.config.semantic;
        let attempts = semantic.retry.max_attempts.max(1);
        let backoff_ms: u64 = (1..attempts).map(|a| semantic.retry.backoff_ms(a)).sum();
        Duration::from_secs(semantic.timeout_secs.max(1) * attempts as u64) + Duration::from_millis(backoff_ms)
    }
}

fn rule_layer_details(rule_results: &[RuleResult], score: &Score) -> RuleLayerDetails {
    let detected: Vec<&RuleResult> = rule_results.iter().filter(|r| r.detected).collect();
    let mut main_issues: Vec<String> = Vec::new();
    for issue in score.dimensions.iter().flat_map(|d| d.issues.iter()) {
        if main_issues.len() >= MAX_MAIN_ISSUES {
            break;
        }
        if !main_issues.contains(issue) {
            main_issues.push(issue.clone());
        }
    }
    for result in detected.iter().filter(|r| r.rule_type.is_red_flag()) {
        if main_issues.len() >= MAX_MAIN_ISSUES {
            break;
        }
        main_issues.push(result.rule_name.clone());
    }

    RuleLayerDetails {
        detected_count: detected.len(),
        total_rules: rule_results.len(),
        red_flag_count: detected.iter().filter(|r| r.rule_type.is_red_flag()).count(),
        main_issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConfidenceThresholds, DetectionMode, ModelSuggestion, Priority, RuleType, SuggestionCategory};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const PERSONAL_TEXT: &str = "I think this is interesting. I feel that maybe we could try a different approach. \
        I'm not sure if this will work, but I believe it's worth trying.";

    const LEAKY_TEXT: &str = "As of my last knowledge update, the market is crucial and pivotal. \
        See https://example.com/?utm_source=chatgpt.com for the crucial details. \
        The result is vital. The outcome is significant.";

    struct SpyAnalyzer {
        calls: AtomicUsize,
        suggest_calls: AtomicUsize,
        issues_seen: Mutex<Vec<String>>,
        ai_probability: f64,
        fail_suggestions: bool,
    }

    impl SpyAnalyzer {
        fn new(ai_probability: f64) -> Arc<Self> {
            Arc::new(Self::build(ai_probability, false))
        }

        fn failing_suggestions(ai_probability: f64) -> Arc<Self> {
            Arc::new(Self::build(ai_probability, true))
        }

        fn build(ai_probability: f64, fail_suggestions: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                suggest_calls: AtomicUsize::new(0),
                issues_seen: Mutex::new(Vec::new()),
                ai_probability,
                fail_suggestions,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn suggest_calls(&self) -> usize {
            self.suggest_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SemanticAnalyzer for SpyAnalyzer {
        async fn analyze_text(&self, _text: &str) -> Result<SemanticAnalysis, SemanticError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut analysis = SemanticAnalysis::neutral("spy");
            analysis.ai_probability = self.ai_probability;
            analysis.confidence = 0.9;
            analysis.suggestions = vec!["Vary paragraph length".to_string()];
            Ok(analysis)
        }

        async fn generate_suggestions(&self, _text: &str, issues: &[String]) -> Result<Vec<ModelSuggestion>, SemanticError> {
            self.suggest_calls.fetch_add(1, Ordering::SeqCst);
            *self.issues_seen.lock().unwrap() = issues.to_vec();
            if self.fail_suggestions {
                return Err(SemanticError::Timeout(1));
            }
            Ok(vec![ModelSuggestion {
                kind: "vocabulary".to_string(),
                priority: 1,
                title: "Swap stock words".to_string(),
                description: "Say what you mean without crucial and pivotal".to_string(),
                original_text: "the market is crucial and pivotal".to_string(),
                suggested_text: "the market matters".to_string(),
                reason: "plainer".to_string(),
            }])
        }
    }

    struct FailingAnalyzer;

    #[async_trait]
    impl SemanticAnalyzer for FailingAnalyzer {
        async fn analyze_text(&self, _text: &str) -> Result<SemanticAnalysis, SemanticError> {
            Err(SemanticError::Disabled)
        }

        async fn generate_suggestions(&self, _text: &str, _issues: &[String]) -> Result<Vec<ModelSuggestion>, SemanticError> {
            Err(SemanticError::Disabled)
        }
    }

    fn low_confidence_config() -> AppConfig {
        let mut config = multimodal_config(true);
        config.multimodal.confidence_thresholds = ConfidenceThresholds {
            high: 1.0,
            medium: 1.0,
            low: 0.4,
        };
        config
    }

    fn multimodal_config(tiered: bool) -> AppConfig {
        let mut config = AppConfig::default();
        config.multimodal.enabled = true;
        config.multimodal.enable_semantic = true;
        config.multimodal.tiered_trigger = tiered;
        config
    }

    #[tokio::test]
    async fn test_rule_only_by_default() {
        let detector = Detector::new(AppConfig::default()).unwrap();
        let result = detector.analyze(DetectionRequest::new(PERSONAL_TEXT)).await;

        assert!(result.multimodal.is_none());
        assert_eq!(result.score.total, 100.0);
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert_eq!(result.rule_results.len(), detector.engine().count_enabled_rules());
        assert!(result.suggestions.is_empty());
        assert!(uuid::Uuid::parse_str(&result.request_id).is_ok());
        assert!(chrono::DateTime::parse_from_rfc3339(&result.detected_at).is_ok());
    }

    #[tokio::test]
    async fn test_knowledge_cutoff_halves_total() {
        let detector = Detector::new(AppConfig::default()).unwrap();
        let text = "As of my last knowledge update, I think I feel my idea might maybe work.";
        let result = detector.analyze(DetectionRequest::new(text)).await;

        let cutoff = result
            .rule_results
            .iter()
            .find(|r| r.rule_type == RuleType::KnowledgeCutoff)
            .unwrap();
        assert!(cutoff.detected);
        assert_eq!(cutoff.score, 0.0);
        assert!((result.score.total - 50.0).abs() < 1e-9);
        assert_eq!(result.risk_level, RiskLevel::High);
    }

    #[tokio::test]
    async fn test_empty_text_is_valid() {
        let detector = Detector::new(multimodal_config(false)).unwrap();
        let result = detector.analyze(DetectionRequest::new("")).await;

        assert_eq!(result.rule_results.len(), 10);
        assert!(result.rule_results.iter().all(|r| !r.detected));
        assert!(result.score.total.is_finite());
        let fused = result.multimodal.unwrap();
        assert!(fused.final_score.is_finite());
        assert!((0.0..=1.0).contains(&fused.confidence));
    }

    #[tokio::test]
    async fn test_repeated_runs_agree() {
        let detector = Detector::new(AppConfig::default()).unwrap();
        let first = detector.analyze(DetectionRequest::new(LEAKY_TEXT)).await;
        let second = detector.analyze(DetectionRequest::new(LEAKY_TEXT)).await;

        assert_eq!(first.rule_results, second.rule_results);
        assert_eq!(first.score, second.score);
        assert_ne!(first.request_id, second.request_id);
    }

    #[tokio::test]
    async fn test_rule_subset() {
        let detector = Detector::new(AppConfig::default()).unwrap();
        let mut request = DetectionRequest::new(LEAKY_TEXT);
        request.rules = Some(vec![RuleType::KnowledgeCutoff, RuleType::HighFrequencyWords]);
        let result = detector.analyze(request).await;

        let types: Vec<RuleType> = result.rule_results.iter().map(|r| r.rule_type).collect();
        assert_eq!(types, vec![RuleType::HighFrequencyWords, RuleType::KnowledgeCutoff]);
    }

    #[tokio::test]
    async fn test_confident_rules_skip_other_layers() {
        let spy = SpyAnalyzer::new(90.0);
        let detector = Detector::new(multimodal_config(true)).unwrap().with_semantic(spy.clone());
        let result = detector.analyze(DetectionRequest::new(PERSONAL_TEXT)).await;

        assert_eq!(spy.calls(), 0);
        assert_eq!(spy.suggest_calls(), 0);
        let fused = result.multimodal.unwrap();
        assert_eq!(fused.rule_confidence, 1.0);
        assert_eq!(fused.detection_mode, DetectionMode::RuleOnly);
        assert!(fused.statistics_layer_score.is_none());
        assert!(fused.semantic_layer_score.is_none());
        assert_eq!(fused.final_score, 100.0);
    }

    #[tokio::test]
    async fn test_low_confidence_invokes_semantic() {
        let spy = SpyAnalyzer::new(80.0);
        let detector = Detector::new(low_confidence_config()).unwrap().with_semantic(spy.clone());
        let result = detector.analyze(DetectionRequest::new(LEAKY_TEXT)).await;

        assert_eq!(spy.calls(), 1);
        let fused = result.multimodal.unwrap();
        assert_eq!(fused.detection_mode, DetectionMode::Multimodal);
        assert_eq!(fused.semantic_layer_score, Some(20.0));
        assert!((fused.semantic_confidence.unwrap() - 0.2).abs() < 1e-9);
        assert!((fused.layer_weights.total() - 1.0).abs() < 1e-9);
        assert_eq!(result.score.total, fused.final_score);
        assert!(fused.rule_layer_details.red_flag_count >= 2);
    }

    #[tokio::test]
    async fn test_semantic_run_appends_written_suggestions() {
        let spy = SpyAnalyzer::new(80.0);
        let detector = Detector::new(low_confidence_config()).unwrap().with_semantic(spy.clone());
        let result = detector.analyze(DetectionRequest::new(LEAKY_TEXT)).await;

        assert_eq!(spy.suggest_calls(), 1);
        let detected: Vec<String> = result
            .rule_results
            .iter()
            .filter(|r| r.detected)
            .map(|r| r.message.clone())
            .collect();
        assert!(!detected.is_empty());
        assert_eq!(*spy.issues_seen.lock().unwrap(), detected);

        let templates = suggestions_for(&result.rule_results);
        assert_eq!(result.suggestions.len(), templates.len() + 1);
        assert_eq!(result.suggestions[..templates.len()], templates[..]);
        let written = result.suggestions.last().unwrap();
        assert_eq!(written.category, SuggestionCategory::Authenticity);
        assert_eq!(written.priority, Priority::High);
        assert!(written.related_rule.is_none());
        assert_eq!(written.examples[0].after, "the market matters");
    }

    #[tokio::test]
    async fn test_failed_suggestions_keep_templates() {
        let spy = SpyAnalyzer::failing_suggestions(80.0);
        let detector = Detector::new(low_confidence_config()).unwrap().with_semantic(spy.clone());
        let result = detector.analyze(DetectionRequest::new(LEAKY_TEXT)).await;

        assert_eq!(spy.suggest_calls(), 1);
        assert!(result.multimodal.unwrap().semantic_layer_details.is_some());
        assert_eq!(result.suggestions, suggestions_for(&result.rule_results));
    }

    #[tokio::test]
    async fn test_no_semantic_layer_no_written_suggestions() {
        let spy = SpyAnalyzer::new(80.0);
        let mut config = low_confidence_config();
        config.multimodal.enable_semantic = false;
        let detector = Detector::new(config).unwrap().with_semantic(spy.clone());
        let result = detector.analyze(DetectionRequest::new(LEAKY_TEXT)).await;

        assert_eq!(spy.calls(), 0);
        assert_eq!(spy.suggest_calls(), 0);
        assert_eq!(result.suggestions, suggestions_for(&result.rule_results));
    }

    #[tokio::test]
    async fn test_untiered_runs_every_layer() {
        let spy = SpyAnalyzer::new(50.0);
        let detector = Detector::new(multimodal_config(false)).unwrap().with_semantic(spy.clone());
        let result = detector.analyze(DetectionRequest::new(PERSONAL_TEXT)).await;

        assert_eq!(spy.calls(), 1);
        let fused = result.multimodal.unwrap();
        assert!(fused.statistics_layer_details.is_some());
        assert!(fused.semantic_layer_details.is_some());
    }

    #[tokio::test]
    async fn test_failing_semantic_layer_is_dropped() {
        let detector = Detector::new(multimodal_config(false))
            .unwrap()
            .with_semantic(Arc::new(FailingAnalyzer));
        let result = detector.analyze(DetectionRequest::new(LEAKY_TEXT)).await;

        let fused = result.multimodal.unwrap();
        assert!(fused.semantic_layer_score.is_none());
        assert_eq!(fused.detection_mode, DetectionMode::RuleStatistics);
        assert_eq!(fused.layer_weights, crate::models::LayerWeights::rule_statistics());
    }

    #[tokio::test]
    async fn test_request_can_force_multimodal() {
        let detector = Detector::new(AppConfig::default()).unwrap();
        let mut request = DetectionRequest::new(LEAKY_TEXT);
        request.multimodal = true;
        let result = detector.analyze(request).await;

        let fused = result.multimodal.unwrap();
        assert!(fused.statistics_layer_score.is_some());
        assert!(fused.semantic_layer_score.is_none());
    }

    #[test]
    fn test_missing_key_fails_construction() {
        let mut config = multimodal_config(true);
        config.semantic.enabled = true;
        config.semantic.api_key = None;
        assert!(matches!(
            Detector::new(config),
            Err(DetectorError::Config(ConfigError::MissingApiKey))
        ));
    }

    #[test]
    fn test_semantic_deadline_covers_retries() {
        let detector = Detector::new(AppConfig::default()).unwrap();
        // 3 attempts x 30s plus 1s + 2s of backoff
        assert_eq!(detector.semantic_deadline(), Duration::from_secs(93));
    }
}
