// Semantic Layer
// Optional LLM collaborator. Transport failures surface as errors so the caller
// can drop the layer; unreadable model output degrades to a neutral verdict.

use crate::models::{ModelSuggestion, SemanticAnalysis, SemanticLayerDetails};
use crate::services::config_store::SemanticConfig;
use crate::services::providers::{GeminiClient, ProviderError};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

/// Placeholder for sub-scores the collaborator does not measure separately.
const UNMEASURED_SCORE: f64 = 50.0;
const PARSE_FAILURE: &str = "unable to parse response";
const MAX_FALLBACK_SUGGESTIONS: usize = 5;

#[derive(Error, Debug)]
pub enum SemanticError {
    #[error("Semantic analysis is disabled")]
    Disabled,
    #[error("Semantic analysis timed out after {0}s")]
    Timeout(u64),
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

#[async_trait]
pub trait SemanticAnalyzer: Send + Sync {
    async fn analyze_text(&self, text: &str) -> Result<SemanticAnalysis, SemanticError>;

    /// Targeted rewrite advice for `issues` found in `text`. No issues, no call.
    async fn generate_suggestions(&self, text: &str, issues: &[String]) -> Result<Vec<ModelSuggestion>, SemanticError>;
}

pub fn layer_details(analysis: &SemanticAnalysis) -> SemanticLayerDetails {
    SemanticLayerDetails {
        coherence_score: UNMEASURED_SCORE,
        personalization_score: UNMEASURED_SCORE,
        ai_pattern_score: analysis.ai_probability,
        features: analysis.features.clone(),
        explanation: analysis.explanation.clone(),
        from_cache: analysis.from_cache,
    }
}

pub fn build_analysis_prompt(text: &str) -> String {
    format!(
        r#"You are an expert in detecting AI-generated writing. Analyze whether the following text was produced by a language model.

Text:
"""
{text}
"""

Return the analysis as JSON with exactly these fields:
{{
  "ai_probability": <number 0-100, likelihood the text is AI-generated>,
  "confidence": <number 0-1, confidence in this judgement>,
  "features": [
    {{
      "name": "<feature name>",
      "description": "<feature description>",
      "severity": "<low/medium/high>",
      "score": <0-100>
    }}
  ],
  "explanation": "<why you reached this judgement>",
  "suggestions": ["<improvement 1>", "<improvement 2>"]
}}

Return only the JSON, nothing else."#
    )
}

pub fn build_suggestion_prompt(text: &str, issues: &[String]) -> String {
    let issue_list = issues.join("\n- ");
    format!(
        r#"You are a writing coach. Based on the problems detected below, give concrete suggestions that make the text read as naturally human-written.

Text:
"""
{text}
"""

Detected problems:
- {issue_list}

Give 3-5 specific suggestions. For each one name the exact passage, how to change it, a rewritten example and why the change reads more naturally.

Return a JSON array:
[
  {{
    "type": "<problem type>",
    "priority": <1-5, 1 is most urgent>,
    "title": "<suggestion title>",
    "description": "<detailed description>",
    "original_text": "<passage from the text>",
    "suggested_text": "<rewritten passage>",
    "reason": "<why this is better>"
  }}
]

Return only the JSON array, nothing else."#
    )
}

fn strip_fences(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.trim_end().trim_end_matches("```"))
        .unwrap_or(trimmed)
        .trim()
}

/// Strips code fences and keeps the outermost `{ ... }` span.
pub fn extract_json(content: &str) -> Option<&str> {
    let unfenced = strip_fences(content);
    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    (start < end).then(|| &unfenced[start..=end])
}

/// Strips code fences and keeps the outermost `[ ... ]` span.
pub fn extract_json_array(content: &str) -> Option<&str> {
    let unfenced = strip_fences(content);
    let start = unfenced.find('[')?;
    let end = unfenced.rfind(']')?;
    (start < end).then(|| &unfenced[start..=end])
}

/// Interprets suggestion output; anything unreadable becomes one generic
/// suggestion per issue (at most five).
pub fn parse_suggestions(content: &str, issues: &[String]) -> Vec<ModelSuggestion> {
    let parsed = extract_json_array(content).and_then(|json| {
        serde_json::from_str::<Vec<ModelSuggestion>>(json)
            .map_err(|e| warn!("[SEMANTIC] suggestion JSON parse error: {}", e))
            .ok()
    });
    match parsed {
        Some(suggestions) => suggestions,
        None => fallback_suggestions(issues),
    }
}

fn fallback_suggestions(issues: &[String]) -> Vec<ModelSuggestion> {
    issues
        .iter()
        .take(MAX_FALLBACK_SUGGESTIONS)
        .enumerate()
        .map(|(i, issue)| ModelSuggestion {
            kind: "general".to_string(),
            priority: (i + 1) as u8,
            title: "Improvement suggestion".to_string(),
            description: issue.clone(),
            reason: "General advice based on the detected problem".to_string(),
            ..Default::default()
        })
        .collect()
}

/// Interprets model output; anything unreadable becomes the neutral verdict.
pub fn parse_analysis(content: &str) -> SemanticAnalysis {
    let Some(json) = extract_json(content) else {
        warn!("[SEMANTIC] no JSON object in response");
        return SemanticAnalysis::neutral(PARSE_FAILURE);
    };
    match serde_json::from_str::<SemanticAnalysis>(json) {
        Ok(analysis) => analysis.sanitized(),
        Err(e) => {
            warn!("[SEMANTIC] JSON parse error: {}", e);
            SemanticAnalysis::neutral(PARSE_FAILURE)
        }
    }
}

pub struct GeminiSemanticAnalyzer {
    client: GeminiClient,
}

impl GeminiSemanticAnalyzer {
    pub fn new(config: SemanticConfig) -> Result<Self, SemanticError> {
        if !config.enabled {
            return Err(SemanticError::Disabled);
        }
        Ok(Self {
            client: GeminiClient::new(config)?,
        })
    }

    pub fn client(&self) -> &GeminiClient {
        &self.client
    }
}

#[async_trait]
impl SemanticAnalyzer for GeminiSemanticAnalyzer {
    async fn analyze_text(&self, text: &str) -> Result<SemanticAnalysis, SemanticError> {
        let prompt = build_analysis_prompt(text);
        let response = self.client.generate_content(&prompt).await?;

        let mut analysis = parse_analysis(&response.content);
        analysis.from_cache = response.from_cache;
        info!(
            "[SEMANTIC] model={} ai_probability={:.1} confidence={:.2} cached={}",
            self.client.model(),
            analysis.ai_probability,
            analysis.confidence,
            analysis.from_cache
        );
        Ok(analysis)
    }

    async fn generate_suggestions(&self, text: &str, issues: &[String]) -> Result<Vec<ModelSuggestion>, SemanticError> {
        if issues.is_empty() {
            return Ok(Vec::new());
        }
        let prompt = build_suggestion_prompt(text, issues);
        let response = self.client.generate_content(&prompt).await?;

        let suggestions = parse_suggestions(&response.content, issues);
        info!(
            "[SEMANTIC] model={} suggestions={} for {} issues cached={}",
            self.client.model(),
            suggestions.len(),
            issues.len(),
            response.from_cache
        );
        Ok(suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_variants() {
        assert_eq!(extract_json(r#"{"a":1}"#), Some(r#"{"a":1}"#));
        assert_eq!(extract_json("```json\n{\"a\":1}\n```"), Some("{\"a\":1}"));
        assert_eq!(extract_json("Sure! {\"a\":{\"b\":2}} hope that helps"), Some("{\"a\":{\"b\":2}}"));
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[test]
    fn test_parse_analysis() {
        let content = r#"```json
{"ai_probability": 82, "confidence": 0.9, "features": [{"name": "uniform tone", "description": "flat", "severity": "high", "score": 80}],
 "explanation": "Very templated", "suggestions": ["Add anecdotes"]}
```"#;
        let analysis = parse_analysis(content);
        assert_eq!(analysis.ai_probability, 82.0);
        assert_eq!(analysis.confidence, 0.9);
        assert_eq!(analysis.features.len(), 1);
        assert_eq!(analysis.suggestions, vec!["Add anecdotes"]);
    }

    #[test]
    fn test_malformed_response_is_neutral() {
        for content in ["I cannot help with that", "{\"ai_probability\": \"high\"}", ""] {
            let analysis = parse_analysis(content);
            assert_eq!(analysis.ai_probability, 50.0);
            assert_eq!(analysis.confidence, 0.3);
            assert_eq!(analysis.explanation, PARSE_FAILURE);
        }
    }

    #[test]
    fn test_out_of_range_values_clamped() {
        let analysis = parse_analysis(r#"{"ai_probability": 140, "confidence": -2}"#);
        assert_eq!(analysis.ai_probability, 100.0);
        assert_eq!(analysis.confidence, 0.0);
    }

    #[test]
    fn test_prompt_embeds_text() {
        let prompt = build_analysis_prompt("hello there");
        assert!(prompt.contains("\"\"\"\nhello there\n\"\"\""));
        assert!(prompt.contains("\"ai_probability\""));
    }

    #[test]
    fn test_parse_suggestions() {
        let issues = vec!["3 overused keyword occurrences".to_string()];
        let content = r#"Here you go:
```json
[{"type": "vocabulary", "priority": 1, "title": "Swap stock words", "description": "Use plainer words",
  "original_text": "a crucial step", "suggested_text": "an important step", "reason": "reads naturally"}]
```"#;
        let suggestions = parse_suggestions(content, &issues);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].kind, "vocabulary");
        assert_eq!(suggestions[0].suggested_text, "an important step");
    }

    #[test]
    fn test_unreadable_suggestions_fall_back_to_issues() {
        let issues: Vec<String> = (1..=7).map(|i| format!("issue {}", i)).collect();
        for content in ["no array here", "[{\"priority\": \"urgent\"}]"] {
            let suggestions = parse_suggestions(content, &issues);
            assert_eq!(suggestions.len(), 5);
            assert_eq!(suggestions[0].description, "issue 1");
            assert_eq!(suggestions[0].priority, 1);
            assert_eq!(suggestions[4].priority, 5);
            assert_eq!(suggestions[0].kind, "general");
        }
    }

    #[test]
    fn test_suggestion_prompt_lists_issues() {
        let prompt = build_suggestion_prompt("body", &["first".to_string(), "second".to_string()]);
        assert!(prompt.contains("- first\n- second"));
        assert!(prompt.contains("\"suggested_text\""));
    }

    #[tokio::test]
    async fn test_no_issues_skips_the_model() {
        let config = SemanticConfig {
            enabled: true,
            api_key: Some("test-key".to_string()),
            endpoint: "http://127.0.0.1:9".to_string(),
            ..SemanticConfig::default()
        };
        let analyzer = GeminiSemanticAnalyzer::new(config).unwrap();
        assert!(analyzer.generate_suggestions("text", &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cached_suggestions_reuse_client_cache() {
        let config = SemanticConfig {
            enabled: true,
            api_key: Some("test-key".to_string()),
            endpoint: "http://127.0.0.1:9".to_string(),
            ..SemanticConfig::default()
        };
        let analyzer = GeminiSemanticAnalyzer::new(config).unwrap();
        let issues = vec!["Em dashes are overused".to_string()];
        let prompt = build_suggestion_prompt("text", &issues);
        analyzer.client().cache().unwrap().set(
            &prompt,
            r#"[{"type": "sentence", "priority": 2, "title": "Fewer dashes"}]"#.to_string(),
        );

        let suggestions = analyzer.generate_suggestions("text", &issues).await.unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].title, "Fewer dashes");
    }

    #[test]
    fn test_disabled_config_rejected() {
        assert!(matches!(
            GeminiSemanticAnalyzer::new(SemanticConfig::default()),
            Err(SemanticError::Disabled)
        ));
    }

    #[test]
    fn test_layer_details() {
        let mut analysis = SemanticAnalysis::neutral("x");
        analysis.ai_probability = 70.0;
        analysis.from_cache = true;
        let details = layer_details(&analysis);
        assert_eq!(details.ai_pattern_score, 70.0);
        assert_eq!(details.coherence_score, 50.0);
        assert!(details.from_cache);
    }
}
