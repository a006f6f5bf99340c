// Suggestion Templates
// Fixed mapping from detected rule types to rewrite advice.

use crate::models::{ModelSuggestion, Priority, RuleResult, RuleType, Suggestion, SuggestionCategory, SuggestionExample};

struct Template {
    category: SuggestionCategory,
    priority: Priority,
    title: &'static str,
    description: &'static str,
    /// (before, after, reason)
    example: Option<(&'static str, &'static str, &'static str)>,
}

fn template(rule_type: RuleType) -> Template {
    use Priority::*;
    use SuggestionCategory::*;

    match rule_type {
        RuleType::HighFrequencyWords => Template {
            category: Vocabulary,
            priority: High,
            title: "Reduce overused AI vocabulary",
            description: "Avoid leaning on words such as crucial, pivotal and vital; prefer plainer, more varied wording.",
            example: Some((
                "This is a crucial step in the process.",
                "This is an important step in the process.",
                "Swap the stock word for a natural one",
            )),
        },
        RuleType::SentenceStarters => Template {
            category: Sentence,
            priority: High,
            title: "Vary how sentences begin",
            description: "Stop opening sentences with Additionally, Furthermore or Moreover; mix up the sentence structure.",
            example: Some((
                "Additionally, we need to consider the cost. Furthermore, the timeline is important.",
                "We also need to consider the cost. The timeline matters too.",
                "Connect ideas without stock connectives",
            )),
        },
        RuleType::FalseRange => Template {
            category: Structure,
            priority: Medium,
            title: "Replace sweeping \"from X to Y\" ranges",
            description: "Ranges between unrelated categories read as filler; name the specific things you mean.",
            example: Some((
                "AI is changing everything from healthcare to entertainment.",
                "AI is changing how hospitals triage patients.",
                "Be concrete instead of implying a spectrum",
            )),
        },
        RuleType::CitationAnomaly => Template {
            category: Formatting,
            priority: High,
            title: "Clean AI citation markers",
            description: "Remove chatbot UTM parameters, ghost citation markers and placeholder dates.",
            example: None,
        },
        RuleType::EmDashDensity => Template {
            category: Sentence,
            priority: Medium,
            title: "Use fewer em dashes",
            description: "Em dashes (\u{2014}) in moderation are fine; heavy use looks generated. Try commas, parentheses or separate sentences.",
            example: None,
        },
        RuleType::MarkdownResidue => Template {
            category: Formatting,
            priority: High,
            title: "Remove leftover markdown",
            description: "Strip markdown syntax such as ##, ** and [](), so the text reads as clean prose.",
            example: None,
        },
        RuleType::EmojiAnomaly => Template {
            category: Formatting,
            priority: Medium,
            title: "Cut decorative emoji",
            description: "Dense emoji decoration is typical of chatbot output; keep only the ones that carry meaning.",
            example: None,
        },
        RuleType::KnowledgeCutoff => Template {
            category: Authenticity,
            priority: High,
            title: "Remove knowledge-cutoff phrases",
            description: "Delete phrases such as \"As of my last knowledge update\" that only a language model would write.",
            example: None,
        },
        RuleType::CollaborativeTone => Template {
            category: Tone,
            priority: High,
            title: "Drop the assistant tone",
            description: "Remove helper phrases such as \"I hope this helps\" and write in your own voice.",
            example: None,
        },
        RuleType::Perfectionism => Template {
            category: Authenticity,
            priority: High,
            title: "Add a personal voice",
            description: "Use first person, emotional words and some hedging so the text sounds like a person wrote it.",
            example: Some((
                "The solution is optimal and will work perfectly.",
                "I think this solution should work well, though we might need to adjust it.",
                "Add a personal view and some honest uncertainty",
            )),
        },
    }
}

pub fn suggestion_for(rule_type: RuleType) -> Suggestion {
    let t = template(rule_type);
    Suggestion {
        category: t.category,
        priority: t.priority,
        title: t.title.to_string(),
        description: t.description.to_string(),
        examples: t
            .example
            .map(|(before, after, reason)| SuggestionExample {
                before: before.to_string(),
                after: after.to_string(),
                reason: reason.to_string(),
            })
            .into_iter()
            .collect(),
        related_rule: Some(rule_type),
    }
}

/// One suggestion per detected rule, in result order.
pub fn suggestions_for(results: &[RuleResult]) -> Vec<Suggestion> {
    results
        .iter()
        .filter(|r| r.detected)
        .map(|r| suggestion_for(r.rule_type))
        .collect()
}

/// Model-written advice, appended after the rule-based ones. Not tied to any rule.
pub fn model_suggestions(suggestions: &[ModelSuggestion]) -> Vec<Suggestion> {
    suggestions
        .iter()
        .map(|s| {
            let priority = match s.priority {
                0..=2 => Priority::High,
                3 => Priority::Medium,
                _ => Priority::Low,
            };
            let examples = (!s.original_text.is_empty() && !s.suggested_text.is_empty())
                .then(|| SuggestionExample {
                    before: s.original_text.clone(),
                    after: s.suggested_text.clone(),
                    reason: s.reason.clone(),
                })
                .into_iter()
                .collect();
            Suggestion {
                category: SuggestionCategory::Authenticity,
                priority,
                title: s.title.clone(),
                description: s.description.clone(),
                examples,
                related_rule: None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;

    #[test]
    fn test_only_detected_rules_produce_suggestions() {
        let mut hit = RuleResult::new(RuleType::HighFrequencyWords, "hfw", "", Severity::High, 3);
        hit.detected = true;
        let miss = RuleResult::new(RuleType::EmDashDensity, "dash", "", Severity::Medium, 5);

        let suggestions = suggestions_for(&[hit, miss]);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].category, SuggestionCategory::Vocabulary);
        assert_eq!(suggestions[0].related_rule, Some(RuleType::HighFrequencyWords));
        assert_eq!(suggestions[0].examples[0].after, "This is an important step in the process.");
    }

    #[test]
    fn test_every_rule_has_a_template() {
        for rule_type in RuleType::ALL {
            let s = suggestion_for(rule_type);
            assert!(!s.title.is_empty());
            assert!(!s.description.is_empty());
        }
    }

    #[test]
    fn test_model_suggestions_mapping() {
        let written = |priority: u8, original: &str| ModelSuggestion {
            kind: "tone".to_string(),
            priority,
            title: "Sound less like an assistant".to_string(),
            description: "Drop the sign-off".to_string(),
            original_text: original.to_string(),
            suggested_text: "Thanks.".to_string(),
            reason: "plainer".to_string(),
        };
        let suggestions = model_suggestions(&[written(1, "I hope this helps!"), written(3, ""), written(5, "x")]);

        let priorities: Vec<Priority> = suggestions.iter().map(|s| s.priority).collect();
        assert_eq!(priorities, vec![Priority::High, Priority::Medium, Priority::Low]);
        assert!(suggestions.iter().all(|s| s.category == SuggestionCategory::Authenticity));
        assert!(suggestions.iter().all(|s| s.related_rule.is_none()));
        assert_eq!(suggestions[0].examples[0].before, "I hope this helps!");
        assert_eq!(suggestions[0].examples[0].reason, "plainer");
        assert!(suggestions[1].examples.is_empty());
    }
}
