//! LLM collaborator interfaces: judge, comparator, and anonymizer.
//!
//! Each is a narrow async trait so the engine's tests can inject deterministic
//! fakes; production wiring selects the LLM-backed implementations at startup.
//! Parsing is lenient about surrounding prose but strict about fields.

use std::sync::Arc;

use serde::Deserialize;

use crate::gateway::{ChatGateway, ChatModel, ChatRequest, ProviderError};
use crate::model::{Band, Decision, Language, Winner};
use crate::prompts::{anonymizer_prompt, comparator_prompt, judge_prompt, ComparisonSide};

/// Hard cap on generation for a judge verdict.
///
/// Keeps costs bounded and ensures responses stay in the small JSON schema.
const JUDGE_MAX_OUTPUT_TOKENS: u32 = 384;
const COMPARE_MAX_OUTPUT_TOKENS: u32 = 256;
const ANONYMIZE_MAX_OUTPUT_TOKENS: u32 = 256;

/// Error type for collaborator calls.
#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("Parse error: {0}")]
    Parse(String),
}

// =============================================================================
// Verdict types
// =============================================================================

/// Idea material handed to the judge.
#[derive(Debug, Clone)]
pub struct JudgeInput {
    pub text: String,
    pub category: Option<String>,
    pub stage: Option<String>,
    pub language: Language,
}

/// The judge's two-axis verdict for one idea.
#[derive(Debug, Clone)]
pub struct JudgeVerdict {
    pub viability: u8,
    pub excellence: u8,
    pub decision: Decision,
    pub uncertainty: Band,
    pub top_risks: Vec<String>,
    pub key_enablers: Vec<String>,
}

/// The comparator's verdict for a head-to-head pair.
#[derive(Debug, Clone)]
pub struct CompareVerdict {
    pub winner: Winner,
    pub reasons: Vec<String>,
    pub confidence: Band,
}

/// Anonymized restatement of a public idea.
#[derive(Debug, Clone)]
pub struct AnonymizedIdea {
    pub summary: String,
    pub category: String,
}

// =============================================================================
// Traits
// =============================================================================

#[async_trait::async_trait]
pub trait Judge: Send + Sync {
    async fn evaluate(&self, input: &JudgeInput) -> Result<JudgeVerdict, JudgeError>;
}

#[async_trait::async_trait]
pub trait Comparator: Send + Sync {
    async fn compare(
        &self,
        a: &ComparisonSide,
        b: &ComparisonSide,
    ) -> Result<CompareVerdict, JudgeError>;
}

#[async_trait::async_trait]
pub trait Anonymizer: Send + Sync {
    async fn anonymize(
        &self,
        text: &str,
        category: Option<&str>,
        language: Language,
    ) -> Result<AnonymizedIdea, JudgeError>;
}

// =============================================================================
// JSON parsing
// =============================================================================

#[derive(Debug, Deserialize)]
struct JudgeJson {
    #[serde(default)]
    viability: Option<f64>,
    #[serde(default)]
    excellence: Option<f64>,
    #[serde(default)]
    decision: Option<String>,
    #[serde(default)]
    uncertainty: Option<String>,
    #[serde(default)]
    top_risks: Option<Vec<String>>,
    #[serde(default)]
    key_enablers: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct CompareJson {
    #[serde(default)]
    winner: Option<String>,
    #[serde(default)]
    reasons: Option<Vec<String>>,
    #[serde(default)]
    confidence: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnonymizeJson {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

/// Parse the judge's JSON response into a verdict.
pub fn parse_judge_response(raw: &str) -> Result<JudgeVerdict, JudgeError> {
    let parsed: JudgeJson = serde_json::from_str(extract_json(raw))
        .map_err(|e| JudgeError::Parse(e.to_string()))?;

    let viability = score_field(parsed.viability, "viability")?;
    let excellence = score_field(parsed.excellence, "excellence")?;

    let decision = parsed
        .decision
        .as_deref()
        .and_then(Decision::parse)
        .ok_or_else(|| JudgeError::Parse("missing or invalid 'decision'".into()))?;
    let uncertainty = parsed
        .uncertainty
        .as_deref()
        .and_then(Band::parse)
        .ok_or_else(|| JudgeError::Parse("missing or invalid 'uncertainty'".into()))?;

    Ok(JudgeVerdict {
        viability,
        excellence,
        decision,
        uncertainty,
        top_risks: trim_list(parsed.top_risks),
        key_enablers: trim_list(parsed.key_enablers),
    })
}

/// Parse the comparator's JSON response into a verdict.
pub fn parse_compare_response(raw: &str) -> Result<CompareVerdict, JudgeError> {
    let parsed: CompareJson = serde_json::from_str(extract_json(raw))
        .map_err(|e| JudgeError::Parse(e.to_string()))?;

    let winner = parsed
        .winner
        .as_deref()
        .and_then(Winner::parse)
        .ok_or_else(|| JudgeError::Parse("missing or invalid 'winner'".into()))?;
    let confidence = parsed
        .confidence
        .as_deref()
        .and_then(Band::parse)
        .ok_or_else(|| JudgeError::Parse("missing or invalid 'confidence'".into()))?;

    Ok(CompareVerdict {
        winner,
        reasons: trim_list(parsed.reasons),
        confidence,
    })
}

/// Parse the anonymizer's JSON response.
pub fn parse_anonymize_response(raw: &str) -> Result<AnonymizedIdea, JudgeError> {
    let parsed: AnonymizeJson = serde_json::from_str(extract_json(raw))
        .map_err(|e| JudgeError::Parse(e.to_string()))?;

    let summary = parsed
        .summary
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| JudgeError::Parse("missing 'summary'".into()))?;
    let category = parsed
        .category
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| JudgeError::Parse("missing 'category'".into()))?;

    Ok(AnonymizedIdea { summary, category })
}

fn score_field(value: Option<f64>, name: &str) -> Result<u8, JudgeError> {
    let v = value.ok_or_else(|| JudgeError::Parse(format!("missing '{name}'")))?;
    if !v.is_finite() || !(0.0..=100.0).contains(&v) {
        return Err(JudgeError::Parse(format!(
            "'{name}' out of range [0,100]: {v}"
        )));
    }
    Ok(v.round() as u8)
}

fn trim_list(list: Option<Vec<String>>) -> Vec<String> {
    list.unwrap_or_default()
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(3)
        .collect()
}

/// Extract JSON object from response (handles models that add surrounding text).
fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();

    if let Some(start) = trimmed.find('{') {
        let remainder = &trimmed[start..];
        let mut depth = 0;
        for (i, c) in remainder.char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return &remainder[..=i];
                    }
                }
                _ => {}
            }
        }
    }

    trimmed
}

// =============================================================================
// LLM-backed implementations
// =============================================================================

/// LLM judge over a chat gateway.
pub struct LlmJudge {
    gateway: Arc<dyn ChatGateway>,
    model: String,
}

impl LlmJudge {
    pub fn new(gateway: Arc<dyn ChatGateway>, model: impl Into<String>) -> Self {
        Self {
            gateway,
            model: model.into(),
        }
    }
}

#[async_trait::async_trait]
impl Judge for LlmJudge {
    async fn evaluate(&self, input: &JudgeInput) -> Result<JudgeVerdict, JudgeError> {
        let prompt = judge_prompt(
            &input.text,
            input.category.as_deref(),
            input.stage.as_deref(),
            input.language,
        );
        let request = ChatRequest::new(
            ChatModel::openrouter(&self.model),
            prompt.to_messages(),
        )
        .max_tokens(JUDGE_MAX_OUTPUT_TOKENS)
        .json();

        let response = self.gateway.chat(request).await?;
        parse_judge_response(&response.content)
    }
}

/// LLM comparator over a chat gateway.
pub struct LlmComparator {
    gateway: Arc<dyn ChatGateway>,
    model: String,
}

impl LlmComparator {
    pub fn new(gateway: Arc<dyn ChatGateway>, model: impl Into<String>) -> Self {
        Self {
            gateway,
            model: model.into(),
        }
    }
}

#[async_trait::async_trait]
impl Comparator for LlmComparator {
    async fn compare(
        &self,
        a: &ComparisonSide,
        b: &ComparisonSide,
    ) -> Result<CompareVerdict, JudgeError> {
        let prompt = comparator_prompt(a, b);
        let request = ChatRequest::new(
            ChatModel::openrouter(&self.model),
            prompt.to_messages(),
        )
        .max_tokens(COMPARE_MAX_OUTPUT_TOKENS)
        .json();

        let response = self.gateway.chat(request).await?;
        parse_compare_response(&response.content)
    }
}

/// LLM anonymizer over a chat gateway.
pub struct LlmAnonymizer {
    gateway: Arc<dyn ChatGateway>,
    model: String,
}

impl LlmAnonymizer {
    pub fn new(gateway: Arc<dyn ChatGateway>, model: impl Into<String>) -> Self {
        Self {
            gateway,
            model: model.into(),
        }
    }
}

#[async_trait::async_trait]
impl Anonymizer for LlmAnonymizer {
    async fn anonymize(
        &self,
        text: &str,
        category: Option<&str>,
        language: Language,
    ) -> Result<AnonymizedIdea, JudgeError> {
        let prompt = anonymizer_prompt(text, category, language);
        let request = ChatRequest::new(
            ChatModel::openrouter(&self.model),
            prompt.to_messages(),
        )
        .max_tokens(ANONYMIZE_MAX_OUTPUT_TOKENS)
        .json();

        let response = self.gateway.chat(request).await?;
        parse_anonymize_response(&response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_judge_json() {
        let raw = r#"{"viability": 72, "excellence": 65, "decision": "Go",
            "uncertainty": "Med", "top_risks": ["churn"], "key_enablers": ["niche demand"]}"#;
        let v = parse_judge_response(raw).unwrap();
        assert_eq!(v.viability, 72);
        assert_eq!(v.excellence, 65);
        assert_eq!(v.decision, Decision::Go);
        assert_eq!(v.uncertainty, Band::Med);
        assert_eq!(v.top_risks, vec!["churn"]);
    }

    #[test]
    fn parse_judge_json_with_surrounding_text() {
        let raw = "Here is my verdict:\n{\"viability\": 40, \"excellence\": 80, \
            \"decision\": \"Drop\", \"uncertainty\": \"High\"}\nLet me know.";
        let v = parse_judge_response(raw).unwrap();
        assert_eq!(v.viability, 40);
        assert_eq!(v.decision, Decision::Drop);
        assert!(v.top_risks.is_empty());
    }

    #[test]
    fn parse_judge_rejects_out_of_range_score() {
        let raw = r#"{"viability": 120, "excellence": 65, "decision": "Go", "uncertainty": "Low"}"#;
        let err = parse_judge_response(raw).unwrap_err();
        assert!(matches!(err, JudgeError::Parse(_)));
    }

    #[test]
    fn parse_judge_rejects_missing_decision() {
        let raw = r#"{"viability": 70, "excellence": 65, "uncertainty": "Low"}"#;
        assert!(parse_judge_response(raw).is_err());
    }

    #[test]
    fn parse_judge_caps_lists_at_three() {
        let raw = r#"{"viability": 70, "excellence": 65, "decision": "Go", "uncertainty": "Low",
            "top_risks": ["a", "b", "c", "d", "e"]}"#;
        let v = parse_judge_response(raw).unwrap();
        assert_eq!(v.top_risks.len(), 3);
    }

    #[test]
    fn parse_valid_compare_json() {
        let raw = r#"{"winner": "B", "reasons": ["larger market"], "confidence": "High"}"#;
        let v = parse_compare_response(raw).unwrap();
        assert_eq!(v.winner, Winner::B);
        assert_eq!(v.confidence, Band::High);
    }

    #[test]
    fn parse_compare_accepts_tie_case_insensitively() {
        let raw = r#"{"winner": "tie", "confidence": "Low"}"#;
        let v = parse_compare_response(raw).unwrap();
        assert_eq!(v.winner, Winner::Tie);
        assert!(v.reasons.is_empty());
    }

    #[test]
    fn parse_compare_rejects_unknown_winner() {
        let raw = r#"{"winner": "C", "confidence": "Low"}"#;
        assert!(parse_compare_response(raw).is_err());
    }

    #[test]
    fn parse_anonymize_requires_both_fields() {
        let ok = parse_anonymize_response(
            r#"{"summary": "A subscription service for plants.", "category": "E-commerce"}"#,
        )
        .unwrap();
        assert_eq!(ok.category, "E-commerce");

        assert!(parse_anonymize_response(r#"{"summary": "only a summary"}"#).is_err());
        assert!(parse_anonymize_response(r#"{"summary": "  ", "category": "x"}"#).is_err());
    }
}
