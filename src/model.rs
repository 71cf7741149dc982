//! Core data model for the idea-ranking engine.
//!
//! Four entities: an [`Idea`] (immutable submitted text), its [`Evaluation`]s
//! (latest by timestamp is current), at most one [`Rating`] (Elo state, created
//! when the idea clears the viability threshold), and an append-only log of
//! [`MatchRecord`]s.

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

// =============================================================================
// Engine constants
// =============================================================================

/// Minimum viability score before an idea enters the rated population.
pub const VIABILITY_RANKING_THRESHOLD: u8 = 60;

/// Every rating starts here.
pub const STARTING_ELO: i64 = 1500;

/// Matches the Auto-Matcher tries to accumulate for a newly rated idea.
pub const DEFAULT_MATCH_TARGET: u32 = 5;

/// Minimum matches before an idea appears on the leaderboard or earns a badge.
pub const MIN_RANKED_MATCHES: u32 = 3;

/// Candidate opponents fetched per match still needed, to tolerate failures.
pub const CANDIDATE_FETCH_MULTIPLIER: usize = 2;

/// Minimum idea text length accepted by the Evaluation Pipeline.
pub const MIN_IDEA_TEXT_LEN: usize = 10;

// =============================================================================
// Enums
// =============================================================================

/// Judge's go/no-go call for one idea.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Go,
    ConditionalGo,
    Drop,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Go => "Go",
            Decision::ConditionalGo => "Conditional Go",
            Decision::Drop => "Drop",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "go" => Some(Decision::Go),
            "conditional go" | "conditional_go" | "conditional" => Some(Decision::ConditionalGo),
            "drop" => Some(Decision::Drop),
            _ => None,
        }
    }
}

/// Three-level band used for both judge uncertainty and comparator confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Low,
    Med,
    High,
}

impl Band {
    pub fn as_str(&self) -> &'static str {
        match self {
            Band::Low => "Low",
            Band::Med => "Med",
            Band::High => "High",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Band::Low),
            "med" | "medium" => Some(Band::Med),
            "high" => Some(Band::High),
            _ => None,
        }
    }
}

/// Winner of a head-to-head match, from the first-named idea's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    A,
    B,
    Tie,
}

impl Winner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Winner::A => "A",
            Winner::B => "B",
            Winner::Tie => "Tie",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "A" => Some(Winner::A),
            "B" => Some(Winner::B),
            "TIE" => Some(Winner::Tie),
            _ => None,
        }
    }

    /// Numeric match outcome for idea A: win 1.0, loss 0.0, tie 0.5.
    pub fn outcome_for_a(&self) -> f64 {
        match self {
            Winner::A => 1.0,
            Winner::B => 0.0,
            Winner::Tie => 0.5,
        }
    }
}

/// These enums cross the wire as their display strings ("Conditional Go",
/// "Med", "Tie"), matching what existing clients expect.
macro_rules! string_serde {
    ($ty:ty, $expected:literal) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Self::parse(&raw)
                    .ok_or_else(|| D::Error::custom(format!(concat!("invalid ", $expected, ": {}"), raw)))
            }
        }
    };
}

string_serde!(Decision, "decision");
string_serde!(Band, "band");
string_serde!(Winner, "winner");

/// Response language for LLM collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Zh,
    En,
}

impl Default for Language {
    fn default() -> Self {
        Language::En
    }
}

// =============================================================================
// Entities
// =============================================================================

/// An evaluated proposal. Text is immutable once created; only the visibility
/// flag and derived summary are set, at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Idea {
    pub id: Uuid,
    pub text: String,
    pub category: Option<String>,
    pub stage: Option<String>,
    pub user_id: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
    pub is_public: bool,
    /// AI-generated anonymized restatement; populated only when `is_public`.
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The judge's verdict for one idea at one point in time. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub idea_id: Uuid,
    pub viability: u8,
    pub excellence: u8,
    pub decision: Decision,
    pub uncertainty: Band,
    pub top_risks: Vec<String>,
    pub key_enablers: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Evaluation {
    pub fn eligible_for_ranking(&self) -> bool {
        self.viability >= VIABILITY_RANKING_THRESHOLD
    }
}

/// Competitive state of one idea. Elo and match count mutate together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub idea_id: Uuid,
    pub elo_score: i64,
    pub match_count: u32,
    pub updated_at: DateTime<Utc>,
}

/// Immutable record of one head-to-head comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub idea_a: Uuid,
    pub idea_b: Uuid,
    pub winner: Winner,
    pub reasons: Vec<String>,
    pub confidence: Band,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Operation payloads
// =============================================================================

/// Input to the Evaluate operation.
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateRequest {
    /// Re-evaluate an existing idea instead of creating a new one.
    #[serde(default)]
    pub idea_id: Option<Uuid>,
    pub text: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub language: Option<Language>,
}

/// Output of the Evaluate operation: the full verdict plus the ranking flag.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluateResponse {
    pub idea_id: Uuid,
    pub viability: u8,
    pub excellence: u8,
    pub decision: Decision,
    pub uncertainty: Band,
    pub top_risks: Vec<String>,
    pub key_enablers: Vec<String>,
    pub eligible_for_ranking: bool,
}

/// Before/after Elo values for one side of a match.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EloChange {
    pub old: i64,
    pub new: i64,
    pub change: i64,
}

/// Both sides' Elo movement, keyed by match position on the wire.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EloChanges {
    pub idea_a: EloChange,
    pub idea_b: EloChange,
}

/// Output of the Compare operation.
#[derive(Debug, Clone, Serialize)]
pub struct MatchReport {
    pub winner: Winner,
    pub reasons: Vec<String>,
    pub confidence: Band,
    pub elo_changes: EloChanges,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winner_outcome_mapping() {
        assert_eq!(Winner::A.outcome_for_a(), 1.0);
        assert_eq!(Winner::B.outcome_for_a(), 0.0);
        assert_eq!(Winner::Tie.outcome_for_a(), 0.5);
    }

    #[test]
    fn decision_round_trips_through_strings() {
        for d in [Decision::Go, Decision::ConditionalGo, Decision::Drop] {
            assert_eq!(Decision::parse(d.as_str()), Some(d));
        }
        assert_eq!(Decision::parse("maybe"), None);
    }

    #[test]
    fn band_accepts_medium_alias() {
        assert_eq!(Band::parse("Medium"), Some(Band::Med));
        assert_eq!(Band::parse("med"), Some(Band::Med));
    }

    #[test]
    fn enums_cross_the_wire_as_display_strings() {
        assert_eq!(
            serde_json::to_string(&Decision::ConditionalGo).unwrap(),
            "\"Conditional Go\""
        );
        assert_eq!(serde_json::to_string(&Winner::Tie).unwrap(), "\"Tie\"");
        let band: Band = serde_json::from_str("\"Medium\"").unwrap();
        assert_eq!(band, Band::Med);
        assert!(serde_json::from_str::<Winner>("\"C\"").is_err());
    }
}
