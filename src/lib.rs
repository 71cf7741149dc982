#![forbid(unsafe_code)]

//! # idea-arena
//!
//! An LLM-judged ranking engine for startup ideas.
//!
//! Absolute scores from a single LLM call are noisy and miscalibrated, so the
//! engine treats them only as an admission gate: a judge scores each idea on
//! viability and excellence, and ideas that clear the viability threshold
//! enter a rated pool. Relative order inside the pool comes from pairwise LLM
//! comparisons folded into an Elo rating, with a background matcher that
//! accumulates matches for newly admitted ideas against their closest-rated
//! peers. A leaderboard projects the pool through badges, percentiles, and a
//! privacy filter that never exposes raw idea text to other users.

pub mod badges;
pub mod compare;
pub mod elo;
pub mod gateway;
pub mod judge;
pub mod leaderboard;
pub mod matcher;
pub mod model;
pub mod pipeline;
pub mod prompts;
pub mod store;

pub use badges::{badge_for, percentile, BadgeStatus, BadgeTier};
pub use compare::{run_match, CompareError};
pub use gateway::{ChatGateway, GatewayConfig, ProviderGateway};
pub use judge::{
    Anonymizer, Comparator, Judge, JudgeError, LlmAnonymizer, LlmComparator, LlmJudge,
};
pub use leaderboard::{top_ideas, Leaderboard, LeaderboardEntry};
pub use matcher::{run_auto_match, AutoMatchSummary, MatchScheduler, MatcherWorker};
pub use model::{
    EvaluateRequest, EvaluateResponse, Evaluation, Idea, MatchRecord, MatchReport, Rating,
};
pub use pipeline::{evaluate_idea, EvaluateError};
pub use store::{IdeaStore, SqliteIdeaStore, StoreError};
