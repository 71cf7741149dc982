//! Comparison Engine: one head-to-head match between two rated ideas.
//!
//! Both ideas must already have a current evaluation and a rating. The
//! comparator's verdict becomes a numeric outcome, both Elo scores are
//! recomputed, and the rating pair plus the match record are persisted as one
//! unit. A comparator failure persists nothing.

use chrono::Utc;
use uuid::Uuid;

use crate::elo;
use crate::judge::{Comparator, JudgeError};
use crate::model::{EloChanges, Evaluation, Idea, MatchRecord, MatchReport, Rating};
use crate::prompts::ComparisonSide;
use crate::store::{IdeaStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum CompareError {
    #[error("idea not found: {0}")]
    NotFound(Uuid),
    #[error("idea {0} must be evaluated and ranked before comparison")]
    NotEligible(Uuid),
    #[error("Comparator error: {0}")]
    Comparator(#[from] JudgeError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

struct Participant {
    idea: Idea,
    evaluation: Evaluation,
    rating: Rating,
}

async fn load_participant(store: &dyn IdeaStore, id: Uuid) -> Result<Participant, CompareError> {
    let idea = store.idea(id).await?.ok_or(CompareError::NotFound(id))?;
    let evaluation = store
        .latest_evaluation(id)
        .await?
        .ok_or(CompareError::NotEligible(id))?;
    let rating = store.rating(id).await?.ok_or(CompareError::NotEligible(id))?;
    Ok(Participant {
        idea,
        evaluation,
        rating,
    })
}

/// Compact restatement of an evaluation, used as comparator context.
fn evaluation_summary(evaluation: &Evaluation) -> String {
    let mut summary = format!(
        "viability {}, excellence {}, decision {}, uncertainty {}",
        evaluation.viability,
        evaluation.excellence,
        evaluation.decision.as_str(),
        evaluation.uncertainty.as_str(),
    );
    if !evaluation.top_risks.is_empty() {
        summary.push_str(&format!("; top risks: {}", evaluation.top_risks.join(", ")));
    }
    if !evaluation.key_enablers.is_empty() {
        summary.push_str(&format!(
            "; key enablers: {}",
            evaluation.key_enablers.join(", ")
        ));
    }
    summary
}

fn side(participant: &Participant) -> ComparisonSide {
    ComparisonSide {
        text: participant.idea.text.clone(),
        evaluation_summary: evaluation_summary(&participant.evaluation),
    }
}

/// Run one match between two rated ideas.
pub async fn run_match(
    store: &dyn IdeaStore,
    comparator: &dyn Comparator,
    idea_a: Uuid,
    idea_b: Uuid,
) -> Result<MatchReport, CompareError> {
    run_match_inner(store, comparator, idea_a, idea_b, None).await
}

/// As [`run_match`], with an optional override for idea A's pre-match Elo.
///
/// The Auto-Matcher tracks its anchor's Elo locally across sequential rounds
/// and feeds it in here, so round n+1 always sees round n's result even if a
/// stale read slipped in between.
pub(crate) async fn run_match_inner(
    store: &dyn IdeaStore,
    comparator: &dyn Comparator,
    idea_a: Uuid,
    idea_b: Uuid,
    a_elo_override: Option<i64>,
) -> Result<MatchReport, CompareError> {
    let a = load_participant(store, idea_a).await?;
    let b = load_participant(store, idea_b).await?;

    let verdict = comparator.compare(&side(&a), &side(&b)).await?;

    let a_elo = a_elo_override.unwrap_or(a.rating.elo_score);
    let (change_a, change_b) =
        elo::apply_outcome(a_elo, b.rating.elo_score, verdict.winner.outcome_for_a());

    let record = MatchRecord {
        idea_a,
        idea_b,
        winner: verdict.winner,
        reasons: verdict.reasons.clone(),
        confidence: verdict.confidence,
        created_at: Utc::now(),
    };
    store.apply_match(change_a.new, change_b.new, record).await?;

    Ok(MatchReport {
        winner: verdict.winner,
        reasons: verdict.reasons,
        confidence: verdict.confidence,
        elo_changes: EloChanges {
            idea_a: change_a,
            idea_b: change_b,
        },
    })
}
