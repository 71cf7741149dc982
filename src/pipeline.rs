//! Evaluation Pipeline: idea intake, judging, and ranking admission.
//!
//! Validation happens before any collaborator call; the judge is called before
//! anything is persisted, so a judge failure leaves no partial state. When the
//! verdict clears the viability threshold the idea gets a rating row and an
//! Auto-Matcher trigger, which is fired without blocking the response.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::judge::{Anonymizer, Judge, JudgeError, JudgeInput};
use crate::matcher::MatchScheduler;
use crate::model::{EvaluateRequest, EvaluateResponse, Evaluation, Idea, MIN_IDEA_TEXT_LEN};
use crate::store::{IdeaStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum EvaluateError {
    #[error("idea text too short: need at least {MIN_IDEA_TEXT_LEN} characters")]
    TextTooShort,
    #[error("idea not found: {0}")]
    IdeaNotFound(Uuid),
    #[error("Judge error: {0}")]
    Judge(#[from] JudgeError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Evaluate one idea: judge it, persist the outcome, and admit it to the
/// ranked pool when eligible.
///
/// With `idea_id` set, re-evaluates the stored idea (its text is immutable;
/// the stored text wins) and appends a new evaluation. The scheduler trigger
/// is fire-and-forget; the response never waits on matching.
pub async fn evaluate_idea(
    store: &dyn IdeaStore,
    judge: &dyn Judge,
    anonymizer: Option<&dyn Anonymizer>,
    scheduler: Option<&MatchScheduler>,
    req: EvaluateRequest,
) -> Result<EvaluateResponse, EvaluateError> {
    let language = req.language.unwrap_or_default();

    let existing = match req.idea_id {
        Some(id) => Some(
            store
                .idea(id)
                .await?
                .ok_or(EvaluateError::IdeaNotFound(id))?,
        ),
        None => {
            let text = req.text.trim();
            if text.chars().count() < MIN_IDEA_TEXT_LEN {
                return Err(EvaluateError::TextTooShort);
            }
            None
        }
    };

    // Everything the judge and anonymizer see comes from the authoritative
    // record for re-evaluations.
    let (text, category, stage) = match &existing {
        Some(idea) => (idea.text.clone(), idea.category.clone(), idea.stage.clone()),
        None => (
            req.text.trim().to_string(),
            req.category.clone(),
            req.stage.clone(),
        ),
    };

    // Anonymization runs only for new public ideas, before anything persists.
    let anonymized = match (&existing, req.is_public, anonymizer) {
        (None, true, Some(anonymizer)) => Some(
            anonymizer
                .anonymize(&text, category.as_deref(), language)
                .await?,
        ),
        _ => None,
    };

    let verdict = judge
        .evaluate(&JudgeInput {
            text: text.clone(),
            category: category.clone(),
            stage: stage.clone(),
            language,
        })
        .await?;

    let idea_id = existing
        .as_ref()
        .map(|i| i.id)
        .unwrap_or_else(Uuid::new_v4);
    let now = Utc::now();

    let evaluation = Evaluation {
        idea_id,
        viability: verdict.viability,
        excellence: verdict.excellence,
        decision: verdict.decision,
        uncertainty: verdict.uncertainty,
        top_risks: verdict.top_risks.clone(),
        key_enablers: verdict.key_enablers.clone(),
        created_at: now,
    };
    let eligible = evaluation.eligible_for_ranking();

    match existing {
        Some(_) => {
            store.append_evaluation(evaluation, eligible).await?;
        }
        None => {
            let (summary, category) = match anonymized {
                Some(a) => (Some(a.summary), Some(a.category)),
                None => (None, category),
            };
            let idea = Idea {
                id: idea_id,
                text,
                category,
                stage,
                user_id: req.user_id,
                conversation_id: req.conversation_id,
                is_public: req.is_public,
                summary,
                created_at: now,
            };
            store
                .create_idea_with_evaluation(idea, evaluation, eligible)
                .await?;
        }
    }

    if eligible {
        if let Some(scheduler) = scheduler {
            scheduler.schedule_default(idea_id);
        }
    }

    info!(
        idea = %idea_id,
        viability = verdict.viability,
        excellence = verdict.excellence,
        decision = verdict.decision.as_str(),
        eligible,
        "idea evaluated"
    );

    Ok(EvaluateResponse {
        idea_id,
        viability: verdict.viability,
        excellence: verdict.excellence,
        decision: verdict.decision,
        uncertainty: verdict.uncertainty,
        top_risks: verdict.top_risks,
        key_enablers: verdict.key_enablers,
        eligible_for_ranking: eligible,
    })
}
