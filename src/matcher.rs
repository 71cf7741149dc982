//! Auto-Matcher: background accumulation of matches for a newly rated idea.
//!
//! A single trigger drives the idea toward a target match count against the
//! closest-rated opponents it has not yet faced. Rounds run strictly
//! sequentially because each round's Elo result feeds the next round's
//! expected-score computation. Individual round failures are logged and
//! skipped; the run never propagates failure to its trigger.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::compare::run_match_inner;
use crate::judge::Comparator;
use crate::model::{CANDIDATE_FETCH_MULTIPLIER, DEFAULT_MATCH_TARGET};
use crate::store::{IdeaStore, StoreError};

/// Outcome of one Auto-Matcher run. Consumed by logs and tests only.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoMatchSummary {
    pub target: u32,
    /// Rounds attempted (including failures).
    pub attempted: u32,
    /// Rounds that produced a persisted match.
    pub completed: u32,
    pub failed: u32,
}

/// Drive `idea_id` toward `target` total matches without exceeding it.
///
/// No-ops when the idea has no rating or already meets the target. Candidate
/// opponents are every other rated idea (category is not a matchmaking
/// constraint), minus prior opponents, ordered by absolute Elo distance from
/// the anchor's current score.
pub async fn run_auto_match(
    store: &dyn IdeaStore,
    comparator: &dyn Comparator,
    idea_id: Uuid,
    target: u32,
) -> Result<AutoMatchSummary, StoreError> {
    let Some(rating) = store.rating(idea_id).await? else {
        return Ok(AutoMatchSummary::default());
    };
    if rating.match_count >= target {
        return Ok(AutoMatchSummary {
            target,
            ..Default::default()
        });
    }
    let needed = target - rating.match_count;

    let mut exclude = store.opponents_faced(idea_id).await?;
    exclude.push(idea_id);

    // Fetch extra candidates so individual round failures don't starve the run.
    let mut candidates: Vec<_> = store
        .rated_ideas()
        .await?
        .into_iter()
        .filter(|r| !exclude.contains(&r.idea_id))
        .collect();
    candidates.sort_by_key(|r| (r.elo_score - rating.elo_score).abs());
    candidates.truncate(needed as usize * CANDIDATE_FETCH_MULTIPLIER);

    let mut summary = AutoMatchSummary {
        target,
        ..Default::default()
    };
    let mut anchor_elo = rating.elo_score;

    for candidate in candidates {
        if summary.completed >= needed {
            break;
        }
        summary.attempted += 1;
        match run_match_inner(store, comparator, idea_id, candidate.idea_id, Some(anchor_elo)).await
        {
            Ok(report) => {
                anchor_elo = report.elo_changes.idea_a.new;
                summary.completed += 1;
            }
            Err(err) => {
                // Non-fatal: skip this pairing and move on. No retry.
                summary.failed += 1;
                warn!(
                    idea = %idea_id,
                    opponent = %candidate.idea_id,
                    error = %err,
                    "auto-match round failed; continuing"
                );
            }
        }
    }

    info!(
        idea = %idea_id,
        target,
        completed = summary.completed,
        failed = summary.failed,
        elo = anchor_elo,
        "auto-match run finished"
    );
    Ok(summary)
}

// =============================================================================
// Background scheduling
// =============================================================================

/// Capacity of the trigger queue. Overflow drops the trigger (warn-logged);
/// a dropped run only delays matches for one idea.
const SCHEDULER_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy)]
struct MatchRunRequest {
    idea_id: Uuid,
    target: u32,
}

/// Fire-and-forget trigger for Auto-Matcher runs.
///
/// Requests go over a bounded channel to a dedicated worker task that drains
/// them sequentially, so a run is an observable task rather than a detached
/// coroutine. `schedule` never blocks the caller.
#[derive(Clone)]
pub struct MatchScheduler {
    sender: mpsc::Sender<MatchRunRequest>,
}

/// Handle to the scheduler's worker task, for orderly shutdown.
pub struct MatcherWorker {
    handle: tokio::task::JoinHandle<()>,
}

impl MatcherWorker {
    /// Wait for the worker to drain and exit. The worker stops once every
    /// [`MatchScheduler`] clone has been dropped.
    pub async fn join(self) {
        if self.handle.await.is_err() {
            warn!("matcher worker panicked");
        }
    }
}

impl MatchScheduler {
    pub fn spawn(
        store: Arc<dyn IdeaStore>,
        comparator: Arc<dyn Comparator>,
    ) -> (Self, MatcherWorker) {
        let (sender, mut receiver) = mpsc::channel::<MatchRunRequest>(SCHEDULER_QUEUE_CAPACITY);
        let handle = tokio::spawn(async move {
            while let Some(req) = receiver.recv().await {
                if let Err(err) =
                    run_auto_match(store.as_ref(), comparator.as_ref(), req.idea_id, req.target)
                        .await
                {
                    warn!(idea = %req.idea_id, error = %err, "auto-match run aborted");
                }
            }
        });
        (Self { sender }, MatcherWorker { handle })
    }

    /// Queue an Auto-Matcher run. Never blocks; a full queue drops the
    /// request with a warning.
    pub fn schedule(&self, idea_id: Uuid, target: u32) {
        if self
            .sender
            .try_send(MatchRunRequest { idea_id, target })
            .is_err()
        {
            warn!(idea = %idea_id, "auto-match queue full; dropping trigger");
        }
    }

    /// Queue a run with the default match budget.
    pub fn schedule_default(&self, idea_id: Uuid) {
        self.schedule(idea_id, DEFAULT_MATCH_TARGET);
    }
}
