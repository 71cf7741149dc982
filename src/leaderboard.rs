//! Leaderboard read path: ranking, badges, and the privacy filter.
//!
//! A read-time projection over the store; persisted data is never altered
//! here. Per-row text selection depends on the viewer: owners see their raw
//! text, everyone else sees the anonymized summary (public ideas) or a
//! redacted placeholder.

use serde::Serialize;
use uuid::Uuid;

use crate::badges::{badge_for, percentile};
use crate::model::{Decision, MIN_RANKED_MATCHES};
use crate::store::{IdeaStore, RankedIdea, StoreError};

pub const DEFAULT_LEADERBOARD_LIMIT: u32 = 20;
pub const MAX_LEADERBOARD_LIMIT: u32 = 100;

/// One leaderboard row after badges and privacy are applied.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub idea_id: Uuid,
    pub text: String,
    pub category: Option<String>,
    pub stage: Option<String>,
    pub elo_score: i64,
    pub match_count: u32,
    pub viability_score: u8,
    pub excellence_score: u8,
    pub decision: Decision,
    pub badge: &'static str,
    pub badge_color: &'static str,
    pub badge_description: &'static str,
    pub is_own: bool,
    pub is_anonymized: bool,
    pub is_public: bool,
    pub percentile: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct Leaderboard {
    pub total: u64,
    pub ideas: Vec<LeaderboardEntry>,
}

fn entry_for(row: RankedIdea, rank: usize, viewer: Option<Uuid>) -> LeaderboardEntry {
    let badge = badge_for(row.rating.elo_score, row.rating.match_count);
    let is_own = viewer.is_some() && viewer == row.idea.user_id;

    let (text, is_anonymized, is_public) = if is_own {
        (row.idea.text.clone(), false, row.idea.is_public)
    } else if row.idea.is_public && row.idea.summary.is_some() {
        (
            row.idea.summary.clone().unwrap_or_default(),
            true,
            true,
        )
    } else {
        // Fully redacted: category (or a generic label) plus the rank-derived
        // sequence number. Flagged anonymized and not public.
        let label = row.idea.category.as_deref().unwrap_or("Startup");
        (format!("{label} idea #{rank}"), true, false)
    };

    LeaderboardEntry {
        rank,
        idea_id: row.idea.id,
        text,
        category: row.idea.category,
        stage: row.idea.stage,
        elo_score: row.rating.elo_score,
        match_count: row.rating.match_count,
        viability_score: row.viability,
        excellence_score: row.excellence,
        decision: row.decision,
        badge: badge.name(),
        badge_color: badge.color(),
        badge_description: badge.description(),
        is_own,
        is_anonymized,
        is_public,
        percentile: percentile(row.rating.elo_score),
    }
}

/// Top rated ideas, strictly descending by Elo among ideas with the minimum
/// ranked match count. Degrades to an empty list, never an error, when no
/// idea has reached the floor.
pub async fn top_ideas(
    store: &dyn IdeaStore,
    limit: Option<u32>,
    viewer: Option<Uuid>,
) -> Result<Leaderboard, StoreError> {
    let limit = limit
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .clamp(1, MAX_LEADERBOARD_LIMIT);

    let total = store.ranked_count(MIN_RANKED_MATCHES).await?;
    let rows = store.top_rated(limit, MIN_RANKED_MATCHES).await?;

    let ideas = rows
        .into_iter()
        .enumerate()
        .map(|(i, row)| entry_for(row, i + 1, viewer))
        .collect();

    Ok(Leaderboard { total, ideas })
}
