//! Readiness aggregation for Gatewatch.
//!
//! Turns a project snapshot into the "what can happen next" view: ranked
//! eligible tickets, blocking reasons, lane capacity, backpressure and pending
//! human approvals. The aggregator only orders and decorates what the snapshot
//! already contains; it never scores, hides or drops anything.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::evidence::{SafetyExplanation, SafetySummary};
use crate::core::gates::Gate;

/// Primary reason used when a blocked ticket has no explanation.
pub const NO_REASON_RECORDED: &str = "no reason recorded";

// =============================================================================
// Snapshot (wire format)
// =============================================================================

/// Project-wide readiness snapshot as delivered by the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessSnapshot {
    /// Project the snapshot describes.
    pub project_id: String,
    /// When the ledger produced the snapshot.
    pub captured_at: DateTime<Utc>,
    /// Tickets by lifecycle state.
    #[serde(default)]
    pub buckets: TicketBuckets,
    /// Ordered explanations per ticket; the first entry is the primary reason.
    #[serde(default)]
    pub explanations: BTreeMap<String, Vec<TicketExplanation>>,
    /// Capacity per execution lane.
    #[serde(default)]
    pub lane_capacity: Vec<LaneCapacity>,
    /// Backpressure signal.
    #[serde(default)]
    pub backpressure: BackpressureStatus,
    /// Waits that need a human. Unreadable entries are dropped.
    #[serde(default, deserialize_with = "lenient_approvals")]
    pub pending_approvals: Vec<PendingApproval>,
    /// Proposed set of tickets to run concurrently.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_set: Option<ParallelSetProposal>,
}

impl ReadinessSnapshot {
    /// Create an empty snapshot.
    pub fn new(project_id: impl Into<String>, captured_at: DateTime<Utc>) -> Self {
        Self {
            project_id: project_id.into(),
            captured_at,
            buckets: TicketBuckets::default(),
            explanations: BTreeMap::new(),
            lane_capacity: Vec::new(),
            backpressure: BackpressureStatus::default(),
            pending_approvals: Vec::new(),
            parallel_set: None,
        }
    }
}

/// Ticket lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketState {
    /// Waiting for dependencies or capacity.
    Queued,
    /// Eligible to start.
    Ready,
    /// Currently running.
    Executing,
    /// Cannot proceed.
    Blocked,
    /// Awaiting human review.
    Review,
    /// Finished.
    Done,
}

impl TicketState {
    /// All states in display order.
    pub const ALL: [TicketState; 6] = [
        TicketState::Ready,
        TicketState::Queued,
        TicketState::Executing,
        TicketState::Blocked,
        TicketState::Review,
        TicketState::Done,
    ];

    /// Get the state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketState::Queued => "queued",
            TicketState::Ready => "ready",
            TicketState::Executing => "executing",
            TicketState::Blocked => "blocked",
            TicketState::Review => "review",
            TicketState::Done => "done",
        }
    }
}

impl std::fmt::Display for TicketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ticket as listed in a bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TicketEntry {
    /// Ticket identifier.
    pub ticket_id: String,
    /// Ticket title.
    #[serde(default)]
    pub title: String,
    /// Scheduler score, if the ledger scored this ticket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl TicketEntry {
    /// Create an unscored entry.
    pub fn new(ticket_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            title: title.into(),
            score: None,
        }
    }

    /// Set the score.
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}

/// Tickets partitioned by lifecycle state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TicketBuckets {
    /// Eligible to start.
    pub ready: Vec<TicketEntry>,
    /// Waiting.
    pub queued: Vec<TicketEntry>,
    /// Running.
    pub executing: Vec<TicketEntry>,
    /// Blocked.
    pub blocked: Vec<TicketEntry>,
    /// In review.
    pub review: Vec<TicketEntry>,
    /// Finished.
    pub done: Vec<TicketEntry>,
}

impl TicketBuckets {
    /// Get one bucket.
    pub fn bucket(&self, state: TicketState) -> &[TicketEntry] {
        match state {
            TicketState::Queued => &self.queued,
            TicketState::Ready => &self.ready,
            TicketState::Executing => &self.executing,
            TicketState::Blocked => &self.blocked,
            TicketState::Review => &self.review,
            TicketState::Done => &self.done,
        }
    }

    /// Get one bucket mutably.
    pub fn bucket_mut(&mut self, state: TicketState) -> &mut Vec<TicketEntry> {
        match state {
            TicketState::Queued => &mut self.queued,
            TicketState::Ready => &mut self.ready,
            TicketState::Executing => &mut self.executing,
            TicketState::Blocked => &mut self.blocked,
            TicketState::Review => &mut self.review,
            TicketState::Done => &mut self.done,
        }
    }

    /// Iterate every entry with its state.
    pub fn entries(&self) -> impl Iterator<Item = (TicketState, &TicketEntry)> + '_ {
        TicketState::ALL
            .into_iter()
            .flat_map(move |state| self.bucket(state).iter().map(move |t| (state, t)))
    }

    /// Find the first bucket holding a ticket.
    pub fn locate(&self, ticket_id: &str) -> Option<TicketState> {
        self.entries()
            .find(|(_, t)| t.ticket_id == ticket_id)
            .map(|(state, _)| state)
    }

    /// Check whether a ticket is in any bucket.
    pub fn contains(&self, ticket_id: &str) -> bool {
        self.locate(ticket_id).is_some()
    }

    /// Ticket ids listed more than once across all buckets, sorted.
    pub fn find_duplicates(&self) -> Vec<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for (_, entry) in self.entries() {
            *counts.entry(entry.ticket_id.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(id, _)| id.to_string())
            .collect()
    }

    /// Number of tickets in each bucket.
    pub fn counts(&self) -> BucketCounts {
        BucketCounts {
            ready: self.ready.len(),
            queued: self.queued.len(),
            executing: self.executing.len(),
            blocked: self.blocked.len(),
            review: self.review.len(),
            done: self.done.len(),
        }
    }
}

/// One explanation attached to a ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TicketExplanation {
    /// Machine-readable reason code.
    #[serde(default)]
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl TicketExplanation {
    /// Create an explanation.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Capacity signal for one lane.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LaneCapacity {
    /// Lane name.
    pub lane: String,
    /// Attempts currently running in the lane.
    pub active: u32,
    /// Maximum concurrent attempts.
    pub limit: u32,
}

/// Backpressure signal.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct BackpressureStatus {
    /// Whether the system recommends pausing new starts.
    pub active: bool,
    /// Why backpressure is active.
    pub reasons: Vec<String>,
    /// Suggested pause before starting new work.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_pause_seconds: Option<u64>,
}

/// A wait that needs a human action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingApproval {
    /// Ticket awaiting the action.
    pub ticket_id: String,
    /// Gate that is waiting.
    pub gate: Gate,
    /// When the wait began.
    pub waiting_since: DateTime<Utc>,
    /// Receipt the wait belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<String>,
}

/// Keep every approval that parses; log and skip the rest.
fn lenient_approvals<'de, D>(deserializer: D) -> Result<Vec<PendingApproval>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(approval) => Some(approval),
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping unreadable pending approval");
                None
            }
        })
        .collect())
}

/// Status of a parallel-set proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    /// Awaiting a human decision.
    #[default]
    Proposed,
    /// Approved for concurrent execution.
    Approved,
    /// Rejected.
    Rejected,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Proposed => "proposed",
            ProposalStatus::Approved => "approved",
            ProposalStatus::Rejected => "rejected",
        }
    }
}

/// Proposed group of tickets for concurrent execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParallelSetProposal {
    /// Proposal identifier.
    pub proposal_id: String,
    /// Tickets in the proposal.
    pub ticket_ids: Vec<String>,
    /// Proposal status.
    #[serde(default)]
    pub status: ProposalStatus,
    /// Safety checks backing the proposal.
    #[serde(default)]
    pub safety_checks: Vec<SafetyExplanation>,
}

// =============================================================================
// Bundle (derived view)
// =============================================================================

/// A ready ticket with its rank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EligibleTicket {
    /// Ticket identifier.
    pub ticket_id: String,
    /// Ticket title.
    pub title: String,
    /// 1-based rank; 1 is the recommendation.
    pub rank: usize,
    /// Explanation messages from the snapshot, in order.
    pub reasons: Vec<String>,
    /// Score copied from the snapshot.
    pub score: Option<f64>,
}

/// Why a blocked ticket cannot proceed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockingReason {
    /// Blocked ticket.
    pub ticket_id: String,
    /// First explanation, or a fallback.
    pub primary: String,
    /// Remaining explanations.
    pub additional: Vec<String>,
}

/// Derived lane status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LaneStatus {
    /// Lane name.
    pub lane: String,
    /// Running attempts.
    pub active: u32,
    /// Limit.
    pub limit: u32,
    /// `max(0, limit - active)`.
    pub remaining: u32,
    /// `active >= limit`.
    pub at_capacity: bool,
}

impl From<&LaneCapacity> for LaneStatus {
    fn from(lane: &LaneCapacity) -> Self {
        Self {
            lane: lane.lane.clone(),
            active: lane.active,
            limit: lane.limit,
            remaining: lane.limit.saturating_sub(lane.active),
            at_capacity: lane.active >= lane.limit,
        }
    }
}

/// Bucket sizes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BucketCounts {
    pub ready: usize,
    pub queued: usize,
    pub executing: usize,
    pub blocked: usize,
    pub review: usize,
    pub done: usize,
}

/// Explanations that reference a ticket no bucket contains.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrphanExplanation {
    /// Referenced ticket.
    pub ticket_id: String,
    /// The explanations, kept as delivered.
    pub explanations: Vec<TicketExplanation>,
}

/// Parallel-set proposal with its safety summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParallelSetView {
    /// Proposal identifier.
    pub proposal_id: String,
    /// Tickets in the proposal.
    pub ticket_ids: Vec<String>,
    /// Proposal status.
    pub status: ProposalStatus,
    /// Summary of the proposal's safety checks.
    pub safety: SafetySummary,
    /// Proposed tickets that are not currently in the ready bucket.
    pub not_ready: Vec<String>,
}

/// Everything the operator needs to decide what happens next.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadinessBundle {
    /// Project the bundle describes.
    pub project_id: String,
    /// Snapshot capture time.
    pub computed_at: DateTime<Utc>,
    /// Ready tickets, ranked.
    pub eligible_runnable: Vec<EligibleTicket>,
    /// One entry per blocked ticket.
    pub blocking: Vec<BlockingReason>,
    /// Bucket sizes.
    pub counts: BucketCounts,
    /// Number of executing tickets.
    pub active_count: usize,
    /// Lane capacity.
    pub lanes: Vec<LaneStatus>,
    /// Backpressure, surfaced as delivered.
    pub backpressure: BackpressureStatus,
    /// Human-actionable waits, in snapshot order.
    pub pending_approvals: Vec<PendingApproval>,
    /// Parallel-set proposal, if any.
    pub parallel_set: Option<ParallelSetView>,
    /// Explanations for tickets missing from every bucket.
    pub orphan_explanations: Vec<OrphanExplanation>,
    /// Tickets listed in more than one bucket.
    pub duplicates: Vec<String>,
}

impl ReadinessBundle {
    /// The rank-1 eligible ticket.
    pub fn recommendation(&self) -> Option<&EligibleTicket> {
        self.eligible_runnable.first()
    }

    /// Check whether a lane is at capacity.
    pub fn lane_at_capacity(&self, lane: &str) -> bool {
        self.lanes.iter().any(|l| l.lane == lane && l.at_capacity)
    }

    /// Whether the snapshot had defects worth reporting.
    pub fn has_defects(&self) -> bool {
        !self.orphan_explanations.is_empty() || !self.duplicates.is_empty()
    }
}

/// Aggregate a snapshot into a readiness bundle.
///
/// Pure: the same snapshot always yields an equal bundle.
pub fn aggregate(snapshot: &ReadinessSnapshot) -> ReadinessBundle {
    let buckets = &snapshot.buckets;

    let bundle = ReadinessBundle {
        project_id: snapshot.project_id.clone(),
        computed_at: snapshot.captured_at,
        eligible_runnable: rank_ready(&buckets.ready, &snapshot.explanations),
        blocking: blocking_reasons(&buckets.blocked, &snapshot.explanations),
        counts: buckets.counts(),
        active_count: buckets.executing.len(),
        lanes: snapshot.lane_capacity.iter().map(LaneStatus::from).collect(),
        backpressure: snapshot.backpressure.clone(),
        pending_approvals: snapshot.pending_approvals.clone(),
        parallel_set: snapshot
            .parallel_set
            .as_ref()
            .map(|p| parallel_set_view(p, buckets, snapshot.captured_at)),
        orphan_explanations: orphan_explanations(buckets, &snapshot.explanations),
        duplicates: buckets.find_duplicates(),
    };

    if bundle.has_defects() {
        tracing::debug!(
            project_id = %bundle.project_id,
            orphans = bundle.orphan_explanations.len(),
            duplicates = bundle.duplicates.len(),
            "readiness snapshot has defects"
        );
    }

    bundle
}

/// Rank ready tickets by score, highest first.
///
/// Scored tickets come before unscored ones. The sort is stable, so ties
/// keep snapshot order.
fn rank_ready(
    ready: &[TicketEntry],
    explanations: &BTreeMap<String, Vec<TicketExplanation>>,
) -> Vec<EligibleTicket> {
    let mut ordered: Vec<&TicketEntry> = ready.iter().collect();
    ordered.sort_by(|a, b| match (a.score, b.score) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    ordered
        .into_iter()
        .enumerate()
        .map(|(i, entry)| EligibleTicket {
            ticket_id: entry.ticket_id.clone(),
            title: entry.title.clone(),
            rank: i + 1,
            reasons: messages(explanations.get(&entry.ticket_id)),
            score: entry.score,
        })
        .collect()
}

fn blocking_reasons(
    blocked: &[TicketEntry],
    explanations: &BTreeMap<String, Vec<TicketExplanation>>,
) -> Vec<BlockingReason> {
    blocked
        .iter()
        .map(|entry| {
            let mut reasons = messages(explanations.get(&entry.ticket_id)).into_iter();
            BlockingReason {
                ticket_id: entry.ticket_id.clone(),
                primary: reasons
                    .next()
                    .unwrap_or_else(|| NO_REASON_RECORDED.to_string()),
                additional: reasons.collect(),
            }
        })
        .collect()
}

fn orphan_explanations(
    buckets: &TicketBuckets,
    explanations: &BTreeMap<String, Vec<TicketExplanation>>,
) -> Vec<OrphanExplanation> {
    let known: BTreeSet<&str> = buckets.entries().map(|(_, t)| t.ticket_id.as_str()).collect();
    explanations
        .iter()
        .filter(|(id, _)| !known.contains(id.as_str()))
        .map(|(id, list)| OrphanExplanation {
            ticket_id: id.clone(),
            explanations: list.clone(),
        })
        .collect()
}

fn parallel_set_view(
    proposal: &ParallelSetProposal,
    buckets: &TicketBuckets,
    captured_at: DateTime<Utc>,
) -> ParallelSetView {
    ParallelSetView {
        proposal_id: proposal.proposal_id.clone(),
        ticket_ids: proposal.ticket_ids.clone(),
        status: proposal.status,
        safety: SafetySummary::new(proposal.safety_checks.clone(), captured_at),
        not_ready: proposal
            .ticket_ids
            .iter()
            .filter(|id| !buckets.ready.iter().any(|t| &t.ticket_id == *id))
            .cloned()
            .collect(),
    }
}

fn messages(explanations: Option<&Vec<TicketExplanation>>) -> Vec<String> {
    explanations
        .map(|list| list.iter().map(|e| e.message.clone()).collect())
        .unwrap_or_default()
}
