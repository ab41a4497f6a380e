//! Request lifecycle state machine.
//!
//! ```text
//! pending ──> under_review ──> approved ──> in_progress ──> completed
//!                    └───────> rejected
//! any non-terminal ──> cancelled
//! ```
//!
//! Only terminal states (`rejected`, `completed`, `cancelled`) are guarded: any
//! non-terminal status may move to any status, including itself. Every accepted
//! transition yields exactly one history entry, plus one approval record for
//! `approved`/`rejected`.

use crate::aggregate::AccessRequest;
use crate::audit::{Decision, HistoryAction, LedgerEffect, NewApprovalRecord, NewHistoryEntry};
use crate::environment::RequestEnvironment;
use crate::error::{AccessError, Result};
use crate::reducer::Reducer;
use crate::types::{Principal, PrincipalId, RequestStatus};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Optional inputs that accompany a status change.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionDetails {
    /// Required (directly or via `comments`) when rejecting
    pub rejection_reason: Option<String>,
    /// Free-text comments
    pub comments: Option<String>,
    /// Assignee for `in_progress`
    pub assigned_to: Option<PrincipalId>,
}

impl TransitionDetails {
    fn comments(&self) -> Option<String> {
        non_blank(self.comments.as_deref())
    }

    /// The rejection reason, falling back to the comments.
    fn rejection_reason(&self) -> Option<String> {
        non_blank(self.rejection_reason.as_deref()).or_else(|| self.comments())
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

/// Move a request to `target` on behalf of `actor`.
#[derive(Clone, Debug)]
pub struct Transition {
    /// Target status
    pub target: RequestStatus,
    /// Who moves it
    pub actor: Principal,
    /// Accompanying inputs
    pub details: TransitionDetails,
}

impl Transition {
    /// A transition without details.
    #[must_use]
    pub fn new(target: RequestStatus, actor: Principal) -> Self {
        Self {
            target,
            actor,
            details: TransitionDetails::default(),
        }
    }

    /// Attach details.
    #[must_use]
    pub fn with_details(mut self, details: TransitionDetails) -> Self {
        self.details = details;
        self
    }
}

/// Reducer for [`Transition`] over an [`AccessRequest`].
#[derive(Clone, Copy, Debug, Default)]
pub struct LifecycleReducer;

impl Reducer for LifecycleReducer {
    type State = AccessRequest;
    type Action = Transition;
    type Environment = RequestEnvironment;
    type Effect = LedgerEffect;
    type Error = AccessError;

    fn reduce(
        &self,
        request: &mut AccessRequest,
        action: Transition,
        env: &RequestEnvironment,
    ) -> Result<SmallVec<[LedgerEffect; 4]>> {
        let Transition {
            target,
            actor,
            details,
        } = action;
        let from = request.status;

        // Guards: nothing below may fail once the request has been touched.
        if from.is_terminal() {
            return Err(AccessError::TerminalState(from));
        }
        let rejection_reason = if target == RequestStatus::Rejected {
            Some(details.rejection_reason().ok_or_else(|| {
                AccessError::invalid_field("rejection_reason", "is required when rejecting a request")
            })?)
        } else {
            None
        };

        let now = env.clock.now();
        let comments = details.comments();
        let mut effects = SmallVec::new();

        let (action, description) = match target {
            RequestStatus::Approved => {
                request.approved_by = Some(actor.id);
                request.approval_date = Some(now);
                effects.push(LedgerEffect::RecordApproval(NewApprovalRecord {
                    approver_id: actor.id,
                    approver_role: actor.role,
                    decision: Decision::Approved,
                    decision_date: now,
                    comments: comments.clone(),
                }));
                (HistoryAction::Approved, "Request approved".to_string())
            }
            RequestStatus::Rejected => {
                let reason = rejection_reason.clone().unwrap_or_default();
                request.rejected_by = Some(actor.id);
                request.rejection_date = Some(now);
                request.rejection_reason = Some(reason.clone());
                effects.push(LedgerEffect::RecordApproval(NewApprovalRecord {
                    approver_id: actor.id,
                    approver_role: actor.role,
                    decision: Decision::Rejected,
                    decision_date: now,
                    comments: comments.clone().or_else(|| Some(reason.clone())),
                }));
                (HistoryAction::Rejected, format!("Request rejected: {reason}"))
            }
            RequestStatus::InProgress if details.assigned_to.is_some() => {
                let assignee = details.assigned_to;
                request.assigned_to = assignee;
                request.assigned_at = Some(now);
                let assignee = assignee.map(|id| id.to_string()).unwrap_or_default();
                (HistoryAction::Assigned, format!("Request assigned to {assignee}"))
            }
            RequestStatus::Completed => {
                request.completed_by = Some(actor.id);
                request.completed_at = Some(now);
                (HistoryAction::Completed, "Request completed".to_string())
            }
            RequestStatus::Cancelled => {
                request.cancelled_at = Some(now);
                (HistoryAction::StatusChanged, format!("Status changed from {from} to {target}"))
            }
            RequestStatus::Pending | RequestStatus::UnderReview | RequestStatus::InProgress => {
                (HistoryAction::StatusChanged, format!("Status changed from {from} to {target}"))
            }
        };

        request.status = target;
        request.updated_at = now;

        let entry = NewHistoryEntry::new(action, description, actor.id, now)
            .with_metadata("from", from.as_str())
            .with_metadata("to", target.as_str())
            .with_optional_metadata("comments", comments)
            .with_optional_metadata("rejection_reason", rejection_reason)
            .with_optional_metadata(
                "assigned_to",
                (target == RequestStatus::InProgress)
                    .then_some(details.assigned_to)
                    .flatten()
                    .map(|id| id.to_string()),
            );
        effects.push(LedgerEffect::AppendHistory(entry));

        Ok(effects)
    }
}
