//! Audit ledger: immutable history entries and approval records.
//!
//! Reducers never write to storage. They return [`LedgerEffect`]s, and the store
//! persists them in the same transaction as the state change that produced them.
//! Once written, entries are only ever read back in order.

use crate::types::{PrincipalId, RequestId, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Closed vocabulary of ledger actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    /// Request created
    Created,
    /// Status moved without a dedicated action
    StatusChanged,
    /// Request approved
    Approved,
    /// Request rejected
    Rejected,
    /// Moved to in-progress with an assignee
    Assigned,
    /// Request completed
    Completed,
    /// Asset bound to a handover item
    AssetLinked,
}

impl HistoryAction {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::StatusChanged => "status_changed",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Assigned => "assigned",
            Self::Completed => "completed",
            Self::AssetLinked => "asset_linked",
        }
    }

    /// Parse a stored action.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Self::Created),
            "status_changed" => Some(Self::StatusChanged),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "assigned" => Some(Self::Assigned),
            "completed" => Some(Self::Completed),
            "asset_linked" => Some(Self::AssetLinked),
            _ => None,
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A history entry not yet written.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewHistoryEntry {
    /// What happened
    pub action: HistoryAction,
    /// Human-readable summary
    pub description: String,
    /// Who did it
    pub performed_by: PrincipalId,
    /// When
    pub performed_at: DateTime<Utc>,
    /// Structured detail
    pub metadata: Map<String, Value>,
}

impl NewHistoryEntry {
    /// Start an entry with empty metadata.
    #[must_use]
    pub fn new(
        action: HistoryAction,
        description: impl Into<String>,
        performed_by: PrincipalId,
        performed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            action,
            description: description.into(),
            performed_by,
            performed_at,
            metadata: Map::new(),
        }
    }

    /// Attach one metadata key.
    #[must_use]
    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Attach a metadata key only when a value is present.
    #[must_use]
    pub fn with_optional_metadata<V: Into<Value>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with_metadata(key, value),
            None => self,
        }
    }

    /// The stored form of this entry.
    #[must_use]
    pub fn into_entry(self, id: i64, request_id: RequestId) -> HistoryEntry {
        HistoryEntry {
            id,
            request_id,
            action: self.action,
            description: self.description,
            performed_by: self.performed_by,
            performed_at: self.performed_at,
            metadata: self.metadata,
        }
    }
}

/// A written history entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Monotonic ledger position
    pub id: i64,
    /// Request the entry belongs to
    pub request_id: RequestId,
    /// What happened
    pub action: HistoryAction,
    /// Human-readable summary
    pub description: String,
    /// Who did it
    pub performed_by: PrincipalId,
    /// When
    pub performed_at: DateTime<Utc>,
    /// Structured detail
    pub metadata: Map<String, Value>,
}

/// Outcome of an approve/reject transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Approved
    Approved,
    /// Rejected
    Rejected,
}

impl Decision {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parse a stored decision.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// An approval record not yet written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NewApprovalRecord {
    /// Who decided
    pub approver_id: PrincipalId,
    /// Their role at decision time
    pub approver_role: Role,
    /// The decision
    pub decision: Decision,
    /// When
    pub decision_date: DateTime<Utc>,
    /// Free-text comments
    pub comments: Option<String>,
}

impl NewApprovalRecord {
    /// The stored form of this record.
    #[must_use]
    pub fn into_record(self, id: Uuid, request_id: RequestId) -> ApprovalRecord {
        ApprovalRecord {
            id,
            request_id,
            approver_id: self.approver_id,
            approver_role: self.approver_role,
            decision: self.decision,
            decision_date: self.decision_date,
            comments: self.comments,
        }
    }
}

/// A written approval record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    /// Record identity
    pub id: Uuid,
    /// Request decided on
    pub request_id: RequestId,
    /// Who decided
    pub approver_id: PrincipalId,
    /// Their role at decision time
    pub approver_role: Role,
    /// The decision
    pub decision: Decision,
    /// When
    pub decision_date: DateTime<Utc>,
    /// Free-text comments
    pub comments: Option<String>,
}

/// A ledger write produced by a reducer.
#[derive(Clone, Debug, PartialEq)]
pub enum LedgerEffect {
    /// Append one history entry
    AppendHistory(NewHistoryEntry),
    /// Append one approval record
    RecordApproval(NewApprovalRecord),
}

impl LedgerEffect {
    /// The history entry, if this effect appends one.
    #[must_use]
    pub const fn history(&self) -> Option<&NewHistoryEntry> {
        match self {
            Self::AppendHistory(entry) => Some(entry),
            Self::RecordApproval(_) => None,
        }
    }

    /// The approval record, if this effect appends one.
    #[must_use]
    pub const fn approval(&self) -> Option<&NewApprovalRecord> {
        match self {
            Self::RecordApproval(record) => Some(record),
            Self::AppendHistory(_) => None,
        }
    }
}
