//! Storage seam for access requests.
//!
//! The store owns atomicity. State changes are expressed as plans: closures that
//! receive the freshly locked row, run a reducer over it, and hand back the ledger
//! effects. The store persists the mutated row and every effect in one transaction,
//! or nothing at all if the plan (or any write) fails.

use crate::aggregate::{AccessRequest, NewAccessRequest, RequestSummary};
use crate::assets::{Asset, HandoverItem};
use crate::audit::{ApprovalRecord, HistoryEntry, LedgerEffect};
use crate::error::Result;
use crate::grants::GrantSystem;
use crate::query::{ListQuery, Page};
use crate::types::{AssetId, HandoverItemId, RequestId};
use smallvec::SmallVec;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by store methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Effects produced by one plan.
pub type LedgerEffects = SmallVec<[LedgerEffect; 4]>;

/// Mutation of a locked request.
///
/// Runs after the caller's authorization re-check, inside the transaction.
pub type TransitionPlan = Box<dyn FnOnce(&mut AccessRequest) -> Result<LedgerEffects> + Send>;

/// Mutation of a locked handover item, given the asset read in the same transaction.
pub type LinkPlan = Box<dyn FnOnce(&mut HandoverItem, &Asset) -> Result<LedgerEffects> + Send>;

/// Persistence for requests and their ledger.
///
/// Implementations must:
///
/// - reject a duplicate request number with [`crate::AccessError::NumberingConflict`]
/// - never update or delete history entries or approval records
/// - apply a plan and its effects atomically, serialized per request
pub trait AccessRequestStore: Send + Sync {
    /// Next free sequence for `year`, always at least one above every number
    /// already issued for that year.
    fn next_request_sequence(&self, year: i32) -> StoreFuture<'_, u32>;

    /// Insert the root, its grants and handover items, and the initial history
    /// entry in one transaction.
    fn insert_request(&self, request: NewAccessRequest) -> StoreFuture<'_, AccessRequest>;

    /// Load a request with its grants and handover items.
    fn find_request(&self, id: RequestId) -> StoreFuture<'_, Option<AccessRequest>>;

    /// One page of summaries under the query's scope and filters, newest first.
    fn list_requests(&self, query: ListQuery) -> StoreFuture<'_, Page<RequestSummary>>;

    /// Lock the request, run `plan`, persist the result and its effects.
    ///
    /// Fails with `NotFound` when the request does not exist.
    fn apply_transition(&self, id: RequestId, plan: TransitionPlan) -> StoreFuture<'_, AccessRequest>;

    /// Lock the request, run `plan`, persist the `system` grant's provisioning
    /// state, `updated_at` and the plan's effects.
    ///
    /// Fails with `NotFound` when the request does not exist.
    fn update_grant(
        &self,
        id: RequestId,
        system: GrantSystem,
        plan: TransitionPlan,
    ) -> StoreFuture<'_, AccessRequest>;

    /// Lock the handover item and read the asset, run `plan`, persist the item and
    /// its effects.
    ///
    /// Fails with `NotFound` when the item does not belong to the request or the
    /// asset does not exist.
    fn link_asset(
        &self,
        request_id: RequestId,
        item_id: HandoverItemId,
        asset_id: AssetId,
        plan: LinkPlan,
    ) -> StoreFuture<'_, HandoverItem>;

    /// History entries of a request, oldest first.
    fn history(&self, id: RequestId) -> StoreFuture<'_, Vec<HistoryEntry>>;

    /// Approval records of a request, oldest first.
    fn approvals(&self, id: RequestId) -> StoreFuture<'_, Vec<ApprovalRecord>>;

    /// Asset-type labels from master data.
    fn known_asset_types(&self) -> StoreFuture<'_, Vec<String>>;
}
