//! Provisioning progress of sub-grants.
//!
//! IT works through each requested system separately, so every grant carries its own
//! [`ProvisioningStatus`]. Moving it is an admin update on the request: it stamps
//! `provisioned_at`/`provisioned_by` when a grant reaches `provisioned` and records a
//! `status_changed` entry naming the grant.

use crate::aggregate::AccessRequest;
use crate::audit::{HistoryAction, LedgerEffect, NewHistoryEntry};
use crate::environment::RequestEnvironment;
use crate::error::{AccessError, Result};
use crate::grants::{GrantSystem, ProvisioningStatus};
use crate::reducer::Reducer;
use crate::types::{Principal, RequestStatus};
use smallvec::{SmallVec, smallvec};

/// Move the `system` grant of a request to `status`, on behalf of `actor`.
#[derive(Clone, Debug)]
pub struct UpdateGrantStatus {
    /// Which grant
    pub system: GrantSystem,
    /// Target provisioning status
    pub status: ProvisioningStatus,
    /// Who moves it
    pub actor: Principal,
}

/// Reducer for [`UpdateGrantStatus`] over an [`AccessRequest`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ProvisioningReducer;

impl Reducer for ProvisioningReducer {
    type State = AccessRequest;
    type Action = UpdateGrantStatus;
    type Environment = RequestEnvironment;
    type Effect = LedgerEffect;
    type Error = AccessError;

    fn reduce(
        &self,
        request: &mut AccessRequest,
        action: UpdateGrantStatus,
        env: &RequestEnvironment,
    ) -> Result<SmallVec<[LedgerEffect; 4]>> {
        let UpdateGrantStatus {
            system,
            status,
            actor,
        } = action;

        // Rejected and cancelled requests are never provisioned.
        if matches!(request.status, RequestStatus::Rejected | RequestStatus::Cancelled) {
            return Err(AccessError::TerminalState(request.status));
        }

        let now = env.clock.now();
        let from = request
            .grants
            .set_status(system, status, actor.id, now)
            .ok_or_else(|| AccessError::not_found("grant", system))?;
        request.updated_at = now;

        let entry = NewHistoryEntry::new(
            HistoryAction::StatusChanged,
            format!("{system} provisioning changed from {from} to {status}"),
            actor.id,
            now,
        )
        .with_metadata("grant", system.as_str())
        .with_metadata("from", from.as_str())
        .with_metadata("to", status.as_str());

        Ok(smallvec![LedgerEffect::AppendHistory(entry)])
    }
}
