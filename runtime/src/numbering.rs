//! Request number allocation.
//!
//! The store hands out sequences with an atomic per-year increment, and the unique
//! constraint on `request_number` backs it up. If an insert still collides (for
//! example a number written outside the counter), the whole allocate-and-insert
//! step is retried with a fresh sequence before `NumberingConflict` is surfaced.

use crate::metrics::ServiceMetrics;
use crate::retry::{RetryPolicy, retry_with_predicate};
use access_request_core::aggregate::{AccessRequest, ValidatedRequest};
use access_request_core::numbering::RequestNumber;
use access_request_core::store::AccessRequestStore;
use access_request_core::types::Principal;
use access_request_core::{AccessError, Result};
use chrono::{DateTime, Datelike, Utc};
use std::sync::Arc;

/// Allocates `SAR-<year>-<seq>` numbers and inserts the request under one.
#[derive(Clone)]
pub struct RequestNumberAllocator {
    store: Arc<dyn AccessRequestStore>,
    policy: RetryPolicy,
}

impl RequestNumberAllocator {
    /// Allocator over `store` retrying collisions per `policy`.
    #[must_use]
    pub fn new(store: Arc<dyn AccessRequestStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Next number for `year`, without inserting anything.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::StorageFailure`] if the counter cannot be advanced.
    pub async fn allocate(&self, year: i32) -> Result<RequestNumber> {
        let sequence = self.store.next_request_sequence(year).await?;
        Ok(RequestNumber::format(year, sequence))
    }

    /// Number and insert `request` for `requester`, stamped `now`.
    ///
    /// # Errors
    ///
    /// - [`AccessError::NumberingConflict`] once the retry budget is spent
    /// - [`AccessError::StorageFailure`] from the store
    pub async fn create(
        &self,
        request: &ValidatedRequest,
        requester: &Principal,
        now: DateTime<Utc>,
    ) -> Result<AccessRequest> {
        let year = now.year();
        retry_with_predicate(
            &self.policy,
            || async move {
                let number = self.allocate(year).await?;
                let new = request.clone().into_new_request(number, requester, now);
                self.store.insert_request(new).await.inspect_err(|err| {
                    if matches!(err, AccessError::NumberingConflict(_)) {
                        tracing::warn!(year, error = %err, "Request number collision");
                        ServiceMetrics::record_numbering_conflict();
                    }
                })
            },
            |err| matches!(err, AccessError::NumberingConflict(_)),
        )
        .await
    }
}

impl std::fmt::Debug for RequestNumberAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestNumberAllocator")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
