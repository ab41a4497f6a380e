//! The orchestration facade.
//!
//! Every operation takes the caller's [`Principal`] and runs the same pipeline:
//! authorize the kind of action, validate input, then touch storage. Single-request
//! mutations re-check scope against the row the store has locked, so the decision
//! and the write see the same state. Nothing is written before authorization and
//! validation have passed.

use crate::config::ServiceConfig;
use crate::metrics::ServiceMetrics;
use crate::numbering::RequestNumberAllocator;
use crate::retry::RetryPolicy;
use access_request_core::aggregate::{AccessRequest, CreateAccessRequest, RequestSummary};
use access_request_core::assets::{Asset, AssetLinkReducer, HandoverItem, LinkAsset};
use access_request_core::audit::{Decision, HistoryEntry};
use access_request_core::authorization::{
    Action, Authorization, Permission, authorize, can_act, can_create_for, scope_for,
};
use access_request_core::environment::{Clock, RequestEnvironment};
use access_request_core::grants::{GrantSystem, ProvisioningStatus};
use access_request_core::lifecycle::{LifecycleReducer, Transition, TransitionDetails};
use access_request_core::notify::{NoopNotifier, RequestNotifier};
use access_request_core::provisioning::{ProvisioningReducer, UpdateGrantStatus};
use access_request_core::query::{ListFilters, ListQuery, Page, PageRequest, RequestDetail};
use access_request_core::reducer::Reducer;
use access_request_core::store::AccessRequestStore;
use access_request_core::types::{AssetId, HandoverItemId, Principal, RequestId, RequestStatus};
use access_request_core::{AccessError, Result};
use std::sync::Arc;
use std::time::Instant;

/// Access request operations, on behalf of an authenticated principal.
///
/// Cheap to clone; every collaborator is shared.
#[derive(Clone)]
pub struct AccessRequestService {
    store: Arc<dyn AccessRequestStore>,
    env: RequestEnvironment,
    notifier: Arc<dyn RequestNotifier>,
    numbers: RequestNumberAllocator,
    config: ServiceConfig,
}

impl AccessRequestService {
    /// Service over `store` with default config and no notifications.
    #[must_use]
    pub fn new(store: Arc<dyn AccessRequestStore>, clock: Arc<dyn Clock>) -> Self {
        let config = ServiceConfig::default();
        Self {
            numbers: RequestNumberAllocator::new(Arc::clone(&store), numbering_policy(&config)),
            store,
            env: RequestEnvironment::new(clock),
            notifier: Arc::new(NoopNotifier),
            config,
        }
    }

    /// Replace the decision notifier.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn RequestNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.numbers = RequestNumberAllocator::new(Arc::clone(&self.store), numbering_policy(&config));
        self.config = config;
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ServiceConfig {
        &self.config
    }

    // ========================================================================
    // createRequest
    // ========================================================================

    /// Validate `body` and create a request numbered for the current year.
    ///
    /// # Errors
    ///
    /// - `Forbidden` when the principal may not create for the body's department
    /// - `ValidationError` / `EmptyRequest` for bad input, including unknown asset types
    /// - `NumberingConflict` when numbering collided twice
    /// - `StorageFailure`; nothing is written in that case
    #[tracing::instrument(skip_all, fields(actor = %principal.id, role = %principal.role))]
    pub async fn create_request(
        &self,
        principal: &Principal,
        body: CreateAccessRequest,
    ) -> Result<AccessRequest> {
        let action = Action::CreateRequest;
        let started = Instant::now();
        let result: Result<AccessRequest> = async {
            self.check(principal, action, authorize(principal, action))?;
            let validated = body.validate()?;
            self.check(
                principal,
                action,
                can_create_for(principal, &validated.employee.department),
            )?;
            if !validated.hardware.is_empty() {
                let known = self.store.known_asset_types().await?;
                validated.check_asset_types(&known)?;
            }
            self.numbers
                .create(&validated, principal, self.env.clock.now())
                .await
        }
        .await;

        if let Ok(request) = &result {
            ServiceMetrics::record_created();
            tracing::info!(
                request_id = %request.id,
                request_number = %request.request_number,
                request_type = request.request_type.as_str(),
                "Access request created"
            );
        }
        finish(action.as_str(), started, result)
    }

    // ========================================================================
    // listRequests
    // ========================================================================

    /// One page of requests visible to `principal` that match `filters`.
    ///
    /// The principal's data scope is always applied on top of `filters`.
    ///
    /// # Errors
    ///
    /// `StorageFailure` when the store cannot be read.
    pub async fn list_requests(
        &self,
        principal: &Principal,
        filters: ListFilters,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<Page<RequestSummary>> {
        let action = Action::ListRequests;
        let started = Instant::now();
        let result: Result<Page<RequestSummary>> = async {
            self.check(principal, action, authorize(principal, action))?;
            let query = ListQuery {
                scope: scope_for(principal),
                filters,
                page: PageRequest::clamped(
                    page,
                    page_size,
                    self.config.default_page_size,
                    self.config.max_page_size,
                ),
            };
            tracing::debug!(scope = ?query.scope, "Listing access requests");
            self.store.list_requests(query).await
        }
        .await;
        finish(action.as_str(), started, result)
    }

    // ========================================================================
    // getRequestDetail
    // ========================================================================

    /// A request with its approvals, plus its history when the principal may view it.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the request does not exist
    /// - `Forbidden` when it is outside the principal's scope
    pub async fn get_request_detail(&self, principal: &Principal, id: RequestId) -> Result<RequestDetail> {
        let action = Action::ReadRequest;
        let started = Instant::now();
        let result: Result<RequestDetail> = async {
            let request = self.load_for(principal, action, id).await?;
            let approvals = self.store.approvals(id).await?;
            let history = if can_act(principal, Permission::ViewHistory, &request).is_allowed() {
                Some(self.store.history(id).await?)
            } else {
                None
            };
            Ok(RequestDetail {
                request,
                approvals,
                history,
            })
        }
        .await;
        finish(action.as_str(), started, result)
    }

    // ========================================================================
    // requestHistory
    // ========================================================================

    /// The ledger of one request, oldest first.
    ///
    /// # Errors
    ///
    /// - `Forbidden` without `view_history` or outside scope
    /// - `NotFound` when the request does not exist
    pub async fn request_history(&self, principal: &Principal, id: RequestId) -> Result<Vec<HistoryEntry>> {
        let action = Action::ViewHistory;
        let started = Instant::now();
        let result: Result<Vec<HistoryEntry>> = async {
            self.load_for(principal, action, id).await?;
            self.store.history(id).await
        }
        .await;
        finish(action.as_str(), started, result)
    }

    // ========================================================================
    // transitionStatus
    // ========================================================================

    /// Move request `id` to `status` (its wire name).
    ///
    /// Approve and reject notify the [`RequestNotifier`] after commit; a failing
    /// notifier is logged and does not fail the call.
    ///
    /// # Errors
    ///
    /// - `InvalidStatus` for an unknown status name
    /// - `Forbidden` when the role lacks the target's permission or the request is out of scope
    /// - `NotFound`, `TerminalState`, `ValidationError` (rejection without reason)
    /// - `StorageFailure`; the status, stamps and ledger entries are then all unchanged
    #[tracing::instrument(skip_all, fields(actor = %principal.id, request_id = %id, status = %status))]
    pub async fn transition_status(
        &self,
        principal: &Principal,
        id: RequestId,
        status: &str,
        details: TransitionDetails,
    ) -> Result<AccessRequest> {
        let started = Instant::now();
        let target = match status.parse::<RequestStatus>() {
            Ok(target) => target,
            Err(err) => return finish("transition_status", started, Err(err)),
        };
        let action = Action::Transition(target);

        let result: Result<AccessRequest> = async {
            self.check(principal, action, authorize(principal, action))?;
            let permission = action.required_permission(principal.role);
            let actor = principal.clone();
            let env = self.env.clone();
            let request = self
                .store
                .apply_transition(
                    id,
                    Box::new(move |request: &mut AccessRequest| {
                        can_act(&actor, permission, request).into_result()?;
                        LifecycleReducer.reduce(request, Transition::new(target, actor).with_details(details), &env)
                    }),
                )
                .await;
            if let Err(AccessError::Forbidden(reason)) = &request {
                deny_log(principal, action, *reason);
            }
            request
        }
        .await;

        if let Ok(request) = &result {
            ServiceMetrics::record_transition(target);
            tracing::info!(
                request_number = %request.request_number,
                status = target.as_str(),
                "Access request status changed"
            );
            if let Some(decision) = decision_for(target) {
                if let Err(err) = self.notifier.decision_made(request, decision).await {
                    tracing::warn!(error = %err, decision = decision.as_str(), "Decision notification failed");
                }
            }
        }
        finish(action.as_str(), started, result)
    }

    // ========================================================================
    // linkAsset
    // ========================================================================

    /// Bind inventory asset `asset_id` to handover item `item_id` of request `id`.
    ///
    /// # Errors
    ///
    /// - `Forbidden` without `link_asset` or outside scope
    /// - `NotFound` when the request, the item (on this request) or the asset is missing
    /// - `AssetUnavailable` when the asset is not `available`
    /// - `ValidationError` when the item was already handed over
    #[tracing::instrument(skip_all, fields(actor = %principal.id, request_id = %id, item_id = %item_id, asset_id = %asset_id))]
    pub async fn link_asset(
        &self,
        principal: &Principal,
        id: RequestId,
        item_id: HandoverItemId,
        asset_id: AssetId,
    ) -> Result<HandoverItem> {
        let action = Action::LinkAsset;
        let started = Instant::now();
        let result: Result<HandoverItem> = async {
            self.load_for(principal, action, id).await?;
            let actor = principal.clone();
            let env = self.env.clone();
            self.store
                .link_asset(
                    id,
                    item_id,
                    asset_id,
                    Box::new(move |item: &mut HandoverItem, asset: &Asset| {
                        AssetLinkReducer.reduce(
                            item,
                            LinkAsset {
                                asset: asset.clone(),
                                actor,
                            },
                            &env,
                        )
                    }),
                )
                .await
        }
        .await;

        if result.is_ok() {
            ServiceMetrics::record_asset_linked();
            tracing::info!("Asset linked to handover item");
        }
        finish(action.as_str(), started, result)
    }

    // ========================================================================
    // updateGrantStatus
    // ========================================================================

    /// Move the provisioning status of the `system` grant of request `id`.
    ///
    /// # Errors
    ///
    /// - `Forbidden` without `update` or outside scope
    /// - `NotFound` when the request, or that grant on it, does not exist
    /// - `TerminalState` when the request was rejected or cancelled
    /// - `StorageFailure`; the grant and the ledger are then unchanged
    #[tracing::instrument(skip_all, fields(actor = %principal.id, request_id = %id, grant = %system, status = %status))]
    pub async fn update_grant_status(
        &self,
        principal: &Principal,
        id: RequestId,
        system: GrantSystem,
        status: ProvisioningStatus,
    ) -> Result<AccessRequest> {
        let action = Action::UpdateGrant;
        let started = Instant::now();
        let result: Result<AccessRequest> = async {
            self.check(principal, action, authorize(principal, action))?;
            let permission = action.required_permission(principal.role);
            let actor = principal.clone();
            let env = self.env.clone();
            let request = self
                .store
                .update_grant(
                    id,
                    system,
                    Box::new(move |request: &mut AccessRequest| {
                        can_act(&actor, permission, request).into_result()?;
                        ProvisioningReducer.reduce(
                            request,
                            UpdateGrantStatus {
                                system,
                                status,
                                actor,
                            },
                            &env,
                        )
                    }),
                )
                .await;
            if let Err(AccessError::Forbidden(reason)) = &request {
                deny_log(principal, action, *reason);
            }
            request
        }
        .await;

        if result.is_ok() {
            ServiceMetrics::record_grant_status(system, status);
            tracing::info!("Grant provisioning status changed");
        }
        finish(action.as_str(), started, result)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Authorize `action`, then load `id` and check the principal may act on it.
    async fn load_for(&self, principal: &Principal, action: Action, id: RequestId) -> Result<AccessRequest> {
        self.check(principal, action, authorize(principal, action))?;
        let request = self
            .store
            .find_request(id)
            .await?
            .ok_or_else(|| AccessError::not_found("access_request", id))?;
        let permission = action.required_permission(principal.role);
        self.check(principal, action, can_act(principal, permission, &request))?;
        Ok(request)
    }

    #[allow(clippy::unused_self)]
    fn check(&self, principal: &Principal, action: Action, decision: Authorization) -> Result<()> {
        if let Authorization::Deny(reason) = decision {
            deny_log(principal, action, reason);
        }
        decision.into_result()
    }
}

impl std::fmt::Debug for AccessRequestService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessRequestService")
            .field("numbers", &self.numbers)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn numbering_policy(config: &ServiceConfig) -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(config.numbering_max_retries)
        .initial_delay(config.numbering_retry_delay)
        .build()
}

fn deny_log(principal: &Principal, action: Action, reason: access_request_core::authorization::DenyReason) {
    ServiceMetrics::record_denied(action.as_str());
    tracing::warn!(
        actor = %principal.id,
        role = %principal.role,
        department = %principal.department,
        action = action.as_str(),
        reason = reason.code(),
        detail = ?reason,
        "Authorization denied"
    );
}

const fn decision_for(status: RequestStatus) -> Option<Decision> {
    match status {
        RequestStatus::Approved => Some(Decision::Approved),
        RequestStatus::Rejected => Some(Decision::Rejected),
        _ => None,
    }
}

/// Record latency and failures of one operation, then hand the result back.
fn finish<T>(operation: &'static str, started: Instant, result: Result<T>) -> Result<T> {
    ServiceMetrics::record_duration(operation, started.elapsed());
    if let Err(err) = &result {
        ServiceMetrics::record_error(err.kind());
        match err {
            AccessError::StorageFailure(detail) => {
                tracing::error!(operation, error = %detail, "Storage failure");
            }
            AccessError::NumberingConflict(number) => {
                tracing::error!(operation, request_number = %number, "Request numbering exhausted its retries");
            }
            other => tracing::debug!(operation, error = %other, "Operation refused"),
        }
    }
    result
}
