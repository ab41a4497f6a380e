//! Access request API endpoints.
//!
//! - POST  /api/access-requests - Create a request
//! - GET   /api/access-requests - List visible requests, one page at a time
//! - GET   /api/access-requests/:id - Request detail with approvals (and history)
//! - PATCH /api/access-requests/:id/status - Move a request through its lifecycle
//! - PATCH /api/access-requests/:id/grants/:system - Move a sub-grant's provisioning status
//! - PUT   /api/access-requests/:id/handover-items/:item_id/asset - Link an inventory asset
//! - GET   /api/access-requests/:id/history - Audit ledger of a request
//!
//! Malformed ids answer 404: no request can have them. Body and query parse failures
//! answer 422 with the same error body as domain validation.

use crate::error::AppError;
use crate::extractors::AuthenticatedPrincipal;
use crate::state::AppState;
use access_request_core::AccessError;
use access_request_core::aggregate::{AccessRequest, CreateAccessRequest, RequestSummary};
use access_request_core::assets::HandoverItem;
use access_request_core::audit::HistoryEntry;
use access_request_core::grants::{GrantSystem, ProvisioningStatus};
use access_request_core::lifecycle::TransitionDetails;
use access_request_core::query::{ListFilters, Page, RequestDetail};
use access_request_core::types::{AssetId, HandoverItemId, Priority, RequestId, RequestStatus};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

// ============================================================================
// Request Types
// ============================================================================

/// Query parameters for listing requests.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListParams {
    /// Exact status (wire name)
    pub status: Option<String>,
    /// Exact department
    pub department: Option<String>,
    /// Exact priority
    pub priority: Option<String>,
    /// Substring over names, request number and employee id
    pub search: Option<String>,
    /// 1-based page
    pub page: Option<u32>,
    /// Items per page
    pub page_size: Option<u32>,
}

impl ListParams {
    fn filters(self) -> Result<(ListFilters, Option<u32>, Option<u32>), AccessError> {
        let status = blank_to_none(self.status)
            .map(|s| s.parse::<RequestStatus>())
            .transpose()?;
        let priority = blank_to_none(self.priority)
            .map(|p| {
                Priority::parse(&p)
                    .ok_or_else(|| AccessError::invalid_field("priority", "must be low, medium or high"))
            })
            .transpose()?;

        let filters = ListFilters {
            status,
            department: blank_to_none(self.department),
            priority,
            search: blank_to_none(self.search),
        };
        Ok((filters, self.page, self.page_size))
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Body of a status change.
#[derive(Debug, Deserialize)]
pub struct TransitionBody {
    /// Target status (wire name)
    pub status: String,
    /// Reason, comments and assignee
    #[serde(flatten)]
    pub details: TransitionDetails,
}

/// Body of a grant provisioning update.
#[derive(Debug, Deserialize)]
pub struct GrantStatusBody {
    /// Target provisioning status (wire name)
    pub status: String,
}

impl GrantStatusBody {
    fn status(&self) -> Result<ProvisioningStatus, AccessError> {
        ProvisioningStatus::parse(self.status.trim()).ok_or_else(|| {
            AccessError::invalid_field("status", "must be pending, in_progress or provisioned")
        })
    }
}

/// Body of an asset link.
#[derive(Debug, Deserialize)]
pub struct LinkAssetBody {
    /// Inventory asset to bind
    pub asset_id: Uuid,
}

fn request_id(raw: &str) -> Result<RequestId, AccessError> {
    Uuid::parse_str(raw)
        .map(RequestId::from_uuid)
        .map_err(|_| AccessError::not_found("access_request", raw))
}

fn item_id(raw: &str) -> Result<HandoverItemId, AccessError> {
    Uuid::parse_str(raw)
        .map(HandoverItemId::from_uuid)
        .map_err(|_| AccessError::not_found("handover_item", raw))
}

fn grant_system(raw: &str) -> Result<GrantSystem, AccessError> {
    GrantSystem::parse(raw).ok_or_else(|| AccessError::not_found("grant", raw))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AccessError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AccessError::invalid_field("body", rejection.body_text()))
}

// ============================================================================
// Handlers
// ============================================================================

/// Create an access request.
///
/// ```text
/// POST /api/access-requests
/// ```
///
/// Answers 201 with the created aggregate, including its request number.
pub async fn create_request(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    payload: Result<Json<CreateAccessRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AccessRequest>), AppError> {
    let request = state.service.create_request(&principal, body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// List requests visible to the caller.
///
/// ```text
/// GET /api/access-requests?status=pending&department=Finance&priority=high&search=doe&page=1&page_size=20
/// ```
pub async fn list_requests(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Page<RequestSummary>>, AppError> {
    let Query(params) =
        params.map_err(|rejection| AccessError::invalid_field("query", rejection.body_text()))?;
    let (filters, page, page_size) = params.filters()?;

    let page = state
        .service
        .list_requests(&principal, filters, page, page_size)
        .await?;
    Ok(Json(page))
}

/// Request detail.
///
/// ```text
/// GET /api/access-requests/:id
/// ```
pub async fn get_request(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(id): Path<String>,
) -> Result<Json<RequestDetail>, AppError> {
    let detail = state
        .service
        .get_request_detail(&principal, request_id(&id)?)
        .await?;
    Ok(Json(detail))
}

/// Change a request's status.
///
/// ```text
/// PATCH /api/access-requests/:id/status
/// { "status": "rejected", "rejection_reason": "Duplicate request" }
/// ```
pub async fn transition_status(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(id): Path<String>,
    payload: Result<Json<TransitionBody>, JsonRejection>,
) -> Result<Json<AccessRequest>, AppError> {
    let id = request_id(&id)?;
    let TransitionBody { status, details } = body(payload)?;

    let request = state
        .service
        .transition_status(&principal, id, &status, details)
        .await?;
    Ok(Json(request))
}

/// Move the provisioning status of one sub-grant.
///
/// ```text
/// PATCH /api/access-requests/:id/grants/:system
/// { "status": "provisioned" }
/// ```
///
/// `system` is `network_email`, `erp` or `time_attendance`.
pub async fn update_grant_status(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path((id, system)): Path<(String, String)>,
    payload: Result<Json<GrantStatusBody>, JsonRejection>,
) -> Result<Json<AccessRequest>, AppError> {
    let id = request_id(&id)?;
    let system = grant_system(&system)?;
    let status = body(payload)?.status()?;

    let request = state
        .service
        .update_grant_status(&principal, id, system, status)
        .await?;
    Ok(Json(request))
}

/// Link an inventory asset to a handover item.
///
/// ```text
/// PUT /api/access-requests/:id/handover-items/:item_id/asset
/// { "asset_id": "..." }
/// ```
pub async fn link_asset(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path((id, item)): Path<(String, String)>,
    payload: Result<Json<LinkAssetBody>, JsonRejection>,
) -> Result<Json<HandoverItem>, AppError> {
    let id = request_id(&id)?;
    let item = item_id(&item)?;
    let LinkAssetBody { asset_id } = body(payload)?;

    let item = state
        .service
        .link_asset(&principal, id, item, AssetId::from_uuid(asset_id))
        .await?;
    Ok(Json(item))
}

/// Audit ledger of a request, oldest first.
///
/// ```text
/// GET /api/access-requests/:id/history
/// ```
pub async fn request_history(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(id): Path<String>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    let history = state
        .service
        .request_history(&principal, request_id(&id)?)
        .await?;
    Ok(Json(history))
}
