//! Row decoding.
//!
//! Enum columns are stored as their snake_case names. A value this service does not
//! know is reported as a storage failure rather than silently mapped.

use access_request_core::aggregate::{AccessRequest, EmployeeDetails};
use access_request_core::assets::{Asset, AssetStatus, HandoverItem, HandoverStatus};
use access_request_core::audit::{ApprovalRecord, Decision, HistoryAction, HistoryEntry};
use access_request_core::grants::{Grant, GrantSet, ProvisioningStatus};
use access_request_core::numbering::RequestNumber;
use access_request_core::types::{
    AssetId, HandoverItemId, Priority, PrincipalId, RequestId, RequestStatus, RequestType, Role,
};
use access_request_core::{AccessError, Result};
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{Postgres, Row};
use uuid::Uuid;

/// Root columns, in the order [`request_root`] reads them.
pub(crate) const ROOT_COLUMNS: &str = "id, request_number, employee_first_name, employee_last_name, \
    employee_id, directory_id, department, department_head, email, date_of_joining, status, \
    priority, request_type, notes, requested_by, approved_by, approval_date, rejected_by, \
    rejection_date, rejection_reason, assigned_to, assigned_at, completed_by, completed_at, \
    cancelled_at, created_at, updated_at";

pub(crate) const ITEM_COLUMNS: &str =
    "id, request_id, asset_type, linked_asset_id, serial_number, condition, status, linked_at";

pub(crate) const HISTORY_COLUMNS: &str =
    "id, request_id, action, description, performed_by, performed_at, metadata";

pub(crate) const APPROVAL_COLUMNS: &str =
    "id, request_id, approver_id, approver_role, decision, decision_date, comments";

pub(crate) const GRANT_COLUMNS: &str = "entitlements, status, provisioned_at, provisioned_by";

pub(crate) const ASSET_COLUMNS: &str = "id, name, asset_type, serial_number, condition, status";

/// Map a driver error. Unique violations on the request number become
/// [`AccessError::NumberingConflict`].
pub(crate) fn storage(err: sqlx::Error) -> AccessError {
    match &err {
        sqlx::Error::Database(db)
            if db.is_unique_violation() && db.constraint() == Some(REQUEST_NUMBER_CONSTRAINT) =>
        {
            AccessError::NumberingConflict(db.message().to_string())
        }
        _ => AccessError::StorageFailure(err.to_string()),
    }
}

pub(crate) const REQUEST_NUMBER_CONSTRAINT: &str = "access_requests_request_number_key";

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column).map_err(storage)
}

fn parsed<T>(row: &PgRow, column: &str, parse: impl FnOnce(&str) -> Option<T>) -> Result<T> {
    let raw: String = get(row, column)?;
    parse(&raw).ok_or_else(|| AccessError::StorageFailure(format!("unknown {column} '{raw}'")))
}

fn principal(row: &PgRow, column: &str) -> Result<PrincipalId> {
    get::<Uuid>(row, column).map(PrincipalId::from_uuid)
}

fn optional_principal(row: &PgRow, column: &str) -> Result<Option<PrincipalId>> {
    get::<Option<Uuid>>(row, column).map(|id| id.map(PrincipalId::from_uuid))
}

/// Root row without grants or handover items.
pub(crate) fn request_root(row: &PgRow) -> Result<AccessRequest> {
    Ok(AccessRequest {
        id: RequestId::from_uuid(get(row, "id")?),
        request_number: parsed(row, "request_number", |s| RequestNumber::from_stored(s))?,
        employee: EmployeeDetails {
            first_name: get(row, "employee_first_name")?,
            last_name: get(row, "employee_last_name")?,
            employee_id: get(row, "employee_id")?,
            directory_id: get(row, "directory_id")?,
            department: get(row, "department")?,
            department_head: get(row, "department_head")?,
            email: get(row, "email")?,
            date_of_joining: get(row, "date_of_joining")?,
        },
        status: parsed(row, "status", |s| s.parse::<RequestStatus>().ok())?,
        priority: parsed(row, "priority", Priority::parse)?,
        request_type: parsed(row, "request_type", RequestType::parse)?,
        notes: get(row, "notes")?,
        requested_by: principal(row, "requested_by")?,
        approved_by: optional_principal(row, "approved_by")?,
        approval_date: get(row, "approval_date")?,
        rejected_by: optional_principal(row, "rejected_by")?,
        rejection_date: get(row, "rejection_date")?,
        rejection_reason: get(row, "rejection_reason")?,
        assigned_to: optional_principal(row, "assigned_to")?,
        assigned_at: get(row, "assigned_at")?,
        completed_by: optional_principal(row, "completed_by")?,
        completed_at: get(row, "completed_at")?,
        cancelled_at: get(row, "cancelled_at")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
        grants: GrantSet::default(),
        handover_items: Vec::new(),
    })
}

pub(crate) fn grant<E>(row: &PgRow) -> Result<Grant<E>>
where
    E: serde::de::DeserializeOwned,
{
    let Json(entitlements): Json<E> = get(row, "entitlements")?;
    Ok(Grant {
        entitlements,
        status: parsed(row, "status", ProvisioningStatus::parse)?,
        provisioned_at: get(row, "provisioned_at")?,
        provisioned_by: optional_principal(row, "provisioned_by")?,
    })
}

pub(crate) fn handover_item(row: &PgRow) -> Result<HandoverItem> {
    Ok(HandoverItem {
        id: HandoverItemId::from_uuid(get(row, "id")?),
        request_id: RequestId::from_uuid(get(row, "request_id")?),
        asset_type: get(row, "asset_type")?,
        linked_asset_id: get::<Option<Uuid>>(row, "linked_asset_id")?.map(AssetId::from_uuid),
        serial_number: get(row, "serial_number")?,
        condition: get(row, "condition")?,
        status: parsed(row, "status", HandoverStatus::parse)?,
        linked_at: get(row, "linked_at")?,
    })
}

pub(crate) fn history_entry(row: &PgRow) -> Result<HistoryEntry> {
    let Json(metadata): Json<Map<String, Value>> = get(row, "metadata")?;
    Ok(HistoryEntry {
        id: get(row, "id")?,
        request_id: RequestId::from_uuid(get(row, "request_id")?),
        action: parsed(row, "action", HistoryAction::parse)?,
        description: get(row, "description")?,
        performed_by: principal(row, "performed_by")?,
        performed_at: get(row, "performed_at")?,
        metadata,
    })
}

pub(crate) fn approval_record(row: &PgRow) -> Result<ApprovalRecord> {
    Ok(ApprovalRecord {
        id: get(row, "id")?,
        request_id: RequestId::from_uuid(get(row, "request_id")?),
        approver_id: principal(row, "approver_id")?,
        approver_role: parsed(row, "approver_role", Role::parse)?,
        decision: parsed(row, "decision", Decision::parse)?,
        decision_date: get(row, "decision_date")?,
        comments: get(row, "comments")?,
    })
}

pub(crate) fn asset(row: &PgRow) -> Result<Asset> {
    Ok(Asset {
        id: AssetId::from_uuid(get(row, "id")?),
        name: get(row, "name")?,
        asset_type: get(row, "asset_type")?,
        serial_number: get(row, "serial_number")?,
        condition: get(row, "condition")?,
        status: AssetStatus::from(get::<String>(row, "status")?),
    })
}

/// Escape `%`, `_` and `\` for use inside an `ILIKE` pattern.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
