//! The access request aggregate.
//!
//! Creation happens in two steps. [`CreateAccessRequest::validate`] turns the loosely
//! typed body received at the boundary into a [`ValidatedRequest`], collecting every
//! field error and refusing requests that ask for nothing. After a request number has
//! been allocated, [`ValidatedRequest::into_new_request`] produces the
//! [`NewAccessRequest`] the store writes atomically, initial history entry included.

use crate::assets::HandoverItem;
use crate::audit::{HistoryAction, NewHistoryEntry};
use crate::authorization::ScopedResource;
use crate::error::{AccessError, Result, ValidationErrors};
use crate::grants::{ErpAccess, GrantSet, NetworkEmailAccess, TimeAttendanceAccess};
use crate::numbering::RequestNumber;
use crate::types::{HandoverItemId, Principal, PrincipalId, Priority, RequestId, RequestStatus, RequestType};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

const NAME_MAX: usize = 100;
const EMPLOYEE_ID_MAX: usize = 50;
const DEPARTMENT_MAX: usize = 100;
const DIRECTORY_ID_MAX: usize = 255;
const EMAIL_MAX: usize = 255;
const NOTES_MAX: usize = 2000;
const ASSET_TYPE_MAX: usize = 100;

// ============================================================================
// Boundary input
// ============================================================================

/// Creation body as received from the API, before validation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateAccessRequest {
    /// Employee first name
    pub employee_first_name: Option<String>,
    /// Employee last name
    pub employee_last_name: Option<String>,
    /// HR employee number
    pub employee_id: Option<String>,
    /// Directory (Entra ID) identity
    pub directory_id: Option<String>,
    /// Department
    pub department: Option<String>,
    /// Head of department
    pub department_head: Option<String>,
    /// Work email
    pub email: Option<String>,
    /// `YYYY-MM-DD`
    pub date_of_joining: Option<String>,
    /// `low` / `medium` / `high`
    pub priority: Option<String>,
    /// Free text
    pub notes: Option<String>,
    /// Network/email flags
    pub network_email: Option<NetworkEmailAccess>,
    /// ERP flags, per module
    pub erp: Option<ErpAccess>,
    /// Time-attendance flags
    pub time_attendance: Option<TimeAttendanceAccess>,
    /// Requested hardware, as asset-type labels
    pub hardware: Vec<String>,
}

/// Immutable facts about the employee the request is for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeDetails {
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
    /// HR employee number
    pub employee_id: Option<String>,
    /// Directory (Entra ID) identity
    pub directory_id: Option<String>,
    /// Department
    pub department: String,
    /// Head of department
    pub department_head: Option<String>,
    /// Work email
    pub email: String,
    /// First working day
    pub date_of_joining: NaiveDate,
}

impl EmployeeDetails {
    /// `First Last`
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A creation body that passed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedRequest {
    /// Employee facts
    pub employee: EmployeeDetails,
    /// Priority
    pub priority: Priority,
    /// Notes
    pub notes: Option<String>,
    /// Requested grants (all-false bundles already dropped)
    pub grants: GrantSet,
    /// Requested hardware labels
    pub hardware: Vec<String>,
    /// Derived once, here
    pub request_type: RequestType,
}

impl CreateAccessRequest {
    /// Validate and convert to the typed payload.
    ///
    /// # Errors
    ///
    /// - [`AccessError::Validation`] listing every invalid field
    /// - [`AccessError::EmptyRequest`] when no grant and no hardware is requested
    pub fn validate(self) -> Result<ValidatedRequest> {
        let mut errors = ValidationErrors::default();

        let first_name = required_text(&mut errors, "employee_first_name", self.employee_first_name, NAME_MAX);
        let last_name = required_text(&mut errors, "employee_last_name", self.employee_last_name, NAME_MAX);
        let employee_id = optional_text(&mut errors, "employee_id", self.employee_id, EMPLOYEE_ID_MAX);
        let directory_id = optional_text(&mut errors, "directory_id", self.directory_id, DIRECTORY_ID_MAX);
        let department = required_text(&mut errors, "department", self.department, DEPARTMENT_MAX);
        let department_head = optional_text(&mut errors, "department_head", self.department_head, NAME_MAX);
        let email = required_text(&mut errors, "email", self.email, EMAIL_MAX);
        if let Some(email) = &email {
            if !is_email(email) {
                errors.push("email", "must be a valid email address");
            }
        }
        let date_of_joining = match normalize(self.date_of_joining) {
            None => {
                errors.push("date_of_joining", "is required");
                None
            }
            Some(raw) => match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
                Ok(date) => Some(date),
                Err(_) => {
                    errors.push("date_of_joining", "must be a date (YYYY-MM-DD)");
                    None
                }
            },
        };
        let priority = match normalize(self.priority) {
            None => Priority::default(),
            Some(raw) => Priority::parse(&raw).unwrap_or_else(|| {
                errors.push("priority", "must be one of low, medium, high");
                Priority::default()
            }),
        };
        let notes = optional_text(&mut errors, "notes", self.notes, NOTES_MAX);

        let mut hardware = Vec::with_capacity(self.hardware.len());
        for label in self.hardware {
            let label = label.trim();
            if label.is_empty() {
                errors.push("hardware", "asset type labels must not be blank");
            } else if label.chars().count() > ASSET_TYPE_MAX {
                errors.push("hardware", format!("asset type labels must be at most {ASSET_TYPE_MAX} characters"));
            } else {
                hardware.push(label.to_string());
            }
        }

        errors.into_result()?;

        let grants = GrantSet::from_requested(self.network_email, self.erp, self.time_attendance);
        let request_type = RequestType::derive(!grants.is_empty(), !hardware.is_empty())
            .ok_or(AccessError::EmptyRequest)?;

        // every Option below is Some once `errors` came back empty
        match (first_name, last_name, department, email, date_of_joining) {
            (Some(first_name), Some(last_name), Some(department), Some(email), Some(date_of_joining)) => {
                Ok(ValidatedRequest {
                    employee: EmployeeDetails {
                        first_name,
                        last_name,
                        employee_id,
                        directory_id,
                        department,
                        department_head,
                        email,
                        date_of_joining,
                    },
                    priority,
                    notes,
                    grants,
                    hardware,
                    request_type,
                })
            }
            _ => Err(AccessError::invalid_field("body", "incomplete employee details")),
        }
    }
}

impl ValidatedRequest {
    /// Check every hardware label against the master-data asset types.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Validation`] naming each unknown label.
    pub fn check_asset_types(&self, known: &[String]) -> Result<()> {
        let mut errors = ValidationErrors::default();
        for label in &self.hardware {
            if !known.iter().any(|k| k.eq_ignore_ascii_case(label)) {
                errors.push("hardware", format!("unknown asset type '{label}'"));
            }
        }
        errors.into_result()
    }

    /// Build the row set to insert, stamped with `number`, `requester` and `now`.
    #[must_use]
    pub fn into_new_request(
        self,
        request_number: RequestNumber,
        requester: &Principal,
        now: DateTime<Utc>,
    ) -> NewAccessRequest {
        let initial_entry = NewHistoryEntry::new(
            HistoryAction::Created,
            format!("Access request created for {}", self.employee.full_name()),
            requester.id,
            now,
        )
        .with_metadata("request_number", request_number.as_str())
        .with_metadata("request_type", self.request_type.as_str());

        NewAccessRequest {
            request_number,
            employee: self.employee,
            priority: self.priority,
            notes: self.notes,
            request_type: self.request_type,
            requested_by: requester.id,
            grants: self.grants,
            hardware: self.hardware,
            created_at: now,
            initial_entry,
        }
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required_text(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: Option<String>,
    max: usize,
) -> Option<String> {
    let Some(value) = normalize(value) else {
        errors.push(field, "is required");
        return None;
    };
    if value.chars().count() > max {
        errors.push(field, format!("must be at most {max} characters"));
        return None;
    }
    Some(value)
}

fn optional_text(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: Option<String>,
    max: usize,
) -> Option<String> {
    let value = normalize(value)?;
    if value.chars().count() > max {
        errors.push(field, format!("must be at most {max} characters"));
        return None;
    }
    Some(value)
}

fn is_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

// ============================================================================
// Persisted shapes
// ============================================================================

/// Everything the store writes for one creation, in one transaction.
#[derive(Clone, Debug, PartialEq)]
pub struct NewAccessRequest {
    /// Allocated number
    pub request_number: RequestNumber,
    /// Employee facts
    pub employee: EmployeeDetails,
    /// Priority
    pub priority: Priority,
    /// Notes
    pub notes: Option<String>,
    /// Derived request type
    pub request_type: RequestType,
    /// Creator
    pub requested_by: PrincipalId,
    /// Grants to insert
    pub grants: GrantSet,
    /// One handover item per label
    pub hardware: Vec<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// The `created` ledger entry
    pub initial_entry: NewHistoryEntry,
}

impl NewAccessRequest {
    /// Materialize the aggregate once storage has assigned identities.
    ///
    /// `item_ids` must hold one id per hardware label, in order.
    #[must_use]
    pub fn into_request(self, id: RequestId, item_ids: &[HandoverItemId]) -> AccessRequest {
        let handover_items = self
            .hardware
            .into_iter()
            .zip(item_ids)
            .map(|(asset_type, item_id)| HandoverItem::pending(*item_id, id, asset_type))
            .collect();

        AccessRequest {
            id,
            request_number: self.request_number,
            employee: self.employee,
            status: RequestStatus::Pending,
            priority: self.priority,
            request_type: self.request_type,
            notes: self.notes,
            requested_by: self.requested_by,
            approved_by: None,
            approval_date: None,
            rejected_by: None,
            rejection_date: None,
            rejection_reason: None,
            assigned_to: None,
            assigned_at: None,
            completed_by: None,
            completed_at: None,
            cancelled_at: None,
            created_at: self.created_at,
            updated_at: self.created_at,
            grants: self.grants,
            handover_items,
        }
    }
}

/// The aggregate root with the grants and handover items it owns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    /// Storage identity
    pub id: RequestId,
    /// `SAR-<year>-<seq>`, assigned once
    pub request_number: RequestNumber,
    /// Employee facts
    pub employee: EmployeeDetails,
    /// Lifecycle status
    pub status: RequestStatus,
    /// Priority
    pub priority: Priority,
    /// Fixed at creation
    pub request_type: RequestType,
    /// Notes
    pub notes: Option<String>,
    /// Creator
    pub requested_by: PrincipalId,
    /// Set by the `approved` transition
    pub approved_by: Option<PrincipalId>,
    /// Set by the `approved` transition
    pub approval_date: Option<DateTime<Utc>>,
    /// Set by the `rejected` transition
    pub rejected_by: Option<PrincipalId>,
    /// Set by the `rejected` transition
    pub rejection_date: Option<DateTime<Utc>>,
    /// Set by the `rejected` transition
    pub rejection_reason: Option<String>,
    /// Set by `in_progress` with an assignee
    pub assigned_to: Option<PrincipalId>,
    /// Set by `in_progress` with an assignee
    pub assigned_at: Option<DateTime<Utc>>,
    /// Set by the `completed` transition
    pub completed_by: Option<PrincipalId>,
    /// Set by the `completed` transition
    pub completed_at: Option<DateTime<Utc>>,
    /// Set by the `cancelled` transition
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last transition time
    pub updated_at: DateTime<Utc>,
    /// Requested grants
    pub grants: GrantSet,
    /// Requested hardware
    pub handover_items: Vec<HandoverItem>,
}

impl AccessRequest {
    /// Listing view of this request.
    #[must_use]
    pub fn summary(&self) -> RequestSummary {
        RequestSummary {
            id: self.id,
            request_number: self.request_number.clone(),
            employee_first_name: self.employee.first_name.clone(),
            employee_last_name: self.employee.last_name.clone(),
            employee_id: self.employee.employee_id.clone(),
            department: self.employee.department.clone(),
            email: self.employee.email.clone(),
            status: self.status,
            priority: self.priority,
            request_type: self.request_type,
            requested_by: self.requested_by,
            assigned_to: self.assigned_to,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Look up one of this request's handover items.
    #[must_use]
    pub fn handover_item(&self, id: HandoverItemId) -> Option<&HandoverItem> {
        self.handover_items.iter().find(|item| item.id == id)
    }
}

impl ScopedResource for AccessRequest {
    fn department(&self) -> &str {
        &self.employee.department
    }

    fn requested_by(&self) -> PrincipalId {
        self.requested_by
    }

    fn assigned_to(&self) -> Option<PrincipalId> {
        self.assigned_to
    }
}

/// Root fields only, as returned by listings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSummary {
    /// Storage identity
    pub id: RequestId,
    /// Request number
    pub request_number: RequestNumber,
    /// Employee first name
    pub employee_first_name: String,
    /// Employee last name
    pub employee_last_name: String,
    /// HR employee number
    pub employee_id: Option<String>,
    /// Department
    pub department: String,
    /// Work email
    pub email: String,
    /// Lifecycle status
    pub status: RequestStatus,
    /// Priority
    pub priority: Priority,
    /// Request type
    pub request_type: RequestType,
    /// Creator
    pub requested_by: PrincipalId,
    /// Assignee
    pub assigned_to: Option<PrincipalId>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last transition time
    pub updated_at: DateTime<Utc>,
}

impl ScopedResource for RequestSummary {
    fn department(&self) -> &str {
        &self.department
    }

    fn requested_by(&self) -> PrincipalId {
        self.requested_by
    }

    fn assigned_to(&self) -> Option<PrincipalId> {
        self.assigned_to
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::Role;
    use proptest::prelude::*;

    fn john_doe() -> CreateAccessRequest {
        CreateAccessRequest {
            employee_first_name: Some("John".into()),
            employee_last_name: Some("Doe".into()),
            department: Some("Finance".into()),
            email: Some("john@x.com".into()),
            date_of_joining: Some("2025-03-01".into()),
            network_email: Some(NetworkEmailAccess {
                network_login: true,
                ..NetworkEmailAccess::default()
            }),
            ..CreateAccessRequest::default()
        }
    }

    #[test]
    fn network_login_only_is_software() {
        let validated = john_doe().validate().unwrap();
        assert_eq!(validated.request_type, RequestType::Software);
        assert_eq!(validated.priority, Priority::Medium);
        assert!(validated.grants.network_email.is_some());
        assert!(validated.grants.erp.is_none());
    }

    #[test]
    fn priority_is_accepted_in_any_case() {
        let body = CreateAccessRequest {
            priority: Some(" HIGH ".into()),
            ..john_doe()
        };
        assert_eq!(body.validate().unwrap().priority, Priority::High);
    }

    #[test]
    fn hardware_only_is_hardware() {
        let body = CreateAccessRequest {
            network_email: None,
            hardware: vec!["Laptop".into()],
            ..john_doe()
        };
        assert_eq!(body.validate().unwrap().request_type, RequestType::Hardware);
    }

    #[test]
    fn all_false_flags_and_no_hardware_is_empty() {
        let body = CreateAccessRequest {
            network_email: Some(NetworkEmailAccess::default()),
            erp: Some(ErpAccess::default()),
            ..john_doe()
        };
        assert_eq!(body.validate().unwrap_err(), AccessError::EmptyRequest);
    }

    #[test]
    fn collects_every_field_error() {
        let body = CreateAccessRequest {
            employee_first_name: Some("  ".into()),
            email: Some("not-an-email".into()),
            date_of_joining: Some("01/03/2025".into()),
            priority: Some("urgent".into()),
            ..john_doe()
        };
        let AccessError::Validation(errors) = body.validate().unwrap_err() else {
            panic!("expected validation error");
        };
        let fields: Vec<_> = errors.fields().iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["employee_first_name", "email", "date_of_joining", "priority"]);
    }

    #[test]
    fn validation_precedes_empty_request() {
        let body = CreateAccessRequest {
            email: None,
            network_email: None,
            ..john_doe()
        };
        assert_eq!(body.validate().unwrap_err().kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn overlong_employee_id_is_rejected() {
        let body = CreateAccessRequest {
            employee_id: Some("E".repeat(51)),
            ..john_doe()
        };
        assert_eq!(body.validate().unwrap_err().kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn unknown_asset_type_is_rejected() {
        let validated = CreateAccessRequest {
            hardware: vec!["Laptop".into(), "Hoverboard".into()],
            ..john_doe()
        }
        .validate()
        .unwrap();
        let known = vec!["Laptop".to_string(), "Desktop".to_string()];
        let err = validated.check_asset_types(&known).unwrap_err();
        assert!(err.to_string().contains("Hoverboard"));
        assert!(!err.to_string().contains("'Laptop'"));
    }

    #[test]
    fn new_request_carries_created_entry() {
        let requester = Principal::new(PrincipalId::new(), Role::User, "Finance");
        let now = Utc::now();
        let number = RequestNumber::format(2025, 1);
        let new = john_doe()
            .validate()
            .unwrap()
            .into_new_request(number.clone(), &requester, now);

        assert_eq!(new.requested_by, requester.id);
        assert_eq!(new.initial_entry.action, HistoryAction::Created);
        assert_eq!(new.initial_entry.description, "Access request created for John Doe");
        assert_eq!(new.initial_entry.metadata["request_number"], "SAR-2025-001");

        let request = new.into_request(RequestId::new(), &[]);
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.request_number, number);
        assert_eq!(request.updated_at, now);
    }

    #[test]
    fn handover_items_follow_hardware_order() {
        let requester = Principal::new(PrincipalId::new(), Role::Admin, "IT");
        let new = CreateAccessRequest {
            hardware: vec!["Laptop".into(), "Duty SIM Card".into()],
            ..john_doe()
        }
        .validate()
        .unwrap()
        .into_new_request(RequestNumber::format(2025, 2), &requester, Utc::now());
        let ids = [HandoverItemId::new(), HandoverItemId::new()];
        let request = new.into_request(RequestId::new(), &ids);

        assert_eq!(request.request_type, RequestType::Both);
        assert_eq!(request.handover_items.len(), 2);
        assert_eq!(request.handover_items[1].asset_type, "Duty SIM Card");
        assert_eq!(request.handover_item(ids[0]).unwrap().asset_type, "Laptop");
    }

    proptest! {
        #[test]
        fn request_type_tracks_grants_and_hardware(
            login in any::<bool>(),
            hr_admin in any::<bool>(),
            hardware_count in 0usize..3,
        ) {
            let body = CreateAccessRequest {
                network_email: Some(NetworkEmailAccess { network_login: login, ..NetworkEmailAccess::default() }),
                time_attendance: Some(TimeAttendanceAccess { hr_admin, ..TimeAttendanceAccess::default() }),
                hardware: vec!["Laptop".to_string(); hardware_count],
                ..john_doe()
            };
            let has_grant = login || hr_admin;
            let has_hardware = hardware_count > 0;
            match body.validate() {
                Ok(validated) => prop_assert_eq!(
                    Some(validated.request_type),
                    RequestType::derive(has_grant, has_hardware)
                ),
                Err(err) => {
                    prop_assert!(!has_grant && !has_hardware);
                    prop_assert_eq!(err, AccessError::EmptyRequest);
                }
            }
        }
    }
}
