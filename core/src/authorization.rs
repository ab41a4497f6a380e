//! Role-based authorization and data scoping.
//!
//! Pure decision functions, no I/O:
//!
//! - [`authorize`]: may this principal perform this kind of action at all?
//! - [`scope_for`]: which requests may this principal see?
//! - [`can_act`]: may this principal use a permission on this particular request?
//!
//! Role capabilities are a compiled-in table ([`Role::permissions`]), so there is no
//! shared mutable role state to patch at runtime.

use crate::error::{AccessError, Result};
use crate::types::{Principal, PrincipalId, RequestStatus, Role};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A capability a role may hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Submit new requests
    Create,
    /// Read every request
    ReadAll,
    /// Read requests of the own department
    ReadDepartment,
    /// Read requests one created or is assigned to
    ReadOwn,
    /// Move requests through non-decision statuses
    Update,
    /// Approve requests
    Approve,
    /// Reject requests
    Reject,
    /// Bind inventory assets to handover items
    LinkAsset,
    /// Read the audit ledger
    ViewHistory,
}

impl Permission {
    /// Wire/log representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::ReadAll => "read_all",
            Self::ReadDepartment => "read_department",
            Self::ReadOwn => "read_own",
            Self::Update => "update",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::LinkAsset => "link_asset",
            Self::ViewHistory => "view_history",
        }
    }
}

const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::Create,
    Permission::ReadAll,
    Permission::ReadDepartment,
    Permission::ReadOwn,
    Permission::Update,
    Permission::Approve,
    Permission::Reject,
    Permission::LinkAsset,
    Permission::ViewHistory,
];

const MANAGER_PERMISSIONS: &[Permission] = &[
    Permission::Create,
    Permission::ReadDepartment,
    Permission::Approve,
    Permission::Reject,
    Permission::ViewHistory,
];

const USER_PERMISSIONS: &[Permission] = &[Permission::Create, Permission::ReadOwn];

impl Role {
    /// Capabilities granted to this role.
    #[must_use]
    pub const fn permissions(self) -> &'static [Permission] {
        match self {
            Self::Admin => ADMIN_PERMISSIONS,
            Self::Manager => MANAGER_PERMISSIONS,
            Self::User => USER_PERMISSIONS,
        }
    }

    /// Whether this role holds `permission`.
    #[must_use]
    pub fn has_permission(self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    /// The widest read permission this role holds.
    #[must_use]
    pub const fn read_permission(self) -> Permission {
        match self {
            Self::Admin => Permission::ReadAll,
            Self::Manager => Permission::ReadDepartment,
            Self::User => Permission::ReadOwn,
        }
    }
}

/// Kinds of operation the facade performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Create a request
    CreateRequest,
    /// List requests
    ListRequests,
    /// Read one request
    ReadRequest,
    /// Move a request to the given status
    Transition(RequestStatus),
    /// Link an asset to a handover item
    LinkAsset,
    /// Move a sub-grant's provisioning status
    UpdateGrant,
    /// Read a request's ledger
    ViewHistory,
}

impl Action {
    /// Permission required for this action.
    ///
    /// Reads are satisfied by the role's read permission, whatever its breadth.
    #[must_use]
    pub const fn required_permission(&self, role: Role) -> Permission {
        match self {
            Self::CreateRequest => Permission::Create,
            Self::ListRequests | Self::ReadRequest => role.read_permission(),
            Self::Transition(RequestStatus::Approved) => Permission::Approve,
            Self::Transition(RequestStatus::Rejected) => Permission::Reject,
            Self::Transition(_) | Self::UpdateGrant => Permission::Update,
            Self::LinkAsset => Permission::LinkAsset,
            Self::ViewHistory => Permission::ViewHistory,
        }
    }

    /// Short name for logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreateRequest => "create_request",
            Self::ListRequests => "list_requests",
            Self::ReadRequest => "read_request",
            Self::Transition(_) => "transition_status",
            Self::LinkAsset => "link_asset",
            Self::UpdateGrant => "update_grant_status",
            Self::ViewHistory => "view_history",
        }
    }
}

/// Why a principal was denied.
///
/// `Display` is the caller-facing wording; the role/permission detail of
/// [`DenyReason::MissingPermission`] is only visible through `Debug` (logs).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenyReason {
    /// The role lacks the permission outright
    MissingPermission {
        /// Caller role
        role: Role,
        /// Permission that was required
        permission: Permission,
    },
    /// Manager acting outside their department
    OutsideDepartment,
    /// User acting on a request they neither created nor are assigned to
    NotOwned,
}

impl DenyReason {
    /// Log-friendly reason code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingPermission { .. } => "missing_permission",
            Self::OutsideDepartment => "outside_department",
            Self::NotOwned => "not_owned",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPermission { .. } => {
                f.write_str("You do not have permission to perform this action")
            }
            Self::OutsideDepartment => f.write_str("Resource not in your department"),
            Self::NotOwned => f.write_str("Resource not owned by you"),
        }
    }
}

/// Outcome of an authorization check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Authorization {
    /// Go ahead
    Allow,
    /// Refused, with the internal reason
    Deny(DenyReason),
}

impl Authorization {
    /// `true` for [`Authorization::Allow`].
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Convert into a result.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Forbidden`] for [`Authorization::Deny`].
    pub const fn into_result(self) -> Result<()> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(reason) => Err(AccessError::Forbidden(reason)),
        }
    }
}

/// Visibility filter for listing. Always ANDed with caller-supplied filters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DataScope {
    /// No restriction
    Unrestricted,
    /// `department = <value>`
    Department(String),
    /// `requested_by = <value> OR assigned_to = <value>`
    Ownership(PrincipalId),
}

impl DataScope {
    /// Whether `resource` is visible under this scope.
    #[must_use]
    pub fn admits(&self, resource: &impl ScopedResource) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Department(department) => resource.department() == department,
            Self::Ownership(id) => is_owned_by(resource, *id),
        }
    }
}

/// The fields authorization looks at on a request.
pub trait ScopedResource {
    /// Owning department
    fn department(&self) -> &str;
    /// Creator
    fn requested_by(&self) -> PrincipalId;
    /// Current assignee, if any
    fn assigned_to(&self) -> Option<PrincipalId>;
}

fn is_owned_by(resource: &impl ScopedResource, id: PrincipalId) -> bool {
    resource.requested_by() == id || resource.assigned_to() == Some(id)
}

/// May `principal` perform `action` at all (before looking at any resource)?
#[must_use]
pub fn authorize(principal: &Principal, action: Action) -> Authorization {
    let permission = action.required_permission(principal.role);
    if principal.role.has_permission(permission) {
        Authorization::Allow
    } else {
        Authorization::Deny(DenyReason::MissingPermission {
            role: principal.role,
            permission,
        })
    }
}

/// Visibility filter for `principal`.
#[must_use]
pub fn scope_for(principal: &Principal) -> DataScope {
    match principal.role {
        Role::Admin => DataScope::Unrestricted,
        Role::Manager => DataScope::Department(principal.department.clone()),
        Role::User => DataScope::Ownership(principal.id),
    }
}

/// May `principal` use `permission` on `resource`?
///
/// Admin always may. A manager only within their department, a user only on
/// requests they created or are assigned to.
#[must_use]
pub fn can_act(
    principal: &Principal,
    permission: Permission,
    resource: &impl ScopedResource,
) -> Authorization {
    if !principal.role.has_permission(permission) {
        return Authorization::Deny(DenyReason::MissingPermission {
            role: principal.role,
            permission,
        });
    }
    match principal.role {
        Role::Admin => Authorization::Allow,
        Role::Manager if resource.department() == principal.department => Authorization::Allow,
        Role::Manager => Authorization::Deny(DenyReason::OutsideDepartment),
        Role::User if is_owned_by(resource, principal.id) => Authorization::Allow,
        Role::User => Authorization::Deny(DenyReason::NotOwned),
    }
}

/// May `principal` create a request for `department`?
///
/// Managers create for their team and users for themselves, so both are held to
/// their own department. Admin may create for any department.
#[must_use]
pub fn can_create_for(principal: &Principal, department: &str) -> Authorization {
    match authorize(principal, Action::CreateRequest) {
        Authorization::Allow => {}
        deny @ Authorization::Deny(_) => return deny,
    }
    match principal.role {
        Role::Admin => Authorization::Allow,
        Role::Manager | Role::User if principal.department == department => Authorization::Allow,
        Role::Manager => Authorization::Deny(DenyReason::OutsideDepartment),
        Role::User => Authorization::Deny(DenyReason::NotOwned),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    struct Resource {
        department: String,
        requested_by: PrincipalId,
        assigned_to: Option<PrincipalId>,
    }

    impl ScopedResource for Resource {
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

    fn principal(role: Role, department: &str) -> Principal {
        Principal::new(PrincipalId::new(), role, department)
    }

    fn resource(department: &str, requested_by: PrincipalId) -> Resource {
        Resource {
            department: department.to_string(),
            requested_by,
            assigned_to: None,
        }
    }

    #[test]
    fn admin_may_do_everything() {
        let admin = principal(Role::Admin, "IT");
        for status in RequestStatus::ALL {
            assert!(authorize(&admin, Action::Transition(status)).is_allowed());
        }
        assert!(authorize(&admin, Action::LinkAsset).is_allowed());
        assert!(authorize(&admin, Action::UpdateGrant).is_allowed());
        assert!(authorize(&admin, Action::ViewHistory).is_allowed());
    }

    #[test]
    fn manager_decides_but_does_not_update() {
        let manager = principal(Role::Manager, "Finance");
        assert!(authorize(&manager, Action::Transition(RequestStatus::Approved)).is_allowed());
        assert!(authorize(&manager, Action::Transition(RequestStatus::Rejected)).is_allowed());
        assert_eq!(
            authorize(&manager, Action::Transition(RequestStatus::Completed)),
            Authorization::Deny(DenyReason::MissingPermission {
                role: Role::Manager,
                permission: Permission::Update,
            })
        );
        assert!(!authorize(&manager, Action::LinkAsset).is_allowed());
        assert_eq!(Action::UpdateGrant.required_permission(Role::Manager), Permission::Update);
        assert!(!authorize(&manager, Action::UpdateGrant).is_allowed());
    }

    #[test]
    fn user_cannot_approve_or_reject() {
        let user = principal(Role::User, "Finance");
        assert!(!authorize(&user, Action::Transition(RequestStatus::Approved)).is_allowed());
        assert!(!authorize(&user, Action::Transition(RequestStatus::Rejected)).is_allowed());
        assert!(authorize(&user, Action::CreateRequest).is_allowed());
        assert!(authorize(&user, Action::ListRequests).is_allowed());
        assert!(!authorize(&user, Action::ViewHistory).is_allowed());
    }

    #[test]
    fn scopes_per_role() {
        let admin = principal(Role::Admin, "IT");
        let manager = principal(Role::Manager, "HR");
        let user = principal(Role::User, "HR");
        assert_eq!(scope_for(&admin), DataScope::Unrestricted);
        assert_eq!(scope_for(&manager), DataScope::Department("HR".into()));
        assert_eq!(scope_for(&user), DataScope::Ownership(user.id));
    }

    #[test]
    fn manager_scope_excludes_other_departments() {
        let manager = principal(Role::Manager, "HR");
        let scope = scope_for(&manager);
        assert!(scope.admits(&resource("HR", PrincipalId::new())));
        assert!(!scope.admits(&resource("Finance", PrincipalId::new())));
    }

    #[test]
    fn user_scope_covers_created_and_assigned() {
        let user = principal(Role::User, "HR");
        let scope = scope_for(&user);
        assert!(scope.admits(&resource("Finance", user.id)));

        let mut assigned = resource("Finance", PrincipalId::new());
        assert!(!scope.admits(&assigned));
        assigned.assigned_to = Some(user.id);
        assert!(scope.admits(&assigned));
    }

    #[test]
    fn can_act_distinguishes_department_from_ownership() {
        let manager = principal(Role::Manager, "HR");
        let user = principal(Role::User, "HR");
        let foreign = resource("Finance", PrincipalId::new());

        assert_eq!(
            can_act(&manager, Permission::Approve, &foreign),
            Authorization::Deny(DenyReason::OutsideDepartment)
        );
        assert_eq!(
            can_act(&user, Permission::ReadOwn, &foreign),
            Authorization::Deny(DenyReason::NotOwned)
        );
        assert!(can_act(&manager, Permission::Approve, &resource("HR", user.id)).is_allowed());
        assert!(can_act(&user, Permission::ReadOwn, &resource("IT", user.id)).is_allowed());
    }

    #[test]
    fn can_act_checks_permission_before_scope() {
        let user = principal(Role::User, "HR");
        let own = resource("HR", user.id);
        assert!(matches!(
            can_act(&user, Permission::Approve, &own),
            Authorization::Deny(DenyReason::MissingPermission { .. })
        ));
    }

    #[test]
    fn creation_is_department_bound_except_for_admin() {
        let admin = principal(Role::Admin, "IT");
        let manager = principal(Role::Manager, "HR");
        let user = principal(Role::User, "HR");
        assert!(can_create_for(&admin, "Finance").is_allowed());
        assert!(can_create_for(&manager, "HR").is_allowed());
        assert_eq!(
            can_create_for(&manager, "Finance"),
            Authorization::Deny(DenyReason::OutsideDepartment)
        );
        assert!(can_create_for(&user, "HR").is_allowed());
        assert_eq!(
            can_create_for(&user, "Finance"),
            Authorization::Deny(DenyReason::NotOwned)
        );
    }

    #[test]
    fn deny_into_result_is_forbidden() {
        let err = Authorization::Deny(DenyReason::NotOwned)
            .into_result()
            .unwrap_err();
        assert_eq!(err, AccessError::Forbidden(DenyReason::NotOwned));
        assert_eq!(err.to_string(), "Resource not owned by you");
    }
}
