//! Typed sub-grants: the entitlement flags requested for each target system.
//!
//! A grant exists only when at least one of its flags is set; an all-false set of
//! flags is represented as an absent grant, never as a zeroed record.

use crate::types::PrincipalId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A bundle of boolean entitlements.
pub trait Entitlements {
    /// At least one entitlement is requested.
    fn any_requested(&self) -> bool;
}

/// Provisioning progress of one grant, tracked apart from the request status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningStatus {
    /// Not yet provisioned
    #[default]
    Pending,
    /// IT is working on it
    InProgress,
    /// Accounts exist
    Provisioned,
}

impl ProvisioningStatus {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Provisioned => "provisioned",
        }
    }

    /// Parse a stored status.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "provisioned" => Some(Self::Provisioned),
            _ => None,
        }
    }
}

impl fmt::Display for ProvisioningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target system of a sub-grant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantSystem {
    /// Network login and mail
    NetworkEmail,
    /// ERP modules
    Erp,
    /// Time and attendance
    TimeAttendance,
}

impl GrantSystem {
    /// Wire/storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkEmail => "network_email",
            Self::Erp => "erp",
            Self::TimeAttendance => "time_attendance",
        }
    }

    /// Parse a system name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "network_email" => Some(Self::NetworkEmail),
            "erp" => Some(Self::Erp),
            "time_attendance" => Some(Self::TimeAttendance),
            _ => None,
        }
    }
}

impl fmt::Display for GrantSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provisioning state of one grant, independent of its entitlement type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct GrantProgress {
    /// Current status
    pub status: ProvisioningStatus,
    /// Set while `status` is `provisioned`
    pub provisioned_at: Option<DateTime<Utc>>,
    /// Set while `status` is `provisioned`
    pub provisioned_by: Option<PrincipalId>,
}

/// Requested entitlements plus their provisioning status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant<E> {
    /// What was requested
    pub entitlements: E,
    /// Provisioning progress
    pub status: ProvisioningStatus,
    /// When IT marked it provisioned
    #[serde(default)]
    pub provisioned_at: Option<DateTime<Utc>>,
    /// Who marked it provisioned
    #[serde(default)]
    pub provisioned_by: Option<PrincipalId>,
}

impl<E: Entitlements> Grant<E> {
    /// A pending grant, or `None` when nothing is requested.
    #[must_use]
    pub fn requested(entitlements: E) -> Option<Self> {
        entitlements.any_requested().then(|| Self {
            entitlements,
            status: ProvisioningStatus::Pending,
            provisioned_at: None,
            provisioned_by: None,
        })
    }
}

impl<E> Grant<E> {
    /// Move to `status` and return the previous one.
    ///
    /// Moving to `provisioned` stamps `actor` and `at`; any other status clears them.
    pub fn set_status(
        &mut self,
        status: ProvisioningStatus,
        actor: PrincipalId,
        at: DateTime<Utc>,
    ) -> ProvisioningStatus {
        let stamped = status == ProvisioningStatus::Provisioned;
        self.provisioned_at = stamped.then_some(at);
        self.provisioned_by = stamped.then_some(actor);
        std::mem::replace(&mut self.status, status)
    }

    /// Status and stamps.
    #[must_use]
    pub const fn progress(&self) -> GrantProgress {
        GrantProgress {
            status: self.status,
            provisioned_at: self.provisioned_at,
            provisioned_by: self.provisioned_by,
        }
    }
}

// ============================================================================
// Network / email
// ============================================================================

/// Network login and mailbox entitlements.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkEmailAccess {
    /// Domain/network login
    pub network_login: bool,
    /// Shared (generic) mailbox
    pub email_generic: bool,
    /// Personal mailbox
    pub email_personal: bool,
}

impl Entitlements for NetworkEmailAccess {
    fn any_requested(&self) -> bool {
        self.network_login || self.email_generic || self.email_personal
    }
}

// ============================================================================
// ERP, one record per module
// ============================================================================

/// ERP IT-administration module.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItAdminModule {
    /// ERP administrator
    pub it_admin_access: bool,
    /// IT department role
    pub it_department: bool,
}

impl Entitlements for ItAdminModule {
    fn any_requested(&self) -> bool {
        self.it_admin_access || self.it_department
    }
}

/// ERP human-resources module.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HrModule {
    /// Group 1: DHR
    pub group_1_dhr: bool,
    /// Group 2: HR manager
    pub group_2_hr_manager: bool,
    /// Group 3: executive
    pub group_3_executive: bool,
    /// Group 4: accommodation
    pub group_4_accommodation: bool,
    /// Group 5: public relations
    pub group_5_public_relations: bool,
    /// Group 6: hiring
    pub group_6_hiring: bool,
    /// Employee self-service
    pub ess_user: bool,
}

impl Entitlements for HrModule {
    fn any_requested(&self) -> bool {
        self.group_1_dhr
            || self.group_2_hr_manager
            || self.group_3_executive
            || self.group_4_accommodation
            || self.group_5_public_relations
            || self.group_6_hiring
            || self.ess_user
    }
}

/// ERP finance module.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinanceModule {
    /// Accounts payable
    pub accounts_payable: bool,
    /// Accounts receivable
    pub accounts_receivable: bool,
    /// Finance manager
    pub manager: bool,
    /// Deputy manager, finance
    pub dm_finance: bool,
}

impl Entitlements for FinanceModule {
    fn any_requested(&self) -> bool {
        self.accounts_payable || self.accounts_receivable || self.manager || self.dm_finance
    }
}

/// ERP procurement module.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcurementModule {
    /// Group 3: buyer
    pub buyer: bool,
    /// Group 4: coordinator
    pub coordinator: bool,
    /// Group 5: store
    pub store: bool,
    /// Group 6: receiver
    pub receiver: bool,
    /// Group 7: requestor
    pub requestor: bool,
}

impl Entitlements for ProcurementModule {
    fn any_requested(&self) -> bool {
        self.buyer || self.coordinator || self.store || self.receiver || self.requestor
    }
}

/// ERP entitlements composed from the per-module records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErpAccess {
    /// IT administration
    pub it_admin: ItAdminModule,
    /// Human resources
    pub hr: HrModule,
    /// Finance
    pub finance: FinanceModule,
    /// Procurement
    pub procurement: ProcurementModule,
}

impl Entitlements for ErpAccess {
    fn any_requested(&self) -> bool {
        self.it_admin.any_requested()
            || self.hr.any_requested()
            || self.finance.any_requested()
            || self.procurement.any_requested()
    }
}

// ============================================================================
// Time & attendance
// ============================================================================

/// Time-attendance system groups.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeAttendanceAccess {
    /// Group 1: IT admin
    pub it_admin: bool,
    /// Group 2: HR admin
    pub hr_admin: bool,
    /// Group 3: department coordinator
    pub department_coordinator: bool,
}

impl Entitlements for TimeAttendanceAccess {
    fn any_requested(&self) -> bool {
        self.it_admin || self.hr_admin || self.department_coordinator
    }
}

/// Network/email grant
pub type NetworkEmailGrant = Grant<NetworkEmailAccess>;
/// ERP grant
pub type ErpGrant = Grant<ErpAccess>;
/// Time-attendance grant
pub type TimeAttendanceGrant = Grant<TimeAttendanceAccess>;

/// The (independently optional) grants of one request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantSet {
    /// Network/email, if requested
    pub network_email: Option<NetworkEmailGrant>,
    /// ERP, if requested
    pub erp: Option<ErpGrant>,
    /// Time-attendance, if requested
    pub time_attendance: Option<TimeAttendanceGrant>,
}

impl GrantSet {
    /// Build grants from the raw flag bundles, dropping all-false ones.
    #[must_use]
    pub fn from_requested(
        network_email: Option<NetworkEmailAccess>,
        erp: Option<ErpAccess>,
        time_attendance: Option<TimeAttendanceAccess>,
    ) -> Self {
        Self {
            network_email: network_email.and_then(Grant::requested),
            erp: erp.and_then(Grant::requested),
            time_attendance: time_attendance.and_then(Grant::requested),
        }
    }

    /// No grant present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.network_email.is_none() && self.erp.is_none() && self.time_attendance.is_none()
    }

    /// Provisioning state of the `system` grant, if requested.
    #[must_use]
    pub fn progress(&self, system: GrantSystem) -> Option<GrantProgress> {
        match system {
            GrantSystem::NetworkEmail => self.network_email.as_ref().map(Grant::progress),
            GrantSystem::Erp => self.erp.as_ref().map(Grant::progress),
            GrantSystem::TimeAttendance => self.time_attendance.as_ref().map(Grant::progress),
        }
    }

    /// Move the `system` grant to `status`, returning its previous status.
    ///
    /// `None` (and nothing changed) when that grant was not requested.
    pub fn set_status(
        &mut self,
        system: GrantSystem,
        status: ProvisioningStatus,
        actor: PrincipalId,
        at: DateTime<Utc>,
    ) -> Option<ProvisioningStatus> {
        match system {
            GrantSystem::NetworkEmail => self
                .network_email
                .as_mut()
                .map(|g| g.set_status(status, actor, at)),
            GrantSystem::Erp => self.erp.as_mut().map(|g| g.set_status(status, actor, at)),
            GrantSystem::TimeAttendance => self
                .time_attendance
                .as_mut()
                .map(|g| g.set_status(status, actor, at)),
        }
    }
}
