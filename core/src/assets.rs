//! Hardware handover items and asset linking.
//!
//! Linking copies the serial number and condition of an available inventory asset onto
//! a handover item and records `asset_linked`. It deliberately changes neither the
//! asset's inventory status nor the item's handover status; both belong to the
//! inventory team's confirmation step.

use crate::audit::{HistoryAction, LedgerEffect, NewHistoryEntry};
use crate::environment::RequestEnvironment;
use crate::error::{AccessError, Result};
use crate::reducer::Reducer;
use crate::types::{AssetId, HandoverItemId, Principal, RequestId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};
use std::fmt;

/// Inventory status of an asset, as reported by the inventory system.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AssetStatus {
    /// Free to link
    Available,
    /// Lent out
    CheckedOut,
    /// Permanently assigned
    Assigned,
    /// Under repair
    Maintenance,
    /// Out of service
    Retired,
    /// Any status this service does not know about
    Other(String),
}

impl AssetStatus {
    /// Storage representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Available => "available",
            Self::CheckedOut => "checked_out",
            Self::Assigned => "assigned",
            Self::Maintenance => "maintenance",
            Self::Retired => "retired",
            Self::Other(status) => status,
        }
    }

    /// Only available assets can be linked.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

impl From<&str> for AssetStatus {
    fn from(s: &str) -> Self {
        match s {
            "available" => Self::Available,
            "checked_out" => Self::CheckedOut,
            "assigned" => Self::Assigned,
            "maintenance" => Self::Maintenance,
            "retired" => Self::Retired,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for AssetStatus {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<AssetStatus> for String {
    fn from(status: AssetStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inventory asset (read-only from this service).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Inventory identity
    pub id: AssetId,
    /// Display name
    pub name: String,
    /// Asset-type label
    pub asset_type: String,
    /// Serial number
    pub serial_number: Option<String>,
    /// Physical condition
    pub condition: Option<String>,
    /// Inventory status
    pub status: AssetStatus,
}

/// Handover progress of a line item.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoverStatus {
    /// Not yet handed over
    #[default]
    Pending,
    /// Handed over to the employee
    HandedOver,
}

impl HandoverStatus {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::HandedOver => "handed_over",
        }
    }

    /// Parse a stored status.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "handed_over" => Some(Self::HandedOver),
            _ => None,
        }
    }
}

/// One requested piece of hardware.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoverItem {
    /// Storage identity
    pub id: HandoverItemId,
    /// Owning request
    pub request_id: RequestId,
    /// Requested asset-type label
    pub asset_type: String,
    /// Linked inventory asset
    pub linked_asset_id: Option<AssetId>,
    /// Copied from the linked asset
    pub serial_number: Option<String>,
    /// Copied from the linked asset
    pub condition: Option<String>,
    /// Handover progress
    pub status: HandoverStatus,
    /// When the current asset was linked
    pub linked_at: Option<DateTime<Utc>>,
}

impl HandoverItem {
    /// A freshly requested, unlinked item.
    #[must_use]
    pub const fn pending(id: HandoverItemId, request_id: RequestId, asset_type: String) -> Self {
        Self {
            id,
            request_id,
            asset_type,
            linked_asset_id: None,
            serial_number: None,
            condition: None,
            status: HandoverStatus::Pending,
            linked_at: None,
        }
    }
}

/// Bind `asset` to the handover item, on behalf of `actor`.
#[derive(Clone, Debug)]
pub struct LinkAsset {
    /// The asset, as read inside the linking transaction
    pub asset: Asset,
    /// Who links it
    pub actor: Principal,
}

/// Reducer for [`LinkAsset`] over a [`HandoverItem`].
#[derive(Clone, Copy, Debug, Default)]
pub struct AssetLinkReducer;

impl Reducer for AssetLinkReducer {
    type State = HandoverItem;
    type Action = LinkAsset;
    type Environment = RequestEnvironment;
    type Effect = LedgerEffect;
    type Error = AccessError;

    fn reduce(
        &self,
        item: &mut HandoverItem,
        action: LinkAsset,
        env: &RequestEnvironment,
    ) -> Result<SmallVec<[LedgerEffect; 4]>> {
        let LinkAsset { asset, actor } = action;

        if item.status == HandoverStatus::HandedOver {
            return Err(AccessError::invalid_field(
                "handover_item_id",
                "item has already been handed over",
            ));
        }
        if !asset.status.is_available() {
            return Err(AccessError::AssetUnavailable {
                asset_id: asset.id,
                status: asset.status.to_string(),
            });
        }

        let now = env.clock.now();
        let previous = item.linked_asset_id.replace(asset.id);
        item.serial_number.clone_from(&asset.serial_number);
        item.condition.clone_from(&asset.condition);
        item.linked_at = Some(now);

        let entry = NewHistoryEntry::new(
            HistoryAction::AssetLinked,
            format!("Asset {} linked to {} handover item", asset.name, item.asset_type),
            actor.id,
            now,
        )
        .with_metadata("handover_item_id", item.id.to_string())
        .with_metadata("asset_id", asset.id.to_string())
        .with_optional_metadata("serial_number", asset.serial_number)
        .with_optional_metadata("condition", asset.condition)
        .with_optional_metadata("previous_asset_id", previous.map(|id| id.to_string()));

        Ok(smallvec![LedgerEffect::AppendHistory(entry)])
    }
}
