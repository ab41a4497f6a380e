//! In-memory access request store for fast, deterministic testing.
//!
//! Behaves like the Postgres store where tests can observe it: numbers are
//! unique, plans run under a single write lock, a failing plan or write leaves
//! nothing behind, and the ledger is append-only.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only follows a panicking test

use access_request_core::aggregate::{AccessRequest, NewAccessRequest, RequestSummary};
use access_request_core::assets::{Asset, HandoverItem};
use access_request_core::audit::{ApprovalRecord, HistoryEntry, LedgerEffect};
use access_request_core::grants::GrantSystem;
use access_request_core::numbering::RequestNumber;
use access_request_core::query::{ListQuery, Page};
use access_request_core::store::{AccessRequestStore, LinkPlan, StoreFuture, TransitionPlan};
use access_request_core::types::{AssetId, HandoverItemId, RequestId};
use access_request_core::{AccessError, Result};
use std::collections::HashMap;
use std::future::ready;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Asset types seeded by [`InMemoryAccessRequestStore::new`].
pub const DEFAULT_ASSET_TYPES: &[&str] = &[
    "Laptop",
    "Desktop",
    "Mobile (Camera)",
    "Mobile (Non-Camera)",
    "Walkie Talkie",
    "Duty SIM Card",
];

#[derive(Debug, Default)]
struct State {
    requests: HashMap<RequestId, AccessRequest>,
    counters: HashMap<i32, u32>,
    history: Vec<HistoryEntry>,
    approvals: Vec<ApprovalRecord>,
    assets: HashMap<AssetId, Asset>,
    asset_types: Vec<String>,
    numbering_conflicts: u32,
    fail_writes: bool,
}

impl State {
    fn append(&mut self, request_id: RequestId, effects: impl IntoIterator<Item = LedgerEffect>) {
        for effect in effects {
            match effect {
                LedgerEffect::AppendHistory(entry) => {
                    let id = i64::try_from(self.history.len()).unwrap_or(i64::MAX) + 1;
                    self.history.push(entry.into_entry(id, request_id));
                }
                LedgerEffect::RecordApproval(record) => {
                    self.approvals
                        .push(record.into_record(Uuid::new_v4(), request_id));
                }
            }
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes {
            Err(AccessError::StorageFailure("simulated write failure".into()))
        } else {
            Ok(())
        }
    }
}

/// `HashMap`-backed [`AccessRequestStore`].
///
/// # Example
///
/// ```
/// use access_request_testing::InMemoryAccessRequestStore;
/// use access_request_core::store::AccessRequestStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryAccessRequestStore::new();
/// assert_eq!(store.next_request_sequence(2025).await?, 1);
/// assert_eq!(store.next_request_sequence(2025).await?, 2);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryAccessRequestStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryAccessRequestStore {
    /// Empty store with the default asset types.
    #[must_use]
    pub fn new() -> Self {
        let state = State {
            asset_types: DEFAULT_ASSET_TYPES.iter().map(ToString::to_string).collect(),
            ..State::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Add inventory assets.
    #[must_use]
    pub fn with_assets(self, assets: impl IntoIterator<Item = Asset>) -> Self {
        for asset in assets {
            self.add_asset(asset);
        }
        self
    }

    /// Add or replace one inventory asset.
    pub fn add_asset(&self, asset: Asset) {
        self.state.write().unwrap().assets.insert(asset.id, asset);
    }

    /// Make the next `count` inserts fail as if another writer took the number.
    pub fn inject_numbering_conflicts(&self, count: u32) {
        self.state.write().unwrap().numbering_conflicts = count;
    }

    /// Make every write fail with `StorageFailure` until switched off.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.write().unwrap().fail_writes = fail;
    }

    /// Number of stored requests.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.state.read().unwrap().requests.len()
    }

    /// Number of history entries across all requests.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.state.read().unwrap().history.len()
    }

    /// Number of approval records across all requests.
    #[must_use]
    pub fn approvals_len(&self) -> usize {
        self.state.read().unwrap().approvals.len()
    }

    /// Current inventory record of an asset.
    #[must_use]
    pub fn asset(&self, id: AssetId) -> Option<Asset> {
        self.state.read().unwrap().assets.get(&id).cloned()
    }

    fn insert(&self, new: NewAccessRequest) -> Result<AccessRequest> {
        let mut state = self.state.write().unwrap();
        state.check_writable()?;
        if state.numbering_conflicts > 0 {
            state.numbering_conflicts -= 1;
            return Err(AccessError::NumberingConflict(new.request_number.to_string()));
        }
        if state
            .requests
            .values()
            .any(|r| r.request_number == new.request_number)
        {
            return Err(AccessError::NumberingConflict(new.request_number.to_string()));
        }

        let id = RequestId::new();
        let item_ids: Vec<_> = new.hardware.iter().map(|_| HandoverItemId::new()).collect();
        let initial_entry = new.initial_entry.clone();
        let request = new.into_request(id, &item_ids);

        state.append(id, [LedgerEffect::AppendHistory(initial_entry)]);
        state.requests.insert(id, request.clone());
        Ok(request)
    }

    fn next_sequence(&self, year: i32) -> u32 {
        let mut state = self.state.write().unwrap();
        let issued = state
            .requests
            .values()
            .filter_map(|r| RequestNumber::parse(r.request_number.as_str()))
            .filter(|(y, _)| *y == year)
            .map(|(_, seq)| seq)
            .max()
            .unwrap_or(0);
        let counter = state.counters.entry(year).or_insert(0);
        *counter = (*counter).max(issued) + 1;
        *counter
    }

    fn list(&self, query: &ListQuery) -> Page<RequestSummary> {
        let state = self.state.read().unwrap();
        let mut matching: Vec<RequestSummary> = state
            .requests
            .values()
            .map(AccessRequest::summary)
            .filter(|s| query.scope.admits(s) && query.filters.matches(s))
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.request_number.cmp(&a.request_number))
        });

        let total = matching.len() as u64;
        let offset = usize::try_from(query.page.offset()).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(query.page.page_size as usize)
            .collect();
        Page::new(items, total, query.page)
    }

    fn transition(&self, id: RequestId, plan: TransitionPlan) -> Result<AccessRequest> {
        let mut state = self.state.write().unwrap();
        let mut request = state
            .requests
            .get(&id)
            .cloned()
            .ok_or_else(|| AccessError::not_found("access_request", id))?;
        let effects = plan(&mut request)?;
        state.check_writable()?;

        state.append(id, effects);
        state.requests.insert(id, request.clone());
        Ok(request)
    }

    fn link(
        &self,
        request_id: RequestId,
        item_id: HandoverItemId,
        asset_id: AssetId,
        plan: LinkPlan,
    ) -> Result<HandoverItem> {
        let mut state = self.state.write().unwrap();
        let request = state
            .requests
            .get(&request_id)
            .ok_or_else(|| AccessError::not_found("access_request", request_id))?;
        let mut item = request
            .handover_item(item_id)
            .cloned()
            .ok_or_else(|| AccessError::not_found("handover_item", item_id))?;
        let asset = state
            .assets
            .get(&asset_id)
            .cloned()
            .ok_or_else(|| AccessError::not_found("asset", asset_id))?;

        let effects = plan(&mut item, &asset)?;
        state.check_writable()?;

        state.append(request_id, effects);
        if let Some(stored) = state
            .requests
            .get_mut(&request_id)
            .and_then(|r| r.handover_items.iter_mut().find(|i| i.id == item_id))
        {
            *stored = item.clone();
        }
        Ok(item)
    }
}

impl Default for InMemoryAccessRequestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessRequestStore for InMemoryAccessRequestStore {
    fn next_request_sequence(&self, year: i32) -> StoreFuture<'_, u32> {
        Box::pin(ready(Ok(self.next_sequence(year))))
    }

    fn insert_request(&self, request: NewAccessRequest) -> StoreFuture<'_, AccessRequest> {
        Box::pin(ready(self.insert(request)))
    }

    fn find_request(&self, id: RequestId) -> StoreFuture<'_, Option<AccessRequest>> {
        let found = self.state.read().unwrap().requests.get(&id).cloned();
        Box::pin(ready(Ok(found)))
    }

    fn list_requests(&self, query: ListQuery) -> StoreFuture<'_, Page<RequestSummary>> {
        Box::pin(ready(Ok(self.list(&query))))
    }

    fn apply_transition(&self, id: RequestId, plan: TransitionPlan) -> StoreFuture<'_, AccessRequest> {
        Box::pin(ready(self.transition(id, plan)))
    }

    // The whole row is replaced, so the grant and `updated_at` go with it.
    fn update_grant(
        &self,
        id: RequestId,
        _system: GrantSystem,
        plan: TransitionPlan,
    ) -> StoreFuture<'_, AccessRequest> {
        Box::pin(ready(self.transition(id, plan)))
    }

    fn link_asset(
        &self,
        request_id: RequestId,
        item_id: HandoverItemId,
        asset_id: AssetId,
        plan: LinkPlan,
    ) -> StoreFuture<'_, HandoverItem> {
        Box::pin(ready(self.link(request_id, item_id, asset_id, plan)))
    }

    fn history(&self, id: RequestId) -> StoreFuture<'_, Vec<HistoryEntry>> {
        let entries = self
            .state
            .read()
            .unwrap()
            .history
            .iter()
            .filter(|e| e.request_id == id)
            .cloned()
            .collect();
        Box::pin(ready(Ok(entries)))
    }

    fn approvals(&self, id: RequestId) -> StoreFuture<'_, Vec<ApprovalRecord>> {
        let records = self
            .state
            .read()
            .unwrap()
            .approvals
            .iter()
            .filter(|r| r.request_id == id)
            .cloned()
            .collect();
        Box::pin(ready(Ok(records)))
    }

    fn known_asset_types(&self) -> StoreFuture<'_, Vec<String>> {
        let types = self.state.read().unwrap().asset_types.clone();
        Box::pin(ready(Ok(types)))
    }
}
