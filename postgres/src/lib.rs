//! `PostgreSQL` storage for access requests.
//!
//! [`PostgresAccessRequestStore`] implements
//! [`AccessRequestStore`] on a sqlx connection pool:
//!
//! - Per-year request numbers from an atomic counter upsert, backed by a unique
//!   constraint on `request_number`
//! - Root, grants, handover items and the `created` entry written in one transaction
//! - Transitions and asset links run their plan on a row locked with `FOR UPDATE`
//!   and persist the row together with its ledger effects
//! - Grant provisioning updates lock the request row the same way
//! - History and approval tables are append-only (enforced by a trigger)
//!
//! # Example
//!
//! ```ignore
//! use access_request_postgres::PostgresAccessRequestStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresAccessRequestStore::new("postgres://localhost/access_requests").await?;
//!     store.run_migrations().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod rows;

use access_request_core::aggregate::{AccessRequest, NewAccessRequest, RequestSummary};
use access_request_core::assets::HandoverItem;
use access_request_core::audit::{ApprovalRecord, HistoryEntry, LedgerEffect};
use access_request_core::authorization::DataScope;
use access_request_core::grants::{Grant, GrantSet, GrantSystem};
use access_request_core::numbering::RequestNumber;
use access_request_core::query::{ListQuery, Page};
use access_request_core::store::{
    AccessRequestStore, LedgerEffects, LinkPlan, StoreFuture, TransitionPlan,
};
use access_request_core::types::{AssetId, HandoverItemId, RequestId};
use access_request_core::{AccessError, Result};
use rows::storage;
use serde::Serialize;
use sqlx::postgres::{PgConnection, PgPool};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

/// Migrations embedded from `postgres/migrations`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// `PostgreSQL`-backed [`AccessRequestStore`].
#[derive(Clone, Debug)]
pub struct PostgresAccessRequestStore {
    pool: PgPool,
}

impl PostgresAccessRequestStore {
    /// Connect with default pool settings.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::StorageFailure`] if the connection fails.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await.map_err(storage)?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::StorageFailure`] if a migration fails.
    pub async fn run_migrations(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| AccessError::StorageFailure(format!("migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    async fn next_sequence(&self, year: i32) -> Result<u32> {
        let prefix = format!("{}%", RequestNumber::year_prefix(year));
        let (last_seq,): (i32,) = sqlx::query_as(
            r"
            INSERT INTO request_number_counters (year, last_seq)
            VALUES (
                $1,
                COALESCE((
                    SELECT MAX(substring(request_number FROM '[0-9]+$')::int)
                    FROM access_requests
                    WHERE request_number LIKE $2
                ), 0) + 1
            )
            ON CONFLICT (year) DO UPDATE
            SET last_seq = GREATEST(request_number_counters.last_seq, EXCLUDED.last_seq - 1) + 1
            RETURNING last_seq
            ",
        )
        .bind(year)
        .bind(prefix)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;

        u32::try_from(last_seq)
            .map_err(|_| AccessError::StorageFailure(format!("invalid sequence {last_seq}")))
    }

    async fn insert(&self, new: NewAccessRequest) -> Result<AccessRequest> {
        let id = RequestId::new();
        let item_ids: Vec<HandoverItemId> = new.hardware.iter().map(|_| HandoverItemId::new()).collect();
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let inserted = sqlx::query(
            r"
            INSERT INTO access_requests (
                id, request_number, employee_first_name, employee_last_name, employee_id,
                directory_id, department, department_head, email, date_of_joining,
                status, priority, request_type, notes, requested_by, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'pending', $11, $12, $13, $14, $15, $15)
            ",
        )
        .bind(*id.as_uuid())
        .bind(new.request_number.as_str())
        .bind(&new.employee.first_name)
        .bind(&new.employee.last_name)
        .bind(&new.employee.employee_id)
        .bind(&new.employee.directory_id)
        .bind(&new.employee.department)
        .bind(&new.employee.department_head)
        .bind(&new.employee.email)
        .bind(new.employee.date_of_joining)
        .bind(new.priority.as_str())
        .bind(new.request_type.as_str())
        .bind(&new.notes)
        .bind(*new.requested_by.as_uuid())
        .bind(new.created_at)
        .execute(&mut *tx)
        .await
        .map_err(storage);

        if let Err(err @ AccessError::NumberingConflict(_)) = &inserted {
            tracing::warn!(request_number = %new.request_number, error = %err, "Request number already taken");
            metrics::counter!("access_request.store.numbering_conflicts").increment(1);
        }
        inserted?;

        insert_grants(&mut tx, id, &new.grants).await?;
        for (position, (item_id, asset_type)) in item_ids.iter().zip(&new.hardware).enumerate() {
            sqlx::query(
                r"
                INSERT INTO handover_items (id, request_id, position, asset_type, status)
                VALUES ($1, $2, $3, $4, 'pending')
                ",
            )
            .bind(*item_id.as_uuid())
            .bind(*id.as_uuid())
            .bind(i32::try_from(position).unwrap_or(i32::MAX))
            .bind(asset_type)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        }

        let effects: LedgerEffects =
            std::iter::once(LedgerEffect::AppendHistory(new.initial_entry.clone())).collect();
        append_effects(&mut tx, id, effects).await?;

        tx.commit().await.map_err(storage)?;

        tracing::debug!(request_id = %id, request_number = %new.request_number, "Access request inserted");
        Ok(new.into_request(id, &item_ids))
    }

    async fn find(&self, id: RequestId) -> Result<Option<AccessRequest>> {
        let mut conn = self.pool.acquire().await.map_err(storage)?;
        load_request(&mut conn, id, false).await
    }

    async fn list(&self, query: ListQuery) -> Result<Page<RequestSummary>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM access_requests WHERE TRUE");
        push_conditions(&mut count, &query);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM access_requests WHERE TRUE",
            rows::ROOT_COLUMNS
        ));
        push_conditions(&mut select, &query);
        select
            .push(" ORDER BY created_at DESC, length(request_number) DESC, request_number DESC LIMIT ")
            .push_bind(i64::from(query.page.page_size))
            .push(" OFFSET ")
            .push_bind(i64::try_from(query.page.offset()).unwrap_or(i64::MAX));

        let found = select.build().fetch_all(&self.pool).await.map_err(storage)?;
        let items = found
            .iter()
            .map(|row| rows::request_root(row).map(|request| request.summary()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Page::new(items, u64::try_from(total).unwrap_or(0), query.page))
    }

    async fn transition(&self, id: RequestId, plan: TransitionPlan) -> Result<AccessRequest> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        let mut request = load_request(&mut tx, id, true)
            .await?
            .ok_or_else(|| AccessError::not_found("access_request", id))?;

        let effects = plan(&mut request)?;

        sqlx::query(
            r"
            UPDATE access_requests
            SET status = $2,
                approved_by = $3, approval_date = $4,
                rejected_by = $5, rejection_date = $6, rejection_reason = $7,
                assigned_to = $8, assigned_at = $9,
                completed_by = $10, completed_at = $11,
                cancelled_at = $12,
                updated_at = $13
            WHERE id = $1
            ",
        )
        .bind(*id.as_uuid())
        .bind(request.status.as_str())
        .bind(request.approved_by.map(|p| *p.as_uuid()))
        .bind(request.approval_date)
        .bind(request.rejected_by.map(|p| *p.as_uuid()))
        .bind(request.rejection_date)
        .bind(&request.rejection_reason)
        .bind(request.assigned_to.map(|p| *p.as_uuid()))
        .bind(request.assigned_at)
        .bind(request.completed_by.map(|p| *p.as_uuid()))
        .bind(request.completed_at)
        .bind(request.cancelled_at)
        .bind(request.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        append_effects(&mut tx, id, effects).await?;
        tx.commit().await.map_err(storage)?;
        Ok(request)
    }

    async fn grant_update(&self, id: RequestId, system: GrantSystem, plan: TransitionPlan) -> Result<AccessRequest> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        let mut request = load_request(&mut tx, id, true)
            .await?
            .ok_or_else(|| AccessError::not_found("access_request", id))?;

        let effects = plan(&mut request)?;
        let progress = request
            .grants
            .progress(system)
            .ok_or_else(|| AccessError::not_found("grant", system))?;

        sqlx::query(&format!(
            "UPDATE {} SET status = $2, provisioned_at = $3, provisioned_by = $4 WHERE request_id = $1",
            grant_table(system)
        ))
        .bind(*id.as_uuid())
        .bind(progress.status.as_str())
        .bind(progress.provisioned_at)
        .bind(progress.provisioned_by.map(|p| *p.as_uuid()))
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        sqlx::query("UPDATE access_requests SET updated_at = $2 WHERE id = $1")
            .bind(*id.as_uuid())
            .bind(request.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        append_effects(&mut tx, id, effects).await?;
        tx.commit().await.map_err(storage)?;
        Ok(request)
    }

    async fn link(
        &self,
        request_id: RequestId,
        item_id: HandoverItemId,
        asset_id: AssetId,
        plan: LinkPlan,
    ) -> Result<HandoverItem> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        // serializes with transitions on the same request
        sqlx::query("SELECT id FROM access_requests WHERE id = $1 FOR UPDATE")
            .bind(*request_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage)?
            .ok_or_else(|| AccessError::not_found("access_request", request_id))?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM handover_items WHERE id = $1 AND request_id = $2 FOR UPDATE",
            rows::ITEM_COLUMNS
        ))
        .bind(*item_id.as_uuid())
        .bind(*request_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage)?
        .ok_or_else(|| AccessError::not_found("handover_item", item_id))?;
        let mut item = rows::handover_item(&row)?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM assets WHERE id = $1 FOR SHARE",
            rows::ASSET_COLUMNS
        ))
        .bind(*asset_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage)?
        .ok_or_else(|| AccessError::not_found("asset", asset_id))?;
        let asset = rows::asset(&row)?;

        let effects = plan(&mut item, &asset)?;

        sqlx::query(
            r"
            UPDATE handover_items
            SET linked_asset_id = $2, serial_number = $3, condition = $4, status = $5, linked_at = $6
            WHERE id = $1
            ",
        )
        .bind(*item_id.as_uuid())
        .bind(item.linked_asset_id.map(|a| *a.as_uuid()))
        .bind(&item.serial_number)
        .bind(&item.condition)
        .bind(item.status.as_str())
        .bind(item.linked_at)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        append_effects(&mut tx, request_id, effects).await?;
        tx.commit().await.map_err(storage)?;
        Ok(item)
    }

    async fn history_entries(&self, id: RequestId) -> Result<Vec<HistoryEntry>> {
        let found = sqlx::query(&format!(
            "SELECT {} FROM history_entries WHERE request_id = $1 ORDER BY id",
            rows::HISTORY_COLUMNS
        ))
        .bind(*id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        found.iter().map(rows::history_entry).collect()
    }

    async fn approval_records(&self, id: RequestId) -> Result<Vec<ApprovalRecord>> {
        let found = sqlx::query(&format!(
            "SELECT {} FROM approval_records WHERE request_id = $1 ORDER BY seq",
            rows::APPROVAL_COLUMNS
        ))
        .bind(*id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        found.iter().map(rows::approval_record).collect()
    }

    async fn asset_types(&self) -> Result<Vec<String>> {
        sqlx::query_scalar("SELECT label FROM asset_types ORDER BY label")
            .fetch_all(&self.pool)
            .await
            .map_err(storage)
    }
}

/// Load a full aggregate, optionally locking the root row.
async fn load_request(
    conn: &mut PgConnection,
    id: RequestId,
    for_update: bool,
) -> Result<Option<AccessRequest>> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let Some(row) = sqlx::query(&format!(
        "SELECT {} FROM access_requests WHERE id = $1{lock}",
        rows::ROOT_COLUMNS
    ))
    .bind(*id.as_uuid())
    .fetch_optional(&mut *conn)
    .await
    .map_err(storage)?
    else {
        return Ok(None);
    };
    let mut request = rows::request_root(&row)?;

    request.grants = GrantSet {
        network_email: load_grant(conn, GrantSystem::NetworkEmail, id).await?,
        erp: load_grant(conn, GrantSystem::Erp, id).await?,
        time_attendance: load_grant(conn, GrantSystem::TimeAttendance, id).await?,
    };

    let items = sqlx::query(&format!(
        "SELECT {} FROM handover_items WHERE request_id = $1 ORDER BY position",
        rows::ITEM_COLUMNS
    ))
    .bind(*id.as_uuid())
    .fetch_all(&mut *conn)
    .await
    .map_err(storage)?;
    request.handover_items = items.iter().map(rows::handover_item).collect::<Result<_>>()?;

    Ok(Some(request))
}

/// Table holding the `system` grants.
const fn grant_table(system: GrantSystem) -> &'static str {
    match system {
        GrantSystem::NetworkEmail => "network_email_grants",
        GrantSystem::Erp => "erp_grants",
        GrantSystem::TimeAttendance => "time_attendance_grants",
    }
}

async fn load_grant<E>(conn: &mut PgConnection, system: GrantSystem, id: RequestId) -> Result<Option<Grant<E>>>
where
    E: serde::de::DeserializeOwned,
{
    sqlx::query(&format!(
        "SELECT {} FROM {} WHERE request_id = $1",
        rows::GRANT_COLUMNS,
        grant_table(system)
    ))
        .bind(*id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage)?
        .as_ref()
        .map(rows::grant)
        .transpose()
}

async fn insert_grants(conn: &mut PgConnection, id: RequestId, grants: &GrantSet) -> Result<()> {
    if let Some(grant) = &grants.network_email {
        insert_grant(conn, GrantSystem::NetworkEmail, id, grant).await?;
    }
    if let Some(grant) = &grants.erp {
        insert_grant(conn, GrantSystem::Erp, id, grant).await?;
    }
    if let Some(grant) = &grants.time_attendance {
        insert_grant(conn, GrantSystem::TimeAttendance, id, grant).await?;
    }
    Ok(())
}

async fn insert_grant<E>(conn: &mut PgConnection, system: GrantSystem, id: RequestId, grant: &Grant<E>) -> Result<()>
where
    E: Serialize + Sync,
{
    sqlx::query(&format!(
        "INSERT INTO {} (request_id, entitlements, status) VALUES ($1, $2, $3)",
        grant_table(system)
    ))
    .bind(*id.as_uuid())
    .bind(Json(&grant.entitlements))
    .bind(grant.status.as_str())
    .execute(&mut *conn)
    .await
    .map_err(storage)?;
    Ok(())
}

/// Write ledger effects in the caller's transaction.
async fn append_effects(conn: &mut PgConnection, id: RequestId, effects: LedgerEffects) -> Result<()> {
    for effect in effects {
        match effect {
            LedgerEffect::AppendHistory(entry) => {
                sqlx::query(
                    r"
                    INSERT INTO history_entries
                        (request_id, action, description, performed_by, performed_at, metadata)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ",
                )
                .bind(*id.as_uuid())
                .bind(entry.action.as_str())
                .bind(&entry.description)
                .bind(*entry.performed_by.as_uuid())
                .bind(entry.performed_at)
                .bind(Json(&entry.metadata))
                .execute(&mut *conn)
                .await
                .map_err(storage)?;
            }
            LedgerEffect::RecordApproval(record) => {
                sqlx::query(
                    r"
                    INSERT INTO approval_records
                        (id, request_id, approver_id, approver_role, decision, decision_date, comments)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    ",
                )
                .bind(Uuid::new_v4())
                .bind(*id.as_uuid())
                .bind(*record.approver_id.as_uuid())
                .bind(record.approver_role.as_str())
                .bind(record.decision.as_str())
                .bind(record.decision_date)
                .bind(&record.comments)
                .execute(&mut *conn)
                .await
                .map_err(storage)?;
            }
        }
    }
    Ok(())
}

/// Scope and filters, ANDed onto a `WHERE TRUE` prefix.
fn push_conditions(builder: &mut QueryBuilder<'_, Postgres>, query: &ListQuery) {
    match &query.scope {
        DataScope::Unrestricted => {}
        DataScope::Department(department) => {
            builder.push(" AND department = ").push_bind(department.clone());
        }
        DataScope::Ownership(principal) => {
            let id = *principal.as_uuid();
            builder
                .push(" AND (requested_by = ")
                .push_bind(id)
                .push(" OR assigned_to = ")
                .push_bind(id)
                .push(")");
        }
    }

    let filters = &query.filters;
    if let Some(status) = filters.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(priority) = filters.priority {
        builder.push(" AND priority = ").push_bind(priority.as_str());
    }
    if let Some(department) = &filters.department {
        builder.push(" AND department = ").push_bind(department.clone());
    }
    if let Some(term) = filters.search_term() {
        let pattern = rows::like_pattern(&term);
        builder.push(" AND (");
        for (i, column) in ["employee_first_name", "employee_last_name", "request_number", "employee_id"]
            .into_iter()
            .enumerate()
        {
            if i > 0 {
                builder.push(" OR ");
            }
            builder.push(column).push(" ILIKE ").push_bind(pattern.clone());
        }
        builder.push(")");
    }
}

impl AccessRequestStore for PostgresAccessRequestStore {
    fn next_request_sequence(&self, year: i32) -> StoreFuture<'_, u32> {
        Box::pin(self.next_sequence(year))
    }

    fn insert_request(&self, request: NewAccessRequest) -> StoreFuture<'_, AccessRequest> {
        Box::pin(self.insert(request))
    }

    fn find_request(&self, id: RequestId) -> StoreFuture<'_, Option<AccessRequest>> {
        Box::pin(self.find(id))
    }

    fn list_requests(&self, query: ListQuery) -> StoreFuture<'_, Page<RequestSummary>> {
        Box::pin(self.list(query))
    }

    fn apply_transition(&self, id: RequestId, plan: TransitionPlan) -> StoreFuture<'_, AccessRequest> {
        Box::pin(self.transition(id, plan))
    }

    fn update_grant(
        &self,
        id: RequestId,
        system: GrantSystem,
        plan: TransitionPlan,
    ) -> StoreFuture<'_, AccessRequest> {
        Box::pin(self.grant_update(id, system, plan))
    }

    fn link_asset(
        &self,
        request_id: RequestId,
        item_id: HandoverItemId,
        asset_id: AssetId,
        plan: LinkPlan,
    ) -> StoreFuture<'_, HandoverItem> {
        Box::pin(self.link(request_id, item_id, asset_id, plan))
    }

    fn history(&self, id: RequestId) -> StoreFuture<'_, Vec<HistoryEntry>> {
        Box::pin(self.history_entries(id))
    }

    fn approvals(&self, id: RequestId) -> StoreFuture<'_, Vec<ApprovalRecord>> {
        Box::pin(self.approval_records(id))
    }

    fn known_asset_types(&self) -> StoreFuture<'_, Vec<String>> {
        Box::pin(self.asset_types())
    }
}
