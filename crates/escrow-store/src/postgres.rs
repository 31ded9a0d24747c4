//! The Postgres-backed `Store` implementation.
//!
//! Composite fields (`requestedFunds`, `transactionHistory`,
//! `withdrawnForSeller/Buyer`, `metadata`) are stored as `JSONB` columns
//! rather than normalized out into their own tables — they're read and
//! written as whole values everywhere in this system and never queried
//! into individually, so normalizing them would only add joins nobody
//! needs. Everything else (ids, timestamps, state enums, the lease
//! column) is a real typed column so indexes and `WHERE` clauses work
//! directly against it.

use crate::cursor::{DiffCursor, DiffMode, DiffPage};
use crate::error::{Result, StoreError};
use crate::store::{ListFilter, ReconcilerCursor, ReconcilerCursorKind, Store};
use async_trait::async_trait;
use escrow_core::model::{HotWallet, Network, Payment, PaymentSource, Purchase, RegistryRequest, WalletType};
use escrow_core::time::TimestampMs;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn json_col<T: serde::Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).expect("domain types always serialize")
}

fn from_json_col<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))
}

fn payment_from_row(row: &sqlx::postgres::PgRow) -> Result<Payment> {
    Ok(Payment {
        id: row.try_get("id")?,
        blockchain_identifier: row.try_get("blockchain_identifier")?,
        agent_identifier: row.try_get("agent_identifier")?,
        input_hash: row.try_get("input_hash")?,
        pay_by_time: row.try_get("pay_by_time")?,
        submit_result_time: row.try_get("submit_result_time")?,
        unlock_time: row.try_get("unlock_time")?,
        external_dispute_unlock_time: row.try_get("external_dispute_unlock_time")?,
        requested_funds: from_json_col(row.try_get("requested_funds")?)?,
        on_chain_state: row
            .try_get::<Option<String>, _>("on_chain_state")?
            .map(|s| from_json_col(serde_json::Value::String(s)))
            .transpose()?,
        next_action: from_json_col(serde_json::Value::String(row.try_get("next_action")?))?,
        next_action_error_type: row
            .try_get::<Option<String>, _>("next_action_error_type")?
            .map(|s| from_json_col(serde_json::Value::String(s)))
            .transpose()?,
        next_action_error_note: row.try_get("next_action_error_note")?,
        current_transaction_id: row.try_get("current_transaction_id")?,
        transaction_history: from_json_col(row.try_get("transaction_history")?)?,
        withdrawn_for_seller: from_json_col(row.try_get("withdrawn_for_seller")?)?,
        withdrawn_for_buyer: from_json_col(row.try_get("withdrawn_for_buyer")?)?,
        total_seller_cardano_fees: from_json_col(row.try_get::<String, _>("total_seller_cardano_fees")?.into())?,
        total_buyer_cardano_fees: from_json_col(row.try_get::<String, _>("total_buyer_cardano_fees")?.into())?,
        result_hash: row.try_get("result_hash")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        next_action_last_changed_at: row.try_get("next_action_last_changed_at")?,
        on_chain_state_or_result_last_changed_at: row.try_get("on_chain_state_or_result_last_changed_at")?,
        next_action_or_on_chain_state_or_result_last_changed_at: row
            .try_get("next_action_or_on_chain_state_or_result_last_changed_at")?,
        requested_by_id: row.try_get("requested_by_id")?,
        metadata: row.try_get("metadata")?,
        payment_source_id: row.try_get("payment_source_id")?,
        seller_wallet_id: row.try_get("seller_wallet_id")?,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn get_payment_source(&self, network: Network, smart_contract_address: &str) -> Result<Option<PaymentSource>> {
        let row = sqlx::query(
            r#"SELECT id, network, smart_contract_address, policy_id, fee_rate_permille,
                      deleted_at, config, created_at, updated_at
               FROM payment_sources
               WHERE network = $1 AND smart_contract_address = $2 AND deleted_at IS NULL"#,
        )
        .bind(json_col(&network).as_str().unwrap_or_default())
        .bind(smart_contract_address)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| payment_source_from_row(&r)).transpose()
    }

    async fn get_payment_source_by_policy(&self, network: Network, policy_id: &str) -> Result<Option<PaymentSource>> {
        let row = sqlx::query(
            r#"SELECT id, network, smart_contract_address, policy_id, fee_rate_permille,
                      deleted_at, config, created_at, updated_at
               FROM payment_sources
               WHERE network = $1 AND policy_id = $2 AND deleted_at IS NULL"#,
        )
        .bind(json_col(&network).as_str().unwrap_or_default())
        .bind(policy_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| payment_source_from_row(&r)).transpose()
    }

    async fn get_payment_source_by_id(&self, id: Uuid) -> Result<Option<PaymentSource>> {
        let row = sqlx::query(
            r#"SELECT id, network, smart_contract_address, policy_id, fee_rate_permille,
                      deleted_at, config, created_at, updated_at
               FROM payment_sources WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| payment_source_from_row(&r)).transpose()
    }

    async fn list_active_payment_sources(&self) -> Result<Vec<PaymentSource>> {
        let rows = sqlx::query(
            r#"SELECT id, network, smart_contract_address, policy_id, fee_rate_permille,
                      deleted_at, config, created_at, updated_at
               FROM payment_sources WHERE deleted_at IS NULL"#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(payment_source_from_row).collect()
    }

    async fn get_hot_wallet(&self, id: Uuid) -> Result<Option<HotWallet>> {
        let row = sqlx::query(
            r#"SELECT id, wallet_vkey, wallet_address, wallet_type, payment_source_id,
                      encrypted_mnemonic, deleted_at
               FROM hot_wallets WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| hot_wallet_from_row(&r)).transpose()
    }

    async fn find_hot_wallet_by_address(&self, payment_source_id: Uuid, wallet_address: &str) -> Result<Option<HotWallet>> {
        let row = sqlx::query(
            r#"SELECT id, wallet_vkey, wallet_address, wallet_type, payment_source_id,
                      encrypted_mnemonic, deleted_at
               FROM hot_wallets
               WHERE payment_source_id = $1 AND wallet_address = $2 AND deleted_at IS NULL"#,
        )
        .bind(payment_source_id)
        .bind(wallet_address)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| hot_wallet_from_row(&r)).transpose()
    }

    async fn find_purchasing_hot_wallet(&self, payment_source_id: Uuid) -> Result<Option<HotWallet>> {
        let row = sqlx::query(
            r#"SELECT id, wallet_vkey, wallet_address, wallet_type, payment_source_id,
                      encrypted_mnemonic, deleted_at
               FROM hot_wallets
               WHERE payment_source_id = $1 AND wallet_type = $2 AND deleted_at IS NULL
               LIMIT 1"#,
        )
        .bind(payment_source_id)
        .bind(json_col(&WalletType::Purchasing).as_str().unwrap_or_default())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| hot_wallet_from_row(&r)).transpose()
    }

    async fn find_payment_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        let row = sqlx::query(PAYMENT_SELECT_BY_ID).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(payment_from_row).transpose()
    }

    async fn find_payment_by_blockchain_identifier(&self, blockchain_identifier: &str) -> Result<Option<Payment>> {
        let row = sqlx::query(PAYMENT_SELECT_BY_BLOCKCHAIN_IDENTIFIER)
            .bind(blockchain_identifier)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(payment_from_row).transpose()
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        let result = sqlx::query(PAYMENT_INSERT)
            .bind(payment.id)
            .bind(&payment.blockchain_identifier)
            .bind(&payment.agent_identifier)
            .bind(&payment.input_hash)
            .bind(payment.pay_by_time)
            .bind(payment.submit_result_time)
            .bind(payment.unlock_time)
            .bind(payment.external_dispute_unlock_time)
            .bind(json_col(&payment.requested_funds))
            .bind(json_col(&payment.next_action).as_str().unwrap_or_default())
            .bind(json_col(&payment.withdrawn_for_seller))
            .bind(json_col(&payment.withdrawn_for_buyer))
            .bind(payment.total_seller_cardano_fees.to_string())
            .bind(payment.total_buyer_cardano_fees.to_string())
            .bind(&payment.result_hash)
            .bind(payment.created_at)
            .bind(payment.updated_at)
            .bind(payment.next_action_last_changed_at)
            .bind(payment.on_chain_state_or_result_last_changed_at)
            .bind(payment.next_action_or_on_chain_state_or_result_last_changed_at)
            .bind(payment.requested_by_id)
            .bind(payment.metadata.clone())
            .bind(payment.payment_source_id)
            .bind(payment.seller_wallet_id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::Conflict("blockchain_identifier already exists".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_payments(&self, filter: &ListFilter) -> Result<Vec<Payment>> {
        // A single hand-rolled WHERE builder is enough here: the filter
        // set is small and fixed (§6 `GET /payment`), not user-composed
        // arbitrary predicates.
        let limit = filter.limit.clamp(1, 100) as i64;
        let rows = sqlx::query(PAYMENT_SELECT_PAGE)
            .bind(filter.cursor_id.unwrap_or(Uuid::nil()))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(payment_from_row).collect()
    }

    async fn claim_payment_for_dispatch(&self, lease_duration_ms: i64, now: TimestampMs) -> Result<Option<Payment>> {
        let row = sqlx::query(
            r#"UPDATE payments SET lease_expires_at = $1
               WHERE id = (
                   SELECT id FROM payments
                   WHERE next_action IN ('AuthorizeRefundRequested', 'SubmitResultRequested')
                     AND (lease_expires_at IS NULL OR lease_expires_at < $2)
                   ORDER BY next_action_last_changed_at ASC
                   LIMIT 1
                   FOR UPDATE SKIP LOCKED
               )
               RETURNING *"#,
        )
        .bind(now + lease_duration_ms)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(payment_from_row).transpose()
    }

    async fn save_payment(&self, payment: &Payment) -> Result<()> {
        sqlx::query(PAYMENT_UPDATE)
            .bind(payment.id)
            .bind(payment.on_chain_state.map(|s| json_col(&s).as_str().unwrap_or_default().to_string()))
            .bind(json_col(&payment.next_action).as_str().unwrap_or_default())
            .bind(payment.next_action_error_type.map(|e| json_col(&e).as_str().unwrap_or_default().to_string()))
            .bind(&payment.next_action_error_note)
            .bind(payment.current_transaction_id)
            .bind(json_col(&payment.transaction_history))
            .bind(json_col(&payment.withdrawn_for_seller))
            .bind(json_col(&payment.withdrawn_for_buyer))
            .bind(payment.total_seller_cardano_fees.to_string())
            .bind(payment.total_buyer_cardano_fees.to_string())
            .bind(payment.updated_at)
            .bind(payment.next_action_last_changed_at)
            .bind(payment.on_chain_state_or_result_last_changed_at)
            .bind(payment.next_action_or_on_chain_state_or_result_last_changed_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn diff_payments(&self, mode: DiffMode, cursor: DiffCursor, limit: u32) -> Result<DiffPage<Payment>> {
        let column = diff_column(mode);
        let sql = format!(
            r#"SELECT * FROM payments
               WHERE {column} > $1 OR ({column} = $1 AND id >= $2)
               ORDER BY {column} ASC, id ASC
               LIMIT $3"#
        );
        let rows = sqlx::query(&sql)
            .bind(cursor.since)
            .bind(cursor.cursor_id)
            .bind(limit.clamp(1, 500) as i64)
            .fetch_all(&self.pool)
            .await?;
        let items: Vec<Payment> = rows.iter().map(payment_from_row).collect::<Result<_>>()?;
        let next_cursor = items
            .last()
            .map(|p| DiffCursor::after(diff_timestamp(mode, p), p.id));
        Ok(DiffPage { items, next_cursor })
    }

    async fn find_purchase_by_id(&self, id: Uuid) -> Result<Option<Purchase>> {
        let row = sqlx::query("SELECT * FROM purchases WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(purchase_from_row).transpose()
    }

    async fn find_purchase_by_blockchain_identifier(&self, blockchain_identifier: &str) -> Result<Option<Purchase>> {
        let row = sqlx::query("SELECT * FROM purchases WHERE blockchain_identifier = $1")
            .bind(blockchain_identifier)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(purchase_from_row).transpose()
    }

    async fn insert_purchase(&self, purchase: &Purchase) -> Result<()> {
        let result = sqlx::query(PURCHASE_INSERT)
            .bind(purchase.id)
            .bind(&purchase.blockchain_identifier)
            .bind(&purchase.agent_identifier)
            .bind(&purchase.input_hash)
            .bind(purchase.pay_by_time)
            .bind(purchase.submit_result_time)
            .bind(purchase.unlock_time)
            .bind(purchase.external_dispute_unlock_time)
            .bind(json_col(&purchase.paid_funds))
            .bind(json_col(&purchase.next_action).as_str().unwrap_or_default())
            .bind(json_col(&purchase.withdrawn_for_seller))
            .bind(json_col(&purchase.withdrawn_for_buyer))
            .bind(purchase.total_seller_cardano_fees.to_string())
            .bind(purchase.total_buyer_cardano_fees.to_string())
            .bind(purchase.created_at)
            .bind(purchase.updated_at)
            .bind(purchase.next_action_last_changed_at)
            .bind(purchase.on_chain_state_or_result_last_changed_at)
            .bind(purchase.next_action_or_on_chain_state_or_result_last_changed_at)
            .bind(purchase.requested_by_id)
            .bind(purchase.metadata.clone())
            .bind(purchase.payment_source_id)
            .bind(&purchase.seller_wallet_address)
            .bind(purchase.smart_contract_wallet_id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::Conflict("blockchain_identifier already exists".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_purchases(&self, filter: &ListFilter) -> Result<Vec<Purchase>> {
        let limit = filter.limit.clamp(1, 100) as i64;
        let rows = sqlx::query("SELECT * FROM purchases WHERE id >= $1 ORDER BY id ASC LIMIT $2")
            .bind(filter.cursor_id.unwrap_or(Uuid::nil()))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(purchase_from_row).collect()
    }

    async fn claim_purchase_for_dispatch(&self, lease_duration_ms: i64, now: TimestampMs) -> Result<Option<Purchase>> {
        let row = sqlx::query(
            r#"UPDATE purchases SET lease_expires_at = $1
               WHERE id = (
                   SELECT id FROM purchases
                   WHERE next_action IN ('SetRefundRequestedRequested', 'UnSetRefundRequestedRequested')
                     AND (lease_expires_at IS NULL OR lease_expires_at < $2)
                   ORDER BY next_action_last_changed_at ASC
                   LIMIT 1
                   FOR UPDATE SKIP LOCKED
               )
               RETURNING *"#,
        )
        .bind(now + lease_duration_ms)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(purchase_from_row).transpose()
    }

    async fn save_purchase(&self, purchase: &Purchase) -> Result<()> {
        sqlx::query(PURCHASE_UPDATE)
            .bind(purchase.id)
            .bind(purchase.on_chain_state.map(|s| json_col(&s).as_str().unwrap_or_default().to_string()))
            .bind(json_col(&purchase.next_action).as_str().unwrap_or_default())
            .bind(purchase.next_action_error_type.map(|e| json_col(&e).as_str().unwrap_or_default().to_string()))
            .bind(&purchase.next_action_error_note)
            .bind(purchase.current_transaction_id)
            .bind(json_col(&purchase.transaction_history))
            .bind(json_col(&purchase.withdrawn_for_seller))
            .bind(json_col(&purchase.withdrawn_for_buyer))
            .bind(purchase.total_seller_cardano_fees.to_string())
            .bind(purchase.total_buyer_cardano_fees.to_string())
            .bind(purchase.updated_at)
            .bind(purchase.next_action_last_changed_at)
            .bind(purchase.on_chain_state_or_result_last_changed_at)
            .bind(purchase.next_action_or_on_chain_state_or_result_last_changed_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn diff_purchases(&self, mode: DiffMode, cursor: DiffCursor, limit: u32) -> Result<DiffPage<Purchase>> {
        let column = diff_column(mode);
        let sql = format!(
            r#"SELECT * FROM purchases
               WHERE {column} > $1 OR ({column} = $1 AND id >= $2)
               ORDER BY {column} ASC, id ASC
               LIMIT $3"#
        );
        let rows = sqlx::query(&sql)
            .bind(cursor.since)
            .bind(cursor.cursor_id)
            .bind(limit.clamp(1, 500) as i64)
            .fetch_all(&self.pool)
            .await?;
        let items: Vec<Purchase> = rows.iter().map(purchase_from_row).collect::<Result<_>>()?;
        let next_cursor = items.last().map(|p| {
            let ts = match mode {
                DiffMode::NextAction => p.next_action_last_changed_at,
                DiffMode::OnChainStateOrResult => p.on_chain_state_or_result_last_changed_at,
                DiffMode::Either => p.next_action_or_on_chain_state_or_result_last_changed_at,
            };
            DiffCursor::after(ts, p.id)
        });
        Ok(DiffPage { items, next_cursor })
    }

    async fn find_registry_request_by_id(&self, id: Uuid) -> Result<Option<RegistryRequest>> {
        let row = sqlx::query("SELECT * FROM registry_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(registry_request_from_row).transpose()
    }

    async fn insert_registry_request(&self, request: &RegistryRequest) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO registry_requests
               (id, state, agent_identifier, pricing, name, api_base_url, author, legal, tags,
                capability, example_output, image, smart_contract_wallet_id, payment_source_id,
                created_at, updated_at, next_action_last_changed_at)
               VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17)"#,
        )
        .bind(request.id)
        .bind(json_col(&request.state).as_str().unwrap_or_default())
        .bind(&request.agent_identifier)
        .bind(json_col(&request.pricing))
        .bind(&request.name)
        .bind(&request.api_base_url)
        .bind(json_col(&request.author))
        .bind(request.legal.as_ref().map(json_col))
        .bind(&request.tags)
        .bind(request.capability.clone())
        .bind(request.example_output.clone())
        .bind(&request.image)
        .bind(request.smart_contract_wallet_id)
        .bind(request.payment_source_id)
        .bind(request.created_at)
        .bind(request.updated_at)
        .bind(request.next_action_last_changed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn claim_registry_request_for_dispatch(&self, lease_duration_ms: i64, now: TimestampMs) -> Result<Option<RegistryRequest>> {
        let row = sqlx::query(
            r#"UPDATE registry_requests SET lease_expires_at = $1
               WHERE id = (
                   SELECT id FROM registry_requests
                   WHERE state IN ('RegistrationRequested', 'DeregistrationRequested')
                     AND (lease_expires_at IS NULL OR lease_expires_at < $2)
                   ORDER BY next_action_last_changed_at ASC
                   LIMIT 1
                   FOR UPDATE SKIP LOCKED
               )
               RETURNING *"#,
        )
        .bind(now + lease_duration_ms)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(registry_request_from_row).transpose()
    }

    async fn save_registry_request(&self, request: &RegistryRequest) -> Result<()> {
        sqlx::query(
            r#"UPDATE registry_requests SET state = $2, agent_identifier = $3, updated_at = $4,
               next_action_last_changed_at = $5 WHERE id = $1"#,
        )
        .bind(request.id)
        .bind(json_col(&request.state).as_str().unwrap_or_default())
        .bind(&request.agent_identifier)
        .bind(request.updated_at)
        .bind(request.next_action_last_changed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_registry_request(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"DELETE FROM registry_requests
               WHERE id = $1 AND state IN ('RegistrationFailed', 'DeregistrationConfirmed')"#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn diff_registry_requests(&self, cursor: DiffCursor, limit: u32) -> Result<DiffPage<RegistryRequest>> {
        let rows = sqlx::query(
            r#"SELECT * FROM registry_requests
               WHERE next_action_last_changed_at > $1
                  OR (next_action_last_changed_at = $1 AND id >= $2)
               ORDER BY next_action_last_changed_at ASC, id ASC
               LIMIT $3"#,
        )
        .bind(cursor.since)
        .bind(cursor.cursor_id)
        .bind(limit.clamp(1, 500) as i64)
        .fetch_all(&self.pool)
        .await?;
        let items: Vec<RegistryRequest> = rows.iter().map(registry_request_from_row).collect::<Result<_>>()?;
        let next_cursor = items.last().map(|r| DiffCursor::after(r.next_action_last_changed_at, r.id));
        Ok(DiffPage { items, next_cursor })
    }

    async fn get_reconciler_cursor(&self, payment_source_id: Uuid, kind: ReconcilerCursorKind) -> Result<Option<ReconcilerCursor>> {
        let row = sqlx::query("SELECT timestamp, last_id FROM reconciler_cursors WHERE payment_source_id = $1 AND kind = $2")
            .bind(payment_source_id)
            .bind(cursor_kind_str(kind))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| ReconcilerCursor {
            timestamp: r.get("timestamp"),
            last_id: r.get("last_id"),
        }))
    }

    async fn advance_reconciler_cursor(&self, payment_source_id: Uuid, kind: ReconcilerCursorKind, cursor: ReconcilerCursor) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO reconciler_cursors (payment_source_id, kind, timestamp, last_id)
               VALUES ($1, $2, $3, $4)
               ON CONFLICT (payment_source_id, kind) DO UPDATE SET timestamp = $3, last_id = $4"#,
        )
        .bind(payment_source_id)
        .bind(cursor_kind_str(kind))
        .bind(cursor.timestamp)
        .bind(cursor.last_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn cursor_kind_str(kind: ReconcilerCursorKind) -> &'static str {
    match kind {
        ReconcilerCursorKind::Payment => "payment",
        ReconcilerCursorKind::Purchase => "purchase",
    }
}

fn diff_column(mode: DiffMode) -> &'static str {
    match mode {
        DiffMode::NextAction => "next_action_last_changed_at",
        DiffMode::OnChainStateOrResult => "on_chain_state_or_result_last_changed_at",
        DiffMode::Either => "next_action_or_on_chain_state_or_result_last_changed_at",
    }
}

fn diff_timestamp(mode: DiffMode, payment: &Payment) -> TimestampMs {
    match mode {
        DiffMode::NextAction => payment.next_action_last_changed_at,
        DiffMode::OnChainStateOrResult => payment.on_chain_state_or_result_last_changed_at,
        DiffMode::Either => payment.next_action_or_on_chain_state_or_result_last_changed_at,
    }
}

fn payment_source_from_row(row: &sqlx::postgres::PgRow) -> Result<PaymentSource> {
    Ok(PaymentSource {
        id: row.try_get("id")?,
        network: from_json_col(serde_json::Value::String(row.try_get("network")?))?,
        smart_contract_address: row.try_get("smart_contract_address")?,
        policy_id: row.try_get("policy_id")?,
        fee_rate_permille: row.try_get::<i32, _>("fee_rate_permille")? as u16,
        deleted_at: row.try_get("deleted_at")?,
        config: from_json_col(row.try_get("config")?)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn hot_wallet_from_row(row: &sqlx::postgres::PgRow) -> Result<HotWallet> {
    Ok(HotWallet {
        id: row.try_get("id")?,
        wallet_vkey: row.try_get("wallet_vkey")?,
        wallet_address: row.try_get("wallet_address")?,
        wallet_type: from_json_col(serde_json::Value::String(row.try_get("wallet_type")?))?,
        payment_source_id: row.try_get("payment_source_id")?,
        encrypted_mnemonic: row.try_get("encrypted_mnemonic")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn registry_request_from_row(row: &sqlx::postgres::PgRow) -> Result<RegistryRequest> {
    Ok(RegistryRequest {
        id: row.try_get("id")?,
        state: from_json_col(serde_json::Value::String(row.try_get("state")?))?,
        agent_identifier: row.try_get("agent_identifier")?,
        pricing: from_json_col(row.try_get("pricing")?)?,
        name: row.try_get("name")?,
        api_base_url: row.try_get("api_base_url")?,
        author: from_json_col(row.try_get("author")?)?,
        legal: row.try_get::<Option<serde_json::Value>, _>("legal")?.map(from_json_col).transpose()?,
        tags: row.try_get("tags")?,
        capability: row.try_get("capability")?,
        example_output: row.try_get("example_output")?,
        image: row.try_get("image")?,
        smart_contract_wallet_id: row.try_get("smart_contract_wallet_id")?,
        payment_source_id: row.try_get("payment_source_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        next_action_last_changed_at: row.try_get("next_action_last_changed_at")?,
    })
}

const PAYMENT_SELECT_BY_ID: &str = "SELECT * FROM payments WHERE id = $1";
const PAYMENT_SELECT_BY_BLOCKCHAIN_IDENTIFIER: &str = "SELECT * FROM payments WHERE blockchain_identifier = $1";
const PAYMENT_SELECT_PAGE: &str = "SELECT * FROM payments WHERE id >= $1 ORDER BY id ASC LIMIT $2";
const PAYMENT_INSERT: &str = r#"
    INSERT INTO payments (
        id, blockchain_identifier, agent_identifier, input_hash,
        pay_by_time, submit_result_time, unlock_time, external_dispute_unlock_time,
        requested_funds, next_action, withdrawn_for_seller, withdrawn_for_buyer,
        total_seller_cardano_fees, total_buyer_cardano_fees, result_hash,
        created_at, updated_at, next_action_last_changed_at,
        on_chain_state_or_result_last_changed_at,
        next_action_or_on_chain_state_or_result_last_changed_at,
        requested_by_id, metadata, payment_source_id, seller_wallet_id
    ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22,$23,$24)
"#;
const PAYMENT_UPDATE: &str = r#"
    UPDATE payments SET
        on_chain_state = $2, next_action = $3, next_action_error_type = $4,
        next_action_error_note = $5, current_transaction_id = $6, transaction_history = $7,
        withdrawn_for_seller = $8, withdrawn_for_buyer = $9, total_seller_cardano_fees = $10,
        total_buyer_cardano_fees = $11, updated_at = $12, next_action_last_changed_at = $13,
        on_chain_state_or_result_last_changed_at = $14,
        next_action_or_on_chain_state_or_result_last_changed_at = $15,
        lease_expires_at = NULL
    WHERE id = $1
"#;

fn purchase_from_row(row: &sqlx::postgres::PgRow) -> Result<Purchase> {
    Ok(Purchase {
        id: row.try_get("id")?,
        blockchain_identifier: row.try_get("blockchain_identifier")?,
        agent_identifier: row.try_get("agent_identifier")?,
        input_hash: row.try_get("input_hash")?,
        pay_by_time: row.try_get("pay_by_time")?,
        submit_result_time: row.try_get("submit_result_time")?,
        unlock_time: row.try_get("unlock_time")?,
        external_dispute_unlock_time: row.try_get("external_dispute_unlock_time")?,
        paid_funds: from_json_col(row.try_get("paid_funds")?)?,
        on_chain_state: row
            .try_get::<Option<String>, _>("on_chain_state")?
            .map(|s| from_json_col(serde_json::Value::String(s)))
            .transpose()?,
        next_action: from_json_col(serde_json::Value::String(row.try_get("next_action")?))?,
        next_action_error_type: row
            .try_get::<Option<String>, _>("next_action_error_type")?
            .map(|s| from_json_col(serde_json::Value::String(s)))
            .transpose()?,
        next_action_error_note: row.try_get("next_action_error_note")?,
        current_transaction_id: row.try_get("current_transaction_id")?,
        transaction_history: from_json_col(row.try_get("transaction_history")?)?,
        withdrawn_for_seller: from_json_col(row.try_get("withdrawn_for_seller")?)?,
        withdrawn_for_buyer: from_json_col(row.try_get("withdrawn_for_buyer")?)?,
        total_seller_cardano_fees: from_json_col(row.try_get::<String, _>("total_seller_cardano_fees")?.into())?,
        total_buyer_cardano_fees: from_json_col(row.try_get::<String, _>("total_buyer_cardano_fees")?.into())?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        next_action_last_changed_at: row.try_get("next_action_last_changed_at")?,
        on_chain_state_or_result_last_changed_at: row.try_get("on_chain_state_or_result_last_changed_at")?,
        next_action_or_on_chain_state_or_result_last_changed_at: row
            .try_get("next_action_or_on_chain_state_or_result_last_changed_at")?,
        requested_by_id: row.try_get("requested_by_id")?,
        metadata: row.try_get("metadata")?,
        payment_source_id: row.try_get("payment_source_id")?,
        seller_wallet_address: row.try_get("seller_wallet_address")?,
        smart_contract_wallet_id: row.try_get("smart_contract_wallet_id")?,
    })
}

const PURCHASE_INSERT: &str = r#"
    INSERT INTO purchases (
        id, blockchain_identifier, agent_identifier, input_hash,
        pay_by_time, submit_result_time, unlock_time, external_dispute_unlock_time,
        paid_funds, next_action, withdrawn_for_seller, withdrawn_for_buyer,
        total_seller_cardano_fees, total_buyer_cardano_fees,
        created_at, updated_at, next_action_last_changed_at,
        on_chain_state_or_result_last_changed_at,
        next_action_or_on_chain_state_or_result_last_changed_at,
        requested_by_id, metadata, payment_source_id, seller_wallet_address, smart_contract_wallet_id
    ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22,$23)
"#;
const PURCHASE_UPDATE: &str = r#"
    UPDATE purchases SET
        on_chain_state = $2, next_action = $3, next_action_error_type = $4,
        next_action_error_note = $5, current_transaction_id = $6, transaction_history = $7,
        withdrawn_for_seller = $8, withdrawn_for_buyer = $9, total_seller_cardano_fees = $10,
        total_buyer_cardano_fees = $11, updated_at = $12, next_action_last_changed_at = $13,
        on_chain_state_or_result_last_changed_at = $14,
        next_action_or_on_chain_state_or_result_last_changed_at = $15,
        lease_expires_at = NULL
    WHERE id = $1
"#;
