//! PostgreSQL-backed stores.
//!
//! The repositories here are the real outbox commit: aggregate row and
//! outbox rows go through one `sqlx` transaction. Updates are guarded
//! by a version predicate, so two writers racing on one aggregate
//! serialize into a winner and a
//! [`StoreError::ConcurrencyConflict`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    Currency, CustomerId, Money, OrderId, PaymentId, Version,
};
use domain::{Order, OrderRecord, OrderStatus, Payment, PaymentRecord, PaymentStatus};
use messaging::{Command, MessageContext};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::message::{MessageId, OutboxMessage};
use crate::repository::{OrderRepository, PaymentRepository, outbox_messages_for};
use crate::store::{MAX_RETRIES, OutboxStore};

/// Runs the database migrations.
pub async fn run_migrations(pool: &PgPool) -> std::result::Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}

async fn insert_outbox_rows(
    tx: &mut Transaction<'_, Postgres>,
    messages: &[OutboxMessage],
) -> Result<()> {
    for message in messages {
        sqlx::query(
            r#"
            INSERT INTO outbox_messages (id, occurred_on, message_type, payload, processed_on, retries, error)
            VALUES ($1, $2, $3, $4, NULL, 0, NULL)
            "#,
        )
        .bind(message.id.as_uuid())
        .bind(message.occurred_on)
        .bind(&message.message_type)
        .bind(&message.payload)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// PostgreSQL outbox table access.
#[derive(Clone)]
pub struct PostgresOutboxStore {
    pool: PgPool,
}

impl PostgresOutboxStore {
    /// Creates a store over the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_message(row: PgRow) -> Result<OutboxMessage> {
        Ok(OutboxMessage {
            id: MessageId::from_uuid(row.try_get::<Uuid, _>("id")?),
            occurred_on: row.try_get("occurred_on")?,
            message_type: row.try_get("message_type")?,
            payload: row.try_get("payload")?,
            processed_on: row.try_get("processed_on")?,
            retries: row.try_get("retries")?,
            error: row.try_get("error")?,
        })
    }
}

#[async_trait]
impl OutboxStore for PostgresOutboxStore {
    async fn enqueue(&self, messages: Vec<OutboxMessage>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        insert_outbox_rows(&mut tx, &messages).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn pending(&self, limit: usize) -> Result<Vec<OutboxMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, occurred_on, message_type, payload, processed_on, retries, error
            FROM outbox_messages
            WHERE processed_on IS NULL AND retries < $1
            ORDER BY occurred_on ASC
            LIMIT $2
            "#,
        )
        .bind(MAX_RETRIES)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_message).collect()
    }

    async fn mark_processed(&self, id: MessageId) -> Result<()> {
        sqlx::query("UPDATE outbox_messages SET processed_on = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_failure(&self, id: MessageId, error: &str) -> Result<()> {
        sqlx::query("UPDATE outbox_messages SET retries = retries + 1, error = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(error)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn poison(&self, id: MessageId, error: &str) -> Result<()> {
        sqlx::query("UPDATE outbox_messages SET retries = $2, error = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(MAX_RETRIES)
            .bind(error)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// PostgreSQL order storage with outbox commit semantics.
#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    /// Creates a repository over the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let status: String = row.try_get("status")?;
        let status = OrderStatus::parse(&status)
            .ok_or_else(|| StoreError::InvalidRecord(format!("unknown order status: {status}")))?;

        Ok(Order::from_record(OrderRecord {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            amount: Money::from_cents(row.try_get("amount_cents")?),
            currency: Currency::new(row.try_get::<String, _>("currency")?),
            status,
            idempotency_key: row.try_get("idempotency_key")?,
            payment_id: row
                .try_get::<Option<Uuid>, _>("payment_id")?
                .map(PaymentId::from_uuid),
            failure_reason: row.try_get("failure_reason")?,
            version: Version::new(row.try_get("version")?),
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<Option<DateTime<Utc>>, _>("updated_at")?,
        }))
    }
}

const SELECT_ORDER: &str = r#"
    SELECT id, customer_id, amount_cents, currency, status, idempotency_key,
           payment_id, failure_reason, version, created_at, updated_at
    FROM orders
"#;

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn find(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("{SELECT_ORDER} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("{SELECT_ORDER} WHERE idempotency_key = $1"))
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn insert(
        &self,
        order: &mut Order,
        context: &MessageContext,
        commands: &[Command],
    ) -> Result<()> {
        let messages = outbox_messages_for(order.pending_events(), commands, context)?;
        let version = order.version().next();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, amount_cents, currency, status,
                                idempotency_key, payment_id, failure_reason, version,
                                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.customer_id().as_uuid())
        .bind(order.amount().cents())
        .bind(order.currency().as_str())
        .bind(order.status().as_str())
        .bind(order.idempotency_key())
        .bind(order.payment_id().map(|id| id.as_uuid()))
        .bind(order.failure_reason())
        .bind(version.as_i64())
        .bind(order.audit().created_at)
        .bind(order.audit().updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("orders_idempotency_key_unique")
            {
                return StoreError::DuplicateIdempotencyKey {
                    key: order.idempotency_key().to_string(),
                };
            }
            StoreError::Database(e)
        })?;

        insert_outbox_rows(&mut tx, &messages).await?;
        tx.commit().await?;

        order.set_version(version);
        order.clear_pending_events();
        Ok(())
    }

    async fn update(
        &self,
        order: &mut Order,
        context: &MessageContext,
        commands: &[Command],
    ) -> Result<()> {
        let messages = outbox_messages_for(order.pending_events(), commands, context)?;
        let version = order.version().next();

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, payment_id = $3, failure_reason = $4, version = $5, updated_at = $6
            WHERE id = $1 AND version = $7
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.status().as_str())
        .bind(order.payment_id().map(|id| id.as_uuid()))
        .bind(order.failure_reason())
        .bind(version.as_i64())
        .bind(order.audit().updated_at)
        .bind(order.version().as_i64())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ConcurrencyConflict {
                entity: "order",
                id: order.id().to_string(),
                expected: order.version().as_i64(),
            });
        }

        insert_outbox_rows(&mut tx, &messages).await?;
        tx.commit().await?;

        order.set_version(version);
        order.clear_pending_events();
        Ok(())
    }
}

/// PostgreSQL payment storage with outbox commit semantics.
#[derive(Clone)]
pub struct PostgresPaymentRepository {
    pool: PgPool,
}

impl PostgresPaymentRepository {
    /// Creates a repository over the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_payment(row: PgRow) -> Result<Payment> {
        let status: String = row.try_get("status")?;
        let status = PaymentStatus::parse(&status).ok_or_else(|| {
            StoreError::InvalidRecord(format!("unknown payment status: {status}"))
        })?;

        Ok(Payment::from_record(PaymentRecord {
            id: PaymentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            amount: Money::from_cents(row.try_get("amount_cents")?),
            currency: Currency::new(row.try_get::<String, _>("currency")?),
            status,
            idempotency_key: row.try_get("idempotency_key")?,
            provider_transaction_id: row.try_get("provider_transaction_id")?,
            failure_reason: row.try_get("failure_reason")?,
            failure_code: row.try_get("failure_code")?,
            version: Version::new(row.try_get("version")?),
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<Option<DateTime<Utc>>, _>("updated_at")?,
        }))
    }
}

const SELECT_PAYMENT: &str = r#"
    SELECT id, order_id, amount_cents, currency, status, idempotency_key,
           provider_transaction_id, failure_reason, failure_code, version,
           created_at, updated_at
    FROM payments
"#;

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
    async fn find(&self, id: PaymentId) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!("{SELECT_PAYMENT} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!("{SELECT_PAYMENT} WHERE idempotency_key = $1"))
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn find_by_provider_transaction_id(&self, id: &str) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "{SELECT_PAYMENT} WHERE provider_transaction_id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn insert(
        &self,
        payment: &mut Payment,
        context: &MessageContext,
        commands: &[Command],
    ) -> Result<()> {
        let messages = outbox_messages_for(payment.pending_events(), commands, context)?;
        let version = payment.version().next();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, amount_cents, currency, status,
                                  idempotency_key, provider_transaction_id, failure_reason,
                                  failure_code, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(payment.id().as_uuid())
        .bind(payment.order_id().as_uuid())
        .bind(payment.amount().cents())
        .bind(payment.currency().as_str())
        .bind(payment.status().as_str())
        .bind(payment.idempotency_key())
        .bind(payment.provider_transaction_id())
        .bind(payment.failure_reason())
        .bind(payment.failure_code())
        .bind(version.as_i64())
        .bind(payment.audit().created_at)
        .bind(payment.audit().updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("payments_idempotency_key_unique")
            {
                return StoreError::DuplicateIdempotencyKey {
                    key: payment.idempotency_key().to_string(),
                };
            }
            StoreError::Database(e)
        })?;

        insert_outbox_rows(&mut tx, &messages).await?;
        tx.commit().await?;

        payment.set_version(version);
        payment.clear_pending_events();
        Ok(())
    }

    async fn update(
        &self,
        payment: &mut Payment,
        context: &MessageContext,
        commands: &[Command],
    ) -> Result<()> {
        let messages = outbox_messages_for(payment.pending_events(), commands, context)?;
        let version = payment.version().next();

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = $2, provider_transaction_id = $3, failure_reason = $4,
                failure_code = $5, version = $6, updated_at = $7
            WHERE id = $1 AND version = $8
            "#,
        )
        .bind(payment.id().as_uuid())
        .bind(payment.status().as_str())
        .bind(payment.provider_transaction_id())
        .bind(payment.failure_reason())
        .bind(payment.failure_code())
        .bind(version.as_i64())
        .bind(payment.audit().updated_at)
        .bind(payment.version().as_i64())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ConcurrencyConflict {
                entity: "payment",
                id: payment.id().to_string(),
                expected: payment.version().as_i64(),
            });
        }

        insert_outbox_rows(&mut tx, &messages).await?;
        tx.commit().await?;

        payment.set_version(version);
        payment.clear_pending_events();
        Ok(())
    }
}
