//! Postgres implementations of the lock-critical repositories.
//!
//! The reservation compare-and-set is expressed as a conditional
//! `UPDATE ... WHERE` that only matches when the row has no live holder or
//! the caller already holds it, so two racing verifications can never both
//! commit. Enabled with the `postgres` feature.

use super::{PaymentRepository, PropertyRepository};
use crate::error::{MarketError, Result};
use crate::types::{
    FeeStatus, Money, PaymentId, PaymentStatus, Property, PropertyId, PropertyStatus,
    ReservationFeePayment, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

fn storage_error(e: sqlx::Error) -> MarketError {
    MarketError::Storage(e.to_string())
}

fn property_status_label(status: PropertyStatus) -> &'static str {
    match status {
        PropertyStatus::Available => "available",
        PropertyStatus::Pending => "pending",
        PropertyStatus::Sold => "sold",
    }
}

fn property_status_from(label: &str) -> PropertyStatus {
    match label {
        "pending" => PropertyStatus::Pending,
        "sold" => PropertyStatus::Sold,
        _ => PropertyStatus::Available,
    }
}

fn payment_status_label(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Pending => "pending",
        PaymentStatus::Success => "success",
        PaymentStatus::Failed => "failed",
    }
}

fn payment_status_from(label: &str) -> PaymentStatus {
    match label {
        "success" => PaymentStatus::Success,
        "failed" => PaymentStatus::Failed,
        _ => PaymentStatus::Pending,
    }
}

fn row_to_property(row: &sqlx::postgres::PgRow) -> Result<Property> {
    let status: String = row.try_get("status").map_err(storage_error)?;
    let fee_status: String = row
        .try_get("reservation_fee_status")
        .map_err(storage_error)?;

    Ok(Property {
        id: PropertyId::from_uuid(row.try_get::<Uuid, _>("id").map_err(storage_error)?),
        title: row.try_get("title").map_err(storage_error)?,
        price: Money::from_minor(row.try_get("price_minor").map_err(storage_error)?),
        listed_by: UserId::from_uuid(row.try_get::<Uuid, _>("listed_by").map_err(storage_error)?),
        agent_id: row
            .try_get::<Option<Uuid>, _>("agent_id")
            .map_err(storage_error)?
            .map(UserId::from_uuid),
        status: property_status_from(&status),
        is_reserved: row.try_get("is_reserved").map_err(storage_error)?,
        current_reservation_by: row
            .try_get::<Option<Uuid>, _>("current_reservation_by")
            .map_err(storage_error)?
            .map(UserId::from_uuid),
        reservation_started_at: row
            .try_get("reservation_started_at")
            .map_err(storage_error)?,
        reservation_expires_at: row
            .try_get("reservation_expires_at")
            .map_err(storage_error)?,
        reservation_fee_status: if fee_status == "paid" {
            FeeStatus::Paid
        } else {
            FeeStatus::Unpaid
        },
        soft_hold_by: row
            .try_get::<Option<Uuid>, _>("soft_hold_by")
            .map_err(storage_error)?
            .map(UserId::from_uuid),
        soft_hold_expires_at: row.try_get("soft_hold_expires_at").map_err(storage_error)?,
        created_at: row.try_get("created_at").map_err(storage_error)?,
        updated_at: row.try_get("updated_at").map_err(storage_error)?,
    })
}

fn row_to_payment(row: &sqlx::postgres::PgRow) -> Result<ReservationFeePayment> {
    let status: String = row.try_get("status").map_err(storage_error)?;

    Ok(ReservationFeePayment {
        id: PaymentId::from_uuid(row.try_get::<Uuid, _>("id").map_err(storage_error)?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id").map_err(storage_error)?),
        property_id: PropertyId::from_uuid(
            row.try_get::<Uuid, _>("property_id").map_err(storage_error)?,
        ),
        amount: Money::from_minor(row.try_get("amount_minor").map_err(storage_error)?),
        status: payment_status_from(&status),
        reference: row.try_get("reference").map_err(storage_error)?,
        paid_at: row.try_get("paid_at").map_err(storage_error)?,
        failure_reason: row.try_get("failure_reason").map_err(storage_error)?,
        metadata: row.try_get("metadata").map_err(storage_error)?,
        created_at: row.try_get("created_at").map_err(storage_error)?,
    })
}

const PROPERTY_COLUMNS: &str = "id, title, price_minor, listed_by, agent_id, status, \
     is_reserved, current_reservation_by, reservation_started_at, reservation_expires_at, \
     reservation_fee_status, soft_hold_by, soft_hold_expires_at, created_at, updated_at";

const PAYMENT_COLUMNS: &str =
    "id, user_id, property_id, amount_minor, status, reference, paid_at, failure_reason, \
     metadata, created_at";

/// Postgres-backed property store.
#[derive(Clone)]
pub struct PostgresPropertyStore {
    pool: PgPool,
}

impl PostgresPropertyStore {
    /// Create a store over an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PropertyRepository for PostgresPropertyStore {
    async fn create(&self, property: &Property) -> Result<()> {
        sqlx::query(
            "INSERT INTO properties \
             (id, title, price_minor, listed_by, agent_id, status, is_reserved, \
              reservation_fee_status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(property.id.as_uuid())
        .bind(&property.title)
        .bind(property.price.minor())
        .bind(property.listed_by.as_uuid())
        .bind(property.agent_id.map(|a| *a.as_uuid()))
        .bind(property_status_label(property.status))
        .bind(property.is_reserved)
        .bind(if property.reservation_fee_status == FeeStatus::Paid {
            "paid"
        } else {
            "unpaid"
        })
        .bind(property.created_at)
        .bind(property.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn get(&self, id: PropertyId) -> Result<Property> {
        let row = sqlx::query(&format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?
        .ok_or(MarketError::not_found("property"))?;
        row_to_property(&row)
    }

    async fn list(&self) -> Result<Vec<Property>> {
        let rows = sqlx::query(&format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        rows.iter().map(row_to_property).collect()
    }

    async fn try_reserve(
        &self,
        id: PropertyId,
        user: UserId,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<Property>> {
        // The WHERE clause is the compare-and-set: only a vacant row (no
        // holder, expired holder, or the caller itself) matches.
        let row = sqlx::query(&format!(
            "UPDATE properties SET \
               is_reserved = TRUE, \
               current_reservation_by = $2, \
               reservation_started_at = $3, \
               reservation_expires_at = $4, \
               reservation_fee_status = 'paid', \
               status = 'pending', \
               updated_at = $3 \
             WHERE id = $1 AND ( \
               is_reserved = FALSE \
               OR current_reservation_by IS NULL \
               OR current_reservation_by = $2 \
               OR reservation_expires_at <= $3) \
             RETURNING {PROPERTY_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(user.as_uuid())
        .bind(now)
        .bind(expires_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        match row {
            Some(row) => Ok(Some(row_to_property(&row)?)),
            None => {
                // Distinguish a lost race from a missing row.
                self.get(id).await?;
                Ok(None)
            }
        }
    }

    async fn release_reservation(&self, id: PropertyId, now: DateTime<Utc>) -> Result<Property> {
        let row = sqlx::query(&format!(
            "UPDATE properties SET \
               is_reserved = FALSE, \
               current_reservation_by = NULL, \
               reservation_started_at = NULL, \
               reservation_expires_at = NULL, \
               reservation_fee_status = 'unpaid', \
               status = 'available', \
               updated_at = $2 \
             WHERE id = $1 \
             RETURNING {PROPERTY_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?
        .ok_or(MarketError::not_found("property"))?;
        row_to_property(&row)
    }

    async fn try_soft_hold(
        &self,
        id: PropertyId,
        user: UserId,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<Property>> {
        let row = sqlx::query(&format!(
            "UPDATE properties SET \
               soft_hold_by = $2, \
               soft_hold_expires_at = $4, \
               updated_at = $3 \
             WHERE id = $1 AND ( \
               soft_hold_by IS NULL \
               OR soft_hold_by = $2 \
               OR soft_hold_expires_at <= $3) \
             RETURNING {PROPERTY_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(user.as_uuid())
        .bind(now)
        .bind(expires_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        match row {
            Some(row) => Ok(Some(row_to_property(&row)?)),
            None => {
                self.get(id).await?;
                Ok(None)
            }
        }
    }

    async fn release_soft_hold(
        &self,
        id: PropertyId,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<Property> {
        sqlx::query(
            "UPDATE properties SET soft_hold_by = NULL, soft_hold_expires_at = NULL, \
             updated_at = $3 WHERE id = $1 AND soft_hold_by = $2",
        )
        .bind(id.as_uuid())
        .bind(user.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        self.get(id).await
    }

    async fn mark_sold(&self, id: PropertyId, now: DateTime<Utc>) -> Result<Property> {
        let row = sqlx::query(&format!(
            "UPDATE properties SET status = 'sold', updated_at = $2 \
             WHERE id = $1 RETURNING {PROPERTY_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?
        .ok_or(MarketError::not_found("property"))?;
        row_to_property(&row)
    }
}

/// Postgres-backed payment store. The unique index on `reference` enforces
/// one payment record per gateway reference.
#[derive(Clone)]
pub struct PostgresPaymentStore {
    pool: PgPool,
}

impl PostgresPaymentStore {
    /// Create a store over an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentRepository for PostgresPaymentStore {
    async fn create(&self, payment: &ReservationFeePayment) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO reservation_fee_payments \
             (id, user_id, property_id, amount_minor, status, reference, metadata, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(payment.id.as_uuid())
        .bind(payment.user_id.as_uuid())
        .bind(payment.property_id.as_uuid())
        .bind(payment.amount.minor())
        .bind(payment_status_label(payment.status))
        .bind(&payment.reference)
        .bind(&payment.metadata)
        .bind(payment.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                MarketError::conflict("payment reference already exists"),
            ),
            Err(e) => Err(storage_error(e)),
        }
    }

    async fn get_by_reference(&self, reference: &str) -> Result<ReservationFeePayment> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM reservation_fee_payments WHERE reference = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?
        .ok_or(MarketError::not_found("payment record"))?;
        row_to_payment(&row)
    }

    async fn get(&self, id: PaymentId) -> Result<ReservationFeePayment> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM reservation_fee_payments WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?
        .ok_or(MarketError::not_found("payment record"))?;
        row_to_payment(&row)
    }

    async fn mark_success(
        &self,
        reference: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<ReservationFeePayment> {
        let row = sqlx::query(&format!(
            "UPDATE reservation_fee_payments SET status = 'success', paid_at = $2 \
             WHERE reference = $1 RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(reference)
        .bind(paid_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?
        .ok_or(MarketError::not_found("payment record"))?;
        row_to_payment(&row)
    }

    async fn mark_failed(&self, reference: &str, reason: &str) -> Result<ReservationFeePayment> {
        let row = sqlx::query(&format!(
            "UPDATE reservation_fee_payments SET status = 'failed', failure_reason = $2 \
             WHERE reference = $1 RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(reference)
        .bind(reason)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?
        .ok_or(MarketError::not_found("payment record"))?;
        row_to_payment(&row)
    }

    async fn latest_success_for(
        &self,
        user: UserId,
        property: PropertyId,
    ) -> Result<Option<ReservationFeePayment>> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM reservation_fee_payments \
             WHERE user_id = $1 AND property_id = $2 AND status = 'success' \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(user.as_uuid())
        .bind(property.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        row.as_ref().map(row_to_payment).transpose()
    }
}
