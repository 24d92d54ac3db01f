//! PostgreSQL store
//!
//! Conditional writes are single `UPDATE ... WHERE <guard> RETURNING`
//! statements; the partial unique index `orders_one_active_per_driver`
//! backs the one-active-order rule even under concurrent claims.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};
use tracing::debug;
use uuid::Uuid;

use super::{
    AvailabilityOutcome, ClaimOutcome, OrderQuery, OrderStore, SortDirection, SortField,
    StatusChange, StoreError, StoreResult, UserStore,
};
use crate::models::{
    DriverProfile, Location, Order, OrderStatus, Role, User, UserPatch, Vehicle,
};

const USER_COLUMNS: &str = "id, email, name, phone, role, has_driver_profile, license_number, \
     vehicle_make, vehicle_model, vehicle_year, vehicle_color, vehicle_plate, vehicle_capacity, \
     rating, total_trips, is_available, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, customer_id, driver_id, customer_name, customer_phone, \
     customer_email, pickup_address, pickup_city, pickup_postal_code, pickup_country, \
     destination_address, destination_city, destination_postal_code, destination_country, \
     pickup_at, flight_number, airline, passenger_count, luggage_count, special_requirements, \
     notes, status, estimated_price, final_price, created_at, updated_at, accepted_at, completed_at";

const SEARCH_COLUMNS: [&str; 8] = [
    "customer_name",
    "customer_phone",
    "customer_email",
    "pickup_address",
    "destination_address",
    "flight_number",
    "airline",
    "id::text",
];

const ACTIVE_DRIVER_INDEX: &str = "orders_one_active_per_driver";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db) = err.as_database_error() {
            match db.code().as_deref() {
                Some("23505") => {
                    let key = match db.constraint() {
                        Some("users_email_key") => "email".to_string(),
                        Some(other) => other.to_string(),
                        None => "unique key".to_string(),
                    };
                    return StoreError::DuplicateKey(key);
                }
                Some("40001") | Some("40P01") => {
                    return StoreError::Transient(db.message().to_string());
                }
                _ => {}
            }
        }
        StoreError::Database(err)
    }
}

fn parse_status(raw: &str) -> StoreResult<OrderStatus> {
    raw.parse().map_err(StoreError::Corrupt)
}

fn user_from_row(row: &PgRow) -> StoreResult<User> {
    let role: String = row.try_get("role")?;
    let role: Role = role.parse().map_err(StoreError::Corrupt)?;

    let driver_profile = if row.try_get::<bool, _>("has_driver_profile")? {
        Some(DriverProfile {
            license_number: row.try_get("license_number")?,
            vehicle: Vehicle {
                make: row.try_get::<Option<String>, _>("vehicle_make")?.unwrap_or_default(),
                model: row.try_get::<Option<String>, _>("vehicle_model")?.unwrap_or_default(),
                year: row.try_get::<Option<i32>, _>("vehicle_year")?.unwrap_or_default(),
                color: row.try_get::<Option<String>, _>("vehicle_color")?.unwrap_or_default(),
                plate: row.try_get::<Option<String>, _>("vehicle_plate")?.unwrap_or_default(),
                capacity: row.try_get::<Option<i32>, _>("vehicle_capacity")?.unwrap_or(4),
            },
            rating: row
                .try_get::<Option<f64>, _>("rating")?
                .unwrap_or(DriverProfile::DEFAULT_RATING),
            total_trips: row.try_get::<Option<i64>, _>("total_trips")?.unwrap_or(0),
            is_available: row.try_get::<Option<bool>, _>("is_available")?.unwrap_or(true),
        })
    } else {
        None
    };

    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        role,
        driver_profile,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn order_from_row(row: &PgRow) -> StoreResult<Order> {
    let status: String = row.try_get("status")?;

    Ok(Order {
        id: row.try_get("id")?,
        customer_id: row.try_get("customer_id")?,
        driver_id: row.try_get("driver_id")?,
        customer_name: row.try_get("customer_name")?,
        customer_phone: row.try_get("customer_phone")?,
        customer_email: row.try_get("customer_email")?,
        pickup: Location {
            address: row.try_get("pickup_address")?,
            city: row.try_get("pickup_city")?,
            postal_code: row.try_get("pickup_postal_code")?,
            country: row.try_get("pickup_country")?,
        },
        destination: Location {
            address: row.try_get("destination_address")?,
            city: row.try_get("destination_city")?,
            postal_code: row.try_get("destination_postal_code")?,
            country: row.try_get("destination_country")?,
        },
        pickup_at: row.try_get("pickup_at")?,
        flight_number: row.try_get("flight_number")?,
        airline: row.try_get("airline")?,
        passenger_count: row.try_get("passenger_count")?,
        luggage_count: row.try_get("luggage_count")?,
        special_requirements: row.try_get("special_requirements")?,
        notes: row.try_get("notes")?,
        status: parse_status(&status)?,
        estimated_price: row.try_get("estimated_price")?,
        final_price: row.try_get("final_price")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        accepted_at: row.try_get("accepted_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

/// Store backed by PostgreSQL
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a store over an initialised pool (see `common::database`)
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Explain a claim whose guarded `UPDATE` touched no row
    async fn diagnose_failed_claim(&self, order_id: Uuid, driver_id: Uuid) -> StoreResult<ClaimOutcome> {
        let row = sqlx::query("SELECT status, driver_id FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(ClaimOutcome::Missing);
        };
        let status = parse_status(&row.try_get::<String, _>("status")?)?;
        let assigned: Option<Uuid> = row.try_get("driver_id")?;
        if status != OrderStatus::Pending || assigned.is_some() {
            return Ok(ClaimOutcome::Taken(status));
        }

        if self.count_active_orders(driver_id).await? > 0 {
            return Ok(ClaimOutcome::DriverBusy);
        }

        let ready = sqlx::query(
            "SELECT has_driver_profile AND is_available AS ready FROM users WHERE id = $1",
        )
        .bind(driver_id)
        .fetch_optional(&self.pool)
        .await?;
        let ready = match ready {
            Some(row) => row.try_get::<Option<bool>, _>("ready")?.unwrap_or(false),
            None => false,
        };
        if !ready {
            return Ok(ClaimOutcome::DriverUnavailable);
        }

        // Claimable again by now: the guard saw a state that has since changed.
        Err(StoreError::Transient(format!(
            "order {order_id} changed while being claimed"
        )))
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: User) -> StoreResult<User> {
        let profile = user.driver_profile.as_ref();
        let vehicle = profile.map(|p| &p.vehicle);

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (id, email, name, phone, role, has_driver_profile, license_number,
                               vehicle_make, vehicle_model, vehicle_year, vehicle_color,
                               vehicle_plate, vehicle_capacity, rating, total_trips, is_available,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(profile.is_some())
        .bind(profile.and_then(|p| p.license_number.clone()))
        .bind(vehicle.map(|v| v.make.clone()))
        .bind(vehicle.map(|v| v.model.clone()))
        .bind(vehicle.map(|v| v.year))
        .bind(vehicle.map(|v| v.color.clone()))
        .bind(vehicle.map(|v| v.plate.clone()))
        .bind(vehicle.map(|v| v.capacity))
        .bind(profile.map(|p| p.rating))
        .bind(profile.map(|p| p.total_trips))
        .bind(profile.map(|p| p.is_available))
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await?;

        user_from_row(&row)
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn get_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"))
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(user_from_row).collect()
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch, at: DateTime<Utc>) -> StoreResult<User> {
        let vehicle = patch.vehicle.as_ref();

        let row = sqlx::query(&format!(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                phone = COALESCE($3, phone),
                has_driver_profile = has_driver_profile OR $4,
                license_number = CASE WHEN has_driver_profile OR $4
                                      THEN COALESCE($5, license_number)
                                      ELSE license_number END,
                vehicle_make = COALESCE($6, vehicle_make),
                vehicle_model = COALESCE($7, vehicle_model),
                vehicle_year = COALESCE($8, vehicle_year),
                vehicle_color = COALESCE($9, vehicle_color),
                vehicle_plate = COALESCE($10, vehicle_plate),
                vehicle_capacity = COALESCE($11, vehicle_capacity),
                rating = CASE WHEN $4 THEN COALESCE(rating, 5.0) ELSE rating END,
                total_trips = CASE WHEN $4 THEN COALESCE(total_trips, 0) ELSE total_trips END,
                is_available = CASE WHEN $4 THEN COALESCE(is_available, TRUE) ELSE is_available END,
                updated_at = $12
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.phone)
        .bind(vehicle.is_some())
        .bind(&patch.license_number)
        .bind(vehicle.map(|v| v.make.clone()))
        .bind(vehicle.map(|v| v.model.clone()))
        .bind(vehicle.map(|v| v.year))
        .bind(vehicle.map(|v| v.color.clone()))
        .bind(vehicle.map(|v| v.plate.clone()))
        .bind(vehicle.map(|v| v.capacity))
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => user_from_row(&row),
            None => Err(StoreError::NotFound { entity: "user", id }),
        }
    }

    async fn increment_total_trips(&self, driver_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE users SET total_trips = COALESCE(total_trips, 0) + 1 \
             WHERE id = $1 AND has_driver_profile",
        )
        .bind(driver_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "driver profile",
                id: driver_id,
            });
        }
        Ok(())
    }

    async fn set_availability(
        &self,
        driver_id: Uuid,
        is_available: bool,
        at: DateTime<Utc>,
    ) -> StoreResult<AvailabilityOutcome> {
        // The row lock orders this against a concurrent claim, which holds a
        // share lock on the same row for the length of its write.
        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query("SELECT has_driver_profile FROM users WHERE id = $1 FOR UPDATE")
            .bind(driver_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(locked) = locked else {
            return Err(StoreError::NotFound {
                entity: "user",
                id: driver_id,
            });
        };
        if !locked.try_get::<bool, _>("has_driver_profile")? {
            return Ok(AvailabilityOutcome::NoDriverProfile);
        }

        if !is_available {
            let row = sqlx::query(
                "SELECT COUNT(*) AS active FROM orders \
                 WHERE driver_id = $1 AND status IN ('accepted', 'in_progress')",
            )
            .bind(driver_id)
            .fetch_one(&mut *tx)
            .await?;
            if row.try_get::<i64, _>("active")? > 0 {
                return Ok(AvailabilityOutcome::HasActiveOrders);
            }
        }

        let row = sqlx::query(&format!(
            "UPDATE users SET is_available = $2, updated_at = $3 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(driver_id)
        .bind(is_available)
        .bind(at)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(AvailabilityOutcome::Updated(user_from_row(&row)?))
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_order(&self, order: Order) -> StoreResult<Order> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO orders ({ORDER_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order.id)
        .bind(order.customer_id)
        .bind(order.driver_id)
        .bind(&order.customer_name)
        .bind(&order.customer_phone)
        .bind(&order.customer_email)
        .bind(&order.pickup.address)
        .bind(&order.pickup.city)
        .bind(&order.pickup.postal_code)
        .bind(&order.pickup.country)
        .bind(&order.destination.address)
        .bind(&order.destination.city)
        .bind(&order.destination.postal_code)
        .bind(&order.destination.country)
        .bind(order.pickup_at)
        .bind(&order.flight_number)
        .bind(&order.airline)
        .bind(order.passenger_count)
        .bind(order.luggage_count)
        .bind(&order.special_requirements)
        .bind(&order.notes)
        .bind(order.status.as_str())
        .bind(order.estimated_price)
        .bind(order.final_price)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.accepted_at)
        .bind(order.completed_at)
        .fetch_one(&self.pool)
        .await?;

        order_from_row(&row)
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(order_from_row).transpose()
    }

    async fn claim_order(
        &self,
        order_id: Uuid,
        driver_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<ClaimOutcome> {
        let result = sqlx::query(&format!(
            r#"
            WITH ready AS (
                SELECT id FROM users
                WHERE id = $2 AND has_driver_profile AND is_available
                FOR SHARE
            )
            UPDATE orders
            SET driver_id = $2, status = 'accepted', accepted_at = $3, updated_at = $3
            WHERE id = $1
              AND status = 'pending'
              AND driver_id IS NULL
              AND EXISTS (SELECT 1 FROM ready)
              AND NOT EXISTS (
                    SELECT 1 FROM orders busy
                    WHERE busy.driver_id = $2 AND busy.status IN ('accepted', 'in_progress'))
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order_id)
        .bind(driver_id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(row)) => Ok(ClaimOutcome::Claimed(order_from_row(&row)?)),
            Ok(None) => self.diagnose_failed_claim(order_id, driver_id).await,
            Err(err) => match StoreError::from(err) {
                StoreError::DuplicateKey(key) if key == ACTIVE_DRIVER_INDEX => {
                    debug!(%driver_id, "claim rejected by active-order index");
                    Ok(ClaimOutcome::DriverBusy)
                }
                other => Err(other),
            },
        }
    }

    async fn transition_order(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        change: StatusChange,
    ) -> StoreResult<Option<Order>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE orders SET
                status = $3,
                updated_at = $4,
                completed_at = CASE WHEN $3 = 'completed' THEN $4 ELSE completed_at END,
                final_price = CASE WHEN $3 = 'completed' THEN COALESCE($5, final_price)
                                   ELSE final_price END
            WHERE id = $1 AND status = $2
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order_id)
        .bind(expected.as_str())
        .bind(change.to.as_str())
        .bind(change.at)
        .bind(change.final_price)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(order_from_row).transpose()
    }

    async fn find_orders(&self, query: &OrderQuery) -> StoreResult<Vec<Order>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM orders WHERE TRUE"));

        if let Some(customer_id) = query.customer_id {
            qb.push(" AND customer_id = ").push_bind(customer_id);
        }
        if let Some(driver_id) = query.driver_id {
            qb.push(" AND driver_id = ").push_bind(driver_id);
        }
        if let Some(status) = query.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if query.unclaimed {
            qb.push(" AND driver_id IS NULL");
        }
        if let Some(needle) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let escaped = needle
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            let pattern = format!("%{escaped}%");

            qb.push(" AND (");
            for (i, column) in SEARCH_COLUMNS.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                qb.push(*column).push(" ILIKE ").push_bind(pattern.clone());
            }
            qb.push(")");
        }

        let sort_expr = match query.sort.field {
            SortField::CreatedAt => "created_at",
            SortField::PickupAt => "pickup_at",
            SortField::Price => "COALESCE(final_price, estimated_price)",
            SortField::Status => "status",
        };
        let direction = match query.sort.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        qb.push(format!(" ORDER BY {sort_expr} {direction}, id ASC"));

        if let Some(limit) = query.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(order_from_row).collect()
    }

    async fn count_active_orders(&self, driver_id: Uuid) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE driver_id = $1 AND status IN ('accepted', 'in_progress')",
        )
        .bind(driver_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }
}
