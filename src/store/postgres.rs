use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;

use super::{BookingChanges, BookingFilter, BookingGuard, DriverGuard, Store};
use crate::entities::{booking, driver, user};
use crate::error::{AppError, AppResult};

/// sea-orm backed store. Guarded writes are single `UPDATE`/`DELETE`
/// statements whose `WHERE` clause carries the guard.
#[derive(Clone)]
pub struct DbStore {
    db: DatabaseConnection,
}

impl DbStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

const USERNAME_TAKEN: &str = "Username already taken";
const PROFILE_EXISTS: &str = "User already has a driver profile";

fn unique_conflict(sql_err: Option<SqlErr>, message: &str) -> Option<AppError> {
    match sql_err {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            tracing::debug!(%detail, "Insert rejected by unique constraint");
            Some(AppError::Conflict(message.to_string()))
        }
        _ => None,
    }
}

/// Unique violations on insert are conflicts, not outages.
fn insert_error(err: DbErr, message: &str) -> AppError {
    unique_conflict(err.sql_err(), message).unwrap_or_else(|| err.into())
}

fn user_row(user: user::Model) -> user::ActiveModel {
    user::ActiveModel {
        id: Set(user.id),
        username: Set(user.username),
        email: Set(user.email),
        password_hash: Set(user.password_hash),
        phone: Set(user.phone),
        role: Set(user.role),
        full_name: Set(user.full_name),
        is_active: Set(user.is_active),
        created_at: Set(user.created_at),
        updated_at: Set(user.updated_at),
    }
}

fn driver_row(driver: driver::Model) -> driver::ActiveModel {
    driver::ActiveModel {
        id: Set(driver.id),
        user_id: Set(driver.user_id),
        license_number: Set(driver.license_number),
        license_expiry: Set(driver.license_expiry),
        experience_years: Set(driver.experience_years),
        rating: Set(driver.rating),
        is_available: Set(driver.is_available),
        created_at: Set(driver.created_at),
    }
}

fn guarded<Q: QueryFilter>(query: Q, id: Uuid, guard: &BookingGuard) -> Q {
    let mut query = query
        .filter(booking::Column::Id.eq(id))
        .filter(booking::Column::Status.is_in(guard.statuses.clone()));

    query = match guard.driver {
        DriverGuard::Any => query,
        DriverGuard::Unassigned => query.filter(booking::Column::DriverId.is_null()),
        DriverGuard::AssignedTo(driver_id) => {
            query.filter(booking::Column::DriverId.eq(driver_id))
        }
    };

    if guard.unrated {
        query = query.filter(booking::Column::Rating.is_null());
    }

    query
}

#[async_trait]
impl Store for DbStore {
    async fn insert_user(&self, user: user::Model) -> AppResult<user::Model> {
        user_row(user)
            .insert(&self.db)
            .await
            .map_err(|e| insert_error(e, USERNAME_TAKEN))
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<user::Model>> {
        Ok(user::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<user::Model>> {
        Ok(user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(&self.db)
            .await?)
    }

    async fn list_users(&self) -> AppResult<Vec<user::Model>> {
        Ok(user::Entity::find()
            .order_by_desc(user::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    async fn set_user_active(&self, id: Uuid, is_active: bool) -> AppResult<u64> {
        let active = user::ActiveModel {
            is_active: Set(is_active),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        };
        let result = user::Entity::update_many()
            .set(active)
            .filter(user::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn insert_driver(&self, driver: driver::Model) -> AppResult<driver::Model> {
        driver_row(driver)
            .insert(&self.db)
            .await
            .map_err(|e| insert_error(e, PROFILE_EXISTS))
    }

    async fn insert_driver_account(
        &self,
        user: user::Model,
        driver: driver::Model,
    ) -> AppResult<(user::Model, driver::Model)> {
        let txn = self.db.begin().await?;
        let user = user_row(user)
            .insert(&txn)
            .await
            .map_err(|e| insert_error(e, USERNAME_TAKEN))?;
        let driver = driver_row(driver)
            .insert(&txn)
            .await
            .map_err(|e| insert_error(e, PROFILE_EXISTS))?;
        txn.commit().await?;
        Ok((user, driver))
    }

    async fn find_driver(&self, id: Uuid) -> AppResult<Option<driver::Model>> {
        Ok(driver::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn find_driver_by_user(&self, user_id: Uuid) -> AppResult<Option<driver::Model>> {
        Ok(driver::Entity::find()
            .filter(driver::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?)
    }

    async fn list_drivers(&self) -> AppResult<Vec<driver::Model>> {
        Ok(driver::Entity::find()
            .order_by_desc(driver::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    async fn set_driver_rating(&self, id: Uuid, rating: f64) -> AppResult<u64> {
        let active = driver::ActiveModel {
            rating: Set(rating),
            ..Default::default()
        };
        let result = driver::Entity::update_many()
            .set(active)
            .filter(driver::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn set_driver_availability(&self, id: Uuid, is_available: bool) -> AppResult<u64> {
        let active = driver::ActiveModel {
            is_available: Set(is_available),
            ..Default::default()
        };
        let result = driver::Entity::update_many()
            .set(active)
            .filter(driver::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn insert_booking(&self, booking: booking::Model) -> AppResult<booking::Model> {
        let active = booking::ActiveModel {
            id: Set(booking.id),
            customer_id: Set(booking.customer_id),
            driver_id: Set(booking.driver_id),
            pickup_location: Set(booking.pickup_location),
            dropoff_location: Set(booking.dropoff_location),
            pickup_datetime: Set(booking.pickup_datetime),
            service_type: Set(booking.service_type),
            vehicle_type: Set(booking.vehicle_type),
            status: Set(booking.status),
            distance_km: Set(booking.distance_km),
            duration_hours: Set(booking.duration_hours),
            estimated_fare: Set(booking.estimated_fare),
            actual_fare: Set(booking.actual_fare),
            special_instructions: Set(booking.special_instructions),
            rating: Set(booking.rating),
            feedback: Set(booking.feedback),
            created_at: Set(booking.created_at),
            updated_at: Set(booking.updated_at),
        };
        Ok(active.insert(&self.db).await?)
    }

    async fn find_booking(&self, id: Uuid) -> AppResult<Option<booking::Model>> {
        Ok(booking::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> AppResult<Vec<booking::Model>> {
        let mut query = booking::Entity::find();

        if let Some(customer_id) = filter.customer_id {
            query = query.filter(booking::Column::CustomerId.eq(customer_id));
        }
        if let Some(driver_id) = filter.driver_id {
            query = query.filter(booking::Column::DriverId.eq(driver_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(booking::Column::Status.eq(status));
        }
        if filter.unassigned {
            query = query.filter(booking::Column::DriverId.is_null());
        }

        Ok(query
            .order_by_desc(booking::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    async fn update_booking(
        &self,
        id: Uuid,
        changes: &BookingChanges,
        guard: &BookingGuard,
    ) -> AppResult<u64> {
        let mut active = booking::ActiveModel {
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        };
        if let Some(status) = changes.status {
            active.status = Set(status);
        }
        if let Some(driver_id) = changes.driver_id {
            active.driver_id = Set(driver_id);
        }
        if let Some(fare) = changes.actual_fare {
            active.actual_fare = Set(Some(fare));
        }
        if let Some(rating) = changes.rating {
            active.rating = Set(Some(rating));
        }
        if let Some(feedback) = &changes.feedback {
            active.feedback = Set(Some(feedback.clone()));
        }

        let result = guarded(booking::Entity::update_many().set(active), id, guard)
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn delete_booking(&self, id: Uuid, guard: &BookingGuard) -> AppResult<u64> {
        let result = guarded(booking::Entity::delete_many(), id, guard)
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}
