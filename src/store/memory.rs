use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{BookingChanges, BookingFilter, BookingGuard, Store};
use crate::entities::{booking, driver, user};
use crate::error::{AppError, AppResult};

/// In-process store. Each table sits behind its own lock, so a guarded
/// update checks and writes a row without anyone else seeing it in between.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, user::Model>>,
    drivers: RwLock<HashMap<Uuid, driver::Model>>,
    bookings: RwLock<HashMap<Uuid, booking::Model>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: user::Model) -> AppResult<user::Model> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.username == user.username) {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<user::Model>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<user::Model>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn list_users(&self) -> AppResult<Vec<user::Model>> {
        let mut users: Vec<_> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn set_user_active(&self, id: Uuid, is_active: bool) -> AppResult<u64> {
        let mut users = self.users.write().await;
        Ok(match users.get_mut(&id) {
            Some(user) => {
                user.is_active = is_active;
                user.updated_at = Utc::now().into();
                1
            }
            None => 0,
        })
    }

    async fn insert_driver(&self, driver: driver::Model) -> AppResult<driver::Model> {
        let mut drivers = self.drivers.write().await;
        if drivers.values().any(|d| d.user_id == driver.user_id) {
            return Err(AppError::Conflict(
                "User already has a driver profile".to_string(),
            ));
        }
        drivers.insert(driver.id, driver.clone());
        Ok(driver)
    }

    async fn insert_driver_account(
        &self,
        user: user::Model,
        driver: driver::Model,
    ) -> AppResult<(user::Model, driver::Model)> {
        // Both locks are held so the pair lands together or not at all.
        let mut users = self.users.write().await;
        let mut drivers = self.drivers.write().await;
        if users.values().any(|u| u.username == user.username) {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }
        if drivers.values().any(|d| d.user_id == driver.user_id) {
            return Err(AppError::Conflict(
                "User already has a driver profile".to_string(),
            ));
        }
        users.insert(user.id, user.clone());
        drivers.insert(driver.id, driver.clone());
        Ok((user, driver))
    }

    async fn find_driver(&self, id: Uuid) -> AppResult<Option<driver::Model>> {
        Ok(self.drivers.read().await.get(&id).cloned())
    }

    async fn find_driver_by_user(&self, user_id: Uuid) -> AppResult<Option<driver::Model>> {
        Ok(self
            .drivers
            .read()
            .await
            .values()
            .find(|d| d.user_id == user_id)
            .cloned())
    }

    async fn list_drivers(&self) -> AppResult<Vec<driver::Model>> {
        let mut drivers: Vec<_> = self.drivers.read().await.values().cloned().collect();
        drivers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(drivers)
    }

    async fn set_driver_rating(&self, id: Uuid, rating: f64) -> AppResult<u64> {
        let mut drivers = self.drivers.write().await;
        Ok(match drivers.get_mut(&id) {
            Some(driver) => {
                driver.rating = rating;
                1
            }
            None => 0,
        })
    }

    async fn set_driver_availability(&self, id: Uuid, is_available: bool) -> AppResult<u64> {
        let mut drivers = self.drivers.write().await;
        Ok(match drivers.get_mut(&id) {
            Some(driver) => {
                driver.is_available = is_available;
                1
            }
            None => 0,
        })
    }

    async fn insert_booking(&self, booking: booking::Model) -> AppResult<booking::Model> {
        self.bookings
            .write()
            .await
            .insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn find_booking(&self, id: Uuid) -> AppResult<Option<booking::Model>> {
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> AppResult<Vec<booking::Model>> {
        let mut bookings: Vec<_> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn update_booking(
        &self,
        id: Uuid,
        changes: &BookingChanges,
        guard: &BookingGuard,
    ) -> AppResult<u64> {
        let mut bookings = self.bookings.write().await;
        Ok(match bookings.get_mut(&id) {
            Some(booking) if guard.matches(booking) => {
                changes.apply(booking, Utc::now());
                1
            }
            _ => 0,
        })
    }

    async fn delete_booking(&self, id: Uuid, guard: &BookingGuard) -> AppResult<u64> {
        let mut bookings = self.bookings.write().await;
        let matched = bookings.get(&id).is_some_and(|b| guard.matches(b));
        if matched {
            bookings.remove(&id);
            return Ok(1);
        }
        Ok(0)
    }
}
