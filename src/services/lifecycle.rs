//! Booking lifecycle.
//!
//! Every transition follows the same shape: load the booking, check who is
//! asking, check the state-machine guard, then issue a guarded write whose
//! `WHERE` clause repeats the guard. A write that touches zero rows means
//! someone else moved the booking in between, and the caller gets an error
//! describing the state it actually found.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::distance::DistanceProvider;
use super::fare::{self, FareBreakdown};
use super::notifier::{NotificationEvent, Notifier};
use super::rating::{self, RatingSummary};
use super::state_machine::{ensure_transition, invalid_transition, BookingAction};
use super::Actor;
use crate::entities::booking::{self, BookingStatus, ServiceType, VehicleType};
use crate::entities::driver;
use crate::entities::user::UserRole;
use crate::error::{AppError, AppResult};
use crate::store::{BookingChanges, BookingFilter, BookingGuard, Store};

#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub pickup_location: String,
    pub dropoff_location: String,
    pub pickup_datetime: DateTime<Utc>,
    pub service_type: ServiceType,
    pub vehicle_type: VehicleType,
    /// Required for hourly service.
    pub duration_hours: Option<f64>,
    /// Skips the distance provider when the caller already knows the distance.
    pub distance_km: Option<f64>,
    pub special_instructions: Option<String>,
}

#[derive(Clone)]
pub struct BookingManager {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    distance: Arc<dyn DistanceProvider>,
}

impl BookingManager {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        distance: Arc<dyn DistanceProvider>,
    ) -> Self {
        Self {
            store,
            notifier,
            distance,
        }
    }

    /// Price a trip without booking it.
    pub fn quote(
        &self,
        pickup: &str,
        dropoff: &str,
        vehicle: VehicleType,
        service: ServiceType,
        duration_hours: Option<f64>,
        distance_km: Option<f64>,
    ) -> AppResult<(f64, FareBreakdown)> {
        let distance_km = self.resolve_distance(pickup, dropoff, distance_km)?;
        Ok((
            distance_km,
            fare::estimate(distance_km, vehicle, service, duration_hours),
        ))
    }

    /// Quote from free-text vehicle and service labels. Unknown labels are
    /// priced at sedan rates with no service uplift.
    pub fn quote_labels(
        &self,
        pickup: &str,
        dropoff: &str,
        vehicle: &str,
        service: &str,
        duration_hours: Option<f64>,
        distance_km: Option<f64>,
    ) -> AppResult<(f64, FareBreakdown)> {
        let distance_km = self.resolve_distance(pickup, dropoff, distance_km)?;
        Ok((
            distance_km,
            fare::estimate_from_labels(distance_km, vehicle, service, duration_hours),
        ))
    }

    /// Create a pending booking priced by the fare estimator.
    pub async fn create(&self, actor: &Actor, request: NewBooking) -> AppResult<booking::Model> {
        actor.require(UserRole::Customer)?;

        let pickup = request.pickup_location.trim();
        let dropoff = request.dropoff_location.trim();
        if pickup.is_empty() {
            return Err(AppError::Validation("Please enter pickup location".to_string()));
        }
        if dropoff.is_empty() {
            return Err(AppError::Validation("Please enter dropoff location".to_string()));
        }

        let now = Utc::now();
        if request.pickup_datetime < now {
            return Err(AppError::Validation(
                "Pickup time must be in the future".to_string(),
            ));
        }

        if let Some(hours) = request.duration_hours {
            if !hours.is_finite() || hours <= 0.0 {
                return Err(AppError::Validation(
                    "Duration must be a positive number of hours".to_string(),
                ));
            }
        }
        if request.service_type == ServiceType::Hourly && request.duration_hours.is_none() {
            return Err(AppError::Validation(
                "Hourly bookings need a duration".to_string(),
            ));
        }

        let (distance_km, breakdown) = self.quote(
            pickup,
            dropoff,
            request.vehicle_type,
            request.service_type,
            request.duration_hours,
            request.distance_km,
        )?;

        let special_instructions = request
            .special_instructions
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let booking = booking::Model {
            id: Uuid::new_v4(),
            customer_id: actor.user_id,
            driver_id: None,
            pickup_location: pickup.to_string(),
            dropoff_location: dropoff.to_string(),
            pickup_datetime: request.pickup_datetime.into(),
            service_type: request.service_type,
            vehicle_type: request.vehicle_type,
            status: BookingStatus::Pending,
            distance_km,
            duration_hours: request.duration_hours,
            estimated_fare: breakdown.total_fare,
            actual_fare: None,
            special_instructions,
            rating: None,
            feedback: None,
            created_at: now.into(),
            updated_at: now.into(),
        };

        let booking = self.store.insert_booking(booking).await?;
        tracing::info!(
            booking_id = %booking.id,
            customer_id = %booking.customer_id,
            fare = booking.estimated_fare,
            "Booking created"
        );

        self.notify(NotificationEvent::BookingCreated, booking.customer_id, &booking);
        Ok(booking)
    }

    /// A booking as seen by `actor`: its customer, its driver, any driver
    /// while it sits in the open queue, or an admin.
    pub async fn get(&self, actor: &Actor, booking_id: Uuid) -> AppResult<booking::Model> {
        let booking = self.load(booking_id).await?;

        let visible = match actor.role {
            UserRole::Admin => true,
            UserRole::Customer => booking.customer_id == actor.user_id,
            UserRole::Driver => {
                let driver = self.driver_profile(actor).await?;
                booking.driver_id == Some(driver.id)
                    || (booking.status == BookingStatus::Pending && booking.driver_id.is_none())
            }
        };

        if !visible {
            return Err(AppError::Forbidden(
                "You do not have access to this booking".to_string(),
            ));
        }
        Ok(booking)
    }

    /// Driver takes a pending, unassigned request. Exactly one of several
    /// concurrent accepts wins; the others get `Conflict`.
    pub async fn accept(&self, actor: &Actor, booking_id: Uuid) -> AppResult<booking::Model> {
        let driver = self.driver_profile(actor).await?;
        let booking = self.load(booking_id).await?;

        // Confirmed means another driver got there first
        if booking.status == BookingStatus::Confirmed {
            return Err(no_longer_available(booking_id));
        }
        if !BookingAction::Accept.is_allowed_from(booking.status) {
            return Err(invalid_transition(&booking, BookingAction::Accept));
        }
        if booking.driver_id.is_some() {
            return Err(no_longer_available(booking_id));
        }

        let changes = BookingChanges::assign(BookingAction::Accept.target(), driver.id);
        let affected = self
            .store
            .update_booking(booking_id, &changes, &BookingGuard::for_action(BookingAction::Accept))
            .await?;

        if affected == 0 {
            tracing::warn!(%booking_id, driver_id = %driver.id, "Lost accept race");
            return Err(no_longer_available(booking_id));
        }

        let booking = self.load(booking_id).await?;
        tracing::info!(%booking_id, driver_id = %driver.id, "Booking accepted");
        self.notify(NotificationEvent::BookingConfirmed, booking.customer_id, &booking);
        Ok(booking)
    }

    /// Assigned driver starts the ride.
    pub async fn start(&self, actor: &Actor, booking_id: Uuid) -> AppResult<booking::Model> {
        let driver = self.driver_profile(actor).await?;
        let booking = self.load(booking_id).await?;

        if booking.driver_id != Some(driver.id) {
            return Err(invalid_transition(&booking, BookingAction::Start));
        }
        let next = ensure_transition(&booking, BookingAction::Start)?;

        let guard = BookingGuard::for_action(BookingAction::Start).assigned_to(driver.id);
        let booking = self
            .apply(&booking, BookingAction::Start, BookingChanges::status(next), guard)
            .await?;

        tracing::info!(%booking_id, driver_id = %driver.id, "Ride started");
        self.notify(NotificationEvent::RideStarted, booking.customer_id, &booking);
        Ok(booking)
    }

    /// Close a confirmed or running ride. Drivers may only complete their own
    /// rides, customers only their own bookings. The actual fare defaults to
    /// the estimate.
    pub async fn complete(
        &self,
        actor: &Actor,
        booking_id: Uuid,
        actual_fare: Option<f64>,
    ) -> AppResult<booking::Model> {
        let booking = self.load(booking_id).await?;

        let guard = match actor.role {
            UserRole::Driver => {
                let driver = self.driver_profile(actor).await?;
                if booking.driver_id != Some(driver.id) {
                    return Err(AppError::Forbidden(
                        "You are not assigned to this booking".to_string(),
                    ));
                }
                BookingGuard::for_action(BookingAction::Complete).assigned_to(driver.id)
            }
            UserRole::Customer => {
                self.ensure_owner(actor, &booking)?;
                BookingGuard::for_action(BookingAction::Complete)
            }
            UserRole::Admin => {
                return Err(AppError::Forbidden(
                    "Only the driver or the customer can complete a ride".to_string(),
                ));
            }
        };

        if let Some(fare) = actual_fare {
            if !fare.is_finite() || fare < 0.0 {
                return Err(AppError::Validation(
                    "Actual fare must be a non-negative amount".to_string(),
                ));
            }
        }

        let next = ensure_transition(&booking, BookingAction::Complete)?;
        let changes = BookingChanges {
            status: Some(next),
            actual_fare: Some(fare::round_money(
                actual_fare.unwrap_or(booking.estimated_fare),
            )),
            ..Default::default()
        };
        let booking = self
            .apply(&booking, BookingAction::Complete, changes, guard)
            .await?;

        tracing::info!(%booking_id, fare = ?booking.actual_fare, "Ride completed");
        self.notify(NotificationEvent::RideCompleted, booking.customer_id, &booking);
        Ok(booking)
    }

    /// Customer cancels before the ride starts.
    pub async fn cancel(&self, actor: &Actor, booking_id: Uuid) -> AppResult<booking::Model> {
        let booking = self.load(booking_id).await?;
        self.ensure_owner(actor, &booking)?;

        let next = ensure_transition(&booking, BookingAction::Cancel)?;
        let assigned = booking.driver_id;
        let booking = self
            .apply(
                &booking,
                BookingAction::Cancel,
                BookingChanges::status(next),
                BookingGuard::for_action(BookingAction::Cancel),
            )
            .await?;

        tracing::info!(%booking_id, "Booking cancelled");
        if let Some(driver_id) = assigned {
            if let Some(driver) = self.store.find_driver(driver_id).await? {
                self.notify(NotificationEvent::BookingCancelled, driver.user_id, &booking);
            }
        }
        Ok(booking)
    }

    /// Driver passes on a pending request. The booking is deleted, not cancelled.
    pub async fn skip(&self, actor: &Actor, booking_id: Uuid) -> AppResult<()> {
        self.driver_profile(actor).await?;
        self.remove_unassigned(booking_id).await?;
        tracing::info!(%booking_id, driver = %actor.user_id, "Pending request skipped");
        Ok(())
    }

    /// Administrative removal of a pending booking nobody has taken.
    pub async fn admin_delete(&self, actor: &Actor, booking_id: Uuid) -> AppResult<()> {
        actor.require(UserRole::Admin)?;
        self.remove_unassigned(booking_id).await?;
        tracing::info!(%booking_id, "Pending booking deleted by admin");
        Ok(())
    }

    /// Customer rates a completed ride, once. The driver's stored rating is
    /// refreshed from all of their rated rides.
    pub async fn rate(
        &self,
        actor: &Actor,
        booking_id: Uuid,
        rating: i32,
        feedback: Option<String>,
    ) -> AppResult<(booking::Model, RatingSummary)> {
        if !(1..=5).contains(&rating) {
            return Err(AppError::Validation(
                "Rating must be between 1 and 5".to_string(),
            ));
        }

        let booking = self.load(booking_id).await?;
        self.ensure_owner(actor, &booking)?;
        ensure_transition(&booking, BookingAction::Rate)?;

        let changes = BookingChanges {
            rating: Some(rating),
            feedback: feedback.map(|f| f.trim().to_string()).filter(|f| !f.is_empty()),
            ..Default::default()
        };
        let booking = self
            .apply(
                &booking,
                BookingAction::Rate,
                changes,
                BookingGuard::for_action(BookingAction::Rate),
            )
            .await?;

        let Some(driver_id) = booking.driver_id else {
            return Err(AppError::Internal(format!(
                "Completed booking {booking_id} has no driver"
            )));
        };
        let summary = rating::refresh_driver_rating(self.store.as_ref(), driver_id).await?;

        tracing::info!(%booking_id, %driver_id, rating, "Ride rated");
        if let Some(driver) = self.store.find_driver(driver_id).await? {
            self.notify(NotificationEvent::RatingReceived, driver.user_id, &booking);
        }
        Ok((booking, summary))
    }

    pub async fn customer_bookings(&self, actor: &Actor) -> AppResult<Vec<booking::Model>> {
        actor.require(UserRole::Customer)?;
        self.store
            .list_bookings(&BookingFilter::customer(actor.user_id))
            .await
    }

    pub async fn driver_bookings(&self, actor: &Actor) -> AppResult<Vec<booking::Model>> {
        let driver = self.driver_profile(actor).await?;
        self.store
            .list_bookings(&BookingFilter::driver(driver.id))
            .await
    }

    /// The accept queue: pending bookings without a driver.
    pub async fn open_requests(&self, actor: &Actor) -> AppResult<Vec<booking::Model>> {
        self.driver_profile(actor).await?;
        self.store.list_bookings(&BookingFilter::open_requests()).await
    }

    pub async fn all_bookings(&self, actor: &Actor) -> AppResult<Vec<booking::Model>> {
        actor.require(UserRole::Admin)?;
        self.store.list_bookings(&BookingFilter::all()).await
    }

    /// The driver profile belonging to `actor`.
    pub async fn driver_profile(&self, actor: &Actor) -> AppResult<driver::Model> {
        actor.require(UserRole::Driver)?;
        self.store
            .find_driver_by_user(actor.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Driver profile not found".to_string()))
    }

    pub async fn set_availability(
        &self,
        actor: &Actor,
        is_available: bool,
    ) -> AppResult<driver::Model> {
        let driver = self.driver_profile(actor).await?;
        self.store
            .set_driver_availability(driver.id, is_available)
            .await?;
        tracing::info!(driver_id = %driver.id, is_available, "Driver availability updated");
        Ok(driver::Model {
            is_available,
            ..driver
        })
    }

    async fn load(&self, booking_id: Uuid) -> AppResult<booking::Model> {
        self.store
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking {booking_id} not found")))
    }

    fn ensure_owner(&self, actor: &Actor, booking: &booking::Model) -> AppResult<()> {
        actor.require(UserRole::Customer)?;
        if booking.customer_id != actor.user_id {
            return Err(AppError::Forbidden(
                "You can only manage your own bookings".to_string(),
            ));
        }
        Ok(())
    }

    async fn remove_unassigned(&self, booking_id: Uuid) -> AppResult<()> {
        let booking = self.load(booking_id).await?;
        ensure_transition(&booking, BookingAction::Skip)?;

        let affected = self
            .store
            .delete_booking(booking_id, &BookingGuard::for_action(BookingAction::Skip))
            .await?;
        if affected == 0 {
            let current = self.load(booking_id).await?;
            return Err(invalid_transition(&current, BookingAction::Skip));
        }
        Ok(())
    }

    async fn apply(
        &self,
        booking: &booking::Model,
        action: BookingAction,
        changes: BookingChanges,
        guard: BookingGuard,
    ) -> AppResult<booking::Model> {
        let affected = self
            .store
            .update_booking(booking.id, &changes, &guard)
            .await?;

        if affected == 0 {
            let current = self.load(booking.id).await?;
            tracing::warn!(
                booking_id = %booking.id,
                %action,
                status = %current.status,
                "Guarded update matched no rows"
            );
            return Err(invalid_transition(&current, action));
        }

        self.load(booking.id).await
    }

    fn resolve_distance(
        &self,
        pickup: &str,
        dropoff: &str,
        distance_km: Option<f64>,
    ) -> AppResult<f64> {
        match distance_km {
            Some(km) if km.is_finite() && km > 0.0 => Ok(km),
            Some(_) => Err(AppError::Validation(
                "Distance must be a positive number of kilometres".to_string(),
            )),
            None => Ok(self.distance.estimate_km(pickup, dropoff)),
        }
    }

    fn notify(&self, event: NotificationEvent, recipient: Uuid, booking: &booking::Model) {
        self.notifier.notify(
            event,
            recipient,
            json!({
                "booking_id": booking.id,
                "status": booking.status,
                "pickup_location": booking.pickup_location,
                "dropoff_location": booking.dropoff_location,
                "pickup_datetime": booking.pickup_datetime,
                "estimated_fare": booking.estimated_fare,
                "actual_fare": booking.actual_fare,
            }),
        );
    }
}

fn no_longer_available(booking_id: Uuid) -> AppError {
    AppError::Conflict(format!("Booking {booking_id} is no longer available"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::distance::FixedDistance;
    use crate::services::notifier::testing::RecordingNotifier;
    use crate::entities::user;
    use crate::store::MemoryStore;
    use chrono::{Duration, NaiveDate};

    struct Fixture {
        store: Arc<MemoryStore>,
        notifier: Arc<RecordingNotifier>,
        manager: BookingManager,
        customer: Actor,
        driver: Actor,
        driver_id: Uuid,
    }

    async fn add_driver(store: &MemoryStore) -> (Actor, Uuid) {
        let user_id = Uuid::new_v4();
        let profile = store
            .insert_driver(driver::Model {
                id: Uuid::new_v4(),
                user_id,
                license_number: format!("DL-{user_id}"),
                license_expiry: NaiveDate::from_ymd_opt(2030, 12, 31).unwrap(),
                experience_years: 5,
                rating: driver::DEFAULT_RATING,
                is_available: true,
                created_at: Utc::now().into(),
            })
            .await
            .unwrap();
        (Actor::new(user_id, UserRole::Driver), profile.id)
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let manager = BookingManager::new(
            store.clone(),
            notifier.clone(),
            Arc::new(FixedDistance(10.0)),
        );
        let (driver, driver_id) = add_driver(&store).await;

        Fixture {
            store,
            notifier,
            manager,
            customer: Actor::new(Uuid::new_v4(), UserRole::Customer),
            driver,
            driver_id,
        }
    }

    /// Lets a rival driver's accept land just before the next guarded
    /// booking update, after the caller has already read the row.
    struct InterleavingStore {
        inner: Arc<MemoryStore>,
        rival: tokio::sync::Mutex<Option<(Uuid, Uuid)>>,
        landed: tokio::sync::Mutex<bool>,
    }

    impl InterleavingStore {
        fn new(inner: Arc<MemoryStore>) -> Self {
            Self {
                inner,
                rival: tokio::sync::Mutex::new(None),
                landed: tokio::sync::Mutex::new(false),
            }
        }

        async fn accept_first(&self, booking_id: Uuid, rival_driver: Uuid) {
            *self.rival.lock().await = Some((booking_id, rival_driver));
        }

        async fn rival_landed(&self) -> bool {
            *self.landed.lock().await
        }
    }

    #[async_trait::async_trait]
    impl Store for InterleavingStore {
        async fn insert_user(&self, user: user::Model) -> AppResult<user::Model> {
            self.inner.insert_user(user).await
        }
        async fn find_user(&self, id: Uuid) -> AppResult<Option<user::Model>> {
            self.inner.find_user(id).await
        }
        async fn find_user_by_username(&self, username: &str) -> AppResult<Option<user::Model>> {
            self.inner.find_user_by_username(username).await
        }
        async fn list_users(&self) -> AppResult<Vec<user::Model>> {
            self.inner.list_users().await
        }
        async fn set_user_active(&self, id: Uuid, is_active: bool) -> AppResult<u64> {
            self.inner.set_user_active(id, is_active).await
        }
        async fn insert_driver(&self, driver: driver::Model) -> AppResult<driver::Model> {
            self.inner.insert_driver(driver).await
        }
        async fn insert_driver_account(
            &self,
            user: user::Model,
            driver: driver::Model,
        ) -> AppResult<(user::Model, driver::Model)> {
            self.inner.insert_driver_account(user, driver).await
        }
        async fn find_driver(&self, id: Uuid) -> AppResult<Option<driver::Model>> {
            self.inner.find_driver(id).await
        }
        async fn find_driver_by_user(&self, user_id: Uuid) -> AppResult<Option<driver::Model>> {
            self.inner.find_driver_by_user(user_id).await
        }
        async fn list_drivers(&self) -> AppResult<Vec<driver::Model>> {
            self.inner.list_drivers().await
        }
        async fn set_driver_rating(&self, id: Uuid, rating: f64) -> AppResult<u64> {
            self.inner.set_driver_rating(id, rating).await
        }
        async fn set_driver_availability(&self, id: Uuid, is_available: bool) -> AppResult<u64> {
            self.inner.set_driver_availability(id, is_available).await
        }
        async fn insert_booking(&self, booking: booking::Model) -> AppResult<booking::Model> {
            self.inner.insert_booking(booking).await
        }
        async fn find_booking(&self, id: Uuid) -> AppResult<Option<booking::Model>> {
            self.inner.find_booking(id).await
        }
        async fn list_bookings(&self, filter: &BookingFilter) -> AppResult<Vec<booking::Model>> {
            self.inner.list_bookings(filter).await
        }
        async fn update_booking(
            &self,
            id: Uuid,
            changes: &BookingChanges,
            guard: &BookingGuard,
        ) -> AppResult<u64> {
            let rival = self.rival.lock().await.take();
            if let Some((booking_id, rival_driver)) = rival.filter(|(b, _)| *b == id) {
                let won = self
                    .inner
                    .update_booking(
                        booking_id,
                        &BookingChanges::assign(BookingStatus::Confirmed, rival_driver),
                        &BookingGuard::for_action(BookingAction::Accept),
                    )
                    .await?;
                *self.landed.lock().await = won == 1;
            }
            self.inner.update_booking(id, changes, guard).await
        }
        async fn delete_booking(&self, id: Uuid, guard: &BookingGuard) -> AppResult<u64> {
            self.inner.delete_booking(id, guard).await
        }
    }

    fn airport_run() -> NewBooking {
        NewBooking {
            pickup_location: "Terminal 2".to_string(),
            dropoff_location: "Hotel Lotus".to_string(),
            pickup_datetime: Utc::now() + Duration::days(1),
            service_type: ServiceType::AirportTransfer,
            vehicle_type: VehicleType::Sedan,
            duration_hours: None,
            distance_km: None,
            special_instructions: Some("  ".to_string()),
        }
    }

    async fn completed_booking(f: &Fixture) -> booking::Model {
        let booking = f.manager.create(&f.customer, airport_run()).await.unwrap();
        f.manager.accept(&f.driver, booking.id).await.unwrap();
        f.manager.start(&f.driver, booking.id).await.unwrap();
        f.manager.complete(&f.driver, booking.id, None).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_prices_and_leaves_pending() {
        let f = fixture().await;
        let booking = f.manager.create(&f.customer, airport_run()).await.unwrap();

        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.driver_id, None);
        assert_eq!(booking.distance_km, 10.0);
        assert_eq!(booking.estimated_fare, 204.0);
        assert_eq!(booking.special_instructions, None);
        assert_eq!(
            f.notifier.events(),
            vec![(NotificationEvent::BookingCreated, f.customer.user_id)]
        );
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input() {
        let f = fixture().await;

        let mut empty = airport_run();
        empty.dropoff_location = "   ".to_string();
        assert!(matches!(
            f.manager.create(&f.customer, empty).await,
            Err(AppError::Validation(_))
        ));

        let mut past = airport_run();
        past.pickup_datetime = Utc::now() - Duration::hours(1);
        assert!(matches!(
            f.manager.create(&f.customer, past).await,
            Err(AppError::Validation(_))
        ));

        let mut hourly = airport_run();
        hourly.service_type = ServiceType::Hourly;
        assert!(matches!(
            f.manager.create(&f.customer, hourly).await,
            Err(AppError::Validation(_))
        ));

        assert!(matches!(
            f.manager.create(&f.driver, airport_run()).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_hourly_booking_priced_on_duration() {
        let f = fixture().await;
        let mut request = airport_run();
        request.service_type = ServiceType::Hourly;
        request.duration_hours = Some(4.0);
        request.distance_km = Some(80.0);

        let booking = f.manager.create(&f.customer, request).await.unwrap();
        assert_eq!(booking.estimated_fare, 200.0);
        assert_eq!(booking.distance_km, 80.0);
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let f = fixture().await;
        let booking = f.manager.create(&f.customer, airport_run()).await.unwrap();

        let accepted = f.manager.accept(&f.driver, booking.id).await.unwrap();
        assert_eq!(accepted.status, BookingStatus::Confirmed);
        assert_eq!(accepted.driver_id, Some(f.driver_id));

        let started = f.manager.start(&f.driver, booking.id).await.unwrap();
        assert_eq!(started.status, BookingStatus::InProgress);

        let completed = f.manager.complete(&f.driver, booking.id, None).await.unwrap();
        assert_eq!(completed.status, BookingStatus::Completed);
        assert_eq!(completed.actual_fare, Some(204.0));
        assert_eq!(completed.estimated_fare, 204.0);

        let events: Vec<_> = f.notifier.events().into_iter().map(|(e, _)| e).collect();
        assert_eq!(
            events,
            vec![
                NotificationEvent::BookingCreated,
                NotificationEvent::BookingConfirmed,
                NotificationEvent::RideStarted,
                NotificationEvent::RideCompleted,
            ]
        );
    }

    #[tokio::test]
    async fn test_second_accept_conflicts() {
        let f = fixture().await;
        let (rival, _) = add_driver(&f.store).await;
        let booking = f.manager.create(&f.customer, airport_run()).await.unwrap();

        f.manager.accept(&f.driver, booking.id).await.unwrap();
        let err = f.manager.accept(&rival, booking.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let stored = f.store.find_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.driver_id, Some(f.driver_id));
    }

    #[tokio::test]
    async fn test_concurrent_accepts_have_one_winner() {
        let f = fixture().await;
        let (rival, rival_id) = add_driver(&f.store).await;
        let booking = f.manager.create(&f.customer, airport_run()).await.unwrap();

        let (a, b) = tokio::join!(
            f.manager.accept(&f.driver, booking.id),
            f.manager.accept(&rival, booking.id)
        );

        let winners = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(winners, 1);
        let loser = if a.is_ok() { b.unwrap_err() } else { a.unwrap_err() };
        assert!(matches!(loser, AppError::Conflict(_)));

        let stored = f.store.find_booking(booking.id).await.unwrap().unwrap();
        assert!(stored.driver_id == Some(f.driver_id) || stored.driver_id == Some(rival_id));
        assert_eq!(stored.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_accept_lost_between_read_and_write_conflicts() {
        let inner = Arc::new(MemoryStore::new());
        let (driver, _) = add_driver(&inner).await;
        let (_, rival_id) = add_driver(&inner).await;
        let store = Arc::new(InterleavingStore::new(inner.clone()));
        let manager = BookingManager::new(
            store.clone(),
            Arc::new(RecordingNotifier::default()),
            Arc::new(FixedDistance(10.0)),
        );
        let customer = Actor::new(Uuid::new_v4(), UserRole::Customer);
        let booking = manager.create(&customer, airport_run()).await.unwrap();

        store.accept_first(booking.id, rival_id).await;
        let err = manager.accept(&driver, booking.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(store.rival_landed().await);

        let stored = inner.find_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.driver_id, Some(rival_id));
        assert_eq!(stored.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_accept_completed_is_invalid() {
        let f = fixture().await;
        let booking = completed_booking(&f).await;

        let err = f.manager.accept(&f.driver, booking.id).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidTransition {
                current: BookingStatus::Completed,
                action: BookingAction::Accept,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_start_requires_assigned_driver() {
        let f = fixture().await;
        let (rival, _) = add_driver(&f.store).await;
        let booking = f.manager.create(&f.customer, airport_run()).await.unwrap();

        let err = f.manager.start(&f.driver, booking.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));

        f.manager.accept(&f.driver, booking.id).await.unwrap();
        let err = f.manager.start(&rival, booking.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_customer_can_complete_confirmed_ride() {
        let f = fixture().await;
        let booking = f.manager.create(&f.customer, airport_run()).await.unwrap();
        f.manager.accept(&f.driver, booking.id).await.unwrap();

        let done = f
            .manager
            .complete(&f.customer, booking.id, Some(250.456))
            .await
            .unwrap();
        assert_eq!(done.status, BookingStatus::Completed);
        assert_eq!(done.actual_fare, Some(250.46));
    }

    #[tokio::test]
    async fn test_complete_pending_is_invalid() {
        let f = fixture().await;
        let booking = f.manager.create(&f.customer, airport_run()).await.unwrap();

        let err = f
            .manager
            .complete(&f.customer, booking.id, None)
            .await
            .unwrap_err();
        match err {
            AppError::InvalidTransition {
                current, action, ..
            } => {
                assert_eq!(current, BookingStatus::Pending);
                assert_eq!(action, BookingAction::Complete);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_completed_is_invalid() {
        let f = fixture().await;
        let booking = completed_booking(&f).await;

        let err = f.manager.cancel(&f.customer, booking.id).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidTransition {
                current: BookingStatus::Completed,
                action: BookingAction::Cancel,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_cancel_confirmed_notifies_driver() {
        let f = fixture().await;
        let booking = f.manager.create(&f.customer, airport_run()).await.unwrap();
        f.manager.accept(&f.driver, booking.id).await.unwrap();

        let cancelled = f.manager.cancel(&f.customer, booking.id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.driver_id, None);
        let stored = f.store.find_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.driver_id, None);
        assert!(f
            .notifier
            .events()
            .contains(&(NotificationEvent::BookingCancelled, f.driver.user_id)));

        let err = f.manager.accept(&f.driver, booking.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_cancel_someone_elses_booking_is_forbidden() {
        let f = fixture().await;
        let booking = f.manager.create(&f.customer, airport_run()).await.unwrap();
        let stranger = Actor::new(Uuid::new_v4(), UserRole::Customer);

        let err = f.manager.cancel(&stranger, booking.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_skip_deletes_pending_request() {
        let f = fixture().await;
        let booking = f.manager.create(&f.customer, airport_run()).await.unwrap();

        f.manager.skip(&f.driver, booking.id).await.unwrap();
        assert!(f.store.find_booking(booking.id).await.unwrap().is_none());

        let err = f.manager.skip(&f.driver, booking.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_skip_assigned_booking_is_invalid() {
        let f = fixture().await;
        let booking = f.manager.create(&f.customer, airport_run()).await.unwrap();
        f.manager.accept(&f.driver, booking.id).await.unwrap();

        let err = f.manager.skip(&f.driver, booking.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
        assert!(f.store.find_booking(booking.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rate_requires_completed() {
        let f = fixture().await;
        let booking = f.manager.create(&f.customer, airport_run()).await.unwrap();

        let err = f
            .manager
            .rate(&f.customer, booking.id, 5, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_rate_once_and_update_driver() {
        let f = fixture().await;
        let booking = completed_booking(&f).await;

        let (rated, summary) = f
            .manager
            .rate(&f.customer, booking.id, 4, Some("Smooth ride".to_string()))
            .await
            .unwrap();
        assert_eq!(rated.rating, Some(4));
        assert_eq!(rated.feedback.as_deref(), Some("Smooth ride"));
        assert_eq!(summary.total_ratings, 1);

        let err = f
            .manager
            .rate(&f.customer, booking.id, 1, Some("Changed my mind".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));

        let stored = f.store.find_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.rating, Some(4));

        let driver = f.store.find_driver(f.driver_id).await.unwrap().unwrap();
        assert_eq!(driver.rating, 4.0);
    }

    #[tokio::test]
    async fn test_rate_out_of_range() {
        let f = fixture().await;
        let booking = completed_booking(&f).await;

        let err = f
            .manager
            .rate(&f.customer, booking.id, 6, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_queries() {
        let f = fixture().await;
        let first = f.manager.create(&f.customer, airport_run()).await.unwrap();
        let second = f.manager.create(&f.customer, airport_run()).await.unwrap();
        f.manager.accept(&f.driver, first.id).await.unwrap();

        let open = f.manager.open_requests(&f.driver).await.unwrap();
        assert_eq!(open.iter().map(|b| b.id).collect::<Vec<_>>(), vec![second.id]);

        let mine = f.manager.driver_bookings(&f.driver).await.unwrap();
        assert_eq!(mine.iter().map(|b| b.id).collect::<Vec<_>>(), vec![first.id]);

        let customer = f.manager.customer_bookings(&f.customer).await.unwrap();
        assert_eq!(customer.len(), 2);

        let admin = Actor::new(Uuid::new_v4(), UserRole::Admin);
        assert_eq!(f.manager.all_bookings(&admin).await.unwrap().len(), 2);
        assert!(f.manager.all_bookings(&f.customer).await.is_err());
    }

    #[tokio::test]
    async fn test_availability_toggle() {
        let f = fixture().await;
        let driver = f.manager.set_availability(&f.driver, false).await.unwrap();
        assert!(!driver.is_available);

        let stored = f.store.find_driver(f.driver_id).await.unwrap().unwrap();
        assert!(!stored.is_available);
    }

    #[tokio::test]
    async fn test_quote_labels_falls_back_for_unknown_vehicle() {
        let f = fixture().await;
        let (km, known) = f
            .manager
            .quote_labels("Terminal 2", "Hotel Lotus", "Sedan", "airport transfer", None, None)
            .unwrap();
        assert_eq!(km, 10.0);
        assert_eq!(known.total_fare, 204.0);

        let (_, unknown) = f
            .manager
            .quote_labels("Terminal 2", "Hotel Lotus", "rickshaw", "airport_transfer", None, None)
            .unwrap();
        assert_eq!(unknown.total_fare, known.total_fare);
    }
}
