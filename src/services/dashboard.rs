//! Read-side aggregations for the customer, driver and operator dashboards.
//!
//! All calendar arithmetic is done in UTC. The aggregations are plain
//! functions over booking slices; [`DashboardService`] only loads the rows.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::fare::round_money;
use super::rating::{self, RatingSummary};
use super::Actor;
use crate::entities::booking::{self, BookingStatus, ServiceType};
use crate::entities::user::{self, UserRole};
use crate::entities::driver;
use crate::error::{AppError, AppResult};
use crate::store::{BookingFilter, Store};

pub const RECENT_ACTIVITY_LIMIT: usize = 5;
pub const TOP_LOCATIONS_LIMIT: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub confirmed: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub cancelled: usize,
}

impl StatusCounts {
    pub fn tally(bookings: &[booking::Model]) -> Self {
        let mut counts = StatusCounts::default();
        for b in bookings {
            counts.total += 1;
            match b.status {
                BookingStatus::Pending => counts.pending += 1,
                BookingStatus::Confirmed => counts.confirmed += 1,
                BookingStatus::InProgress => counts.in_progress += 1,
                BookingStatus::Completed => counts.completed += 1,
                BookingStatus::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySpend {
    /// `YYYY-MM`
    pub month: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceCount {
    pub service_type: ServiceType,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationCount {
    pub location: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerDashboard {
    pub counts: StatusCounts,
    pub total_spend: f64,
    pub recent: Vec<booking::Model>,
    pub monthly_spend: Vec<MonthlySpend>,
    pub service_breakdown: Vec<ServiceCount>,
    pub top_pickups: Vec<LocationCount>,
    pub top_dropoffs: Vec<LocationCount>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Earnings {
    pub today: f64,
    pub week: f64,
    pub month: f64,
    pub lifetime: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverDashboard {
    pub driver: driver::Model,
    pub rating: RatingSummary,
    pub counts: StatusCounts,
    pub todays_trips: usize,
    pub open_requests: usize,
    pub active_trips: Vec<booking::Model>,
    pub earnings: Earnings,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TripFilter {
    pub status: Option<BookingStatus>,
    /// Inclusive, on the pickup date.
    pub from: Option<NaiveDate>,
    /// Inclusive, on the pickup date.
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatorOverview {
    pub counts: StatusCounts,
    pub total_revenue: f64,
    pub total_users: usize,
    pub total_drivers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverListing {
    #[serde(flatten)]
    pub driver: driver::Model,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

fn pickup_utc(booking: &booking::Model) -> DateTime<Utc> {
    booking.pickup_datetime.with_timezone(&Utc)
}

fn completed(bookings: &[booking::Model]) -> impl Iterator<Item = &booking::Model> {
    bookings
        .iter()
        .filter(|b| b.status == BookingStatus::Completed)
}

/// Sum of what customers paid on completed bookings.
pub fn total_spend(bookings: &[booking::Model]) -> f64 {
    round_money(completed(bookings).map(|b| b.charged_fare()).sum())
}

/// Revenue as the operator reports it: estimated fares of completed bookings.
pub fn total_revenue(bookings: &[booking::Model]) -> f64 {
    round_money(completed(bookings).map(|b| b.estimated_fare).sum())
}

/// Most frequent keys first; equal counts keep the order they were first seen in.
fn rank_by_frequency<K: Eq + Hash + Clone>(keys: impl IntoIterator<Item = K>) -> Vec<(K, usize)> {
    let mut ranked: Vec<(K, usize)> = Vec::new();
    let mut index: HashMap<K, usize> = HashMap::new();

    for key in keys {
        match index.get(&key) {
            Some(&i) => ranked[i].1 += 1,
            None => {
                index.insert(key.clone(), ranked.len());
                ranked.push((key, 1));
            }
        }
    }

    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

fn top_locations<'a>(locations: impl Iterator<Item = &'a str>) -> Vec<LocationCount> {
    rank_by_frequency(locations.map(str::trim).filter(|l| !l.is_empty()))
        .into_iter()
        .take(TOP_LOCATIONS_LIMIT)
        .map(|(location, count)| LocationCount {
            location: location.to_string(),
            count,
        })
        .collect()
}

/// Customer view over their bookings, given newest first.
pub fn customer_dashboard(bookings: &[booking::Model]) -> CustomerDashboard {
    let mut monthly: BTreeMap<String, f64> = BTreeMap::new();
    for b in completed(bookings) {
        let month = pickup_utc(b).format("%Y-%m").to_string();
        *monthly.entry(month).or_default() += b.charged_fare();
    }

    CustomerDashboard {
        counts: StatusCounts::tally(bookings),
        total_spend: total_spend(bookings),
        recent: bookings.iter().take(RECENT_ACTIVITY_LIMIT).cloned().collect(),
        monthly_spend: monthly
            .into_iter()
            .map(|(month, amount)| MonthlySpend {
                month,
                amount: round_money(amount),
            })
            .collect(),
        service_breakdown: rank_by_frequency(bookings.iter().map(|b| b.service_type))
            .into_iter()
            .map(|(service_type, count)| ServiceCount {
                service_type,
                count,
            })
            .collect(),
        top_pickups: top_locations(bookings.iter().map(|b| b.pickup_location.as_str())),
        top_dropoffs: top_locations(bookings.iter().map(|b| b.dropoff_location.as_str())),
    }
}

/// Trips whose pickup falls on `now`'s calendar day.
pub fn todays_trips(bookings: &[booking::Model], now: DateTime<Utc>) -> usize {
    let today = now.date_naive();
    bookings
        .iter()
        .filter(|b| pickup_utc(b).date_naive() == today)
        .count()
}

/// Trips a driver is attached to and has not finished: confirmed or in progress.
pub fn active_trips(bookings: &[booking::Model]) -> Vec<booking::Model> {
    bookings
        .iter()
        .filter(|b| b.status.requires_driver() && !b.status.is_terminal())
        .cloned()
        .collect()
}

/// Earnings from completed trips. Week and month are rolling 7 and 30 day
/// windows ending now, keyed on the pickup time.
pub fn driver_earnings(bookings: &[booking::Model], now: DateTime<Utc>) -> Earnings {
    let today = now.date_naive();
    let week_start = now - Duration::days(7);
    let month_start = now - Duration::days(30);

    let mut earnings = Earnings::default();
    for b in completed(bookings) {
        let fare = b.charged_fare();
        let pickup = pickup_utc(b);

        earnings.lifetime += fare;
        if pickup >= month_start {
            earnings.month += fare;
        }
        if pickup >= week_start {
            earnings.week += fare;
        }
        if pickup.date_naive() == today {
            earnings.today += fare;
        }
    }

    Earnings {
        today: round_money(earnings.today),
        week: round_money(earnings.week),
        month: round_money(earnings.month),
        lifetime: round_money(earnings.lifetime),
    }
}

pub fn trip_history(bookings: Vec<booking::Model>, filter: &TripFilter) -> Vec<booking::Model> {
    bookings
        .into_iter()
        .filter(|b| filter.status.is_none_or(|s| b.status == s))
        .filter(|b| {
            let day = pickup_utc(b).date_naive();
            filter.from.is_none_or(|from| day >= from) && filter.to.is_none_or(|to| day <= to)
        })
        .collect()
}

pub fn operator_overview(
    bookings: &[booking::Model],
    total_users: usize,
    total_drivers: usize,
) -> OperatorOverview {
    OperatorOverview {
        counts: StatusCounts::tally(bookings),
        total_revenue: total_revenue(bookings),
        total_users,
        total_drivers,
    }
}

/// Loads rows for the dashboards and enforces who may see what.
#[derive(Clone)]
pub struct DashboardService {
    store: Arc<dyn Store>,
}

impl DashboardService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn customer(&self, actor: &Actor) -> AppResult<CustomerDashboard> {
        actor.require(UserRole::Customer)?;
        let bookings = self
            .store
            .list_bookings(&BookingFilter::customer(actor.user_id))
            .await?;
        Ok(customer_dashboard(&bookings))
    }

    pub async fn driver(&self, actor: &Actor, now: DateTime<Utc>) -> AppResult<DriverDashboard> {
        let driver = self.driver_for(actor).await?;
        let bookings = self
            .store
            .list_bookings(&BookingFilter::driver(driver.id))
            .await?;
        let open_requests = self
            .store
            .list_bookings(&BookingFilter::open_requests())
            .await?
            .len();

        Ok(DriverDashboard {
            rating: rating::summarize(&bookings),
            counts: StatusCounts::tally(&bookings),
            todays_trips: todays_trips(&bookings, now),
            open_requests,
            active_trips: active_trips(&bookings),
            earnings: driver_earnings(&bookings, now),
            driver,
        })
    }

    pub async fn driver_rating(&self, actor: &Actor) -> AppResult<RatingSummary> {
        let driver = self.driver_for(actor).await?;
        rating::driver_average_rating(self.store.as_ref(), driver.id).await
    }

    pub async fn trip_history(
        &self,
        actor: &Actor,
        filter: &TripFilter,
    ) -> AppResult<Vec<booking::Model>> {
        let driver = self.driver_for(actor).await?;
        let bookings = self
            .store
            .list_bookings(&BookingFilter::driver(driver.id))
            .await?;
        Ok(trip_history(bookings, filter))
    }

    pub async fn operator(&self, actor: &Actor) -> AppResult<OperatorOverview> {
        actor.require(UserRole::Admin)?;
        let bookings = self.store.list_bookings(&BookingFilter::all()).await?;
        let users = self.store.list_users().await?;
        let drivers = self.store.list_drivers().await?;
        Ok(operator_overview(&bookings, users.len(), drivers.len()))
    }

    pub async fn users(&self, actor: &Actor) -> AppResult<Vec<user::Model>> {
        actor.require(UserRole::Admin)?;
        self.store.list_users().await
    }

    /// Drivers joined with their user records.
    pub async fn drivers(&self, actor: &Actor) -> AppResult<Vec<DriverListing>> {
        actor.require(UserRole::Admin)?;
        let drivers = self.store.list_drivers().await?;
        let users: HashMap<Uuid, user::Model> = self
            .store
            .list_users()
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        Ok(drivers
            .into_iter()
            .map(|d| {
                let user = users.get(&d.user_id);
                DriverListing {
                    username: user.map(|u| u.username.clone()),
                    full_name: user.map(|u| u.full_name.clone()),
                    email: user.map(|u| u.email.clone()),
                    phone: user.map(|u| u.phone.clone()),
                    driver: d,
                }
            })
            .collect())
    }

    async fn driver_for(&self, actor: &Actor) -> AppResult<driver::Model> {
        actor.require(UserRole::Driver)?;
        self.store
            .find_driver_by_user(actor.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Driver profile not found".to_string()))
    }
}
