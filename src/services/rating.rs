use serde::Serialize;
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus};
use crate::error::AppResult;
use crate::store::{BookingFilter, Store};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingSummary {
    pub avg_rating: f64,
    pub total_ratings: usize,
}

impl RatingSummary {
    pub const EMPTY: RatingSummary = RatingSummary {
        avg_rating: 0.0,
        total_ratings: 0,
    };
}

/// Mean rating over completed, rated bookings. `{0, 0}` when there are none.
pub fn summarize(bookings: &[booking::Model]) -> RatingSummary {
    let ratings: Vec<i32> = bookings
        .iter()
        .filter(|b| b.status == BookingStatus::Completed)
        .filter_map(|b| b.rating)
        .collect();

    if ratings.is_empty() {
        return RatingSummary::EMPTY;
    }

    let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    RatingSummary {
        avg_rating: (sum as f64 / ratings.len() as f64 * 100.0).round() / 100.0,
        total_ratings: ratings.len(),
    }
}

/// Recomputed from the driver's bookings on every call.
pub async fn driver_average_rating(
    store: &dyn Store,
    driver_id: Uuid,
) -> AppResult<RatingSummary> {
    let bookings = store.list_bookings(&BookingFilter::driver(driver_id)).await?;
    Ok(summarize(&bookings))
}

/// Recompute the driver's average and store it on the driver profile.
/// Drivers without any rated ride keep their current rating.
pub async fn refresh_driver_rating(
    store: &dyn Store,
    driver_id: Uuid,
) -> AppResult<RatingSummary> {
    let summary = driver_average_rating(store, driver_id).await?;
    if summary.total_ratings > 0 {
        store.set_driver_rating(driver_id, summary.avg_rating).await?;
        tracing::debug!(
            %driver_id,
            avg = summary.avg_rating,
            total = summary.total_ratings,
            "Driver rating refreshed"
        );
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::booking::{ServiceType, VehicleType};
    use crate::store::MemoryStore;
    use chrono::Utc;

    fn ride(driver_id: Uuid, status: BookingStatus, rating: Option<i32>) -> booking::Model {
        let now = Utc::now();
        booking::Model {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            driver_id: Some(driver_id),
            pickup_location: "A".to_string(),
            dropoff_location: "B".to_string(),
            pickup_datetime: now.into(),
            service_type: ServiceType::Corporate,
            vehicle_type: VehicleType::Sedan,
            status,
            distance_km: 10.0,
            duration_hours: None,
            estimated_fare: 187.0,
            actual_fare: None,
            special_instructions: None,
            rating,
            feedback: None,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[test]
    fn test_no_ratings_is_zero() {
        assert_eq!(summarize(&[]), RatingSummary::EMPTY);

        let driver = Uuid::new_v4();
        let unrated = vec![ride(driver, BookingStatus::Completed, None)];
        assert_eq!(summarize(&unrated), RatingSummary::EMPTY);
    }

    #[test]
    fn test_average_of_five_four_three() {
        let driver = Uuid::new_v4();
        let rides = vec![
            ride(driver, BookingStatus::Completed, Some(5)),
            ride(driver, BookingStatus::Completed, Some(4)),
            ride(driver, BookingStatus::Completed, Some(3)),
            ride(driver, BookingStatus::Completed, None),
        ];
        assert_eq!(
            summarize(&rides),
            RatingSummary {
                avg_rating: 4.0,
                total_ratings: 3
            }
        );
    }

    #[tokio::test]
    async fn test_refresh_writes_average_to_driver() {
        let store = MemoryStore::new();
        let driver_id = Uuid::new_v4();
        store
            .insert_driver(crate::entities::driver::Model {
                id: driver_id,
                user_id: Uuid::new_v4(),
                license_number: "DL-1".to_string(),
                license_expiry: chrono::NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
                experience_years: 3,
                rating: crate::entities::driver::DEFAULT_RATING,
                is_available: true,
                created_at: Utc::now().into(),
            })
            .await
            .unwrap();
        store.insert_booking(ride(driver_id, BookingStatus::Completed, Some(4))).await.unwrap();
        store.insert_booking(ride(driver_id, BookingStatus::Completed, Some(3))).await.unwrap();

        let summary = refresh_driver_rating(&store, driver_id).await.unwrap();
        assert_eq!(summary.total_ratings, 2);

        let driver = store.find_driver(driver_id).await.unwrap().unwrap();
        assert_eq!(driver.rating, 3.5);
    }
}
