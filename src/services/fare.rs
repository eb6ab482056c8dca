//! Fare estimation.
//!
//! Pure pricing from trip attributes. Hourly bookings with a duration are
//! priced on time alone and ignore distance entirely, so the same trip can
//! price very differently on either side of the hourly/non-hourly boundary.

use serde::Serialize;

use crate::entities::booking::{ServiceType, VehicleType};

/// Vehicle used when a label does not name a known vehicle class.
pub const FALLBACK_VEHICLE: VehicleType = VehicleType::Sedan;
/// Multiplier used when a label does not name a known service.
pub const FALLBACK_MULTIPLIER: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleRates {
    pub base_fare: f64,
    pub per_km_rate: f64,
}

pub fn vehicle_rates(vehicle: VehicleType) -> VehicleRates {
    let (base_fare, per_km_rate) = match vehicle {
        VehicleType::Sedan => (50.0, 12.0),
        VehicleType::Suv => (80.0, 18.0),
        VehicleType::Hatchback => (40.0, 10.0),
        VehicleType::Luxury => (150.0, 30.0),
        VehicleType::Van => (100.0, 15.0),
    };
    VehicleRates {
        base_fare,
        per_km_rate,
    }
}

pub fn service_multiplier(service: ServiceType) -> f64 {
    match service {
        ServiceType::AirportTransfer => 1.2,
        ServiceType::Corporate => 1.1,
        ServiceType::Wedding => 1.5,
        ServiceType::Hourly => 1.0,
        ServiceType::Outstation => 1.3,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FareBreakdown {
    pub base_fare: f64,
    pub distance_fare: f64,
    pub service_charge: f64,
    pub multiplier: f64,
    pub total_fare: f64,
}

/// Round a money amount to 2 decimals, halves away from zero.
pub fn round_money(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Price a trip.
///
/// Negative or non-finite distances are clamped to zero. A duration only
/// matters for hourly service, and only when it is positive.
pub fn estimate(
    distance_km: f64,
    vehicle: VehicleType,
    service: ServiceType,
    duration_hours: Option<f64>,
) -> FareBreakdown {
    price(
        distance_km,
        vehicle_rates(vehicle),
        service_multiplier(service),
        service == ServiceType::Hourly,
        duration_hours,
    )
}

/// Price a trip from free-text labels, falling back to sedan rates and a
/// neutral multiplier for anything unrecognised.
pub fn estimate_from_labels(
    distance_km: f64,
    vehicle: &str,
    service: &str,
    duration_hours: Option<f64>,
) -> FareBreakdown {
    let rates = vehicle_rates(VehicleType::from_label(vehicle).unwrap_or(FALLBACK_VEHICLE));
    let service = ServiceType::from_label(service);
    let multiplier = service.map_or(FALLBACK_MULTIPLIER, service_multiplier);

    price(
        distance_km,
        rates,
        multiplier,
        service == Some(ServiceType::Hourly),
        duration_hours,
    )
}

fn price(
    distance_km: f64,
    rates: VehicleRates,
    multiplier: f64,
    hourly: bool,
    duration_hours: Option<f64>,
) -> FareBreakdown {
    let distance_km = if distance_km.is_finite() { distance_km.max(0.0) } else { 0.0 };
    let distance_fare = distance_km * rates.per_km_rate;
    let metered = rates.base_fare + distance_fare;

    let total = match duration_hours {
        Some(hours) if hourly && hours.is_finite() && hours > 0.0 => {
            rates.base_fare * hours * multiplier
        }
        _ => metered * multiplier,
    };

    FareBreakdown {
        base_fare: round_money(rates.base_fare),
        distance_fare: round_money(distance_fare),
        service_charge: round_money(metered * (multiplier - 1.0)),
        multiplier,
        total_fare: round_money(total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sedan_airport_transfer() {
        let fare = estimate(10.0, VehicleType::Sedan, ServiceType::AirportTransfer, None);
        assert_eq!(fare.base_fare, 50.0);
        assert_eq!(fare.distance_fare, 120.0);
        assert_eq!(fare.multiplier, 1.2);
        assert_eq!(fare.service_charge, 34.0);
        assert_eq!(fare.total_fare, 204.0);
    }

    #[test]
    fn test_hourly_ignores_distance() {
        let fare = estimate(0.0, VehicleType::Sedan, ServiceType::Hourly, Some(4.0));
        assert_eq!(fare.total_fare, 200.0);

        let far = estimate(120.0, VehicleType::Sedan, ServiceType::Hourly, Some(4.0));
        assert_eq!(far.total_fare, 200.0);
    }

    #[test]
    fn test_hourly_without_duration_is_metered() {
        let fare = estimate(10.0, VehicleType::Sedan, ServiceType::Hourly, None);
        assert_eq!(fare.total_fare, 170.0);

        let zero = estimate(10.0, VehicleType::Sedan, ServiceType::Hourly, Some(0.0));
        assert_eq!(zero.total_fare, 170.0);
    }

    #[test]
    fn test_unknown_labels_fall_back() {
        let fallback = estimate_from_labels(10.0, "rickshaw", "space_flight", None);
        let sedan = estimate(10.0, VehicleType::Sedan, ServiceType::Hourly, None);
        assert_eq!(fallback.base_fare, 50.0);
        assert_eq!(fallback.distance_fare, 120.0);
        assert_eq!(fallback.multiplier, 1.0);
        assert_eq!(fallback.total_fare, sedan.total_fare);
    }

    #[test]
    fn test_labels_match_typed_pricing() {
        let labelled = estimate_from_labels(25.0, "Luxury", "Airport Transfer", None);
        let typed = estimate(25.0, VehicleType::Luxury, ServiceType::AirportTransfer, None);
        assert_eq!(labelled, typed);
    }

    #[test]
    fn test_negative_distance_is_clamped() {
        let fare = estimate(-5.0, VehicleType::Suv, ServiceType::Corporate, None);
        assert_eq!(fare.distance_fare, 0.0);
        assert_eq!(fare.total_fare, 88.0);

        let nan = estimate(f64::NAN, VehicleType::Suv, ServiceType::Corporate, None);
        assert_eq!(nan.total_fare, 88.0);
    }

    #[test]
    fn test_estimate_is_deterministic() {
        let a = estimate(17.3, VehicleType::Van, ServiceType::Outstation, None);
        let b = estimate(17.3, VehicleType::Van, ServiceType::Outstation, None);
        assert_eq!(a, b);
    }
}
