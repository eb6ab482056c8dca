use rand::Rng;

use super::fare::round_money;
use crate::error::{AppError, AppResult};

/// Estimates trip length between two free-text addresses.
///
/// No geocoding or routing happens in this crate; implementations backed by
/// a real routing service plug in here without touching fare estimation.
pub trait DistanceProvider: Send + Sync {
    fn estimate_km(&self, pickup: &str, dropoff: &str) -> f64;
}

/// Uniformly random distance in `[min_km, max_km]`, ignoring the addresses.
#[derive(Debug, Clone, Copy)]
pub struct RandomDistance {
    min_km: f64,
    max_km: f64,
}

impl RandomDistance {
    /// Bounds must be finite and non-negative; inverted bounds are swapped.
    pub fn new(min_km: f64, max_km: f64) -> AppResult<Self> {
        for km in [min_km, max_km] {
            if !km.is_finite() || km < 0.0 {
                return Err(AppError::Validation(format!(
                    "Distance bound {km} km must be a finite, non-negative number"
                )));
            }
        }
        Ok(Self {
            min_km: min_km.min(max_km),
            max_km: min_km.max(max_km),
        })
    }
}

impl Default for RandomDistance {
    fn default() -> Self {
        Self {
            min_km: 5.0,
            max_km: 50.0,
        }
    }
}

impl DistanceProvider for RandomDistance {
    fn estimate_km(&self, _pickup: &str, _dropoff: &str) -> f64 {
        round_money(rand::thread_rng().gen_range(self.min_km..=self.max_km))
    }
}

/// Always the same distance.
#[derive(Debug, Clone, Copy)]
pub struct FixedDistance(pub f64);

impl DistanceProvider for FixedDistance {
    fn estimate_km(&self, _pickup: &str, _dropoff: &str) -> f64 {
        self.0
    }
}
