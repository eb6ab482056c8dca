use std::fmt;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Where a booking sits in its lifecycle.
///
/// `pending -> confirmed -> in_progress -> completed`, with `cancelled`
/// reachable from `pending` and `confirmed`. `completed` and `cancelled`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "booking_status")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl BookingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// Statuses in which a driver must be attached to the booking.
    pub fn requires_driver(self) -> bool {
        matches!(
            self,
            BookingStatus::Confirmed | BookingStatus::InProgress | BookingStatus::Completed
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStatus::Pending => write!(f, "pending"),
            BookingStatus::Confirmed => write!(f, "confirmed"),
            BookingStatus::InProgress => write!(f, "in_progress"),
            BookingStatus::Completed => write!(f, "completed"),
            BookingStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "service_type")]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    #[sea_orm(string_value = "airport_transfer")]
    AirportTransfer,
    #[sea_orm(string_value = "corporate")]
    Corporate,
    #[sea_orm(string_value = "wedding")]
    Wedding,
    #[sea_orm(string_value = "hourly")]
    Hourly,
    #[sea_orm(string_value = "outstation")]
    Outstation,
}

impl ServiceType {
    /// Parse a free-text label such as `"Airport Transfer"`.
    pub fn from_label(label: &str) -> Option<Self> {
        match normalize_label(label).as_str() {
            "airport_transfer" => Some(ServiceType::AirportTransfer),
            "corporate" => Some(ServiceType::Corporate),
            "wedding" => Some(ServiceType::Wedding),
            "hourly" => Some(ServiceType::Hourly),
            "outstation" => Some(ServiceType::Outstation),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceType::AirportTransfer => write!(f, "airport_transfer"),
            ServiceType::Corporate => write!(f, "corporate"),
            ServiceType::Wedding => write!(f, "wedding"),
            ServiceType::Hourly => write!(f, "hourly"),
            ServiceType::Outstation => write!(f, "outstation"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "vehicle_type")]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    #[sea_orm(string_value = "sedan")]
    Sedan,
    #[sea_orm(string_value = "suv")]
    Suv,
    #[sea_orm(string_value = "hatchback")]
    Hatchback,
    #[sea_orm(string_value = "luxury")]
    Luxury,
    #[sea_orm(string_value = "van")]
    Van,
}

impl VehicleType {
    pub fn from_label(label: &str) -> Option<Self> {
        match normalize_label(label).as_str() {
            "sedan" => Some(VehicleType::Sedan),
            "suv" => Some(VehicleType::Suv),
            "hatchback" => Some(VehicleType::Hatchback),
            "luxury" => Some(VehicleType::Luxury),
            "van" => Some(VehicleType::Van),
            _ => None,
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VehicleType::Sedan => write!(f, "sedan"),
            VehicleType::Suv => write!(f, "suv"),
            VehicleType::Hatchback => write!(f, "hatchback"),
            VehicleType::Luxury => write!(f, "luxury"),
            VehicleType::Van => write!(f, "van"),
        }
    }
}

fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase().replace(' ', "_")
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub customer_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub pickup_location: String,
    pub dropoff_location: String,
    pub pickup_datetime: DateTimeWithTimeZone,
    pub service_type: ServiceType,
    pub vehicle_type: VehicleType,
    pub status: BookingStatus,
    pub distance_km: f64,
    pub duration_hours: Option<f64>,
    pub estimated_fare: f64,
    pub actual_fare: Option<f64>,
    pub special_instructions: Option<String>,
    pub rating: Option<i32>,
    pub feedback: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// What the customer paid: the actual fare once recorded, else the estimate.
    pub fn charged_fare(&self) -> f64 {
        self.actual_fare.unwrap_or(self.estimated_fare)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CustomerId",
        to = "super::user::Column::Id"
    )]
    Customer,
    #[sea_orm(
        belongs_to = "super::driver::Entity",
        from = "Column::DriverId",
        to = "super::driver::Column::Id"
    )]
    Driver,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::driver::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Driver.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_normalized() {
        assert_eq!(
            ServiceType::from_label("Airport Transfer"),
            Some(ServiceType::AirportTransfer)
        );
        assert_eq!(VehicleType::from_label(" SUV "), Some(VehicleType::Suv));
        assert_eq!(VehicleType::from_label("rickshaw"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(BookingStatus::Completed.is_terminal());
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(!BookingStatus::InProgress.is_terminal());
        assert!(!BookingStatus::Pending.requires_driver());
        assert!(BookingStatus::InProgress.requires_driver());
    }
}
