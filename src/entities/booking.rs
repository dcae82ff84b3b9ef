use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "booking_status")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    #[sea_orm(string_value = "requested")]
    Requested,
    #[sea_orm(string_value = "pending_payment")]
    PendingPayment,
    #[sea_orm(string_value = "accepted")]
    Accepted,
    #[sea_orm(string_value = "started")]
    Started,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl BookingStatus {
    /// No transitions leave a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// The full transition table of the booking lifecycle.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (PendingPayment, Requested)
                | (Requested, Accepted)
                | (Accepted, Started)
                | (Started, Completed)
                | (Requested, Cancelled)
                | (PendingPayment, Cancelled)
                | (Accepted, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "ride_type")]
#[serde(rename_all = "lowercase")]
pub enum RideType {
    #[sea_orm(string_value = "economy")]
    Economy,
    #[sea_orm(string_value = "standard")]
    Standard,
    #[sea_orm(string_value = "premium")]
    Premium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "payment_method")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "online")]
    Online,
    #[sea_orm(string_value = "cash")]
    Cash,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "booking")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub rider_id: Uuid,
    /// Assigned by the accept race; non-null iff status is accepted/started/completed.
    pub driver_id: Option<Uuid>,
    pub pickup_address: String,
    pub pickup_lng: f64,
    pub pickup_lat: f64,
    pub dest_address: String,
    pub dest_lng: f64,
    pub dest_lat: f64,
    pub ride_type: RideType,
    /// Smallest currency unit (paise).
    pub fare: i64,
    pub distance_km: f64,
    pub estimated_time_min: i32,
    pub payment_method: PaymentMethod,
    pub payment_id: Option<Uuid>,
    pub status: BookingStatus,
    pub otp: Option<String>,
    pub otp_expires_at: Option<DateTimeWithTimeZone>,
    pub otp_verified: bool,
    pub requested_at: DateTimeWithTimeZone,
    pub started_at: Option<DateTimeWithTimeZone>,
    pub completed_at: Option<DateTimeWithTimeZone>,
    pub cancelled_at: Option<DateTimeWithTimeZone>,
    pub cancellation_reason: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::RiderId",
        to = "super::user::Column::Id"
    )]
    Rider,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::DriverId",
        to = "super::user::Column::Id"
    )]
    Driver,
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::BookingStatus::*;

    #[test]
    fn terminal_states_have_no_exits() {
        for from in [Completed, Cancelled] {
            assert!(from.is_terminal());
            for to in [Requested, PendingPayment, Accepted, Started, Completed, Cancelled] {
                assert!(!from.can_transition_to(to));
            }
        }
    }

    #[test]
    fn happy_path_transitions() {
        assert!(PendingPayment.can_transition_to(Requested));
        assert!(Requested.can_transition_to(Accepted));
        assert!(Accepted.can_transition_to(Started));
        assert!(Started.can_transition_to(Completed));
    }

    #[test]
    fn cancellation_only_before_start() {
        assert!(Requested.can_transition_to(Cancelled));
        assert!(PendingPayment.can_transition_to(Cancelled));
        assert!(Accepted.can_transition_to(Cancelled));
        assert!(!Started.can_transition_to(Cancelled));
    }

    #[test]
    fn no_skipping_states() {
        assert!(!Requested.can_transition_to(Started));
        assert!(!Requested.can_transition_to(Completed));
        assert!(!Accepted.can_transition_to(Completed));
        assert!(!PendingPayment.can_transition_to(Accepted));
    }
}
