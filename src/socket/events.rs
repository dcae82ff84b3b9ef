//! Wire contract for the real-time channel.
//!
//! Every frame is a JSON envelope `{"event": "...", "data": {...}}`. Unknown
//! event names and malformed payloads fail deserialization and are dropped by
//! the connection handler rather than trusted.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::booking::{PaymentMethod, RideType};
use crate::entities::user;

/// A GeoJSON-style point, `[lng, lat]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    pub fn lng(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn lat(&self) -> f64 {
        self.coordinates[1]
    }
}

/// An address plus its geocoded point, as submitted by the rider client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    #[serde(default)]
    pub address: String,
    pub location: GeoPoint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiderSummary {
    pub id: Uuid,
    pub name: String,
}

/// Driver details shared with the rider once a booking is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverInfo {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<String>,
    pub rating: f64,
}

impl DriverInfo {
    pub fn from_user(u: &user::Model) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            phone: u.phone.clone(),
            vehicle: u.vehicle.clone(),
            rating: u.rating,
        }
    }
}

/// Payload of a `ride:request` broadcast, shared between the engine-side
/// fan-out and the cash-path client-initiated broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideRequestPayload {
    pub booking_id: Uuid,
    pub rider: RiderSummary,
    pub pickup: Place,
    pub destination: Place,
    pub fare: i64,
    pub ride_type: RideType,
    pub distance_km: f64,
    pub estimated_time_min: i32,
}

/// Events a connected client may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    #[serde(rename = "driver:join")]
    DriverJoin,
    #[serde(rename = "rider:join")]
    RiderJoin,
    #[serde(rename = "join:booking")]
    JoinBooking { booking_id: Uuid },
    #[serde(rename = "leave:booking")]
    LeaveBooking { booking_id: Uuid },
    #[serde(rename = "driver:location")]
    DriverLocation {
        lng: f64,
        lat: f64,
        #[serde(default)]
        booking_id: Option<Uuid>,
    },
    #[serde(rename = "rider:location")]
    RiderLocation {
        lng: f64,
        lat: f64,
        #[serde(default)]
        booking_id: Option<Uuid>,
    },
    #[serde(rename = "ride:request")]
    RideRequest(RideRequestPayload),
    #[serde(rename = "ride:accept")]
    RideAccept {
        rider_id: Uuid,
        driver_id: Uuid,
        booking_id: Uuid,
        #[serde(default)]
        driver_info: Option<DriverInfo>,
    },
}

/// Events the server delivers to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    #[serde(rename = "ride:request")]
    RideRequest(RideRequestPayload),
    /// Direct notification to the rider; carries the OTP the driver must be told.
    #[serde(rename = "ride:accepted")]
    RideAccepted {
        booking_id: Uuid,
        driver_id: Uuid,
        #[serde(skip_serializing_if = "Option::is_none")]
        driver_info: Option<DriverInfo>,
        #[serde(skip_serializing_if = "Option::is_none")]
        fare: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        payment_method: Option<PaymentMethod>,
        #[serde(skip_serializing_if = "Option::is_none")]
        distance_km: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        estimated_time_min: Option<i32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        otp: Option<String>,
    },
    /// Booking-room announcement of the same acceptance; never carries the OTP.
    #[serde(rename = "ride:confirmed")]
    RideConfirmed {
        booking_id: Uuid,
        driver_id: Uuid,
        #[serde(skip_serializing_if = "Option::is_none")]
        fare: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        payment_method: Option<PaymentMethod>,
    },
    #[serde(rename = "ride:started")]
    RideStarted {
        booking_id: Uuid,
        started_at: chrono::DateTime<chrono::FixedOffset>,
    },
    #[serde(rename = "ride:completed")]
    RideCompleted { booking_id: Uuid },
    #[serde(rename = "booking:cancelled")]
    BookingCancelled { booking_id: Uuid },
    /// Silent dashboard refresh for the driver after a rider cancellation;
    /// deliberately a distinct event from `booking:cancelled`.
    #[serde(rename = "driver:booking-cleared")]
    DriverBookingCleared { booking_id: Uuid },
    #[serde(rename = "driver:location")]
    DriverLocation { driver_id: Uuid, lng: f64, lat: f64 },
    #[serde(rename = "rider:location")]
    RiderLocation { rider_id: Uuid, lng: f64, lat: f64 },
    #[serde(rename = "driver:status")]
    DriverStatus { is_online: bool },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_join_booking_wire_shape() {
        let id = Uuid::nil();
        let json = format!(r#"{{"event":"join:booking","data":{{"bookingId":"{}"}}}}"#, id);
        let parsed: ClientEvent = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed, ClientEvent::JoinBooking { booking_id: id });
    }

    #[test]
    fn client_location_booking_id_optional() {
        let json = r#"{"event":"driver:location","data":{"lng":77.2,"lat":28.6}}"#;
        let parsed: ClientEvent = serde_json::from_str(json).expect("parse");
        assert_eq!(
            parsed,
            ClientEvent::DriverLocation {
                lng: 77.2,
                lat: 28.6,
                booking_id: None
            }
        );
    }

    #[test]
    fn unknown_event_is_rejected() {
        let json = r#"{"event":"ride:teleport","data":{}}"#;
        assert!(serde_json::from_str::<ClientEvent>(json).is_err());
    }

    #[test]
    fn server_cancelled_events_are_distinct() {
        let id = Uuid::nil();
        let rider = serde_json::to_string(&ServerEvent::BookingCancelled { booking_id: id })
            .expect("serialize");
        let driver = serde_json::to_string(&ServerEvent::DriverBookingCleared { booking_id: id })
            .expect("serialize");
        assert!(rider.contains(r#""event":"booking:cancelled""#));
        assert!(driver.contains(r#""event":"driver:booking-cleared""#));
    }

    #[test]
    fn ride_accepted_omits_absent_otp() {
        let event = ServerEvent::RideConfirmed {
            booking_id: Uuid::nil(),
            driver_id: Uuid::nil(),
            fare: None,
            payment_method: None,
        };
        let json = serde_json::to_string(&event).expect("serialize");
        assert!(!json.contains("fare"));
        assert!(json.contains(r#""event":"ride:confirmed""#));
    }

    #[test]
    fn geo_point_accessors_match_wire_order() {
        let p: GeoPoint = serde_json::from_str(r#"{"coordinates":[77.2,28.6]}"#).expect("parse");
        assert_eq!(p.lng(), 77.2);
        assert_eq!(p.lat(), 28.6);
    }
}
