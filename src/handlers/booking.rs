//! REST surface of the booking lifecycle. Handlers stay thin; transition
//! rules and side effects live in [`crate::lifecycle`].

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, FixedOffset};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus, PaymentMethod, RideType};
use crate::entities::user;
use crate::error::{AppError, AppResult};
use crate::lifecycle;
use crate::socket::events::{DriverInfo, GeoPoint, Place};
use crate::utils::jwt::Claims;
use crate::AppState;

/// Client-facing projection of a booking. The OTP fields only appear for the
/// owning rider; the driver learns the code from the rider in person.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    pub id: Uuid,
    pub rider_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub pickup: Place,
    pub destination: Place,
    pub ride_type: RideType,
    pub fare: i64,
    pub distance_km: f64,
    pub estimated_time_min: i32,
    pub payment_method: PaymentMethod,
    pub payment_id: Option<Uuid>,
    pub status: BookingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_expires_at: Option<DateTime<FixedOffset>>,
    pub otp_verified: bool,
    pub requested_at: DateTime<FixedOffset>,
    pub started_at: Option<DateTime<FixedOffset>>,
    pub completed_at: Option<DateTime<FixedOffset>>,
    pub cancelled_at: Option<DateTime<FixedOffset>>,
    pub cancellation_reason: Option<String>,
}

impl BookingView {
    pub fn from_model(b: booking::Model, include_otp: bool) -> Self {
        Self {
            id: b.id,
            rider_id: b.rider_id,
            driver_id: b.driver_id,
            pickup: Place {
                address: b.pickup_address,
                location: GeoPoint {
                    coordinates: [b.pickup_lng, b.pickup_lat],
                },
            },
            destination: Place {
                address: b.dest_address,
                location: GeoPoint {
                    coordinates: [b.dest_lng, b.dest_lat],
                },
            },
            ride_type: b.ride_type,
            fare: b.fare,
            distance_km: b.distance_km,
            estimated_time_min: b.estimated_time_min,
            payment_method: b.payment_method,
            payment_id: b.payment_id,
            status: b.status,
            otp: if include_otp { b.otp } else { None },
            otp_expires_at: if include_otp { b.otp_expires_at } else { None },
            otp_verified: b.otp_verified,
            requested_at: b.requested_at,
            started_at: b.started_at,
            completed_at: b.completed_at,
            cancelled_at: b.cancelled_at,
            cancellation_reason: b.cancellation_reason,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub booking: BookingView,
}

#[derive(Debug, Serialize)]
pub struct BookingDetailResponse {
    pub booking: BookingView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<DriverInfo>,
}

/// Driver accepts a requested booking; first caller wins.
pub async fn accept(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<BookingResponse>> {
    let booking = lifecycle::accept_booking(&state, claims.sub, booking_id).await?;
    Ok(Json(BookingResponse {
        booking: BookingView::from_model(booking, false),
    }))
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub otp: String,
}

/// Driver submits the rider's OTP to start the trip.
pub async fn verify_otp(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<VerifyOtpRequest>,
) -> AppResult<Json<BookingResponse>> {
    let booking =
        lifecycle::verify_otp_and_start(&state, claims.sub, booking_id, &payload.otp).await?;
    Ok(Json(BookingResponse {
        booking: BookingView::from_model(booking, false),
    }))
}

/// Driver marks the trip complete.
pub async fn complete(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<BookingResponse>> {
    let booking = lifecycle::complete_ride(&state, claims.sub, booking_id).await?;
    Ok(Json(BookingResponse {
        booking: BookingView::from_model(booking, false),
    }))
}

/// Rider cancels a not-yet-started booking.
pub async fn cancel(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<BookingResponse>> {
    let booking = lifecycle::cancel_booking(&state, claims.sub, booking_id).await?;
    Ok(Json(BookingResponse {
        booking: BookingView::from_model(booking, true),
    }))
}

/// Fetch one booking. Any authenticated party may look it up, but the OTP is
/// only revealed to the owning rider.
pub async fn get_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<BookingDetailResponse>> {
    let booking = booking::Entity::find_by_id(booking_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    let driver = match booking.driver_id {
        Some(driver_id) => user::Entity::find_by_id(driver_id)
            .one(&state.db)
            .await?
            .map(|d| DriverInfo::from_user(&d)),
        None => None,
    };

    let is_rider = booking.rider_id == claims.sub;
    Ok(Json(BookingDetailResponse {
        booking: BookingView::from_model(booking, is_rider),
        driver,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_booking() -> booking::Model {
        booking::Model {
            id: Uuid::new_v4(),
            rider_id: Uuid::new_v4(),
            driver_id: Some(Uuid::new_v4()),
            pickup_address: "Connaught Place".to_string(),
            pickup_lng: 77.20,
            pickup_lat: 28.61,
            dest_address: "Noida".to_string(),
            dest_lng: 77.25,
            dest_lat: 28.65,
            ride_type: RideType::Standard,
            fare: 6800,
            distance_km: 6.8,
            estimated_time_min: 18,
            payment_method: PaymentMethod::Cash,
            payment_id: None,
            status: BookingStatus::Accepted,
            otp: Some("123456".to_string()),
            otp_expires_at: Some(Utc::now().fixed_offset()),
            otp_verified: false,
            requested_at: Utc::now().fixed_offset(),
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
        }
    }

    #[test]
    fn otp_redacted_for_non_riders() {
        let view = BookingView::from_model(sample_booking(), false);
        assert!(view.otp.is_none());
        assert!(view.otp_expires_at.is_none());
        let json = serde_json::to_string(&view).expect("serialize");
        assert!(!json.contains("otp\":"));
        assert!(!json.contains("123456"));
    }

    #[test]
    fn otp_visible_to_owning_rider() {
        let view = BookingView::from_model(sample_booking(), true);
        assert_eq!(view.otp.as_deref(), Some("123456"));
    }

    #[test]
    fn view_serializes_camel_case_wire_shape() {
        let view = BookingView::from_model(sample_booking(), true);
        let json = serde_json::to_string(&view).expect("serialize");
        assert!(json.contains(r#""riderId""#));
        assert!(json.contains(r#""distanceKm":6.8"#));
        assert!(json.contains(r#""status":"accepted""#));
        assert!(json.contains(r#""coordinates":[77.2,28.61]"#));
    }
}
