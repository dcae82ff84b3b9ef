//! Booking Lifecycle Engine: validates transitions, runs geospatial matching,
//! issues OTPs and orchestrates the side effects of every state change.
//!
//! Every mutation of a booking is a status-guarded conditional update, never a
//! read-modify-write. Where a booking mutation is mirrored on the driver
//! record (assignment, freeing) the booking is written first so the dashboard
//! read path only ever sees the transient skew in one direction.

use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus, PaymentMethod, RideType};
use crate::entities::user;
use crate::error::{AppError, AppResult};
use crate::matching;
use crate::services::directions;
use crate::socket::events::{DriverInfo, Place, RideRequestPayload, RiderSummary, ServerEvent};
use crate::socket::registry::{booking_room, DRIVERS_ROOM};
use crate::utils::geo::valid_coordinates;
use crate::utils::otp::{self, OtpError};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideRequest {
    pub pickup: Place,
    pub destination: Place,
    #[serde(default)]
    pub ride_type: Option<RideType>,
    /// Accepted from clients for backwards compatibility, never trusted:
    /// the server-computed fare always wins.
    #[serde(default)]
    pub fare: Option<i64>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
}

/// `fare = round(distance_km * per_km_rate * 100)` in smallest currency unit.
pub fn compute_fare(distance_km: f64, per_km_rate: f64) -> i64 {
    (distance_km * per_km_rate * 100.0).round() as i64
}

async fn load_booking(db: &DatabaseConnection, id: Uuid) -> AppResult<booking::Model> {
    booking::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
}

async fn load_user(db: &DatabaseConnection, id: Uuid) -> AppResult<user::Model> {
    user::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Rider submits a ride request. Online payment gates matching behind the
/// payment callback; cash rides fan out to candidate drivers immediately.
pub async fn request_ride(
    state: &AppState,
    rider: &user::Model,
    request: RideRequest,
) -> AppResult<booking::Model> {
    let pickup = &request.pickup;
    let destination = &request.destination;

    if !valid_coordinates(pickup.location.lng(), pickup.location.lat()) {
        return Err(AppError::BadRequest("Invalid pickup coordinates".to_string()));
    }
    if !valid_coordinates(destination.location.lng(), destination.location.lat()) {
        return Err(AppError::BadRequest(
            "Invalid destination coordinates".to_string(),
        ));
    }

    let estimate = directions::estimate_route(
        &state.config,
        (pickup.location.lng(), pickup.location.lat()),
        (destination.location.lng(), destination.location.lat()),
    )
    .await;

    let fare = compute_fare(estimate.distance_km, state.config.per_km_rate);
    if request.fare.is_some_and(|f| f != fare) {
        tracing::warn!(
            client_fare = ?request.fare,
            computed_fare = fare,
            "ignoring client-supplied fare"
        );
    }

    let payment_method = request.payment_method.unwrap_or(PaymentMethod::Online);
    let status = match payment_method {
        PaymentMethod::Online => BookingStatus::PendingPayment,
        PaymentMethod::Cash => BookingStatus::Requested,
    };

    let new_booking = booking::ActiveModel {
        id: Set(Uuid::new_v4()),
        rider_id: Set(rider.id),
        driver_id: Set(None),
        pickup_address: Set(pickup.address.clone()),
        pickup_lng: Set(pickup.location.lng()),
        pickup_lat: Set(pickup.location.lat()),
        dest_address: Set(destination.address.clone()),
        dest_lng: Set(destination.location.lng()),
        dest_lat: Set(destination.location.lat()),
        ride_type: Set(request.ride_type.unwrap_or(RideType::Standard)),
        fare: Set(fare),
        distance_km: Set(estimate.distance_km),
        estimated_time_min: Set(estimate.duration_min),
        payment_method: Set(payment_method),
        status: Set(status),
        otp_verified: Set(false),
        requested_at: Set(Utc::now().fixed_offset()),
        ..Default::default()
    };

    let booking = new_booking.insert(&state.db).await?;
    tracing::info!(booking_id = %booking.id, rider_id = %rider.id, ?status, "booking created");

    if booking.payment_method == PaymentMethod::Cash {
        notify_candidates(state, &booking, rider).await?;
    }

    Ok(booking)
}

/// Broadcast `ride:request` to candidate drivers around the pickup point:
/// directly to each connected candidate, plus the shared drivers room so
/// stale online flags cannot hide a request entirely.
pub async fn notify_candidates(
    state: &AppState,
    booking: &booking::Model,
    rider: &user::Model,
) -> AppResult<()> {
    let candidates = matching::find_candidates(
        &state.db,
        booking.pickup_lng,
        booking.pickup_lat,
        state.config.notify_radius_km,
    )
    .await?;

    tracing::info!(
        booking_id = %booking.id,
        candidates = candidates.len(),
        "notifying nearby drivers"
    );

    let payload = RideRequestPayload {
        booking_id: booking.id,
        rider: RiderSummary {
            id: rider.id,
            name: rider.name.clone(),
        },
        pickup: booking_place(booking, true),
        destination: booking_place(booking, false),
        fare: booking.fare,
        ride_type: booking.ride_type,
        distance_km: booking.distance_km,
        estimated_time_min: booking.estimated_time_min,
    };

    let event = ServerEvent::RideRequest(payload);
    for candidate in &candidates {
        if state.sockets.is_connected(candidate.driver.id).await {
            state.sockets.emit_to_user(candidate.driver.id, &event).await;
        }
    }
    state.sockets.emit_to_room(DRIVERS_ROOM, &event).await;

    Ok(())
}

/// Payment gateway confirmed: `pending_payment -> requested`, then matching.
/// Idempotent for bookings already past the payment gate.
pub async fn confirm_payment(state: &AppState, booking_id: Uuid, payment_id: Uuid) -> AppResult<()> {
    let result = booking::Entity::update_many()
        .col_expr(booking::Column::Status, Expr::value(BookingStatus::Requested))
        .col_expr(booking::Column::PaymentId, Expr::value(Some(payment_id)))
        .filter(booking::Column::Id.eq(booking_id))
        .filter(booking::Column::Status.eq(BookingStatus::PendingPayment))
        .exec(&state.db)
        .await?;

    if result.rows_affected == 0 {
        tracing::debug!(%booking_id, "payment confirmed for booking not awaiting payment");
        return Ok(());
    }

    let booking = load_booking(&state.db, booking_id).await?;
    let rider = load_user(&state.db, booking.rider_id).await?;
    notify_candidates(state, &booking, &rider).await
}

/// Driver accepts. The assignment is a single conditional update keyed on
/// `status == requested`; of N concurrent callers exactly one sees a row
/// updated, the rest get "Booking not available".
pub async fn accept_booking(
    state: &AppState,
    driver_id: Uuid,
    booking_id: Uuid,
) -> AppResult<booking::Model> {
    let driver = load_user(&state.db, driver_id).await?;

    // confirm it exists before racing, for a clean 404
    load_booking(&state.db, booking_id).await?;

    let now = Utc::now();
    let code = otp::generate_otp();

    let result = booking::Entity::update_many()
        .col_expr(booking::Column::Status, Expr::value(BookingStatus::Accepted))
        .col_expr(booking::Column::DriverId, Expr::value(Some(driver_id)))
        .col_expr(booking::Column::Otp, Expr::value(Some(code.clone())))
        .col_expr(
            booking::Column::OtpExpiresAt,
            Expr::value(Some(otp::expiry_from(now))),
        )
        .col_expr(booking::Column::OtpVerified, Expr::value(false))
        .filter(booking::Column::Id.eq(booking_id))
        .filter(booking::Column::Status.eq(BookingStatus::Requested))
        .exec(&state.db)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::Conflict("Booking not available".to_string()));
    }

    let booking = load_booking(&state.db, booking_id).await?;
    tracing::info!(%booking_id, %driver_id, "booking accepted");

    // booking row is committed; now mirror onto the driver record
    let mut active: user::ActiveModel = driver.clone().into();
    active.current_booking_id = Set(Some(booking_id));
    // stay online so the dashboard shows the active ride
    active.is_online = Set(true);
    active.update(&state.db).await?;

    let room = booking_room(booking_id);
    state.sockets.join_user_to_room(driver_id, &room).await;
    state.sockets.join_user_to_room(booking.rider_id, &room).await;

    state
        .sockets
        .emit_to_user(
            booking.rider_id,
            &ServerEvent::RideAccepted {
                booking_id,
                driver_id,
                driver_info: Some(DriverInfo::from_user(&driver)),
                fare: Some(booking.fare),
                payment_method: Some(booking.payment_method),
                distance_km: Some(booking.distance_km),
                estimated_time_min: Some(booking.estimated_time_min),
                otp: booking.otp.clone(),
            },
        )
        .await;

    state
        .sockets
        .emit_to_room(
            &room,
            &ServerEvent::RideConfirmed {
                booking_id,
                driver_id,
                fare: Some(booking.fare),
                payment_method: Some(booking.payment_method),
            },
        )
        .await;

    Ok(booking)
}

/// Driver submits the rider's OTP to start the trip. Expiry is checked here,
/// at use time; an expired-but-unverified booking stays `accepted`.
pub async fn verify_otp_and_start(
    state: &AppState,
    driver_id: Uuid,
    booking_id: Uuid,
    provided_otp: &str,
) -> AppResult<booking::Model> {
    if provided_otp.trim().is_empty() {
        return Err(AppError::BadRequest("OTP required".to_string()));
    }

    let booking = load_booking(&state.db, booking_id).await?;

    if booking.driver_id != Some(driver_id) {
        return Err(AppError::Forbidden("Not your booking".to_string()));
    }
    if booking.status != BookingStatus::Accepted {
        return Err(AppError::BadRequest(
            "Booking not in accepted state".to_string(),
        ));
    }

    let now = Utc::now();
    otp::verify(booking.otp.as_deref(), booking.otp_expires_at, provided_otp, now).map_err(
        |e| match e {
            OtpError::Expired => AppError::BadRequest("OTP expired".to_string()),
            OtpError::Mismatch | OtpError::Missing => {
                AppError::BadRequest("Invalid OTP".to_string())
            }
        },
    )?;

    let started_at = now.fixed_offset();
    let result = booking::Entity::update_many()
        .col_expr(booking::Column::Status, Expr::value(BookingStatus::Started))
        .col_expr(booking::Column::OtpVerified, Expr::value(true))
        .col_expr(booking::Column::StartedAt, Expr::value(Some(started_at)))
        .filter(booking::Column::Id.eq(booking_id))
        .filter(booking::Column::Status.eq(BookingStatus::Accepted))
        .exec(&state.db)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::Conflict("Booking not available".to_string()));
    }

    tracing::info!(%booking_id, %driver_id, "ride started");

    state
        .sockets
        .emit_to_room(
            &booking_room(booking_id),
            &ServerEvent::RideStarted { booking_id, started_at },
        )
        .await;

    load_booking(&state.db, booking_id).await
}

/// Driver marks the trip complete; frees the driver for new requests.
pub async fn complete_ride(
    state: &AppState,
    driver_id: Uuid,
    booking_id: Uuid,
) -> AppResult<booking::Model> {
    let booking = load_booking(&state.db, booking_id).await?;

    if booking.driver_id != Some(driver_id) {
        return Err(AppError::Forbidden("Not your booking".to_string()));
    }
    if booking.status != BookingStatus::Started {
        return Err(AppError::BadRequest("Ride not in progress".to_string()));
    }

    let result = booking::Entity::update_many()
        .col_expr(booking::Column::Status, Expr::value(BookingStatus::Completed))
        .col_expr(
            booking::Column::CompletedAt,
            Expr::value(Some(Utc::now().fixed_offset())),
        )
        .filter(booking::Column::Id.eq(booking_id))
        .filter(booking::Column::Status.eq(BookingStatus::Started))
        .exec(&state.db)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::Conflict("Booking not available".to_string()));
    }

    free_driver(&state.db, driver_id).await?;
    tracing::info!(%booking_id, %driver_id, "ride completed");

    state
        .sockets
        .emit_to_room(
            &booking_room(booking_id),
            &ServerEvent::RideCompleted { booking_id },
        )
        .await;

    load_booking(&state.db, booking_id).await
}

/// Rider cancels a not-yet-started booking. The rider is notified visibly;
/// an assigned driver only receives the silent dashboard refresh.
pub async fn cancel_booking(
    state: &AppState,
    rider_id: Uuid,
    booking_id: Uuid,
) -> AppResult<booking::Model> {
    let booking = load_booking(&state.db, booking_id).await?;

    if booking.rider_id != rider_id {
        return Err(AppError::Forbidden(
            "Only the rider who created the booking can cancel it".to_string(),
        ));
    }
    if !booking.status.can_transition_to(BookingStatus::Cancelled) {
        return Err(AppError::BadRequest("Cannot cancel this booking".to_string()));
    }

    let result = booking::Entity::update_many()
        .col_expr(booking::Column::Status, Expr::value(BookingStatus::Cancelled))
        .col_expr(
            booking::Column::CancelledAt,
            Expr::value(Some(Utc::now().fixed_offset())),
        )
        .col_expr(
            booking::Column::CancellationReason,
            Expr::value(Some("cancelled by rider".to_string())),
        )
        .filter(booking::Column::Id.eq(booking_id))
        .filter(booking::Column::Status.is_in([
            BookingStatus::Requested,
            BookingStatus::PendingPayment,
            BookingStatus::Accepted,
        ]))
        .exec(&state.db)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::BadRequest("Cannot cancel this booking".to_string()));
    }

    tracing::info!(%booking_id, %rider_id, "booking cancelled");

    // Reload before freeing: an accept may have landed between the snapshot
    // above and the cancel update, so the assigned driver is only known from
    // the row as it was cancelled.
    let booking = load_booking(&state.db, booking_id).await?;

    if let Some(driver_id) = booking.driver_id {
        free_driver(&state.db, driver_id).await?;
    }
    for (user_id, event) in cancellation_events(&booking) {
        state.sockets.emit_to_user(user_id, &event).await;
    }

    Ok(booking)
}

/// Fan-out for a cancelled booking: the assigned driver (if any) gets the
/// silent clear, the rider gets the visible cancellation.
fn cancellation_events(booking: &booking::Model) -> Vec<(Uuid, ServerEvent)> {
    let mut events = Vec::new();
    if let Some(driver_id) = booking.driver_id {
        events.push((
            driver_id,
            ServerEvent::DriverBookingCleared { booking_id: booking.id },
        ));
    }
    events.push((
        booking.rider_id,
        ServerEvent::BookingCancelled { booking_id: booking.id },
    ));
    events
}

/// Clear the driver's active booking and put them back in the online pool.
async fn free_driver(db: &DatabaseConnection, driver_id: Uuid) -> AppResult<()> {
    let driver = load_user(db, driver_id).await?;
    let mut active: user::ActiveModel = driver.into();
    active.current_booking_id = Set(None);
    active.is_online = Set(true);
    active.update(db).await?;
    Ok(())
}

fn booking_place(booking: &booking::Model, pickup: bool) -> Place {
    use crate::socket::events::GeoPoint;
    if pickup {
        Place {
            address: booking.pickup_address.clone(),
            location: GeoPoint {
                coordinates: [booking.pickup_lng, booking.pickup_lat],
            },
        }
    } else {
        Place {
            address: booking.dest_address.clone(),
            location: GeoPoint {
                coordinates: [booking.dest_lng, booking.dest_lat],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cancelled_booking(driver_id: Option<Uuid>) -> booking::Model {
        booking::Model {
            id: Uuid::new_v4(),
            rider_id: Uuid::new_v4(),
            driver_id,
            pickup_address: "A".to_string(),
            pickup_lng: 77.20,
            pickup_lat: 28.61,
            dest_address: "B".to_string(),
            dest_lng: 77.25,
            dest_lat: 28.65,
            ride_type: RideType::Standard,
            fare: 6800,
            distance_km: 6.8,
            estimated_time_min: 18,
            payment_method: PaymentMethod::Cash,
            payment_id: None,
            status: BookingStatus::Cancelled,
            otp: None,
            otp_expires_at: None,
            otp_verified: false,
            requested_at: Utc::now().fixed_offset(),
            started_at: None,
            completed_at: None,
            cancelled_at: Some(Utc::now().fixed_offset()),
            cancellation_reason: Some("cancelled by rider".to_string()),
        }
    }

    #[test]
    fn cancellation_clears_driver_assigned_after_the_initial_read() {
        // The rider's permission check may have seen the booking while it was
        // still unassigned; the fan-out is driven by the row as cancelled,
        // where a concurrent accept has already written the driver.
        let driver_id = Uuid::new_v4();
        let booking = cancelled_booking(Some(driver_id));

        let events = cancellation_events(&booking);
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            (
                driver_id,
                ServerEvent::DriverBookingCleared { booking_id: booking.id }
            )
        );
        assert_eq!(
            events[1],
            (
                booking.rider_id,
                ServerEvent::BookingCancelled { booking_id: booking.id }
            )
        );
    }

    #[test]
    fn cancellation_of_unassigned_booking_notifies_rider_only() {
        let booking = cancelled_booking(None);
        let events = cancellation_events(&booking);
        assert_eq!(
            events,
            vec![(
                booking.rider_id,
                ServerEvent::BookingCancelled { booking_id: booking.id }
            )]
        );
    }

    #[test]
    fn fare_is_rounded_paise() {
        // 6.8 km at 10 rupees/km = 68 rupees = 6800 paise
        assert_eq!(compute_fare(6.8, 10.0), 6800);
        assert_eq!(compute_fare(0.0, 10.0), 0);
        // rounding, not truncation
        assert_eq!(compute_fare(1.234, 10.0), 1234);
        assert_eq!(compute_fare(0.0049, 10.0), 5);
    }

    #[test]
    fn client_fare_field_parses_but_is_optional() {
        let json = r#"{
            "pickup": {"address":"A","location":{"coordinates":[77.20,28.61]}},
            "destination": {"address":"B","location":{"coordinates":[77.25,28.65]}},
            "rideType": "standard",
            "fare": 9999,
            "paymentMethod": "cash"
        }"#;
        let req: RideRequest = serde_json::from_str(json).expect("parse");
        assert_eq!(req.fare, Some(9999));
        assert_eq!(req.payment_method, Some(PaymentMethod::Cash));

        let minimal = r#"{
            "pickup": {"location":{"coordinates":[77.20,28.61]}},
            "destination": {"location":{"coordinates":[77.25,28.65]}}
        }"#;
        let req: RideRequest = serde_json::from_str(minimal).expect("parse");
        assert_eq!(req.fare, None);
        assert_eq!(req.ride_type, None);
    }
}
