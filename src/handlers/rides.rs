use axum::{extract::State, Extension, Json};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;

use crate::entities::{booking, user};
use crate::error::{AppError, AppResult};
use crate::handlers::booking::{BookingResponse, BookingView};
use crate::lifecycle::{self, RideRequest};
use crate::utils::jwt::Claims;
use crate::AppState;

/// Rider requests a ride.
pub async fn request_ride(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<RideRequest>,
) -> AppResult<Json<BookingResponse>> {
    let rider = user::Entity::find_by_id(claims.sub)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let booking = lifecycle::request_ride(&state, &rider, payload).await?;
    Ok(Json(BookingResponse {
        booking: BookingView::from_model(booking, true),
    }))
}

#[derive(Debug, Serialize)]
pub struct RideListResponse {
    pub bookings: Vec<BookingView>,
}

/// Rider's booking history, newest first.
pub async fn my_rides(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<RideListResponse>> {
    let bookings = booking::Entity::find()
        .filter(booking::Column::RiderId.eq(claims.sub))
        .order_by_desc(booking::Column::RequestedAt)
        .all(&state.db)
        .await?;

    Ok(Json(RideListResponse {
        bookings: bookings
            .into_iter()
            .map(|b| BookingView::from_model(b, true))
            .collect(),
    }))
}
