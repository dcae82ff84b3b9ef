use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::entities::booking::{self, BookingStatus};
use crate::entities::user::{self, UserRole};
use crate::error::{AppError, AppResult};
use crate::handlers::booking::BookingView;
use crate::socket::events::ServerEvent;
use crate::socket::registry::booking_room;
use crate::utils::geo::{haversine_km, valid_coordinates};
use crate::utils::jwt::Claims;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LocationUpdate {
    pub lng: f64,
    pub lat: f64,
}

/// Driver reports a position fix. The write is durable; the relay to the
/// active booking room is best-effort.
pub async fn update_location(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<LocationUpdate>,
) -> AppResult<Json<Value>> {
    if !valid_coordinates(payload.lng, payload.lat) {
        return Err(AppError::BadRequest("Invalid coordinates".to_string()));
    }

    let driver = user::Entity::find_by_id(claims.sub)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let current_booking = driver.current_booking_id;
    let mut active: user::ActiveModel = driver.into();
    active.location_lng = Set(Some(payload.lng));
    active.location_lat = Set(Some(payload.lat));
    active.update(&state.db).await?;

    let event = ServerEvent::DriverLocation {
        driver_id: claims.sub,
        lng: payload.lng,
        lat: payload.lat,
    };
    match current_booking {
        Some(booking_id) => {
            state
                .sockets
                .emit_to_room(&booking_room(booking_id), &event)
                .await
        }
        None => state.sockets.emit_to_user(claims.sub, &event).await,
    }

    Ok(Json(json!({
        "ok": true,
        "location": { "coordinates": [payload.lng, payload.lat] }
    })))
}

/// Toggle the driver's online flag.
pub async fn toggle_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Value>> {
    let driver = user::Entity::find_by_id(claims.sub)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let is_online = !driver.is_online;
    let mut active: user::ActiveModel = driver.into();
    active.is_online = Set(is_online);
    active.update(&state.db).await?;

    state
        .sockets
        .emit_to_user(claims.sub, &ServerEvent::DriverStatus { is_online })
        .await;

    Ok(Json(json!({ "isOnline": is_online })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_km: Option<f64>,
}

/// Public count of online drivers, optionally within a radius of a point.
pub async fn available_drivers(
    State(state): State<AppState>,
    Query(query): Query<AvailableQuery>,
) -> AppResult<Json<Value>> {
    let drivers = user::Entity::find()
        .filter(user::Column::Role.eq(UserRole::Driver))
        .filter(user::Column::IsOnline.eq(true))
        .all(&state.db)
        .await?;

    let available = match (query.lng, query.lat) {
        (Some(lng), Some(lat)) => {
            let radius = query.radius_km.unwrap_or(state.config.search_radius_km);
            drivers
                .iter()
                .filter(|d| match (d.location_lng, d.location_lat) {
                    (Some(dlng), Some(dlat)) => haversine_km(lng, lat, dlng, dlat) <= radius,
                    _ => false,
                })
                .count()
        }
        _ => drivers.len(),
    };

    Ok(Json(json!({ "available": available })))
}

#[derive(Debug, Serialize, PartialEq)]
pub struct TodayStats {
    pub earnings: i64,
    pub rides: u32,
    pub hours: f64,
    pub rating: f64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct DayEarnings {
    pub day: String,
    pub earnings: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub driver: user::Model,
    pub active_ride: Option<BookingView>,
    pub today_stats: TodayStats,
    pub weekly_stats: Vec<DayEarnings>,
}

/// Driver dashboard: active ride plus earnings aggregates over the last
/// seven days of completed bookings. Reads recompute from bookings as the
/// source of truth, tolerating transient skew on the driver record.
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<DashboardResponse>> {
    let driver = user::Entity::find_by_id(claims.sub)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let active_ride = booking::Entity::find()
        .filter(booking::Column::DriverId.eq(claims.sub))
        .filter(booking::Column::Status.is_in([BookingStatus::Accepted, BookingStatus::Started]))
        .one(&state.db)
        .await?;

    let now = Utc::now();
    let window_start = week_window_start(now);
    let completed = booking::Entity::find()
        .filter(booking::Column::DriverId.eq(claims.sub))
        .filter(booking::Column::Status.eq(BookingStatus::Completed))
        .filter(booking::Column::CompletedAt.gte(window_start.fixed_offset()))
        .all(&state.db)
        .await?;

    let (mut today_stats, weekly_stats) = build_stats(&completed, now);
    today_stats.rating = driver.rating;

    Ok(Json(DashboardResponse {
        driver,
        active_ride: active_ride.map(|b| BookingView::from_model(b, false)),
        today_stats,
        weekly_stats,
    }))
}

/// Midnight six days ago; the window covers seven buckets including today.
fn week_window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc() - Duration::days(6)
}

/// Bucket completed bookings into per-day earnings (oldest first) and roll up
/// today's totals. Driving hours sum started->completed durations.
fn build_stats(completed: &[booking::Model], now: DateTime<Utc>) -> (TodayStats, Vec<DayEarnings>) {
    let window_start = week_window_start(now);
    let start_of_today = window_start + Duration::days(6);

    let mut weekly: Vec<DayEarnings> = (0..7)
        .map(|i| DayEarnings {
            day: (window_start + Duration::days(i)).format("%a").to_string(),
            earnings: 0,
        })
        .collect();

    let mut today_earnings = 0i64;
    let mut today_rides = 0u32;
    let mut total_ride_secs = 0i64;

    for b in completed {
        let Some(completed_at) = b.completed_at else {
            continue;
        };
        let completed_at = completed_at.with_timezone(&Utc);

        let day_index = (completed_at - window_start).num_days();
        if (0..7).contains(&day_index) {
            weekly[day_index as usize].earnings += b.fare;
        }

        if completed_at >= start_of_today {
            today_earnings += b.fare;
            today_rides += 1;
        }

        if let Some(started_at) = b.started_at {
            let secs = (completed_at - started_at.with_timezone(&Utc)).num_seconds();
            if secs > 0 {
                total_ride_secs += secs;
            }
        }
    }

    let hours = (total_ride_secs as f64 / 3600.0 * 10.0).round() / 10.0;

    (
        TodayStats {
            earnings: today_earnings,
            rides: today_rides,
            hours,
            rating: 5.0,
        },
        weekly,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::booking::{PaymentMethod, RideType};
    use uuid::Uuid;

    fn completed_booking(
        fare: i64,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> booking::Model {
        booking::Model {
            id: Uuid::new_v4(),
            rider_id: Uuid::new_v4(),
            driver_id: Some(Uuid::new_v4()),
            pickup_address: String::new(),
            pickup_lng: 77.2,
            pickup_lat: 28.6,
            dest_address: String::new(),
            dest_lng: 77.25,
            dest_lat: 28.65,
            ride_type: RideType::Standard,
            fare,
            distance_km: 5.0,
            estimated_time_min: 15,
            payment_method: PaymentMethod::Cash,
            payment_id: None,
            status: BookingStatus::Completed,
            otp: Some("123456".to_string()),
            otp_expires_at: None,
            otp_verified: true,
            requested_at: started_at.fixed_offset(),
            started_at: Some(started_at.fixed_offset()),
            completed_at: Some(completed_at.fixed_offset()),
            cancelled_at: None,
            cancellation_reason: None,
        }
    }

    #[test]
    fn todays_rides_counted_and_bucketed_last() {
        let now = Utc::now();
        let earlier_today = week_window_start(now) + Duration::days(6) + Duration::hours(1);
        let bookings = vec![completed_booking(
            5000,
            earlier_today,
            earlier_today + Duration::minutes(30),
        )];

        let (today, weekly) = build_stats(&bookings, now);
        assert_eq!(today.earnings, 5000);
        assert_eq!(today.rides, 1);
        assert_eq!(today.hours, 0.5);
        assert_eq!(weekly.len(), 7);
        assert_eq!(weekly[6].earnings, 5000);
        assert_eq!(weekly[..6].iter().map(|d| d.earnings).sum::<i64>(), 0);
    }

    #[test]
    fn older_rides_bucket_by_day_but_not_today() {
        let now = Utc::now();
        let three_days_ago = week_window_start(now) + Duration::days(3) + Duration::hours(12);
        let bookings = vec![
            completed_booking(2000, three_days_ago, three_days_ago + Duration::minutes(20)),
            completed_booking(3000, three_days_ago, three_days_ago + Duration::minutes(40)),
        ];

        let (today, weekly) = build_stats(&bookings, now);
        assert_eq!(today.rides, 0);
        assert_eq!(today.earnings, 0);
        assert_eq!(weekly[3].earnings, 5000);
        assert_eq!(today.hours, 1.0);
    }

    #[test]
    fn out_of_window_rides_ignored() {
        let now = Utc::now();
        let long_ago = week_window_start(now) - Duration::days(3);
        let bookings = vec![completed_booking(9000, long_ago, long_ago + Duration::hours(1))];

        let (today, weekly) = build_stats(&bookings, now);
        assert_eq!(today.rides, 0);
        assert!(weekly.iter().all(|d| d.earnings == 0));
    }

    #[test]
    fn weekday_labels_are_short_names() {
        let (_, weekly) = build_stats(&[], Utc::now());
        assert_eq!(weekly.len(), 7);
        for day in weekly {
            assert_eq!(day.day.len(), 3);
        }
    }
}
