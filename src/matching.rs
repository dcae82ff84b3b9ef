//! Geospatial driver discovery: nearest online drivers around a pickup point.
//!
//! Candidates within the wide notify radius receive the `ride:request`
//! broadcast; acceptance itself has no distance gate, the atomic accept race
//! de-duplicates downstream.

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::entities::user::{self, UserRole};
use crate::error::AppResult;
use crate::utils::geo::haversine_km;

/// Practical cap on the notification target set.
pub const MAX_CANDIDATES: usize = 20;

#[derive(Debug)]
pub struct Candidate {
    pub driver: user::Model,
    pub distance_km: f64,
}

/// Find online drivers within `radius_km` of the pickup point, nearest first.
pub async fn find_candidates(
    db: &DatabaseConnection,
    pickup_lng: f64,
    pickup_lat: f64,
    radius_km: f64,
) -> AppResult<Vec<Candidate>> {
    let drivers = user::Entity::find()
        .filter(user::Column::Role.eq(UserRole::Driver))
        .filter(user::Column::IsOnline.eq(true))
        .all(db)
        .await?;

    Ok(rank_candidates(drivers, pickup_lng, pickup_lat, radius_km, MAX_CANDIDATES))
}

/// Rank drivers by distance from the pickup point, dropping those without a
/// known location or outside the radius.
pub fn rank_candidates(
    drivers: Vec<user::Model>,
    pickup_lng: f64,
    pickup_lat: f64,
    radius_km: f64,
    limit: usize,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = drivers
        .into_iter()
        .filter_map(|driver| {
            let (lng, lat) = (driver.location_lng?, driver.location_lat?);
            let distance_km = haversine_km(pickup_lng, pickup_lat, lng, lat);
            (distance_km <= radius_km).then_some(Candidate { driver, distance_km })
        })
        .collect();

    candidates.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    candidates.truncate(limit);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn driver_at(name: &str, lng: Option<f64>, lat: Option<f64>) -> user::Model {
        user::Model {
            id: Uuid::new_v4(),
            email: format!("{}@rideflow.app", name),
            password_hash: String::new(),
            name: name.to_string(),
            phone: None,
            role: UserRole::Driver,
            vehicle: None,
            rating: 5.0,
            is_online: true,
            location_lng: lng,
            location_lat: lat,
            current_booking_id: None,
            created_at: Utc::now().fixed_offset(),
        }
    }

    #[test]
    fn nearest_first_within_radius() {
        let drivers = vec![
            driver_at("far", Some(77.35), Some(28.75)),
            driver_at("near", Some(77.205), Some(28.615)),
            driver_at("mid", Some(77.25), Some(28.65)),
        ];

        let ranked = rank_candidates(drivers, 77.20, 28.61, 20.0, 10);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].driver.name, "near");
        assert_eq!(ranked[1].driver.name, "mid");
        assert!(ranked[0].distance_km < ranked[1].distance_km);
    }

    #[test]
    fn outside_radius_excluded() {
        // Mumbai driver is ~1100 km from a Delhi pickup
        let drivers = vec![
            driver_at("delhi", Some(77.21), Some(28.62)),
            driver_at("mumbai", Some(72.87), Some(19.07)),
        ];

        let ranked = rank_candidates(drivers, 77.20, 28.61, 20.0, 10);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].driver.name, "delhi");
    }

    #[test]
    fn drivers_without_location_skipped_and_limit_applied() {
        let mut drivers = vec![driver_at("nowhere", None, None)];
        for i in 0..30 {
            drivers.push(driver_at(
                &format!("d{}", i),
                Some(77.20 + f64::from(i) * 0.001),
                Some(28.61),
            ));
        }

        let ranked = rank_candidates(drivers, 77.20, 28.61, 20.0, MAX_CANDIDATES);
        assert_eq!(ranked.len(), MAX_CANDIDATES);
        assert!(ranked.iter().all(|c| c.driver.location_lng.is_some()));
    }
}
