//! Routing collaborator (Mapbox Directions). Distance and duration are
//! consumed, never computed. A failed lookup degrades to zeros rather than
//! failing the booking flow.

use serde::Deserialize;

use crate::config::Config;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RouteEstimate {
    pub distance_km: f64,
    pub duration_min: i32,
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct Route {
    /// meters
    distance: f64,
    /// seconds
    duration: f64,
}

/// Fetch driving distance/duration for pickup -> destination. Non-essential:
/// any failure (no token, network, empty route) logs a warning and yields the
/// zero estimate so the request still goes through.
pub async fn estimate_route(
    config: &Config,
    pickup: (f64, f64),
    destination: (f64, f64),
) -> RouteEstimate {
    let Some(token) = config.mapbox_token.as_deref() else {
        tracing::warn!("MAPBOX_TOKEN not set, skipping directions lookup");
        return RouteEstimate::default();
    };

    let url = format!(
        "https://api.mapbox.com/directions/v5/mapbox/driving/{},{};{},{}",
        pickup.0, pickup.1, destination.0, destination.1
    );

    let result = async {
        let response = reqwest::Client::new()
            .get(&url)
            .query(&[("geometries", "geojson"), ("overview", "full"), ("access_token", token)])
            .send()
            .await?
            .error_for_status()?
            .json::<DirectionsResponse>()
            .await?;
        Ok::<_, reqwest::Error>(response)
    }
    .await;

    match result {
        Ok(response) => match response.routes.first() {
            Some(route) => route_to_estimate(route.distance, route.duration),
            None => {
                tracing::warn!("directions API returned no routes");
                RouteEstimate::default()
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "directions lookup failed, defaulting to zero");
            RouteEstimate::default()
        }
    }
}

fn route_to_estimate(distance_m: f64, duration_s: f64) -> RouteEstimate {
    RouteEstimate {
        // one decimal place
        distance_km: (distance_m / 1000.0 * 10.0).round() / 10.0,
        duration_min: ((duration_s / 60.0).round() as i32).max(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_rounded_to_one_decimal() {
        let est = route_to_estimate(6789.0, 900.0);
        assert_eq!(est.distance_km, 6.8);
        assert_eq!(est.duration_min, 15);
    }

    #[test]
    fn duration_floors_at_one_minute() {
        let est = route_to_estimate(200.0, 12.0);
        assert_eq!(est.duration_min, 1);
    }
}
