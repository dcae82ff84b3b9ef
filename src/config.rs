use std::env;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub server_host: String,
    pub server_port: u16,
    /// Flat fare rate in rupees per kilometre.
    pub per_km_rate: f64,
    pub mapbox_token: Option<String>,
    pub razorpay_key_id: Option<String>,
    pub razorpay_key_secret: Option<String>,
    /// Radius used for the public "drivers nearby" count.
    pub search_radius_km: f64,
    /// Wider radius used for ride-request fan-out; accept has no distance gate.
    pub notify_radius_km: f64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            database_url: env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET")
                .expect("JWT_SECRET must be set"),
            jwt_expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                .unwrap_or_else(|_| "168".to_string())
                .parse()
                .expect("JWT_EXPIRATION_HOURS must be a number"),
            server_host: env::var("SERVER_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .expect("SERVER_PORT must be a number"),
            per_km_rate: env::var("PER_KM_RATE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .expect("PER_KM_RATE must be a number"),
            mapbox_token: env::var("MAPBOX_TOKEN").ok(),
            razorpay_key_id: env::var("RAZORPAY_KEY_ID").ok(),
            razorpay_key_secret: env::var("RAZORPAY_KEY_SECRET").ok(),
            search_radius_km: env::var("SEARCH_RADIUS_KM")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .expect("SEARCH_RADIUS_KM must be a number"),
            notify_radius_km: env::var("NOTIFY_RADIUS_KM")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .expect("NOTIFY_RADIUS_KM must be a number"),
        }
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
