//! Payment gateway collaborator (Razorpay): order creation and signature
//! verification. Unlike directions, this dependency is load-bearing; failures
//! propagate to the caller and leave the booking untouched.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::Config;
use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

const ORDERS_URL: &str = "https://api.razorpay.com/v1/orders";

#[derive(Debug, Serialize)]
struct OrderRequest<'a> {
    /// Smallest currency unit (paise).
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

fn credentials(config: &Config) -> AppResult<(&str, &str)> {
    match (config.razorpay_key_id.as_deref(), config.razorpay_key_secret.as_deref()) {
        (Some(id), Some(secret)) => Ok((id, secret)),
        _ => Err(AppError::Dependency(
            "Payment gateway not configured".to_string(),
        )),
    }
}

/// Create a payable order for `amount` paise.
pub async fn create_order(config: &Config, amount: i64, receipt: &str) -> AppResult<ProviderOrder> {
    let (key_id, key_secret) = credentials(config)?;

    let order = reqwest::Client::new()
        .post(ORDERS_URL)
        .basic_auth(key_id, Some(key_secret))
        .json(&OrderRequest { amount, currency: "INR", receipt })
        .send()
        .await
        .map_err(|e| AppError::Dependency(format!("Payment order request failed: {}", e)))?
        .error_for_status()
        .map_err(|e| AppError::Dependency(format!("Payment order rejected: {}", e)))?
        .json::<ProviderOrder>()
        .await
        .map_err(|e| AppError::Dependency(format!("Invalid payment order response: {}", e)))?;

    Ok(order)
}

/// HMAC-SHA256 over `order_id|payment_id`, hex-encoded, as the gateway signs it.
pub fn expected_signature(key_secret: &str, order_id: &str, payment_id: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(key_secret.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

pub fn verify_signature(
    config: &Config,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> AppResult<bool> {
    let (_, key_secret) = credentials(config)?;
    Ok(expected_signature(key_secret, order_id, payment_id) == signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_signature_verifies() {
        let sig = expected_signature("secret", "order_abc", "pay_xyz");
        assert_eq!(sig.len(), 64);
        assert_eq!(sig, expected_signature("secret", "order_abc", "pay_xyz"));
    }

    #[test]
    fn tampered_inputs_change_signature() {
        let sig = expected_signature("secret", "order_abc", "pay_xyz");
        assert_ne!(sig, expected_signature("secret", "order_abc", "pay_other"));
        assert_ne!(sig, expected_signature("secret", "order_other", "pay_xyz"));
        assert_ne!(sig, expected_signature("other-secret", "order_abc", "pay_xyz"));
    }
}
