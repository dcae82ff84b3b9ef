use chrono::{DateTime, Duration, FixedOffset, Utc};
use rand::Rng;

/// OTPs are valid for ten minutes after acceptance; expiry is checked
/// lazily at verification time, never by a background sweep.
pub const OTP_TTL_MINUTES: i64 = 10;

#[derive(Debug, PartialEq, Eq)]
pub enum OtpError {
    Missing,
    Expired,
    Mismatch,
}

/// Uniform 6-digit code, [100000, 999999].
pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

pub fn expiry_from(now: DateTime<Utc>) -> DateTime<FixedOffset> {
    (now + Duration::minutes(OTP_TTL_MINUTES)).fixed_offset()
}

/// Compare stored against provided as trimmed strings. An expired code is
/// rejected even when it matches.
pub fn verify(
    stored: Option<&str>,
    expires_at: Option<DateTime<FixedOffset>>,
    provided: &str,
    now: DateTime<Utc>,
) -> Result<(), OtpError> {
    let stored = stored.map(str::trim).filter(|s| !s.is_empty());
    let Some(stored) = stored else {
        return Err(OtpError::Missing);
    };

    if let Some(expires_at) = expires_at {
        if expires_at < now {
            return Err(OtpError::Expired);
        }
    }

    if stored != provided.trim() {
        return Err(OtpError::Mismatch);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_is_six_digits() {
        for _ in 0..100 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
            assert!(otp.parse::<u32>().unwrap() >= 100_000);
        }
    }

    #[test]
    fn correct_unexpired_otp_verifies() {
        let now = Utc::now();
        let exp = expiry_from(now);
        assert_eq!(verify(Some("123456"), Some(exp), "123456", now), Ok(()));
        // trimmed comparison
        assert_eq!(verify(Some("123456"), Some(exp), " 123456 ", now), Ok(()));
    }

    #[test]
    fn expired_otp_rejected_even_when_correct() {
        let now = Utc::now();
        let expired = (now - Duration::minutes(1)).fixed_offset();
        assert_eq!(
            verify(Some("123456"), Some(expired), "123456", now),
            Err(OtpError::Expired)
        );
    }

    #[test]
    fn mismatch_and_missing() {
        let now = Utc::now();
        let exp = expiry_from(now);
        assert_eq!(
            verify(Some("123456"), Some(exp), "654321", now),
            Err(OtpError::Mismatch)
        );
        assert_eq!(verify(None, Some(exp), "123456", now), Err(OtpError::Missing));
        assert_eq!(verify(Some("  "), Some(exp), "123456", now), Err(OtpError::Missing));
    }

    #[test]
    fn expiry_is_ten_minutes_out() {
        let now = Utc::now();
        let exp = expiry_from(now);
        assert_eq!((exp.with_timezone(&Utc) - now).num_minutes(), 10);
    }
}
