//! Expiration arithmetic
//!
//! Pure functions over decoded claims and a wall-clock instant in milliseconds.
//! A token that failed to decode is always treated as due, so an unreadable
//! credential is renewed instead of being left to expire silently.

use crate::decoder::{Claims, DecodeError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Renewal happens this long before the access credential expires
pub const RENEWAL_BUFFER: Duration = Duration::from_secs(5 * 60);

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Computes when a credential becomes due for renewal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationClock {
    buffer: Duration,
}

impl ExpirationClock {
    pub fn new(buffer: Duration) -> Self {
        Self { buffer }
    }

    fn buffer_millis(&self) -> i64 {
        i64::try_from(self.buffer.as_millis()).unwrap_or(i64::MAX)
    }

    /// True once the credential is within the renewal buffer of its expiry.
    pub fn is_due_soon(&self, decoded: &Result<Claims, DecodeError>, now_ms: i64) -> bool {
        match decoded {
            Ok(claims) => claims.exp_millis().saturating_sub(now_ms) <= self.buffer_millis(),
            Err(_) => true,
        }
    }

    /// Delay until renewal is due; zero when already due or undecodable.
    pub fn time_until_due(&self, decoded: &Result<Claims, DecodeError>, now_ms: i64) -> Duration {
        match decoded {
            Ok(claims) => {
                let due_at = claims.exp_millis().saturating_sub(self.buffer_millis());
                let remaining = due_at.saturating_sub(now_ms).max(0);
                Duration::from_millis(remaining as u64)
            }
            Err(_) => Duration::ZERO,
        }
    }
}

impl Default for ExpirationClock {
    fn default() -> Self {
        Self::new(RENEWAL_BUFFER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode;
    use crate::test_support::mint_token;

    const NOW_MS: i64 = 1_700_000_000_000;
    const NOW_SECS: i64 = NOW_MS / 1000;

    fn claims(exp: i64) -> Result<Claims, DecodeError> {
        decode(&mint_token(exp))
    }

    #[test]
    fn test_hour_long_token_due_in_55_minutes() {
        let clock = ExpirationClock::default();
        let decoded = claims(NOW_SECS + 3600);

        assert!(!clock.is_due_soon(&decoded, NOW_MS));
        assert_eq!(
            clock.time_until_due(&decoded, NOW_MS),
            Duration::from_millis(3_300_000)
        );
    }

    #[test]
    fn test_minute_long_token_is_due_now() {
        let clock = ExpirationClock::default();
        let decoded = claims(NOW_SECS + 60);

        assert!(clock.is_due_soon(&decoded, NOW_MS));
        assert_eq!(clock.time_until_due(&decoded, NOW_MS), Duration::ZERO);
    }

    #[test]
    fn test_due_soon_flips_exactly_at_buffer() {
        let clock = ExpirationClock::default();
        let decoded = claims(NOW_SECS + 600);
        let exp_ms = (NOW_SECS + 600) * 1000;

        assert!(!clock.is_due_soon(&decoded, exp_ms - 300_001));
        assert!(clock.is_due_soon(&decoded, exp_ms - 300_000));
        assert!(clock.is_due_soon(&decoded, exp_ms - 1));
        assert!(clock.is_due_soon(&decoded, exp_ms + 10_000));
    }

    #[test]
    fn test_expired_token_never_negative() {
        let clock = ExpirationClock::default();
        let decoded = claims(NOW_SECS - 3600);
        assert_eq!(clock.time_until_due(&decoded, NOW_MS), Duration::ZERO);
    }

    #[test]
    fn test_undecodable_token_is_due() {
        let clock = ExpirationClock::default();
        for token in ["garbage", "a.!!!.c", "a.bm90IGpzb24.c"] {
            let decoded = decode(token);
            assert!(decoded.is_err(), "{token} should not decode");
            assert!(clock.is_due_soon(&decoded, NOW_MS));
            assert_eq!(clock.time_until_due(&decoded, NOW_MS), Duration::ZERO);
        }
    }

    #[test]
    fn test_custom_buffer() {
        let clock = ExpirationClock::new(Duration::from_secs(30));
        let decoded = claims(NOW_SECS + 60);
        assert!(!clock.is_due_soon(&decoded, NOW_MS));
        assert_eq!(clock.time_until_due(&decoded, NOW_MS), Duration::from_secs(30));
    }
}
