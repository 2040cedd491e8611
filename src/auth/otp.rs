use std::collections::HashMap;
use std::sync::Mutex;

use rand::Rng;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

pub const OTP_TTL: Duration = Duration::minutes(5);

#[derive(Debug, Clone)]
struct OtpRecord {
    code: String,
    user_id: Uuid,
    expires_at: OffsetDateTime,
}

/// Pending one-time codes, keyed by email. One instance lives in `AppState`;
/// handlers receive it by injection rather than through process globals.
/// A new code overwrites any pending one for the same email, and a successful
/// verification consumes the record.
pub struct OtpStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, OtpRecord>>,
}

impl Default for OtpStore {
    fn default() -> Self {
        Self::with_ttl(OTP_TTL)
    }
}

impl OtpStore {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Issue a fresh 6-digit code for `email`, replacing any pending one.
    pub fn generate(&self, email: &str, user_id: Uuid) -> String {
        let code = rand::thread_rng().gen_range(100_000..1_000_000).to_string();
        let record = OtpRecord {
            code: code.clone(),
            user_id,
            expires_at: OffsetDateTime::now_utc() + self.ttl,
        };
        self.entries
            .lock()
            .expect("otp store lock poisoned")
            .insert(email.to_lowercase(), record);
        debug!(email = %email, "otp generated");
        code
    }

    /// Returns the associated user id only on an exact match within the
    /// validity window, removing the record. Expired records are evicted
    /// on the way out; a mismatch leaves the record in place for retry.
    pub fn verify_and_consume(&self, email: &str, submitted: &str) -> Option<Uuid> {
        let mut entries = self.entries.lock().expect("otp store lock poisoned");
        let key = email.to_lowercase();
        let record = entries.get(&key)?;

        if OffsetDateTime::now_utc() > record.expires_at {
            entries.remove(&key);
            debug!(email = %email, "otp expired");
            return None;
        }
        if record.code != submitted {
            debug!(email = %email, "otp mismatch");
            return None;
        }
        let record = entries.remove(&key)?;
        Some(record.user_id)
    }

    /// Sweep expired entries. Called opportunistically after issuance.
    pub fn cleanup(&self) {
        let now = OffsetDateTime::now_utc();
        self.entries
            .lock()
            .expect("otp store lock poisoned")
            .retain(|_, record| record.expires_at >= now);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}
