use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};

/// Source of externally visible booking identifiers.
pub trait BookingIdSource: Send + Sync {
    fn next_id(&self) -> String;
}

/// `BK` + unix millis + six random uppercase alphanumerics. Uniqueness is
/// finally enforced by the store.
#[derive(Debug, Default)]
pub struct RandomBookingIds;

impl BookingIdSource for RandomBookingIds {
    fn next_id(&self) -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(|c| char::from(c).to_ascii_uppercase())
            .collect();
        format!("BK{}{}", Utc::now().timestamp_millis(), suffix)
    }
}
