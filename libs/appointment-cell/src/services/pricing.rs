use tracing::debug;

use practitioner_cell::Practitioner;
use shared_config::AppConfig;

use crate::models::AppointmentError;

pub const INTRO_SESSION_DURATION: &str = "20 minutes";
pub const REGULAR_SESSION_DURATION: &str = "50 minutes";

/// Whether a booking opens a relationship or continues one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingKind {
    Introductory,
    Regular,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionQuote {
    pub price: f64,
    pub duration: String,
    pub is_introductory: bool,
}

pub struct PricingService {
    intro_price: f64,
}

impl PricingService {
    pub fn new(config: &AppConfig) -> Self {
        Self { intro_price: config.intro_session_price }
    }

    pub fn with_intro_price(intro_price: f64) -> Self {
        Self { intro_price }
    }

    /// Introductory sessions are a flat promotional price and a fixed short slot;
    /// regular sessions use the practitioner's listed price.
    pub fn quote(
        &self,
        kind: BookingKind,
        practitioner: &Practitioner,
        requested_duration: Option<&str>,
    ) -> Result<SessionQuote, AppointmentError> {
        let quote = match kind {
            BookingKind::Introductory => SessionQuote {
                price: self.intro_price,
                duration: INTRO_SESSION_DURATION.to_string(),
                is_introductory: true,
            },
            BookingKind::Regular => {
                if !practitioner.price.is_finite() || practitioner.price < 0.0 {
                    return Err(AppointmentError::InvalidState(format!(
                        "Practitioner {} has no valid session price",
                        practitioner.id
                    )));
                }
                SessionQuote {
                    price: practitioner.price,
                    duration: normalize_duration(requested_duration)?,
                    is_introductory: false,
                }
            }
        };

        debug!("Quoted {:?} session with {} at {:.2} for {}",
               kind, practitioner.id, quote.price, quote.duration);
        Ok(quote)
    }
}

fn normalize_duration(requested: Option<&str>) -> Result<String, AppointmentError> {
    match requested.map(str::trim) {
        None => Ok(REGULAR_SESSION_DURATION.to_string()),
        Some("") => Err(AppointmentError::ValidationError("Duration cannot be empty".to_string())),
        Some(duration) if duration.len() > 64 => Err(AppointmentError::ValidationError(
            "Duration is too long".to_string(),
        )),
        Some(duration) => Ok(duration.to_string()),
    }
}
