use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Supabase,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supabase" => Ok(Self::Supabase),
            "memory" | "in_memory" | "in-memory" => Ok(Self::Memory),
            other => Err(format!("unknown storage backend: {}", other)),
        }
    }
}

/// How the practitioner side of the post-introduction handshake is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeMode {
    /// Practitioner confirms independently through the portal.
    TwoParty,
    /// The user's decision is copied onto the practitioner side.
    Mirror,
}

impl FromStr for HandshakeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "two_party" | "two-party" | "twoparty" => Ok(Self::TwoParty),
            "mirror" | "mirrored" => Ok(Self::Mirror),
            other => Err(format!("unknown handshake mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub storage_backend: StorageBackend,
    pub handshake_mode: HandshakeMode,
    pub intro_session_price: f64,
    pub max_shortlist: usize,
    pub practitioner_seed_file: Option<String>,
    pub server_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_service_role_key: String::new(),
            supabase_jwt_secret: String::new(),
            storage_backend: StorageBackend::Memory,
            handshake_mode: HandshakeMode::TwoParty,
            intro_session_price: 99.0,
            max_shortlist: 3,
            practitioner_seed_file: None,
            server_port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let supabase_url = env::var("SUPABASE_URL")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_URL not set, using empty value");
                String::new()
            });
        let supabase_anon_key = env::var("SUPABASE_ANON_PUBLIC_KEY")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                String::new()
            });
        let supabase_service_role_key = env::var("SUPABASE_SERVICE_ROLE_KEY")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                String::new()
            });
        let supabase_jwt_secret = env::var("SUPABASE_JWT_SECRET")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_JWT_SECRET not set, using empty value");
                String::new()
            });

        let mut config = Self {
            supabase_url,
            supabase_anon_key,
            supabase_service_role_key,
            supabase_jwt_secret,
            storage_backend: defaults.storage_backend,
            handshake_mode: parse_var("HANDSHAKE_MODE", defaults.handshake_mode),
            intro_session_price: checked_price(
                "INTRO_SESSION_PRICE",
                parse_var("INTRO_SESSION_PRICE", defaults.intro_session_price),
                defaults.intro_session_price,
            ),
            max_shortlist: parse_var("MAX_SHORTLIST", defaults.max_shortlist),
            practitioner_seed_file: env::var("PRACTITIONER_SEED_FILE").ok(),
            server_port: parse_var("SERVER_PORT", defaults.server_port),
        };

        // Supabase is used whenever it is configured unless explicitly overridden.
        let implied_backend = if config.is_configured() {
            StorageBackend::Supabase
        } else {
            StorageBackend::Memory
        };
        config.storage_backend = parse_var("STORAGE_BACKEND", implied_backend);

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        if config.storage_backend == StorageBackend::Supabase && !config.is_configured() {
            warn!("STORAGE_BACKEND=supabase but Supabase is not configured, falling back to memory");
            config.storage_backend = StorageBackend::Memory;
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    /// Key used for server-side table access; falls back to the anon key.
    pub fn supabase_access_key(&self) -> &str {
        if self.supabase_service_role_key.is_empty() {
            &self.supabase_anon_key
        } else {
            &self.supabase_service_role_key
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Invalid value for {} ({}), using default {:?}", name, e, default);
            default
        }),
        Err(_) => default,
    }
}

/// Prices must be finite and non-negative.
fn checked_price(name: &str, price: f64, default: f64) -> f64 {
    if price.is_finite() && price >= 0.0 {
        price
    } else {
        warn!("Invalid price for {} ({}), using default {}", name, price, default);
        default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_mode_parsing() {
        assert_eq!("mirror".parse::<HandshakeMode>().unwrap(), HandshakeMode::Mirror);
        assert_eq!("two_party".parse::<HandshakeMode>().unwrap(), HandshakeMode::TwoParty);
        assert_eq!("Two-Party".parse::<HandshakeMode>().unwrap(), HandshakeMode::TwoParty);
        assert!("sometimes".parse::<HandshakeMode>().is_err());
    }

    #[test]
    fn test_storage_backend_parsing() {
        assert_eq!("supabase".parse::<StorageBackend>().unwrap(), StorageBackend::Supabase);
        assert_eq!("in-memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert!("mongo".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_access_key_falls_back_to_anon_key() {
        let mut config = AppConfig {
            supabase_anon_key: "anon".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(config.supabase_access_key(), "anon");

        config.supabase_service_role_key = "service".to_string();
        assert_eq!(config.supabase_access_key(), "service");
    }

    #[test]
    fn test_checked_price_rejects_nan_and_negative() {
        assert_eq!(checked_price("INTRO_SESSION_PRICE", 49.5, 99.0), 49.5);
        assert_eq!(checked_price("INTRO_SESSION_PRICE", 0.0, 99.0), 0.0);
        assert_eq!(checked_price("INTRO_SESSION_PRICE", f64::NAN, 99.0), 99.0);
        assert_eq!(checked_price("INTRO_SESSION_PRICE", -10.0, 99.0), 99.0);
        assert_eq!(checked_price("INTRO_SESSION_PRICE", f64::INFINITY, 99.0), 99.0);
        assert_eq!("NaN".parse::<f64>().map(|p| checked_price("INTRO_SESSION_PRICE", p, 99.0)), Ok(99.0));
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.intro_session_price, 99.0);
        assert_eq!(config.max_shortlist, 3);
        assert_eq!(config.handshake_mode, HandshakeMode::TwoParty);
        assert!(!config.is_configured());
    }
}
