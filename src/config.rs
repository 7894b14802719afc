use crate::error::{Result, StorefrontError};

/// Top-level configuration assembled from the environment at startup.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    pub database: DatabaseConfig,
    pub mpesa: MpesaConfig,
    pub bind_address: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Gateway credentials and endpoints, passed explicitly into
/// [`crate::mpesa::MpesaClient::new`] rather than read from a global.
#[derive(Debug, Clone)]
pub struct MpesaConfig {
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub shortcode: String,
    pub passkey: String,
    pub callback_url: String,
    /// Country code prefix used when normalizing subscriber numbers.
    pub country_prefix: String,
    /// Smallest amount the gateway will transact, in whole currency units.
    pub minimum_amount: u32,
    pub request_timeout_secs: u64,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            mpesa: MpesaConfig::default(),
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/storefront_development".to_string(),
            max_connections: 10,
        }
    }
}

impl Default for MpesaConfig {
    fn default() -> Self {
        Self {
            base_url: "https://sandbox.safaricom.co.ke".to_string(),
            consumer_key: String::new(),
            consumer_secret: String::new(),
            shortcode: "174379".to_string(),
            passkey: String::new(),
            callback_url: String::new(),
            country_prefix: "254".to_string(),
            minimum_amount: 10,
            request_timeout_secs: 30,
        }
    }
}

impl StorefrontConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(db_url) = std::env::var("DATABASE_URL") {
            config.database.url = db_url;
        }

        if let Ok(max_connections) = std::env::var("STOREFRONT_DB_MAX_CONNECTIONS") {
            config.database.max_connections = max_connections.parse().map_err(|e| {
                StorefrontError::ConfigurationError(format!("Invalid max_connections: {e}"))
            })?;
        }

        if let Ok(bind_address) = std::env::var("STOREFRONT_BIND_ADDRESS") {
            config.bind_address = bind_address;
        }

        config.mpesa = MpesaConfig::from_env()?;

        Ok(config)
    }
}

impl MpesaConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(base_url) = std::env::var("MPESA_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(consumer_key) = std::env::var("MPESA_CONSUMER_KEY") {
            config.consumer_key = consumer_key;
        }
        if let Ok(consumer_secret) = std::env::var("MPESA_CONSUMER_SECRET") {
            config.consumer_secret = consumer_secret;
        }
        if let Ok(shortcode) = std::env::var("MPESA_SHORTCODE") {
            config.shortcode = shortcode;
        }
        if let Ok(passkey) = std::env::var("MPESA_PASSKEY") {
            config.passkey = passkey;
        }
        if let Ok(callback_url) = std::env::var("MPESA_CALLBACK_URL") {
            config.callback_url = callback_url;
        }
        if let Ok(country_prefix) = std::env::var("MPESA_COUNTRY_PREFIX") {
            config.country_prefix = country_prefix;
        }

        if let Ok(minimum) = std::env::var("MPESA_MINIMUM_AMOUNT") {
            config.minimum_amount = minimum.parse().map_err(|e| {
                StorefrontError::ConfigurationError(format!("Invalid minimum_amount: {e}"))
            })?;
        }

        if let Ok(timeout) = std::env::var("MPESA_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = timeout.parse().map_err(|e| {
                StorefrontError::ConfigurationError(format!("Invalid request_timeout_secs: {e}"))
            })?;
        }

        Ok(config)
    }
}
