use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub payment: PaymentConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

/// Wallet provider credentials. Mirrors the gateway's own config type so
/// the whole application loads from one place.
#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    pub partner_code: String,
    pub access_key: String,
    pub secret_key: String,
    pub endpoint: String,
    pub redirect_url: String,
    pub ipn_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// How long a pending booking keeps its seats before the sweep
    /// cancels it.
    pub booking_expiry_minutes: i64,
    /// TTL on unconfirmed seat holds in the lock store.
    pub seat_hold_seconds: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    #[serde(default = "default_promo_refresh")]
    pub promo_refresh_seconds: u64,
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_promo_refresh() -> u64 {
    300
}

impl BusinessRules {
    /// Effective TTL for unconfirmed seat holds. The TTL is a crash
    /// backstop only; it must outlive the expiry window plus a full sweep
    /// interval, or a hold can lapse while its booking is still pending
    /// and the seat gets sold twice. Undersized configuration is clamped
    /// up to that floor.
    pub fn seat_hold_ttl_seconds(&self) -> u64 {
        let floor =
            self.booking_expiry_minutes.max(0) as u64 * 60 + 2 * self.sweep_interval_seconds;
        self.seat_hold_seconds.max(floor)
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // MARQUEE__SERVER__PORT=8080 style environment overrides
            .add_source(config::Environment::with_prefix("MARQUEE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(expiry_minutes: i64, hold_seconds: u64, sweep_seconds: u64) -> BusinessRules {
        BusinessRules {
            booking_expiry_minutes: expiry_minutes,
            seat_hold_seconds: hold_seconds,
            sweep_interval_seconds: sweep_seconds,
            promo_refresh_seconds: 300,
        }
    }

    #[test]
    fn undersized_hold_ttl_is_clamped_past_expiry_and_sweep() {
        // 15 min expiry + 60s sweep: a 900s TTL would lapse while the
        // booking can still be pending.
        let ttl = rules(15, 900, 60).seat_hold_ttl_seconds();
        assert_eq!(ttl, 15 * 60 + 2 * 60);
    }

    #[test]
    fn generous_hold_ttl_is_kept() {
        assert_eq!(rules(15, 3600, 60).seat_hold_ttl_seconds(), 3600);
    }
}
