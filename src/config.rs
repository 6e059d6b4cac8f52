use {
    reqwest::Url,
    secrecy::SecretString,
    std::{env, net::SocketAddr, time::Duration},
    thiserror::Error,
};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_GATEWAY_BASE_URL: &str = "https://api.yookassa.ru/v3";
const DEFAULT_ENTITLEMENT_TIMEOUT_SECS: u64 = 10;

/// Upper bound on one webhook request, enforced by the router.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a delivery waits for another delivery's row lock.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Budget for post-commit webhook cleanup within a request.
pub const CLEANUP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("GATEWAY_SHOP_ID and GATEWAY_API_KEY must be set together")]
    IncompleteCredentials,
}

/// Merchant credentials for the gateway API. `Debug` never prints the key.
#[derive(Debug)]
pub struct GatewayCredentials {
    pub shop_id: u64,
    pub api_key: SecretString,
}

#[derive(Debug)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub database_url: Option<String>,
    pub gateway_base_url: Url,
    pub gateway_credentials: Option<GatewayCredentials>,
    pub entitlement_url: Url,
    pub entitlement_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the config from an arbitrary variable source. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bind_addr = var("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| invalid("BIND_ADDR", e))?;

        let gateway_base_url = parse_url(
            "GATEWAY_BASE_URL",
            &var("GATEWAY_BASE_URL").unwrap_or_else(|| DEFAULT_GATEWAY_BASE_URL.to_string()),
        )?;

        let gateway_credentials = match (var("GATEWAY_SHOP_ID"), var("GATEWAY_API_KEY")) {
            (Some(shop_id), Some(api_key)) => Some(GatewayCredentials {
                shop_id: parse_shop_id(&shop_id)?,
                api_key: SecretString::from(api_key),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteCredentials),
        };

        let entitlement_url = parse_url(
            "ENTITLEMENT_URL",
            &var("ENTITLEMENT_URL").ok_or(ConfigError::Missing("ENTITLEMENT_URL"))?,
        )?;

        let entitlement_timeout = match var("ENTITLEMENT_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .parse()
                    .map_err(|e| invalid("ENTITLEMENT_TIMEOUT_SECS", e))?;
                if secs == 0 {
                    return Err(invalid("ENTITLEMENT_TIMEOUT_SECS", "must be positive"));
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_ENTITLEMENT_TIMEOUT_SECS),
        };
        // Lock wait, grant and cleanup must all finish inside one request.
        let worst_case = LOCK_TIMEOUT
            .checked_add(entitlement_timeout)
            .and_then(|total| total.checked_add(CLEANUP_TIMEOUT));
        if worst_case.is_none_or(|total| total >= REQUEST_TIMEOUT) {
            return Err(invalid(
                "ENTITLEMENT_TIMEOUT_SECS",
                format!(
                    "must leave room for the {LOCK_TIMEOUT:?} lock wait and {CLEANUP_TIMEOUT:?} cleanup within the {REQUEST_TIMEOUT:?} request timeout"
                ),
            ));
        }

        Ok(Self {
            bind_addr,
            database_url: var("DATABASE_URL"),
            gateway_base_url,
            gateway_credentials,
            entitlement_url,
            entitlement_timeout,
        })
    }
}

fn invalid(name: &'static str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.to_string(),
    }
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| invalid(name, e))
}

fn parse_shop_id(raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(invalid("GATEWAY_SHOP_ID", "must be positive")),
        Ok(id) => Ok(id),
        Err(e) => Err(invalid("GATEWAY_SHOP_ID", e)),
    }
}
