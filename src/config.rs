use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;

use crate::optimizer::OptimizerSettings;
use crate::rate_limit::RateLimiter;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub sizes: SizesConfig,
    pub optimizer: OptimizerConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            sizes: SizesConfig::from_env(),
            optimizer: OptimizerConfig::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
    rate_limit_per_minute: u32,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;
    const HOST_VAR: &'static str = "PACK_IT_NOW_API_HOST";
    const PORT_VAR: &'static str = "PACK_IT_NOW_API_PORT";
    const RATE_LIMIT_VAR: &'static str = "PACK_IT_NOW_RATE_LIMIT_PER_MINUTE";

    fn from_env() -> Self {
        let host_value = env_string(Self::HOST_VAR).unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, display_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                tracing::warn!(
                    "Could not parse {} ('{}'): {}. Using {}.",
                    Self::HOST_VAR,
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (
                    IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                    Self::DEFAULT_HOST.to_string(),
                )
            }
        };

        let port = match env_string(Self::PORT_VAR) {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    tracing::warn!(
                        "{} must not be 0. Using {}.",
                        Self::PORT_VAR,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    tracing::warn!(
                        "Could not parse {} ('{}'): {}. Using {}.",
                        Self::PORT_VAR,
                        raw,
                        err,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

        let rate_limit_per_minute = u32::try_from(load_u64_with_warning(
            Self::RATE_LIMIT_VAR,
            u64::from(RateLimiter::DEFAULT_REQUESTS_PER_MINUTE),
            |value| value <= u64::from(u32::MAX),
            "must fit into 32 bits",
            "Adjusted request limit per client (0 disables limiting)",
        ))
        .unwrap_or(RateLimiter::DEFAULT_REQUESTS_PER_MINUTE);

        Self {
            bind_ip,
            display_host,
            port,
            rate_limit_per_minute,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Requests per minute allowed for each client IP on the API routes, 0 for unlimited.
    pub fn rate_limit_per_minute(&self) -> u32 {
        self.rate_limit_per_minute
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }
}

/// Initial pack sizes and where accepted configurations are stored.
#[derive(Clone, Debug)]
pub struct SizesConfig {
    defaults: Vec<u64>,
    store_path: Option<PathBuf>,
}

impl SizesConfig {
    pub const DEFAULT_PACK_SIZES: [u64; 5] = [250, 500, 1000, 2000, 5000];
    const DEFAULT_SIZES_VAR: &'static str = "PACK_IT_NOW_DEFAULT_PACK_SIZES";
    const STORE_PATH_VAR: &'static str = "PACK_IT_NOW_STORE_PATH";

    fn from_env() -> Self {
        let defaults = env_string(Self::DEFAULT_SIZES_VAR)
            .and_then(|raw| parse_size_list(&raw, Self::DEFAULT_SIZES_VAR))
            .unwrap_or_else(|| Self::DEFAULT_PACK_SIZES.to_vec());

        Self {
            defaults,
            store_path: env_string(Self::STORE_PATH_VAR).map(PathBuf::from),
        }
    }

    /// Sizes used when no stored configuration exists.
    pub fn defaults(&self) -> &[u64] {
        &self.defaults
    }

    /// JSON file for persisted sizes; persistence is disabled when `None`.
    pub fn store_path(&self) -> Option<&PathBuf> {
        self.store_path.as_ref()
    }
}

/// Configuration for the pack breakdown optimizer.
#[derive(Clone, Debug)]
pub struct OptimizerConfig {
    settings: OptimizerSettings,
}

impl OptimizerConfig {
    const MINIMIZE_PACK_COUNT_VAR: &'static str = "PACK_IT_NOW_MINIMIZE_PACK_COUNT";
    const EXACT_SEARCH_LIMIT_VAR: &'static str = "PACK_IT_NOW_EXACT_SEARCH_LIMIT";
    const MAX_GRAPH_NODES_VAR: &'static str = "PACK_IT_NOW_MAX_GRAPH_NODES";

    fn from_env() -> Self {
        let minimize_pack_count = env_string(Self::MINIMIZE_PACK_COUNT_VAR)
            .and_then(|raw| parse_bool(&raw, Self::MINIMIZE_PACK_COUNT_VAR))
            .unwrap_or(OptimizerSettings::DEFAULT_MINIMIZE_PACK_COUNT);

        let exact_search_limit = load_u64_with_warning(
            Self::EXACT_SEARCH_LIMIT_VAR,
            OptimizerSettings::DEFAULT_EXACT_SEARCH_LIMIT,
            // The exact search allocates two entries per item of the target.
            |value| value <= 1 << 26,
            "must not exceed 67108864",
            "Adjusted exact search limit changes memory use per calculation",
        );

        let max_graph_nodes = load_u64_with_warning(
            Self::MAX_GRAPH_NODES_VAR,
            OptimizerSettings::DEFAULT_MAX_GRAPH_NODES,
            |value| (1..=crate::model::MAX_PACK_SIZE).contains(&value),
            "must be between 1 and 2147483647",
            "Adjusted graph limit changes which pack sizes are accepted",
        );

        let settings = OptimizerSettings::builder()
            .minimize_pack_count(minimize_pack_count)
            .exact_search_limit(exact_search_limit)
            .max_graph_nodes(max_graph_nodes)
            .build();

        Self { settings }
    }

    /// Returns the configured optimizer settings.
    pub fn settings(&self) -> OptimizerSettings {
        self.settings
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            tracing::warn!("Access to {} failed: {}. Using default value.", name, err);
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            tracing::warn!(
                "Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name,
                other
            );
            None
        }
    }
}

/// Parses a comma separated list of pack sizes. Validation happens when the
/// list is turned into a configuration.
fn parse_size_list(raw: &str, var_name: &str) -> Option<Vec<u64>> {
    let parsed = raw
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::parse::<u64>)
        .collect::<Result<Vec<_>, _>>();

    match parsed {
        Ok(sizes) if !sizes.is_empty() => Some(sizes),
        Ok(_) => {
            tracing::warn!("{} contains no pack sizes. Using default value.", var_name);
            None
        }
        Err(err) => {
            tracing::warn!(
                "Could not parse {} ('{}') as pack sizes: {}. Using default value.",
                var_name,
                raw,
                err
            );
            None
        }
    }
}

fn load_u64_with_warning(
    var_name: &str,
    default: u64,
    validator: impl Fn(u64) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> u64 {
    match env_string(var_name) {
        Some(raw) => match raw.parse::<u64>() {
            Ok(value) => {
                if !validator(value) {
                    tracing::warn!(
                        "{} contains invalid value '{}': {}. Using {}.",
                        var_name,
                        raw,
                        invalid_hint,
                        default
                    );
                    default
                } else {
                    if value != default {
                        tracing::info!("{} ({} = {}).", warning, var_name, value);
                    }
                    value
                }
            }
            Err(err) => {
                tracing::warn!(
                    "Could not parse {} ('{}') as number: {}. Using {}.",
                    var_name,
                    raw,
                    err,
                    default
                );
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_true_values() {
        for raw in ["1", "true", "yes", "y", "on", "TRUE", "On", " true "] {
            assert_eq!(parse_bool(raw, "TEST_VAR"), Some(true), "raw value {:?}", raw);
        }
    }

    #[test]
    fn test_parse_bool_false_values() {
        for raw in ["0", "false", "no", "n", "off", "FALSE", "Off", "  0  "] {
            assert_eq!(parse_bool(raw, "TEST_VAR"), Some(false), "raw value {:?}", raw);
        }
    }

    #[test]
    fn test_parse_bool_invalid_values() {
        assert_eq!(parse_bool("invalid", "TEST_VAR"), None);
        assert_eq!(parse_bool("2", "TEST_VAR"), None);
        assert_eq!(parse_bool("", "TEST_VAR"), None);
    }

    #[test]
    fn test_parse_size_list() {
        assert_eq!(
            parse_size_list("250, 500,1000 ,", "TEST_VAR"),
            Some(vec![250, 500, 1000])
        );
        assert_eq!(parse_size_list(" , ", "TEST_VAR"), None);
        assert_eq!(parse_size_list("250,abc", "TEST_VAR"), None);
        assert_eq!(parse_size_list("-1", "TEST_VAR"), None);
    }

    #[test]
    fn test_load_u64_uses_default_when_unset() {
        let value = load_u64_with_warning(
            "PACK_IT_NOW_TEST_UNSET_VARIABLE",
            42,
            |_| true,
            "unused",
            "unused",
        );
        assert_eq!(value, 42);
    }

    #[test]
    fn test_default_sizes_form_valid_configuration() {
        let config =
            crate::model::PackSizeConfiguration::new(SizesConfig::DEFAULT_PACK_SIZES).unwrap();
        assert_eq!(config.sizes(), &SizesConfig::DEFAULT_PACK_SIZES);
    }
}
