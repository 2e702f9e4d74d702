//! Configuration resolution for the machine client.
//!
//! Every value follows a three-tier priority system:
//!
//! 1. **Parameter** - Explicitly provided value, usually a CLI flag (highest priority)
//! 2. **Environment Variable** - Value from environment variable
//! 3. **Default** - Built-in default value (lowest priority)
//!
//! Address and credentials have no default: if neither a parameter nor the
//! environment supplies them, resolution fails with
//! [`MachineError::InvalidConfig`].
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MACHINE_ADDRESS` | - | Machine locator, e.g. `sim://ok` or `my-bot.abc.viam.cloud` |
//! | `MACHINE_API_KEY` | - | API key secret |
//! | `MACHINE_API_KEY_ID` | - | API key identifier |
//! | `MACHINE_CONNECT_TIMEOUT` | 30s | Connection timeout in seconds |
//! | `MACHINE_COMMAND_TIMEOUT` | 60s | Command round trip timeout in seconds |
//! | `MACHINE_MAX_RETRIES` | 0 | Connect retry attempts on network errors |
//! | `MACHINE_RETRY_DELAY_MS` | 1000ms | Initial connect retry delay in milliseconds |
//! | `OBJECTFILTER_VISION_SERVICE` | - | Vision service name when no argument is given |

use std::env;
use std::fmt;
use std::time::Duration;

use super::error::{MachineError, Result};

/// Default connection timeout in seconds
pub(crate) const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default command round trip timeout in seconds
pub(crate) const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 60;

/// Default maximum connect retry attempts
pub(crate) const DEFAULT_MAX_RETRIES: u32 = 0;

/// Default retry delay in milliseconds
pub(crate) const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Maximum retry delay cap
pub(crate) const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

pub(crate) const ADDRESS_ENV_VAR: &str = "MACHINE_ADDRESS";
pub(crate) const API_KEY_ENV_VAR: &str = "MACHINE_API_KEY";
pub(crate) const API_KEY_ID_ENV_VAR: &str = "MACHINE_API_KEY_ID";
pub(crate) const CONNECT_TIMEOUT_ENV_VAR: &str = "MACHINE_CONNECT_TIMEOUT";
pub(crate) const COMMAND_TIMEOUT_ENV_VAR: &str = "MACHINE_COMMAND_TIMEOUT";
pub(crate) const MAX_RETRIES_ENV_VAR: &str = "MACHINE_MAX_RETRIES";
pub(crate) const RETRY_DELAY_MS_ENV_VAR: &str = "MACHINE_RETRY_DELAY_MS";
pub(crate) const VISION_SERVICE_ENV_VAR: &str = "OBJECTFILTER_VISION_SERVICE";

/// Resolve the connection timeout with priority: parameter -> env var -> default
pub(crate) fn resolve_connect_timeout(timeout_param: Option<u64>) -> Duration {
    Duration::from_secs(resolve_u64(
        timeout_param,
        CONNECT_TIMEOUT_ENV_VAR,
        DEFAULT_CONNECT_TIMEOUT_SECS,
    ))
}

/// Resolve the command timeout with priority: parameter -> env var -> default
pub(crate) fn resolve_command_timeout(timeout_param: Option<u64>) -> Duration {
    Duration::from_secs(resolve_u64(
        timeout_param,
        COMMAND_TIMEOUT_ENV_VAR,
        DEFAULT_COMMAND_TIMEOUT_SECS,
    ))
}

/// Resolve the retry delay with priority: parameter -> env var -> default
pub(crate) fn resolve_retry_delay(delay_param: Option<u64>) -> Duration {
    Duration::from_millis(resolve_u64(
        delay_param,
        RETRY_DELAY_MS_ENV_VAR,
        DEFAULT_RETRY_DELAY_MS,
    ))
}

/// Resolve the max retries value with priority: parameter -> env var -> default
pub(crate) fn resolve_max_retries(max_retries_param: Option<u32>) -> u32 {
    if let Some(max_retries) = max_retries_param {
        return max_retries;
    }

    if let Ok(env_retries) = env::var(MAX_RETRIES_ENV_VAR)
        && let Ok(retries) = env_retries.parse::<u32>()
    {
        return retries;
    }

    DEFAULT_MAX_RETRIES
}

fn resolve_u64(param: Option<u64>, env_var: &str, default: u64) -> u64 {
    // Priority 1: Use parameter if provided
    if let Some(value) = param {
        return value;
    }

    // Priority 2: Use environment variable if set
    if let Ok(env_value) = env::var(env_var)
        && let Ok(value) = env_value.parse::<u64>()
    {
        return value;
    }

    // Priority 3: Default value
    default
}

/// Resolve a value that has no default: parameter -> env var -> `InvalidConfig`.
///
/// Empty strings count as missing at both tiers.
pub(crate) fn resolve_required(param: Option<String>, env_var: &str) -> Result<String> {
    if let Some(value) = param.filter(|v| !v.is_empty()) {
        return Ok(value);
    }

    match env::var(env_var) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(MachineError::InvalidConfig(format!(
            "no value given and ${} is not set",
            env_var
        ))),
    }
}

/// Parsed machine locator: `scheme://host[:port]` or bare `host[:port]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    scheme: Option<String>,
    host: String,
    port: Option<u16>,
}

impl Locator {
    /// Scheme, if the address carried one.
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scheme) = &self.scheme {
            write!(f, "{}://", scheme)?;
        }
        write!(f, "{}", self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        Ok(())
    }
}

/// Parse an address string into a [`Locator`].
///
/// Accepted forms:
/// - `scheme://host[:port]` - e.g. `sim://ok`, `grpc://10.0.0.5:8080`
/// - `host[:port]` - e.g. `my-bot-main.abc123.viam.cloud`
/// - bracketed IPv6 hosts, e.g. `[::1]:8080`
///
/// Uses `rsplit_once` on the port separator so IPv6 hosts keep their colons.
pub(crate) fn parse_address(address: &str) -> std::result::Result<Locator, String> {
    if address.is_empty() {
        return Err("address is empty".to_string());
    }
    if address.chars().any(char::is_whitespace) {
        return Err(format!("address '{}' contains whitespace", address));
    }

    let (scheme, rest) = match address.split_once("://") {
        Some((scheme, rest)) => {
            let valid = !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
            if !valid {
                return Err(format!("invalid scheme '{}'", scheme));
            }
            (Some(scheme.to_ascii_lowercase()), rest)
        }
        None => (None, address),
    };

    let rest = rest.strip_suffix('/').unwrap_or(rest);
    if rest.contains('/') {
        return Err(format!("address '{}' must not contain a path", address));
    }

    let (host, port) = if rest.ends_with(']') {
        (rest, None)
    } else if let Some((host, port_str)) = rest.rsplit_once(':') {
        let port = port_str
            .parse::<u16>()
            .map_err(|e| format!("Invalid port number: {}", e))?;
        (host, Some(port))
    } else {
        (rest, None)
    };

    if host.is_empty() {
        return Err(format!("address '{}' has no host", address));
    }
    if !is_valid_host(host) {
        return Err(format!("invalid host '{}'", host));
    }

    Ok(Locator {
        scheme,
        host: host.to_string(),
        port,
    })
}

fn is_valid_host(host: &str) -> bool {
    if let Some(inner) = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        return !inner.is_empty() && inner.chars().all(|c| c.is_ascii_hexdigit() || c == ':');
    }
    host.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'))
}

/// Target locator and credential material for one machine.
///
/// Immutable once built; construction validates every field. The API key
/// never appears in `Debug` output.
#[derive(Clone)]
pub struct ConnectionConfig {
    address: String,
    locator: Locator,
    api_key: String,
    api_key_id: String,
}

impl ConnectionConfig {
    /// Validate and build a connection config.
    pub fn new(
        address: impl Into<String>,
        api_key: impl Into<String>,
        api_key_id: impl Into<String>,
    ) -> Result<Self> {
        let address = address.into();
        let api_key = api_key.into();
        let api_key_id = api_key_id.into();

        let locator = parse_address(&address).map_err(MachineError::InvalidConfig)?;
        if api_key.is_empty() {
            return Err(MachineError::InvalidConfig("api key is empty".to_string()));
        }
        if api_key_id.is_empty() {
            return Err(MachineError::InvalidConfig(
                "api key id is empty".to_string(),
            ));
        }

        Ok(Self {
            address,
            locator,
            api_key,
            api_key_id,
        })
    }

    /// Build a config from optional parameters, falling back to
    /// `MACHINE_ADDRESS`, `MACHINE_API_KEY` and `MACHINE_API_KEY_ID`.
    pub fn resolve(
        address: Option<String>,
        api_key: Option<String>,
        api_key_id: Option<String>,
    ) -> Result<Self> {
        Self::new(
            resolve_required(address, ADDRESS_ENV_VAR)?,
            resolve_required(api_key, API_KEY_ENV_VAR)?,
            resolve_required(api_key_id, API_KEY_ID_ENV_VAR)?,
        )
    }

    /// The address exactly as supplied.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn api_key_id(&self) -> &str {
        &self.api_key_id
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("address", &self.address)
            .field("api_key", &"<redacted>")
            .field("api_key_id", &self.api_key_id)
            .finish()
    }
}

/// Timeouts and retry policy for one [`RemoteClient`](super::client::RemoteClient).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientSettings {
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl ClientSettings {
    /// Resolve every setting with priority: parameter -> env var -> default.
    pub fn resolve(
        connect_timeout_secs: Option<u64>,
        command_timeout_secs: Option<u64>,
        max_retries: Option<u32>,
        retry_delay_ms: Option<u64>,
    ) -> Self {
        Self {
            connect_timeout: resolve_connect_timeout(connect_timeout_secs),
            command_timeout: resolve_command_timeout(command_timeout_secs),
            max_retries: resolve_max_retries(max_retries),
            retry_delay: resolve_retry_delay(retry_delay_ms),
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            command_timeout: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    // Use a mutex to serialize env var tests to avoid race conditions
    static ENV_TEST_MUTEX: once_cell::sync::Lazy<StdMutex<()>> =
        once_cell::sync::Lazy::new(|| StdMutex::new(()));

    /// SAFETY: Must be called while holding ENV_TEST_MUTEX to prevent data races.
    unsafe fn set_env(key: &str, value: &str) {
        // SAFETY: Caller ensures ENV_TEST_MUTEX is held
        unsafe { env::set_var(key, value) };
    }

    /// SAFETY: Must be called while holding ENV_TEST_MUTEX to prevent data races.
    unsafe fn remove_env(key: &str) {
        // SAFETY: Caller ensures ENV_TEST_MUTEX is held
        unsafe { env::remove_var(key) };
    }

    mod address_parsing {
        use super::*;

        #[test]
        fn test_sim_scheme() {
            let locator = parse_address("sim://ok").unwrap();
            assert_eq!(locator.scheme(), Some("sim"));
            assert_eq!(locator.host(), "ok");
            assert_eq!(locator.port(), None);
        }

        #[test]
        fn test_bare_cloud_hostname() {
            let locator = parse_address("my-bot-main.abc123.viam.cloud").unwrap();
            assert_eq!(locator.scheme(), None);
            assert_eq!(locator.host(), "my-bot-main.abc123.viam.cloud");
        }

        #[test]
        fn test_scheme_host_and_port() {
            let locator = parse_address("grpc://10.0.0.5:8080").unwrap();
            assert_eq!(locator.scheme(), Some("grpc"));
            assert_eq!(locator.host(), "10.0.0.5");
            assert_eq!(locator.port(), Some(8080));
        }

        #[test]
        fn test_scheme_is_lowercased() {
            let locator = parse_address("SIM://ok").unwrap();
            assert_eq!(locator.scheme(), Some("sim"));
        }

        #[test]
        fn test_trailing_slash_is_allowed() {
            let locator = parse_address("sim://ok/").unwrap();
            assert_eq!(locator.host(), "ok");
        }

        #[test]
        fn test_ipv6_with_port() {
            let locator = parse_address("[::1]:8080").unwrap();
            assert_eq!(locator.host(), "[::1]");
            assert_eq!(locator.port(), Some(8080));
        }

        #[test]
        fn test_ipv6_without_port() {
            let locator = parse_address("[::1]").unwrap();
            assert_eq!(locator.host(), "[::1]");
            assert_eq!(locator.port(), None);
        }

        #[test]
        fn test_display_round_trips() {
            let locator = parse_address("grpc://robot.local:443").unwrap();
            assert_eq!(locator.to_string(), "grpc://robot.local:443");
        }

        #[test]
        fn test_empty_is_rejected() {
            assert!(parse_address("").is_err());
        }

        #[test]
        fn test_placeholder_is_rejected() {
            // Unedited template placeholder
            assert!(parse_address("<-YOUR SMART MACHINE URL->").is_err());
        }

        #[test]
        fn test_invalid_port_returns_error() {
            let err = parse_address("robot.local:invalid").unwrap_err();
            assert!(err.contains("Invalid port number"));
        }

        #[test]
        fn test_port_out_of_range() {
            assert!(parse_address("robot.local:99999").is_err());
        }

        #[test]
        fn test_missing_host() {
            assert!(parse_address("sim://").is_err());
            assert!(parse_address(":8080").is_err());
        }

        #[test]
        fn test_path_is_rejected() {
            assert!(parse_address("https://robot.local/api").is_err());
        }

        #[test]
        fn test_bad_scheme() {
            assert!(parse_address("://robot.local").is_err());
            assert!(parse_address("s_m://robot.local").is_err());
        }
    }

    mod connection_config {
        use super::*;

        #[test]
        fn test_valid_config() {
            let config = ConnectionConfig::new("sim://ok", "k", "kid").unwrap();
            assert_eq!(config.address(), "sim://ok");
            assert_eq!(config.locator().host(), "ok");
            assert_eq!(config.api_key(), "k");
            assert_eq!(config.api_key_id(), "kid");
        }

        #[test]
        fn test_empty_address() {
            let err = ConnectionConfig::new("", "k", "kid").unwrap_err();
            assert!(matches!(err, MachineError::InvalidConfig(_)));
        }

        #[test]
        fn test_empty_api_key() {
            let err = ConnectionConfig::new("sim://ok", "", "kid").unwrap_err();
            assert!(matches!(err, MachineError::InvalidConfig(_)));
        }

        #[test]
        fn test_empty_api_key_id() {
            let err = ConnectionConfig::new("sim://ok", "k", "").unwrap_err();
            assert!(matches!(err, MachineError::InvalidConfig(_)));
        }

        #[test]
        fn test_debug_redacts_api_key() {
            let config = ConnectionConfig::new("sim://ok", "super-secret", "kid").unwrap();
            let debug = format!("{:?}", config);
            assert!(!debug.contains("super-secret"));
            assert!(debug.contains("<redacted>"));
            assert!(debug.contains("kid"));
        }

        #[test]
        fn test_resolve_prefers_params() {
            let config = ConnectionConfig::resolve(
                Some("sim://ok".into()),
                Some("k".into()),
                Some("kid".into()),
            )
            .unwrap();
            assert_eq!(config.address(), "sim://ok");
        }

        #[test]
        fn test_resolve_falls_back_to_env() {
            let _guard = ENV_TEST_MUTEX.lock().unwrap();
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                set_env(ADDRESS_ENV_VAR, "sim://flaky");
                set_env(API_KEY_ENV_VAR, "env-key");
                set_env(API_KEY_ID_ENV_VAR, "env-key-id");
            }
            let result = ConnectionConfig::resolve(None, None, Some("flag-id".into()));
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                remove_env(ADDRESS_ENV_VAR);
                remove_env(API_KEY_ENV_VAR);
                remove_env(API_KEY_ID_ENV_VAR);
            }
            let config = result.unwrap();
            assert_eq!(config.address(), "sim://flaky");
            assert_eq!(config.api_key(), "env-key");
            assert_eq!(config.api_key_id(), "flag-id");
        }

        #[test]
        fn test_resolve_missing_everything() {
            let _guard = ENV_TEST_MUTEX.lock().unwrap();
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                remove_env(ADDRESS_ENV_VAR);
            }
            let err = ConnectionConfig::resolve(None, Some("k".into()), Some("kid".into()))
                .unwrap_err();
            assert!(matches!(err, MachineError::InvalidConfig(_)));
            assert!(err.to_string().contains("MACHINE_ADDRESS"));
        }

        #[test]
        fn test_empty_param_counts_as_missing() {
            let _guard = ENV_TEST_MUTEX.lock().unwrap();
            // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
            unsafe {
                remove_env(API_KEY_ENV_VAR);
            }
            let err = ConnectionConfig::resolve(
                Some("sim://ok".into()),
                Some(String::new()),
                Some("kid".into()),
            )
            .unwrap_err();
            assert!(matches!(err, MachineError::InvalidConfig(_)));
        }
    }

    mod config_resolution {
        use super::*;

        mod connect_timeout {
            use super::*;

            #[test]
            fn test_uses_param_when_provided() {
                assert_eq!(resolve_connect_timeout(Some(5)), Duration::from_secs(5));
            }

            #[test]
            fn test_param_takes_priority_over_env() {
                let _guard = ENV_TEST_MUTEX.lock().unwrap();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    set_env(CONNECT_TIMEOUT_ENV_VAR, "120");
                }
                let result = resolve_connect_timeout(Some(45));
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    remove_env(CONNECT_TIMEOUT_ENV_VAR);
                }
                assert_eq!(result, Duration::from_secs(45));
            }

            #[test]
            fn test_uses_env_var_when_no_param() {
                let _guard = ENV_TEST_MUTEX.lock().unwrap();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    set_env(CONNECT_TIMEOUT_ENV_VAR, "90");
                }
                let result = resolve_connect_timeout(None);
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    remove_env(CONNECT_TIMEOUT_ENV_VAR);
                }
                assert_eq!(result, Duration::from_secs(90));
            }

            #[test]
            fn test_ignores_invalid_env_var() {
                let _guard = ENV_TEST_MUTEX.lock().unwrap();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    set_env(CONNECT_TIMEOUT_ENV_VAR, "-10");
                }
                let result = resolve_connect_timeout(None);
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    remove_env(CONNECT_TIMEOUT_ENV_VAR);
                }
                // Parsing fails for negative u64, so default is used
                assert_eq!(
                    result,
                    Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS)
                );
            }
        }

        mod command_timeout {
            use super::*;

            #[test]
            fn test_uses_default_when_no_param_or_env() {
                let _guard = ENV_TEST_MUTEX.lock().unwrap();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    remove_env(COMMAND_TIMEOUT_ENV_VAR);
                }
                assert_eq!(
                    resolve_command_timeout(None),
                    Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS)
                );
            }

            #[test]
            fn test_uses_env_var_when_no_param() {
                let _guard = ENV_TEST_MUTEX.lock().unwrap();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    set_env(COMMAND_TIMEOUT_ENV_VAR, "240");
                }
                let result = resolve_command_timeout(None);
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    remove_env(COMMAND_TIMEOUT_ENV_VAR);
                }
                assert_eq!(result, Duration::from_secs(240));
            }
        }

        mod max_retries {
            use super::*;

            #[test]
            fn test_default_is_no_retry() {
                let _guard = ENV_TEST_MUTEX.lock().unwrap();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    remove_env(MAX_RETRIES_ENV_VAR);
                }
                assert_eq!(resolve_max_retries(None), 0);
            }

            #[test]
            fn test_uses_env_var_when_no_param() {
                let _guard = ENV_TEST_MUTEX.lock().unwrap();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    set_env(MAX_RETRIES_ENV_VAR, "7");
                }
                let result = resolve_max_retries(None);
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    remove_env(MAX_RETRIES_ENV_VAR);
                }
                assert_eq!(result, 7);
            }

            #[test]
            fn test_ignores_invalid_env_var() {
                let _guard = ENV_TEST_MUTEX.lock().unwrap();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    set_env(MAX_RETRIES_ENV_VAR, "abc");
                }
                let result = resolve_max_retries(None);
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    remove_env(MAX_RETRIES_ENV_VAR);
                }
                assert_eq!(result, DEFAULT_MAX_RETRIES);
            }
        }

        mod retry_delay {
            use super::*;

            #[test]
            fn test_uses_param_when_provided() {
                assert_eq!(resolve_retry_delay(Some(250)), Duration::from_millis(250));
            }

            #[test]
            fn test_max_retry_delay_is_reasonable() {
                assert!(MAX_RETRY_DELAY.as_secs() >= 5);
                assert!(MAX_RETRY_DELAY.as_secs() <= 60);
            }
        }

        mod vision_service {
            use super::*;

            #[test]
            fn test_param_wins() {
                let value = resolve_required(Some("detector-2".into()), VISION_SERVICE_ENV_VAR);
                assert_eq!(value.unwrap(), "detector-2");
            }

            #[test]
            fn test_env_fallback() {
                let _guard = ENV_TEST_MUTEX.lock().unwrap();
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    set_env(VISION_SERVICE_ENV_VAR, "detector-1");
                }
                let value = resolve_required(None, VISION_SERVICE_ENV_VAR);
                // SAFETY: Holding ENV_TEST_MUTEX, no concurrent env access
                unsafe {
                    remove_env(VISION_SERVICE_ENV_VAR);
                }
                assert_eq!(value.unwrap(), "detector-1");
            }
        }
    }
}
