//! Configuration of the proxy.

use std::{env, fmt, fs, io};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use log::LevelFilter;
use serde::de;
use serde::{Deserialize, Deserializer};
use url::Url;
use crate::constants::{
    DEFAULT_CORRELATION_TTL_SECS, DEFAULT_NODE_STORE_TTL_SECS,
    DEFAULT_PENDING_CONSENT_TTL_SECS, DEFAULT_UPSTREAM_TIMEOUT_SECS,
    PROXY_ENV_LOG_LEVEL,
};
use crate::light::token::TokenCodec;
use crate::proxy::csrf::StateCookieConfig;

#[cfg(unix)]
use syslog::Facility;


//------------ ConfigDefaults ------------------------------------------------

pub struct ConfigDefaults;

impl ConfigDefaults {
    fn ip() -> Vec<IpAddr> {
        vec![IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))]
    }
    fn port() -> u16 {
        8080
    }
    fn log_level() -> LevelFilter {
        match env::var(PROXY_ENV_LOG_LEVEL) {
            Ok(level) => match LevelFilter::from_str(&level) {
                Ok(level) => level,
                Err(_) => {
                    eprintln!(
                        "Unrecognized value for log level in env var {}",
                        PROXY_ENV_LOG_LEVEL
                    );
                    ::std::process::exit(1);
                }
            },
            _ => LevelFilter::Info,
        }
    }
    fn log_type() -> LogType {
        LogType::Stderr
    }
    fn log_file() -> PathBuf {
        PathBuf::from("./eidas-proxy.log")
    }
    fn syslog_facility() -> String {
        "daemon".to_string()
    }
    fn post_limit() -> u64 {
        256 * 1024
    }
    fn supported_sp_types() -> Vec<String> {
        vec!["public".to_string()]
    }
    fn ask_consent() -> bool {
        true
    }
    fn response_issuer() -> String {
        "specificProxyService".to_string()
    }
    fn correlation_ttl_secs() -> u64 {
        DEFAULT_CORRELATION_TTL_SECS
    }
    fn pending_consent_ttl_secs() -> u64 {
        DEFAULT_PENDING_CONSENT_TTL_SECS
    }
    fn node_store_ttl_secs() -> u64 {
        DEFAULT_NODE_STORE_TTL_SECS
    }
    fn upstream_timeout_secs() -> u64 {
        DEFAULT_UPSTREAM_TIMEOUT_SECS
    }
    fn request_issuer_name() -> String {
        "specificCommunicationDefinitionProxyserviceRequest".to_string()
    }
    fn response_issuer_name() -> String {
        "specificCommunicationDefinitionProxyserviceResponse".to_string()
    }
    fn error_code_user_cancel() -> String {
        "user_cancel".to_string()
    }
}


//------------ Config --------------------------------------------------------

/// Global configuration for the proxy.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// The addresses to listen on.
    #[serde(
        default = "ConfigDefaults::ip",
        deserialize_with = "deserialize_one_or_many"
    )]
    pub ip: Vec<IpAddr>,

    #[serde(default = "ConfigDefaults::port")]
    pub port: u16,

    #[serde(
        default = "ConfigDefaults::log_level",
        deserialize_with = "deserialize_level_filter"
    )]
    pub log_level: LevelFilter,

    #[serde(default = "ConfigDefaults::log_type")]
    pub log_type: LogType,

    #[serde(default = "ConfigDefaults::log_file")]
    pub log_file: PathBuf,

    #[serde(default = "ConfigDefaults::syslog_facility")]
    pub syslog_facility: String,

    /// The maximum size of a POST body in bytes.
    #[serde(default = "ConfigDefaults::post_limit")]
    pub post_limit: u64,

    /// Service provider types allowed to request authentication.
    #[serde(default = "ConfigDefaults::supported_sp_types")]
    pub supported_sp_types: Vec<String>,

    /// Whether the citizen confirms the attributes before release.
    #[serde(default = "ConfigDefaults::ask_consent")]
    pub ask_consent: bool,

    /// Where to send the browser with the light response token.
    pub node_specific_response_url: Url,

    /// The issuer put into light responses.
    #[serde(default = "ConfigDefaults::response_issuer")]
    pub response_issuer: String,

    #[serde(default = "ConfigDefaults::correlation_ttl_secs")]
    pub correlation_ttl_secs: u64,

    #[serde(default = "ConfigDefaults::pending_consent_ttl_secs")]
    pub pending_consent_ttl_secs: u64,

    #[serde(default = "ConfigDefaults::node_store_ttl_secs")]
    pub node_store_ttl_secs: u64,

    /// Bound for each call to the IdP or to node communication.
    #[serde(default = "ConfigDefaults::upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,

    pub light_token: LightTokenConfig,

    pub oidc: OidcConfig,
}


//------------ LightTokenConfig ----------------------------------------------

/// Issuers and secrets of the tokens exchanged with the node.
#[derive(Clone, Debug, Deserialize)]
pub struct LightTokenConfig {
    pub request: TokenIssuerConfig,
    pub response: TokenIssuerConfig,
}

#[derive(Clone, Deserialize)]
pub struct TokenIssuerConfig {
    pub issuer_name: String,
    pub secret: String,
}

impl TokenIssuerConfig {
    pub fn codec(&self) -> TokenCodec {
        TokenCodec::new(self.issuer_name.clone(), self.secret.clone())
    }
}

impl fmt::Debug for TokenIssuerConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TokenIssuerConfig")
            .field("issuer_name", &self.issuer_name)
            .finish_non_exhaustive()
    }
}

impl LightTokenConfig {
    /// Returns defaults with the given secrets, mostly for testing.
    pub fn with_secrets(request: &str, response: &str) -> Self {
        LightTokenConfig {
            request: TokenIssuerConfig {
                issuer_name: ConfigDefaults::request_issuer_name(),
                secret: request.into(),
            },
            response: TokenIssuerConfig {
                issuer_name: ConfigDefaults::response_issuer_name(),
                secret: response.into(),
            },
        }
    }
}


//------------ OidcConfig ----------------------------------------------------

/// The OpenID Connect identity provider to authenticate citizens with.
#[derive(Clone, Deserialize)]
pub struct OidcConfig {
    /// The issuer URL used for discovering the provider metadata.
    pub issuer_url: Url,

    pub client_id: String,

    pub client_secret: String,

    /// Where the IdP sends the browser back to.
    pub redirect_uri: Url,

    /// Scopes requested in addition to `openid`.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// The error code the IdP uses when the citizen cancels.
    #[serde(default = "ConfigDefaults::error_code_user_cancel")]
    pub error_code_user_cancel: String,

    #[serde(default)]
    pub ui_locales: Option<String>,

    /// Whether to log all traffic with the IdP at trace level.
    #[serde(default)]
    pub http_debug_log_enabled: bool,

    #[serde(default)]
    pub state_cookie: StateCookieConfig,
}

impl fmt::Debug for OidcConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("OidcConfig")
            .field("issuer_url", &self.issuer_url.as_str())
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri.as_str())
            .field("scopes", &self.scopes)
            .field("error_code_user_cancel", &self.error_code_user_cancel)
            .field("ui_locales", &self.ui_locales)
            .field("state_cookie", &self.state_cookie)
            .finish_non_exhaustive()
    }
}


//------------ Accessors -----------------------------------------------------

impl Config {
    pub fn socket_addresses(&self) -> Vec<SocketAddr> {
        self.ip.iter().map(|ip| SocketAddr::new(*ip, self.port)).collect()
    }

    pub fn correlation_ttl(&self) -> Duration {
        Duration::from_secs(self.correlation_ttl_secs)
    }

    pub fn pending_consent_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_consent_ttl_secs)
    }

    pub fn node_store_ttl(&self) -> Duration {
        Duration::from_secs(self.node_store_ttl_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}


//------------ Loading and Verifying -----------------------------------------

impl Config {
    /// Reads, parses and verifies the config file.
    pub fn create(file: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_config(file)?;
        config.verify()?;
        Ok(config)
    }

    pub fn read_config(file: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(file).map_err(|err| {
            ConfigError::Other(format!(
                "Cannot read config file '{}': {}", file.display(), err
            ))
        })?;
        let c: Config = toml::from_str(&content)?;
        Ok(c)
    }

    pub fn verify(&self) -> Result<(), ConfigError> {
        if self.ip.is_empty() {
            return Err(ConfigError::other("At least one ip must be set"));
        }

        if self.supported_sp_types.is_empty() {
            return Err(ConfigError::other(
                "supported_sp_types must contain at least one type",
            ));
        }

        for (name, value) in [
            ("correlation_ttl_secs", self.correlation_ttl_secs),
            ("pending_consent_ttl_secs", self.pending_consent_ttl_secs),
            ("node_store_ttl_secs", self.node_store_ttl_secs),
            ("upstream_timeout_secs", self.upstream_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Other(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        for (name, issuer) in [
            ("light_token.request", &self.light_token.request),
            ("light_token.response", &self.light_token.response),
        ] {
            if issuer.issuer_name.is_empty() {
                return Err(ConfigError::Other(format!(
                    "{name}.issuer_name must not be empty"
                )));
            }
            if issuer.secret.is_empty() {
                return Err(ConfigError::Other(format!(
                    "{name}.secret must not be empty"
                )));
            }
        }

        if self.oidc.client_id.is_empty() {
            return Err(ConfigError::other("oidc.client_id must not be empty"));
        }
        if self.oidc.client_secret.is_empty() {
            return Err(ConfigError::other(
                "oidc.client_secret must not be empty"
            ));
        }
        if self.oidc.error_code_user_cancel.is_empty() {
            return Err(ConfigError::other(
                "oidc.error_code_user_cancel must not be empty"
            ));
        }

        Ok(())
    }
}


//------------ Logging -------------------------------------------------------

impl Config {
    /// Installs the global logger according to `log_type`.
    pub fn init_logging(&self) -> Result<(), ConfigError> {
        let output = match self.log_type {
            LogType::Stderr => fern::Output::from(io::stderr()),
            LogType::File => {
                let file = fern::log_file(&self.log_file).map_err(|err| {
                    ConfigError::Other(format!(
                        "cannot open log file {}: {}",
                        self.log_file.display(), err
                    ))
                })?;
                fern::Output::from(file)
            }
            LogType::Syslog => self.syslog_output()?,
        };
        self.fern_logger().chain(output).apply().map_err(|err| {
            ConfigError::Other(format!("cannot install logger: {}", err))
        })
    }

    /// Connects to the local syslog daemon.
    ///
    /// The unix socket is tried first, then TCP and UDP on the loopback
    /// address.
    #[cfg(unix)]
    fn syslog_output(&self) -> Result<fern::Output, ConfigError> {
        let facility = Facility::from_str(&self.syslog_facility).map_err(|_| {
            ConfigError::Other(format!(
                "unknown syslog facility: {}", self.syslog_facility
            ))
        })?;
        let process = env::current_exe().ok()
            .and_then(|exe| {
                exe.file_name().map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "eidas-proxy".into());
        let formatter = syslog::Formatter3164 {
            facility, hostname: None, process, pid: std::process::id(),
        };

        let logger = match syslog::unix(formatter.clone()) {
            Ok(logger) => logger,
            Err(_) => syslog::tcp(formatter.clone(), ("127.0.0.1", 601))
                .or_else(|_| {
                    syslog::udp(formatter, ("127.0.0.1", 0), ("127.0.0.1", 514))
                })
                .map_err(|err| {
                    ConfigError::Other(format!("no syslog available: {}", err))
                })?,
        };
        Ok(fern::Output::from(logger))
    }

    #[cfg(not(unix))]
    fn syslog_output(&self) -> Result<fern::Output, ConfigError> {
        Err(ConfigError::other("syslog is only supported on unix"))
    }

    /// Returns the dispatcher with per-target levels applied.
    ///
    /// Libraries are capped at warn. The IdP traffic log stays at debug
    /// or below unless `oidc.http_debug_log_enabled` is set.
    fn fern_logger(&self) -> fern::Dispatch {
        let level = self.log_level;
        let library_level = level.min(LevelFilter::Warn);
        let idp_traffic_level = match self.oidc.http_debug_log_enabled {
            true => level,
            false => level.min(LevelFilter::Debug),
        };
        let with_target = level >= LevelFilter::Debug;

        let mut dispatch = fern::Dispatch::new()
            .format(move |out, message, record| {
                let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
                if with_target {
                    out.finish(format_args!(
                        "{} [{}] [{}] {}",
                        now, record.level(), record.target(), message
                    ))
                } else {
                    out.finish(format_args!(
                        "{} [{}] {}", now, record.level(), message
                    ))
                }
            })
            .level(level);
        for target in NOISY_LIBRARIES {
            dispatch = dispatch.level_for(*target, library_level);
        }
        dispatch.level_for("eidas_proxy::idp::httpclient", idp_traffic_level)
    }
}

/// Dependencies whose info and debug output drowns our own.
const NOISY_LIBRARIES: &[&str] = &[
    "h2", "hyper", "hyper_util", "mio", "reqwest", "rustls", "want",
];


//------------ ConfigError ---------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    IoError(io::Error),
    TomlError(toml::de::Error),
    Other(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => e.fmt(f),
            ConfigError::TomlError(e) => e.fmt(f),
            ConfigError::Other(s) => s.fmt(f),
        }
    }
}

impl std::error::Error for ConfigError {}

impl ConfigError {
    pub fn other(s: &str) -> ConfigError {
        ConfigError::Other(s.to_string())
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::IoError(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::TomlError(e)
    }
}


//------------ LogType -------------------------------------------------------

/// The target to log to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LogType {
    Stderr,
    File,
    Syslog,
}

impl<'de> Deserialize<'de> for LogType {
    fn deserialize<D>(d: D) -> Result<LogType, D::Error>
    where
        D: Deserializer<'de>,
    {
        let string = String::deserialize(d)?;
        match string.as_str() {
            "stderr" => Ok(LogType::Stderr),
            "file" => Ok(LogType::File),
            "syslog" => Ok(LogType::Syslog),
            _ => Err(de::Error::custom(format!(
                "expected \"stderr\", \"file\" or \"syslog\", found : \"{}\"",
                string
            ))),
        }
    }
}


//------------ Helper Functions ----------------------------------------------

fn deserialize_level_filter<'de, D>(d: D) -> Result<LevelFilter, D::Error>
where
    D: Deserializer<'de>,
{
    let string = String::deserialize(d)?;
    LevelFilter::from_str(&string).map_err(de::Error::custom)
}

/// Accepts either a single value or a list of values.
fn deserialize_one_or_many<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        One(T),
        Many(Vec<T>),
    }

    Ok(match OneOrMany::<T>::deserialize(d)? {
        OneOrMany::One(item) => vec![item],
        OneOrMany::Many(items) => items,
    })
}


//============ Tests =========================================================
