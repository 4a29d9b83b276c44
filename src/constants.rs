//! Various proxy-wide constants.


//------------ Binary Names -------------------------------------------------

/// The friendly name of the proxy binary.
pub const PROXY_SERVER_APP: &str = "eIDAS Specific Proxy Service";

/// The version of the proxy.
pub const PROXY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The user agent used for outgoing HTTP requests.
pub const PROXY_USER_AGENT: &str = concat!(
    "eidas-proxy/", env!("CARGO_PKG_VERSION")
);


//------------ Config Files Paths -------------------------------------------

/// The default path to the proxy config file.
pub const PROXY_DEFAULT_CONFIG_FILE: &str = "/etc/eidas-proxy.conf";


//------------ Environment Variables ----------------------------------------

/// The environment variable for overriding the default log level.
pub const PROXY_ENV_LOG_LEVEL: &str = "EIDAS_PROXY_LOG_LEVEL";


//------------ HTTP Endpoints -----------------------------------------------

/// The endpoint the eIDAS node sends light requests to.
pub const PROXY_SERVICE_REQUEST_ENDPOINT: &str = "ProxyServiceRequest";

/// The endpoint the identity provider redirects the citizen back to.
pub const IDP_RESPONSE_ENDPOINT: &str = "IdpResponse";

/// The endpoint the citizen confirms or declines consent at.
pub const CONSENT_ENDPOINT: &str = "Consent";


//------------ Parameters and Cookies ---------------------------------------

/// The name of the cookie binding the OIDC state to the browser.
pub const CSRF_COOKIE_NAME: &str = "eidas_service_proxy_oidc_csrf";

/// The maximum length of a single request parameter value.
pub const MAX_PARAMETER_LENGTH: usize = 1000;

/// The number of random bytes in a freshly generated state value.
pub const STATE_RANDOM_BYTES: usize = 32;


//------------ Timeouts and TTLs --------------------------------------------

/// Default time a correlation entry waits for the IdP callback.
pub const DEFAULT_CORRELATION_TTL_SECS: u64 = 300;

/// Default time a pending consent waits for the citizen.
pub const DEFAULT_PENDING_CONSENT_TTL_SECS: u64 = 300;

/// Default time a light request or response stays in the node store.
pub const DEFAULT_NODE_STORE_TTL_SECS: u64 = 120;

/// Default bound for calls to the IdP and to node communication.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;

/// The interval between two sweeps of an in-memory store.
pub const STORE_SWEEP_INTERVAL_SECS: u64 = 60;


//------------ SAML ---------------------------------------------------------

/// SAML status code for a successful authentication.
pub const SAML_STATUS_SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";

/// SAML status code blaming the requester.
pub const SAML_STATUS_REQUESTER: &str =
    "urn:oasis:names:tc:SAML:2.0:status:Requester";

/// SAML sub-status code for a denied request.
pub const SAML_SUB_STATUS_REQUEST_DENIED: &str =
    "urn:oasis:names:tc:SAML:2.0:status:RequestDenied";

/// Prefix of the eIDAS levels of assurance.
pub const EIDAS_LOA_PREFIX: &str = "http://eidas.europa.eu/LoA/";
