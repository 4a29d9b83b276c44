//! The proxy service.
//!
//! A citizen's authentication passes the proxy twice. First, the eIDAS
//! node sends the browser with a light request token, the proxy validates
//! the request and sends the browser on to the IdP (see [`request_flow`]).
//! Then the IdP sends the browser back, the proxy recovers the request,
//! redeems the authorization code and answers the node, possibly after
//! asking the citizen for consent (see [`response_flow`] and [`consent`]).
//!
//! Between the hops, all state lives in correlation stores which hand out
//! each entry exactly once.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use log::{debug, info};
use tokio::runtime;
use url::Url;
use crate::commons::ProxyResult;
use crate::commons::error::Error;
use crate::commons::store::{CorrelationStore, MemoryStore};
use crate::config::Config;
use crate::idp::IdentityProvider;
use crate::light::LightResponse;
use crate::light::node::NodeCommunication;
use crate::light::registry::AttributeRegistry;
use crate::light::token::TokenCodec;
use self::correlation::{CorrelationEntry, PendingConsentEntry};
use self::csrf::CsrfStateBinder;

pub mod consent;
pub mod correlation;
pub mod csrf;
pub mod request_flow;
pub mod response_flow;


//------------ ProxySettings -------------------------------------------------

/// The settings governing the behaviour of the flows.
#[derive(Clone, Debug)]
pub struct ProxySettings {
    /// Service provider types allowed to request authentication.
    pub supported_sp_types: Vec<String>,

    /// Whether the citizen confirms the attributes before release.
    pub ask_consent: bool,

    /// Where to send the browser with a light response token.
    pub node_specific_response_url: Url,

    /// The issuer put into light responses.
    pub response_issuer: String,

    /// The IdP error code signalling that the citizen cancelled.
    pub error_code_user_cancel: String,

    pub correlation_ttl: Duration,
    pub pending_consent_ttl: Duration,
    pub upstream_timeout: Duration,
}

impl ProxySettings {
    pub fn from_config(config: &Config) -> Self {
        ProxySettings {
            supported_sp_types: config.supported_sp_types.clone(),
            ask_consent: config.ask_consent,
            node_specific_response_url:
                config.node_specific_response_url.clone(),
            response_issuer: config.response_issuer.clone(),
            error_code_user_cancel:
                config.oidc.error_code_user_cancel.clone(),
            correlation_ttl: config.correlation_ttl(),
            pending_consent_ttl: config.pending_consent_ttl(),
            upstream_timeout: config.upstream_timeout(),
        }
    }
}


//------------ ProxyService --------------------------------------------------

/// Everything needed to run the flows.
pub struct ProxyService {
    settings: ProxySettings,
    node: Arc<dyn NodeCommunication>,
    idp: Arc<dyn IdentityProvider>,
    correlations: Arc<dyn CorrelationStore<CorrelationEntry>>,
    pending_consents: Arc<dyn CorrelationStore<PendingConsentEntry>>,
    consent_codec: TokenCodec,
    registry: AttributeRegistry,
    binder: CsrfStateBinder,
}

impl ProxyService {
    /// Creates a new service keeping its state in memory.
    ///
    /// If a runtime is given, sweepers for the stores are spawned on it.
    pub fn new(
        settings: ProxySettings,
        node: Arc<dyn NodeCommunication>,
        idp: Arc<dyn IdentityProvider>,
        consent_codec: TokenCodec,
        registry: AttributeRegistry,
        binder: CsrfStateBinder,
        runtime: Option<&runtime::Handle>,
    ) -> Self {
        let correlations = MemoryStore::new("correlation");
        let pending_consents = MemoryStore::new("pending consent");
        if let Some(runtime) = runtime {
            correlations.spawn_sweep(runtime);
            pending_consents.spawn_sweep(runtime);
        }
        ProxyService {
            settings,
            node,
            idp,
            correlations: Arc::new(correlations),
            pending_consents: Arc::new(pending_consents),
            consent_codec,
            registry,
            binder,
        }
    }

    /// Replaces the stores, e.g., with shared ones.
    pub fn with_stores(
        mut self,
        correlations: Arc<dyn CorrelationStore<CorrelationEntry>>,
        pending_consents: Arc<dyn CorrelationStore<PendingConsentEntry>>,
    ) -> Self {
        self.correlations = correlations;
        self.pending_consents = pending_consents;
        self
    }

    pub fn settings(&self) -> &ProxySettings {
        &self.settings
    }

    pub fn registry(&self) -> &AttributeRegistry {
        &self.registry
    }

    /// Answers the node with a denial of the given request.
    ///
    /// Returns the URL to send the browser to.
    pub async fn deliver_denial(
        &self, request_id: &str, relay_state: Option<&str>, message: &str
    ) -> ProxyResult<Url> {
        info!("Denying request {request_id}: {message}");
        let mut response = LightResponse::denied(
            request_id, self.settings.response_issuer.as_str(), message
        );
        response.relay_state = relay_state.map(Into::into);
        self.deliver(response).await
    }

    /// Hands a light response to the node.
    ///
    /// Returns the URL to send the browser to.
    async fn deliver(&self, response: LightResponse) -> ProxyResult<Url> {
        let token = self.bounded(
            "node communication", self.node.put_response(response)
        ).await?;
        let mut url = self.settings.node_specific_response_url.clone();
        url.query_pairs_mut().append_pair("token", &token);
        debug!("Redirecting to node at {}", url);
        Ok(url)
    }

    /// Runs a call to a collaborator with the configured timeout.
    async fn bounded<T>(
        &self,
        what: &'static str,
        fut: impl Future<Output = ProxyResult<T>>,
    ) -> ProxyResult<T> {
        tokio::time::timeout(
            self.settings.upstream_timeout, fut
        ).await.map_err(|_| Error::UpstreamTimeout(what))?
    }
}
