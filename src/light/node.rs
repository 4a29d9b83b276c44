//! Communication with the eIDAS node.
//!
//! The node and the proxy exchange light requests and responses through
//! shared storage, passing only tokens through the browser.

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use log::{debug, warn};
use tokio::runtime;
use crate::commons::ProxyResult;
use crate::commons::store::{CorrelationStore, MemoryStore};
use super::{LightRequest, LightResponse};
use super::token::TokenCodec;


//------------ NodeCommunication ---------------------------------------------

/// The proxy's side of talking to the eIDAS node.
#[async_trait]
pub trait NodeCommunication: Send + Sync {
    /// Consumes the light request referenced by a token from the node.
    ///
    /// Returns `Ok(None)` if the token is invalid or there is no such
    /// request (any more).
    async fn get_and_remove_request(
        &self, token: &str
    ) -> ProxyResult<Option<LightRequest>>;

    /// Stores a light response for the node and returns its token.
    async fn put_response(&self, response: LightResponse) -> ProxyResult<String>;
}


//------------ StoreNodeCommunication ----------------------------------------

/// Node communication through correlation stores.
///
/// Next to the proxy side, this also provides the node side operations so
/// that a node running in the same process, or a test, can drive it.
pub struct StoreNodeCommunication {
    requests: Arc<dyn CorrelationStore<LightRequest>>,
    responses: Arc<dyn CorrelationStore<LightResponse>>,
    request_codec: TokenCodec,
    response_codec: TokenCodec,
    ttl: Duration,
}

impl StoreNodeCommunication {
    pub fn new(
        requests: Arc<dyn CorrelationStore<LightRequest>>,
        responses: Arc<dyn CorrelationStore<LightResponse>>,
        request_codec: TokenCodec,
        response_codec: TokenCodec,
        ttl: Duration,
    ) -> Self {
        StoreNodeCommunication {
            requests, responses, request_codec, response_codec, ttl
        }
    }

    /// Creates node communication on fresh in-memory stores.
    ///
    /// If a runtime is given, sweepers for both stores are spawned on it.
    pub fn in_memory(
        request_codec: TokenCodec,
        response_codec: TokenCodec,
        ttl: Duration,
        runtime: Option<&runtime::Handle>,
    ) -> Self {
        let requests = MemoryStore::new("light request");
        let responses = MemoryStore::new("light response");
        if let Some(runtime) = runtime {
            requests.spawn_sweep(runtime);
            responses.spawn_sweep(runtime);
        }
        Self::new(
            Arc::new(requests), Arc::new(responses),
            request_codec, response_codec, ttl,
        )
    }

    /// Stores a light request as the node would and returns its token.
    pub async fn put_request(
        &self, request: LightRequest
    ) -> ProxyResult<String> {
        let reference = self.request_codec.issue();
        self.requests.put(reference.id.clone(), request, self.ttl).await?;
        Ok(self.request_codec.encode(&reference))
    }

    /// Consumes a light response as the node would.
    pub async fn get_and_remove_response(
        &self, token: &str
    ) -> ProxyResult<Option<LightResponse>> {
        match self.response_codec.decode(token) {
            Ok(reference) => {
                self.responses.get_and_remove(&reference.id).await
            }
            Err(err) => {
                warn!("Rejecting light response token: {err}");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl NodeCommunication for StoreNodeCommunication {
    async fn get_and_remove_request(
        &self, token: &str
    ) -> ProxyResult<Option<LightRequest>> {
        let reference = match self.request_codec.decode(token) {
            Ok(reference) => reference,
            Err(err) => {
                debug!("Rejecting light request token: {err}");
                return Ok(None)
            }
        };
        self.requests.get_and_remove(&reference.id).await
    }

    async fn put_response(
        &self, response: LightResponse
    ) -> ProxyResult<String> {
        let reference = self.response_codec.issue();
        debug!(
            "Storing light response {} for request {} as {}",
            response.id, response.in_response_to_id, reference.id
        );
        self.responses.put(reference.id.clone(), response, self.ttl).await?;
        Ok(self.response_codec.encode(&reference))
    }
}


//============ Tests =========================================================
