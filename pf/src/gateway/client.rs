//! Reasoning client trait, client factory, and test mock

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::config::ConfigSnapshot;

use super::{GatewayError, InvokeRequest};

/// One call to the external reasoning provider. A single network round-trip;
/// retry policy lives above this trait in [`super::invoke_with_retry`].
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    async fn invoke(&self, request: InvokeRequest) -> Result<Value, GatewayError>;
}

/// Builds a client bound to one pipeline's configuration snapshot, so a
/// concurrent credential change never affects an in-flight job.
pub trait ClientFactory: Send + Sync {
    fn create(&self, snapshot: &ConfigSnapshot) -> Result<Arc<dyn ReasoningClient>, GatewayError>;
}

pub mod mock {
    //! Scripted reasoning clients for orchestrator tests

    use std::collections::VecDeque;
    use std::sync::{Mutex, PoisonError};

    use super::*;

    type Handler = dyn Fn(&InvokeRequest) -> Result<Value, GatewayError> + Send + Sync;

    /// A reasoning client that replays scripted responses, or delegates to a
    /// handler closure for request-dependent behavior.
    pub struct MockReasoningClient {
        scripted: Mutex<VecDeque<Result<Value, GatewayError>>>,
        handler: Option<Box<Handler>>,
        calls: Mutex<Vec<InvokeRequest>>,
    }

    impl MockReasoningClient {
        /// Replay the given responses in order
        pub fn new(responses: Vec<Result<Value, GatewayError>>) -> Self {
            Self {
                scripted: Mutex::new(responses.into()),
                handler: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Answer every request through a closure
        pub fn with_handler(
            handler: impl Fn(&InvokeRequest) -> Result<Value, GatewayError> + Send + Sync + 'static,
        ) -> Self {
            Self {
                scripted: Mutex::new(VecDeque::new()),
                handler: Some(Box::new(handler)),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Requests seen so far, in call order
        pub fn calls(&self) -> Vec<InvokeRequest> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
        }
    }

    #[async_trait]
    impl ReasoningClient for MockReasoningClient {
        async fn invoke(&self, request: InvokeRequest) -> Result<Value, GatewayError> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(request.clone());
            if let Some(handler) = &self.handler {
                return handler(&request);
            }
            self.scripted
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
                .unwrap_or_else(|| {
                    Err(GatewayError::InvalidRequest(
                        "mock script exhausted".to_string(),
                    ))
                })
        }
    }

    /// Factory that hands every pipeline the same shared client
    pub struct MockFactory {
        client: Arc<dyn ReasoningClient>,
    }

    impl MockFactory {
        pub fn new(client: Arc<dyn ReasoningClient>) -> Self {
            Self { client }
        }
    }

    impl ClientFactory for MockFactory {
        fn create(&self, _snapshot: &ConfigSnapshot) -> Result<Arc<dyn ReasoningClient>, GatewayError> {
            Ok(Arc::clone(&self.client))
        }
    }
}
