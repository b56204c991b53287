//! Adapter for verification backends reached over the network.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use covenant_primitives::{Action, Constraint, VerificationMethod};
use serde::Serialize;
use tracing::warn;

use crate::traits::{Assessment, Verifier, VerifierError, VerifierResult};

/// Borrowed payload handed to a remote backend.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct RemoteRequest<'a> {
    /// Constraint under assessment.
    pub constraint: &'a Constraint,
    /// Action under assessment.
    pub action: &'a Action,
}

/// Trait implemented by external verification services.
#[async_trait]
pub trait VerificationBackend: Send + Sync {
    /// Assesses the request and returns the backend's answer.
    async fn assess(&self, request: RemoteRequest<'_>) -> VerifierResult<Assessment>;
}

/// Verifier that delegates to a [`VerificationBackend`] under a timeout.
#[derive(Clone)]
pub struct RemoteVerifier<B>
where
    B: VerificationBackend + 'static,
{
    method: VerificationMethod,
    backend: Arc<B>,
    timeout: Duration,
}

impl<B> RemoteVerifier<B>
where
    B: VerificationBackend + 'static,
{
    /// Creates a remote verifier answering for `method`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::InvalidSettings`] when `timeout` is zero.
    pub fn new(method: VerificationMethod, backend: Arc<B>, timeout: Duration) -> VerifierResult<Self> {
        if timeout.is_zero() {
            return Err(VerifierError::InvalidSettings {
                reason: "remote verifier timeout must be non-zero".into(),
            });
        }
        Ok(Self {
            method,
            backend,
            timeout,
        })
    }

    /// Returns the configured timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl<B> Verifier for RemoteVerifier<B>
where
    B: VerificationBackend + 'static,
{
    fn method(&self) -> VerificationMethod {
        self.method
    }

    async fn assess(&self, constraint: &Constraint, action: &Action) -> VerifierResult<Assessment> {
        let request = RemoteRequest { constraint, action };
        match tokio::time::timeout(self.timeout, self.backend.assess(request)).await {
            Ok(answer) => answer?.validated(),
            Err(_) => {
                warn!(
                    constraint = %constraint.id(),
                    method = %self.method,
                    timeout_ms = self.timeout.as_millis(),
                    "remote verification backend timed out"
                );
                Err(VerifierError::Timeout {
                    elapsed: self.timeout,
                })
            }
        }
    }
}
