//! Lookup table from verification method to verifier implementation.

use std::collections::HashMap;
use std::sync::Arc;

use covenant_primitives::VerificationMethod;
use serde::{Deserialize, Serialize};

use crate::cache::CachedVerifier;
use crate::causal::CausalVerifier;
use crate::certified::{CertifiedVerifier, DEFAULT_EPSILON};
use crate::formal::FormalVerifier;
use crate::neural_symbolic::{FeatureHeuristicModel, NeuralSymbolicVerifier};
use crate::optimizer::HeuristicOptimizerVerifier;
use crate::statistical::StatisticalVerifier;
use crate::symbolic::SymbolicVerifier;
use crate::traits::{Verifier, VerifierError, VerifierResult};

/// Parameters of the heuristic optimizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerSettings {
    /// Base seed, mixed with each constraint id.
    pub seed: u64,
    /// Number of generations.
    pub iterations: usize,
    /// Candidates per generation.
    pub population: usize,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            seed: 42,
            iterations: 10,
            population: 20,
        }
    }
}

impl OptimizerSettings {
    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::InvalidSettings`] when either bound is zero.
    pub fn validate(&self) -> VerifierResult<()> {
        if self.iterations == 0 || self.population == 0 {
            return Err(VerifierError::InvalidSettings {
                reason: "optimizer iterations and population must be non-zero".into(),
            });
        }
        Ok(())
    }
}

/// Settings for the built-in verifiers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerifierSettings {
    /// Weight of the learned score in the neural-symbolic blend.
    pub neural_weight: f64,
    /// Weight of the rule score in the neural-symbolic blend.
    pub symbolic_weight: f64,
    /// Heuristic optimizer parameters.
    pub optimizer: OptimizerSettings,
    /// Default perturbation radius for certified checks.
    pub certified_epsilon: f64,
    /// Maximum number of cached assessments per verifier.
    pub cache_capacity: usize,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            neural_weight: 0.6,
            symbolic_weight: 0.4,
            optimizer: OptimizerSettings::default(),
            certified_epsilon: DEFAULT_EPSILON,
            cache_capacity: 10_000,
        }
    }
}

impl VerifierSettings {
    /// Validates every setting by constructing the verifiers it configures.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::InvalidSettings`] describing the first
    /// offending value.
    pub fn validate(&self) -> VerifierResult<()> {
        VerifierRegistry::with_defaults(self).map(|_| ())
    }
}

/// Registry of verifiers keyed by [`VerificationMethod`].
#[derive(Default, Clone)]
pub struct VerifierRegistry {
    verifiers: HashMap<VerificationMethod, Arc<dyn Verifier>>,
}

impl VerifierRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every built-in verifier, each behind its own assessment
    /// cache.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::InvalidSettings`] when `settings` are
    /// invalid.
    pub fn with_defaults(settings: &VerifierSettings) -> VerifierResult<Self> {
        let built_in: [Arc<dyn Verifier>; 7] = [
            Arc::new(FormalVerifier),
            Arc::new(NeuralSymbolicVerifier::new(
                Arc::new(FeatureHeuristicModel),
                settings.neural_weight,
                settings.symbolic_weight,
            )?),
            Arc::new(CausalVerifier),
            Arc::new(HeuristicOptimizerVerifier::new(settings.optimizer)?),
            Arc::new(StatisticalVerifier),
            Arc::new(SymbolicVerifier),
            Arc::new(CertifiedVerifier::new(settings.certified_epsilon)?),
        ];

        let mut registry = Self::new();
        for verifier in built_in {
            registry.register_cached(verifier, settings.cache_capacity);
        }
        Ok(registry)
    }

    /// Registers a verifier, replacing any previous one for its method.
    pub fn register(&mut self, verifier: Arc<dyn Verifier>) {
        self.verifiers.insert(verifier.method(), verifier);
    }

    /// Registers a verifier behind a fresh assessment cache.
    pub fn register_cached(&mut self, verifier: Arc<dyn Verifier>, capacity: usize) {
        self.register(Arc::new(CachedVerifier::new(verifier, capacity)));
    }

    /// Returns the verifier answering for `method`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::Unavailable`] when none is registered.
    pub fn get(&self, method: VerificationMethod) -> VerifierResult<Arc<dyn Verifier>> {
        self.verifiers
            .get(&method)
            .cloned()
            .ok_or(VerifierError::Unavailable { method })
    }

    /// Returns the registered method tags, sorted.
    #[must_use]
    pub fn methods(&self) -> Vec<VerificationMethod> {
        let mut methods: Vec<_> = self.verifiers.keys().copied().collect();
        methods.sort();
        methods
    }
}

impl std::fmt::Debug for VerifierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifierRegistry")
            .field("methods", &self.methods())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_method() {
        let registry = VerifierRegistry::with_defaults(&VerifierSettings::default()).unwrap();
        assert_eq!(registry.methods(), VerificationMethod::ALL.to_vec());
        for method in VerificationMethod::ALL {
            assert_eq!(registry.get(method).unwrap().method(), method);
        }
    }

    #[test]
    fn empty_registry_reports_unavailable() {
        let registry = VerifierRegistry::new();
        assert!(matches!(
            registry.get(VerificationMethod::Formal),
            Err(VerifierError::Unavailable { .. })
        ));
    }

    #[test]
    fn invalid_settings_rejected() {
        let settings = VerifierSettings {
            neural_weight: 0.9,
            ..VerifierSettings::default()
        };
        assert!(settings.validate().is_err());

        let settings = VerifierSettings {
            optimizer: OptimizerSettings {
                population: 0,
                ..OptimizerSettings::default()
            },
            ..VerifierSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
