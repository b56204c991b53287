//! Append-only assessment cache shared by concurrent evaluations.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use covenant_primitives::{Action, Constraint, ConstraintId, VerificationMethod};
use tracing::debug;

use crate::traits::{Assessment, Verifier, VerifierResult};

type CacheKey = (ConstraintId, String);

/// Capacity-bounded map from `(constraint id, canonical key)` to the
/// assessment a verifier produced.
///
/// The canonical key covers the full constraint definition as well as the
/// action inputs, so a constraint removed and re-added under the same id
/// with a different definition never sees the old answers.
///
/// Entries are never replaced or evicted. Once the capacity is reached new
/// keys are simply not stored, so a cached answer is always the first one
/// computed for its key.
#[derive(Debug)]
pub struct AssessmentCache {
    entries: RwLock<HashMap<CacheKey, Assessment>>,
    capacity: usize,
}

impl AssessmentCache {
    /// Creates an empty cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Canonical key for a constraint definition applied to an action, or
    /// `None` when either cannot be canonicalised.
    #[must_use]
    pub fn key_for(constraint: &Constraint, action: &Action) -> Option<String> {
        serde_jcs::to_string(&(constraint, action.evaluation_inputs())).ok()
    }

    /// Looks up a cached assessment.
    #[must_use]
    pub fn get(&self, constraint: &ConstraintId, inputs: &str) -> Option<Assessment> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&(constraint.clone(), inputs.to_owned()))
            .cloned()
    }

    /// Stores an assessment unless the key is present or the cache is full.
    pub fn insert(&self, constraint: &ConstraintId, inputs: String, assessment: Assessment) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.len() >= self.capacity {
            return;
        }
        entries
            .entry((constraint.clone(), inputs))
            .or_insert(assessment);
    }

    /// Returns the number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` when nothing has been cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Verifier decorator that memoises successful assessments.
///
/// Failures are never cached, so a transient backend error is retried on
/// the next evaluation.
pub struct CachedVerifier {
    inner: Arc<dyn Verifier>,
    cache: AssessmentCache,
}

impl CachedVerifier {
    /// Wraps `inner` with a cache of the given capacity.
    #[must_use]
    pub fn new(inner: Arc<dyn Verifier>, capacity: usize) -> Self {
        Self {
            inner,
            cache: AssessmentCache::new(capacity),
        }
    }

    /// Returns the underlying cache.
    #[must_use]
    pub const fn cache(&self) -> &AssessmentCache {
        &self.cache
    }
}

impl std::fmt::Debug for CachedVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedVerifier")
            .field("method", &self.inner.method())
            .field("cache", &self.cache)
            .finish()
    }
}

#[async_trait]
impl Verifier for CachedVerifier {
    fn method(&self) -> VerificationMethod {
        self.inner.method()
    }

    async fn assess(&self, constraint: &Constraint, action: &Action) -> VerifierResult<Assessment> {
        let Some(key) = AssessmentCache::key_for(constraint, action) else {
            return self.inner.assess(constraint, action).await;
        };

        if let Some(hit) = self.cache.get(constraint.id(), &key) {
            debug!(
                constraint = %constraint.id(),
                method = %self.inner.method(),
                "assessment cache hit"
            );
            return Ok(hit);
        }

        let assessment = self.inner.assess(constraint, action).await?;
        self.cache
            .insert(constraint.id(), key, assessment.clone());
        Ok(assessment)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use covenant_primitives::ConstraintDomain;

    use super::*;

    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Verifier for Counting {
        fn method(&self) -> VerificationMethod {
            VerificationMethod::Formal
        }

        async fn assess(&self, _: &Constraint, _: &Action) -> VerifierResult<Assessment> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            #[allow(clippy::cast_precision_loss)]
            Ok(Assessment::binary(true, 1.0 / (n as f64 + 1.0)))
        }
    }

    fn constraint(id: &str) -> Constraint {
        Constraint::builder(ConstraintId::new(id).unwrap(), ConstraintDomain::Safety)
            .description("d")
            .unwrap()
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn repeated_inputs_hit_the_cache() {
        let inner = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedVerifier::new(inner.clone(), 16);
        let c = constraint("c");
        let a1 = Action::builder("t").parameter("x", 1).build().unwrap();
        let a2 = Action::builder("t").parameter("x", 1).build().unwrap();

        let first = cached.assess(&c, &a1).await.unwrap();
        let second = cached.assess(&c, &a2).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);

        let other = Action::builder("t").parameter("x", 2).build().unwrap();
        cached.assess(&c, &other).await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cached.cache().len(), 2);
    }

    #[test]
    fn capacity_bounds_growth_without_eviction() {
        let cache = AssessmentCache::new(1);
        let id = ConstraintId::new("c").unwrap();
        cache.insert(&id, "a".into(), Assessment::binary(true, 1.0));
        cache.insert(&id, "b".into(), Assessment::binary(false, 1.0));
        cache.insert(&id, "a".into(), Assessment::binary(false, 0.0));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&id, "a"), Some(Assessment::binary(true, 1.0)));
        assert_eq!(cache.get(&id, "b"), None);
    }

    #[test]
    fn key_ignores_object_key_order() {
        let a = Action::builder("t")
            .parameter("a", 1)
            .parameter("b", 2)
            .build()
            .unwrap();
        let b = Action::builder("t")
            .parameter("b", 2)
            .parameter("a", 1)
            .build()
            .unwrap();
        let c = constraint("c");
        assert_eq!(
            AssessmentCache::key_for(&c, &a),
            AssessmentCache::key_for(&c, &b)
        );
    }

    #[tokio::test]
    async fn redefined_constraint_misses_the_cache() {
        let inner = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedVerifier::new(inner.clone(), 16);
        let action = Action::builder("t").parameter("harm", 1).build().unwrap();
        let strict = Constraint::builder(ConstraintId::new("bound").unwrap(), ConstraintDomain::Safety)
            .description("d")
            .unwrap()
            .formal_spec("harm == 0")
            .build()
            .unwrap();
        let relaxed = Constraint::builder(ConstraintId::new("bound").unwrap(), ConstraintDomain::Safety)
            .description("d")
            .unwrap()
            .formal_spec("harm <= 5")
            .build()
            .unwrap();

        cached.assess(&strict, &action).await.unwrap();
        cached.assess(&relaxed, &action).await.unwrap();
        cached.assess(&strict, &action).await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cached.cache().len(), 2);
    }
}
