//! Seeded evolutionary search over weight/threshold configurations.
//!
//! Gives no formal guarantee; intended for business and operational
//! constraints only. Runs are deterministic for a given seed, constraint
//! id, and set of input signals.

use async_trait::async_trait;
use covenant_primitives::{Action, Constraint, VerificationMethod};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value, json};

use crate::registry::OptimizerSettings;
use crate::traits::{Assessment, Verifier, VerifierError, VerifierResult, unit_interval};

const TOURNAMENT_SIZE: usize = 3;
const MUTATION_RATE: f64 = 0.1;
const MUTATION_STEP: f64 = 0.1;

#[derive(Clone, Debug)]
struct Candidate {
    weights: Vec<f64>,
    thresholds: Vec<f64>,
}

impl Candidate {
    fn random(rng: &mut StdRng, len: usize) -> Self {
        Self {
            weights: (0..len).map(|_| rng.gen_range(0.0..=1.0)).collect(),
            thresholds: (0..len).map(|_| rng.gen_range(0.0..=1.0)).collect(),
        }
    }

    /// Mean weighted signal over the signals that clear their threshold.
    fn fitness(&self, signals: &[f64]) -> f64 {
        let total: f64 = signals
            .iter()
            .zip(self.weights.iter().zip(&self.thresholds))
            .map(|(s, (w, t))| if s >= t { w * s } else { 0.0 })
            .sum();
        #[allow(clippy::cast_precision_loss)]
        let len = signals.len() as f64;
        total / len
    }

    fn crossover(&self, other: &Self, rng: &mut StdRng) -> Self {
        let blend = |a: &[f64], b: &[f64], rng: &mut StdRng| -> Vec<f64> {
            a.iter()
                .zip(b)
                .map(|(x, y)| {
                    let alpha: f64 = rng.gen_range(0.0..=1.0);
                    alpha * x + (1.0 - alpha) * y
                })
                .collect()
        };
        Self {
            weights: blend(&self.weights, &other.weights, rng),
            thresholds: blend(&self.thresholds, &other.thresholds, rng),
        }
    }

    fn mutate(&mut self, rng: &mut StdRng) {
        for gene in self.weights.iter_mut().chain(self.thresholds.iter_mut()) {
            if rng.gen_bool(MUTATION_RATE) {
                *gene = unit_interval(*gene + rng.gen_range(-MUTATION_STEP..=MUTATION_STEP));
            }
        }
    }
}

/// FNV-1a, used to mix the constraint id into the seed.
fn fnv1a(text: &str) -> u64 {
    text.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

/// Verifier running a bounded genetic search per assessment.
#[derive(Clone, Debug)]
pub struct HeuristicOptimizerVerifier {
    settings: OptimizerSettings,
}

impl HeuristicOptimizerVerifier {
    /// Creates a verifier from validated settings.
    ///
    /// # Errors
    ///
    /// Returns [`VerifierError::InvalidSettings`] when the iteration count or
    /// population size is zero.
    pub fn new(settings: OptimizerSettings) -> VerifierResult<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    fn signals(constraint: &Constraint, action: &Action) -> VerifierResult<Vec<(String, f64)>> {
        if let Some(names) = constraint.metadata().get("signals").and_then(Value::as_array) {
            return names
                .iter()
                .filter_map(Value::as_str)
                .map(|name| {
                    action
                        .parameter(name)
                        .and_then(Value::as_f64)
                        .map(|v| (name.to_owned(), unit_interval(v)))
                        .ok_or_else(|| {
                            VerifierError::missing_input(format!(
                                "signal `{name}` is not a numeric parameter"
                            ))
                        })
                })
                .collect();
        }
        Ok(action
            .parameters()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .as_f64()
                    .filter(|v| (0.0..=1.0).contains(v))
                    .map(|v| (name.clone(), v))
            })
            .collect())
    }

    fn search(&self, seed: u64, signals: &[f64]) -> (Candidate, f64) {
        let mut rng = StdRng::seed_from_u64(seed);
        let size = self.settings.population;
        let mut population: Vec<Candidate> = (0..size)
            .map(|_| Candidate::random(&mut rng, signals.len()))
            .collect();

        let mut best = population[0].clone();
        let mut best_fitness = f64::NEG_INFINITY;

        for _ in 0..self.settings.iterations {
            let fitness: Vec<f64> = population.iter().map(|c| c.fitness(signals)).collect();
            for (candidate, score) in population.iter().zip(&fitness) {
                if *score > best_fitness {
                    best_fitness = *score;
                    best = candidate.clone();
                }
            }

            let mut next = Vec::with_capacity(size);
            next.push(best.clone());
            while next.len() < size {
                let a = tournament(&population, &fitness, &mut rng);
                let b = tournament(&population, &fitness, &mut rng);
                let mut child = a.crossover(b, &mut rng);
                child.mutate(&mut rng);
                next.push(child);
            }
            population = next;
        }

        (best, unit_interval(best_fitness))
    }
}

fn tournament<'a>(population: &'a [Candidate], fitness: &[f64], rng: &mut StdRng) -> &'a Candidate {
    let mut winner = rng.gen_range(0..population.len());
    for _ in 1..TOURNAMENT_SIZE {
        let challenger = rng.gen_range(0..population.len());
        if fitness[challenger] > fitness[winner] {
            winner = challenger;
        }
    }
    &population[winner]
}

#[async_trait]
impl Verifier for HeuristicOptimizerVerifier {
    fn method(&self) -> VerificationMethod {
        VerificationMethod::HeuristicOptimizer
    }

    async fn assess(&self, constraint: &Constraint, action: &Action) -> VerifierResult<Assessment> {
        let named = Self::signals(constraint, action)?;
        if named.is_empty() {
            let mut explanation = Map::new();
            explanation.insert("signals".into(), json!([]));
            explanation.insert("reason".into(), json!("no signals to optimise"));
            return Ok(Assessment::scored(1.0, explanation));
        }

        let seed = self.settings.seed ^ fnv1a(constraint.id().as_str());
        let values: Vec<f64> = named.iter().map(|(_, v)| *v).collect();
        let (best, score) = self.search(seed, &values);

        let configuration: Map<String, Value> = named
            .iter()
            .zip(best.weights.iter().zip(&best.thresholds))
            .map(|((name, _), (w, t))| (name.clone(), json!({ "weight": w, "threshold": t })))
            .collect();

        let mut explanation = Map::new();
        explanation.insert("configuration".into(), Value::Object(configuration));
        explanation.insert("generations".into(), json!(self.settings.iterations));
        explanation.insert("population".into(), json!(self.settings.population));
        explanation.insert("seed".into(), json!(seed));
        Ok(Assessment::scored(score, explanation))
    }
}

#[cfg(test)]
mod tests {
    use covenant_primitives::{ConstraintDomain, ConstraintId};
    use proptest::prelude::*;

    use super::*;

    fn constraint() -> Constraint {
        Constraint::builder(ConstraintId::new("cost_efficiency").unwrap(), ConstraintDomain::Business)
            .description("cost efficient")
            .unwrap()
            .method(VerificationMethod::HeuristicOptimizer)
            .hard(false)
            .build()
            .unwrap()
    }

    fn verifier(seed: u64) -> HeuristicOptimizerVerifier {
        HeuristicOptimizerVerifier::new(OptimizerSettings {
            seed,
            ..OptimizerSettings::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn no_signals_is_neutral() {
        let action = Action::builder("buy").parameter("label", "x").build().unwrap();
        let Assessment::Scored { score, .. } =
            verifier(7).assess(&constraint(), &action).await.unwrap()
        else {
            panic!("expected scored form")
        };
        assert!((score - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn missing_named_signal_errors() {
        let c = Constraint::builder(ConstraintId::new("c").unwrap(), ConstraintDomain::Business)
            .description("d")
            .unwrap()
            .metadata("signals", json!(["margin"]))
            .build()
            .unwrap();
        let action = Action::builder("buy").build().unwrap();
        assert!(verifier(1).assess(&c, &action).await.is_err());
    }

    proptest! {
        #[test]
        fn seeded_search_is_deterministic_and_bounded(
            seed in any::<u64>(),
            a in 0.0f64..=1.0,
            b in 0.0f64..=1.0,
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let action = Action::builder("buy")
                .parameter("a", a)
                .parameter("b", b)
                .build()
                .unwrap();
            let first = runtime.block_on(verifier(seed).assess(&constraint(), &action)).unwrap();
            let second = runtime.block_on(verifier(seed).assess(&constraint(), &action)).unwrap();
            prop_assert_eq!(&first, &second);
            let Assessment::Scored { score, .. } = first else {
                return Err(TestCaseError::fail("expected scored form"));
            };
            prop_assert!((0.0..=1.0).contains(&score));
        }
    }
}
