//! Copy-on-write storage of layers and their constraints.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use std::sync::{Arc, RwLock};

use covenant_primitives::{Constraint, ConstraintId, Layer};
use covenant_verifiers::expr::Expr;
use tracing::{debug, info};

use crate::error::{ConfigurationError, ConfigurationResult, EngineResult, EvaluationError};

/// Accepted priority range for layers and constraints.
pub const PRIORITY_RANGE: RangeInclusive<i32> = 0..=10_000;

/// Layers ordered by priority, highest first.
///
/// Readers take a cheap [`snapshot`](Self::snapshot) and keep evaluating
/// against it while writers publish a modified copy. Every mutation is
/// validated in full before anything is changed.
#[derive(Debug, Default)]
pub struct ConstraintRegistry {
    layers: RwLock<Arc<Vec<Layer>>>,
}

impl ConstraintRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current immutable layer list.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::ConfigurationPoisoned`] when a writer
    /// panicked while holding the lock.
    pub fn snapshot(&self) -> EngineResult<Arc<Vec<Layer>>> {
        self.layers
            .read()
            .map(|guard| Arc::clone(&guard))
            .map_err(|_| EvaluationError::ConfigurationPoisoned)
    }

    /// Adds a layer together with the constraints it carries.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::DuplicateLayer`] for a name already in
    /// use, or any error [`add_constraint`](Self::add_constraint) would
    /// raise for one of the carried constraints.
    pub fn add_layer(&self, layer: Layer) -> ConfigurationResult<()> {
        self.mutate(|layers| {
            if layers.iter().any(|l| l.name() == layer.name()) {
                return Err(ConfigurationError::DuplicateLayer {
                    name: layer.name().to_owned(),
                });
            }
            check_priority(&format!("layer `{}`", layer.name()), layer.priority())?;

            let mut known = registered_ids(layers);
            let carried: BTreeSet<&ConstraintId> =
                layer.constraints().iter().map(Constraint::id).collect();
            for constraint in layer.constraints() {
                if !known.insert(constraint.id()) {
                    return Err(ConfigurationError::DuplicateConstraint {
                        id: constraint.id().clone(),
                    });
                }
            }
            for constraint in layer.constraints() {
                validate_constraint(constraint, |id| known.contains(id) || carried.contains(id))?;
            }

            info!(
                layer = layer.name(),
                hard = layer.is_hard(),
                priority = layer.priority(),
                constraints = layer.constraints().len(),
                "layer registered"
            );
            layers.push(layer);
            // Stable, so equal priorities keep registration order.
            layers.sort_by(|a, b| b.priority().cmp(&a.priority()));
            Ok(())
        })
    }

    /// Adds a constraint to the named layer, creating a soft priority-1
    /// layer when none exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::DuplicateConstraint`],
    /// [`ConfigurationError::InvalidPriority`],
    /// [`ConfigurationError::InvalidExpression`], or
    /// [`ConfigurationError::UnknownDependency`]; nothing is changed on
    /// error.
    pub fn add_constraint(&self, constraint: Constraint, layer_name: &str) -> ConfigurationResult<()> {
        self.mutate(|layers| {
            let known = registered_ids(layers);
            if known.contains(constraint.id()) {
                return Err(ConfigurationError::DuplicateConstraint {
                    id: constraint.id().clone(),
                });
            }
            validate_constraint(&constraint, |id| known.contains(id))?;

            debug!(constraint = %constraint.id(), layer = layer_name, "constraint registered");
            if let Some(layer) = layers.iter_mut().find(|l| l.name() == layer_name) {
                layer.add_constraint(constraint);
            } else {
                let layer = Layer::soft(layer_name)?.with_constraint(constraint);
                layers.push(layer);
                layers.sort_by(|a, b| b.priority().cmp(&a.priority()));
            }
            Ok(())
        })
    }

    /// Removes a constraint and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownConstraint`] when no constraint
    /// has the id and [`ConfigurationError::DependencyInUse`] while another
    /// constraint depends on it.
    pub fn remove_constraint(&self, id: &ConstraintId) -> ConfigurationResult<Constraint> {
        self.mutate(|layers| {
            let dependents: Vec<ConstraintId> = layers
                .iter()
                .flat_map(Layer::constraints)
                .filter(|c| c.dependencies().contains(id))
                .map(|c| c.id().clone())
                .collect();
            if !dependents.is_empty() {
                return Err(ConfigurationError::DependencyInUse {
                    id: id.clone(),
                    dependents,
                });
            }

            let removed = layers
                .iter_mut()
                .find_map(|layer| layer.remove_constraint(id))
                .ok_or_else(|| ConfigurationError::UnknownConstraint { id: id.clone() })?;
            debug!(constraint = %id, "constraint removed");
            Ok(removed)
        })
    }

    /// Enables or disables a layer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownLayer`] when no layer has the
    /// name.
    pub fn set_layer_enabled(&self, name: &str, enabled: bool) -> ConfigurationResult<()> {
        self.mutate(|layers| {
            let layer = layers
                .iter_mut()
                .find(|l| l.name() == name)
                .ok_or_else(|| ConfigurationError::UnknownLayer {
                    name: name.to_owned(),
                })?;
            layer.set_enabled(enabled);
            debug!(layer = name, enabled, "layer toggled");
            Ok(())
        })
    }

    /// Returns a copy of the named layer.
    #[must_use]
    pub fn layer(&self, name: &str) -> Option<Layer> {
        self.snapshot()
            .ok()?
            .iter()
            .find(|l| l.name() == name)
            .cloned()
    }

    /// Returns a copy of the constraint with the given id.
    #[must_use]
    pub fn constraint(&self, id: &ConstraintId) -> Option<Constraint> {
        self.snapshot()
            .ok()?
            .iter()
            .flat_map(Layer::constraints)
            .find(|c| c.id() == id)
            .cloned()
    }

    /// Runs `change` against a private copy of the layer list and publishes
    /// the copy only when `change` succeeds.
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut Vec<Layer>) -> ConfigurationResult<T>,
    ) -> ConfigurationResult<T> {
        let mut guard = self
            .layers
            .write()
            .map_err(|_| ConfigurationError::Poisoned)?;
        let mut draft: Vec<Layer> = guard.as_ref().clone();
        let value = change(&mut draft)?;
        *guard = Arc::new(draft);
        Ok(value)
    }
}

fn registered_ids(layers: &[Layer]) -> BTreeSet<&ConstraintId> {
    layers
        .iter()
        .flat_map(Layer::constraints)
        .map(Constraint::id)
        .collect()
}

fn check_priority(subject: &str, priority: i32) -> ConfigurationResult<()> {
    if PRIORITY_RANGE.contains(&priority) {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidPriority {
            subject: subject.to_owned(),
            priority,
        })
    }
}

fn validate_constraint(
    constraint: &Constraint,
    is_registered: impl Fn(&ConstraintId) -> bool,
) -> ConfigurationResult<()> {
    check_priority(&format!("constraint `{}`", constraint.id()), constraint.priority())?;

    let expressions = constraint
        .formal_spec()
        .into_iter()
        .chain(constraint.exemptions().iter().map(String::as_str));
    for source in expressions {
        Expr::parse(source).map_err(|source| ConfigurationError::InvalidExpression {
            constraint: constraint.id().clone(),
            source,
        })?;
    }

    if let Some(missing) = constraint
        .dependencies()
        .iter()
        .find(|dep| !is_registered(dep))
    {
        return Err(ConfigurationError::UnknownDependency {
            constraint: constraint.id().clone(),
            dependency: missing.clone(),
        });
    }
    Ok(())
}
