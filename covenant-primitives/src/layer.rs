//! Layers group constraints that share a hard/soft classification.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Constraint, ConstraintId, Error, Result};

/// Priority-ordered group of constraints.
///
/// Constraints are kept sorted by priority, highest first; ties keep
/// insertion order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    name: String,
    is_hard: bool,
    priority: i32,
    enabled: bool,
    #[serde(default)]
    constraints: Vec<Constraint>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    metadata: Map<String, Value>,
}

impl Layer {
    /// Creates an empty, enabled layer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLayer`] when the name is blank.
    pub fn new(name: impl Into<String>, is_hard: bool, priority: i32) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidLayer {
                reason: "layer name cannot be empty".into(),
            });
        }
        Ok(Self {
            name,
            is_hard,
            priority,
            enabled: true,
            constraints: Vec::new(),
            metadata: Map::new(),
        })
    }

    /// Creates the soft, priority-1 layer used when a constraint names a layer
    /// that does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLayer`] when the name is blank.
    pub fn soft(name: impl Into<String>) -> Result<Self> {
        Self::new(name, false, 1)
    }

    /// Sets the enabled flag.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Adds a constraint and returns the updated layer.
    #[must_use]
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.add_constraint(constraint);
        self
    }

    /// Inserts a constraint, keeping the list sorted by priority.
    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
        // `sort_by` is stable, so equal priorities keep insertion order.
        self.constraints
            .sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    /// Removes a constraint by identifier, returning it when present.
    pub fn remove_constraint(&mut self, id: &ConstraintId) -> Option<Constraint> {
        let index = self.constraints.iter().position(|c| c.id() == id)?;
        Some(self.constraints.remove(index))
    }

    /// Enables or disables the layer in place.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Returns the layer name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` when a failure of this layer blocks the evaluation.
    #[must_use]
    pub const fn is_hard(&self) -> bool {
        self.is_hard
    }

    /// Returns the ordering priority (higher first).
    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// Returns `true` when the layer participates in evaluations.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the constraints, highest priority first.
    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Returns free-form metadata.
    #[must_use]
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }
}
