//! Actions submitted to the engine for policy evaluation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ActionId;

/// Unit of work evaluated against the configured constitution.
///
/// Actions are immutable once built; every accessor borrows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    id: ActionId,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    description: String,
    actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(default)]
    parameters: Map<String, Value>,
    #[serde(default)]
    context: Map<String, Value>,
    created_at: DateTime<Utc>,
}

impl Action {
    /// Starts building an [`Action`] of the supplied type.
    #[must_use]
    pub fn builder(kind: impl Into<String>) -> ActionBuilder {
        ActionBuilder {
            id: None,
            kind: kind.into(),
            description: String::new(),
            actor: None,
            target: None,
            parameters: Map::new(),
            context: Map::new(),
            created_at: None,
        }
    }

    /// Returns the action identifier.
    #[must_use]
    pub fn id(&self) -> &ActionId {
        &self.id
    }

    /// Returns the action type label.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the free-text description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the actor performing the action.
    #[must_use]
    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Returns the optional target of the action.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Returns the action parameters.
    #[must_use]
    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    /// Returns a single parameter by name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    /// Returns the evaluation context.
    #[must_use]
    pub fn context(&self) -> &Map<String, Value> {
        &self.context
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the inputs verifiers may read, excluding identity and timing.
    ///
    /// Two actions with equal evaluation inputs always receive equal
    /// assessments, which is what verifier caches key on.
    #[must_use]
    pub fn evaluation_inputs(&self) -> Value {
        let mut inputs = Map::new();
        inputs.insert("type".into(), Value::from(self.kind.clone()));
        inputs.insert("actor".into(), Value::from(self.actor.clone()));
        inputs.insert(
            "target".into(),
            self.target.clone().map_or(Value::Null, Value::from),
        );
        inputs.insert("parameters".into(), Value::Object(self.parameters.clone()));
        inputs.insert("context".into(), Value::Object(self.context.clone()));
        Value::Object(inputs)
    }
}

/// Builder for [`Action`].
#[derive(Debug)]
pub struct ActionBuilder {
    id: Option<ActionId>,
    kind: String,
    description: String,
    actor: Option<String>,
    target: Option<String>,
    parameters: Map<String, Value>,
    context: Map<String, Value>,
    created_at: Option<DateTime<Utc>>,
}

impl ActionBuilder {
    /// Uses a caller-supplied identifier instead of a random one.
    #[must_use]
    pub fn id(mut self, id: ActionId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the free-text description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the actor performing the action.
    #[must_use]
    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Sets the target of the action.
    #[must_use]
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Adds a single parameter.
    #[must_use]
    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Replaces the parameter map.
    #[must_use]
    pub fn parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn context_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Replaces the context map.
    #[must_use]
    pub fn context(mut self, context: Map<String, Value>) -> Self {
        self.context = context;
        self
    }

    /// Pins the creation timestamp.
    #[must_use]
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Finalises the action.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidAction`] when the action type or actor is
    /// blank.
    pub fn build(self) -> crate::Result<Action> {
        if self.kind.trim().is_empty() {
            return Err(crate::Error::InvalidAction {
                reason: "action type cannot be empty".into(),
            });
        }

        let actor = self.actor.unwrap_or_else(|| "system".to_owned());
        if actor.trim().is_empty() {
            return Err(crate::Error::InvalidAction {
                reason: "actor cannot be empty".into(),
            });
        }

        Ok(Action {
            id: self.id.unwrap_or_else(ActionId::random),
            kind: self.kind,
            description: self.description,
            actor,
            target: self.target,
            parameters: self.parameters,
            context: self.context,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        })
    }
}
