//! [`ActionResult`], the uniform outcome shape every action returns.

use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct ActionResult {
    pub success: bool,
    pub action_type: String,
    pub description: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub entity_name: Option<String>,
    pub created: bool,
    pub modified: bool,
    pub skipped: bool,
    /// The minimal JSON needed to reverse this action's mutation.
    pub previous_state: Option<Value>,
    pub error: Option<String>,
    pub details: Value,
}

impl ActionResult {
    pub fn ok(action_type: &str, description: impl Into<String>) -> Self {
        Self {
            success: true,
            action_type: action_type.to_string(),
            description: description.into(),
            details: Value::Null,
            ..Default::default()
        }
    }

    pub fn skip(action_type: &str, description: impl Into<String>) -> Self {
        Self {
            success: true,
            skipped: true,
            action_type: action_type.to_string(),
            description: description.into(),
            details: Value::Null,
            ..Default::default()
        }
    }

    pub fn failed(action_type: &str, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            action_type: action_type.to_string(),
            description: error.clone(),
            error: Some(error),
            details: Value::Null,
            ..Default::default()
        }
    }

    pub fn with_entity(mut self, entity_type: &str, id: i64, name: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.to_string());
        self.entity_id = Some(id);
        self.entity_name = Some(name.into());
        self
    }

    pub fn created(mut self) -> Self {
        self.created = true;
        self
    }

    pub fn modified(mut self) -> Self {
        self.modified = true;
        self
    }

    pub fn with_previous_state(mut self, state: Value) -> Self {
        self.previous_state = Some(state);
        self
    }
}
