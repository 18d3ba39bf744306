//! Shared variables: task parameters that are either literals or named
//! lookups into a blackboard.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Blackboard, GlobalBlackboard};

/// Names starting with this marker resolve against the global blackboard.
/// The stored key is the name without the marker.
pub const GLOBAL_PREFIX: &str = "global:";

const SCENE_PREFIX: &str = "0:";
const RESOURCE_PREFIX: &str = "1:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Local,
    Global,
}

/// A task parameter value.
///
/// Serialized externally tagged: `{"static": 3}`, `{"dynamic": "hp"}`,
/// `{"object": "0:Player"}`. Binding state is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharedVariable {
    Static(Value),
    Dynamic(DynamicVar),
    Object(ObjectVar),
}

impl Default for SharedVariable {
    fn default() -> Self {
        SharedVariable::Static(Value::Null)
    }
}

impl SharedVariable {
    pub fn constant(value: impl Into<Value>) -> Self {
        SharedVariable::Static(value.into())
    }

    pub fn dynamic(name: impl Into<String>) -> Self {
        SharedVariable::Dynamic(DynamicVar::new(name))
    }

    pub fn object(reference: impl Into<String>) -> Self {
        SharedVariable::Object(ObjectVar::new(reference))
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, SharedVariable::Dynamic(_))
    }

    /// Current value. Dynamic variables are looked up on every call; an
    /// unbound variable or a missing key reads as `None`.
    pub fn read(&self, local: &Blackboard, globals: &GlobalBlackboard) -> Option<Value> {
        match self {
            SharedVariable::Static(value) => Some(value.clone()),
            SharedVariable::Dynamic(var) => match var.binding? {
                Scope::Local => local.get(var.key()).cloned(),
                Scope::Global => globals.get(var.key()),
            },
            SharedVariable::Object(var) => var.resolved.clone(),
        }
    }

    /// Writes through a bound dynamic variable. Literals and object
    /// references are read-only.
    pub fn write(&self, local: &mut Blackboard, globals: &GlobalBlackboard, value: Value) -> bool {
        let SharedVariable::Dynamic(var) = self else {
            return false;
        };
        match var.binding {
            Some(Scope::Local) => {
                local.set(var.key(), value);
                true
            }
            Some(Scope::Global) => {
                globals.set(var.key(), value);
                true
            }
            None => false,
        }
    }
}

/// Blackboard lookup by name. `binding` is set by the live binding pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DynamicVar {
    name: String,
    #[serde(skip)]
    binding: Option<Scope>,
}

impl DynamicVar {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            binding: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store the name selects, or `None` for an empty name.
    pub fn scope(&self) -> Option<Scope> {
        match self.name.strip_prefix(GLOBAL_PREFIX) {
            Some("") => None,
            Some(_) => Some(Scope::Global),
            None if self.name.is_empty() => None,
            None => Some(Scope::Local),
        }
    }

    /// Key inside the selected store.
    pub fn key(&self) -> &str {
        self.name.strip_prefix(GLOBAL_PREFIX).unwrap_or(&self.name)
    }

    pub fn binding(&self) -> Option<Scope> {
        self.binding
    }

    pub fn bind(&mut self, scope: Scope) {
        self.binding = Some(scope);
    }

    pub fn unbind(&mut self) {
        self.binding = None;
    }

    /// Forgets the name and any binding.
    pub fn clear(&mut self) {
        self.name.clear();
        self.binding = None;
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.binding = None;
    }
}

/// Reference to a scene or resource object, coded as `"0:<name>"` (scene
/// lookup) or `"1:<path>"` (resource load).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectVar {
    reference: String,
    #[serde(skip)]
    resolved: Option<Value>,
}

impl ObjectVar {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            resolved: None,
        }
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn resolved(&self) -> Option<&Value> {
        self.resolved.as_ref()
    }

    pub fn resolve(&mut self, value: Value) {
        self.resolved = Some(value);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectRef<'a> {
    Scene(&'a str),
    Resource(&'a str),
}

/// Decodes the two-character prefix of an object reference. Matching is
/// exact: anything else, including an empty string, is `None`.
pub fn object_reference(reference: &str) -> Option<ObjectRef<'_>> {
    if let Some(name) = reference.strip_prefix(SCENE_PREFIX) {
        Some(ObjectRef::Scene(name))
    } else {
        reference
            .strip_prefix(RESOURCE_PREFIX)
            .map(ObjectRef::Resource)
    }
}
