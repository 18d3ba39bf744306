//! Binding pass: attaches dynamic shared variables to the blackboard their
//! name selects, or clears names that no longer exist.

use bt_core::{object_reference, Blackboard, GlobalBlackboard, ObjectRef, Scope, SharedVariable};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    /// Running instance: bind and create missing keys.
    Live,
    /// Instance opened for editing: never bind, clear stale names.
    EditTime,
}

/// Host lookup for object references (`"0:"` scene names, `"1:"` resource
/// paths).
pub trait ObjectResolver {
    fn find_in_scene(&self, name: &str) -> Option<Value>;
    fn load_resource(&self, path: &str) -> Option<Value>;
}

/// Resolves nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullResolver;

impl ObjectResolver for NullResolver {
    fn find_in_scene(&self, _name: &str) -> Option<Value> {
        None
    }

    fn load_resource(&self, _path: &str) -> Option<Value> {
        None
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BindReport {
    /// Set when a stale name was cleared; the document needs saving.
    pub dirty: bool,
    pub cleared: Vec<String>,
    pub warnings: Vec<String>,
}

impl BindReport {
    pub fn merge(&mut self, other: BindReport) {
        self.dirty |= other.dirty;
        self.cleared.extend(other.cleared);
        self.warnings.extend(other.warnings);
    }
}

pub fn bind_variable(
    var: &mut SharedVariable,
    mode: BindMode,
    local: &mut Blackboard,
    globals: &GlobalBlackboard,
    resolver: &dyn ObjectResolver,
    report: &mut BindReport,
) {
    match var {
        SharedVariable::Static(_) => {}
        SharedVariable::Dynamic(dynamic) => {
            let scope = dynamic.scope();
            match mode {
                BindMode::Live => match scope {
                    Some(Scope::Local) => {
                        local.ensure(dynamic.key());
                        dynamic.bind(Scope::Local);
                    }
                    Some(Scope::Global) => {
                        globals.ensure(dynamic.key());
                        dynamic.bind(Scope::Global);
                    }
                    None => dynamic.unbind(),
                },
                BindMode::EditTime => {
                    if dynamic.name().is_empty() {
                        return;
                    }
                    let known = match scope {
                        Some(Scope::Local) => local.contains(dynamic.key()),
                        Some(Scope::Global) => globals.contains(dynamic.key()),
                        None => false,
                    };
                    if !known {
                        tracing::warn!(name = dynamic.name(), "clearing stale shared variable");
                        report.cleared.push(dynamic.name().to_string());
                        report.dirty = true;
                        dynamic.clear();
                    }
                }
            }
        }
        SharedVariable::Object(object) => {
            if mode != BindMode::Live || object.reference().is_empty() {
                return;
            }
            let resolved = match object_reference(object.reference()) {
                Some(ObjectRef::Scene(name)) => resolver.find_in_scene(name),
                Some(ObjectRef::Resource(path)) => resolver.load_resource(path),
                None => {
                    tracing::error!(
                        reference = object.reference(),
                        "object reference has no recognised prefix"
                    );
                    report.warnings.push(format!(
                        "object reference `{}` has no recognised prefix",
                        object.reference()
                    ));
                    return;
                }
            };
            match resolved {
                Some(value) => object.resolve(value),
                None => {
                    tracing::warn!(reference = object.reference(), "object reference not found");
                    report
                        .warnings
                        .push(format!("object `{}` not found", object.reference()));
                }
            }
        }
    }
}
