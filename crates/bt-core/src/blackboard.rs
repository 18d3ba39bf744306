use std::cell::RefCell;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Insertion-ordered `name -> value` store.
///
/// Order is part of the contract: the declared variable list written with a
/// tree document follows it, so removing or renaming a key keeps the position
/// of every other key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Blackboard {
    values: Map<String, Value>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(key.into(), value)
    }

    /// Inserts `null` under `key` if absent. Returns `true` when inserted.
    pub fn ensure(&mut self, key: &str) -> bool {
        if self.values.contains_key(key) {
            return false;
        }
        self.values.insert(key.to_string(), Value::Null);
        true
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.values.get_mut(key)
    }

    /// Typed read. `None` when the key is absent or holds another shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.values.get(key)?;
        T::deserialize(value).ok()
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        if !self.values.contains_key(key) {
            return None;
        }
        let mut removed = None;
        self.values = std::mem::take(&mut self.values)
            .into_iter()
            .filter_map(|(k, v)| {
                if k == key {
                    removed = Some(v);
                    None
                } else {
                    Some((k, v))
                }
            })
            .collect();
        removed
    }

    /// Renames `from` to `to` in place. Fails when `from` is missing or `to`
    /// is already taken.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        if from == to {
            return self.values.contains_key(from);
        }
        if !self.values.contains_key(from) || self.values.contains_key(to) {
            return false;
        }
        self.values = std::mem::take(&mut self.values)
            .into_iter()
            .map(|(k, v)| if k == from { (to.to_string(), v) } else { (k, v) })
            .collect();
        true
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, Value)> for Blackboard {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

thread_local! {
    static PROCESS_GLOBALS: GlobalBlackboard = GlobalBlackboard::new();
}

/// Shared handle to the blackboard every tree of a world can see.
///
/// Trees receive the handle at construction instead of reaching for a
/// singleton, so tests can hand each case an isolated instance. The handle is
/// deliberately `!Send`: the runtime is single-threaded and the global store
/// has no locking.
#[derive(Debug, Clone, Default)]
pub struct GlobalBlackboard {
    inner: Rc<RefCell<Blackboard>>,
}

impl GlobalBlackboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_blackboard(blackboard: Blackboard) -> Self {
        Self {
            inner: Rc::new(RefCell::new(blackboard)),
        }
    }

    /// The default instance for this thread. Only top-level wiring should
    /// call this.
    pub fn process() -> Self {
        PROCESS_GLOBALS.with(Clone::clone)
    }

    pub fn same_as(&self, other: &GlobalBlackboard) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.borrow().contains(key)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.borrow().get(key).cloned()
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.inner.borrow().get_as(key)
    }

    pub fn set(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.inner.borrow_mut().set(key, value)
    }

    pub fn ensure(&self, key: &str) -> bool {
        self.inner.borrow_mut().ensure(key)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.borrow_mut().remove(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.borrow().keys().map(str::to_string).collect()
    }

    pub fn snapshot(&self) -> Blackboard {
        self.inner.borrow().clone()
    }

    /// Runs `f` with mutable access. `f` must not touch this handle again.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Blackboard) -> R) -> R {
        f(&mut self.inner.borrow_mut())
    }
}
