use std::collections::BTreeMap;

use crate::nodes::{
    Compare, Entry, Inverter, Log, MatchAny, PrioritySelector, ReactiveSelector,
    ReactiveSequence, ReturnStatus, Selector, Sequence, SetVariable, SubTree, Succeeder, Wait,
};
use crate::task::{NodeType, TaskNode};

pub type TaskFactory = fn() -> Box<dyn TaskNode>;

fn construct<T: NodeType>() -> Box<dyn TaskNode> {
    Box::new(T::default())
}

/// Maps stable class names to constructors. Documents name node kinds only
/// through this table.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    factories: BTreeMap<&'static str, TaskFactory>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every node kind this crate ships.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register::<Entry>()
            .register::<Sequence>()
            .register::<Selector>()
            .register::<ReactiveSequence>()
            .register::<ReactiveSelector>()
            .register::<PrioritySelector>()
            .register::<Inverter>()
            .register::<Succeeder>()
            .register::<ReturnStatus>()
            .register::<Wait>()
            .register::<SetVariable>()
            .register::<Compare>()
            .register::<MatchAny>()
            .register::<Log>()
            .register::<SubTree>();
        registry
    }

    pub fn register<T: NodeType>(&mut self) -> &mut Self {
        self.register_factory(T::CLASS_NAME, construct::<T>);
        self
    }

    /// Registers `factory` under `class_name`, returning the one it replaced.
    pub fn register_factory(
        &mut self,
        class_name: &'static str,
        factory: TaskFactory,
    ) -> Option<TaskFactory> {
        self.factories.insert(class_name, factory)
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.factories.contains_key(class_name)
    }

    pub fn create(&self, class_name: &str) -> Option<Box<dyn TaskNode>> {
        self.factories.get(class_name).map(|factory| factory())
    }

    pub fn class_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_construct_by_name() {
        let registry = NodeRegistry::with_builtins();
        for name in registry.class_names() {
            let node = registry.create(name).expect("registered");
            assert_eq!(node.class_name(), name);
        }
        assert!(registry.create("Missing.Node").is_none());
    }

    #[test]
    fn later_registration_replaces_earlier() {
        fn fixed() -> Box<dyn TaskNode> {
            Box::new(ReturnStatus::new(bt_core::TaskStatus::Failure))
        }

        let mut registry = NodeRegistry::new();
        registry.register::<Sequence>();
        let replaced = registry.register_factory(Sequence::CLASS_NAME, fixed);
        assert!(replaced.is_some());
        assert_eq!(
            registry.create(Sequence::CLASS_NAME).map(|node| node.class_name()),
            Some(ReturnStatus::CLASS_NAME)
        );
    }
}
