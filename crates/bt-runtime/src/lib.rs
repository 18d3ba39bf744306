//! Behavior tree runtime built on `bt-core`.
//!
//! A [`BehaviorTree`] is an arena of tasks addressed by [`TaskId`]. Each task
//! pairs tree-owned bookkeeping (status, start/end pairing, links) with a
//! [`TaskNode`] that only decides what to return. One [`BehaviorTree::tick`]
//! is one complete, synchronous traversal; `Running` is the only way work
//! spans ticks.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod binding;
pub mod nodes;
pub mod registry;
pub mod task;
pub mod tree;

pub use binding::{BindMode, BindReport, NullResolver, ObjectResolver};
pub use registry::{NodeRegistry, TaskFactory};
pub use task::{
    params_from_value, params_to_value, EditorPosition, ExternalReference, NodeData, NodeType,
    TaskContext, TaskId, TaskNode,
};
pub use tree::{BehaviorTree, TreeParams, MAX_TREE_DEPTH};
