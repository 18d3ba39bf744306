//! Engine-agnostic behavior tree primitives: task statuses, blackboards and
//! shared variables.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod blackboard;
pub mod status;
pub mod variable;

pub use blackboard::{Blackboard, GlobalBlackboard};
pub use status::TaskStatus;
pub use variable::{
    object_reference, DynamicVar, ObjectRef, ObjectVar, Scope, SharedVariable, GLOBAL_PREFIX,
};
