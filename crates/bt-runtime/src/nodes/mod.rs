//! Built-in node kinds.
//!
//! Composites keep per-run cursor state in the node and clear it in
//! `on_end`, so a cancelled or finished run always restarts from the first
//! child.

mod composite;
mod decorator;
mod leaf;
mod reference;

pub use composite::{PrioritySelector, ReactiveSelector, ReactiveSequence, Selector, Sequence};
pub use decorator::{Inverter, Succeeder};
pub use leaf::{
    Compare, CompareOp, CompareParams, Log, LogParams, MatchAny, MatchAnyParams, ReturnStatus,
    ReturnStatusParams, SetVariable, SetVariableParams, Wait, WaitParams,
};
pub use reference::SubTree;

use bt_core::TaskStatus;

use crate::task::{NodeType, TaskContext, TaskNode};

/// Root of every tree: one child, whose status it reports verbatim.
#[derive(Debug, Default)]
pub struct Entry;

impl NodeType for Entry {
    const CLASS_NAME: &'static str = "Entry";
}

impl TaskNode for Entry {
    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn max_children(&self) -> Option<usize> {
        Some(1)
    }

    fn run(&mut self, ctx: &mut TaskContext<'_>) -> TaskStatus {
        if ctx.child_count() == 0 {
            // A tree without logic is inert, not broken.
            return TaskStatus::Ignored;
        }
        ctx.update_child(0)
    }
}
