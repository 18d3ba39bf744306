use bt_core::TaskStatus;

use crate::task::{NodeType, TaskContext, TaskNode};

/// Swaps the child's success and failure. Without a child it fails.
#[derive(Debug, Default)]
pub struct Inverter;

impl NodeType for Inverter {
    const CLASS_NAME: &'static str = "Decorator.Inverter";
}

impl TaskNode for Inverter {
    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn max_children(&self) -> Option<usize> {
        Some(1)
    }

    fn run(&mut self, ctx: &mut TaskContext<'_>) -> TaskStatus {
        if ctx.child_count() == 0 {
            return TaskStatus::Failure;
        }
        ctx.update_child(0).invert()
    }
}

/// Succeeds once the child finishes, whatever the child reported.
#[derive(Debug, Default)]
pub struct Succeeder;

impl NodeType for Succeeder {
    const CLASS_NAME: &'static str = "Decorator.Succeeder";
}

impl TaskNode for Succeeder {
    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn max_children(&self) -> Option<usize> {
        Some(1)
    }

    fn run(&mut self, ctx: &mut TaskContext<'_>) -> TaskStatus {
        if ctx.child_count() == 0 {
            return TaskStatus::Success;
        }
        match ctx.update_child(0) {
            TaskStatus::Running => TaskStatus::Running,
            _ => TaskStatus::Success,
        }
    }
}

#[cfg(test)]
mod tests {
    use bt_core::GlobalBlackboard;

    use super::*;
    use crate::nodes::ReturnStatus;
    use crate::task::NodeData;
    use crate::tree::BehaviorTree;

    fn decorate(decorator: Box<dyn TaskNode>, child: TaskStatus) -> BehaviorTree {
        let mut tree = BehaviorTree::new(GlobalBlackboard::new());
        let root = tree
            .attach_new(tree.entry(), decorator, NodeData::default())
            .unwrap();
        tree.attach_new(root, Box::new(ReturnStatus::new(child)), NodeData::default());
        tree
    }

    #[test]
    fn inverter_inverts_success_and_failure() {
        assert_eq!(
            decorate(Box::new(Inverter), TaskStatus::Success).tick(),
            TaskStatus::Failure
        );
        assert_eq!(
            decorate(Box::new(Inverter), TaskStatus::Failure).tick(),
            TaskStatus::Success
        );
    }

    #[test]
    fn inverter_passes_running_through() {
        assert_eq!(
            decorate(Box::new(Inverter), TaskStatus::Running).tick(),
            TaskStatus::Running
        );
    }

    #[test]
    fn succeeder_hides_failure() {
        assert_eq!(
            decorate(Box::new(Succeeder), TaskStatus::Failure).tick(),
            TaskStatus::Success
        );
    }

    #[test]
    fn decorators_take_one_child() {
        let mut tree = decorate(Box::new(Inverter), TaskStatus::Success);
        let inverter = tree.children(tree.entry())[0];
        let extra = tree.attach_new(
            inverter,
            Box::new(ReturnStatus::new(TaskStatus::Success)),
            NodeData::default(),
        );
        assert!(extra.is_none());
        assert_eq!(tree.children(inverter).len(), 1);
    }
}
