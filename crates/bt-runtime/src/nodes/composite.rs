use bt_core::TaskStatus;

use crate::task::{NodeType, TaskContext, TaskNode};

/// Runs children in order until one fails. A running child is resumed on the
/// next update without re-checking earlier children. Ignored children are
/// skipped.
#[derive(Debug, Default)]
pub struct Sequence {
    index: usize,
}

impl NodeType for Sequence {
    const CLASS_NAME: &'static str = "Composite.Sequence";
}

impl TaskNode for Sequence {
    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn max_children(&self) -> Option<usize> {
        None
    }

    fn on_start(&mut self, _ctx: &mut TaskContext<'_>) {
        self.index = 0;
    }

    fn run(&mut self, ctx: &mut TaskContext<'_>) -> TaskStatus {
        while self.index < ctx.child_count() {
            match ctx.update_child(self.index) {
                TaskStatus::Running => return TaskStatus::Running,
                TaskStatus::Success | TaskStatus::Ignored | TaskStatus::None => self.index += 1,
                failed => return failed,
            }
        }
        TaskStatus::Success
    }

    fn on_end(&mut self, _ctx: &mut TaskContext<'_>) {
        self.index = 0;
    }
}

/// Runs children in order until one succeeds, resuming a running child.
#[derive(Debug, Default)]
pub struct Selector {
    index: usize,
}

impl NodeType for Selector {
    const CLASS_NAME: &'static str = "Composite.Selector";
}

impl TaskNode for Selector {
    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn max_children(&self) -> Option<usize> {
        None
    }

    fn on_start(&mut self, _ctx: &mut TaskContext<'_>) {
        self.index = 0;
    }

    fn run(&mut self, ctx: &mut TaskContext<'_>) -> TaskStatus {
        while self.index < ctx.child_count() {
            match ctx.update_child(self.index) {
                TaskStatus::Running => return TaskStatus::Running,
                TaskStatus::Success => return TaskStatus::Success,
                TaskStatus::Error => return TaskStatus::Error,
                _ => self.index += 1,
            }
        }
        TaskStatus::Failure
    }

    fn on_end(&mut self, _ctx: &mut TaskContext<'_>) {
        self.index = 0;
    }
}

/// Sequence that re-checks every child from the start on each update. When
/// a different child ends up running, the previously running one is
/// cancelled.
#[derive(Debug, Default)]
pub struct ReactiveSequence {
    running: Option<usize>,
}

impl NodeType for ReactiveSequence {
    const CLASS_NAME: &'static str = "Composite.ReactiveSequence";
}

impl TaskNode for ReactiveSequence {
    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn max_children(&self) -> Option<usize> {
        None
    }

    fn run(&mut self, ctx: &mut TaskContext<'_>) -> TaskStatus {
        for i in 0..ctx.child_count() {
            match ctx.update_child(i) {
                TaskStatus::Success | TaskStatus::Ignored | TaskStatus::None => continue,
                TaskStatus::Running => {
                    preempt(ctx, &mut self.running, Some(i));
                    return TaskStatus::Running;
                }
                failed => {
                    preempt(ctx, &mut self.running, None);
                    return failed;
                }
            }
        }
        preempt(ctx, &mut self.running, None);
        TaskStatus::Success
    }

    fn on_end(&mut self, _ctx: &mut TaskContext<'_>) {
        self.running = None;
    }
}

/// Selector that re-checks every child from the start on each update,
/// cancelling a lower-priority child that was running.
#[derive(Debug, Default)]
pub struct ReactiveSelector {
    running: Option<usize>,
}

impl NodeType for ReactiveSelector {
    const CLASS_NAME: &'static str = "Composite.ReactiveSelector";
}

impl TaskNode for ReactiveSelector {
    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn max_children(&self) -> Option<usize> {
        None
    }

    fn run(&mut self, ctx: &mut TaskContext<'_>) -> TaskStatus {
        for i in 0..ctx.child_count() {
            match ctx.update_child(i) {
                TaskStatus::Running => {
                    preempt(ctx, &mut self.running, Some(i));
                    return TaskStatus::Running;
                }
                status @ (TaskStatus::Success | TaskStatus::Error) => {
                    preempt(ctx, &mut self.running, None);
                    return status;
                }
                _ => continue,
            }
        }
        preempt(ctx, &mut self.running, None);
        TaskStatus::Failure
    }

    fn on_end(&mut self, _ctx: &mut TaskContext<'_>) {
        self.running = None;
    }
}

/// Records `next` as the running child, cancelling the previous one if it
/// changed.
fn preempt(ctx: &mut TaskContext<'_>, running: &mut Option<usize>, next: Option<usize>) {
    if let Some(prev) = *running {
        if Some(prev) != next {
            ctx.force_end_child(prev);
        }
    }
    *running = next;
}

/// Selector over children ordered by descending priority, fixed when the
/// run starts. Equal priorities keep sibling order.
#[derive(Debug, Default)]
pub struct PrioritySelector {
    order: Vec<usize>,
    cursor: usize,
}

impl NodeType for PrioritySelector {
    const CLASS_NAME: &'static str = "Composite.PrioritySelector";
}

impl TaskNode for PrioritySelector {
    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn max_children(&self) -> Option<usize> {
        None
    }

    fn on_start(&mut self, ctx: &mut TaskContext<'_>) {
        let mut order: Vec<(usize, f32)> = (0..ctx.child_count())
            .map(|i| (i, ctx.child_priority(i)))
            .collect();
        order.sort_by(|a, b| b.1.total_cmp(&a.1));
        self.order = order.into_iter().map(|(i, _)| i).collect();
        self.cursor = 0;
    }

    fn run(&mut self, ctx: &mut TaskContext<'_>) -> TaskStatus {
        while let Some(&child) = self.order.get(self.cursor) {
            match ctx.update_child(child) {
                TaskStatus::Running => return TaskStatus::Running,
                TaskStatus::Success => return TaskStatus::Success,
                TaskStatus::Error => return TaskStatus::Error,
                _ => self.cursor += 1,
            }
        }
        TaskStatus::Failure
    }

    fn on_end(&mut self, _ctx: &mut TaskContext<'_>) {
        self.order.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use bt_core::GlobalBlackboard;

    use super::*;
    use crate::nodes::ReturnStatus;
    use crate::task::NodeData;
    use crate::tree::BehaviorTree;

    fn tree_with(root: Box<dyn TaskNode>, leaves: &[TaskStatus]) -> BehaviorTree {
        let mut tree = BehaviorTree::new(GlobalBlackboard::new());
        let root = tree.attach_new(tree.entry(), root, NodeData::default()).unwrap();
        for (i, &status) in leaves.iter().enumerate() {
            tree.attach_new(
                root,
                Box::new(ReturnStatus::new(status)),
                NodeData::at(i as f32, 0.0),
            );
        }
        tree
    }

    #[test]
    fn sequence_all_success() {
        let mut tree = tree_with(
            Box::new(Sequence::default()),
            &[TaskStatus::Success, TaskStatus::Success],
        );
        assert_eq!(tree.tick(), TaskStatus::Success);
    }

    #[test]
    fn sequence_stops_on_first_failure() {
        let mut tree = tree_with(
            Box::new(Sequence::default()),
            &[TaskStatus::Success, TaskStatus::Failure, TaskStatus::Success],
        );
        assert_eq!(tree.tick(), TaskStatus::Failure);
        let third = tree.children(tree.children(tree.entry())[0])[2];
        assert_eq!(tree.status(third), TaskStatus::None);
    }

    #[test]
    fn sequence_propagates_error() {
        let mut tree = tree_with(
            Box::new(Sequence::default()),
            &[TaskStatus::Error, TaskStatus::Success],
        );
        assert_eq!(tree.tick(), TaskStatus::Error);
    }

    #[test]
    fn selector_succeeds_on_first_success() {
        let mut tree = tree_with(
            Box::new(Selector::default()),
            &[TaskStatus::Failure, TaskStatus::Success, TaskStatus::Failure],
        );
        assert_eq!(tree.tick(), TaskStatus::Success);
    }

    #[test]
    fn selector_fails_when_all_fail() {
        let mut tree = tree_with(
            Box::new(Selector::default()),
            &[TaskStatus::Failure, TaskStatus::Failure],
        );
        assert_eq!(tree.tick(), TaskStatus::Failure);
    }

    #[test]
    fn empty_composites() {
        let mut tree = tree_with(Box::new(Sequence::default()), &[]);
        assert_eq!(tree.tick(), TaskStatus::Success);
        let mut tree = tree_with(Box::new(Selector::default()), &[]);
        assert_eq!(tree.tick(), TaskStatus::Failure);
    }

    #[test]
    fn priority_selector_tries_highest_priority_first() {
        let mut tree = BehaviorTree::new(GlobalBlackboard::new());
        let root = tree
            .attach_new(tree.entry(), Box::new(PrioritySelector::default()), NodeData::default())
            .unwrap();
        let low = tree
            .attach_new(
                root,
                Box::new(ReturnStatus::new(TaskStatus::Success).with_priority(1.0)),
                NodeData::at(0.0, 0.0),
            )
            .unwrap();
        let high = tree
            .attach_new(
                root,
                Box::new(ReturnStatus::new(TaskStatus::Success).with_priority(5.0)),
                NodeData::at(1.0, 0.0),
            )
            .unwrap();

        assert_eq!(tree.tick(), TaskStatus::Success);
        assert_eq!(tree.status(high), TaskStatus::Success);
        assert_eq!(tree.status(low), TaskStatus::None);
    }
}
