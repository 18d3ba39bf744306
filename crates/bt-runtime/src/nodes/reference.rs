use bt_core::TaskStatus;
use serde_json::Value;

use crate::task::{
    params_from_value, params_to_value, ExternalReference, NodeType, TaskContext, TaskNode,
};

/// Stands for another tree document. Only the path is persisted; the tree
/// itself is attached by the loader in live mode. Unresolved references fail.
///
/// The embedded tree runs on the host's tick count.
#[derive(Debug, Default)]
pub struct SubTree {
    reference: ExternalReference,
}

impl SubTree {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            reference: ExternalReference::new(path),
        }
    }

    pub fn reference(&self) -> &ExternalReference {
        &self.reference
    }
}

impl NodeType for SubTree {
    const CLASS_NAME: &'static str = "Reference.SubTree";
}

impl TaskNode for SubTree {
    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn on_awake(&mut self, _ctx: &mut TaskContext<'_>) {
        if let Some(tree) = self.reference.tree_mut() {
            tree.awake();
        }
    }

    fn run(&mut self, ctx: &mut TaskContext<'_>) -> TaskStatus {
        match self.reference.tree_mut() {
            Some(tree) => tree.run_entry(ctx.tick()),
            None => TaskStatus::Failure,
        }
    }

    fn on_end(&mut self, _ctx: &mut TaskContext<'_>) {
        // Cancelled from above while the embedded tree was mid-run.
        if let Some(tree) = self.reference.tree_mut() {
            tree.abort();
        }
    }

    fn encode_params(&self) -> Option<serde_json::Result<Value>> {
        params_to_value(&self.reference)
    }

    fn decode_params(&mut self, params: Value) -> serde_json::Result<bool> {
        params_from_value(&mut self.reference, params)
    }

    fn external_reference(&mut self) -> Option<&mut ExternalReference> {
        Some(&mut self.reference)
    }
}

#[cfg(test)]
mod tests {
    use bt_core::{GlobalBlackboard, SharedVariable};
    use serde_json::json;

    use bt_tools::TraceRecorder;

    use super::*;
    use crate::nodes::Wait;
    use crate::task::NodeData;
    use crate::tree::BehaviorTree;

    #[test]
    fn unresolved_reference_fails() {
        let mut tree = BehaviorTree::new(GlobalBlackboard::new());
        tree.attach_new(tree.entry(), Box::new(SubTree::new("missing")), NodeData::default());
        assert_eq!(tree.tick(), TaskStatus::Failure);
    }

    #[test]
    fn persists_only_the_path() {
        let node = SubTree::new("trees/patrol.xml");
        let json = node.encode_params().unwrap().unwrap();
        assert_eq!(json, json!({"path": "trees/patrol.xml"}));
    }

    #[test]
    fn host_ticks_embedded_tree() {
        let globals = GlobalBlackboard::new();
        let mut inner = BehaviorTree::new(globals.clone());
        let wait = inner
            .attach_new(
                inner.entry(),
                Box::new(Wait::new(SharedVariable::constant(1))),
                NodeData::default(),
            )
            .unwrap();

        let mut sub = SubTree::new("inner");
        sub.reference.attach(inner);

        let mut host = BehaviorTree::new(globals);
        let sub_id = host
            .attach_new(host.entry(), Box::new(sub), NodeData::default())
            .unwrap();

        assert_eq!(host.tick(), TaskStatus::Running);
        assert_eq!(host.tick(), TaskStatus::Success);

        let embedded = host
            .node_mut(sub_id)
            .and_then(|node| node.external_reference())
            .and_then(|reference| reference.tree())
            .unwrap();
        assert_eq!(embedded.status(wait), TaskStatus::Success);
        assert!(embedded.turn_completed());

        // The host turn is over; restarting resets the embedded statuses too.
        host.set_restart_on_turn_completed(true);
        host.tick();
        let embedded = host
            .node_mut(sub_id)
            .and_then(|node| node.external_reference())
            .and_then(|reference| reference.tree())
            .unwrap();
        assert_eq!(embedded.status(wait), TaskStatus::Running);
    }

    #[test]
    fn leaf_priority_of_reference_is_zero() {
        let mut tree = BehaviorTree::new(GlobalBlackboard::new());
        let sub = tree
            .attach_new(tree.entry(), Box::new(SubTree::new("x")), NodeData::default())
            .unwrap();
        assert_eq!(tree.priority(sub), 0.0);
    }

    #[test]
    fn embedded_tree_shares_the_host_tick_count() {
        let globals = GlobalBlackboard::new();
        let mut inner = BehaviorTree::new(globals.clone());
        inner.attach_new(
            inner.entry(),
            Box::new(Wait::new(SharedVariable::constant(1))),
            NodeData::default(),
        );
        let recorder = TraceRecorder::new();
        inner.set_trace_sink(Box::new(recorder.clone()));

        let mut sub = SubTree::new("inner");
        sub.reference.attach(inner);
        let mut host = BehaviorTree::new(globals);
        let sub_id = host
            .attach_new(host.entry(), Box::new(sub), NodeData::default())
            .unwrap();

        host.tick();
        host.tick();

        let ticks: Vec<u64> = recorder.events().iter().map(|event| event.tick).collect();
        assert_eq!(ticks, vec![1, 1, 2, 2]);
        let embedded = host
            .node_mut(sub_id)
            .and_then(|node| node.external_reference())
            .and_then(|reference| reference.tree())
            .unwrap();
        assert_eq!(embedded.tick_count(), 2);
    }
}
