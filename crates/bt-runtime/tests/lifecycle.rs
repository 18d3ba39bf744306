use std::cell::RefCell;
use std::rc::Rc;

use bt_core::{GlobalBlackboard, TaskStatus};
use bt_runtime::nodes::{ReactiveSelector, ReturnStatus, Sequence};
use bt_runtime::{BehaviorTree, NodeData, TaskContext, TaskId, TaskNode};

type CallLog = Rc<RefCell<Vec<String>>>;

/// Leaf that replays a fixed list of statuses and records every hook call.
struct Scripted {
    name: &'static str,
    script: Vec<TaskStatus>,
    step: usize,
    log: CallLog,
}

impl Scripted {
    fn boxed(name: &'static str, script: &[TaskStatus], log: &CallLog) -> Box<dyn TaskNode> {
        Box::new(Self {
            name,
            script: script.to_vec(),
            step: 0,
            log: Rc::clone(log),
        })
    }

    fn record(&self, hook: &str) {
        self.log.borrow_mut().push(format!("{}.{hook}", self.name));
    }
}

impl TaskNode for Scripted {
    fn class_name(&self) -> &'static str {
        "Test.Scripted"
    }

    fn on_awake(&mut self, _ctx: &mut TaskContext<'_>) {
        self.record("awake");
    }

    fn on_start(&mut self, _ctx: &mut TaskContext<'_>) {
        self.record("start");
    }

    fn run(&mut self, _ctx: &mut TaskContext<'_>) -> TaskStatus {
        self.record("run");
        let status = self
            .script
            .get(self.step)
            .or(self.script.last())
            .copied()
            .unwrap_or(TaskStatus::Success);
        self.step += 1;
        status
    }

    fn on_end(&mut self, _ctx: &mut TaskContext<'_>) {
        self.record("end");
    }
}

fn calls(log: &CallLog) -> Vec<String> {
    std::mem::take(&mut *log.borrow_mut())
}

/// Entry -> Sequence(A, B) where A runs once before succeeding.
fn two_step_tree(log: &CallLog) -> (BehaviorTree, TaskId, TaskId, TaskId) {
    let mut tree = BehaviorTree::new(GlobalBlackboard::new());
    let seq = tree
        .attach_new(tree.entry(), Box::new(Sequence::default()), NodeData::default())
        .unwrap();
    let a = tree
        .attach_new(
            seq,
            Scripted::boxed("a", &[TaskStatus::Running, TaskStatus::Success], log),
            NodeData::at(0.0, 0.0),
        )
        .unwrap();
    let b = tree
        .attach_new(
            seq,
            Scripted::boxed("b", &[TaskStatus::Success], log),
            NodeData::at(100.0, 0.0),
        )
        .unwrap();
    (tree, seq, a, b)
}

#[test]
fn running_child_spans_two_ticks() {
    let log = CallLog::default();
    let (mut tree, seq, a, b) = two_step_tree(&log);

    assert_eq!(tree.tick(), TaskStatus::Running);
    assert_eq!(calls(&log), ["a.awake", "b.awake", "a.start", "a.run"]);
    assert_eq!(tree.status(a), TaskStatus::Running);
    assert!(!tree.turn_pending(a));
    assert!(!tree.turn_pending(seq));
    assert!(tree.turn_pending(b));
    assert!(!tree.turn_completed());

    assert_eq!(tree.tick(), TaskStatus::Success);
    // A resumes without a second start.
    assert_eq!(calls(&log), ["a.run", "a.end", "b.start", "b.run", "b.end"]);
    assert!(tree.turn_completed());
    assert!(tree.turn_pending(a));
    assert!(tree.turn_pending(b));
}

#[test]
fn completed_turn_without_restart_is_inert() {
    let log = CallLog::default();
    let (mut tree, _, a, b) = two_step_tree(&log);
    tree.tick();
    tree.tick();
    calls(&log);

    assert!(tree.is_inert());
    assert_eq!(tree.tick(), TaskStatus::Success);
    assert!(calls(&log).is_empty());
    assert_eq!(tree.tick_count(), 2);
    assert_eq!(tree.status(a), TaskStatus::Success);
    assert_eq!(tree.status(b), TaskStatus::Success);
}

#[test]
fn restart_resets_statuses_and_runs_again() {
    let log = CallLog::default();
    let (mut tree, _, a, b) = two_step_tree(&log);
    tree.set_restart_on_turn_completed(true);
    tree.tick();
    tree.tick();
    calls(&log);

    // A's script is exhausted, so it now succeeds straight away.
    assert_eq!(tree.tick(), TaskStatus::Success);
    assert_eq!(
        calls(&log),
        ["a.start", "a.run", "a.end", "b.start", "b.run", "b.end"]
    );
    assert_eq!(tree.status(a), TaskStatus::Success);
    assert_eq!(tree.status(b), TaskStatus::Success);
}

#[test]
fn reset_is_idempotent() {
    let log = CallLog::default();
    let (mut tree, _, a, b) = two_step_tree(&log);
    tree.tick();

    tree.reset();
    let once: Vec<_> = tree.task_ids().map(|id| tree.status(id)).collect();
    tree.reset();
    let twice: Vec<_> = tree.task_ids().map(|id| tree.status(id)).collect();

    assert_eq!(once, twice);
    assert!(once.iter().all(|&status| status == TaskStatus::None));
    // Pending flags are left alone.
    assert!(!tree.turn_pending(a));
    assert!(tree.turn_pending(b));
}

#[test]
fn entry_accepts_a_single_child() {
    let mut tree = BehaviorTree::new(GlobalBlackboard::new());
    let first = tree.attach_new(
        tree.entry(),
        Box::new(ReturnStatus::new(TaskStatus::Success)),
        NodeData::default(),
    );
    let second = tree.attach_new(
        tree.entry(),
        Box::new(ReturnStatus::new(TaskStatus::Failure)),
        NodeData::default(),
    );

    assert!(first.is_some());
    assert!(second.is_none());
    assert_eq!(tree.children(tree.entry()).len(), 1);
    assert_eq!(tree.tick(), TaskStatus::Success);
}

#[test]
fn entry_without_child_reports_ignored() {
    let mut tree = BehaviorTree::new(GlobalBlackboard::new());
    assert_eq!(tree.tick(), TaskStatus::Ignored);
    assert!(tree.turn_completed());
}

#[test]
fn ignored_task_is_skipped_until_cleared() {
    let log = CallLog::default();
    let (mut tree, _, a, b) = two_step_tree(&log);
    tree.set_restart_on_turn_completed(true);
    tree.set_ignored(a, true);

    assert_eq!(tree.tick(), TaskStatus::Success);
    assert!(!calls(&log).iter().any(|call| call.starts_with("a.")));
    assert_eq!(tree.status(a), TaskStatus::Ignored);
    assert_eq!(tree.status(b), TaskStatus::Success);

    // Reset between turns clears the mark.
    tree.tick();
    assert!(calls(&log).iter().any(|call| call == "a.run"));
}

#[test]
fn reactive_selector_cancels_preempted_child() {
    let log = CallLog::default();
    let mut tree = BehaviorTree::new(GlobalBlackboard::new());
    let root = tree
        .attach_new(tree.entry(), Box::new(ReactiveSelector::default()), NodeData::default())
        .unwrap();
    // High-priority check fails once, then succeeds.
    let guard = tree
        .attach_new(
            root,
            Scripted::boxed("guard", &[TaskStatus::Failure, TaskStatus::Running], &log),
            NodeData::at(0.0, 0.0),
        )
        .unwrap();
    let fallback = tree
        .attach_new(
            root,
            Scripted::boxed("fallback", &[TaskStatus::Running], &log),
            NodeData::at(10.0, 0.0),
        )
        .unwrap();

    assert_eq!(tree.tick(), TaskStatus::Running);
    assert_eq!(tree.status(fallback), TaskStatus::Running);
    calls(&log);

    assert_eq!(tree.tick(), TaskStatus::Running);
    assert_eq!(
        calls(&log),
        ["guard.start", "guard.run", "fallback.end"]
    );
    assert_eq!(tree.status(guard), TaskStatus::Running);
    assert_eq!(tree.status(fallback), TaskStatus::Failure);
    assert!(tree.turn_pending(fallback));
}

#[test]
fn force_end_cancels_running_descendants_first() {
    let log = CallLog::default();
    let (mut tree, seq, a, _) = two_step_tree(&log);
    tree.tick();
    calls(&log);

    tree.force_end(seq);
    assert_eq!(calls(&log), ["a.end"]);
    assert_eq!(tree.status(seq), TaskStatus::Failure);
    assert_eq!(tree.status(a), TaskStatus::Failure);
    assert!(tree.turn_pending(seq));

    // Not running any more: nothing happens.
    tree.force_end(seq);
    assert!(calls(&log).is_empty());
}

#[test]
fn dropping_a_running_tree_ends_running_tasks() {
    let log = CallLog::default();
    let (mut tree, _, _, _) = two_step_tree(&log);
    tree.tick();
    calls(&log);

    drop(tree);
    assert_eq!(calls(&log), ["a.end"]);
}

#[test]
fn apart_branches_are_never_ticked() {
    let log = CallLog::default();
    let mut tree = BehaviorTree::new(GlobalBlackboard::new());
    tree.attach_new(
        tree.entry(),
        Box::new(ReturnStatus::new(TaskStatus::Success)),
        NodeData::default(),
    );
    let loose = tree.add_task(Scripted::boxed("loose", &[TaskStatus::Success], &log));

    assert_eq!(tree.tick(), TaskStatus::Success);
    assert_eq!(tree.apart_roots(), vec![loose]);
    assert!(calls(&log).is_empty());
    assert_eq!(tree.status(loose), TaskStatus::None);
}

#[test]
fn sequence_resumes_running_second_child() {
    let log = CallLog::default();
    let mut tree = BehaviorTree::new(GlobalBlackboard::new());
    let seq = tree
        .attach_new(tree.entry(), Box::new(Sequence::default()), NodeData::default())
        .unwrap();
    let a = tree
        .attach_new(seq, Scripted::boxed("a", &[TaskStatus::Success], &log), NodeData::at(0.0, 0.0))
        .unwrap();
    let b = tree
        .attach_new(
            seq,
            Scripted::boxed("b", &[TaskStatus::Running, TaskStatus::Success], &log),
            NodeData::at(1.0, 0.0),
        )
        .unwrap();

    assert_eq!(tree.tick(), TaskStatus::Running);
    assert!(!tree.turn_pending(b));
    assert!(tree.turn_pending(a));
    calls(&log);

    assert_eq!(tree.tick(), TaskStatus::Success);
    // A already succeeded this turn and is not run again.
    assert_eq!(calls(&log), ["b.run", "b.end"]);
    assert!(tree.turn_completed());

    let before: Vec<_> = tree.task_ids().map(|id| (tree.status(id), tree.turn_pending(id))).collect();
    assert_eq!(tree.tick(), TaskStatus::Success);
    let after: Vec<_> = tree.task_ids().map(|id| (tree.status(id), tree.turn_pending(id))).collect();
    assert_eq!(before, after);
    assert!(calls(&log).is_empty());
}
