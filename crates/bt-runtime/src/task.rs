use bt_core::{Blackboard, GlobalBlackboard, SharedVariable, TaskStatus};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tree::BehaviorTree;

/// Index of a task inside the tree that created it. Ids are never reused and
/// mean nothing to another tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u32);

impl TaskId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EditorPosition {
    pub x: f32,
    pub y: f32,
}

impl EditorPosition {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Editor metadata persisted with every task. Only `position.x` matters at
/// runtime, as the sort key of sibling order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeData {
    pub position: EditorPosition,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub collapsed: bool,
}

impl NodeData {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            position: EditorPosition::new(x, y),
            ..Self::default()
        }
    }
}

/// Behavior of one node kind.
///
/// The tree owns lifecycle bookkeeping (status, start/end pairing, parent
/// links); implementors only decide. `run` is called once per update, wrapped
/// by `on_start` the first time in a run and `on_end` once a non-running
/// status comes back.
pub trait TaskNode: 'static {
    /// Registry key written as `ClassName` in documents.
    fn class_name(&self) -> &'static str;

    /// `Some(0)` for leaves, `None` for unbounded composites.
    fn max_children(&self) -> Option<usize> {
        Some(0)
    }

    fn on_awake(&mut self, _ctx: &mut TaskContext<'_>) {}

    fn on_start(&mut self, _ctx: &mut TaskContext<'_>) {}

    fn run(&mut self, ctx: &mut TaskContext<'_>) -> TaskStatus;

    fn on_end(&mut self, _ctx: &mut TaskContext<'_>) {}

    /// Priority of a leaf. Parents report the sum of their children instead.
    fn base_priority(&self) -> f32 {
        0.0
    }

    /// Parameters as JSON, or `None` when the node has no parameter type.
    fn encode_params(&self) -> Option<serde_json::Result<Value>> {
        None
    }

    /// Replaces the parameters with a value decoded from `params`. Returns
    /// `Ok(false)` when the node has no parameter type.
    fn decode_params(&mut self, _params: Value) -> serde_json::Result<bool> {
        Ok(false)
    }

    /// Every shared variable in the parameters, arrays flattened.
    fn variables_mut(&mut self) -> Vec<&mut SharedVariable> {
        Vec::new()
    }

    /// The embedded tree reference, for nodes that stand for another tree.
    fn external_reference(&mut self) -> Option<&mut ExternalReference> {
        None
    }
}

/// A node kind the registry can construct by name.
pub trait NodeType: TaskNode + Default {
    const CLASS_NAME: &'static str;
}

pub fn params_to_value<P: Serialize>(params: &P) -> Option<serde_json::Result<Value>> {
    Some(serde_json::to_value(params))
}

pub fn params_from_value<P: DeserializeOwned>(
    target: &mut P,
    value: Value,
) -> serde_json::Result<bool> {
    *target = serde_json::from_value(value)?;
    Ok(true)
}

/// Path of another tree document plus, once resolved in live mode, the tree
/// built from it.
#[derive(Default, Serialize, Deserialize)]
pub struct ExternalReference {
    path: String,
    #[serde(skip)]
    tree: Option<Box<BehaviorTree>>,
}

impl std::fmt::Debug for ExternalReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalReference")
            .field("path", &self.path)
            .field("resolved", &self.tree.is_some())
            .finish()
    }
}

impl ExternalReference {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            tree: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_resolved(&self) -> bool {
        self.tree.is_some()
    }

    pub fn tree(&self) -> Option<&BehaviorTree> {
        self.tree.as_deref()
    }

    pub fn tree_mut(&mut self) -> Option<&mut BehaviorTree> {
        self.tree.as_deref_mut()
    }

    pub fn attach(&mut self, tree: BehaviorTree) {
        self.tree = Some(Box::new(tree));
    }

    pub fn detach(&mut self) -> Option<BehaviorTree> {
        self.tree.take().map(|tree| *tree)
    }
}

/// What a running node may touch: its own children and the two blackboards.
pub struct TaskContext<'t> {
    tree: &'t mut BehaviorTree,
    id: TaskId,
}

impl<'t> TaskContext<'t> {
    pub(crate) fn new(tree: &'t mut BehaviorTree, id: TaskId) -> Self {
        Self { tree, id }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Number of ticks the owning tree has run, this one included.
    pub fn tick(&self) -> u64 {
        self.tree.tick_count()
    }

    pub fn children(&self) -> &[TaskId] {
        self.tree.children(self.id)
    }

    pub fn child_count(&self) -> usize {
        self.children().len()
    }

    pub fn child_status(&self, index: usize) -> TaskStatus {
        self.children()
            .get(index)
            .map_or(TaskStatus::None, |&child| self.tree.status(child))
    }

    /// Runs one update of the child at `index`. A missing child reports
    /// `Error`.
    pub fn update_child(&mut self, index: usize) -> TaskStatus {
        match self.children().get(index).copied() {
            Some(child) => self.tree.update_task(child),
            None => TaskStatus::Error,
        }
    }

    /// Cancels the child at `index` and its subtree if it is running.
    pub fn force_end_child(&mut self, index: usize) {
        if let Some(child) = self.children().get(index).copied() {
            self.tree.force_end(child);
        }
    }

    pub fn child_priority(&self, index: usize) -> f32 {
        self.children()
            .get(index)
            .map_or(0.0, |&child| self.tree.priority(child))
    }

    pub fn read(&self, var: &SharedVariable) -> Option<Value> {
        var.read(self.tree.local(), self.tree.globals())
    }

    pub fn read_as<T: DeserializeOwned>(&self, var: &SharedVariable) -> Option<T> {
        serde_json::from_value(self.read(var)?).ok()
    }

    pub fn write(&mut self, var: &SharedVariable, value: Value) -> bool {
        let globals = self.tree.globals().clone();
        var.write(self.tree.local_mut(), &globals, value)
    }

    pub fn local(&self) -> &Blackboard {
        self.tree.local()
    }

    pub fn local_mut(&mut self) -> &mut Blackboard {
        self.tree.local_mut()
    }

    pub fn globals(&self) -> &GlobalBlackboard {
        self.tree.globals()
    }
}
