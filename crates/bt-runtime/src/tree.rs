use bt_core::{Blackboard, GlobalBlackboard, TaskStatus};
use bt_tools::{TraceEvent, TraceSink};
use serde::{Deserialize, Serialize};

use crate::binding::{self, BindMode, BindReport, ObjectResolver};
use crate::nodes::Entry;
use crate::task::{EditorPosition, NodeData, TaskContext, TaskId, TaskNode};

/// Tree-level parameters, persisted as the `BTParams` attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TreeParams {
    pub restart_on_turn_completed: bool,
    pub share_variable_names: Vec<String>,
}

/// Most levels a task chain may span, its root counting as level 1.
/// Updates recurse once per level.
pub const MAX_TREE_DEPTH: usize = 128;

struct TaskSlot {
    /// `None` only while the node is inside its own update.
    node: Option<Box<dyn TaskNode>>,
    class_name: &'static str,
    max_children: Option<usize>,
    status: TaskStatus,
    turn_pending: bool,
    parent: Option<TaskId>,
    children: Vec<TaskId>,
    data: NodeData,
}

/// Arena owning every task of one tree, the entry root and the local
/// blackboard.
///
/// Tasks reachable from the entry form the trunk; parentless tasks other than
/// the entry are apart branches, kept and persisted but never awoken or
/// ticked.
pub struct BehaviorTree {
    slots: Vec<TaskSlot>,
    entry: TaskId,
    local: Blackboard,
    globals: GlobalBlackboard,
    params: TreeParams,
    turn_completed: bool,
    awake: bool,
    ticks: u64,
    trace: Option<Box<dyn TraceSink>>,
}

impl std::fmt::Debug for BehaviorTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorTree")
            .field("tasks", &self.slots.len())
            .field("params", &self.params)
            .field("turn_completed", &self.turn_completed)
            .field("ticks", &self.ticks)
            .finish()
    }
}

impl BehaviorTree {
    /// Empty tree holding only its entry.
    pub fn new(globals: GlobalBlackboard) -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            entry: TaskId::from_index(0),
            local: Blackboard::new(),
            globals,
            params: TreeParams::default(),
            turn_completed: false,
            awake: false,
            ticks: 0,
            trace: None,
        };
        tree.entry = tree.add_task(Box::new(Entry));
        tree
    }

    pub fn with_params(globals: GlobalBlackboard, params: TreeParams) -> Self {
        let mut tree = Self::new(globals);
        tree.params = params;
        tree
    }

    pub fn entry(&self) -> TaskId {
        self.entry
    }

    pub fn params(&self) -> &TreeParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut TreeParams {
        &mut self.params
    }

    pub fn restart_on_turn_completed(&self) -> bool {
        self.params.restart_on_turn_completed
    }

    pub fn set_restart_on_turn_completed(&mut self, restart: bool) {
        self.params.restart_on_turn_completed = restart;
    }

    pub fn turn_completed(&self) -> bool {
        self.turn_completed
    }

    /// A completed turn with no restart: ticks do nothing.
    pub fn is_inert(&self) -> bool {
        self.turn_completed && !self.params.restart_on_turn_completed
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    pub fn local(&self) -> &Blackboard {
        &self.local
    }

    pub fn local_mut(&mut self) -> &mut Blackboard {
        &mut self.local
    }

    pub fn globals(&self) -> &GlobalBlackboard {
        &self.globals
    }

    pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink>) {
        self.trace = Some(sink);
    }

    pub fn take_trace_sink(&mut self) -> Option<Box<dyn TraceSink>> {
        self.trace.take()
    }

    // ------------------------------------------------------------------
    // Arena
    // ------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Every task in registration order.
    pub fn task_ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        (0..self.slots.len()).map(TaskId::from_index)
    }

    /// Registers a parentless task. It stays an apart branch until attached.
    pub fn add_task(&mut self, node: Box<dyn TaskNode>) -> TaskId {
        self.add_task_with_data(node, NodeData::default())
    }

    pub fn add_task_with_data(&mut self, node: Box<dyn TaskNode>, data: NodeData) -> TaskId {
        let id = TaskId::from_index(self.slots.len());
        self.slots.push(TaskSlot {
            class_name: node.class_name(),
            max_children: node.max_children(),
            node: Some(node),
            status: TaskStatus::None,
            turn_pending: true,
            parent: None,
            children: Vec::new(),
            data,
        });
        id
    }

    /// Registers `node` and attaches it under `parent`. Nothing is created
    /// when the parent is full or already sits at the deepest level.
    pub fn attach_new(
        &mut self,
        parent: TaskId,
        node: Box<dyn TaskNode>,
        data: NodeData,
    ) -> Option<TaskId> {
        if !self.has_room(parent) || self.level(parent) >= MAX_TREE_DEPTH {
            return None;
        }
        let id = self.add_task_with_data(node, data);
        self.add_child(parent, id).then_some(id)
    }

    fn slot(&self, id: TaskId) -> Option<&TaskSlot> {
        self.slots.get(id.index())
    }

    fn slot_mut(&mut self, id: TaskId) -> Option<&mut TaskSlot> {
        self.slots.get_mut(id.index())
    }

    pub fn contains(&self, id: TaskId) -> bool {
        id.index() < self.slots.len()
    }

    pub fn status(&self, id: TaskId) -> TaskStatus {
        self.slot(id).map_or(TaskStatus::None, |slot| slot.status)
    }

    pub fn turn_pending(&self, id: TaskId) -> bool {
        self.slot(id).is_some_and(|slot| slot.turn_pending)
    }

    pub fn class_name(&self, id: TaskId) -> Option<&'static str> {
        self.slot(id).map(|slot| slot.class_name)
    }

    pub fn parent(&self, id: TaskId) -> Option<TaskId> {
        self.slot(id).and_then(|slot| slot.parent)
    }

    pub fn children(&self, id: TaskId) -> &[TaskId] {
        self.slot(id).map_or(&[], |slot| slot.children.as_slice())
    }

    pub fn max_children(&self, id: TaskId) -> Option<usize> {
        self.slot(id).and_then(|slot| slot.max_children)
    }

    pub fn node_data(&self, id: TaskId) -> Option<&NodeData> {
        self.slot(id).map(|slot| &slot.data)
    }

    pub fn node(&self, id: TaskId) -> Option<&dyn TaskNode> {
        self.slot(id).and_then(|slot| slot.node.as_deref())
    }

    pub fn node_mut(&mut self, id: TaskId) -> Option<&mut (dyn TaskNode + 'static)> {
        self.slot_mut(id).and_then(|slot| slot.node.as_deref_mut())
    }

    /// Parentless tasks other than the entry, in registration order.
    pub fn apart_roots(&self) -> Vec<TaskId> {
        self.task_ids()
            .filter(|&id| id != self.entry && self.parent(id).is_none())
            .collect()
    }

    // ------------------------------------------------------------------
    // Composition
    // ------------------------------------------------------------------

    fn has_room(&self, parent: TaskId) -> bool {
        match self.slot(parent) {
            Some(slot) => slot
                .max_children
                .is_none_or(|max| slot.children.len() < max),
            None => false,
        }
    }

    fn is_ancestor(&self, ancestor: TaskId, mut id: TaskId) -> bool {
        while let Some(parent) = self.parent(id) {
            if parent == ancestor {
                return true;
            }
            id = parent;
        }
        false
    }

    /// Level of `id` counted from its root, the root being 1.
    pub fn level(&self, mut id: TaskId) -> usize {
        let mut level = 1;
        while let Some(parent) = self.parent(id) {
            level += 1;
            id = parent;
        }
        level
    }

    /// Levels spanned by the subtree under `root`, itself included.
    pub fn height(&self, root: TaskId) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(root, 1)];
        while let Some((id, level)) = pending.pop() {
            deepest = deepest.max(level);
            pending.extend(self.children(id).iter().map(|&child| (child, level + 1)));
        }
        deepest
    }

    /// Attaches `child` under `parent`, keeping siblings sorted by editor x.
    ///
    /// Rejected when the parent is full, when `child` is the entry, when the
    /// link would create a cycle or nest deeper than [`MAX_TREE_DEPTH`]. A
    /// child attached elsewhere moves.
    pub fn add_child(&mut self, parent: TaskId, child: TaskId) -> bool {
        if !self.contains(child)
            || child == self.entry
            || child == parent
            || self.is_ancestor(child, parent)
            || !self.has_room(parent)
            || self.level(parent) + self.height(child) > MAX_TREE_DEPTH
        {
            return false;
        }
        if let Some(old) = self.parent(child) {
            self.remove_child(old, child);
        }
        self.slots[parent.index()].children.push(child);
        self.slots[child.index()].parent = Some(parent);
        self.sort_children(parent);
        true
    }

    /// Detaches `child` from `parent`. The subtree stays in the arena as an
    /// apart branch.
    pub fn remove_child(&mut self, parent: TaskId, child: TaskId) -> bool {
        let Some(slot) = self.slot_mut(parent) else {
            return false;
        };
        let Some(pos) = slot.children.iter().position(|&c| c == child) else {
            return false;
        };
        slot.children.remove(pos);
        self.slots[child.index()].parent = None;
        true
    }

    /// Moves a task in the editor and re-sorts its siblings.
    pub fn move_task(&mut self, id: TaskId, position: EditorPosition) {
        let Some(slot) = self.slot_mut(id) else {
            return;
        };
        slot.data.position = position;
        if let Some(parent) = slot.parent {
            self.sort_children(parent);
        }
    }

    pub fn set_node_data(&mut self, id: TaskId, data: NodeData) {
        let position = data.position;
        if let Some(slot) = self.slot_mut(id) {
            slot.data = data;
        }
        self.move_task(id, position);
    }

    fn sort_children(&mut self, parent: TaskId) {
        let mut children = std::mem::take(&mut self.slots[parent.index()].children);
        // Stable: equal x keeps insertion order.
        children.sort_by(|a, b| {
            let ax = self.slots[a.index()].data.position.x;
            let bx = self.slots[b.index()].data.position.x;
            ax.total_cmp(&bx)
        });
        self.slots[parent.index()].children = children;
    }

    /// Leaf: its base priority. Parent: sum over children.
    pub fn priority(&self, id: TaskId) -> f32 {
        let Some(slot) = self.slot(id) else {
            return 0.0;
        };
        if slot.max_children == Some(0) {
            slot.node.as_ref().map_or(0.0, |node| node.base_priority())
        } else {
            slot.children.iter().map(|&child| self.priority(child)).sum()
        }
    }

    /// Marks a task ignored (cancelling it first if running), or clears the
    /// mark back to `None`.
    pub fn set_ignored(&mut self, id: TaskId, ignored: bool) {
        if ignored {
            self.force_end(id);
            if let Some(slot) = self.slot_mut(id) {
                slot.status = TaskStatus::Ignored;
            }
        } else if let Some(slot) = self.slot_mut(id) {
            if slot.status == TaskStatus::Ignored {
                slot.status = TaskStatus::None;
            }
        }
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    fn with_node<R>(
        &mut self,
        id: TaskId,
        f: impl FnOnce(&mut dyn TaskNode, &mut TaskContext<'_>) -> R,
    ) -> Option<R> {
        let mut node = self.slot_mut(id)?.node.take()?;
        let result = {
            let mut ctx = TaskContext::new(self, id);
            f(node.as_mut(), &mut ctx)
        };
        self.slots[id.index()].node = Some(node);
        Some(result)
    }

    /// One update of one task: start on a fresh run, run, end on a
    /// non-running result.
    pub(crate) fn update_task(&mut self, id: TaskId) -> TaskStatus {
        let Some(slot) = self.slot_mut(id) else {
            return TaskStatus::Error;
        };
        if slot.status == TaskStatus::Ignored {
            return TaskStatus::Ignored;
        }
        let start = std::mem::replace(&mut slot.turn_pending, false);

        let status = self.with_node(id, |node, ctx| {
            if start {
                node.on_start(ctx);
            }
            let status = node.run(ctx);
            if status != TaskStatus::Running {
                node.on_end(ctx);
            }
            status
        });
        let Some(status) = status else {
            tracing::warn!(task = id.raw(), "task updated while already updating");
            self.slots[id.index()].turn_pending = start;
            return TaskStatus::Error;
        };

        let slot = &mut self.slots[id.index()];
        slot.status = status;
        if status != TaskStatus::Running {
            slot.turn_pending = true;
        }
        self.emit_trace(id, status);
        status
    }

    /// Cancels a running task: running descendants first, then the task
    /// itself ends with `Failure`. No effect on tasks that are not running.
    pub fn force_end(&mut self, id: TaskId) {
        if self.status(id) != TaskStatus::Running {
            return;
        }
        let children = self.children(id).to_vec();
        for child in children {
            self.force_end(child);
        }
        let slot = &mut self.slots[id.index()];
        slot.status = TaskStatus::Failure;
        slot.turn_pending = true;
        self.with_node(id, |node, ctx| node.on_end(ctx));
        self.emit_trace(id, TaskStatus::Failure);
    }

    /// Calls `on_awake` on the entry subtree. Only the first call has any
    /// effect; `tick` makes it on demand.
    pub fn awake(&mut self) {
        if self.awake {
            return;
        }
        self.awake = true;
        self.awake_task(self.entry);
    }

    fn awake_task(&mut self, id: TaskId) {
        self.with_node(id, |node, ctx| node.on_awake(ctx));
        let children = self.children(id).to_vec();
        for child in children {
            self.awake_task(child);
        }
    }

    /// One external time step.
    pub fn tick(&mut self) -> TaskStatus {
        if self.is_inert() {
            return self.status(self.entry);
        }
        self.awake();
        if self.turn_completed {
            self.reset();
            self.turn_completed = false;
        }
        let status = self.run_entry(self.ticks + 1);
        self.turn_completed = status != TaskStatus::Running;
        if self.turn_completed {
            tracing::debug!(tick = self.ticks, %status, "turn completed");
            self.notify_turn_completed();
        }
        status
    }

    /// Updates the entry once without turn bookkeeping, as tick `tick`. Hosts
    /// embedding this tree drive it through here with their own count.
    pub fn run_entry(&mut self, tick: u64) -> TaskStatus {
        self.ticks = tick;
        self.update_task(self.entry)
    }

    /// Marks the turn finished and forwards the notice to embedded trees.
    pub fn notify_turn_completed(&mut self) {
        self.turn_completed = true;
        for index in 0..self.slots.len() {
            if let Some(tree) = self.embedded_tree_mut(index) {
                tree.notify_turn_completed();
            }
        }
    }

    /// Zeroes every status, embedded trees included.
    pub fn reset(&mut self) {
        for index in 0..self.slots.len() {
            self.slots[index].status = TaskStatus::None;
            if let Some(tree) = self.embedded_tree_mut(index) {
                tree.reset();
            }
        }
    }

    /// Cancels everything still running: the trunk, then apart branches.
    pub fn abort(&mut self) {
        self.force_end(self.entry);
        for root in self.apart_roots() {
            self.force_end(root);
        }
    }

    fn embedded_tree_mut(&mut self, index: usize) -> Option<&mut BehaviorTree> {
        self.slots[index]
            .node
            .as_mut()?
            .external_reference()?
            .tree_mut()
    }

    fn emit_trace(&mut self, id: TaskId, status: TaskStatus) {
        if let Some(sink) = self.trace.as_mut() {
            let class = self.slots[id.index()].class_name;
            sink.emit(
                TraceEvent::new(self.ticks, class)
                    .with_task(id.raw())
                    .with_status(status),
            );
        }
    }

    // ------------------------------------------------------------------
    // Shared variables
    // ------------------------------------------------------------------

    /// Runs the binding pass over one task's parameters.
    pub fn bind_task(
        &mut self,
        id: TaskId,
        mode: BindMode,
        resolver: &dyn ObjectResolver,
    ) -> BindReport {
        let mut report = BindReport::default();
        let Some(slot) = self.slots.get_mut(id.index()) else {
            return report;
        };
        if let Some(node) = slot.node.as_mut() {
            for var in node.variables_mut() {
                binding::bind_variable(
                    var,
                    mode,
                    &mut self.local,
                    &self.globals,
                    resolver,
                    &mut report,
                );
            }
        }
        report
    }

    /// Runs the binding pass over every task.
    pub fn bind_variables(&mut self, mode: BindMode, resolver: &dyn ObjectResolver) -> BindReport {
        let mut report = BindReport::default();
        for id in (0..self.slots.len()).map(TaskId::from_index) {
            report.merge(self.bind_task(id, mode, resolver));
        }
        report
    }

    /// Rewrites the declared variable names from the local blackboard keys.
    pub fn refresh_declared_variables(&mut self) {
        self.params.share_variable_names = self.local.keys().map(str::to_string).collect();
    }

    /// Seeds the local blackboard with every declared name that is missing.
    pub fn declare_variables(&mut self) {
        for name in &self.params.share_variable_names {
            self.local.ensure(name);
        }
    }
}

impl Drop for BehaviorTree {
    fn drop(&mut self) {
        self.abort();
    }
}
