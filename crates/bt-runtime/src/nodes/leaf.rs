use std::cmp::Ordering;

use bt_core::{SharedVariable, TaskStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::task::{params_from_value, params_to_value, NodeType, TaskContext, TaskNode};

/// Reports a fixed status. Mostly useful for stubs and tests.
#[derive(Debug, Default)]
pub struct ReturnStatus {
    params: ReturnStatusParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReturnStatusParams {
    pub status: TaskStatus,
    pub priority: f32,
}

impl Default for ReturnStatusParams {
    fn default() -> Self {
        Self {
            status: TaskStatus::Success,
            priority: 0.0,
        }
    }
}

impl ReturnStatus {
    pub fn new(status: TaskStatus) -> Self {
        Self {
            params: ReturnStatusParams {
                status,
                ..ReturnStatusParams::default()
            },
        }
    }

    pub fn with_priority(mut self, priority: f32) -> Self {
        self.params.priority = priority;
        self
    }
}

impl NodeType for ReturnStatus {
    const CLASS_NAME: &'static str = "Action.ReturnStatus";
}

impl TaskNode for ReturnStatus {
    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn run(&mut self, _ctx: &mut TaskContext<'_>) -> TaskStatus {
        self.params.status
    }

    fn base_priority(&self) -> f32 {
        self.params.priority
    }

    fn encode_params(&self) -> Option<serde_json::Result<Value>> {
        params_to_value(&self.params)
    }

    fn decode_params(&mut self, params: Value) -> serde_json::Result<bool> {
        params_from_value(&mut self.params, params)
    }
}

/// Keeps running for `ticks` updates, then succeeds.
#[derive(Debug, Default)]
pub struct Wait {
    params: WaitParams,
    elapsed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitParams {
    pub ticks: SharedVariable,
}

impl Wait {
    pub fn new(ticks: SharedVariable) -> Self {
        Self {
            params: WaitParams { ticks },
            elapsed: 0,
        }
    }
}

impl NodeType for Wait {
    const CLASS_NAME: &'static str = "Action.Wait";
}

impl TaskNode for Wait {
    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn on_start(&mut self, _ctx: &mut TaskContext<'_>) {
        self.elapsed = 0;
    }

    fn run(&mut self, ctx: &mut TaskContext<'_>) -> TaskStatus {
        let target = ctx.read_as::<u64>(&self.params.ticks).unwrap_or(0);
        if self.elapsed >= target {
            return TaskStatus::Success;
        }
        self.elapsed += 1;
        TaskStatus::Running
    }

    fn encode_params(&self) -> Option<serde_json::Result<Value>> {
        params_to_value(&self.params)
    }

    fn decode_params(&mut self, params: Value) -> serde_json::Result<bool> {
        params_from_value(&mut self.params, params)
    }

    fn variables_mut(&mut self) -> Vec<&mut SharedVariable> {
        vec![&mut self.params.ticks]
    }
}

/// Copies `value` into the blackboard entry behind `target`.
#[derive(Debug, Default)]
pub struct SetVariable {
    params: SetVariableParams,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetVariableParams {
    pub target: SharedVariable,
    pub value: SharedVariable,
}

impl SetVariable {
    pub fn new(target: SharedVariable, value: SharedVariable) -> Self {
        Self {
            params: SetVariableParams { target, value },
        }
    }
}

impl NodeType for SetVariable {
    const CLASS_NAME: &'static str = "Action.SetVariable";
}

impl TaskNode for SetVariable {
    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn run(&mut self, ctx: &mut TaskContext<'_>) -> TaskStatus {
        let Some(value) = ctx.read(&self.params.value) else {
            return TaskStatus::Failure;
        };
        if ctx.write(&self.params.target, value) {
            TaskStatus::Success
        } else {
            tracing::warn!(task = ctx.id().raw(), "set variable target is not writable");
            TaskStatus::Failure
        }
    }

    fn encode_params(&self) -> Option<serde_json::Result<Value>> {
        params_to_value(&self.params)
    }

    fn decode_params(&mut self, params: Value) -> serde_json::Result<bool> {
        params_from_value(&mut self.params, params)
    }

    fn variables_mut(&mut self) -> Vec<&mut SharedVariable> {
        vec![&mut self.params.target, &mut self.params.value]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    #[default]
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl CompareOp {
    fn holds(self, left: &Value, right: &Value) -> bool {
        let ordering = match (left.as_f64(), right.as_f64()) {
            (Some(l), Some(r)) => l.partial_cmp(&r),
            _ if left == right => Some(Ordering::Equal),
            (None, None) => match (left.as_str(), right.as_str()) {
                (Some(l), Some(r)) => Some(l.cmp(r)),
                _ => None,
            },
            _ => None,
        };
        match self {
            CompareOp::Equal => ordering == Some(Ordering::Equal),
            CompareOp::NotEqual => ordering != Some(Ordering::Equal),
            CompareOp::Less => ordering == Some(Ordering::Less),
            CompareOp::LessOrEqual => {
                matches!(ordering, Some(Ordering::Less | Ordering::Equal))
            }
            CompareOp::Greater => ordering == Some(Ordering::Greater),
            CompareOp::GreaterOrEqual => {
                matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
            }
        }
    }
}

/// Succeeds when `left <op> right` holds. Numbers compare numerically,
/// strings lexically, anything else only for (in)equality.
#[derive(Debug, Default)]
pub struct Compare {
    params: CompareParams,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareParams {
    pub left: SharedVariable,
    pub op: CompareOp,
    pub right: SharedVariable,
}

impl Compare {
    pub fn new(left: SharedVariable, op: CompareOp, right: SharedVariable) -> Self {
        Self {
            params: CompareParams { left, op, right },
        }
    }
}

impl NodeType for Compare {
    const CLASS_NAME: &'static str = "Condition.Compare";
}

impl TaskNode for Compare {
    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn run(&mut self, ctx: &mut TaskContext<'_>) -> TaskStatus {
        let left = ctx.read(&self.params.left).unwrap_or(Value::Null);
        let right = ctx.read(&self.params.right).unwrap_or(Value::Null);
        if self.params.op.holds(&left, &right) {
            TaskStatus::Success
        } else {
            TaskStatus::Failure
        }
    }

    fn encode_params(&self) -> Option<serde_json::Result<Value>> {
        params_to_value(&self.params)
    }

    fn decode_params(&mut self, params: Value) -> serde_json::Result<bool> {
        params_from_value(&mut self.params, params)
    }

    fn variables_mut(&mut self) -> Vec<&mut SharedVariable> {
        vec![&mut self.params.left, &mut self.params.right]
    }
}

/// Succeeds when `value` equals any of `candidates`.
#[derive(Debug, Default)]
pub struct MatchAny {
    params: MatchAnyParams,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchAnyParams {
    pub value: SharedVariable,
    pub candidates: Vec<SharedVariable>,
}

impl MatchAny {
    pub fn new(value: SharedVariable, candidates: Vec<SharedVariable>) -> Self {
        Self {
            params: MatchAnyParams { value, candidates },
        }
    }
}

impl NodeType for MatchAny {
    const CLASS_NAME: &'static str = "Condition.MatchAny";
}

impl TaskNode for MatchAny {
    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn run(&mut self, ctx: &mut TaskContext<'_>) -> TaskStatus {
        let Some(value) = ctx.read(&self.params.value) else {
            return TaskStatus::Failure;
        };
        let matched = self
            .params
            .candidates
            .iter()
            .filter_map(|candidate| ctx.read(candidate))
            .any(|candidate| CompareOp::Equal.holds(&value, &candidate));
        if matched {
            TaskStatus::Success
        } else {
            TaskStatus::Failure
        }
    }

    fn encode_params(&self) -> Option<serde_json::Result<Value>> {
        params_to_value(&self.params)
    }

    fn decode_params(&mut self, params: Value) -> serde_json::Result<bool> {
        params_from_value(&mut self.params, params)
    }

    fn variables_mut(&mut self) -> Vec<&mut SharedVariable> {
        std::iter::once(&mut self.params.value)
            .chain(self.params.candidates.iter_mut())
            .collect()
    }
}

/// Emits `message` (and the current value of `variable`, if set) at info
/// level, then succeeds.
#[derive(Debug, Default)]
pub struct Log {
    params: LogParams,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogParams {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable: Option<SharedVariable>,
}

impl Log {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            params: LogParams {
                message: message.into(),
                variable: None,
            },
        }
    }

    pub fn with_variable(mut self, variable: SharedVariable) -> Self {
        self.params.variable = Some(variable);
        self
    }
}

impl NodeType for Log {
    const CLASS_NAME: &'static str = "Action.Log";
}

impl TaskNode for Log {
    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn run(&mut self, ctx: &mut TaskContext<'_>) -> TaskStatus {
        let value = self.params.variable.as_ref().and_then(|var| ctx.read(var));
        match value {
            Some(value) => tracing::info!(tick = ctx.tick(), %value, "{}", self.params.message),
            None => tracing::info!(tick = ctx.tick(), "{}", self.params.message),
        }
        TaskStatus::Success
    }

    fn encode_params(&self) -> Option<serde_json::Result<Value>> {
        params_to_value(&self.params)
    }

    fn decode_params(&mut self, params: Value) -> serde_json::Result<bool> {
        params_from_value(&mut self.params, params)
    }

    fn variables_mut(&mut self) -> Vec<&mut SharedVariable> {
        self.params.variable.iter_mut().collect()
    }
}
