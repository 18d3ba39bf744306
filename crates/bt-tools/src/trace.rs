use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

use bt_core::TaskStatus;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One status transition of one task.
///
/// Plain data so it can be recorded while a tree runs and rendered later by
/// tooling. `task` is the arena index of the task inside its tree.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TraceEvent {
    pub tick: u64,
    pub task: u32,
    pub class: Cow<'static, str>,
    pub status: TaskStatus,
}

impl TraceEvent {
    pub fn new(tick: u64, class: impl Into<Cow<'static, str>>) -> Self {
        Self {
            tick,
            task: 0,
            class: class.into(),
            status: TaskStatus::None,
        }
    }

    pub fn with_task(mut self, task: u32) -> Self {
        self.task = task;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }
}

pub trait TraceSink {
    fn emit(&mut self, event: TraceEvent);
}

#[derive(Debug, Default)]
pub struct VecTraceSink {
    pub events: Vec<TraceEvent>,
}

impl TraceSink for VecTraceSink {
    fn emit(&mut self, event: TraceEvent) {
        self.events.push(event);
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TraceLog {
    pub events: Vec<TraceEvent>,
}

impl TraceLog {
    pub fn push(&mut self, event: TraceEvent) {
        self.events.push(event);
    }
}

/// Sink that stays readable after being handed to a tree: clones share one
/// log.
#[derive(Debug, Clone, Default)]
pub struct TraceRecorder {
    log: Rc<RefCell<TraceLog>>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.log.borrow().events.clone()
    }

    pub fn len(&self) -> usize {
        self.log.borrow().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn take(&self) -> TraceLog {
        std::mem::take(&mut *self.log.borrow_mut())
    }
}

impl TraceSink for TraceRecorder {
    fn emit(&mut self, event: TraceEvent) {
        self.log.borrow_mut().push(event);
    }
}

/// Writes each event as one JSON object per line.
///
/// The first write error is kept (see [`JsonLinesSink::error`]) and later
/// events are dropped.
#[cfg(feature = "serde")]
#[derive(Debug)]
pub struct JsonLinesSink<W: std::io::Write> {
    writer: W,
    error: Option<std::io::Error>,
}

#[cfg(feature = "serde")]
impl<W: std::io::Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            error: None,
        }
    }

    /// First write failure, if any.
    pub fn error(&self) -> Option<&std::io::Error> {
        self.error.as_ref()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_event(&mut self, event: &TraceEvent) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")
    }
}

#[cfg(feature = "serde")]
impl<W: std::io::Write> TraceSink for JsonLinesSink<W> {
    fn emit(&mut self, event: TraceEvent) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = self.write_event(&event) {
            tracing::warn!(
                error = %err,
                tick = event.tick,
                "trace output failed, dropping further events"
            );
            self.error = Some(err);
        }
    }
}
