//! Tooling primitives for the behavior tree runtime.
//!
//! Engine-agnostic and lightweight. Inspectors and editors should build on the
//! plain event data recorded here.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod trace;

#[cfg(feature = "serde")]
pub use trace::JsonLinesSink;
pub use trace::{TraceEvent, TraceLog, TraceRecorder, TraceSink, VecTraceSink};
