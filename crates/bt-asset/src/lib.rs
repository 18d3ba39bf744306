//! Persistence for behavior trees.
//!
//! A tree is stored as one document string: an XML skeleton (`BehaviorTree`,
//! `Trunk`, `ApartBranches`, nested `Task` elements) whose attributes carry
//! JSON blobs for tree parameters, editor data and task parameters.

#![forbid(unsafe_code)]

pub mod asset;
pub mod document;
pub mod error;
pub mod loader;

pub use asset::{document_of, serialize_tree, AssetContext, BehaviorTreeAsset, LoadedTree};
pub use document::{TaskDocument, TreeDocument, MAX_DOCUMENT_DEPTH};
pub use error::{AssetError, LoadError, Result};
pub use loader::{FsLoader, MemoryLoader, ResourceLoader};
