//! Reading documents into trees and writing trees back.

use bt_core::GlobalBlackboard;
use bt_runtime::nodes::Entry;
use bt_runtime::{
    BehaviorTree, BindMode, BindReport, NodeData, NodeRegistry, NodeType, NullResolver,
    ObjectResolver, TaskId, MAX_TREE_DEPTH,
};

use crate::document::{TaskDocument, TreeDocument};
use crate::error::{AssetError, Result};
use crate::loader::ResourceLoader;

/// Nesting limit for tree references when none is configured.
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Collaborators and mode for one read.
pub struct AssetContext<'a> {
    registry: &'a NodeRegistry,
    loader: &'a dyn ResourceLoader,
    resolver: &'a dyn ObjectResolver,
    globals: GlobalBlackboard,
    mode: BindMode,
    max_depth: usize,
}

impl<'a> AssetContext<'a> {
    /// Live mode, no object resolution, default nesting limit.
    pub fn new(
        registry: &'a NodeRegistry,
        loader: &'a dyn ResourceLoader,
        globals: GlobalBlackboard,
    ) -> Self {
        Self {
            registry,
            loader,
            resolver: &NullResolver,
            globals,
            mode: BindMode::Live,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_mode(mut self, mode: BindMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_resolver(mut self, resolver: &'a dyn ObjectResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn mode(&self) -> BindMode {
        self.mode
    }
}

/// A freshly read tree plus what the binding pass had to say about it.
#[derive(Debug)]
pub struct LoadedTree {
    pub tree: BehaviorTree,
    pub report: BindReport,
}

/// A stored tree document.
///
/// `dirty` means the in-memory document (or the tree read from it) has
/// changes the host has not persisted yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BehaviorTreeAsset {
    path: Option<String>,
    document: String,
    dirty: bool,
}

impl BehaviorTreeAsset {
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            path: None,
            document: document.into(),
            dirty: false,
        }
    }

    /// Loads the document at `path`. The path also anchors reference cycle
    /// detection.
    pub fn open(loader: &dyn ResourceLoader, path: &str) -> Result<Self> {
        let document = loader.load(path)?;
        Ok(Self {
            path: Some(path.to_string()),
            document,
            dirty: false,
        })
    }

    pub fn from_tree(tree: &mut BehaviorTree) -> Result<Self> {
        Ok(Self::new(serialize_tree(tree)?))
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Re-serializes `tree` into this asset. Returns whether the document
    /// changed.
    pub fn store(&mut self, tree: &mut BehaviorTree) -> Result<bool> {
        let document = serialize_tree(tree)?;
        if document == self.document {
            return Ok(false);
        }
        self.document = document;
        self.dirty = true;
        Ok(true)
    }

    /// Builds a tree from the document. Structural problems fail the whole
    /// read; unresolved references only add warnings.
    pub fn instantiate(&mut self, ctx: &AssetContext<'_>) -> Result<LoadedTree> {
        let document = TreeDocument::from_xml(&self.document)?;
        let mut builder = Builder {
            ctx,
            stack: self.path.iter().cloned().collect(),
            depth: 0,
            report: BindReport::default(),
        };
        let tree = builder.build(&document)?;
        let report = builder.report;

        if report.dirty {
            self.dirty = true;
        }
        tracing::info!(
            path = self.path.as_deref().unwrap_or("<memory>"),
            tasks = tree.len(),
            warnings = report.warnings.len(),
            "tree asset loaded"
        );
        Ok(LoadedTree { tree, report })
    }
}

/// Refreshes the declared names, clears stale variable names and writes the
/// document.
pub fn serialize_tree(tree: &mut BehaviorTree) -> Result<String> {
    tree.refresh_declared_variables();
    let report = tree.bind_variables(BindMode::EditTime, &NullResolver);
    if report.dirty {
        tracing::info!(cleared = ?report.cleared, "cleared stale variable names before saving");
    }
    document_of(tree)?.to_xml()
}

/// Snapshot of a tree as a document, without any cleanup.
pub fn document_of(tree: &BehaviorTree) -> Result<TreeDocument> {
    let apart_branches = tree
        .apart_roots()
        .into_iter()
        .map(|root| task_document(tree, root))
        .collect::<Result<Vec<_>>>()?;
    Ok(TreeDocument {
        params: tree.params().clone(),
        trunk: task_document(tree, tree.entry())?,
        apart_branches,
    })
}

fn task_document(tree: &BehaviorTree, id: TaskId) -> Result<TaskDocument> {
    let class_name = tree.class_name(id).unwrap_or_default().to_string();
    let json_error = |field| {
        let class = class_name.clone();
        move |source| AssetError::Json {
            class,
            field,
            source,
        }
    };

    let node_data = serde_json::to_value(tree.node_data(id).cloned().unwrap_or_default())
        .map_err(json_error("NodeData"))?;
    let task_params = tree
        .node(id)
        .and_then(|node| node.encode_params())
        .transpose()
        .map_err(json_error("TaskParams"))?;
    let children = tree
        .children(id)
        .iter()
        .map(|&child| task_document(tree, child))
        .collect::<Result<Vec<_>>>()?;

    Ok(TaskDocument {
        class_name,
        node_data,
        task_params,
        children,
    })
}

struct Builder<'c, 'a> {
    ctx: &'c AssetContext<'a>,
    /// Paths of the documents being read, outermost first.
    stack: Vec<String>,
    depth: usize,
    report: BindReport,
}

impl Builder<'_, '_> {
    fn build(&mut self, document: &TreeDocument) -> Result<BehaviorTree> {
        if document.trunk.class_name != Entry::CLASS_NAME {
            return Err(AssetError::TrunkRoot(document.trunk.class_name.clone()));
        }
        let mut tree = BehaviorTree::with_params(self.ctx.globals.clone(), document.params.clone());
        tree.declare_variables();

        let entry = tree.entry();
        self.fill(&mut tree, entry, &document.trunk)?;
        for branch in &document.apart_branches {
            self.spawn(&mut tree, branch)?;
        }
        Ok(tree)
    }

    fn spawn(&mut self, tree: &mut BehaviorTree, doc: &TaskDocument) -> Result<TaskId> {
        let node = self
            .ctx
            .registry
            .create(&doc.class_name)
            .ok_or_else(|| AssetError::UnknownClass(doc.class_name.clone()))?;
        let id = tree.add_task(node);
        self.fill(tree, id, doc)?;
        Ok(id)
    }

    fn fill(&mut self, tree: &mut BehaviorTree, id: TaskId, doc: &TaskDocument) -> Result<()> {
        let json_error = |field| {
            move |source| AssetError::Json {
                class: doc.class_name.clone(),
                field,
                source,
            }
        };

        let data: NodeData =
            serde_json::from_value(doc.node_data.clone()).map_err(json_error("NodeData"))?;
        tree.set_node_data(id, data);

        if let (Some(params), Some(node)) = (&doc.task_params, tree.node_mut(id)) {
            let decoded = node
                .decode_params(params.clone())
                .map_err(json_error("TaskParams"))?;
            if !decoded {
                tracing::debug!(class = %doc.class_name, "task has no parameters, TaskParams ignored");
            }
        }

        let report = tree.bind_task(id, self.ctx.mode, self.ctx.resolver);
        self.report.merge(report);
        if self.ctx.mode == BindMode::Live {
            self.resolve_reference(tree, id);
        }

        for child_doc in &doc.children {
            let child = self.spawn(tree, child_doc)?;
            if !tree.add_child(id, child) {
                let max = tree.max_children(id);
                if max.is_some_and(|max| tree.children(id).len() >= max) {
                    return Err(AssetError::TooManyChildren {
                        class: doc.class_name.clone(),
                        max: max.unwrap_or(0),
                    });
                }
                return Err(AssetError::NestingDepth(MAX_TREE_DEPTH));
            }
        }
        Ok(())
    }

    /// Loads the tree a reference node points at. Failures leave the node
    /// unresolved and are recorded as warnings.
    fn resolve_reference(&mut self, tree: &mut BehaviorTree, id: TaskId) {
        let path = match tree.node_mut(id).and_then(|node| node.external_reference()) {
            Some(reference) if !reference.path().is_empty() => reference.path().to_string(),
            _ => return,
        };

        match self.load_embedded(&path) {
            Ok(embedded) => {
                if let Some(reference) = tree.node_mut(id).and_then(|node| node.external_reference())
                {
                    reference.attach(embedded);
                }
            }
            Err(err) => {
                tracing::warn!(path = %path, error = %err, "tree reference left unresolved");
                self.report
                    .warnings
                    .push(format!("reference `{path}` unresolved: {err}"));
            }
        }
    }

    fn load_embedded(&mut self, path: &str) -> Result<BehaviorTree> {
        if self.stack.iter().any(|open| open == path) {
            return Err(AssetError::ReferenceCycle(path.to_string()));
        }
        if self.depth >= self.ctx.max_depth {
            return Err(AssetError::ReferenceDepth(self.ctx.max_depth));
        }
        let text = self.ctx.loader.load(path)?;
        let document = TreeDocument::from_xml(&text)?;

        self.stack.push(path.to_string());
        self.depth += 1;
        let result = self.build(&document);
        self.depth -= 1;
        self.stack.pop();

        tracing::debug!(path, ok = result.is_ok(), "embedded tree read");
        result
    }
}
