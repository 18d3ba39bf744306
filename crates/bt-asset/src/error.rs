use thiserror::Error;

/// Failure to fetch a referenced document.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("resource `{0}` not found")]
    NotFound(String),

    #[error("resource path `{0}` leaves the asset root")]
    OutsideRoot(String),

    #[error("failed to read `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Structural problems with a tree document. Any of these aborts the read and
/// no tree is produced.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("malformed tree document: {0}")]
    Xml(String),

    #[error("missing <{0}> element")]
    MissingElement(&'static str),

    #[error("more than one <{0}> element")]
    DuplicateElement(&'static str),

    #[error("tasks nest deeper than {0} levels")]
    NestingDepth(usize),

    #[error("unexpected <{found}> element, expected <{expected}>")]
    UnexpectedElement {
        expected: &'static str,
        found: String,
    },

    #[error("<{element}> has no {attribute} attribute")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("unknown task class `{0}`")]
    UnknownClass(String),

    #[error("invalid {field} on `{class}`: {source}")]
    Json {
        class: String,
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid BTParams: {0}")]
    TreeParams(#[source] serde_json::Error),

    #[error("<Trunk> must hold exactly one <Task>, found {0}")]
    TrunkShape(usize),

    #[error("trunk root must be `Entry`, found `{0}`")]
    TrunkRoot(String),

    #[error("`{class}` accepts at most {max} children")]
    TooManyChildren { class: String, max: usize },

    #[error("reference cycle through `{0}`")]
    ReferenceCycle(String),

    #[error("tree references nest deeper than {0} levels")]
    ReferenceDepth(usize),

    #[error(transparent)]
    Load(#[from] LoadError),
}

pub type Result<T> = std::result::Result<T, AssetError>;

pub(crate) fn xml_error(err: impl std::fmt::Display) -> AssetError {
    AssetError::Xml(err.to_string())
}
