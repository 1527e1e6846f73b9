// error.rs — Error model for the rearrangement pass
//
// Every failure aborts the current top-level invocation. Variants carry the
// node, function, and slot involved so a failure can be diagnosed from the
// message alone.

use thiserror::Error;

/// Coarse classification of a `RearrangeError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required attribute or structural property of the IR is missing or
    /// has the wrong shape.
    MalformedIr,
    /// The IR is well formed but uses a pattern the pass cannot rewrite
    /// without changing program semantics.
    UnsupportedPattern,
    /// The pass violated one of its own invariants.
    InternalConsistency,
    /// The function library rejected a lookup or insertion.
    Library,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RearrangeError {
    #[error("node '{node}' is missing attribute '{attr}'")]
    MissingAttr { node: String, attr: String },

    #[error("attribute '{attr}' of node '{node}' is {found}, expected {expected}")]
    AttrType {
        node: String,
        attr: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("malformed IR at '{context}': {reason}")]
    MalformedIr { context: String, reason: String },

    #[error("resource return {retval} of '{function}' is produced by '{source_node}', not directly by an argument")]
    ResourceRetvalNotFromArg {
        function: String,
        retval: usize,
        source_node: String,
    },

    #[error("loop '{node}' returns resource {retval} from argument {arg}; resources must be returned at the index they were received")]
    LoopResourceMismatch {
        node: String,
        retval: usize,
        arg: usize,
    },

    #[error("loop '{node}': resource return {retval} traces to '{found}' instead of an argument")]
    LoopResourceUntraceable {
        node: String,
        retval: usize,
        found: String,
    },

    #[error("conditional '{node}': branches disagree on return {retval}")]
    BranchDisagreement { node: String, retval: usize },

    #[error("function '{key}' references itself through its own call graph")]
    RecursiveFunction { key: String },

    #[error("node '{node}' has no input edge at slot {slot}")]
    MissingInputEdge { node: String, slot: usize },

    #[error("index {index} is outside mapping of length {len}")]
    MappingOutOfRange { index: usize, len: usize },

    #[error("function '{name}' not found in library")]
    FunctionNotFound { name: String },

    #[error("function '{name}' already exists in library with a different definition")]
    DuplicateFunction { name: String },

    #[error("in function '{function}': {source}")]
    InFunction {
        function: String,
        #[source]
        source: Box<RearrangeError>,
    },
}

impl RearrangeError {
    pub fn malformed(context: impl Into<String>, reason: impl Into<String>) -> Self {
        RearrangeError::MalformedIr {
            context: context.into(),
            reason: reason.into(),
        }
    }

    /// Attach the name of the function body the error escaped from.
    pub fn in_function(self, function: impl Into<String>) -> Self {
        RearrangeError::InFunction {
            function: function.into(),
            source: Box::new(self),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RearrangeError::MissingAttr { .. }
            | RearrangeError::AttrType { .. }
            | RearrangeError::MalformedIr { .. } => ErrorKind::MalformedIr,
            RearrangeError::ResourceRetvalNotFromArg { .. }
            | RearrangeError::LoopResourceMismatch { .. }
            | RearrangeError::LoopResourceUntraceable { .. }
            | RearrangeError::BranchDisagreement { .. }
            | RearrangeError::RecursiveFunction { .. } => ErrorKind::UnsupportedPattern,
            RearrangeError::MissingInputEdge { .. } | RearrangeError::MappingOutOfRange { .. } => {
                ErrorKind::InternalConsistency
            }
            RearrangeError::FunctionNotFound { .. } | RearrangeError::DuplicateFunction { .. } => {
                ErrorKind::Library
            }
            RearrangeError::InFunction { source, .. } => source.kind(),
        }
    }

    /// The innermost error, with all function context stripped.
    pub fn root(&self) -> &RearrangeError {
        match self {
            RearrangeError::InFunction { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, RearrangeError>;
