//! Error types for the contract engine
//!
//! All fallible operations return `Result<T, Error>`.
//! Registration-time failures (`LinearizationError`, `ContractDefinitionError`)
//! abort registration of the offending type. Call-time failures
//! (`ContractViolation`) surface to the caller of the contracted method.

use thiserror::Error;

use crate::declaration::{AssertionKind, Located};

/// Ancestor structure that cannot be linearized
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinearizationError {
    /// A type reaches itself through its parents
    #[error("Inheritance cycle: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    /// The same parent appears twice in one parent list
    #[error("Type '{ty}' lists parent '{parent}' more than once")]
    DuplicateParent { ty: String, parent: String },

    /// The C3 merge cannot make progress
    #[error(
        "Cannot create a consistent linearization for '{ty}' (pending: {})",
        .pending.join(", ")
    )]
    Inconsistent { ty: String, pending: Vec<String> },

    /// A parent the hierarchy does not know about
    #[error("Unknown type '{ty}'")]
    UnknownType { ty: String },

    /// Two distinct definitions share one name inside a hierarchy
    #[error("Conflicting definitions named '{ty}' in one hierarchy")]
    ConflictingDefinition { ty: String },
}

/// Misuse of root/continuation declarations along an override chain
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractDefinitionError {
    /// A continuation was declared before any ancestor declared a root
    #[error("Missing {} for '{method}' in {origin}", .kind.root_name())]
    MissingRoot {
        kind: AssertionKind,
        method: String,
        origin: String,
    },

    /// A root was declared although an ancestor already declared one
    #[error(
        "Use {} instead of {} for '{method}' in {origin}",
        .kind.continuation_name(),
        .kind.root_name()
    )]
    RootInsteadOfContinuation {
        kind: AssertionKind,
        method: String,
        origin: String,
    },

    /// One type declared both kinds for the same method
    #[error(
        "Use either {} or {} for '{method}' in {origin}, not both",
        .kind.root_name(),
        .kind.continuation_name()
    )]
    BothKinds {
        kind: AssertionKind,
        method: String,
        origin: String,
    },

    /// An override changes the number of arguments of the method
    #[error("Method '{method}' in {origin} takes {found} argument(s), ancestors take {expected}")]
    ArityMismatch {
        method: String,
        origin: String,
        expected: usize,
        found: usize,
    },
}

/// A failed invariant, precondition or postcondition
#[derive(Error, Debug, Clone, PartialEq, serde::Serialize)]
#[error(
    "{kind} violated in {ty}{}: {message} (declared by {origin})",
    .method.as_ref().map(|m| format!(".{}", m)).unwrap_or_default()
)]
pub struct ContractViolation {
    /// Which assertion family failed
    pub kind: AssertionKind,
    /// The registered type whose instance was called
    pub ty: String,
    /// The called method, `None` during construction
    pub method: Option<String>,
    /// The type that declared the failing clause
    pub origin: String,
    /// The clause's own failure message
    pub message: String,
    /// Ancestor preconditions that also rejected the call, base first
    pub rejected: Vec<Located<String>>,
}

impl ContractViolation {
    pub(crate) fn new(
        kind: AssertionKind,
        ty: &str,
        method: Option<&str>,
        failure: Located<String>,
    ) -> Self {
        ContractViolation {
            kind,
            ty: ty.to_string(),
            method: method.map(str::to_string),
            origin: failure.origin,
            message: failure.value,
            rejected: Vec::new(),
        }
    }

    pub(crate) fn with_rejected(mut self, rejected: Vec<Located<String>>) -> Self {
        self.rejected = rejected;
        self
    }
}

/// Covenant error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Bad ancestor structure, raised at registration
    #[error("Linearization error: {0}")]
    Linearization(#[from] LinearizationError),

    /// Root/continuation misuse, raised at registration
    #[error("Contract definition error: {0}")]
    Definition(#[from] ContractDefinitionError),

    /// Assertion failure, raised at call time
    #[error("Contract violation: {0}")]
    Violation(#[from] ContractViolation),

    /// Call to a method the type does not have
    #[error("Type '{ty}' has no method '{method}'")]
    UnknownMethod { ty: String, method: String },

    /// Call with the wrong number of arguments
    #[error("Method '{method}' takes {expected} argument(s), {found} given")]
    Arity {
        method: String,
        expected: usize,
        found: usize,
    },

    /// Instantiation of a type that still has abstract methods
    #[error("Cannot instantiate abstract type '{ty}' (abstract: {})", .methods.join(", "))]
    AbstractType { ty: String, methods: Vec<String> },

    /// Instantiation of a type with no constructor in its hierarchy
    #[error("Type '{ty}' has no constructor")]
    NoConstructor { ty: String },

    /// Failure reported by a method implementation itself
    #[error("Execution error: {0}")]
    Execution(String),
}

impl Error {
    /// The contract violation carried by this error, if any
    pub fn violation(&self) -> Option<&ContractViolation> {
        match self {
            Error::Violation(v) => Some(v),
            _ => None,
        }
    }

    /// True for registration-time errors
    pub fn is_registration_error(&self) -> bool {
        matches!(self, Error::Linearization(_) | Error::Definition(_))
    }
}

/// Result type alias for Covenant operations
pub type Result<T> = std::result::Result<T, Error>;
