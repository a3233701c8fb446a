//! Assertion declarations and their extraction from method declarations
//!
//! A type author attaches assertions to a method through [`MethodDecl`]:
//!
//! - `require` / `require_else` - root and continuation preconditions
//! - `ensure` / `ensure_then` - root and continuation postconditions
//!
//! The root kind opens an override chain; every later override in the chain
//! must use the continuation kind. [`extract`] only reports what one
//! declaration carries. Ordering and discipline live in `chain` and `validate`.

use std::sync::Arc;

use crate::{Result, Value};

// ── Callables ─────────────────────────────────────────────

/// Outcome of one assertion: `Err` carries the human-readable failure
pub type Verdict = std::result::Result<(), String>;

/// `(receiver, arguments)`
pub type Precondition<S> = Arc<dyn Fn(&S, &[Value]) -> Verdict + Send + Sync>;

/// `(receiver, returned value, snapshot taken before the call, arguments)`
pub type Postcondition<S> = Arc<dyn Fn(&S, &Value, &S, &[Value]) -> Verdict + Send + Sync>;

/// `(receiver)`
pub type Invariant<S> = Arc<dyn Fn(&S) -> Verdict + Send + Sync>;

/// A raw method implementation operating on the core state
pub type MethodFn<S> = Arc<dyn Fn(&mut S, &[Value]) -> Result<Value> + Send + Sync>;

/// Fail the enclosing assertion with a formatted message unless `cond` holds.
///
/// ```
/// use covenant_core::{check, Verdict};
///
/// fn non_negative(x: i64) -> Verdict {
///     check!(x >= 0, "Size should be positive but is {}", x);
///     Ok(())
/// }
/// assert!(non_negative(-1).is_err());
/// ```
#[macro_export]
macro_rules! check {
    ($cond:expr, $($msg:tt)+) => {
        if !$cond {
            return ::std::result::Result::Err(::std::format!($($msg)+));
        }
    };
}

// ── Located ───────────────────────────────────────────────

/// A value tagged with the name of the type that introduced it
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Located<T> {
    pub value: T,
    pub origin: String,
}

impl<T> Located<T> {
    pub fn new(value: T, origin: impl Into<String>) -> Self {
        Located {
            value,
            origin: origin.into(),
        }
    }
}

// ── Kinds ─────────────────────────────────────────────────

/// Assertion family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum AssertionKind {
    Invariant,
    Precondition,
    Postcondition,
}

impl AssertionKind {
    /// Declaration keyword opening an override chain
    pub fn root_name(self) -> &'static str {
        match self {
            AssertionKind::Invariant => "invariant",
            AssertionKind::Precondition => "require",
            AssertionKind::Postcondition => "ensure",
        }
    }

    /// Declaration keyword extending an override chain
    pub fn continuation_name(self) -> &'static str {
        match self {
            AssertionKind::Invariant => "invariant",
            AssertionKind::Precondition => "require_else",
            AssertionKind::Postcondition => "ensure_then",
        }
    }
}

impl std::fmt::Display for AssertionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AssertionKind::Invariant => write!(f, "Invariant"),
            AssertionKind::Precondition => write!(f, "Precondition"),
            AssertionKind::Postcondition => write!(f, "Postcondition"),
        }
    }
}

/// Position of a declaration in its override chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ClauseKind {
    Root,
    Continuation,
}

/// What one type declared for one assertion family of one method
pub enum Declared<T> {
    Root(T),
    Continuation(T),
    Both { root: T, continuation: T },
}

impl<T> Declared<T> {
    fn from_pair(root: Option<T>, continuation: Option<T>) -> Option<Self> {
        match (root, continuation) {
            (None, None) => None,
            (Some(root), None) => Some(Declared::Root(root)),
            (None, Some(continuation)) => Some(Declared::Continuation(continuation)),
            (Some(root), Some(continuation)) => Some(Declared::Both { root, continuation }),
        }
    }

    pub fn kind(&self) -> Option<ClauseKind> {
        match self {
            Declared::Root(_) => Some(ClauseKind::Root),
            Declared::Continuation(_) => Some(ClauseKind::Continuation),
            Declared::Both { .. } => None,
        }
    }

    /// The declared assertions, root first
    pub fn into_values(self) -> Vec<T> {
        match self {
            Declared::Root(value) | Declared::Continuation(value) => vec![value],
            Declared::Both { root, continuation } => vec![root, continuation],
        }
    }
}

// ── Method declarations ───────────────────────────────────

/// One type's definition of one method: an optional implementation plus
/// its attached assertions. Without an implementation the method is abstract.
pub struct MethodDecl<S> {
    pub(crate) arity: usize,
    pub(crate) implementation: Option<MethodFn<S>>,
    pub(crate) require: Option<Precondition<S>>,
    pub(crate) require_else: Option<Precondition<S>>,
    pub(crate) ensure: Option<Postcondition<S>>,
    pub(crate) ensure_then: Option<Postcondition<S>>,
}

impl<S> MethodDecl<S> {
    /// A concrete method taking `arity` arguments
    pub fn implemented<F>(arity: usize, implementation: F) -> Self
    where
        F: Fn(&mut S, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        let mut decl = Self::deferred(arity);
        decl.implementation = Some(Arc::new(implementation));
        decl
    }

    /// An abstract method: declares assertions, leaves the body to subtypes
    pub fn deferred(arity: usize) -> Self {
        MethodDecl {
            arity,
            implementation: None,
            require: None,
            require_else: None,
            ensure: None,
            ensure_then: None,
        }
    }

    pub fn require<F>(mut self, f: F) -> Self
    where
        F: Fn(&S, &[Value]) -> Verdict + Send + Sync + 'static,
    {
        self.require = Some(Arc::new(f));
        self
    }

    pub fn require_else<F>(mut self, f: F) -> Self
    where
        F: Fn(&S, &[Value]) -> Verdict + Send + Sync + 'static,
    {
        self.require_else = Some(Arc::new(f));
        self
    }

    pub fn ensure<F>(mut self, f: F) -> Self
    where
        F: Fn(&S, &Value, &S, &[Value]) -> Verdict + Send + Sync + 'static,
    {
        self.ensure = Some(Arc::new(f));
        self
    }

    pub fn ensure_then<F>(mut self, f: F) -> Self
    where
        F: Fn(&S, &Value, &S, &[Value]) -> Verdict + Send + Sync + 'static,
    {
        self.ensure_then = Some(Arc::new(f));
        self
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn is_abstract(&self) -> bool {
        self.implementation.is_none()
    }
}

impl<S> Clone for MethodDecl<S> {
    fn clone(&self) -> Self {
        MethodDecl {
            arity: self.arity,
            implementation: self.implementation.clone(),
            require: self.require.clone(),
            require_else: self.require_else.clone(),
            ensure: self.ensure.clone(),
            ensure_then: self.ensure_then.clone(),
        }
    }
}

// ── Extraction ────────────────────────────────────────────

/// The precondition and postcondition declarations of one method definition
pub struct Declarations<S> {
    pub requires: Option<Declared<Precondition<S>>>,
    pub ensures: Option<Declared<Postcondition<S>>>,
}

/// Return the assertions attached to one method definition, tagged by kind
pub fn extract<S>(decl: &MethodDecl<S>) -> Declarations<S> {
    Declarations {
        requires: Declared::from_pair(decl.require.clone(), decl.require_else.clone()),
        ensures: Declared::from_pair(decl.ensure.clone(), decl.ensure_then.clone()),
    }
}
