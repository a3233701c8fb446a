//! Type definitions - the registration input supplied by a type's author
//!
//! A [`TypeDef`] names a type, its ordered parents, its method definitions
//! and an optional invariant. Parents are shared definitions
//! (`Arc<TypeDef<S>>`), so a hierarchy is assembled bottom-up from
//! definitions that already exist. Every type in one hierarchy shares the
//! core state type `S`.
//!
//! ```
//! use covenant_core::{check, MethodDecl, TypeDef, Value};
//!
//! #[derive(Clone)]
//! struct Counter(i64);
//!
//! let counter = TypeDef::new("Counter")
//!     .constructor(0, |_| Ok(Counter(0)))
//!     .invariant(|c: &Counter| {
//!         check!(c.0 >= 0, "negative count {}", c.0);
//!         Ok(())
//!     })
//!     .method(
//!         "incr",
//!         MethodDecl::implemented(0, |c: &mut Counter, _| {
//!             c.0 += 1;
//!             Ok(Value::Integer(c.0))
//!         }),
//!     );
//!
//! let ty = counter.register().unwrap();
//! let mut c = ty.instantiate(&[]).unwrap();
//! assert_eq!(c.call("incr", &[]).unwrap(), Value::Integer(1));
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::declaration::{Invariant, MethodDecl, Verdict};
use crate::{Result, Value};

/// Builds a fresh core state from constructor arguments
pub type Constructor<S> = Arc<dyn Fn(&[Value]) -> Result<S> + Send + Sync>;

/// Produces the independent "old" copy handed to postconditions
pub type SnapshotFn<S> = Arc<dyn Fn(&S) -> S + Send + Sync>;

/// A constructor together with its arity
pub struct ConstructorDecl<S> {
    pub(crate) arity: usize,
    pub(crate) build: Constructor<S>,
}

impl<S> Clone for ConstructorDecl<S> {
    fn clone(&self) -> Self {
        ConstructorDecl {
            arity: self.arity,
            build: Arc::clone(&self.build),
        }
    }
}

/// Declaration of one type, ready for registration
pub struct TypeDef<S> {
    pub(crate) name: String,
    pub(crate) parents: Vec<Arc<TypeDef<S>>>,
    pub(crate) methods: BTreeMap<String, MethodDecl<S>>,
    pub(crate) invariant: Option<Invariant<S>>,
    pub(crate) constructor: Option<ConstructorDecl<S>>,
    pub(crate) snapshot: Option<SnapshotFn<S>>,
    pub(crate) paranoid: bool,
}

impl<S> TypeDef<S> {
    pub fn new(name: impl Into<String>) -> Self {
        TypeDef {
            name: name.into(),
            parents: Vec::new(),
            methods: BTreeMap::new(),
            invariant: None,
            constructor: None,
            snapshot: None,
            paranoid: true,
        }
    }

    /// Append a parent; parents are linearized in the order they are added
    pub fn extends(mut self, parent: impl Into<Arc<TypeDef<S>>>) -> Self {
        self.parents.push(parent.into());
        self
    }

    /// Define (or override) a method on this type
    pub fn method(mut self, name: impl Into<String>, decl: MethodDecl<S>) -> Self {
        self.methods.insert(name.into(), decl);
        self
    }

    /// Declare a method without implementation; subtypes must provide one
    pub fn abstract_method(self, name: impl Into<String>, arity: usize) -> Self {
        self.method(name, MethodDecl::deferred(arity))
    }

    pub fn invariant<F>(mut self, f: F) -> Self
    where
        F: Fn(&S) -> Verdict + Send + Sync + 'static,
    {
        self.invariant = Some(Arc::new(f));
        self
    }

    pub fn constructor<F>(mut self, arity: usize, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<S> + Send + Sync + 'static,
    {
        self.constructor = Some(ConstructorDecl {
            arity,
            build: Arc::new(f),
        });
        self
    }

    /// Re-check invariants before every call as well as after (default `true`)
    pub fn paranoid(mut self, paranoid: bool) -> Self {
        self.paranoid = paranoid;
        self
    }

    /// Replace the default field-wise clone used for "old" snapshots
    pub fn snapshot_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&S) -> S + Send + Sync + 'static,
    {
        self.snapshot = Some(Arc::new(f));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_names(&self) -> Vec<String> {
        self.parents.iter().map(|p| p.name.clone()).collect()
    }

    /// Names of the methods this type defines itself
    pub fn own_methods(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn defines(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }
}

impl<S> Clone for TypeDef<S> {
    fn clone(&self) -> Self {
        TypeDef {
            name: self.name.clone(),
            parents: self.parents.clone(),
            methods: self.methods.clone(),
            invariant: self.invariant.clone(),
            constructor: self.constructor.clone(),
            snapshot: self.snapshot.clone(),
            paranoid: self.paranoid,
        }
    }
}

impl<S> std::fmt::Debug for TypeDef<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeDef")
            .field("name", &self.name)
            .field("parents", &self.parent_names())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("invariant", &self.invariant.is_some())
            .field("paranoid", &self.paranoid)
            .finish()
    }
}
