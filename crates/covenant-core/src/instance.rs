//! Instances and their dual dispatch views
//!
//! An [`Instance`] owns its core state and an active [`View`]. In the
//! contracted view every call goes through the interceptor; in the raw view
//! calls go straight to the most-derived implementation. Assertions and
//! implementations always receive the core itself (`&S` / `&mut S`), so a
//! method that calls into its own state never re-enters the interceptor.
//!
//! The interceptor flips an instance to its raw view for the duration of a
//! call through a `ViewGuard`, which puts the previous view back when it is
//! dropped, on success and failure alike.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::compose::MethodContract;
use crate::factory::{ContractedType, RawType, TypeRecord};
use crate::interceptor;
use crate::{Error, Result, Value};

/// Which dispatch surface an instance currently exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Raw,
    Contracted,
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::Raw => write!(f, "raw"),
            View::Contracted => write!(f, "contracted"),
        }
    }
}

/// One object of a registered type
pub struct Instance<S> {
    pub(crate) record: Arc<TypeRecord<S>>,
    pub(crate) core: S,
    view: View,
}

impl<S> Instance<S> {
    pub(crate) fn new(record: Arc<TypeRecord<S>>, core: S, view: View) -> Self {
        Instance { record, core, view }
    }

    /// Call `method`, checking contracts when the contracted view is active
    pub fn call(&mut self, method: &str, args: &[Value]) -> Result<Value> {
        match self.view {
            View::Contracted => interceptor::intercept(self, method, args),
            View::Raw => self.raw_call(method, args),
        }
    }

    /// Call `method` on the raw view regardless of the active one
    pub fn raw_call(&mut self, method: &str, args: &[Value]) -> Result<Value> {
        let record = Arc::clone(&self.record);
        let contract = resolve(&record, method, args)?;
        let implementation = implementation_of(&record, contract)?;
        (implementation)(&mut self.core, args)
    }

    pub fn view(&self) -> View {
        self.view
    }

    /// Switch the active view; returns the previous one
    ///
    /// Entering the contracted view from the raw one checks the invariants
    /// first, since raw calls may have left the state anywhere. On failure
    /// the instance stays raw.
    pub fn set_view(&mut self, view: View) -> Result<View> {
        if view == View::Contracted && self.view == View::Raw {
            interceptor::check_construction(&self.record, &self.core)?;
        }
        Ok(std::mem::replace(&mut self.view, view))
    }

    pub fn core(&self) -> &S {
        &self.core
    }

    /// Mutable access to the state, bypassing every contract
    pub fn core_mut(&mut self) -> &mut S {
        &mut self.core
    }

    pub fn into_core(self) -> S {
        self.core
    }

    pub fn type_name(&self) -> &str {
        self.record.name()
    }

    pub fn contracted_type(&self) -> ContractedType<S> {
        ContractedType {
            record: Arc::clone(&self.record),
        }
    }

    pub fn raw_type(&self) -> RawType<S> {
        RawType {
            record: Arc::clone(&self.record),
        }
    }

    /// Enter `view` until the returned guard is dropped
    pub(crate) fn enter(&mut self, view: View) -> ViewGuard<'_, S> {
        let previous = std::mem::replace(&mut self.view, view);
        ViewGuard {
            instance: self,
            previous,
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for Instance<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.type_name())
            .field("view", &self.view)
            .field("core", &self.core)
            .finish()
    }
}

/// Restores an instance's previous view when dropped
pub(crate) struct ViewGuard<'a, S> {
    instance: &'a mut Instance<S>,
    previous: View,
}

impl<S> Deref for ViewGuard<'_, S> {
    type Target = Instance<S>;

    fn deref(&self) -> &Self::Target {
        &*self.instance
    }
}

impl<S> DerefMut for ViewGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.instance
    }
}

impl<S> Drop for ViewGuard<'_, S> {
    fn drop(&mut self) {
        self.instance.view = self.previous;
    }
}

/// Look up `method` and check the argument count
pub(crate) fn resolve<'r, S>(
    record: &'r TypeRecord<S>,
    method: &str,
    args: &[Value],
) -> Result<&'r MethodContract<S>> {
    let contract = record
        .contract
        .method(method)
        .ok_or_else(|| Error::UnknownMethod {
            ty: record.name().to_string(),
            method: method.to_string(),
        })?;
    if args.len() != contract.arity() {
        return Err(Error::Arity {
            method: method.to_string(),
            expected: contract.arity(),
            found: args.len(),
        });
    }
    Ok(contract)
}

pub(crate) fn implementation_of<'r, S>(
    record: &TypeRecord<S>,
    contract: &'r MethodContract<S>,
) -> Result<&'r crate::declaration::MethodFn<S>> {
    contract
        .implementation
        .as_ref()
        .map(|located| &located.value)
        .ok_or_else(|| Error::AbstractType {
            ty: record.name().to_string(),
            methods: vec![contract.name().to_string()],
        })
}
