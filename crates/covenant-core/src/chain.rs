//! Override chains - which ancestors contribute to a method or invariant
//!
//! A [`Hierarchy`] indexes every definition reachable from one type and
//! holds the linearization of each of them.
//!
//! - Method chain for `m` on `T`: `T`'s own definition (if any), then the
//!   first definer of `m` after `T` in `T`'s linearization, then the first
//!   definer after *that* type in its own linearization, and so on.
//!   Nearest first.
//! - Invariant chain for `T`: every type in `T`'s linearization that
//!   declares its own invariant, `T` first. Types without one are skipped.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::declaration::{Invariant, Located, MethodDecl};
use crate::error::LinearizationError;
use crate::linearize::Linearizer;
use crate::typedef::TypeDef;

pub struct Hierarchy<'a, S> {
    root: &'a TypeDef<S>,
    defs: BTreeMap<&'a str, &'a TypeDef<S>>,
    orders: BTreeMap<String, Vec<String>>,
}

impl<'a, S> Hierarchy<'a, S> {
    /// Index all definitions reachable from `root` and linearize them
    pub fn resolve(root: &'a TypeDef<S>) -> Result<Self, LinearizationError> {
        let mut defs = BTreeMap::new();
        collect(root, &mut defs)?;

        let orders = {
            let mut linearizer =
                Linearizer::new(|name: &str| defs.get(name).map(|d| d.parent_names()));
            linearizer.linearize(&root.name)?;
            linearizer.into_orders()
        };
        debug!(
            type_name = %root.name,
            linearization = ?orders.get(&root.name),
            "linearized hierarchy"
        );

        Ok(Hierarchy { root, defs, orders })
    }

    pub fn root(&self) -> &'a TypeDef<S> {
        self.root
    }

    pub fn definition(&self, ty: &str) -> Option<&'a TypeDef<S>> {
        self.defs.get(ty).copied()
    }

    /// Linearization of `ty` (the type itself first)
    pub fn linearization(&self, ty: &str) -> &[String] {
        self.orders.get(ty).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Types of `ty`'s linearization, in order
    fn ancestry(&self, ty: &str) -> impl Iterator<Item = &'a TypeDef<S>> + '_ {
        self.linearization(ty)
            .iter()
            .filter_map(move |name| self.definition(name))
    }

    /// Every method name defined anywhere in the root's linearization
    pub fn method_names(&self) -> BTreeSet<&'a str> {
        self.ancestry(&self.root.name)
            .flat_map(|def| def.own_methods())
            .collect()
    }

    /// Override chain of `method` on the root type, nearest first
    pub fn method_chain(&self, method: &str) -> Vec<Located<&'a MethodDecl<S>>> {
        let mut chain = Vec::new();
        if let Some(decl) = self.root.methods.get(method) {
            chain.push(Located::new(decl, self.root.name.as_str()));
        }

        let mut owner = self.root.name.as_str();
        while let Some(def) = self.first_definer_after(owner, method) {
            if let Some(decl) = def.methods.get(method) {
                chain.push(Located::new(decl, def.name.as_str()));
            }
            owner = def.name.as_str();
        }
        chain
    }

    /// Invariants along the root's linearization, root first
    pub fn invariant_chain(&self) -> Vec<Located<Invariant<S>>> {
        self.ancestry(&self.root.name)
            .filter_map(|def| {
                def.invariant
                    .clone()
                    .map(|inv| Located::new(inv, def.name.as_str()))
            })
            .collect()
    }

    /// First value `pick` finds along the root's linearization
    pub fn nearest<T>(&self, pick: impl Fn(&'a TypeDef<S>) -> Option<T>) -> Option<Located<T>> {
        self.ancestry(&self.root.name)
            .find_map(|def| pick(def).map(|value| Located::new(value, def.name.as_str())))
    }

    fn first_definer_after(&self, owner: &str, method: &str) -> Option<&'a TypeDef<S>> {
        self.ancestry(owner).skip(1).find(|def| def.defines(method))
    }
}

/// Index definitions by name; one name must mean one definition
fn collect<'a, S>(
    def: &'a TypeDef<S>,
    defs: &mut BTreeMap<&'a str, &'a TypeDef<S>>,
) -> Result<(), LinearizationError> {
    match defs.get(def.name.as_str()) {
        Some(seen) if std::ptr::eq(*seen, def) => return Ok(()),
        Some(_) => {
            return Err(LinearizationError::ConflictingDefinition {
                ty: def.name.clone(),
            })
        }
        None => {}
    }
    defs.insert(def.name.as_str(), def);
    for parent in &def.parents {
        collect(parent.as_ref(), defs)?;
    }
    Ok(())
}
