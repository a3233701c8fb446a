//! Contract composition - the immutable per-type contract
//!
//! For each method, `requires` and `ensures` hold every declared assertion
//! of the override chain in base-to-derived order. The interceptor reads
//! `requires` forwards (disjunction, first pass wins) and `ensures` backwards
//! (conjunction, most-derived first). Invariants are stored derived-to-base,
//! the type itself first.
//!
//! A composed contract is built once per registration and never mutated.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::chain::Hierarchy;
use crate::declaration::{Declared, Invariant, Located, MethodFn, Postcondition, Precondition};
use crate::validate::validate_method;
use crate::Result;

/// The composed contract of one method
pub struct MethodContract<S> {
    pub(crate) name: String,
    pub(crate) arity: usize,
    pub(crate) implementation: Option<Located<MethodFn<S>>>,
    pub(crate) requires: Vec<Located<Precondition<S>>>,
    pub(crate) ensures: Vec<Located<Postcondition<S>>>,
}

impl<S> MethodContract<S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn is_abstract(&self) -> bool {
        self.implementation.is_none()
    }

    /// Type owning the implementation that calls dispatch to
    pub fn implemented_by(&self) -> Option<&str> {
        self.implementation.as_ref().map(|i| i.origin.as_str())
    }

    /// Preconditions, base-to-derived
    pub fn requires(&self) -> &[Located<Precondition<S>>] {
        &self.requires
    }

    /// Postconditions, base-to-derived
    pub fn ensures(&self) -> &[Located<Postcondition<S>>] {
        &self.ensures
    }
}

/// The composed contract of one registered type
pub struct TypeContract<S> {
    pub(crate) name: String,
    pub(crate) linearization: Vec<String>,
    pub(crate) invariants: Vec<Located<Invariant<S>>>,
    pub(crate) methods: BTreeMap<String, MethodContract<S>>,
}

impl<S> TypeContract<S> {
    /// Validate and compose every method of the hierarchy's root type
    pub fn compose(hierarchy: &Hierarchy<'_, S>) -> Result<Self> {
        let root = hierarchy.root();
        let invariants = hierarchy.invariant_chain();
        debug!(
            type_name = %root.name(),
            invariants = ?origins(&invariants),
            "collected invariants"
        );

        let mut methods = BTreeMap::new();
        for name in hierarchy.method_names() {
            let chain = hierarchy.method_chain(name);
            let declarations = validate_method(name, &chain)?;

            let mut requires = Vec::new();
            let mut ensures = Vec::new();
            for located in declarations.into_iter().rev() {
                let origin = located.origin;
                let found = located.value;
                collect(&mut requires, found.requires, &origin);
                collect(&mut ensures, found.ensures, &origin);
            }

            let head = chain.first();
            let implementation = head.and_then(|entry| {
                entry
                    .value
                    .implementation
                    .clone()
                    .map(|f| Located::new(f, entry.origin.as_str()))
            });
            debug!(
                type_name = %root.name(),
                method = %name,
                chain = ?origins(&chain),
                requires = ?origins(&requires),
                ensures = ?origins(&ensures),
                "composed method contract"
            );

            methods.insert(
                name.to_string(),
                MethodContract {
                    name: name.to_string(),
                    arity: head.map(|entry| entry.value.arity).unwrap_or(0),
                    implementation,
                    requires,
                    ensures,
                },
            );
        }

        Ok(TypeContract {
            name: root.name().to_string(),
            linearization: hierarchy.linearization(root.name()).to_vec(),
            invariants,
            methods,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn linearization(&self) -> &[String] {
        &self.linearization
    }

    /// Invariants, derived-to-base
    pub fn invariants(&self) -> &[Located<Invariant<S>>] {
        &self.invariants
    }

    pub fn method(&self, name: &str) -> Option<&MethodContract<S>> {
        self.methods.get(name)
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodContract<S>> {
        self.methods.values()
    }

    /// Methods without an implementation anywhere in the chain head
    pub fn abstract_methods(&self) -> Vec<String> {
        self.methods
            .values()
            .filter(|m| m.is_abstract())
            .map(|m| m.name.clone())
            .collect()
    }

    /// Structural SHA-256 fingerprint of the composed contract
    ///
    /// Covers the linearization, every clause origin in evaluation storage
    /// order and every implementation owner. Two registrations of the same
    /// definition produce the same fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("type {}\n", self.name));
        hasher.update(format!("linearization {}\n", self.linearization.join(",")));
        hasher.update(format!("invariants {}\n", origins(&self.invariants).join(",")));
        for method in self.methods.values() {
            hasher.update(format!(
                "method {}/{} impl={} requires={} ensures={}\n",
                method.name,
                method.arity,
                method.implemented_by().unwrap_or("-"),
                origins(&method.requires).join(","),
                origins(&method.ensures).join(","),
            ));
        }
        format!("{:x}", hasher.finalize())
    }

    /// Serializable description of the composed contract
    pub fn summary(&self, paranoid: bool) -> ContractSummary {
        ContractSummary {
            type_name: self.name.clone(),
            paranoid,
            linearization: self.linearization.clone(),
            invariants: owned_origins(&self.invariants),
            methods: self
                .methods
                .values()
                .map(|m| MethodSummary {
                    name: m.name.clone(),
                    arity: m.arity,
                    implemented_by: m.implemented_by().map(str::to_string),
                    requires: owned_origins(&m.requires),
                    ensures: owned_origins(&m.ensures),
                })
                .collect(),
            fingerprint: self.fingerprint(),
        }
    }
}

/// Display form of a [`TypeContract`]
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ContractSummary {
    pub type_name: String,
    pub paranoid: bool,
    pub linearization: Vec<String>,
    /// Invariant origins, derived-to-base
    pub invariants: Vec<String>,
    pub methods: Vec<MethodSummary>,
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MethodSummary {
    pub name: String,
    pub arity: usize,
    pub implemented_by: Option<String>,
    /// Precondition origins, base-to-derived
    pub requires: Vec<String>,
    /// Postcondition origins, base-to-derived
    pub ensures: Vec<String>,
}

fn collect<T>(out: &mut Vec<Located<T>>, declared: Option<Declared<T>>, origin: &str) {
    if let Some(declared) = declared {
        out.extend(
            declared
                .into_values()
                .into_iter()
                .map(|value| Located::new(value, origin)),
        );
    }
}

fn origins<T>(located: &[Located<T>]) -> Vec<&str> {
    located.iter().map(|l| l.origin.as_str()).collect()
}

fn owned_origins<T>(located: &[Located<T>]) -> Vec<String> {
    located.iter().map(|l| l.origin.clone()).collect()
}
