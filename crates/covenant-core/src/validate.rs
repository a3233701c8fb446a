//! Override discipline - root/continuation rules along a method chain
//!
//! Walking a chain from the base-most definer to the most-derived one, per
//! assertion family:
//!
//! 1. A type may declare the root kind or the continuation kind, not both.
//! 2. The first type that declares anything must use the root kind.
//! 3. Every type after that must use the continuation kind.
//!
//! Every definition in a chain must also agree on the method's arity.
//! Any failure aborts registration of the type.

use crate::declaration::{extract, AssertionKind, Declarations, Declared, Located, MethodDecl};
use crate::error::ContractDefinitionError;

/// Validate one method chain (nearest first, as built by `chain`)
///
/// Returns the extracted declarations, still nearest first, for the composer.
pub fn validate_method<S>(
    method: &str,
    chain: &[Located<&MethodDecl<S>>],
) -> Result<Vec<Located<Declarations<S>>>, ContractDefinitionError> {
    check_arity(method, chain)?;

    let declarations: Vec<Located<Declarations<S>>> = chain
        .iter()
        .map(|entry| Located::new(extract(entry.value), entry.origin.as_str()))
        .collect();

    validate_family(
        AssertionKind::Precondition,
        method,
        declarations
            .iter()
            .rev()
            .map(|d| (d.origin.as_str(), d.value.requires.as_ref())),
    )?;
    validate_family(
        AssertionKind::Postcondition,
        method,
        declarations
            .iter()
            .rev()
            .map(|d| (d.origin.as_str(), d.value.ensures.as_ref())),
    )?;

    Ok(declarations)
}

/// Enforce the root/continuation rules over `(origin, declaration)` pairs
/// given base-to-derived
pub fn validate_family<'d, T: 'd>(
    kind: AssertionKind,
    method: &str,
    base_to_derived: impl IntoIterator<Item = (&'d str, Option<&'d Declared<T>>)>,
) -> Result<(), ContractDefinitionError> {
    let mut root_seen = false;
    for (origin, declared) in base_to_derived {
        let fail = |build: fn(AssertionKind, String, String) -> ContractDefinitionError| {
            Err(build(kind, method.to_string(), origin.to_string()))
        };
        match declared {
            None => {}
            Some(Declared::Both { .. }) => return fail(both_kinds),
            Some(Declared::Root(_)) if root_seen => return fail(root_instead_of_continuation),
            Some(Declared::Root(_)) => root_seen = true,
            Some(Declared::Continuation(_)) if !root_seen => return fail(missing_root),
            Some(Declared::Continuation(_)) => {}
        }
    }
    Ok(())
}

fn check_arity<S>(
    method: &str,
    chain: &[Located<&MethodDecl<S>>],
) -> Result<(), ContractDefinitionError> {
    let Some(base) = chain.last() else {
        return Ok(());
    };
    let expected = base.value.arity;
    match chain.iter().find(|entry| entry.value.arity != expected) {
        Some(entry) => Err(ContractDefinitionError::ArityMismatch {
            method: method.to_string(),
            origin: entry.origin.clone(),
            expected,
            found: entry.value.arity,
        }),
        None => Ok(()),
    }
}

fn both_kinds(kind: AssertionKind, method: String, origin: String) -> ContractDefinitionError {
    ContractDefinitionError::BothKinds {
        kind,
        method,
        origin,
    }
}

fn root_instead_of_continuation(
    kind: AssertionKind,
    method: String,
    origin: String,
) -> ContractDefinitionError {
    ContractDefinitionError::RootInsteadOfContinuation {
        kind,
        method,
        origin,
    }
}

fn missing_root(kind: AssertionKind, method: String, origin: String) -> ContractDefinitionError {
    ContractDefinitionError::MissingRoot {
        kind,
        method,
        origin,
    }
}
