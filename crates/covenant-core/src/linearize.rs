//! Hierarchy linearization (C3)
//!
//! Produces a deterministic total order over a type and all its ancestors:
//! the type first, every parent before its own ancestors, parents in
//! declaration order. The same input always yields the same order.
//!
//! The graph is read through a lookup closure (`name -> parent names`), so
//! the algorithm is independent of how types are stored. Each computed
//! order is cached; an ancestor's own order can be retrieved afterwards
//! without recomputation.

use std::collections::BTreeMap;

use crate::error::LinearizationError;

/// Incremental C3 linearizer over a parent lookup
pub struct Linearizer<F> {
    parents_of: F,
    cache: BTreeMap<String, Vec<String>>,
}

impl<F> Linearizer<F>
where
    F: Fn(&str) -> Option<Vec<String>>,
{
    pub fn new(parents_of: F) -> Self {
        Linearizer {
            parents_of,
            cache: BTreeMap::new(),
        }
    }

    /// Linearize `ty` (and, as a side product, every ancestor of it)
    pub fn linearize(&mut self, ty: &str) -> Result<Vec<String>, LinearizationError> {
        let mut stack = Vec::new();
        self.visit(ty, &mut stack)
    }

    /// Every order computed so far, keyed by type name
    pub fn into_orders(self) -> BTreeMap<String, Vec<String>> {
        self.cache
    }

    fn visit(
        &mut self,
        ty: &str,
        stack: &mut Vec<String>,
    ) -> Result<Vec<String>, LinearizationError> {
        if let Some(order) = self.cache.get(ty) {
            return Ok(order.clone());
        }
        if let Some(pos) = stack.iter().position(|t| t == ty) {
            let mut path = stack[pos..].to_vec();
            path.push(ty.to_string());
            return Err(LinearizationError::Cycle { path });
        }

        let parents = (self.parents_of)(ty).ok_or_else(|| LinearizationError::UnknownType {
            ty: ty.to_string(),
        })?;
        for (i, parent) in parents.iter().enumerate() {
            if parents[..i].contains(parent) {
                return Err(LinearizationError::DuplicateParent {
                    ty: ty.to_string(),
                    parent: parent.clone(),
                });
            }
        }

        stack.push(ty.to_string());
        let mut sequences = Vec::with_capacity(parents.len() + 1);
        for parent in &parents {
            sequences.push(self.visit(parent, stack)?);
        }
        stack.pop();
        sequences.push(parents);

        let mut order = vec![ty.to_string()];
        merge(ty, sequences, &mut order)?;
        self.cache.insert(ty.to_string(), order.clone());
        Ok(order)
    }
}

/// One-shot linearization of `ty`
pub fn linearize<F>(ty: &str, parents_of: F) -> Result<Vec<String>, LinearizationError>
where
    F: Fn(&str) -> Option<Vec<String>>,
{
    Linearizer::new(parents_of).linearize(ty)
}

/// C3 merge: repeatedly take the first head that appears in no tail
fn merge(
    ty: &str,
    mut sequences: Vec<Vec<String>>,
    out: &mut Vec<String>,
) -> Result<(), LinearizationError> {
    loop {
        sequences.retain(|s| !s.is_empty());
        if sequences.is_empty() {
            return Ok(());
        }

        let next = sequences
            .iter()
            .map(|s| &s[0])
            .find(|head| !sequences.iter().any(|s| s[1..].contains(*head)))
            .cloned();

        let Some(next) = next else {
            let mut pending: Vec<String> = Vec::new();
            for s in &sequences {
                if !pending.contains(&s[0]) {
                    pending.push(s[0].clone());
                }
            }
            return Err(LinearizationError::Inconsistent {
                ty: ty.to_string(),
                pending,
            });
        };

        for s in &mut sequences {
            if s[0] == next {
                s.remove(0);
            }
        }
        out.push(next);
    }
}
