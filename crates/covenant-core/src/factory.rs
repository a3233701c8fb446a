//! Type factory - registration and the raw/contracted type linkage
//!
//! Registration runs the whole pipeline synchronously:
//! linearize → build chains → validate → compose. It either yields a
//! usable type or fails with a `LinearizationError` /
//! `ContractDefinitionError`; nothing is partially registered.
//!
//! One registration produces one shared `TypeRecord`. [`ContractedType`]
//! and [`RawType`] are two handles over that record, so the link between the
//! two views is fixed at registration and never re-pointed. Registering the
//! same definition twice yields two independent records.

use std::sync::Arc;

use tracing::{debug, info};

use crate::chain::Hierarchy;
use crate::compose::{ContractSummary, TypeContract};
use crate::declaration::Located;
use crate::instance::{Instance, View};
use crate::interceptor;
use crate::typedef::{ConstructorDecl, SnapshotFn, TypeDef};
use crate::{Error, Result, Value};

/// Everything one registration produced
pub(crate) struct TypeRecord<S> {
    pub(crate) contract: TypeContract<S>,
    pub(crate) constructor: Option<Located<ConstructorDecl<S>>>,
    pub(crate) snapshot: SnapshotFn<S>,
    pub(crate) paranoid: bool,
}

impl<S> TypeRecord<S> {
    pub(crate) fn name(&self) -> &str {
        self.contract.name()
    }

    fn construct(&self, args: &[Value]) -> Result<S> {
        let constructor = self.constructor.as_ref().ok_or_else(|| Error::NoConstructor {
            ty: self.name().to_string(),
        })?;
        let abstract_methods = self.contract.abstract_methods();
        if !abstract_methods.is_empty() {
            return Err(Error::AbstractType {
                ty: self.name().to_string(),
                methods: abstract_methods,
            });
        }
        if args.len() != constructor.value.arity {
            return Err(Error::Arity {
                method: format!("{}::new", self.name()),
                expected: constructor.value.arity,
                found: args.len(),
            });
        }
        (constructor.value.build)(args)
    }
}

impl<S: Clone + 'static> TypeDef<S> {
    /// Register this definition, producing its contracted type
    pub fn register(&self) -> Result<ContractedType<S>> {
        info!(type_name = %self.name, "registering type");
        let hierarchy = Hierarchy::resolve(self)?;
        let contract = TypeContract::compose(&hierarchy)?;

        let constructor = hierarchy.nearest(|def| def.constructor.clone());
        let snapshot: SnapshotFn<S> = match hierarchy.nearest(|def| def.snapshot.clone()) {
            Some(found) => found.value,
            None => Arc::new(S::clone),
        };
        debug!(
            type_name = %self.name,
            constructor = ?constructor.as_ref().map(|c| c.origin.as_str()),
            paranoid = self.paranoid,
            "type registered"
        );

        Ok(ContractedType {
            record: Arc::new(TypeRecord {
                contract,
                constructor,
                snapshot,
                paranoid: self.paranoid,
            }),
        })
    }
}

/// A registered type whose instances check their contracts on every call
pub struct ContractedType<S> {
    pub(crate) record: Arc<TypeRecord<S>>,
}

/// The same registered type, dispatching straight to implementations
pub struct RawType<S> {
    pub(crate) record: Arc<TypeRecord<S>>,
}

impl<S> ContractedType<S> {
    pub fn name(&self) -> &str {
        self.record.name()
    }

    pub fn paranoid(&self) -> bool {
        self.record.paranoid
    }

    pub fn contract(&self) -> &TypeContract<S> {
        &self.record.contract
    }

    /// The raw counterpart of this type
    pub fn raw(&self) -> RawType<S> {
        RawType {
            record: Arc::clone(&self.record),
        }
    }

    /// Construct an instance; invariants are checked once the constructor ran
    pub fn instantiate(&self, args: &[Value]) -> Result<Instance<S>> {
        let core = self.record.construct(args)?;
        interceptor::check_construction(&self.record, &core)?;
        Ok(Instance::new(Arc::clone(&self.record), core, View::Contracted))
    }

    pub fn fingerprint(&self) -> String {
        self.record.contract.fingerprint()
    }

    pub fn summary(&self) -> ContractSummary {
        self.record.contract.summary(self.record.paranoid)
    }

    /// True when both handles come from one registration
    pub fn same_registration(&self, other: &ContractedType<S>) -> bool {
        Arc::ptr_eq(&self.record, &other.record)
    }
}

impl<S> RawType<S> {
    pub fn name(&self) -> &str {
        self.record.name()
    }

    /// The contracted counterpart of this type
    pub fn contracted(&self) -> ContractedType<S> {
        ContractedType {
            record: Arc::clone(&self.record),
        }
    }

    /// Construct an instance that skips every contract check
    pub fn instantiate(&self, args: &[Value]) -> Result<Instance<S>> {
        let core = self.record.construct(args)?;
        Ok(Instance::new(Arc::clone(&self.record), core, View::Raw))
    }
}

impl<S> Clone for ContractedType<S> {
    fn clone(&self) -> Self {
        ContractedType {
            record: Arc::clone(&self.record),
        }
    }
}

impl<S> Clone for RawType<S> {
    fn clone(&self) -> Self {
        RawType {
            record: Arc::clone(&self.record),
        }
    }
}

impl<S> std::fmt::Debug for ContractedType<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractedType")
            .field("name", &self.name())
            .field("paranoid", &self.paranoid())
            .finish()
    }
}

impl<S> std::fmt::Debug for RawType<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawType").field("name", &self.name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check;
    use crate::declaration::MethodDecl;

    #[derive(Clone, Debug, PartialEq)]
    struct Counter {
        count: i64,
    }

    fn counter() -> TypeDef<Counter> {
        TypeDef::new("Counter")
            .constructor(1, |args| {
                Ok(Counter {
                    count: args[0].as_integer().unwrap_or(0),
                })
            })
            .invariant(|c: &Counter| {
                check!(c.count >= 0, "count should be positive but is {}", c.count);
                Ok(())
            })
            .method(
                "incr",
                MethodDecl::implemented(0, |c: &mut Counter, _| {
                    c.count += 1;
                    Ok(Value::Integer(c.count))
                }),
            )
    }

    #[test]
    fn test_views_are_linked() {
        let contracted = counter().register().unwrap();
        let raw = contracted.raw();
        assert_eq!(raw.name(), "Counter");
        assert!(raw.contracted().same_registration(&contracted));
    }

    #[test]
    fn test_registering_twice_gives_independent_types() {
        let def = counter();
        let first = def.register().unwrap();
        let second = def.register().unwrap();
        assert!(!first.same_registration(&second));
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn test_construction_checks_invariants() {
        let ty = counter().register().unwrap();
        let err = ty.instantiate(&[Value::Integer(-1)]).unwrap_err();
        let violation = err.violation().expect("invariant violation");
        assert_eq!(violation.method, None);
        assert_eq!(violation.origin, "Counter");

        // raw construction skips the check
        let raw = ty.raw().instantiate(&[Value::Integer(-1)]).unwrap();
        assert_eq!(raw.core().count, -1);
    }

    #[test]
    fn test_construction_ignores_paranoid_flag() {
        let ty = counter().paranoid(false).register().unwrap();
        assert!(ty.instantiate(&[Value::Integer(-5)]).is_err());
    }

    #[test]
    fn test_constructor_arity_checked() {
        let ty = counter().register().unwrap();
        assert!(matches!(
            ty.instantiate(&[]),
            Err(Error::Arity { expected: 1, found: 0, .. })
        ));
    }

    #[test]
    fn test_constructor_inherited_from_parent() {
        let base = Arc::new(counter());
        let derived = TypeDef::new("Derived").extends(base).register().unwrap();
        let instance = derived.instantiate(&[Value::Integer(3)]).unwrap();
        assert_eq!(instance.core(), &Counter { count: 3 });
    }

    #[test]
    fn test_missing_constructor() {
        let ty = TypeDef::<Counter>::new("Bare").register().unwrap();
        assert_eq!(
            ty.instantiate(&[]).unwrap_err(),
            Error::NoConstructor { ty: "Bare".into() }
        );
    }

    #[test]
    fn test_abstract_type_cannot_be_instantiated() {
        let ty = counter()
            .method("decr", MethodDecl::deferred(0))
            .register()
            .unwrap();
        assert_eq!(
            ty.instantiate(&[Value::Integer(0)]).unwrap_err(),
            Error::AbstractType {
                ty: "Counter".into(),
                methods: vec!["decr".into()],
            }
        );
    }
}
