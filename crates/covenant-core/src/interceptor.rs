//! Call interceptor - the per-call contract state machine
//!
//! # Architecture
//!
//! ```text
//! Entered ──► PreChecked ──► Invoked ──► PostChecked ──► Exited
//!    │            │             │             │
//!    └────────────┴─────────────┴─────────────┴──► failed (view restored)
//! ```
//!
//! 1. Entered: switch to the raw view, snapshot the state ("old").
//! 2. Invariants, only for paranoid types.
//! 3. Preconditions, base-to-derived; the first that passes admits the call.
//! 4. Invoke the most-derived implementation.
//! 5. Postconditions, derived-to-base; all must pass.
//! 6. Invariants, always.
//! 7. Exited: restore the contracted view, return the value.
//!
//! Invariants are evaluated base-to-derived. Every step is terminal on its
//! first failure; there are no retries.

use std::fmt;
use std::sync::Arc;

use tracing::{error, info, trace};

use crate::compose::MethodContract;
use crate::declaration::{AssertionKind, Located};
use crate::error::ContractViolation;
use crate::factory::TypeRecord;
use crate::instance::{implementation_of, resolve, Instance, View};
use crate::{Result, Value};

/// Progress of one intercepted call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Entered,
    PreChecked,
    Invoked,
    PostChecked,
    Exited,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Entered => "entered",
            Phase::PreChecked => "pre-checked",
            Phase::Invoked => "invoked",
            Phase::PostChecked => "post-checked",
            Phase::Exited => "exited",
        };
        f.write_str(name)
    }
}

/// Run one contracted call of `method` on `instance`
pub(crate) fn intercept<S>(
    instance: &mut Instance<S>,
    method: &str,
    args: &[Value],
) -> Result<Value> {
    let record = Arc::clone(&instance.record);
    let contract = resolve(&record, method, args)?;
    let implementation = implementation_of(&record, contract)?;
    info!(type_name = %record.name(), method, "contracted call");

    let mut guard = instance.enter(View::Raw);
    let old = (record.snapshot)(&guard.core);
    phase(&record, method, Phase::Entered);

    if record.paranoid {
        check_invariants(&record, &guard.core, Some(method))?;
    }
    check_requires(&record, contract, &guard.core, args)?;
    phase(&record, method, Phase::PreChecked);

    let ret = (implementation)(&mut guard.core, args)?;
    phase(&record, method, Phase::Invoked);

    check_ensures(&record, contract, &guard.core, &ret, &old, args)?;
    check_invariants(&record, &guard.core, Some(method))?;
    phase(&record, method, Phase::PostChecked);

    drop(guard);
    phase(&record, method, Phase::Exited);
    Ok(ret)
}

/// Invariant check run once a constructor has built the state
pub(crate) fn check_construction<S>(record: &TypeRecord<S>, core: &S) -> Result<()> {
    check_invariants(record, core, None)
}

fn phase<S>(record: &TypeRecord<S>, method: &str, phase: Phase) {
    trace!(type_name = %record.name(), method, %phase, "call phase");
}

fn check_invariants<S>(record: &TypeRecord<S>, core: &S, method: Option<&str>) -> Result<()> {
    for invariant in record.contract.invariants().iter().rev() {
        let outcome = (invariant.value)(core);
        trace!(origin = %invariant.origin, passed = outcome.is_ok(), "invariant");
        if let Err(message) = outcome {
            return Err(violation(
                record,
                AssertionKind::Invariant,
                method,
                Located::new(message, invariant.origin.as_str()),
            ));
        }
    }
    Ok(())
}

fn check_requires<S>(
    record: &TypeRecord<S>,
    contract: &MethodContract<S>,
    core: &S,
    args: &[Value],
) -> Result<()> {
    let mut rejected = Vec::new();
    for pre in contract.requires() {
        match (pre.value)(core, args) {
            Ok(()) => {
                trace!(origin = %pre.origin, passed = true, "precondition");
                return Ok(());
            }
            Err(message) => {
                trace!(origin = %pre.origin, passed = false, "precondition");
                rejected.push(Located::new(message, pre.origin.as_str()));
            }
        }
    }

    match rejected.pop() {
        None => Ok(()),
        Some(last) => {
            let violation = ContractViolation::new(
                AssertionKind::Precondition,
                record.name(),
                Some(contract.name()),
                last,
            );
            Err(report(violation.with_rejected(rejected)))
        }
    }
}

fn check_ensures<S>(
    record: &TypeRecord<S>,
    contract: &MethodContract<S>,
    core: &S,
    ret: &Value,
    old: &S,
    args: &[Value],
) -> Result<()> {
    for post in contract.ensures().iter().rev() {
        let outcome = (post.value)(core, ret, old, args);
        trace!(origin = %post.origin, passed = outcome.is_ok(), "postcondition");
        if let Err(message) = outcome {
            return Err(violation(
                record,
                AssertionKind::Postcondition,
                Some(contract.name()),
                Located::new(message, post.origin.as_str()),
            ));
        }
    }
    Ok(())
}

fn violation<S>(
    record: &TypeRecord<S>,
    kind: AssertionKind,
    method: Option<&str>,
    failure: Located<String>,
) -> crate::Error {
    report(ContractViolation::new(kind, record.name(), method, failure))
}

fn report(violation: ContractViolation) -> crate::Error {
    error!(%violation, "contract violated");
    violation.into()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::declaration::MethodDecl;
    use crate::typedef::TypeDef;
    use crate::{check, Error};

    /// State carrying a shared log of evaluated clauses
    #[derive(Clone, Default)]
    struct Probe {
        n: i64,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Probe {
        fn note(&self, entry: &str) {
            self.log.lock().unwrap().push(entry.to_string());
        }

        fn take_log(&self) -> Vec<String> {
            std::mem::take(&mut *self.log.lock().unwrap())
        }
    }

    fn pre(tag: &'static str, pass: bool) -> impl Fn(&Probe, &[Value]) -> crate::Verdict {
        move |p: &Probe, _: &[Value]| {
            p.note(tag);
            check!(pass, "{} rejected", tag);
            Ok(())
        }
    }

    fn post(
        tag: &'static str,
        pass: bool,
    ) -> impl Fn(&Probe, &Value, &Probe, &[Value]) -> crate::Verdict {
        move |p: &Probe, _: &Value, _: &Probe, _: &[Value]| {
            p.note(tag);
            check!(pass, "{} failed", tag);
            Ok(())
        }
    }

    fn inv(tag: &'static str) -> impl Fn(&Probe) -> crate::Verdict {
        move |p: &Probe| {
            p.note(tag);
            check!(p.n >= 0, "{} broken", tag);
            Ok(())
        }
    }

    fn body(p: &mut Probe, _: &[Value]) -> Result<Value> {
        p.note("body");
        p.n += 1;
        Ok(Value::Integer(p.n))
    }

    /// Base(require, ensure) <- Leaf(require_else, ensure_then), both with invariants
    fn hierarchy(
        base_pre: bool,
        leaf_pre: bool,
        base_post: bool,
        leaf_post: bool,
    ) -> TypeDef<Probe> {
        let base = Arc::new(
            TypeDef::new("Base")
                .constructor(0, |_| Ok(Probe::default()))
                .invariant(inv("inv:Base"))
                .method(
                    "m",
                    MethodDecl::implemented(0, body)
                        .require(pre("pre:Base", base_pre))
                        .ensure(post("post:Base", base_post)),
                ),
        );
        TypeDef::new("Leaf")
            .extends(base)
            .invariant(inv("inv:Leaf"))
            .method(
                "m",
                MethodDecl::implemented(0, body)
                    .require_else(pre("pre:Leaf", leaf_pre))
                    .ensure_then(post("post:Leaf", leaf_post)),
            )
    }

    fn instance(def: TypeDef<Probe>) -> Instance<Probe> {
        let instance = def.register().unwrap().instantiate(&[]).unwrap();
        instance.core().take_log();
        instance
    }

    #[test]
    fn test_successful_call_evaluation_order() {
        let mut p = instance(hierarchy(true, true, true, true));
        assert_eq!(p.call("m", &[]).unwrap(), Value::Integer(1));
        assert_eq!(
            p.core().take_log(),
            vec![
                "inv:Base", "inv:Leaf", // paranoid entry check
                "pre:Base", // first passing precondition admits
                "body",
                "post:Leaf", "post:Base",
                "inv:Base", "inv:Leaf",
            ]
        );
        assert_eq!(p.view(), View::Contracted);
    }

    #[test]
    fn test_derived_precondition_weakens() {
        let mut p = instance(hierarchy(false, true, true, true));
        assert!(p.call("m", &[]).is_ok());
        let log = p.core().take_log();
        assert_eq!(&log[2..4], ["pre:Base", "pre:Leaf"]);
    }

    #[test]
    fn test_all_preconditions_failing_reports_most_derived() {
        let mut p = instance(hierarchy(false, false, true, true));
        let err = p.call("m", &[]).unwrap_err();
        let violation = err.violation().unwrap();
        assert_eq!(violation.kind, AssertionKind::Precondition);
        assert_eq!(violation.origin, "Leaf");
        assert_eq!(violation.message, "pre:Leaf rejected");
        assert_eq!(
            violation.rejected,
            vec![Located::new("pre:Base rejected".to_string(), "Base")]
        );
        // the body never ran
        assert!(!p.core().take_log().contains(&"body".to_string()));
        assert_eq!(p.core().n, 0);
    }

    #[test]
    fn test_postconditions_fail_fast_most_derived_first() {
        let mut p = instance(hierarchy(true, true, false, false));
        let err = p.call("m", &[]).unwrap_err();
        assert_eq!(err.violation().unwrap().origin, "Leaf");
        let log = p.core().take_log();
        assert_eq!(log.last().map(String::as_str), Some("post:Leaf"));
        assert_eq!(p.view(), View::Contracted);
    }

    #[test]
    fn test_relaxed_type_skips_entry_invariants() {
        let mut p = instance(hierarchy(true, true, true, true).paranoid(false));
        p.call("m", &[]).unwrap();
        let log = p.core().take_log();
        assert_eq!(log[0], "pre:Base");
        assert_eq!(&log[log.len() - 2..], ["inv:Base", "inv:Leaf"]);
    }

    #[test]
    fn test_invariant_violation_restores_view() {
        let mut p = instance(hierarchy(true, true, true, true));
        p.core_mut().n = -5;
        let err = p.call("m", &[]).unwrap_err();
        let violation = err.violation().unwrap();
        assert_eq!(violation.kind, AssertionKind::Invariant);
        assert_eq!(violation.origin, "Base");
        assert_eq!(violation.method.as_deref(), Some("m"));
        assert_eq!(p.view(), View::Contracted);
    }

    #[test]
    fn test_snapshot_is_independent_of_later_mutation() {
        let def = TypeDef::new("Snap")
            .constructor(0, |_| Ok(Probe::default()))
            .method(
                "m",
                MethodDecl::implemented(0, body).ensure(|now: &Probe, _: &Value, old: &Probe, _: &[Value]| {
                    check!(now.n == old.n + 1, "old {} now {}", old.n, now.n);
                    Ok(())
                }),
            );
        let mut p = def.register().unwrap().instantiate(&[]).unwrap();
        p.call("m", &[]).unwrap();
        p.call("m", &[]).unwrap();
        assert_eq!(p.core().n, 2);
    }

    #[test]
    fn test_custom_snapshot_is_used() {
        let def = TypeDef::new("Snap")
            .constructor(0, |_| Ok(Probe::default()))
            .snapshot_with(|p: &Probe| Probe {
                n: p.n + 100,
                log: Arc::clone(&p.log),
            })
            .method(
                "m",
                MethodDecl::implemented(0, body).ensure(|_: &Probe, _: &Value, old: &Probe, _: &[Value]| {
                    check!(old.n >= 100, "default snapshot used");
                    Ok(())
                }),
            );
        let mut p = def.register().unwrap().instantiate(&[]).unwrap();
        assert!(p.call("m", &[]).is_ok());
    }

    #[test]
    fn test_implementation_errors_propagate_unchanged() {
        let def = TypeDef::new("Failing")
            .constructor(0, |_| Ok(Probe::default()))
            .method(
                "m",
                MethodDecl::implemented(0, |_: &mut Probe, _| Err(Error::Execution("boom".into()))),
            );
        let mut p = def.register().unwrap().instantiate(&[]).unwrap();
        assert_eq!(p.call("m", &[]).unwrap_err(), Error::Execution("boom".into()));
        assert_eq!(p.view(), View::Contracted);
    }

    #[test]
    fn test_arguments_reach_clauses() {
        let def = TypeDef::new("Args")
            .constructor(0, |_| Ok(Probe::default()))
            .method(
                "add",
                MethodDecl::implemented(1, |p: &mut Probe, args| {
                    p.n += args[0].as_integer().unwrap_or_default();
                    Ok(Value::Integer(p.n))
                })
                .require(|_: &Probe, args: &[Value]| {
                    check!(
                        args[0].as_integer().is_some_and(|x| x > 0),
                        "amount must be positive"
                    );
                    Ok(())
                })
                .ensure(|now: &Probe, ret: &Value, _: &Probe, _: &[Value]| {
                    check!(ret.as_integer() == Some(now.n), "returned {}", ret);
                    Ok(())
                }),
            );
        let mut p = def.register().unwrap().instantiate(&[]).unwrap();
        assert_eq!(p.call("add", &[Value::Integer(3)]).unwrap(), Value::Integer(3));
        let err = p.call("add", &[Value::Integer(-1)]).unwrap_err();
        assert_eq!(err.violation().unwrap().message, "amount must be positive");
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::PreChecked.to_string(), "pre-checked");
        assert_eq!(Phase::Exited.to_string(), "exited");
    }
}
