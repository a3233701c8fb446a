//! Bundled stack hierarchy
//!
//! ```text
//! Stack (abstract, contracts only)      EvenStack (invariant only)
//!   ├── StackImpl ───────────┬──────────────┘
//!   │                        └── EvenStackImpl
//!   └── WrongStackImpl (pop forgets to shrink)
//! ```

use std::sync::Arc;

use clap::ValueEnum;
use covenant_core::{check, MethodDecl, Result, TypeDef, Value, Verdict};

/// Core state shared by every stack in the hierarchy
#[derive(Debug, Clone, Default)]
pub struct StackState {
    pub arr: Vec<Value>,
    pub size: i64,
}

impl StackState {
    pub fn top(&self) -> Value {
        usize::try_from(self.size - 1)
            .ok()
            .and_then(|i| self.arr.get(i))
            .cloned()
            .unwrap_or_default()
    }
}

/// Which bundled implementation to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Implementation {
    /// Correct stack
    Stack,
    /// Stack whose pop does not decrement its size
    Wrong,
    /// Correct stack that must keep an even top element
    Even,
}

impl Implementation {
    pub fn definition(self, paranoid: bool) -> TypeDef<StackState> {
        let def = match self {
            Implementation::Stack => stack_impl(),
            Implementation::Wrong => wrong_stack_impl(),
            Implementation::Even => TypeDef::new("EvenStackImpl")
                .extends(stack_impl())
                .extends(even_stack()),
        };
        def.paranoid(paranoid)
    }
}

fn non_empty(message: &'static str) -> impl Fn(&StackState, &[Value]) -> Verdict {
    move |s: &StackState, _: &[Value]| {
        check!(s.size >= 1, "{}", message);
        Ok(())
    }
}

fn push_ensure(s: &StackState, _: &Value, old: &StackState, args: &[Value]) -> Verdict {
    check!(
        s.size == old.size + 1,
        "Increase stack size. Should be {} but is {}",
        old.size + 1,
        s.size
    );
    check!(
        s.top() == args[0],
        "New top of stack should be {} but is {}",
        args[0],
        s.top()
    );
    Ok(())
}

fn pop_ensure(s: &StackState, ret: &Value, old: &StackState, _: &[Value]) -> Verdict {
    check!(
        s.size == old.size - 1,
        "Decrease stack size. Should be {} but is {}",
        old.size - 1,
        s.size
    );
    check!(
        *ret == old.top(),
        "Return {} should be old top of stack ({})",
        old.top(),
        ret
    );
    Ok(())
}

fn stack() -> Arc<TypeDef<StackState>> {
    Arc::new(
        TypeDef::new("Stack")
            .invariant(|s: &StackState| {
                check!(s.size >= 0, "Size should be positive but is {}", s.size);
                Ok(())
            })
            .method("push", MethodDecl::deferred(1).ensure(push_ensure))
            .method(
                "pop",
                MethodDecl::deferred(0)
                    .require(non_empty("Pop from empty stack"))
                    .ensure(pop_ensure),
            )
            .method(
                "top",
                MethodDecl::deferred(0).require(non_empty("No top: empty stack")),
            )
            .abstract_method("size", 0),
    )
}

fn even_stack() -> Arc<TypeDef<StackState>> {
    Arc::new(TypeDef::new("EvenStack").invariant(|s: &StackState| {
        let even = s.top().as_integer().is_some_and(|n| n % 2 == 0);
        check!(s.size == 0 || even, "Top should be even but was {}", s.top());
        Ok(())
    }))
}

fn push(s: &mut StackState, args: &[Value]) -> Result<Value> {
    s.arr.push(args[0].clone());
    s.size += 1;
    Ok(Value::Null)
}

fn pop(s: &mut StackState, _: &[Value]) -> Result<Value> {
    s.size -= 1;
    Ok(s.arr.pop().unwrap_or_default())
}

fn pop_keeping_size(s: &mut StackState, _: &[Value]) -> Result<Value> {
    Ok(s.arr.pop().unwrap_or_default())
}

fn top(s: &mut StackState, _: &[Value]) -> Result<Value> {
    Ok(s.top())
}

fn size(s: &mut StackState, _: &[Value]) -> Result<Value> {
    Ok(Value::Integer(s.size))
}

type RawMethod = fn(&mut StackState, &[Value]) -> Result<Value>;

fn concrete(name: &str, pop_impl: RawMethod) -> TypeDef<StackState> {
    TypeDef::new(name)
        .extends(stack())
        .constructor(0, |_| Ok(StackState::default()))
        .method("push", MethodDecl::implemented(1, push))
        .method("pop", MethodDecl::implemented(0, pop_impl))
        .method("top", MethodDecl::implemented(0, top))
        .method("size", MethodDecl::implemented(0, size))
}

fn stack_impl() -> TypeDef<StackState> {
    concrete("StackImpl", pop)
}

fn wrong_stack_impl() -> TypeDef<StackState> {
    concrete("WrongStackImpl", pop_keeping_size)
}
