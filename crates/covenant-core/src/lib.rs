//! Covenant Core - runtime design-by-contract with inheritance-aware composition
//!
//! Types declare invariants, preconditions and postconditions. Subtypes may
//! weaken preconditions (`require_else`) and strengthen postconditions
//! (`ensure_then`); invariants of every ancestor keep holding.
//!
//! # Architecture
//!
//! ```text
//! TypeDef → Linearizer → Chain Builder → Validator → Composer → TypeRecord
//!                                                                   ↓
//!                                       ContractedType ⇄ RawType (shared record)
//!                                                                   ↓
//!                                       Instance::call → Interceptor → implementation
//! ```
//!
//! # Guarantees
//!
//! - **Deterministic**: One linearization per hierarchy, stable across runs
//! - **Atomic registration**: A type is either fully composed or rejected
//! - **Immutable contracts**: Composed contracts never change after registration
//! - **No re-entry**: Implementations see the core state, never the contracted view

pub mod chain;
pub mod compose;
pub mod declaration;
pub mod error;
pub mod factory;
pub mod instance;
pub mod interceptor;
pub mod linearize;
pub mod typedef;
pub mod validate;
pub mod value;

pub use compose::{ContractSummary, MethodContract, MethodSummary, TypeContract};
pub use declaration::{
    extract, AssertionKind, ClauseKind, Declarations, Declared, Located, MethodDecl, Verdict,
};
pub use error::{ContractDefinitionError, ContractViolation, Error, LinearizationError, Result};
pub use factory::{ContractedType, RawType};
pub use instance::{Instance, View};
pub use interceptor::Phase;
pub use linearize::{linearize, Linearizer};
pub use typedef::TypeDef;
pub use validate::{validate_family, validate_method};
pub use value::Value;
