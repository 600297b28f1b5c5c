//! Pipeline entry points for checker operations.
//!
//! - `Checker`: builds collaborators from configuration and runs passes
//! - `Reconciler`: one bounded-concurrency pass over tracked sections
//! - `Registrar`: adds sections to the tracked set

pub mod check;
pub mod reconcile;
pub mod register;

pub use check::Checker;
pub use reconcile::Reconciler;
pub use register::Registrar;
