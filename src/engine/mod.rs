//! Business rules: evaluation, the reducer and the reset ceremony.

pub mod action;
pub mod evaluator;
pub mod reducer;
pub mod system_reset;

pub use action::Action;
pub use evaluator::{Evaluation, evaluate, evaluate_excluding, find_conflicts};
pub use reducer::{Subject, Transition, apply, bootstrap_admin};
pub use system_reset::{CONFIRMATION_PHRASE, CeremonyStep, ResetAuthorization, ResetGuard};
