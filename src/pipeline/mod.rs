//! Change-detection engine.
//!
//! - `fingerprint`: digest, `transform`, `create_pattern`, `apply_pattern`
//! - `strategy`: the `ChangeCheckStrategy` trait and its factory
//! - `naive` / `invariance`: the two strategies
//! - `checker`: `ChangeChecker`, which runs a strategy over every site

pub mod checker;
pub mod fingerprint;
pub mod invariance;
pub mod naive;
pub mod strategy;

pub use checker::{ChangeChecker, CheckReport};
pub use fingerprint::{apply_pattern, create_pattern, fingerprint, transform};
pub use invariance::{CheckState, InvarianceStrategy, Outcome, Step};
pub use naive::NaiveStrategy;
pub use strategy::{ChangeCheckStrategy, CheckContext, build_strategy};
