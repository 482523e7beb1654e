//! Semantic analysis for Tiger
//!
//! A single pass over the syntax tree that:
//! - type checks every expression and declaration
//! - lays out frames and static links for nested functions
//! - translates each function body to tree IR
//!
//! Errors are collected rather than fatal, so one run reports every
//! problem it can find.

mod check;
mod env;
mod error;
pub mod escape;

pub use check::{check, translate, Options, Translation};
pub use env::{base_tenv, base_venv, EnvEntry, FunEntry, FunKind};
pub use error::{Category, Diagnostic, ErrorKind};
