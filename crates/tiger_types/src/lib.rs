//! Tiger type system
//!
//! - `TypeContext` owns every type; `TypeId` handles compare nominally
//! - `Table` is the scoped environment used for both types and values

mod table;
mod types;

pub use table::Table;
pub use types::*;
