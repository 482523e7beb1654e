//! Tree intermediate representation
//!
//! The tree IR is what translation produces and what instruction selection
//! would consume:
//! - Expressions (`Exp`) compute values; statements (`Stm`) perform effects
//! - Memory is explicit: every variable access is a `Temp` or a `Mem`
//! - Jumps name their destination through a `Target`, which may still be an
//!   unfilled slot while translation is in progress

mod temp;
mod tree;

pub use temp::*;
pub use tree::*;
