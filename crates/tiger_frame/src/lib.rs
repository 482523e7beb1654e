//! Stack frames and fragments
//!
//! A `Frame` describes where a function's formals and locals live on one
//! target. Translation only ever talks to frames through this trait.

mod x64;

pub use x64::X64Frame;

use std::fmt;
use tiger_ir::{Exp, Label, Stm, Temp, TempGen};

/// Where a formal or local lives inside its own frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// At this byte offset from the frame pointer
    InFrame(i64),
    InReg(Temp),
}

pub trait Frame: Clone + fmt::Debug {
    /// Bytes per machine word
    const WORD_SIZE: i64;

    /// Lay out a new frame. `formals[i]` says whether formal `i` escapes.
    fn new(name: Label, formals: &[bool], temps: &mut TempGen) -> Self;

    fn name(&self) -> &Label;

    /// Accesses for the formals, in declaration order
    fn formals(&self) -> &[Access];

    fn alloc_local(&mut self, escapes: bool, temps: &mut TempGen) -> Access;

    /// Bytes of local storage allocated so far
    fn frame_size(&self) -> i64;

    fn frame_pointer() -> Temp;

    fn return_value() -> Temp;

    /// The IR reading `access`, given an expression for the address of the
    /// frame it lives in
    fn exp(access: &Access, frame_ptr: Exp) -> Exp {
        match access {
            Access::InFrame(offset) => Exp::mem(Exp::offset(frame_ptr, *offset)),
            Access::InReg(t) => Exp::Temp(*t),
        }
    }

    /// Call a runtime routine. No static link is passed.
    fn external_call(name: &str, args: Vec<Exp>) -> Exp {
        Exp::Call(Box::new(Exp::Name(Label::named(name))), args)
    }
}

/// A finished unit of translation
#[derive(Debug, Clone)]
pub enum Fragment<F: Frame> {
    /// A function body together with the frame it runs in
    Proc { body: Stm, frame: F },
    /// A string literal placed in static data
    Str { label: Label, value: String },
}

impl<F: Frame> Fragment<F> {
    pub fn pretty_print(&self) -> String {
        match self {
            Fragment::Proc { body, frame } => {
                format!("PROC {}:\n{}\n", frame.name(), body.pretty_print(1))
            }
            Fragment::Str { label, value } => {
                format!("STRING {}: \"{}\"\n", label, value.escape_default())
            }
        }
    }
}
