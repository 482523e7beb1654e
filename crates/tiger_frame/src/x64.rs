//! Frame layout for a 64-bit target
//!
//! ```text
//!   fp + 8*i      incoming formal i (the static link is formal 0)
//!   fp - 8*(k+1)  escaping local k
//! ```

use crate::{Access, Frame};
use tiger_ir::{Label, Temp, TempGen};

const FP: Temp = Temp(0);
const RV: Temp = Temp(1);

#[derive(Debug, Clone)]
pub struct X64Frame {
    name: Label,
    formals: Vec<Access>,
    /// Escaping locals allocated so far
    locals: i64,
}

impl Frame for X64Frame {
    const WORD_SIZE: i64 = 8;

    fn new(name: Label, formals: &[bool], temps: &mut TempGen) -> Self {
        let formals = formals
            .iter()
            .enumerate()
            .map(|(i, &escapes)| {
                if escapes {
                    Access::InFrame(i as i64 * Self::WORD_SIZE)
                } else {
                    Access::InReg(temps.new_temp())
                }
            })
            .collect();
        Self { name, formals, locals: 0 }
    }

    fn name(&self) -> &Label {
        &self.name
    }

    fn formals(&self) -> &[Access] {
        &self.formals
    }

    fn alloc_local(&mut self, escapes: bool, temps: &mut TempGen) -> Access {
        if escapes {
            self.locals += 1;
            Access::InFrame(-self.locals * Self::WORD_SIZE)
        } else {
            Access::InReg(temps.new_temp())
        }
    }

    fn frame_size(&self) -> i64 {
        self.locals * Self::WORD_SIZE
    }

    fn frame_pointer() -> Temp {
        FP
    }

    fn return_value() -> Temp {
        RV
    }
}
