//! Translation to tree IR
//!
//! `Translator` is the per-compilation context the checker drives:
//! - owns the level arena, the temp/label supply and the jump patch table
//! - offers one builder per source construct, each returning a `TrExp`
//! - collects finished procedures and string literals as fragments

mod builders;
mod exp;
mod level;

pub use exp::{Cond, PatchList, PatchTable, TrExp};
pub use level::{Access, LevelId, Levels};

use tiger_frame::{Fragment, Frame};
use tiger_ir::{Exp, Label, Stm, TempGen};

pub struct Translator<F: Frame> {
    pub(crate) temps: TempGen,
    pub(crate) levels: Levels<F>,
    pub(crate) patches: PatchTable,
    fragments: Vec<Fragment<F>>,
}

impl<F: Frame> Translator<F> {
    pub fn new() -> Self {
        let mut temps = TempGen::new();
        let levels = Levels::new(&mut temps);
        Self {
            temps,
            levels,
            patches: PatchTable::default(),
            fragments: Vec::new(),
        }
    }

    pub fn outermost(&self) -> LevelId {
        self.levels.outermost()
    }

    pub fn new_level(&mut self, parent: LevelId, name: Label, formals: &[bool]) -> LevelId {
        let level = self.levels.new_level(parent, name, formals, &mut self.temps);
        tracing::trace!(
            name = %self.levels.frame(level).name(),
            depth = self.levels.depth(level),
            formals = formals.len(),
            "new level"
        );
        level
    }

    pub fn formals(&self, level: LevelId) -> &[Access] {
        self.levels.formals(level)
    }

    pub fn alloc_local(&mut self, level: LevelId, escapes: bool) -> Access {
        self.levels.alloc_local(level, escapes, &mut self.temps)
    }

    pub fn levels(&self) -> &Levels<F> {
        &self.levels
    }

    /// Fresh entry label for a function called `name`
    pub fn function_label(&mut self, name: &str) -> Label {
        self.temps.new_named_label(name)
    }

    /// Finish a function body: store its value in the return register if
    /// it has one, resolve its jumps and record it as a fragment.
    pub fn proc_entry_exit(&mut self, level: LevelId, body: TrExp, returns_value: bool) {
        let stm = if returns_value {
            let value = self.un_ex(body);
            Stm::move_(Exp::Temp(F::return_value()), value)
        } else {
            self.un_nx(body)
        };
        let body = self.patches.resolve(stm);
        let frame = self.levels.frame(level).clone();
        tracing::debug!(name = %frame.name(), "procedure fragment");
        self.fragments.push(Fragment::Proc { body, frame });
    }

    pub fn fragments(&self) -> &[Fragment<F>] {
        &self.fragments
    }

    pub fn into_fragments(self) -> Vec<Fragment<F>> {
        self.fragments
    }
}

impl<F: Frame> Default for Translator<F> {
    fn default() -> Self {
        Self::new()
    }
}
