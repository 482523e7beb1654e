//! Nesting levels and variable accesses

use tiger_frame::{self as frame, Frame};
use tiger_ir::{Exp, Label, TempGen};

/// Handle to a level owned by `Levels`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LevelId(u32);

impl LevelId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A variable's location: the level that owns it and where it lives in
/// that level's frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub level: LevelId,
    pub access: frame::Access,
}

#[derive(Debug, Clone)]
struct Level<F> {
    depth: u32,
    parent: Option<LevelId>,
    frame: F,
    /// Formal 0 of the frame; absent only for the outermost level
    static_link: Option<frame::Access>,
    formals: Vec<Access>,
    locals: Vec<Access>,
}

/// Arena of every level created during one compilation
#[derive(Debug, Clone)]
pub struct Levels<F: Frame> {
    levels: Vec<Level<F>>,
}

impl<F: Frame> Levels<F> {
    /// Start with just the outermost level, which holds the runtime library
    pub fn new(temps: &mut TempGen) -> Self {
        let frame = F::new(Label::named("outermost"), &[], temps);
        Self {
            levels: vec![Level {
                depth: 0,
                parent: None,
                frame,
                static_link: None,
                formals: Vec::new(),
                locals: Vec::new(),
            }],
        }
    }

    pub fn outermost(&self) -> LevelId {
        LevelId(0)
    }

    /// Create a level nested in `parent`. A static link is prepended to
    /// `formals` and always escapes.
    pub fn new_level(
        &mut self,
        parent: LevelId,
        name: Label,
        formals: &[bool],
        temps: &mut TempGen,
    ) -> LevelId {
        let id = LevelId(self.levels.len() as u32);
        let depth = self.depth(parent) + 1;
        let escapes: Vec<bool> = std::iter::once(true).chain(formals.iter().copied()).collect();
        let frame = F::new(name, &escapes, temps);

        let mut accesses = frame.formals().iter().map(|&access| Access { level: id, access });
        let static_link = accesses.next().map(|a| a.access);
        let formals = accesses.collect();

        self.levels.push(Level {
            depth,
            parent: Some(parent),
            frame,
            static_link,
            formals,
            locals: Vec::new(),
        });
        id
    }

    /// Accesses for the declared formals; the static link is not included
    pub fn formals(&self, level: LevelId) -> &[Access] {
        &self.levels[level.index()].formals
    }

    pub fn alloc_local(&mut self, level: LevelId, escapes: bool, temps: &mut TempGen) -> Access {
        let entry = &mut self.levels[level.index()];
        let access = Access {
            level,
            access: entry.frame.alloc_local(escapes, temps),
        };
        entry.locals.push(access);
        access
    }

    pub fn depth(&self, level: LevelId) -> u32 {
        self.levels[level.index()].depth
    }

    pub fn parent(&self, level: LevelId) -> Option<LevelId> {
        self.levels[level.index()].parent
    }

    pub fn frame(&self, level: LevelId) -> &F {
        &self.levels[level.index()].frame
    }

    pub fn locals(&self, level: LevelId) -> &[Access] {
        &self.levels[level.index()].locals
    }

    /// Address of `target`'s frame as seen from code running in `from`:
    /// the frame pointer, dereferenced through one static link per level
    /// between the two.
    pub fn frame_address(&self, from: LevelId, target: LevelId) -> Exp {
        let mut addr = Exp::Temp(F::frame_pointer());
        let mut current = from;
        while self.depth(current) > self.depth(target) {
            let level = &self.levels[current.index()];
            let (Some(link), Some(parent)) = (level.static_link, level.parent) else {
                break;
            };
            addr = F::exp(&link, addr);
            current = parent;
        }
        addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiger_frame::X64Frame;

    fn count_mems(e: &Exp) -> usize {
        let mut n = 0;
        e.for_each_exp(&mut |e| {
            if matches!(e, Exp::Mem(_)) {
                n += 1;
            }
        });
        n
    }

    #[test]
    fn test_new_level_hides_static_link() {
        let mut temps = TempGen::new();
        let mut levels = Levels::<X64Frame>::new(&mut temps);
        let top = levels.outermost();
        let f = levels.new_level(top, Label::named("f"), &[true, true], &mut temps);

        assert_eq!(levels.depth(f), 1);
        assert_eq!(levels.formals(f).len(), 2);
        assert_eq!(levels.frame(f).formals().len(), 3);
        assert!(levels.formals(f).iter().all(|a| a.level == f));
        assert_eq!(levels.formals(f)[0].access, frame::Access::InFrame(8));
    }

    #[test]
    fn test_alloc_local_is_append_only() {
        let mut temps = TempGen::new();
        let mut levels = Levels::<X64Frame>::new(&mut temps);
        let f = levels.new_level(levels.outermost(), Label::named("f"), &[], &mut temps);
        let a = levels.alloc_local(f, true, &mut temps);
        let b = levels.alloc_local(f, true, &mut temps);
        assert_eq!(levels.locals(f), &[a, b]);
        assert_ne!(a.access, b.access);
    }

    #[test]
    fn test_frame_address_follows_static_links() {
        let mut temps = TempGen::new();
        let mut levels = Levels::<X64Frame>::new(&mut temps);
        let l1 = levels.new_level(levels.outermost(), Label::named("a"), &[], &mut temps);
        let l2 = levels.new_level(l1, Label::named("b"), &[], &mut temps);
        let l3 = levels.new_level(l2, Label::named("c"), &[], &mut temps);
        let l4 = levels.new_level(l3, Label::named("d"), &[], &mut temps);

        assert_eq!(levels.frame_address(l4, l4), Exp::Temp(X64Frame::frame_pointer()));
        assert_eq!(count_mems(&levels.frame_address(l4, l1)), 3);
        assert_eq!(count_mems(&levels.frame_address(l2, l1)), 1);
    }
}
