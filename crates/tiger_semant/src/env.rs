//! Value and type environments

use tiger_ir::Label;
use tiger_translate::{Access, LevelId};
use tiger_types::{Table, TypeId};

/// How a function is reached at run time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunKind {
    /// Runtime library routine, called without a static link
    Runtime,
    /// Declared in Tiger; its body runs in this level
    Declared(LevelId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunEntry {
    pub kind: FunKind,
    pub label: Label,
    pub formals: Vec<TypeId>,
    pub result: TypeId,
}

/// What a name means in the value namespace
#[derive(Debug, Clone, PartialEq)]
pub enum EnvEntry {
    Var { access: Access, ty: TypeId },
    Fun(FunEntry),
}

const RUNTIME: &[(&str, &[TypeId], TypeId)] = &[
    ("print", &[TypeId::STRING], TypeId::VOID),
    ("flush", &[], TypeId::VOID),
    ("getchar", &[], TypeId::STRING),
    ("ord", &[TypeId::STRING], TypeId::INT),
    ("chr", &[TypeId::INT], TypeId::STRING),
    ("size", &[TypeId::STRING], TypeId::INT),
    ("substring", &[TypeId::STRING, TypeId::INT, TypeId::INT], TypeId::STRING),
    ("concat", &[TypeId::STRING, TypeId::STRING], TypeId::STRING),
    ("not", &[TypeId::INT], TypeId::INT),
    ("exit", &[TypeId::INT], TypeId::VOID),
];

/// `int` and `string`
pub fn base_tenv() -> Table<TypeId> {
    let mut tenv = Table::new();
    tenv.enter("int", TypeId::INT);
    tenv.enter("string", TypeId::STRING);
    tenv
}

/// The runtime library
pub fn base_venv() -> Table<EnvEntry> {
    let mut venv = Table::new();
    for &(name, formals, result) in RUNTIME {
        venv.enter(
            name,
            EnvEntry::Fun(FunEntry {
                kind: FunKind::Runtime,
                label: Label::named(name),
                formals: formals.to_vec(),
                result,
            }),
        );
    }
    venv
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_environments() {
        let tenv = base_tenv();
        assert_eq!(tenv.look("int"), Some(&TypeId::INT));
        assert_eq!(tenv.look("string"), Some(&TypeId::STRING));
        assert_eq!(tenv.look("nil"), None);

        let venv = base_venv();
        let Some(EnvEntry::Fun(substring)) = venv.look("substring") else {
            panic!("substring missing");
        };
        assert_eq!(substring.kind, FunKind::Runtime);
        assert_eq!(substring.formals.len(), 3);
        assert_eq!(substring.result, TypeId::STRING);
        assert!(venv.look("print").is_some());
    }
}
