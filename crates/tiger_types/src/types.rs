//! Type representation
//!
//! Types live in a `TypeContext` arena and are referred to by `TypeId`.
//! Identity is nominal: two ids are the same type only if they are the same
//! arena slot, so structurally identical record or array declarations stay
//! distinct.

/// Handle to a type in a `TypeContext`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

impl TypeId {
    pub const INT: TypeId = TypeId(0);
    pub const STRING: TypeId = TypeId(1);
    pub const NIL: TypeId = TypeId(2);
    pub const VOID: TypeId = TypeId(3);
    /// Type of an expression that already failed to check. Compatible with
    /// everything, so one mistake is reported once.
    pub const ERROR: TypeId = TypeId(4);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Resolution state of a named type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameBinding {
    /// Declared in the current group, body not processed yet
    Unresolved,
    Resolved(TypeId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Int,
    String,
    Nil,
    Void,
    Error,
    /// Ordered field list
    Record(Vec<(String, TypeId)>),
    /// Element type
    Array(TypeId),
    /// A named alias, resolved after its declaration group is processed
    Name(String, NameBinding),
    /// Read-only wrapper around a `for` loop index
    LoopVariable(TypeId),
}

/// Arena of all types created during one compilation
#[derive(Debug, Clone)]
pub struct TypeContext {
    types: Vec<Type>,
}

impl TypeContext {
    pub fn new() -> Self {
        Self {
            types: vec![Type::Int, Type::String, Type::Nil, Type::Void, Type::Error],
        }
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    fn alloc(&mut self, ty: Type) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    pub fn record(&mut self, fields: Vec<(String, TypeId)>) -> TypeId {
        self.alloc(Type::Record(fields))
    }

    pub fn array(&mut self, element: TypeId) -> TypeId {
        self.alloc(Type::Array(element))
    }

    /// A fresh, unresolved named type
    pub fn name(&mut self, name: &str) -> TypeId {
        self.alloc(Type::Name(name.to_string(), NameBinding::Unresolved))
    }

    pub fn loop_variable(&mut self, inner: TypeId) -> TypeId {
        self.alloc(Type::LoopVariable(inner))
    }

    /// Set the target of a named type. Ids that are not names are ignored.
    pub fn bind_name(&mut self, id: TypeId, target: TypeId) {
        if let Type::Name(_, binding) = &mut self.types[id.index()] {
            *binding = NameBinding::Resolved(target);
        }
    }

    /// Strip `Name` and `LoopVariable` wrappers.
    ///
    /// Stops at an unresolved name, and gives up after visiting every arena
    /// slot once so that a cycle still under construction cannot hang.
    pub fn resolve(&self, mut id: TypeId) -> TypeId {
        for _ in 0..self.types.len() {
            match self.get(id) {
                Type::Name(_, NameBinding::Resolved(next)) | Type::LoopVariable(next) => id = *next,
                _ => return id,
            }
        }
        id
    }

    /// The actual type: `Name`, `LoopVariable` and `Array` wrappers all
    /// stripped. Used for operand comparisons.
    pub fn actual(&self, mut id: TypeId) -> TypeId {
        for _ in 0..self.types.len() {
            id = self.resolve(id);
            match self.get(id) {
                Type::Array(element) => id = *element,
                _ => return id,
            }
        }
        id
    }

    /// Nominal identity after stripping aliases
    pub fn same(&self, a: TypeId, b: TypeId) -> bool {
        self.resolve(a) == self.resolve(b)
    }

    /// `same`, plus `nil` matching any record type. The error type matches
    /// anything.
    pub fn compatible(&self, a: TypeId, b: TypeId) -> bool {
        let (a, b) = (self.resolve(a), self.resolve(b));
        a == b
            || a == TypeId::ERROR
            || b == TypeId::ERROR
            || (a == TypeId::NIL && self.is_record(b))
            || (b == TypeId::NIL && self.is_record(a))
    }

    pub fn is_int(&self, id: TypeId) -> bool {
        self.resolve(id) == TypeId::INT
    }

    pub fn is_string(&self, id: TypeId) -> bool {
        self.resolve(id) == TypeId::STRING
    }

    pub fn is_void(&self, id: TypeId) -> bool {
        self.resolve(id) == TypeId::VOID
    }

    pub fn is_nil(&self, id: TypeId) -> bool {
        self.resolve(id) == TypeId::NIL
    }

    pub fn is_error(&self, id: TypeId) -> bool {
        self.resolve(id) == TypeId::ERROR
    }

    pub fn is_record(&self, id: TypeId) -> bool {
        matches!(self.get(self.resolve(id)), Type::Record(_))
    }

    pub fn is_loop_variable(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::LoopVariable(_))
    }

    /// Fields of a record type (after alias stripping)
    pub fn record_fields(&self, id: TypeId) -> Option<&[(String, TypeId)]> {
        match self.get(self.resolve(id)) {
            Type::Record(fields) => Some(fields),
            _ => None,
        }
    }

    /// Position and type of `field` in a record type
    pub fn record_field(&self, id: TypeId, field: &str) -> Option<(usize, TypeId)> {
        self.record_fields(id)?
            .iter()
            .enumerate()
            .find(|(_, (name, _))| name == field)
            .map(|(i, (_, ty))| (i, *ty))
    }

    /// Element type of an array type (after alias stripping)
    pub fn array_element(&self, id: TypeId) -> Option<TypeId> {
        match self.get(self.resolve(id)) {
            Type::Array(element) => Some(*element),
            _ => None,
        }
    }

    /// True if following only `Name` links from `id` leads back to `id`.
    /// A chain that runs into a cycle not containing `id` is not itself
    /// cyclic, so each cycle is found at its own members.
    pub fn is_cyclic_name(&self, id: TypeId) -> bool {
        let mut current = id;
        for _ in 0..self.types.len() {
            match self.get(current) {
                Type::Name(_, NameBinding::Resolved(next)) => {
                    if *next == id {
                        return true;
                    }
                    current = *next;
                }
                _ => return false,
            }
        }
        false
    }

    /// Human-readable type for diagnostics. Names print as their name, so
    /// recursive records terminate.
    pub fn display(&self, id: TypeId) -> String {
        match self.get(id) {
            Type::Int => "int".to_string(),
            Type::String => "string".to_string(),
            Type::Nil => "nil".to_string(),
            Type::Void => "void".to_string(),
            Type::Error => "<error>".to_string(),
            Type::Record(fields) => {
                let fields: Vec<_> = fields
                    .iter()
                    .map(|(name, ty)| format!("{}: {}", name, self.display(*ty)))
                    .collect();
                format!("{{{}}}", fields.join(", "))
            }
            Type::Array(element) => format!("array of {}", self.display(*element)),
            Type::Name(name, _) => name.clone(),
            Type::LoopVariable(inner) => self.display(*inner),
        }
    }
}

impl Default for TypeContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nominal_identity() {
        let mut ctx = TypeContext::new();
        let a = ctx.record(vec![("x".to_string(), TypeId::INT)]);
        let b = ctx.record(vec![("x".to_string(), TypeId::INT)]);
        assert!(!ctx.same(a, b));
        assert!(ctx.same(a, a));
    }

    #[test]
    fn test_resolve_strips_names_and_loop_variables() {
        let mut ctx = TypeContext::new();
        let n = ctx.name("myint");
        ctx.bind_name(n, TypeId::INT);
        let m = ctx.name("alias");
        ctx.bind_name(m, n);
        assert_eq!(ctx.resolve(m), TypeId::INT);

        let lv = ctx.loop_variable(TypeId::INT);
        assert_eq!(ctx.resolve(lv), TypeId::INT);
        assert!(ctx.is_loop_variable(lv));
    }

    #[test]
    fn test_actual_strips_arrays() {
        let mut ctx = TypeContext::new();
        let arr = ctx.array(TypeId::STRING);
        let n = ctx.name("strings");
        ctx.bind_name(n, arr);
        assert_eq!(ctx.actual(n), TypeId::STRING);
        assert_eq!(ctx.resolve(n), arr);
        assert_eq!(ctx.array_element(n), Some(TypeId::STRING));
    }

    #[test]
    fn test_nil_compatible_with_records_only() {
        let mut ctx = TypeContext::new();
        let rec = ctx.record(vec![]);
        assert!(ctx.compatible(TypeId::NIL, rec));
        assert!(ctx.compatible(rec, TypeId::NIL));
        assert!(!ctx.compatible(TypeId::NIL, TypeId::INT));
    }

    #[test]
    fn test_error_type_is_compatible_with_anything() {
        let mut ctx = TypeContext::new();
        let rec = ctx.record(vec![]);
        assert!(ctx.compatible(TypeId::ERROR, TypeId::INT));
        assert!(ctx.compatible(rec, TypeId::ERROR));
        assert!(ctx.compatible(TypeId::ERROR, TypeId::NIL));
        assert!(!ctx.is_int(TypeId::ERROR));
        assert_eq!(ctx.display(TypeId::ERROR), "<error>");
    }

    #[test]
    fn test_cycle_detection() {
        let mut ctx = TypeContext::new();
        let a = ctx.name("a");
        let b = ctx.name("b");
        ctx.bind_name(a, b);
        ctx.bind_name(b, a);
        assert!(ctx.is_cyclic_name(a));
        assert!(ctx.is_cyclic_name(b));

        // A record breaks the chain.
        let c = ctx.name("c");
        let rec = ctx.record(vec![("next".to_string(), c)]);
        ctx.bind_name(c, rec);
        assert!(!ctx.is_cyclic_name(c));
        assert_eq!(ctx.record_field(c, "next"), Some((0, c)));
    }

    #[test]
    fn test_name_leading_into_cycle_is_not_cyclic() {
        // p -> q -> r -> q
        let mut ctx = TypeContext::new();
        let p = ctx.name("p");
        let q = ctx.name("q");
        let r = ctx.name("r");
        ctx.bind_name(p, q);
        ctx.bind_name(q, r);
        ctx.bind_name(r, q);
        assert!(!ctx.is_cyclic_name(p));
        assert!(ctx.is_cyclic_name(q));
        assert!(ctx.is_cyclic_name(r));

        ctx.bind_name(q, TypeId::ERROR);
        assert!(!ctx.is_cyclic_name(r));
        assert_eq!(ctx.resolve(p), TypeId::ERROR);
    }

    #[test]
    fn test_display_recursive_record() {
        let mut ctx = TypeContext::new();
        let list = ctx.name("list");
        let rec = ctx.record(vec![("head".to_string(), TypeId::INT), ("tail".to_string(), list)]);
        ctx.bind_name(list, rec);
        assert_eq!(ctx.display(rec), "{head: int, tail: list}");
        assert_eq!(ctx.display(list), "list");
    }
}
