//! Semantic diagnostics

use thiserror::Error;
use tiger_lexer::Span;

/// Broad class of a semantic error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    UndefinedName,
    KindMismatch,
    ArityMismatch,
    DuplicateDefinition,
    IllegalCycle,
    InvalidMutation,
    InvalidBreak,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),

    #[error("undefined function `{0}`")]
    UndefinedFunction(String),

    #[error("undefined type `{0}`")]
    UndefinedType(String),

    #[error("`{0}` is a function, not a variable")]
    NotAVariable(String),

    #[error("`{0}` is a variable, not a function")]
    NotAFunction(String),

    #[error("integer required, found `{found}`")]
    IntegerRequired { found: String },

    #[error("type mismatch: expected `{expected}`, found `{found}`")]
    TypeMismatch { expected: String, found: String },

    #[error("cannot compare `{left}` with `{right}`")]
    OperandMismatch { left: String, right: String },

    #[error("ordering requires int or string operands, found `{found}`")]
    NotOrdered { found: String },

    #[error("then and else branches have different types: `{then}` and `{els}`")]
    BranchMismatch { then: String, els: String },

    #[error("`{0}` is not a record type")]
    NotARecord(String),

    #[error("`{0}` is not an array type")]
    NotAnArray(String),

    #[error("record type `{ty}` has no field `{field}`")]
    UnknownField { field: String, ty: String },

    #[error("missing field `{field}` for record type `{ty}`")]
    MissingField { field: String, ty: String },

    #[error("`{name}` takes {expected} argument(s) but {found} were supplied")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("{construct} body must produce no value, found `{found}`")]
    BodyProducesValue { construct: &'static str, found: String },

    #[error("nil initializer requires a declared record type")]
    UntypedNil,

    #[error("function `{0}` is declared more than once in the same group")]
    DuplicateFunction(String),

    #[error("type `{0}` is declared more than once in the same group")]
    DuplicateType(String),

    #[error("field `{0}` is declared more than once")]
    DuplicateField(String),

    #[error("illegal type cycle through `{0}`")]
    IllegalCycle(String),

    #[error("cannot assign to loop variable `{0}`")]
    LoopVariableAssignment(String),

    #[error("break outside of a loop")]
    BreakOutsideLoop,
}

impl ErrorKind {
    pub fn category(&self) -> Category {
        match self {
            ErrorKind::UndefinedVariable(_)
            | ErrorKind::UndefinedFunction(_)
            | ErrorKind::UndefinedType(_) => Category::UndefinedName,
            ErrorKind::NotAVariable(_)
            | ErrorKind::NotAFunction(_)
            | ErrorKind::IntegerRequired { .. }
            | ErrorKind::TypeMismatch { .. }
            | ErrorKind::OperandMismatch { .. }
            | ErrorKind::NotOrdered { .. }
            | ErrorKind::BranchMismatch { .. }
            | ErrorKind::NotARecord(_)
            | ErrorKind::NotAnArray(_)
            | ErrorKind::UnknownField { .. }
            | ErrorKind::MissingField { .. }
            | ErrorKind::BodyProducesValue { .. }
            | ErrorKind::UntypedNil => Category::KindMismatch,
            ErrorKind::ArityMismatch { .. } => Category::ArityMismatch,
            ErrorKind::DuplicateFunction(_)
            | ErrorKind::DuplicateType(_)
            | ErrorKind::DuplicateField(_) => Category::DuplicateDefinition,
            ErrorKind::IllegalCycle(_) => Category::IllegalCycle,
            ErrorKind::LoopVariableAssignment(_) => Category::InvalidMutation,
            ErrorKind::BreakOutsideLoop => Category::InvalidBreak,
        }
    }
}

/// A semantic error at a source position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub span: Span,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}..{}", self.kind, self.span.start, self.span.end)
    }
}

impl std::error::Error for Diagnostic {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let d = Diagnostic {
            kind: ErrorKind::TypeMismatch {
                expected: "string".to_string(),
                found: "int".to_string(),
            },
            span: Span::new(4, 9),
        };
        assert_eq!(d.to_string(), "type mismatch: expected `string`, found `int` at 4..9");
    }

    #[test]
    fn test_categories() {
        assert_eq!(ErrorKind::IllegalCycle("a".into()).category(), Category::IllegalCycle);
        assert_eq!(
            ErrorKind::LoopVariableAssignment("i".into()).category(),
            Category::InvalidMutation
        );
        assert_eq!(ErrorKind::UndefinedType("t".into()).category(), Category::UndefinedName);
    }
}
