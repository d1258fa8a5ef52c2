//! Diagnostic types surfaced to the user.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    #[error("undefined identifier '{0}'")]
    UndefinedIdentifier(String),

    #[error("cannot assign to an undeclared name '{0}'")]
    AssignToUndeclared(String),

    #[error("expected an lvalue to call")]
    NonLvalueCall,

    #[error("expected an lvalue to take the address of")]
    NonLvalueAddressOf,

    #[error("expected an lvalue to increment")]
    NonLvalueIncrement,

    #[error("return used outside of a function")]
    ReturnOutsideFunction,

    #[error("cannot return a value from a void function")]
    VoidReturnValue,

    #[error("main function was not found")]
    MissingMain,

    #[error("too many arguments in call (max {max})")]
    TooManyArguments { max: usize },

    #[error("too many parameters in function definition (max {max})")]
    TooManyParams { max: usize },

    #[error("string data table is full (max {max} distinct literals)")]
    StringTableFull { max: usize },

    #[error("expected {expected}, but got {got}")]
    ParseExpected { expected: String, got: String },

    #[error("expected an expression")]
    ParseExpectedExpr,
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("no input file")]
    NoInputFile,

    #[error("failed to open {0}")]
    FailedToOpen(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
