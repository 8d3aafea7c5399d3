//! Определения ошибок компилятора MiniC.
//!
//! Три вида ошибок соответствуют трём стадиям конвейера:
//! - [`ParseError`] - синтаксис (парсер и чтение входных данных)
//! - [`SemanticError`] - семантика (проверка типов и таблицы символов)
//! - [`InternalError`] - внутренняя несогласованность (не должна возникать
//!   на дереве, прошедшем предыдущие стадии)
//!
//! Первая же нарушенная проверка прерывает весь прогон; восстановления нет.

use crate::parser::ParseError;
use thiserror::Error;

/// Основной тип `Result` для библиотеки.
pub type CompileResult<T> = Result<T, CompileError>;

/// Ошибка любой стадии конвейера.
#[derive(Error, Debug)]
pub enum CompileError {
    /// Ошибка разбора входа (токены, таблицы, текст дерева).
    #[error("{0}")]
    Parse(#[from] ParseError),

    /// Семантическая ошибка (типы, объявления, сигнатуры).
    #[error("{0}")]
    Semantic(#[from] SemanticError),

    /// Внутренняя несогласованность.
    #[error("{0}")]
    Internal(#[from] InternalError),
}

/// Семантическая ошибка: нарушение правил, не выразимых в грамматике.
#[derive(Error, Debug)]
pub enum SemanticError {
    #[error("duplicate declaration of '{0}'")]
    DuplicateVariable(String),

    #[error("use of undeclared variable '{0}'")]
    UndeclaredVariable(String),

    #[error("duplicate declaration of procedure '{0}'")]
    DuplicateProcedure(String),

    #[error("call to undeclared procedure '{0}'")]
    UndeclaredProcedure(String),

    #[error("'{0}' is a local variable, not a procedure")]
    CalleeIsVariable(String),

    #[error("invalid argument types in call to '{0}'")]
    BadCallArguments(String),

    #[error("second parameter of the entry point must be a plain int")]
    BadEntrySignature,

    #[error("{production}: {message}")]
    TypeMismatch { production: String, message: String },

    #[error("procedure '{0}' must return int")]
    BadReturnType(String),
}

impl SemanticError {
    /// Создать ошибку "несоответствие типов" для конкретной продукции.
    pub fn mismatch(production: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TypeMismatch {
            production: production.into(),
            message: message.into(),
        }
    }
}

/// Внутренняя ошибка: форма дерева или таблиц, недостижимая после
/// корректной предыдущей стадии.
#[derive(Error, Debug)]
pub enum InternalError {
    #[error("unrecognized production '{0}'")]
    UnknownProduction(String),

    #[error("unexpected tree shape: {0}")]
    UnexpectedShape(String),

    #[error("parse stack holds {0} subtrees, expected exactly one after the final reduction")]
    UnbalancedParseStack(usize),

    #[error("rule number {0} is not present in the grammar")]
    UnknownRule(usize),

    #[error("invalid numeric literal '{0}'")]
    InvalidLiteral(String),

    #[error("node is missing a type annotation")]
    MissingType,
}

impl InternalError {
    /// Создать ошибку "неожиданная форма дерева".
    pub fn shape(message: impl Into<String>) -> Self {
        Self::UnexpectedShape(message.into())
    }
}
