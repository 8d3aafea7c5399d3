//! # MiniC
//!
//! Библиотека компилятора небольшого C-подобного учебного языка в
//! MIPS-ассемблер.
//!
//! ## Основные модули
//!
//! - [`parser`] - табличный shift-reduce парсер (токены → дерево)
//! - [`tree`] - дерево разбора и текстовый формат обмена между стадиями
//! - [`productions`] - закрытый перечень продукций грамматики
//! - [`type_checker`] - двухпроходная семантическая проверка и аннотация
//! - [`codegen`] - генерация MIPS-ассемблера
//! - [`pipeline`] - сборка стадий в один конвейер
//! - [`types`] - система типов (`int` / `int*`)
//! - [`error`] - ошибки всех стадий
//!
//! Лексический сканер и кодирующий ассемблер - внешние участники:
//! библиотека потребляет поток `KIND LEXEME` и выдаёт текст инструкций.
//!
//! ## Пример использования конвейера
//!
//! ```rust,ignore
//! use minic_lang::pipeline::compile;
//!
//! let asm = compile(&token_text, &table_text)?;
//! print!("{}", asm);
//! ```

// === Основные модули ===
pub mod asm;
pub mod codegen;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod productions;
pub mod tree;
pub mod type_checker;
pub mod types;

// === Re-exports для удобства ===
pub use codegen::{generate, CodeGenerator};
pub use error::{CompileError, CompileResult, InternalError, SemanticError};
pub use parser::{parse, parse_table_file, read_tokens, Grammar, ParseError, ParseTables, Parser, Rule, Token};
pub use productions::Production;
pub use tree::{Label, Tree};
pub use type_checker::{check, Procedure, ProcedureTable, SymbolTable, TypeChecker};
pub use types::Type;
