//! Модуль синтаксического разбора.
//!
//! Состав:
//! - [`token`] - токены внешнего сканера и чтение их потока
//! - [`grammar`] - правила грамматики и таблицы LR-автомата
//! - [`engine`] - табличный shift-reduce движок
//! - [`error`] - ошибки разбора
//!
//! Сканер сюда не входит: парсер потребляет только его выходной контракт,
//! последовательность пар `(вид, лексема)`. Грамматика и таблицы тоже
//! приходят как данные; их происхождение парсеру безразлично.
//!
//! # Пример
//!
//! ```rust,ignore
//! use minic_lang::parser::{parse, parse_table_file, read_tokens};
//!
//! let (grammar, tables) = parse_table_file(&table_text)?;
//! let tokens = read_tokens(&token_text)?;
//! let tree = parse(&tokens, &grammar, &tables)?;
//! ```

pub mod engine;
pub mod error;
pub mod grammar;
pub mod token;

pub use engine::Parser;
pub use error::ParseError;
pub use grammar::{parse_table_file, Grammar, ParseTables, Rule, EMPTY_MARKER};
pub use token::{read_tokens, Token};

use crate::error::CompileResult;
use crate::tree::Tree;

/// Разобрать поток токенов в дерево, охватывающее весь вход.
pub fn parse(tokens: &[Token], grammar: &Grammar, tables: &ParseTables) -> CompileResult<Tree> {
    Parser::new(grammar, tables).parse(tokens)
}
