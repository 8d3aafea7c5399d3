//! Модуль `pipeline`
//!
//! Полный конвейер компиляции: токены → дерево → аннотированное дерево →
//! ассемблер. Каждая стадия - одноразовое пакетное преобразование;
//! ошибка любой стадии прерывает прогон без частичного вывода.

use log::debug;

use crate::codegen;
use crate::error::CompileResult;
use crate::parser::{parse, parse_table_file, read_tokens};
use crate::type_checker;
use crate::tree::Tree;

/// Скомпилировать поток токенов в текст ассемблера.
///
/// `token_text` - выход внешнего сканера (`KIND LEXEME` построчно),
/// `table_text` - грамматика и таблицы LR-автомата (секции `.CFG`,
/// `.TRANSITIONS`, `.REDUCTIONS`).
pub fn compile(token_text: &str, table_text: &str) -> CompileResult<String> {
    let (grammar, tables) = parse_table_file(table_text)?;
    let tokens = read_tokens(token_text)?;
    let mut tree = parse(&tokens, &grammar, &tables)?;
    debug!("parsed a tree spanning {} tokens", tokens.len());
    type_checker::check(&mut tree)?;
    codegen::generate(&tree)
}

/// Проверить типы дерева, заданного текстом формата обмена, и вернуть
/// аннотированный текст.
pub fn annotate_tree_text(tree_text: &str) -> CompileResult<String> {
    let mut tree = Tree::decode(tree_text)?;
    type_checker::check(&mut tree)?;
    Ok(tree.to_text())
}

/// Сгенерировать ассемблер по аннотированному тексту дерева.
pub fn generate_from_tree_text(tree_text: &str) -> CompileResult<String> {
    let tree = Tree::decode(tree_text)?;
    codegen::generate(&tree)
}
