//! MiniC CLI - драйвер конвейера компиляции.
//!
//! Использование:
//!   minic parse <tables>      - разобрать токены (stdin) в дерево
//!   minic typecheck           - аннотировать дерево (stdin) типами
//!   minic codegen             - сгенерировать ассемблер по дереву (stdin)
//!   minic compile <tables>    - полный конвейер: токены → ассемблер
//!
//! Единственное место, где ошибки превращаются в диагностику: одна
//! строка `ERROR: ...` в stderr и ненулевой код возврата, частичный
//! вывод не печатается.

use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;

use minic_lang::codegen;
use minic_lang::parser::{parse, read_tokens, Grammar, ParseTables};
use minic_lang::pipeline;
use minic_lang::tree::Tree;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP: &str = r#"
MiniC - compiler for a small C-like teaching language targeting MIPS

USAGE:
    minic parse <tables>      Parse a token stream (stdin) into a tree
    minic typecheck           Annotate a tree (stdin) with types
    minic codegen             Generate assembly from an annotated tree (stdin)
    minic compile <tables>    Full pipeline: token stream (stdin) to assembly
    minic --help, -h          Show this help
    minic --version, -v       Show version

INPUT CONTRACTS:
    tokens   One `KIND LEXEME` pair per line (scanner output)
    tables   Sections .CFG / .TRANSITIONS / .REDUCTIONS
    tree     Line-oriented interchange format produced by `parse`

EXAMPLES:
    minic parse tables.lr1 < program.tokens
    minic parse tables.lr1 < program.tokens | minic typecheck | minic codegen
    minic compile tables.lr1 < program.tokens > program.asm
"#;

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    let result = match args.len() {
        2 => match args[1].as_str() {
            "--help" | "-h" => {
                println!("{}", HELP);
                Ok(())
            }
            "--version" | "-v" => {
                println!("minic {}", VERSION);
                Ok(())
            }
            "typecheck" => run_typecheck(),
            "codegen" => run_codegen(),
            command => {
                eprintln!("Unknown command: {}", command);
                eprintln!("Use --help for usage information.");
                process::exit(1);
            }
        },
        3 => match args[1].as_str() {
            "parse" => run_parse(&args[2]),
            "compile" => run_compile(&args[2]),
            command => {
                eprintln!("Unknown command: {}", command);
                eprintln!("Use --help for usage information.");
                process::exit(1);
            }
        },
        _ => {
            eprintln!("Expected a command.");
            eprintln!("Use --help for usage information.");
            process::exit(1);
        }
    };

    if let Err(message) = result {
        eprintln!("ERROR: {}", message);
        process::exit(1);
    }
}

/// Разобрать токены из stdin и напечатать дерево.
fn run_parse(tables_path: &str) -> Result<(), String> {
    let (grammar, tables) = load_tables(tables_path)?;
    let tokens = read_tokens(&read_stdin()?).map_err(|e| e.to_string())?;
    let tree = parse(&tokens, &grammar, &tables).map_err(|e| e.to_string())?;
    print!("{}", tree.to_text());
    Ok(())
}

/// Аннотировать дерево из stdin типами.
fn run_typecheck() -> Result<(), String> {
    let annotated = pipeline::annotate_tree_text(&read_stdin()?).map_err(|e| e.to_string())?;
    print!("{}", annotated);
    Ok(())
}

/// Сгенерировать ассемблер по аннотированному дереву из stdin.
fn run_codegen() -> Result<(), String> {
    let tree = Tree::decode(&read_stdin()?).map_err(|e| e.to_string())?;
    let asm = codegen::generate(&tree).map_err(|e| e.to_string())?;
    print!("{}", asm);
    Ok(())
}

/// Полный конвейер: токены из stdin, ассемблер в stdout.
fn run_compile(tables_path: &str) -> Result<(), String> {
    let table_text = read_file(tables_path)?;
    let asm = pipeline::compile(&read_stdin()?, &table_text).map_err(|e| e.to_string())?;
    print!("{}", asm);
    Ok(())
}

/// Загрузить грамматику и таблицы из файла.
fn load_tables(path: &str) -> Result<(Grammar, ParseTables), String> {
    let text = read_file(path)?;
    minic_lang::parse_table_file(&text).map_err(|e| e.to_string())
}

fn read_file(path: &str) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("cannot read '{}': {}", path, e))
}

fn read_stdin() -> Result<String, String> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .map_err(|e| format!("cannot read stdin: {}", e))?;
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_tables_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            ".CFG\nstart BOF expr EOF\nexpr term\n.TRANSITIONS\n0 BOF 1\n.REDUCTIONS\n3 1 EOF\n"
        )
        .unwrap();
        let (grammar, tables) = load_tables(file.path().to_str().unwrap()).unwrap();
        assert_eq!(grammar.len(), 2);
        assert_eq!(tables.transition(0, "BOF"), Some(1));
    }

    #[test]
    fn test_load_tables_reports_missing_file() {
        let result = load_tables("/nonexistent/tables.lr1");
        assert!(result.is_err());
    }
}
