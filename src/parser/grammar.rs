//! Грамматика и таблицы LR-автомата.
//!
//! Парсер не знает язык заранее: правила и обе таблицы переходов приходят
//! как данные. Текстовый формат - три секции:
//!
//! ```text
//! .CFG
//! LHS RHS-SYMBOL... [.EMPTY]
//! .TRANSITIONS
//! STATE SYMBOL STATE
//! .REDUCTIONS
//! STATE RULE SYMBOL
//! ```
//!
//! Правило номер 0 считается стартовым: им выполняется финальная свёртка.

use super::error::ParseError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Маркер пустой правой части в текстовых форматах.
pub const EMPTY_MARKER: &str = ".EMPTY";

const CFG_SECTION: &str = ".CFG";
const TRANSITIONS_SECTION: &str = ".TRANSITIONS";
const REDUCTIONS_SECTION: &str = ".REDUCTIONS";

/// Продукция грамматики: левая часть и упорядоченная правая часть.
/// Идентичность чисто структурная.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub lhs: String,
    pub rhs: Vec<String>,
}

impl Rule {
    /// Создать правило.
    pub fn new(lhs: impl Into<String>, rhs: Vec<String>) -> Self {
        Self {
            lhs: lhs.into(),
            rhs,
        }
    }

    /// Длина правой части (0 для ε-продукции).
    pub fn rhs_len(&self) -> usize {
        self.rhs.len()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lhs)?;
        if self.rhs.is_empty() {
            write!(f, " {}", EMPTY_MARKER)?;
        } else {
            for symbol in &self.rhs {
                write!(f, " {}", symbol)?;
            }
        }
        Ok(())
    }
}

/// Набор правил, индексируемых номером.
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    rules: Vec<Rule>,
}

impl Grammar {
    /// Создать грамматику из готового списка правил.
    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Правило по номеру.
    pub fn rule(&self, number: usize) -> Option<&Rule> {
        self.rules.get(number)
    }

    /// Количество правил.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Пуста ли грамматика.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Две конечные таблицы LR-автомата: переходы (сдвиг/goto) и свёртки.
#[derive(Debug, Clone, Default)]
pub struct ParseTables {
    transitions: HashMap<usize, HashMap<String, usize>>,
    reductions: HashMap<usize, HashMap<String, usize>>,
}

impl ParseTables {
    /// Создать пустые таблицы.
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавить переход `(state, symbol) -> next`.
    pub fn insert_transition(&mut self, state: usize, symbol: impl Into<String>, next: usize) {
        self.transitions
            .entry(state)
            .or_default()
            .insert(symbol.into(), next);
    }

    /// Добавить свёртку `(state, lookahead) -> rule`.
    pub fn insert_reduction(&mut self, state: usize, symbol: impl Into<String>, rule: usize) {
        self.reductions
            .entry(state)
            .or_default()
            .insert(symbol.into(), rule);
    }

    /// Найти переход; `None`, если его нет.
    pub fn transition(&self, state: usize, symbol: &str) -> Option<usize> {
        self.transitions.get(&state).and_then(|m| m.get(symbol)).copied()
    }

    /// Найти свёртку по предпросмотру; `None`, если её нет.
    pub fn reduction(&self, state: usize, symbol: &str) -> Option<usize> {
        self.reductions.get(&state).and_then(|m| m.get(symbol)).copied()
    }
}

/// Разобрать файл с тремя секциями в грамматику и таблицы.
pub fn parse_table_file(input: &str) -> Result<(Grammar, ParseTables), ParseError> {
    #[derive(PartialEq)]
    enum Section {
        None,
        Cfg,
        Transitions,
        Reductions,
    }

    let mut section = Section::None;
    let mut seen_cfg = false;
    let mut seen_transitions = false;
    let mut seen_reductions = false;
    let mut rules = Vec::new();
    let mut tables = ParseTables::new();

    for (number, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line {
            CFG_SECTION => {
                section = Section::Cfg;
                seen_cfg = true;
                continue;
            }
            TRANSITIONS_SECTION => {
                section = Section::Transitions;
                seen_transitions = true;
                continue;
            }
            REDUCTIONS_SECTION => {
                section = Section::Reductions;
                seen_reductions = true;
                continue;
            }
            _ => {}
        }

        let mut parts = line.split_whitespace();
        match section {
            Section::None => {
                return Err(ParseError::malformed_table(number + 1, line));
            }
            Section::Cfg => {
                let lhs = parts
                    .next()
                    .ok_or_else(|| ParseError::malformed_table(number + 1, line))?;
                let mut rhs = Vec::new();
                for symbol in parts {
                    if symbol == EMPTY_MARKER {
                        break;
                    }
                    rhs.push(symbol.to_string());
                }
                rules.push(Rule::new(lhs, rhs));
            }
            Section::Transitions => {
                let (state, symbol, next) = three_fields(line, number + 1, &mut parts)?;
                let state = parse_state(state, number + 1, line)?;
                let next = parse_state(next, number + 1, line)?;
                tables.insert_transition(state, symbol, next);
            }
            Section::Reductions => {
                let (state, rule, symbol) = three_fields(line, number + 1, &mut parts)?;
                let state = parse_state(state, number + 1, line)?;
                let rule = parse_state(rule, number + 1, line)?;
                tables.insert_reduction(state, symbol, rule);
            }
        }
    }

    if !seen_cfg {
        return Err(ParseError::MissingSection(CFG_SECTION));
    }
    if !seen_transitions {
        return Err(ParseError::MissingSection(TRANSITIONS_SECTION));
    }
    if !seen_reductions {
        return Err(ParseError::MissingSection(REDUCTIONS_SECTION));
    }

    log::debug!("loaded {} grammar rules", rules.len());
    Ok((Grammar::from_rules(rules), tables))
}

fn three_fields<'a>(
    line: &str,
    number: usize,
    parts: &mut impl Iterator<Item = &'a str>,
) -> Result<(&'a str, &'a str, &'a str), ParseError> {
    let a = parts
        .next()
        .ok_or_else(|| ParseError::malformed_table(number, line))?;
    let b = parts
        .next()
        .ok_or_else(|| ParseError::malformed_table(number, line))?;
    let c = parts
        .next()
        .ok_or_else(|| ParseError::malformed_table(number, line))?;
    Ok((a, b, c))
}

fn parse_state(field: &str, number: usize, line: &str) -> Result<usize, ParseError> {
    field
        .parse()
        .map_err(|_| ParseError::malformed_table(number, line))
}
