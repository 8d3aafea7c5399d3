//! Дерево разбора и текстовый формат обмена между стадиями.
//!
//! Дерево принадлежит владельцу строго сверху вниз: каждый узел
//! эксклюзивно владеет своими детьми, циклов и разделяемых ссылок нет,
//! поэтому освобождение - обычный рекурсивный `Drop`.
//!
//! Формат обмена построчный, без отступов:
//! - терминал: `KIND LEXEME [: TYPE]`
//! - нетерминал: `LHS RHS-SYMBOL... [.EMPTY] [: TYPE]`, затем рекурсивно
//!   по одному поддереву на каждый непустой символ правой части.
//!
//! Аннотация `: int` / `: int*` появляется только после проверки типов.

use crate::error::InternalError;
use crate::parser::{ParseError, Rule};
use crate::productions::Production;
use crate::types::Type;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Метка узла: терминал со своей лексемой или продукция грамматики.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    /// Лист дерева - токен.
    Terminal { kind: String, lexeme: String },
    /// Внутренний узел - применённое правило. Классифицированная
    /// продукция кешируется при построении узла.
    Nonterminal {
        rule: Rule,
        production: Option<Production>,
    },
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Terminal { kind, lexeme } => write!(f, "{} {}", kind, lexeme),
            Label::Nonterminal { rule, .. } => write!(f, "{}", rule),
        }
    }
}

/// Узел дерева разбора.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    pub label: Label,
    pub children: Vec<Tree>,
    ty: Option<Type>,
}

impl Tree {
    /// Создать терминальный узел.
    pub fn terminal(kind: impl Into<String>, lexeme: impl Into<String>) -> Self {
        Self {
            label: Label::Terminal {
                kind: kind.into(),
                lexeme: lexeme.into(),
            },
            children: Vec::new(),
            ty: None,
        }
    }

    /// Создать нетерминальный узел; продукция классифицируется здесь же.
    pub fn nonterminal(rule: Rule, children: Vec<Tree>) -> Self {
        let production = Production::classify(&rule);
        Self {
            label: Label::Nonterminal { rule, production },
            children,
            ty: None,
        }
    }

    /// Терминальный ли узел.
    pub fn is_terminal(&self) -> bool {
        matches!(self.label, Label::Terminal { .. })
    }

    /// Вид токена (для терминала).
    pub fn kind(&self) -> Option<&str> {
        match &self.label {
            Label::Terminal { kind, .. } => Some(kind),
            Label::Nonterminal { .. } => None,
        }
    }

    /// Лексема токена (для терминала).
    pub fn lexeme(&self) -> Option<&str> {
        match &self.label {
            Label::Terminal { lexeme, .. } => Some(lexeme),
            Label::Nonterminal { .. } => None,
        }
    }

    /// Левая часть правила (для нетерминала).
    pub fn lhs(&self) -> Option<&str> {
        match &self.label {
            Label::Terminal { .. } => None,
            Label::Nonterminal { rule, .. } => Some(&rule.lhs),
        }
    }

    /// Правило узла (для нетерминала).
    pub fn rule(&self) -> Option<&Rule> {
        match &self.label {
            Label::Terminal { .. } => None,
            Label::Nonterminal { rule, .. } => Some(rule),
        }
    }

    /// Классифицированная продукция узла.
    pub fn production(&self) -> Option<Production> {
        match &self.label {
            Label::Terminal { .. } => None,
            Label::Nonterminal { production, .. } => *production,
        }
    }

    /// Продукция узла или внутренняя ошибка для чужого правила.
    pub fn production_or_err(&self) -> Result<Production, InternalError> {
        self.production()
            .ok_or_else(|| InternalError::UnknownProduction(self.label.to_string()))
    }

    /// Лексема терминала или внутренняя ошибка.
    pub fn expect_lexeme(&self) -> Result<&str, InternalError> {
        self.lexeme()
            .ok_or_else(|| InternalError::shape(format!("'{}' is not a terminal", self.label)))
    }

    /// Тип узла, если он уже проставлен.
    pub fn ty(&self) -> Option<Type> {
        self.ty
    }

    /// Тип узла или внутренняя ошибка: потребитель запросил тип раньше,
    /// чем его записала проверка типов.
    pub fn expect_ty(&self) -> Result<Type, InternalError> {
        self.ty.ok_or(InternalError::MissingType)
    }

    /// Проставить тип. Записывается ровно один раз, во время прохода
    /// аннотации; перезапись - ошибка логики вызывающего.
    pub fn set_ty(&mut self, ty: Type) {
        debug_assert!(self.ty.is_none(), "node type must be written once");
        self.ty = Some(ty);
    }

    // === Формат обмена ===

    /// Закодировать дерево в построчный текст.
    pub fn encode(&self, out: &mut String) {
        out.push_str(&self.label.to_string());
        if let Some(ty) = self.ty {
            out.push_str(" : ");
            out.push_str(&ty.to_string());
        }
        out.push('\n');
        for child in &self.children {
            child.encode(out);
        }
    }

    /// Закодировать дерево в новую строку.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        self.encode(&mut out);
        out
    }

    /// Раскодировать дерево из построчного текста.
    pub fn decode(text: &str) -> Result<Tree, ParseError> {
        let mut lines = text.lines().filter(|line| !line.trim().is_empty());
        decode_node(&mut lines)
    }
}

fn decode_node<'a, I>(lines: &mut I) -> Result<Tree, ParseError>
where
    I: Iterator<Item = &'a str>,
{
    // Глубина рекурсии равна высоте дерева; страхуемся от переполнения
    // стека на глубоких выражениях (256KB red zone, 8MB роста).
    stacker::maybe_grow(256 * 1024, 8 * 1024 * 1024, || {
        let line = lines.next().ok_or(ParseError::UnexpectedTreeEnd)?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        let first = *fields.first().ok_or(ParseError::UnexpectedTreeEnd)?;

        if first.starts_with(|c: char| c.is_ascii_uppercase()) {
            decode_terminal(line, &fields)
        } else {
            decode_nonterminal(line, &fields, lines)
        }
    })
}

fn decode_terminal(line: &str, fields: &[&str]) -> Result<Tree, ParseError> {
    let (kind, lexeme) = match fields {
        [kind, lexeme] | [kind, lexeme, ":", _] => (*kind, *lexeme),
        _ => return Err(ParseError::MalformedTreeLine(line.to_string())),
    };
    let mut node = Tree::terminal(kind, lexeme);
    if let [_, _, ":", annotation] = fields {
        let ty = Type::from_annotation(annotation)
            .ok_or_else(|| ParseError::InvalidTypeAnnotation((*annotation).to_string()))?;
        node.set_ty(ty);
    }
    Ok(node)
}

fn decode_nonterminal<'a, I>(line: &str, fields: &[&str], lines: &mut I) -> Result<Tree, ParseError>
where
    I: Iterator<Item = &'a str>,
{
    let lhs = fields[0];
    let mut rhs = Vec::new();
    let mut ty = None;
    let mut saw_empty = false;

    let mut rest = fields[1..].iter();
    while let Some(&field) = rest.next() {
        match field {
            ":" => {
                let annotation = rest
                    .next()
                    .ok_or_else(|| ParseError::MalformedTreeLine(line.to_string()))?;
                ty = Some(
                    Type::from_annotation(annotation)
                        .ok_or_else(|| ParseError::InvalidTypeAnnotation(annotation.to_string()))?,
                );
                if rest.next().is_some() {
                    return Err(ParseError::MalformedTreeLine(line.to_string()));
                }
            }
            crate::parser::EMPTY_MARKER => saw_empty = true,
            symbol => rhs.push(symbol.to_string()),
        }
    }
    if saw_empty && !rhs.is_empty() {
        return Err(ParseError::MalformedTreeLine(line.to_string()));
    }

    let mut children = Vec::with_capacity(rhs.len());
    for _ in 0..rhs.len() {
        children.push(decode_node(lines)?);
    }

    let mut node = Tree::nonterminal(Rule::new(lhs, rhs), children);
    if let Some(ty) = ty {
        node.set_ty(ty);
    }
    Ok(node)
}
