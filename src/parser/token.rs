//! Токены MiniC в том виде, в каком их выдаёт внешний сканер.
//!
//! Контракт потока: одна строка на токен, `KIND LEXEME`. Виды токенов -
//! строковые метки (`ID`, `NUM`, `PLUS`, ...); их множество задаётся
//! данными грамматики, а не этим модулем. Зарезервированы три вида:
//! `BOF`/`EOF` обрамляют поток, а `NEWLINE` - разделитель, который
//! читатель отфильтровывает, чтобы парсер никогда не рассматривал его
//! как сдвигаемый символ.

use super::error::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Вид токена начала потока.
pub const BOF: &str = "BOF";
/// Вид токена конца потока.
pub const EOF: &str = "EOF";
/// Вид токена-разделителя, отбрасываемого при чтении.
pub const SEPARATOR: &str = "NEWLINE";

/// Токен: вид плюс лексема. Неизменяем после создания.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: String,
    pub lexeme: String,
}

impl Token {
    /// Создать новый токен.
    pub fn new(kind: impl Into<String>, lexeme: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            lexeme: lexeme.into(),
        }
    }

    /// Токен-разделитель (конец строки/инструкции сканера)?
    pub fn is_separator(&self) -> bool {
        self.kind == SEPARATOR
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.lexeme)
    }
}

/// Прочитать поток токенов из текста сканера.
///
/// Пустые строки и разделители пропускаются; если поток не обрамлён
/// токенами `BOF`/`EOF`, читатель добавляет их сам.
pub fn read_tokens(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();

    for (number, line) in input.lines().enumerate() {
        let mut parts = line.split_whitespace();
        let kind = match parts.next() {
            Some(kind) => kind,
            None => continue, // пустая строка
        };
        if kind == SEPARATOR {
            continue;
        }
        let lexeme = parts
            .next()
            .ok_or_else(|| ParseError::malformed_token(number + 1, line.trim()))?;
        tokens.push(Token::new(kind, lexeme));
    }

    if tokens.first().map(|t| t.kind.as_str()) != Some(BOF) {
        tokens.insert(0, Token::new(BOF, BOF));
    }
    if tokens.last().map(|t| t.kind.as_str()) != Some(EOF) {
        tokens.push(Token::new(EOF, EOF));
    }

    log::debug!("read {} tokens", tokens.len());
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_tokens_brackets_stream() {
        let tokens = read_tokens("ID a\nPLUS +\nID b\n").unwrap();
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[0], Token::new("BOF", "BOF"));
        assert_eq!(tokens[1], Token::new("ID", "a"));
        assert_eq!(tokens[4], Token::new("EOF", "EOF"));
    }

    #[test]
    fn test_read_tokens_keeps_existing_brackets() {
        let tokens = read_tokens("BOF BOF\nID a\nEOF EOF\n").unwrap();
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_read_tokens_skips_separators_and_blank_lines() {
        let tokens = read_tokens("ID a\nNEWLINE\n\nID b\n").unwrap();
        let kinds: Vec<&str> = tokens.iter().map(|t| t.kind.as_str()).collect();
        assert_eq!(kinds, vec!["BOF", "ID", "ID", "EOF"]);
    }

    #[test]
    fn test_read_tokens_rejects_missing_lexeme() {
        assert!(read_tokens("ID\n").is_err());
    }
}
