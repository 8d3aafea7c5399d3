//! Ошибки парсера и чтения входных данных.

use thiserror::Error;

/// Ошибка разбора: поток токенов, данные таблиц или текст дерева.
#[derive(Error, Debug)]
pub enum ParseError {
    /// Нет сдвига для пары (состояние, токен).
    #[error("unexpected token '{lexeme}' ({kind}) at position {index}")]
    UnexpectedToken {
        index: usize,
        kind: String,
        lexeme: String,
    },

    /// Нет перехода по нетерминалу после свёртки - таблицы повреждены.
    #[error("no transition from state {state} on '{symbol}'")]
    MissingGoto { state: usize, symbol: String },

    /// Строка потока токенов не имеет вида `KIND LEXEME`.
    #[error("malformed token on line {line}: '{text}'")]
    MalformedToken { line: usize, text: String },

    /// Строка таблицы не разбирается.
    #[error("malformed table entry on line {line}: '{text}'")]
    MalformedTable { line: usize, text: String },

    /// В данных таблиц отсутствует обязательная секция.
    #[error("missing '{0}' section in the table data")]
    MissingSection(&'static str),

    /// Текст дерева закончился раньше, чем ожидали его строки-правила.
    #[error("unexpected end of tree text")]
    UnexpectedTreeEnd,

    /// Строка текста дерева не разбирается.
    #[error("malformed tree line: '{0}'")]
    MalformedTreeLine(String),

    /// Непонятная аннотация типа в тексте дерева.
    #[error("invalid type annotation '{0}'")]
    InvalidTypeAnnotation(String),
}

impl ParseError {
    /// Создать ошибку "плохая строка токена".
    pub fn malformed_token(line: usize, text: impl Into<String>) -> Self {
        Self::MalformedToken {
            line,
            text: text.into(),
        }
    }

    /// Создать ошибку "плохая строка таблицы".
    pub fn malformed_table(line: usize, text: impl Into<String>) -> Self {
        Self::MalformedTable {
            line,
            text: text.into(),
        }
    }
}
