//! Табличный shift-reduce парсер.
//!
//! Движок не знает ничего про конкретный язык: правила и таблицы приходят
//! извне. Два параллельных стека - состояний автомата и построенных
//! поддеревьев. Перед каждым сдвигом выполняются все доступные свёртки по
//! текущему предпросмотру (в таблицах LALR-автомата предпочтение свёртки
//! уже разрешено); затем сдвиг. Отсутствие сдвига - синтаксическая ошибка.
//! После последнего токена остаток стека сворачивается правилом номер 0.

use super::error::ParseError;
use super::grammar::{Grammar, ParseTables};
use super::token::Token;
use crate::error::{CompileResult, InternalError};
use crate::tree::Tree;
use log::trace;

/// Shift-reduce парсер над заданной грамматикой и таблицами.
pub struct Parser<'a> {
    grammar: &'a Grammar,
    tables: &'a ParseTables,
}

impl<'a> Parser<'a> {
    /// Создать парсер.
    pub fn new(grammar: &'a Grammar, tables: &'a ParseTables) -> Self {
        Self { grammar, tables }
    }

    /// Разобрать поток токенов в одно дерево, охватывающее весь вход.
    pub fn parse(&self, tokens: &[Token]) -> CompileResult<Tree> {
        let mut states: Vec<usize> = vec![0];
        let mut trees: Vec<Tree> = Vec::new();

        for (index, token) in tokens.iter().enumerate() {
            while let Some(rule_number) = self
                .tables
                .reduction(self.top_state(&states)?, &token.kind)
            {
                self.reduce(rule_number, &mut states, &mut trees)?;
            }

            let state = self.top_state(&states)?;
            match self.tables.transition(state, &token.kind) {
                Some(next) => {
                    trace!("shift '{}' from state {} to {}", token.kind, state, next);
                    trees.push(Tree::terminal(token.kind.clone(), token.lexeme.clone()));
                    states.push(next);
                }
                None => {
                    return Err(ParseError::UnexpectedToken {
                        index,
                        kind: token.kind.clone(),
                        lexeme: token.lexeme.clone(),
                    }
                    .into());
                }
            }
        }

        // Финальная свёртка стартовым правилом: остаток стека должен
        // сложиться ровно в один корень.
        let start = self
            .grammar
            .rule(0)
            .ok_or(InternalError::UnknownRule(0))?;
        if trees.len() != start.rhs_len() {
            return Err(InternalError::UnbalancedParseStack(trees.len()).into());
        }
        let children = std::mem::take(&mut trees);
        Ok(Tree::nonterminal(start.clone(), children))
    }

    fn reduce(
        &self,
        rule_number: usize,
        states: &mut Vec<usize>,
        trees: &mut Vec<Tree>,
    ) -> CompileResult<()> {
        let rule = self
            .grammar
            .rule(rule_number)
            .ok_or(InternalError::UnknownRule(rule_number))?;
        let len = rule.rhs_len();
        if trees.len() < len || states.len() < len + 1 {
            return Err(InternalError::UnbalancedParseStack(trees.len()).into());
        }
        trace!("reduce by rule {}: {}", rule_number, rule);

        let children = trees.split_off(trees.len() - len);
        trees.push(Tree::nonterminal(rule.clone(), children));

        states.truncate(states.len() - len);
        let top = self.top_state(states)?;
        let next = self
            .tables
            .transition(top, &rule.lhs)
            .ok_or_else(|| ParseError::MissingGoto {
                state: top,
                symbol: rule.lhs.clone(),
            })?;
        states.push(next);
        Ok(())
    }

    fn top_state(&self, states: &[usize]) -> CompileResult<usize> {
        states
            .last()
            .copied()
            .ok_or_else(|| InternalError::shape("state stack underflow").into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::grammar::parse_table_file;
    use crate::parser::token::read_tokens;

    // Небольшая самостоятельная грамматика сумм: движок одинаково
    // работает с любыми корректными LR-таблицами.
    const SUM_TABLES: &str = "\
.CFG
start BOF expr EOF
expr expr PLUS term
expr term
term ID
.TRANSITIONS
0 BOF 1
1 expr 2
1 term 3
1 ID 4
2 EOF 5
2 PLUS 6
6 term 7
6 ID 4
.REDUCTIONS
3 2 PLUS
3 2 EOF
4 3 PLUS
4 3 EOF
7 1 PLUS
7 1 EOF
";

    fn parse_text(tokens: &str) -> CompileResult<Tree> {
        let (grammar, tables) = parse_table_file(SUM_TABLES).unwrap();
        let tokens = read_tokens(tokens).unwrap();
        Parser::new(&grammar, &tables).parse(&tokens)
    }

    #[test]
    fn test_parse_single_identifier() {
        let tree = parse_text("ID a\n").unwrap();
        assert_eq!(tree.lhs(), Some("start"));
        assert_eq!(tree.children.len(), 3);
        assert_eq!(tree.children[0].kind(), Some("BOF"));
        assert_eq!(tree.children[1].lhs(), Some("expr"));
        assert_eq!(tree.children[2].kind(), Some("EOF"));
    }

    #[test]
    fn test_parse_left_associative_sum() {
        let tree = parse_text("ID a\nPLUS +\nID b\nPLUS +\nID c\n").unwrap();
        let expr = &tree.children[1];
        // (a + b) + c: левое поддерево само является суммой
        assert_eq!(expr.rule().unwrap().to_string(), "expr expr PLUS term");
        assert_eq!(
            expr.children[0].rule().unwrap().to_string(),
            "expr expr PLUS term"
        );
        assert_eq!(expr.children[2].rule().unwrap().to_string(), "term ID");
    }

    #[test]
    fn test_parse_tree_survives_interchange_round_trip() {
        let tree = parse_text("ID a\nPLUS +\nID b\n").unwrap();
        let again = Tree::decode(&tree.to_text()).unwrap();
        assert_eq!(tree, again);
    }

    #[test]
    fn test_unexpected_token_is_reported() {
        let result = parse_text("PLUS +\nID a\n");
        match result {
            Err(crate::error::CompileError::Parse(ParseError::UnexpectedToken {
                kind, ..
            })) => assert_eq!(kind, "PLUS"),
            other => panic!("expected parse error, got {:?}", other.map(|t| t.to_text())),
        }
    }

    #[test]
    fn test_truncated_stream_is_reported() {
        // "a +" обрывается перед вторым слагаемым: EOF не сдвигается
        let result = parse_text("ID a\nPLUS +\n");
        assert!(matches!(
            result,
            Err(crate::error::CompileError::Parse(ParseError::UnexpectedToken { .. }))
        ));
    }
}
