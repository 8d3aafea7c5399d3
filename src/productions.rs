//! Закрытый перечень продукций грамматики MiniC.
//!
//! Проверка типов и генерация кода диспетчеризуются не по строке правила,
//! а по варианту этого перечисления; текстовая идентичность правила
//! остаётся только на границе формата обмена деревьями. Неизвестная
//! продукция превращается в `None` и на поздних стадиях означает
//! внутреннюю несогласованность.

use crate::parser::Rule;
use serde::{Deserialize, Serialize};

/// Продукция грамматики MiniC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Production {
    // === Каркас программы ===
    /// start → BOF procedures EOF
    Start,
    /// procedures → procedure procedures
    ProceduresProcedure,
    /// procedures → main
    ProceduresMain,
    /// procedure → INT ID ( params ) { dcls statements RETURN expr ; }
    Procedure,
    /// main → INT WAIN ( dcl , dcl ) { dcls statements RETURN expr ; }
    Main,

    // === Параметры и объявления ===
    /// params → ε
    ParamsEmpty,
    /// params → paramlist
    ParamsList,
    /// paramlist → dcl
    ParamlistDcl,
    /// paramlist → dcl , paramlist
    ParamlistCons,
    /// type → INT
    TypeInt,
    /// type → INT STAR
    TypeIntStar,
    /// dcls → ε
    DclsEmpty,
    /// dcls → dcls dcl = NUM ;
    DclsNum,
    /// dcls → dcls dcl = NULL ;
    DclsNull,
    /// dcl → type ID
    Dcl,

    // === Операторы ===
    /// statements → ε
    StatementsEmpty,
    /// statements → statements statement
    StatementsCons,
    /// statement → lvalue = expr ;
    StatementAssign,
    /// statement → IF ( test ) { statements } ELSE { statements }
    StatementIf,
    /// statement → WHILE ( test ) { statements }
    StatementWhile,
    /// statement → PRINTLN ( expr ) ;
    StatementPrintln,
    /// statement → DELETE [ ] expr ;
    StatementDelete,

    // === Сравнения ===
    /// test → expr == expr
    TestEq,
    /// test → expr != expr
    TestNe,
    /// test → expr < expr
    TestLt,
    /// test → expr <= expr
    TestLe,
    /// test → expr >= expr
    TestGe,
    /// test → expr > expr
    TestGt,

    // === Выражения ===
    /// expr → term
    ExprTerm,
    /// expr → expr + term
    ExprPlus,
    /// expr → expr - term
    ExprMinus,
    /// term → factor
    TermFactor,
    /// term → term * factor
    TermStar,
    /// term → term / factor
    TermSlash,
    /// term → term % factor
    TermPct,

    // === Факторы ===
    /// factor → ID
    FactorId,
    /// factor → NUM
    FactorNum,
    /// factor → NULL
    FactorNull,
    /// factor → ( expr )
    FactorParen,
    /// factor → & lvalue
    FactorAmp,
    /// factor → * factor
    FactorStar,
    /// factor → NEW INT [ expr ]
    FactorNew,
    /// factor → ID ( )
    FactorCall,
    /// factor → ID ( arglist )
    FactorCallArgs,
    /// arglist → expr
    ArglistExpr,
    /// arglist → expr , arglist
    ArglistCons,

    // === lvalue ===
    /// lvalue → ID
    LvalueId,
    /// lvalue → ( lvalue )
    LvalueParen,
    /// lvalue → * factor
    LvalueStar,
}

impl Production {
    /// Классифицировать правило; `None` для продукции вне языка.
    pub fn classify(rule: &Rule) -> Option<Production> {
        let rhs: Vec<&str> = rule.rhs.iter().map(String::as_str).collect();
        let production = match (rule.lhs.as_str(), rhs.as_slice()) {
            ("start", ["BOF", "procedures", "EOF"]) => Production::Start,
            ("procedures", ["procedure", "procedures"]) => Production::ProceduresProcedure,
            ("procedures", ["main"]) => Production::ProceduresMain,
            (
                "procedure",
                ["INT", "ID", "LPAREN", "params", "RPAREN", "LBRACE", "dcls", "statements", "RETURN", "expr", "SEMI", "RBRACE"],
            ) => Production::Procedure,
            (
                "main",
                ["INT", "WAIN", "LPAREN", "dcl", "COMMA", "dcl", "RPAREN", "LBRACE", "dcls", "statements", "RETURN", "expr", "SEMI", "RBRACE"],
            ) => Production::Main,
            ("params", []) => Production::ParamsEmpty,
            ("params", ["paramlist"]) => Production::ParamsList,
            ("paramlist", ["dcl"]) => Production::ParamlistDcl,
            ("paramlist", ["dcl", "COMMA", "paramlist"]) => Production::ParamlistCons,
            ("type", ["INT"]) => Production::TypeInt,
            ("type", ["INT", "STAR"]) => Production::TypeIntStar,
            ("dcls", []) => Production::DclsEmpty,
            ("dcls", ["dcls", "dcl", "BECOMES", "NUM", "SEMI"]) => Production::DclsNum,
            ("dcls", ["dcls", "dcl", "BECOMES", "NULL", "SEMI"]) => Production::DclsNull,
            ("dcl", ["type", "ID"]) => Production::Dcl,
            ("statements", []) => Production::StatementsEmpty,
            ("statements", ["statements", "statement"]) => Production::StatementsCons,
            ("statement", ["lvalue", "BECOMES", "expr", "SEMI"]) => Production::StatementAssign,
            (
                "statement",
                ["IF", "LPAREN", "test", "RPAREN", "LBRACE", "statements", "RBRACE", "ELSE", "LBRACE", "statements", "RBRACE"],
            ) => Production::StatementIf,
            (
                "statement",
                ["WHILE", "LPAREN", "test", "RPAREN", "LBRACE", "statements", "RBRACE"],
            ) => Production::StatementWhile,
            ("statement", ["PRINTLN", "LPAREN", "expr", "RPAREN", "SEMI"]) => {
                Production::StatementPrintln
            }
            ("statement", ["DELETE", "LBRACK", "RBRACK", "expr", "SEMI"]) => {
                Production::StatementDelete
            }
            ("test", ["expr", "EQ", "expr"]) => Production::TestEq,
            ("test", ["expr", "NE", "expr"]) => Production::TestNe,
            ("test", ["expr", "LT", "expr"]) => Production::TestLt,
            ("test", ["expr", "LE", "expr"]) => Production::TestLe,
            ("test", ["expr", "GE", "expr"]) => Production::TestGe,
            ("test", ["expr", "GT", "expr"]) => Production::TestGt,
            ("expr", ["term"]) => Production::ExprTerm,
            ("expr", ["expr", "PLUS", "term"]) => Production::ExprPlus,
            ("expr", ["expr", "MINUS", "term"]) => Production::ExprMinus,
            ("term", ["factor"]) => Production::TermFactor,
            ("term", ["term", "STAR", "factor"]) => Production::TermStar,
            ("term", ["term", "SLASH", "factor"]) => Production::TermSlash,
            ("term", ["term", "PCT", "factor"]) => Production::TermPct,
            ("factor", ["ID"]) => Production::FactorId,
            ("factor", ["NUM"]) => Production::FactorNum,
            ("factor", ["NULL"]) => Production::FactorNull,
            ("factor", ["LPAREN", "expr", "RPAREN"]) => Production::FactorParen,
            ("factor", ["AMP", "lvalue"]) => Production::FactorAmp,
            ("factor", ["STAR", "factor"]) => Production::FactorStar,
            ("factor", ["NEW", "INT", "LBRACK", "expr", "RBRACK"]) => Production::FactorNew,
            ("factor", ["ID", "LPAREN", "RPAREN"]) => Production::FactorCall,
            ("factor", ["ID", "LPAREN", "arglist", "RPAREN"]) => Production::FactorCallArgs,
            ("arglist", ["expr"]) => Production::ArglistExpr,
            ("arglist", ["expr", "COMMA", "arglist"]) => Production::ArglistCons,
            ("lvalue", ["ID"]) => Production::LvalueId,
            ("lvalue", ["LPAREN", "lvalue", "RPAREN"]) => Production::LvalueParen,
            ("lvalue", ["STAR", "factor"]) => Production::LvalueStar,
            _ => return None,
        };
        Some(production)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(lhs: &str, rhs: &[&str]) -> Rule {
        Rule::new(lhs, rhs.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_classify_expressions() {
        assert_eq!(
            Production::classify(&rule("expr", &["expr", "PLUS", "term"])),
            Some(Production::ExprPlus)
        );
        assert_eq!(
            Production::classify(&rule("factor", &["NEW", "INT", "LBRACK", "expr", "RBRACK"])),
            Some(Production::FactorNew)
        );
        assert_eq!(
            Production::classify(&rule("dcls", &[])),
            Some(Production::DclsEmpty)
        );
    }

    #[test]
    fn test_classify_rejects_foreign_rules() {
        assert_eq!(Production::classify(&rule("expr", &["expr", "OR", "term"])), None);
        assert_eq!(Production::classify(&rule("start", &["BOF", "expr", "EOF"])), None);
    }
}
