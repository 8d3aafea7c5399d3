//! Модуль `type_checker`
//!
//! Двухпроходная семантическая проверка дерева разбора:
//!
//! 1. Сбор таблиц: для каждой процедуры (в порядке объявления) строится
//!    таблица символов и сигнатура, дескриптор попадает в таблицу процедур.
//!    Затем все узлы семейств `expr`/`term`/`factor`/`lvalue` аннотируются
//!    типами снизу вверх.
//! 2. Структурные проверки поверх уже аннотированного дерева: присваивания,
//!    `println`/`delete`, инициализаторы объявлений, типы возвращаемых
//!    выражений, сравнения.
//!
//! Вызов возможен только к уже собранной процедуре: обращение вперёд по
//! тексту программы отклоняется. Это ограничение языка, а не дефект
//! (см. DESIGN.md).
//!
//! Первая же нарушенная проверка прерывает проход целиком.

use std::collections::HashMap;

use log::debug;

use crate::error::{CompileResult, InternalError, SemanticError};
use crate::productions::Production;
use crate::tree::Tree;
use crate::types::Type;

// === Таблицы символов ===

/// Таблица символов одной процедуры: одно плоское пространство имён,
/// параметры и локальные объявления не должны сталкиваться.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    table: HashMap<String, Type>,
}

impl SymbolTable {
    /// Создать пустую таблицу.
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавить переменную; повторное имя - жёсткая ошибка.
    pub fn add(&mut self, name: &str, ty: Type) -> Result<(), SemanticError> {
        if self.table.contains_key(name) {
            return Err(SemanticError::DuplicateVariable(name.to_string()));
        }
        self.table.insert(name.to_string(), ty);
        Ok(())
    }

    /// Тип переменной; необъявленное имя - жёсткая ошибка.
    pub fn get(&self, name: &str) -> Result<Type, SemanticError> {
        self.table
            .get(name)
            .copied()
            .ok_or_else(|| SemanticError::UndeclaredVariable(name.to_string()))
    }

    /// Объявлено ли имя.
    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }
}

/// Дескриптор процедуры: имя, сигнатура, таблица символов.
#[derive(Debug, Clone)]
pub struct Procedure {
    pub name: String,
    pub signature: Vec<Type>,
    pub symbols: SymbolTable,
}

/// Таблица процедур компилируемой единицы. После прохода проверки
/// типов не изменяется.
#[derive(Debug, Clone, Default)]
pub struct ProcedureTable {
    table: HashMap<String, Procedure>,
}

impl ProcedureTable {
    /// Создать пустую таблицу.
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавить процедуру; повторное имя - жёсткая ошибка.
    pub fn add(&mut self, procedure: Procedure) -> Result<(), SemanticError> {
        if self.table.contains_key(&procedure.name) {
            return Err(SemanticError::DuplicateProcedure(procedure.name));
        }
        self.table.insert(procedure.name.clone(), procedure);
        Ok(())
    }

    /// Найти процедуру; необъявленное имя - жёсткая ошибка.
    pub fn get(&self, name: &str) -> Result<&Procedure, SemanticError> {
        self.table
            .get(name)
            .ok_or_else(|| SemanticError::UndeclaredProcedure(name.to_string()))
    }
}

// === Проверка типов ===

/// Семантическая проверка и аннотация дерева.
pub struct TypeChecker {
    procedures: ProcedureTable,
}

impl TypeChecker {
    /// Создать проверку с пустой таблицей процедур.
    pub fn new() -> Self {
        Self {
            procedures: ProcedureTable::new(),
        }
    }

    /// Проверить дерево с корнем `start` и аннотировать его типы.
    pub fn check(&mut self, tree: &mut Tree) -> CompileResult<()> {
        if tree.production_or_err()? != Production::Start {
            return Err(InternalError::shape("expected a start node at the root").into());
        }
        self.collect(&mut tree.children[1])?;
        check_structure(&tree.children[1])
    }

    /// Таблица процедур, накопленная проходом.
    pub fn procedures(&self) -> &ProcedureTable {
        &self.procedures
    }

    /// Пройти цепочку `procedures` в порядке объявления.
    fn collect(&mut self, node: &mut Tree) -> CompileResult<()> {
        match node.production_or_err()? {
            Production::ProceduresProcedure => {
                self.collect_one(0, node)?;
                self.collect(&mut node.children[1])
            }
            Production::ProceduresMain => self.collect_one(0, node),
            _ => Err(InternalError::shape("expected a procedures node").into()),
        }
    }

    /// Собрать дескриптор одной процедуры и аннотировать её поддерево.
    fn collect_one(&mut self, index: usize, parent: &mut Tree) -> CompileResult<()> {
        let node = &mut parent.children[index];
        let descriptor = match node.production_or_err()? {
            Production::Procedure => build_procedure(node)?,
            Production::Main => build_main(node)?,
            _ => return Err(InternalError::shape("expected a procedure or main node").into()),
        };
        debug!(
            "collected procedure '{}' with {} parameter(s)",
            descriptor.name,
            descriptor.signature.len()
        );
        self.procedures.add(descriptor.clone())?;
        annotate(node, &self.procedures, &descriptor)
    }
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self::new()
    }
}

// === Построение дескрипторов ===

fn build_procedure(node: &Tree) -> CompileResult<Procedure> {
    let name = node.children[1].expect_lexeme()?.to_string();
    let mut signature = Vec::new();
    let mut symbols = SymbolTable::new();
    read_params(&node.children[3], &mut signature, &mut symbols)?;
    read_dcls(&node.children[6], &mut symbols)?;
    Ok(Procedure {
        name,
        signature,
        symbols,
    })
}

fn build_main(node: &Tree) -> CompileResult<Procedure> {
    let name = node.children[1].expect_lexeme()?.to_string();
    let mut symbols = SymbolTable::new();
    // Первый параметр точки входа может быть int или int*,
    // второй обязан быть обычным int.
    let first = add_dcl(&node.children[3], &mut symbols)?;
    let second = add_dcl(&node.children[5], &mut symbols)?;
    if second != Type::Int {
        return Err(SemanticError::BadEntrySignature.into());
    }
    read_dcls(&node.children[8], &mut symbols)?;
    Ok(Procedure {
        name,
        signature: vec![first, second],
        symbols,
    })
}

/// Тип, объявленный узлом `dcl`.
fn declared_type(dcl: &Tree) -> CompileResult<Type> {
    match dcl.children[0].production_or_err()? {
        Production::TypeInt => Ok(Type::Int),
        Production::TypeIntStar => Ok(Type::IntStar),
        _ => Err(InternalError::shape("dcl without a type child").into()),
    }
}

/// Занести объявление `dcl` в таблицу символов, вернуть его тип.
fn add_dcl(dcl: &Tree, symbols: &mut SymbolTable) -> CompileResult<Type> {
    let ty = declared_type(dcl)?;
    let name = dcl.children[1].expect_lexeme()?;
    symbols.add(name, ty)?;
    Ok(ty)
}

fn read_params(
    node: &Tree,
    signature: &mut Vec<Type>,
    symbols: &mut SymbolTable,
) -> CompileResult<()> {
    match node.production_or_err()? {
        Production::ParamsEmpty => Ok(()),
        Production::ParamsList => read_params(&node.children[0], signature, symbols),
        Production::ParamlistDcl => {
            signature.push(add_dcl(&node.children[0], symbols)?);
            Ok(())
        }
        Production::ParamlistCons => {
            signature.push(add_dcl(&node.children[0], symbols)?);
            read_params(&node.children[2], signature, symbols)
        }
        _ => Err(InternalError::shape("expected a params node").into()),
    }
}

fn read_dcls(node: &Tree, symbols: &mut SymbolTable) -> CompileResult<()> {
    match node.production_or_err()? {
        Production::DclsEmpty => Ok(()),
        Production::DclsNum | Production::DclsNull => {
            read_dcls(&node.children[0], symbols)?;
            add_dcl(&node.children[1], symbols)?;
            Ok(())
        }
        _ => Err(InternalError::shape("expected a dcls node").into()),
    }
}

// === Аннотация типов (снизу вверх) ===

fn annotate(node: &mut Tree, procedures: &ProcedureTable, current: &Procedure) -> CompileResult<()> {
    // Глубина рекурсии равна высоте дерева (256KB red zone, 8MB роста).
    stacker::maybe_grow(256 * 1024, 8 * 1024 * 1024, || {
        for child in &mut node.children {
            annotate(child, procedures, current)?;
        }

        if node.is_terminal() {
            return Ok(());
        }
        let ty = match node.production_or_err()? {
            Production::ExprTerm | Production::TermFactor => Some(node.children[0].expect_ty()?),
            Production::ExprPlus => Some(plus_type(node)?),
            Production::ExprMinus => Some(minus_type(node)?),
            Production::TermStar | Production::TermSlash | Production::TermPct => {
                let lhs = node.children[0].expect_ty()?;
                let rhs = node.children[2].expect_ty()?;
                if lhs != Type::Int || rhs != Type::Int {
                    return Err(mismatch(
                        node,
                        format!("operands must both be int, found {} and {}", lhs, rhs),
                    )
                    .into());
                }
                Some(Type::Int)
            }
            Production::FactorNum => Some(Type::Int),
            Production::FactorNull => Some(Type::IntStar),
            Production::FactorId => {
                Some(current.symbols.get(node.children[0].expect_lexeme()?)?)
            }
            Production::FactorParen => Some(node.children[1].expect_ty()?),
            Production::FactorAmp => {
                if node.children[1].expect_ty()? != Type::Int {
                    return Err(mismatch(node, "address-of requires an int lvalue").into());
                }
                Some(Type::IntStar)
            }
            Production::FactorStar | Production::LvalueStar => {
                if node.children[1].expect_ty()? != Type::IntStar {
                    return Err(mismatch(node, "dereference requires an int* factor").into());
                }
                Some(Type::Int)
            }
            Production::FactorNew => {
                if node.children[3].expect_ty()? != Type::Int {
                    return Err(mismatch(node, "allocation size must be int").into());
                }
                Some(Type::IntStar)
            }
            Production::FactorCall => {
                let callee = callee_procedure(node, procedures, current)?;
                if !callee.signature.is_empty() {
                    return Err(SemanticError::BadCallArguments(callee.name.clone()).into());
                }
                Some(Type::Int)
            }
            Production::FactorCallArgs => {
                let callee = callee_procedure(node, procedures, current)?;
                let arguments = arg_types(&node.children[2])?;
                if arguments != callee.signature {
                    return Err(SemanticError::BadCallArguments(callee.name.clone()).into());
                }
                Some(Type::Int)
            }
            Production::LvalueId => {
                Some(current.symbols.get(node.children[0].expect_lexeme()?)?)
            }
            Production::LvalueParen => Some(node.children[1].expect_ty()?),
            _ => None,
        };
        if let Some(ty) = ty {
            node.set_ty(ty);
        }
        Ok(())
    })
}

fn plus_type(node: &Tree) -> CompileResult<Type> {
    let lhs = node.children[0].expect_ty()?;
    let rhs = node.children[2].expect_ty()?;
    match (lhs, rhs) {
        (Type::Int, Type::Int) => Ok(Type::Int),
        (Type::IntStar, Type::Int) | (Type::Int, Type::IntStar) => Ok(Type::IntStar),
        _ => Err(mismatch(node, format!("cannot add {} and {}", lhs, rhs)).into()),
    }
}

fn minus_type(node: &Tree) -> CompileResult<Type> {
    let lhs = node.children[0].expect_ty()?;
    let rhs = node.children[2].expect_ty()?;
    match (lhs, rhs) {
        (Type::Int, Type::Int) | (Type::IntStar, Type::IntStar) => Ok(Type::Int),
        (Type::IntStar, Type::Int) => Ok(Type::IntStar),
        _ => Err(mismatch(node, format!("cannot subtract {} from {}", rhs, lhs)).into()),
    }
}

fn mismatch(node: &Tree, message: impl Into<String>) -> SemanticError {
    SemanticError::mismatch(node.label.to_string(), message)
}

/// Разрешить имя вызываемой процедуры. Имя не должно быть локальной
/// переменной вызывающего и должно быть уже собрано.
fn callee_procedure<'p>(
    node: &Tree,
    procedures: &'p ProcedureTable,
    current: &Procedure,
) -> CompileResult<&'p Procedure> {
    let name = node.children[0].expect_lexeme()?;
    if current.symbols.contains(name) {
        return Err(SemanticError::CalleeIsVariable(name.to_string()).into());
    }
    Ok(procedures.get(name)?)
}

/// Типы аргументов вызова в исходном порядке.
fn arg_types(node: &Tree) -> CompileResult<Vec<Type>> {
    match node.production_or_err()? {
        Production::ArglistExpr => Ok(vec![node.children[0].expect_ty()?]),
        Production::ArglistCons => {
            let mut types = vec![node.children[0].expect_ty()?];
            types.extend(arg_types(&node.children[2])?);
            Ok(types)
        }
        _ => Err(InternalError::shape("expected an arglist node").into()),
    }
}

// === Структурные проверки (второй обход) ===

fn check_structure(node: &Tree) -> CompileResult<()> {
    for child in &node.children {
        check_structure(child)?;
    }

    let production = match node.production() {
        Some(production) => production,
        None => return Ok(()), // терминал
    };
    match production {
        Production::StatementAssign => {
            if node.children[0].expect_ty()? != node.children[2].expect_ty()? {
                return Err(mismatch(node, "assignment sides differ in type").into());
            }
        }
        Production::StatementPrintln => {
            if node.children[2].expect_ty()? != Type::Int {
                return Err(mismatch(node, "println argument must be int").into());
            }
        }
        Production::StatementDelete => {
            if node.children[3].expect_ty()? != Type::IntStar {
                return Err(mismatch(node, "delete argument must be int*").into());
            }
        }
        Production::TestEq
        | Production::TestNe
        | Production::TestLt
        | Production::TestLe
        | Production::TestGe
        | Production::TestGt => {
            if node.children[0].expect_ty()? != node.children[2].expect_ty()? {
                return Err(mismatch(node, "comparison operands differ in type").into());
            }
        }
        Production::DclsNum => {
            if declared_type(&node.children[1])? != Type::Int {
                return Err(mismatch(node, "a NUM initializer requires an int declaration").into());
            }
        }
        Production::DclsNull => {
            if declared_type(&node.children[1])? != Type::IntStar {
                return Err(
                    mismatch(node, "a NULL initializer requires an int* declaration").into(),
                );
            }
        }
        Production::Procedure => {
            if node.children[9].expect_ty()? != Type::Int {
                let name = node.children[1].expect_lexeme()?;
                return Err(SemanticError::BadReturnType(name.to_string()).into());
            }
        }
        Production::Main => {
            if node.children[11].expect_ty()? != Type::Int {
                let name = node.children[1].expect_lexeme()?;
                return Err(SemanticError::BadReturnType(name.to_string()).into());
            }
        }
        _ => {}
    }
    Ok(())
}

// === Публичный API ===

/// Проверить и аннотировать дерево с корнем `start`.
pub fn check(tree: &mut Tree) -> CompileResult<()> {
    TypeChecker::new().check(tree)
}

// === Тесты ===

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompileError;

    const SUM_PROGRAM: &str = "\
start BOF procedures EOF
BOF BOF
procedures main
main INT WAIN LPAREN dcl COMMA dcl RPAREN LBRACE dcls statements RETURN expr SEMI RBRACE
INT int
WAIN wain
LPAREN (
dcl type ID
type INT
INT int
ID a
COMMA ,
dcl type ID
type INT
INT int
ID b
RPAREN )
LBRACE {
dcls .EMPTY
statements .EMPTY
RETURN return
expr expr PLUS term
expr term
term factor
factor ID
ID a
PLUS +
term factor
factor ID
ID b
SEMI ;
RBRACE }
EOF EOF
";

    const DUPLICATE_LOCAL_PROGRAM: &str = "\
start BOF procedures EOF
BOF BOF
procedures main
main INT WAIN LPAREN dcl COMMA dcl RPAREN LBRACE dcls statements RETURN expr SEMI RBRACE
INT int
WAIN wain
LPAREN (
dcl type ID
type INT
INT int
ID a
COMMA ,
dcl type ID
type INT
INT int
ID b
RPAREN )
LBRACE {
dcls dcls dcl BECOMES NUM SEMI
dcls .EMPTY
dcl type ID
type INT
INT int
ID a
BECOMES =
NUM 1
SEMI ;
statements .EMPTY
RETURN return
expr term
term factor
factor ID
ID a
SEMI ;
RBRACE }
EOF EOF
";

    const CALL_MISMATCH_PROGRAM: &str = "\
start BOF procedures EOF
BOF BOF
procedures procedure procedures
procedure INT ID LPAREN params RPAREN LBRACE dcls statements RETURN expr SEMI RBRACE
INT int
ID f
LPAREN (
params paramlist
paramlist dcl
dcl type ID
type INT
INT int
ID x
RPAREN )
LBRACE {
dcls .EMPTY
statements .EMPTY
RETURN return
expr term
term factor
factor ID
ID x
SEMI ;
RBRACE }
procedures main
main INT WAIN LPAREN dcl COMMA dcl RPAREN LBRACE dcls statements RETURN expr SEMI RBRACE
INT int
WAIN wain
LPAREN (
dcl type ID
type INT STAR
INT int
STAR *
ID a
COMMA ,
dcl type ID
type INT
INT int
ID b
RPAREN )
LBRACE {
dcls .EMPTY
statements .EMPTY
RETURN return
expr term
term factor
factor ID LPAREN arglist RPAREN
ID f
LPAREN (
arglist expr
expr term
term factor
factor ID
ID a
RPAREN )
SEMI ;
RBRACE }
EOF EOF
";

    const FORWARD_CALL_PROGRAM: &str = "\
start BOF procedures EOF
BOF BOF
procedures procedure procedures
procedure INT ID LPAREN params RPAREN LBRACE dcls statements RETURN expr SEMI RBRACE
INT int
ID g
LPAREN (
params .EMPTY
RPAREN )
LBRACE {
dcls .EMPTY
statements .EMPTY
RETURN return
expr term
term factor
factor ID LPAREN RPAREN
ID f
LPAREN (
RPAREN )
SEMI ;
RBRACE }
procedures procedure procedures
procedure INT ID LPAREN params RPAREN LBRACE dcls statements RETURN expr SEMI RBRACE
INT int
ID f
LPAREN (
params .EMPTY
RPAREN )
LBRACE {
dcls .EMPTY
statements .EMPTY
RETURN return
expr term
term factor
factor NUM
NUM 1
SEMI ;
RBRACE }
procedures main
main INT WAIN LPAREN dcl COMMA dcl RPAREN LBRACE dcls statements RETURN expr SEMI RBRACE
INT int
WAIN wain
LPAREN (
dcl type ID
type INT
INT int
ID a
COMMA ,
dcl type ID
type INT
INT int
ID b
RPAREN )
LBRACE {
dcls .EMPTY
statements .EMPTY
RETURN return
expr term
term factor
factor NUM
NUM 0
SEMI ;
RBRACE }
EOF EOF
";

    fn checked(text: &str) -> CompileResult<Tree> {
        let mut tree = Tree::decode(text).unwrap();
        check(&mut tree)?;
        Ok(tree)
    }

    #[test]
    fn test_sum_program_is_annotated() {
        let tree = checked(SUM_PROGRAM).unwrap();
        let main = &tree.children[1].children[0];
        let ret = &main.children[11];
        assert_eq!(ret.ty(), Some(Type::Int));
        assert!(tree.to_text().contains("expr expr PLUS term : int"));
    }

    #[test]
    fn test_annotation_is_deterministic() {
        // Независимые копии дают побайтово одинаковую аннотацию;
        // тип каждого узла записывается ровно один раз.
        let mut first = Tree::decode(SUM_PROGRAM).unwrap();
        let mut second = first.clone();
        check(&mut first).unwrap();
        check(&mut second).unwrap();
        assert_eq!(first.to_text(), second.to_text());
    }

    #[test]
    fn test_duplicate_local_is_rejected() {
        match checked(DUPLICATE_LOCAL_PROGRAM) {
            Err(CompileError::Semantic(SemanticError::DuplicateVariable(name))) => {
                assert_eq!(name, "a");
            }
            other => panic!("expected duplicate declaration error, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn test_call_argument_mismatch_names_callee() {
        match checked(CALL_MISMATCH_PROGRAM) {
            Err(CompileError::Semantic(SemanticError::BadCallArguments(name))) => {
                assert_eq!(name, "f");
            }
            other => panic!("expected call mismatch error, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn test_forward_call_is_rejected() {
        match checked(FORWARD_CALL_PROGRAM) {
            Err(CompileError::Semantic(SemanticError::UndeclaredProcedure(name))) => {
                assert_eq!(name, "f");
            }
            other => panic!("expected undeclared procedure error, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn test_second_entry_parameter_must_be_int() {
        let text = SUM_PROGRAM.replace(
            "COMMA ,\ndcl type ID\ntype INT\nINT int\nID b",
            "COMMA ,\ndcl type ID\ntype INT STAR\nINT int\nSTAR *\nID b",
        );
        match checked(&text) {
            Err(CompileError::Semantic(SemanticError::BadEntrySignature)) => {}
            other => panic!("expected entry signature error, got {:?}", other.is_ok()),
        }
    }

    // Таблица правил для + и - из определения языка.
    fn binary_expr(op: &str, lexeme: &str, left: &str, right: &str) -> Tree {
        let text = format!(
            "expr expr {op} term\nexpr term\nterm factor\nfactor ID\nID {left}\n{op} {lexeme}\nterm factor\nfactor ID\nID {right}\n"
        );
        Tree::decode(&text).unwrap()
    }

    fn annotate_expr(tree: &mut Tree) -> CompileResult<()> {
        let mut symbols = SymbolTable::new();
        symbols.add("p", Type::IntStar).unwrap();
        symbols.add("q", Type::IntStar).unwrap();
        symbols.add("x", Type::Int).unwrap();
        symbols.add("y", Type::Int).unwrap();
        let procedure = Procedure {
            name: "test".to_string(),
            signature: Vec::new(),
            symbols,
        };
        annotate(tree, &ProcedureTable::new(), &procedure)
    }

    #[test]
    fn test_arithmetic_type_table() {
        let table = [
            ("PLUS", "+", "x", "y", Some(Type::Int)),
            ("PLUS", "+", "p", "x", Some(Type::IntStar)),
            ("PLUS", "+", "x", "p", Some(Type::IntStar)),
            ("PLUS", "+", "p", "q", None),
            ("MINUS", "-", "x", "y", Some(Type::Int)),
            ("MINUS", "-", "p", "x", Some(Type::IntStar)),
            ("MINUS", "-", "p", "q", Some(Type::Int)),
            ("MINUS", "-", "x", "p", None),
        ];
        for (op, lexeme, left, right, expected) in table {
            let mut tree = binary_expr(op, lexeme, left, right);
            let result = annotate_expr(&mut tree);
            match expected {
                Some(ty) => {
                    result.unwrap();
                    assert_eq!(tree.ty(), Some(ty), "{} {} {}", left, lexeme, right);
                }
                None => {
                    assert!(result.is_err(), "{} {} {} must be rejected", left, lexeme, right);
                }
            }
        }
    }
}
