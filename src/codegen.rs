//! Модуль `codegen`
//!
//! Генерация MIPS-ассемблера по аннотированному дереву разбора.
//!
//! Соглашение фиксировано и не настраивается:
//! - `$3` - результат последнего вычисленного выражения;
//! - `$29`/`$30`/`$31` - кадр, стек, адрес возврата;
//! - `$4` и `$11` держат константы 4 и 1, задаются один раз в прологе
//!   точки входа и дальше не меняются;
//! - push = `sw`+`sub $30`, pop = `add $30` (+`lw`, если значение нужно).
//!
//! Любой путь через тело процедуры возвращает указатель стека ровно туда,
//! где он был до размещения локальных переменных. Код точки входа
//! печатается первым: исполнение начинается с первой инструкции.
//!
//! Генератор не должен падать на дереве, прошедшем проверку типов;
//! любая незнакомая форма - внутренняя несогласованность.

use std::collections::HashMap;

use log::debug;

use crate::asm::{render, Instr, Reg, Target, WordValue};
use crate::error::{CompileResult, InternalError};
use crate::productions::Production;
use crate::tree::Tree;
use crate::types::Type;

/// Целочисленная кодировка нулевого указателя.
const NULL_ENCODING: i32 = 1;

/// Имена импортируемых рантайм-процедур.
const RUNTIME_IMPORTS: [&str; 4] = ["print", "init", "new", "delete"];

/// Префикс меток процедур: защищает от коллизий с метками рантайма.
const PROCEDURE_PREFIX: &str = "P";

// === Метки управления потоком ===

/// Четыре независимых монотонных счётчика меток. Значение живёт внутри
/// генератора; процессных глобальных счётчиков нет.
#[derive(Debug, Default)]
struct LabelCounters {
    whiles: u32,
    endwhiles: u32,
    elses: u32,
    endifs: u32,
}

impl LabelCounters {
    fn next_while(&mut self) -> String {
        self.whiles += 1;
        format!("while{}", self.whiles)
    }

    fn next_endwhile(&mut self) -> String {
        self.endwhiles += 1;
        format!("endwhile{}", self.endwhiles)
    }

    fn next_else(&mut self) -> String {
        self.elses += 1;
        format!("else{}", self.elses)
    }

    fn next_endif(&mut self) -> String {
        self.endifs += 1;
        format!("endif{}", self.endifs)
    }
}

/// Таблица смещений кадра: имя переменной → байтовое смещение от `$29`.
/// Строится заново для каждой процедуры.
type OffsetTable = HashMap<String, i32>;

/// Смещения параметров: первый параметр дальше всех от указателя кадра,
/// последний - на `4`.
fn param_offsets(params: &[String]) -> OffsetTable {
    let count = params.len() as i32;
    params
        .iter()
        .enumerate()
        .map(|(index, name)| (name.clone(), (count - index as i32) * 4))
        .collect()
}

// === Генератор ===

/// Генератор кода: буфер инструкций плюс счётчики меток.
pub struct CodeGenerator {
    code: Vec<Instr>,
    labels: LabelCounters,
}

impl CodeGenerator {
    /// Создать генератор с пустым буфером.
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            labels: LabelCounters::default(),
        }
    }

    /// Сгенерировать программу по аннотированному дереву с корнем `start`.
    pub fn generate(mut self, tree: &Tree) -> CompileResult<Vec<Instr>> {
        if tree.production_or_err()? != Production::Start {
            return Err(InternalError::shape("expected a start node at the root").into());
        }
        let procedures = &tree.children[1];
        self.gen_main(find_main(procedures)?)?;
        self.gen_procedures(procedures)?;
        Ok(self.code)
    }

    fn gen_procedures(&mut self, node: &Tree) -> CompileResult<()> {
        match node.production_or_err()? {
            Production::ProceduresProcedure => {
                self.gen_procedure(&node.children[0])?;
                self.gen_procedures(&node.children[1])
            }
            Production::ProceduresMain => Ok(()),
            _ => Err(InternalError::shape("expected a procedures node").into()),
        }
    }

    // === Точка входа ===

    fn gen_main(&mut self, node: &Tree) -> CompileResult<()> {
        debug!("generating entry point");
        for name in RUNTIME_IMPORTS {
            self.emit(Instr::Import(name.to_string()));
        }

        // Константы соглашения.
        self.load_const(Reg::FOUR, WordValue::Literal(4));
        self.load_const(Reg::ONE, WordValue::Literal(NULL_ENCODING));

        // Инициализация рантайма. Если первый параметр - не массив,
        // init ожидает нулевую длину в $2; сам аргумент сохраняем.
        if dcl_type(&node.children[3])?.is_pointer() {
            self.push_reg(Reg::RA);
            self.load_const(Reg::RESULT, WordValue::Label("init".to_string()));
            self.emit(Instr::Jalr(Reg::RESULT));
            self.pop_reg(Reg::RA);
        } else {
            self.push_reg(Reg::RA);
            self.push_reg(Reg::ARG2);
            self.emit(Instr::Add(Reg::ARG2, Reg::ZERO, Reg::ZERO));
            self.load_const(Reg::RESULT, WordValue::Label("init".to_string()));
            self.emit(Instr::Jalr(Reg::RESULT));
            self.pop_reg(Reg::ARG2);
            self.pop_reg(Reg::RA);
        }

        // Кадр точки входа: параметры приходят в $1/$2.
        let mut offsets = OffsetTable::new();
        offsets.insert(dcl_name(&node.children[3])?.to_string(), 8);
        offsets.insert(dcl_name(&node.children[5])?.to_string(), 4);
        self.push_reg(Reg::ARG1);
        self.push_reg(Reg::ARG2);
        self.emit(Instr::Sub(Reg::FP, Reg::SP, Reg::FOUR));
        let locals = self.gen_locals(&node.children[8], &mut offsets)?;
        self.emit(Instr::Comment("end of prelogue".to_string()));

        self.gen_statements(&node.children[9], &offsets)?;
        self.gen_expr(&node.children[11], &offsets)?;

        self.emit(Instr::Comment("begin of afterlogue".to_string()));
        for _ in 0..locals {
            self.pop_discard();
        }
        self.emit(Instr::Jr(Reg::RA));
        Ok(())
    }

    // === Процедуры ===

    fn gen_procedure(&mut self, node: &Tree) -> CompileResult<()> {
        let name = node.children[1].expect_lexeme()?;
        debug!("generating procedure '{}'", name);
        self.emit(Instr::Label(format!("{}{}", PROCEDURE_PREFIX, name)));

        let params = param_names(&node.children[3])?;
        let mut offsets = param_offsets(&params);
        let locals = self.gen_locals(&node.children[6], &mut offsets)?;

        self.gen_statements(&node.children[7], &offsets)?;
        self.gen_expr(&node.children[9], &offsets)?;

        for _ in 0..locals {
            self.pop_discard();
        }
        self.emit(Instr::Jr(Reg::RA));
        Ok(())
    }

    /// Разместить локальные переменные: каждая инициализируется своей
    /// константой и занимает следующее смещение вниз (0, -4, ...)
    /// в порядке объявления. Возвращает их количество.
    fn gen_locals(&mut self, node: &Tree, offsets: &mut OffsetTable) -> CompileResult<usize> {
        match node.production_or_err()? {
            Production::DclsEmpty => Ok(0),
            production @ (Production::DclsNum | Production::DclsNull) => {
                let count = self.gen_locals(&node.children[0], offsets)?;
                let name = dcl_name(&node.children[1])?;
                offsets.insert(name.to_string(), -(count as i32) * 4);

                let value = match production {
                    Production::DclsNum => parse_literal(node.children[3].expect_lexeme()?)?,
                    _ => NULL_ENCODING,
                };
                self.load_const(Reg::RESULT, WordValue::Literal(value));
                self.push_reg(Reg::RESULT);
                Ok(count + 1)
            }
            _ => Err(InternalError::shape("expected a dcls node").into()),
        }
    }

    // === Операторы ===

    fn gen_statements(&mut self, node: &Tree, offsets: &OffsetTable) -> CompileResult<()> {
        match node.production_or_err()? {
            Production::StatementsEmpty => Ok(()),
            Production::StatementsCons => {
                self.gen_statements(&node.children[0], offsets)?;
                self.gen_statement(&node.children[1], offsets)
            }
            _ => Err(InternalError::shape("expected a statements node").into()),
        }
    }

    fn gen_statement(&mut self, node: &Tree, offsets: &OffsetTable) -> CompileResult<()> {
        match node.production_or_err()? {
            Production::StatementAssign => {
                self.gen_lvalue(&node.children[0], offsets)?;
                self.push_reg(Reg::RESULT);
                self.gen_expr(&node.children[2], offsets)?;
                self.pop_reg(Reg::SCRATCH);
                self.emit(Instr::Sw(Reg::RESULT, 0, Reg::SCRATCH));
                Ok(())
            }
            Production::StatementPrintln => {
                self.push_reg(Reg::RA);
                self.push_reg(Reg::ARG1);
                self.gen_expr(&node.children[2], offsets)?;
                self.emit(Instr::Add(Reg::ARG1, Reg::RESULT, Reg::ZERO));
                self.load_const(Reg::RESULT, WordValue::Label("print".to_string()));
                self.emit(Instr::Jalr(Reg::RESULT));
                self.pop_reg(Reg::ARG1);
                self.pop_reg(Reg::RA);
                Ok(())
            }
            Production::StatementIf => {
                let else_label = self.labels.next_else();
                let endif_label = self.labels.next_endif();

                self.gen_test(&node.children[2], offsets)?;
                self.emit(Instr::Beq(
                    Reg::RESULT,
                    Reg::ZERO,
                    Target::Label(else_label.clone()),
                ));
                self.gen_statements(&node.children[5], offsets)?;
                self.emit(Instr::Beq(
                    Reg::ZERO,
                    Reg::ZERO,
                    Target::Label(endif_label.clone()),
                ));
                self.emit(Instr::Label(else_label));
                self.gen_statements(&node.children[9], offsets)?;
                self.emit(Instr::Label(endif_label));
                Ok(())
            }
            Production::StatementWhile => {
                let while_label = self.labels.next_while();
                let endwhile_label = self.labels.next_endwhile();

                self.emit(Instr::Label(while_label.clone()));
                self.gen_test(&node.children[2], offsets)?;
                self.emit(Instr::Beq(
                    Reg::RESULT,
                    Reg::ZERO,
                    Target::Label(endwhile_label.clone()),
                ));
                self.gen_statements(&node.children[5], offsets)?;
                self.emit(Instr::Beq(Reg::ZERO, Reg::ZERO, Target::Label(while_label)));
                self.emit(Instr::Label(endwhile_label));
                Ok(())
            }
            Production::StatementDelete => {
                self.gen_expr(&node.children[3], offsets)?;
                // NULL не освобождаем: перепрыгнуть весь вызов (12 слов).
                self.emit(Instr::Beq(Reg::RESULT, Reg::ONE, Target::Offset(12)));
                self.push_reg(Reg::RA);
                self.push_reg(Reg::ARG1);
                self.emit(Instr::Add(Reg::ARG1, Reg::RESULT, Reg::ZERO));
                self.load_const(Reg::RESULT, WordValue::Label("delete".to_string()));
                self.emit(Instr::Jalr(Reg::RESULT));
                self.pop_reg(Reg::ARG1);
                self.pop_reg(Reg::RA);
                Ok(())
            }
            _ => Err(InternalError::shape("expected a statement node").into()),
        }
    }

    // === Сравнения ===

    /// Опустить сравнение до результата 0/1 в `$3`. Знаковость
    /// инструкции выбирается по типу операндов: указатели сравниваются
    /// беззнаково.
    fn gen_test(&mut self, node: &Tree, offsets: &OffsetTable) -> CompileResult<()> {
        let production = node.production_or_err()?;
        let signed = node.children[0].expect_ty()? == Type::Int;

        self.gen_expr(&node.children[0], offsets)?;
        self.push_reg(Reg::RESULT);
        self.gen_expr(&node.children[2], offsets)?;
        self.pop_reg(Reg::SCRATCH);

        // Здесь $5 - левый операнд, $3 - правый.
        match production {
            Production::TestLt => {
                self.compare(Reg::RESULT, Reg::SCRATCH, Reg::RESULT, signed);
            }
            Production::TestGt => {
                self.compare(Reg::RESULT, Reg::RESULT, Reg::SCRATCH, signed);
            }
            Production::TestGe => {
                self.compare(Reg::RESULT, Reg::SCRATCH, Reg::RESULT, signed);
                self.emit(Instr::Sub(Reg::RESULT, Reg::ONE, Reg::RESULT));
            }
            Production::TestLe => {
                self.compare(Reg::RESULT, Reg::RESULT, Reg::SCRATCH, signed);
                self.emit(Instr::Sub(Reg::RESULT, Reg::ONE, Reg::RESULT));
            }
            Production::TestNe => {
                self.compare(Reg::SCRATCH2, Reg::RESULT, Reg::SCRATCH, signed);
                self.compare(Reg::SCRATCH3, Reg::SCRATCH, Reg::RESULT, signed);
                self.emit(Instr::Add(Reg::RESULT, Reg::SCRATCH2, Reg::SCRATCH3));
            }
            Production::TestEq => {
                self.compare(Reg::SCRATCH2, Reg::RESULT, Reg::SCRATCH, signed);
                self.compare(Reg::SCRATCH3, Reg::SCRATCH, Reg::RESULT, signed);
                self.emit(Instr::Add(Reg::RESULT, Reg::SCRATCH2, Reg::SCRATCH3));
                self.emit(Instr::Sub(Reg::RESULT, Reg::ONE, Reg::RESULT));
            }
            _ => return Err(InternalError::shape("expected a test node").into()),
        }
        Ok(())
    }

    fn compare(&mut self, d: Reg, s: Reg, t: Reg, signed: bool) {
        if signed {
            self.emit(Instr::Slt(d, s, t));
        } else {
            self.emit(Instr::Sltu(d, s, t));
        }
    }

    // === Выражения ===

    fn gen_expr(&mut self, node: &Tree, offsets: &OffsetTable) -> CompileResult<()> {
        // Глубина рекурсии равна высоте выражения (256KB red zone, 8MB роста).
        stacker::maybe_grow(256 * 1024, 8 * 1024 * 1024, || {
            match node.production_or_err()? {
                Production::ExprTerm => self.gen_term(&node.children[0], offsets),
                Production::ExprPlus => {
                    let lhs = node.children[0].expect_ty()?;
                    let rhs = node.children[2].expect_ty()?;
                    self.gen_expr(&node.children[0], offsets)?;
                    self.push_reg(Reg::RESULT);
                    self.gen_term(&node.children[2], offsets)?;
                    self.pop_reg(Reg::SCRATCH);
                    if lhs.is_pointer() {
                        // int* + int: правый операнд умножается на размер слова
                        self.emit(Instr::Multu(Reg::RESULT, Reg::FOUR));
                        self.emit(Instr::Mflo(Reg::RESULT));
                    } else if rhs.is_pointer() {
                        // int + int*: масштабируется левый
                        self.emit(Instr::Multu(Reg::SCRATCH, Reg::FOUR));
                        self.emit(Instr::Mflo(Reg::SCRATCH));
                    }
                    self.emit(Instr::Add(Reg::RESULT, Reg::SCRATCH, Reg::RESULT));
                    Ok(())
                }
                Production::ExprMinus => {
                    let lhs = node.children[0].expect_ty()?;
                    let rhs = node.children[2].expect_ty()?;
                    self.gen_expr(&node.children[0], offsets)?;
                    self.push_reg(Reg::RESULT);
                    self.gen_term(&node.children[2], offsets)?;
                    self.pop_reg(Reg::SCRATCH);
                    if rhs.is_pointer() {
                        // int* - int*: разность адресов в элементах
                        self.emit(Instr::Sub(Reg::RESULT, Reg::SCRATCH, Reg::RESULT));
                        self.emit(Instr::Divu(Reg::RESULT, Reg::FOUR));
                        self.emit(Instr::Mflo(Reg::RESULT));
                    } else if lhs.is_pointer() {
                        // int* - int
                        self.emit(Instr::Multu(Reg::RESULT, Reg::FOUR));
                        self.emit(Instr::Mflo(Reg::RESULT));
                        self.emit(Instr::Sub(Reg::RESULT, Reg::SCRATCH, Reg::RESULT));
                    } else {
                        self.emit(Instr::Sub(Reg::RESULT, Reg::SCRATCH, Reg::RESULT));
                    }
                    Ok(())
                }
                _ => Err(InternalError::shape("expected an expr node").into()),
            }
        })
    }

    fn gen_term(&mut self, node: &Tree, offsets: &OffsetTable) -> CompileResult<()> {
        match node.production_or_err()? {
            Production::TermFactor => self.gen_factor(&node.children[0], offsets),
            production @ (Production::TermStar | Production::TermSlash | Production::TermPct) => {
                self.gen_term(&node.children[0], offsets)?;
                self.push_reg(Reg::RESULT);
                self.gen_factor(&node.children[2], offsets)?;
                self.pop_reg(Reg::SCRATCH);
                match production {
                    Production::TermStar => {
                        self.emit(Instr::Mult(Reg::SCRATCH, Reg::RESULT));
                        self.emit(Instr::Mflo(Reg::RESULT));
                    }
                    Production::TermSlash => {
                        self.emit(Instr::Div(Reg::SCRATCH, Reg::RESULT));
                        self.emit(Instr::Mflo(Reg::RESULT));
                    }
                    _ => {
                        self.emit(Instr::Div(Reg::SCRATCH, Reg::RESULT));
                        self.emit(Instr::Mfhi(Reg::RESULT));
                    }
                }
                Ok(())
            }
            _ => Err(InternalError::shape("expected a term node").into()),
        }
    }

    fn gen_factor(&mut self, node: &Tree, offsets: &OffsetTable) -> CompileResult<()> {
        match node.production_or_err()? {
            Production::FactorId => {
                let name = node.children[0].expect_lexeme()?;
                let offset = lookup_offset(offsets, name)?;
                self.emit(Instr::Lw(Reg::RESULT, offset, Reg::FP));
                Ok(())
            }
            Production::FactorNum => {
                let value = parse_literal(node.children[0].expect_lexeme()?)?;
                self.load_const(Reg::RESULT, WordValue::Literal(value));
                Ok(())
            }
            Production::FactorNull => {
                self.load_const(Reg::RESULT, WordValue::Literal(NULL_ENCODING));
                Ok(())
            }
            Production::FactorParen => self.gen_expr(&node.children[1], offsets),
            Production::FactorAmp => self.gen_lvalue(&node.children[1], offsets),
            Production::FactorStar => {
                self.gen_factor(&node.children[1], offsets)?;
                self.emit(Instr::Lw(Reg::RESULT, 0, Reg::RESULT));
                Ok(())
            }
            Production::FactorNew => {
                self.gen_expr(&node.children[3], offsets)?;
                self.push_reg(Reg::RA);
                self.push_reg(Reg::ARG1);
                self.emit(Instr::Add(Reg::ARG1, Reg::RESULT, Reg::ZERO));
                self.load_const(Reg::RESULT, WordValue::Label("new".to_string()));
                self.emit(Instr::Jalr(Reg::RESULT));
                self.pop_reg(Reg::ARG1);
                self.pop_reg(Reg::RA);
                // Неудачная аллокация возвращает 0 - подставить NULL.
                self.emit(Instr::Bne(Reg::RESULT, Reg::ZERO, Target::Offset(2)));
                self.load_const(Reg::RESULT, WordValue::Literal(NULL_ENCODING));
                Ok(())
            }
            Production::FactorCall => {
                let name = node.children[0].expect_lexeme()?;
                self.push_reg(Reg::RA);
                self.push_reg(Reg::FP);
                self.emit(Instr::Sub(Reg::FP, Reg::SP, Reg::FOUR));
                self.load_const(
                    Reg::RESULT,
                    WordValue::Label(format!("{}{}", PROCEDURE_PREFIX, name)),
                );
                self.emit(Instr::Jalr(Reg::RESULT));
                self.pop_reg(Reg::FP);
                self.pop_reg(Reg::RA);
                Ok(())
            }
            Production::FactorCallArgs => {
                let name = node.children[0].expect_lexeme()?;
                self.push_reg(Reg::RA);
                self.push_reg(Reg::FP);
                let arguments = self.gen_args(&node.children[2], offsets)?;
                self.emit(Instr::Sub(Reg::FP, Reg::SP, Reg::FOUR));
                self.load_const(
                    Reg::RESULT,
                    WordValue::Label(format!("{}{}", PROCEDURE_PREFIX, name)),
                );
                self.emit(Instr::Jalr(Reg::RESULT));
                for _ in 0..arguments {
                    self.pop_discard();
                }
                self.pop_reg(Reg::FP);
                self.pop_reg(Reg::RA);
                Ok(())
            }
            _ => Err(InternalError::shape("expected a factor node").into()),
        }
    }

    /// Вычислить и протолкнуть аргументы слева направо; вернуть их число.
    fn gen_args(&mut self, node: &Tree, offsets: &OffsetTable) -> CompileResult<usize> {
        match node.production_or_err()? {
            Production::ArglistExpr => {
                self.gen_expr(&node.children[0], offsets)?;
                self.push_reg(Reg::RESULT);
                Ok(1)
            }
            Production::ArglistCons => {
                self.gen_expr(&node.children[0], offsets)?;
                self.push_reg(Reg::RESULT);
                Ok(1 + self.gen_args(&node.children[2], offsets)?)
            }
            _ => Err(InternalError::shape("expected an arglist node").into()),
        }
    }

    /// lvalue оставляет в `$3` адрес ячейки.
    fn gen_lvalue(&mut self, node: &Tree, offsets: &OffsetTable) -> CompileResult<()> {
        match node.production_or_err()? {
            Production::LvalueId => {
                let name = node.children[0].expect_lexeme()?;
                let offset = lookup_offset(offsets, name)?;
                self.load_const(Reg::RESULT, WordValue::Literal(offset));
                self.emit(Instr::Add(Reg::RESULT, Reg::FP, Reg::RESULT));
                Ok(())
            }
            Production::LvalueParen => self.gen_lvalue(&node.children[1], offsets),
            Production::LvalueStar => self.gen_factor(&node.children[1], offsets),
            _ => Err(InternalError::shape("expected an lvalue node").into()),
        }
    }

    // === Низкоуровневые помощники ===

    fn emit(&mut self, instr: Instr) {
        self.code.push(instr);
    }

    fn push_reg(&mut self, register: Reg) {
        self.emit(Instr::Sw(register, -4, Reg::SP));
        self.emit(Instr::Sub(Reg::SP, Reg::SP, Reg::FOUR));
    }

    fn pop_reg(&mut self, register: Reg) {
        self.emit(Instr::Add(Reg::SP, Reg::SP, Reg::FOUR));
        self.emit(Instr::Lw(register, -4, Reg::SP));
    }

    fn pop_discard(&mut self) {
        self.emit(Instr::Add(Reg::SP, Reg::SP, Reg::FOUR));
    }

    fn load_const(&mut self, register: Reg, value: WordValue) {
        self.emit(Instr::Lis(register));
        self.emit(Instr::Word(value));
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// === Обход дерева ===

/// Найти узел `main` в цепочке процедур.
fn find_main(node: &Tree) -> CompileResult<&Tree> {
    match node.production_or_err()? {
        Production::ProceduresMain => Ok(&node.children[0]),
        Production::ProceduresProcedure => find_main(&node.children[1]),
        _ => Err(InternalError::shape("expected a procedures node").into()),
    }
}

/// Имена параметров процедуры в исходном порядке.
fn param_names(node: &Tree) -> CompileResult<Vec<String>> {
    match node.production_or_err()? {
        Production::ParamsEmpty => Ok(Vec::new()),
        Production::ParamsList => param_names(&node.children[0]),
        Production::ParamlistDcl => Ok(vec![dcl_name(&node.children[0])?.to_string()]),
        Production::ParamlistCons => {
            let mut names = vec![dcl_name(&node.children[0])?.to_string()];
            names.extend(param_names(&node.children[2])?);
            Ok(names)
        }
        _ => Err(InternalError::shape("expected a params node").into()),
    }
}

fn dcl_name(dcl: &Tree) -> CompileResult<&str> {
    Ok(dcl.children[1].expect_lexeme()?)
}

fn dcl_type(dcl: &Tree) -> CompileResult<Type> {
    match dcl.children[0].production_or_err()? {
        Production::TypeInt => Ok(Type::Int),
        Production::TypeIntStar => Ok(Type::IntStar),
        _ => Err(InternalError::shape("dcl without a type child").into()),
    }
}

fn lookup_offset(offsets: &OffsetTable, name: &str) -> CompileResult<i32> {
    offsets
        .get(name)
        .copied()
        .ok_or_else(|| InternalError::shape(format!("no frame offset for '{}'", name)).into())
}

fn parse_literal(lexeme: &str) -> CompileResult<i32> {
    lexeme
        .parse()
        .map_err(|_| InternalError::InvalidLiteral(lexeme.to_string()).into())
}

// === Публичный API ===

/// Сгенерировать текст программы по аннотированному дереву.
pub fn generate(tree: &Tree) -> CompileResult<String> {
    let code = CodeGenerator::new().generate(tree)?;
    Ok(render(&code))
}

/// Структурный вариант для инструментов и тестов.
pub fn generate_instructions(tree: &Tree) -> CompileResult<Vec<Instr>> {
    CodeGenerator::new().generate(tree)
}

// === Тесты ===

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_checker::check;

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

    const NESTED_WHILE_PROGRAM: &str = "\
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
statements statements statement
statements .EMPTY
statement WHILE LPAREN test RPAREN LBRACE statements RBRACE
WHILE while
LPAREN (
test expr LT expr
expr term
term factor
factor ID
ID a
LT <
expr term
term factor
factor ID
ID b
RPAREN )
LBRACE {
statements statements statement
statements .EMPTY
statement WHILE LPAREN test RPAREN LBRACE statements RBRACE
WHILE while
LPAREN (
test expr LT expr
expr term
term factor
factor ID
ID b
LT <
expr term
term factor
factor ID
ID a
RPAREN )
LBRACE {
statements statements statement
statements .EMPTY
statement lvalue BECOMES expr SEMI
lvalue ID
ID a
BECOMES =
expr expr PLUS term
expr term
term factor
factor ID
ID a
PLUS +
term factor
factor NUM
NUM 1
SEMI ;
RBRACE }
RBRACE }
RETURN return
expr term
term factor
factor ID
ID a
SEMI ;
RBRACE }
EOF EOF
";

    const CALL_PROGRAM: &str = "\
start BOF procedures EOF
BOF BOF
procedures procedure procedures
procedure INT ID LPAREN params RPAREN LBRACE dcls statements RETURN expr SEMI RBRACE
INT int
ID f
LPAREN (
params paramlist
paramlist dcl COMMA paramlist
dcl type ID
type INT
INT int
ID x
COMMA ,
paramlist dcl
dcl type ID
type INT
INT int
ID y
RPAREN )
LBRACE {
dcls .EMPTY
statements .EMPTY
RETURN return
expr expr MINUS term
expr term
term factor
factor ID
ID x
MINUS -
term factor
factor ID
ID y
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
factor ID LPAREN arglist RPAREN
ID f
LPAREN (
arglist expr COMMA arglist
expr term
term factor
factor ID
ID a
COMMA ,
arglist expr
expr term
term factor
factor ID
ID b
RPAREN )
SEMI ;
RBRACE }
EOF EOF
";

    const DELETE_PROGRAM: &str = "\
start BOF procedures EOF
BOF BOF
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
statements statements statement
statements .EMPTY
statement DELETE LBRACK RBRACK expr SEMI
DELETE delete
LBRACK [
RBRACK ]
expr term
term factor
factor ID
ID a
SEMI ;
RETURN return
expr term
term factor
factor ID
ID b
SEMI ;
RBRACE }
EOF EOF
";

    const NEW_PROGRAM: &str = "\
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
expr term
term factor
factor STAR factor
STAR *
factor NEW INT LBRACK expr RBRACK
NEW new
INT int
LBRACK [
expr term
term factor
factor ID
ID b
RBRACK ]
SEMI ;
RBRACE }
EOF EOF
";

    fn compile(text: &str) -> String {
        let mut tree = Tree::decode(text).unwrap();
        check(&mut tree).unwrap();
        generate(&tree).unwrap()
    }

    fn assert_stack_balanced(asm: &str) {
        let pushes = asm.matches("sub $30, $30, $4").count();
        let pops = asm.matches("add $30, $30, $4").count();
        assert_eq!(pushes, pops, "stack pointer must return to its origin");
    }

    #[test]
    fn test_sum_program_assembly() {
        let asm = compile(SUM_PROGRAM);
        assert!(asm.starts_with(".import print\n.import init\n.import new\n.import delete\n"));
        assert!(asm.contains("lw $3, 8($29)")); // параметр a
        assert!(asm.contains("lw $3, 4($29)")); // параметр b
        assert!(asm.contains("add $3, $5, $3"));
        assert!(!asm.contains("slt")); // сравнений в программе нет
        assert!(asm.trim_end().ends_with("jr $31"));
        assert!(asm.contains("; end of prelogue"));
        assert_stack_balanced(&asm);
    }

    #[test]
    fn test_entry_point_for_int_parameters_zeroes_arg2() {
        let asm = compile(SUM_PROGRAM);
        assert!(asm.contains("add $2, $0, $0"));
        assert!(asm.contains(".word init"));
    }

    #[test]
    fn test_nested_whiles_use_distinct_labels() {
        let asm = compile(NESTED_WHILE_PROGRAM);
        for label in ["while1:", "while2:", "endwhile1:", "endwhile2:"] {
            assert_eq!(asm.matches(label).count(), 1, "label {} must be unique", label);
        }
        assert!(asm.contains("beq $3, $0, endwhile1"));
        assert!(asm.contains("beq $3, $0, endwhile2"));
        assert!(asm.contains("slt $3, $5, $3")); // знаковое сравнение int
        assert_stack_balanced(&asm);
    }

    #[test]
    fn test_call_pushes_arguments_and_restores_frame() {
        let asm = compile(CALL_PROGRAM);
        assert!(asm.contains("Pf:"));
        assert!(asm.contains(".word Pf"));
        assert!(asm.contains("sub $29, $30, $4"));
        // внутри f: первый параметр дальше всех, локальных нет
        assert!(asm.contains("lw $3, 8($29)"));
        assert!(asm.contains("lw $3, 4($29)"));
        assert!(asm.contains("sub $3, $5, $3"));
        assert_stack_balanced(&asm);
    }

    #[test]
    fn test_delete_skips_null_operand() {
        let asm = compile(DELETE_PROGRAM);
        assert!(asm.contains("beq $3, $11, 12"));
        assert!(asm.contains(".word delete"));
        // указательный первый параметр: init вызывается без обнуления $2
        assert!(!asm.contains("add $2, $0, $0"));
        assert_stack_balanced(&asm);
    }

    #[test]
    fn test_new_substitutes_null_on_failure() {
        let asm = compile(NEW_PROGRAM);
        assert!(asm.contains(".word new"));
        assert!(asm.contains("bne $3, $0, 2"));
        assert!(asm.contains("lw $3, 0($3)")); // разыменование результата
        assert_stack_balanced(&asm);
    }

    #[test]
    fn test_locals_receive_descending_offsets() {
        let dcls = Tree::decode(
            "dcls dcls dcl BECOMES NUM SEMI
dcls dcls dcl BECOMES NULL SEMI
dcls .EMPTY
dcl type ID
type INT STAR
INT int
STAR *
ID p
BECOMES =
NULL NULL
SEMI ;
dcl type ID
type INT
INT int
ID c
BECOMES =
NUM 5
SEMI ;
",
        )
        .unwrap();
        let mut generator = CodeGenerator::new();
        let mut offsets = OffsetTable::new();
        let count = generator.gen_locals(&dcls, &mut offsets).unwrap();
        assert_eq!(count, 2);
        assert_eq!(offsets["p"], 0); // объявлена первой
        assert_eq!(offsets["c"], -4);
        let asm = render(&generator.code);
        // NULL кодируется единицей и проталкивается первым
        assert!(asm.starts_with("lis $3\n.word 1\n"));
        assert!(asm.contains(".word 5"));
    }

    #[test]
    fn test_param_offsets_are_positive_word_aligned_and_distinct() {
        let names: Vec<String> = ["x", "y", "z"].iter().map(|s| s.to_string()).collect();
        let offsets = param_offsets(&names);
        assert_eq!(offsets["x"], 12);
        assert_eq!(offsets["y"], 8);
        assert_eq!(offsets["z"], 4);
        let mut values: Vec<i32> = offsets.values().copied().collect();
        values.sort_unstable();
        assert_eq!(values, vec![4, 8, 12]);
    }

    #[test]
    fn test_unannotated_tree_is_an_internal_error() {
        let tree = Tree::decode(NESTED_WHILE_PROGRAM).unwrap();
        let result = CodeGenerator::new().generate(&tree);
        assert!(matches!(
            result,
            Err(crate::error::CompileError::Internal(_))
        ));
    }
}
