//! Словарь MIPS-ассемблера, который выдаёт генератор кода.
//!
//! Инструкции хранятся структурно и превращаются в текст только при
//! печати: так тесты проверяют инварианты (баланс стека, уникальность
//! меток) без разбора строк. Одна инструкция или директива - одна строка
//! вывода; внешний ассемблер кодирует их в 32-битные слова.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Регистр MIPS. Роли фиксированы соглашением генератора и не
/// настраиваются.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reg(pub u8);

impl Reg {
    /// Всегда ноль.
    pub const ZERO: Reg = Reg(0);
    /// Первый аргумент точки входа / аргумент рантайм-вызовов.
    pub const ARG1: Reg = Reg(1);
    /// Второй аргумент точки входа.
    pub const ARG2: Reg = Reg(2);
    /// Результат последнего вычисленного выражения.
    pub const RESULT: Reg = Reg(3);
    /// Константа 4 (размер машинного слова), задаётся в прологе.
    pub const FOUR: Reg = Reg(4);
    /// Рабочий регистр (второй операнд после pop).
    pub const SCRATCH: Reg = Reg(5);
    /// Рабочий регистр для сравнений.
    pub const SCRATCH2: Reg = Reg(6);
    /// Рабочий регистр для сравнений.
    pub const SCRATCH3: Reg = Reg(7);
    /// Константа 1 (кодировка NULL), задаётся в прологе.
    pub const ONE: Reg = Reg(11);
    /// Указатель кадра активной процедуры.
    pub const FP: Reg = Reg(29);
    /// Указатель стека.
    pub const SP: Reg = Reg(30);
    /// Адрес возврата.
    pub const RA: Reg = Reg(31);
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// Цель условного перехода: текстовая метка или литеральное смещение
/// в словах.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    Label(String),
    Offset(i32),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Label(name) => write!(f, "{}", name),
            Target::Offset(words) => write!(f, "{}", words),
        }
    }
}

/// Аргумент директивы `.word`: литерал или адрес метки.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WordValue {
    Literal(i32),
    Label(String),
}

impl fmt::Display for WordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WordValue::Literal(value) => write!(f, "{}", value),
            WordValue::Label(name) => write!(f, "{}", name),
        }
    }
}

/// Одна инструкция или директива выходного ассемблера.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instr {
    Add(Reg, Reg, Reg),
    Sub(Reg, Reg, Reg),
    Mult(Reg, Reg),
    Multu(Reg, Reg),
    Div(Reg, Reg),
    Divu(Reg, Reg),
    Mfhi(Reg),
    Mflo(Reg),
    Lis(Reg),
    Slt(Reg, Reg, Reg),
    Sltu(Reg, Reg, Reg),
    Jr(Reg),
    Jalr(Reg),
    Beq(Reg, Reg, Target),
    Bne(Reg, Reg, Target),
    /// `lw $t, i($s)`
    Lw(Reg, i32, Reg),
    /// `sw $t, i($s)`
    Sw(Reg, i32, Reg),
    Word(WordValue),
    /// Определение метки: `name:`
    Label(String),
    /// Импорт рантайм-процедуры: `.import name`
    Import(String),
    /// Комментарий: `; текст`
    Comment(String),
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Add(d, s, t) => write!(f, "add {}, {}, {}", d, s, t),
            Instr::Sub(d, s, t) => write!(f, "sub {}, {}, {}", d, s, t),
            Instr::Mult(s, t) => write!(f, "mult {}, {}", s, t),
            Instr::Multu(s, t) => write!(f, "multu {}, {}", s, t),
            Instr::Div(s, t) => write!(f, "div {}, {}", s, t),
            Instr::Divu(s, t) => write!(f, "divu {}, {}", s, t),
            Instr::Mfhi(d) => write!(f, "mfhi {}", d),
            Instr::Mflo(d) => write!(f, "mflo {}", d),
            Instr::Lis(d) => write!(f, "lis {}", d),
            Instr::Slt(d, s, t) => write!(f, "slt {}, {}, {}", d, s, t),
            Instr::Sltu(d, s, t) => write!(f, "sltu {}, {}, {}", d, s, t),
            Instr::Jr(s) => write!(f, "jr {}", s),
            Instr::Jalr(s) => write!(f, "jalr {}", s),
            Instr::Beq(s, t, target) => write!(f, "beq {}, {}, {}", s, t, target),
            Instr::Bne(s, t, target) => write!(f, "bne {}, {}, {}", s, t, target),
            Instr::Lw(t, offset, s) => write!(f, "lw {}, {}({})", t, offset, s),
            Instr::Sw(t, offset, s) => write!(f, "sw {}, {}({})", t, offset, s),
            Instr::Word(value) => write!(f, ".word {}", value),
            Instr::Label(name) => write!(f, "{}:", name),
            Instr::Import(name) => write!(f, ".import {}", name),
            Instr::Comment(text) => write!(f, "; {}", text),
        }
    }
}

/// Склеить инструкции в текст программы, по строке на инструкцию.
pub fn render(instructions: &[Instr]) -> String {
    let mut out = String::new();
    for instr in instructions {
        out.push_str(&instr.to_string());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_rendering() {
        assert_eq!(
            Instr::Add(Reg::RESULT, Reg::SCRATCH, Reg::RESULT).to_string(),
            "add $3, $5, $3"
        );
        assert_eq!(Instr::Lw(Reg::RESULT, 8, Reg::FP).to_string(), "lw $3, 8($29)");
        assert_eq!(Instr::Sw(Reg::RESULT, -4, Reg::SP).to_string(), "sw $3, -4($30)");
        assert_eq!(
            Instr::Beq(Reg::RESULT, Reg::ZERO, Target::Label("else1".to_string())).to_string(),
            "beq $3, $0, else1"
        );
        assert_eq!(
            Instr::Bne(Reg::RESULT, Reg::ZERO, Target::Offset(2)).to_string(),
            "bne $3, $0, 2"
        );
        assert_eq!(
            Instr::Word(WordValue::Label("Pf".to_string())).to_string(),
            ".word Pf"
        );
        assert_eq!(Instr::Word(WordValue::Literal(4)).to_string(), ".word 4");
        assert_eq!(Instr::Label("while1".to_string()).to_string(), "while1:");
        assert_eq!(Instr::Import("print".to_string()).to_string(), ".import print");
    }

    #[test]
    fn test_render_joins_lines() {
        let program = vec![Instr::Lis(Reg::FOUR), Instr::Word(WordValue::Literal(4))];
        assert_eq!(render(&program), "lis $4\n.word 4\n");
    }
}
