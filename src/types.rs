//! Система типов MiniC.
//!
//! Язык знает ровно два типа значений: `int` и `int*`. Узлы дерева,
//! не несущие значения, остаются без аннотации (`Option<Type>` = `None`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Тип значения выражения.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// Обычное 32-битное целое.
    Int,
    /// Указатель на целое.
    IntStar,
}

impl Type {
    /// Распознать текстовую аннотацию из формата обмена деревьями.
    pub fn from_annotation(s: &str) -> Option<Type> {
        match s {
            "int" => Some(Type::Int),
            "int*" => Some(Type::IntStar),
            _ => None,
        }
    }

    /// Является ли тип указателем.
    pub fn is_pointer(self) -> bool {
        matches!(self, Type::IntStar)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::IntStar => write!(f, "int*"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation_round_trip() {
        assert_eq!(Type::from_annotation("int"), Some(Type::Int));
        assert_eq!(Type::from_annotation("int*"), Some(Type::IntStar));
        assert_eq!(Type::from_annotation("float"), None);
        assert_eq!(Type::Int.to_string(), "int");
        assert_eq!(Type::IntStar.to_string(), "int*");
    }

    #[test]
    fn test_is_pointer() {
        assert!(Type::IntStar.is_pointer());
        assert!(!Type::Int.is_pointer());
    }
}
