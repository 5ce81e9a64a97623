//! Canonical C types as seen by the name canonicalizer

use serde::{Deserialize, Serialize};

/// Fundamental arithmetic and void types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Builtin {
    Void,
    Bool,
    Char,
    SignedChar,
    UnsignedChar,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Long,
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
    Int128,
    UnsignedInt128,
    Float,
    Double,
    LongDouble,
    Char16,
    Char32,
    WChar,
}

impl Builtin {
    /// Builtin for a single-token type name such as `int` or `size_t`.
    ///
    /// Standard typedef names map to their LP64 canonical type.
    pub fn from_name(name: &str) -> Option<Self> {
        let builtin = match name {
            "void" => Builtin::Void,
            "bool" | "_Bool" => Builtin::Bool,
            "char" => Builtin::Char,
            "short" => Builtin::Short,
            "int" | "signed" => Builtin::Int,
            "unsigned" => Builtin::UnsignedInt,
            "long" => Builtin::Long,
            "float" => Builtin::Float,
            "double" => Builtin::Double,
            "__int128" => Builtin::Int128,
            "int8_t" => Builtin::SignedChar,
            "uint8_t" => Builtin::UnsignedChar,
            "int16_t" => Builtin::Short,
            "uint16_t" => Builtin::UnsignedShort,
            "int32_t" => Builtin::Int,
            "uint32_t" => Builtin::UnsignedInt,
            "int64_t" | "ssize_t" | "ptrdiff_t" | "intptr_t" | "intmax_t" => Builtin::Long,
            "uint64_t" | "size_t" | "uintptr_t" | "uintmax_t" => Builtin::UnsignedLong,
            "char16_t" => Builtin::Char16,
            "char32_t" => Builtin::Char32,
            "wchar_t" => Builtin::WChar,
            _ => return None,
        };
        Some(builtin)
    }
}

/// `struct` or `union`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordTag {
    Struct,
    Union,
}

/// Signature of a function type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionType {
    pub ret: Box<CType>,
    pub params: Vec<CType>,
    pub variadic: bool,
}

/// A typedef-stripped C type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CType {
    Builtin(Builtin),
    Record { tag: RecordTag, name: String },
    Enum(String),
    Pointer(Box<CType>),
    Array { element: Box<CType>, size: Option<u64> },
    Function(FunctionType),
    Qualified { inner: Box<CType>, is_const: bool, is_volatile: bool },
    /// A type name the front-end could not resolve (macro, missing typedef).
    Named(String),
}

impl CType {
    pub fn int() -> Self {
        CType::Builtin(Builtin::Int)
    }

    pub fn pointer_to(inner: CType) -> Self {
        CType::Pointer(Box::new(inner))
    }

    /// Wrap in const/volatile, merging with any existing qualifiers.
    pub fn qualified(self, is_const: bool, is_volatile: bool) -> Self {
        if !is_const && !is_volatile {
            return self;
        }
        match self {
            CType::Qualified { inner, is_const: c, is_volatile: v } => CType::Qualified {
                inner,
                is_const: c || is_const,
                is_volatile: v || is_volatile,
            },
            other => CType::Qualified {
                inner: Box::new(other),
                is_const,
                is_volatile,
            },
        }
    }

    /// The type with top-level qualifiers removed.
    pub fn unqualified(&self) -> &CType {
        match self {
            CType::Qualified { inner, .. } => inner.unqualified(),
            other => other,
        }
    }

    /// Parameter adjustment: drop top-level qualifiers, decay arrays and functions to pointers.
    pub fn adjusted_parameter(&self) -> CType {
        match self.unqualified() {
            CType::Array { element, .. } => CType::Pointer(element.clone()),
            CType::Function(f) => CType::Pointer(Box::new(CType::Function(f.clone()))),
            other => other.clone(),
        }
    }

    /// The record this type names once pointers, arrays and qualifiers are peeled off.
    pub fn underlying_record(&self) -> Option<(RecordTag, &str)> {
        match self {
            CType::Record { tag, name } => Some((*tag, name.as_str())),
            CType::Pointer(inner) | CType::Array { element: inner, .. } | CType::Qualified { inner, .. } => {
                inner.underlying_record()
            }
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self.unqualified(), CType::Builtin(Builtin::Void))
    }
}
