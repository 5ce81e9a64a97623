//! Canonical symbol names.
//!
//! Signatures follow the Itanium C++ ABI manglings closely enough that
//! overloads never collide and a prototype always produces the same key as
//! its definition: parameter types are encoded after canonicalization
//! (typedefs stripped, arrays decayed, top-level qualifiers dropped).
//! Substitution compression (`S_`, `S0_`) is not performed.

use crate::decl::{DeclKind, Declaration, TranslationUnit};
use crate::error::{ClosureError, Result};
use crate::model::SymbolKey;
use crate::types::{Builtin, CType, FunctionType};

/// Produces the signature used as a [`SymbolKey`].
pub trait NameMangler: Send + Sync {
    /// `enclosing` is the function declaring `decl` at block scope, if any.
    fn mangle(&self, decl: &Declaration, enclosing: Option<&Declaration>) -> Result<SymbolKey>;
}

/// Itanium-style mangler.
#[derive(Debug, Clone, Copy, Default)]
pub struct ItaniumMangler;

impl NameMangler for ItaniumMangler {
    fn mangle(&self, decl: &Declaration, enclosing: Option<&Declaration>) -> Result<SymbolKey> {
        let mut out = String::new();
        match &decl.kind {
            DeclKind::Function(signature) => {
                if decl.name == "main" && enclosing.is_none() {
                    return Ok(SymbolKey::new("main"));
                }
                out.push_str("_Z");
                function_encoding(&decl.name, signature, &mut out);
            }
            DeclKind::Record(_) if !decl.name.is_empty() => {
                out.push_str("_ZTS");
                if let Some(function) = enclosing {
                    local_prefix(function, &mut out)?;
                }
                source_name(&decl.name, &mut out);
            }
            DeclKind::Record(_) => {
                return Err(ClosureError::UnsupportedDeclarationKind {
                    name: decl.name.clone(),
                    kind: "anonymous record",
                });
            }
            other => {
                return Err(ClosureError::UnsupportedDeclarationKind {
                    name: decl.name.clone(),
                    kind: other.label(),
                });
            }
        }
        Ok(SymbolKey::new(out))
    }
}

/// Signature of `decl` within `unit`, using the default mangler.
pub fn signature_of<U>(unit: &U, decl: &Declaration) -> Result<SymbolKey>
where
    U: TranslationUnit + ?Sized,
{
    signature_with(&ItaniumMangler, unit, decl)
}

/// Signature of `decl` within `unit` using `mangler`.
pub fn signature_with<U>(mangler: &dyn NameMangler, unit: &U, decl: &Declaration) -> Result<SymbolKey>
where
    U: TranslationUnit + ?Sized,
{
    let enclosing = decl.enclosing.and_then(|id| unit.declaration(id));
    mangler.mangle(decl, enclosing)
}

fn local_prefix(function: &Declaration, out: &mut String) -> Result<()> {
    match &function.kind {
        DeclKind::Function(signature) => {
            out.push('Z');
            function_encoding(&function.name, signature, out);
            out.push('E');
            Ok(())
        }
        other => Err(ClosureError::UnsupportedDeclarationKind {
            name: function.name.clone(),
            kind: other.label(),
        }),
    }
}

fn function_encoding(name: &str, signature: &FunctionType, out: &mut String) {
    source_name(name, out);
    bare_function_type(signature, out);
}

fn source_name(name: &str, out: &mut String) {
    out.push_str(&name.len().to_string());
    out.push_str(name);
}

fn bare_function_type(signature: &FunctionType, out: &mut String) {
    if signature.params.is_empty() {
        out.push(if signature.variadic { 'z' } else { 'v' });
        return;
    }
    for param in &signature.params {
        mangle_type(&param.adjusted_parameter(), out);
    }
    if signature.variadic {
        out.push('z');
    }
}

fn mangle_type(ty: &CType, out: &mut String) {
    match ty {
        CType::Builtin(builtin) => out.push_str(builtin_code(*builtin)),
        CType::Record { name, .. } | CType::Enum(name) | CType::Named(name) => source_name(name, out),
        CType::Pointer(inner) => {
            out.push('P');
            mangle_type(inner, out);
        }
        CType::Array { element, size } => {
            out.push('A');
            if let Some(size) = size {
                out.push_str(&size.to_string());
            }
            out.push('_');
            mangle_type(element, out);
        }
        CType::Function(signature) => {
            out.push('F');
            mangle_type(&signature.ret, out);
            bare_function_type(signature, out);
            out.push('E');
        }
        CType::Qualified { inner, is_const, is_volatile } => {
            if *is_volatile {
                out.push('V');
            }
            if *is_const {
                out.push('K');
            }
            mangle_type(inner, out);
        }
    }
}

fn builtin_code(builtin: Builtin) -> &'static str {
    match builtin {
        Builtin::Void => "v",
        Builtin::Bool => "b",
        Builtin::Char => "c",
        Builtin::SignedChar => "a",
        Builtin::UnsignedChar => "h",
        Builtin::Short => "s",
        Builtin::UnsignedShort => "t",
        Builtin::Int => "i",
        Builtin::UnsignedInt => "j",
        Builtin::Long => "l",
        Builtin::UnsignedLong => "m",
        Builtin::LongLong => "x",
        Builtin::UnsignedLongLong => "y",
        Builtin::Int128 => "n",
        Builtin::UnsignedInt128 => "o",
        Builtin::Float => "f",
        Builtin::Double => "d",
        Builtin::LongDouble => "e",
        Builtin::Char16 => "Ds",
        Builtin::Char32 => "Di",
        Builtin::WChar => "w",
    }
}
