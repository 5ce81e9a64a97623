//! Position-based symbol selection.
//!
//! Symbols are the function and record declarations physically located in
//! the unit's main file, counted from 0 in document order. Prototypes and
//! definitions each take an index of their own. `list_symbols` and `select`
//! share the counting rule, so index `i` of a listing is what `select(i)`
//! returns.

use serde::{Deserialize, Serialize};

use crate::decl::{Declaration, TranslationUnit};
use crate::error::{ClosureError, Result};
use crate::identity::signature_of;
use crate::model::{SymbolKey, SymbolKind};

/// One entry of a main-file symbol listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListedSymbol {
    pub index: usize,
    pub kind: SymbolKind,
    pub signature: SymbolKey,
    pub name: String,
}

/// Declarations that count as selectable symbols, in order.
fn selectable<U>(unit: &U) -> impl Iterator<Item = &Declaration>
where
    U: TranslationUnit + ?Sized,
{
    unit.declarations()
        .iter()
        .filter(|decl| decl.is_symbol() && unit.is_in_main_file(&decl.location))
}

/// Signature of the `index`-th symbol of the unit's main file.
pub fn select<U>(unit: &U, index: usize) -> Result<SymbolKey>
where
    U: TranslationUnit + ?Sized,
{
    match selectable(unit).nth(index) {
        Some(decl) => {
            let key = signature_of(unit, decl)?;
            tracing::debug!("Selected symbol {} `{}` -> {}", index, decl.name, key);
            Ok(key)
        }
        None => Err(ClosureError::IndexOutOfRange {
            index,
            count: selectable(unit).count(),
            file: unit.main_path().to_path_buf(),
        }),
    }
}

/// Every selectable symbol of the unit's main file.
pub fn list_symbols<U>(unit: &U) -> Result<Vec<ListedSymbol>>
where
    U: TranslationUnit + ?Sized,
{
    selectable(unit)
        .enumerate()
        .map(|(index, decl)| {
            let signature = signature_of(unit, decl)?;
            let kind = decl
                .kind
                .symbol_kind()
                .ok_or_else(|| ClosureError::UnsupportedDeclarationKind {
                    name: decl.name.clone(),
                    kind: decl.kind.label(),
                })?;
            Ok(ListedSymbol {
                index,
                kind,
                signature,
                name: decl.name.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::UnitBuilder;

    /// `int inc(int x) { return x + 1; } struct MyStruct { int value; };`
    fn simple_unit() -> crate::test_utils::MemoryUnit {
        let mut unit = UnitBuilder::new("simple.c");
        unit.function("inc", 1).params(vec![crate::types::CType::int()]).define();
        unit.record("MyStruct", 5).define();
        unit.build()
    }

    #[test]
    fn test_select_in_document_order() {
        let unit = simple_unit();
        assert_eq!(select(&unit, 0).unwrap().as_str(), "_Z3inci");
        assert_eq!(select(&unit, 1).unwrap().as_str(), "_ZTS8MyStruct");
    }

    #[test]
    fn test_select_out_of_range() {
        let unit = simple_unit();
        let err = select(&unit, 2).unwrap_err();
        match err {
            ClosureError::IndexOutOfRange { index, count, file } => {
                assert_eq!(index, 2);
                assert_eq!(count, 2);
                assert_eq!(file, std::path::PathBuf::from("simple.c"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_header_declarations_are_not_counted() {
        let mut unit = UnitBuilder::new("main.c");
        let header = unit.header("util.h", false);
        unit.function("helper", 1).in_file(header).declare();
        unit.function("run", 3).define();
        let unit = unit.build();

        assert_eq!(select(&unit, 0).unwrap().as_str(), "_Z3runv");
        assert!(select(&unit, 1).is_err());
    }

    #[test]
    fn test_non_symbols_are_skipped() {
        let mut unit = UnitBuilder::new("main.c");
        unit.variable("counter", 1);
        unit.typedef("Count", 2);
        unit.function("tick", 3).define();
        let unit = unit.build();

        let listing = list_symbols(&unit).unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].kind, SymbolKind::Function);
        assert_eq!(listing[0].name, "tick");
    }

    #[test]
    fn test_listing_matches_selection() {
        let mut unit = UnitBuilder::new("main.c");
        unit.function("step", 1).declare();
        unit.record("State", 2).define();
        unit.function("step", 5).define();
        let unit = unit.build();

        let listing = list_symbols(&unit).unwrap();
        assert_eq!(listing.len(), 3);
        for entry in &listing {
            assert_eq!(select(&unit, entry.index).unwrap(), entry.signature);
        }
        // prototype and definition share a signature
        assert_eq!(listing[0].signature, listing[2].signature);
    }
}
