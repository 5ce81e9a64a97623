//! Parsed translation units and the front-end entry points

use std::path::{Path, PathBuf};

use closure_core::{Declaration, FileKey, FrontendConfig, InclusionEvent, Reference, SourceLocation, TranslationUnit};
use indexmap::IndexMap;
use rayon::prelude::*;

use crate::declarations;
use crate::error::Result;
use crate::parser_pool::{ParserPool, create_parser_pool};
use crate::preprocess::Preprocessor;
use crate::references;

#[derive(Debug, Clone)]
struct FileInfo {
    path: PathBuf,
    is_system: bool,
}

/// A C translation unit with declarations and references resolved.
///
/// Owns no syntax trees; everything the builders need is extracted up front.
#[derive(Debug, Clone)]
pub struct CTranslationUnit {
    main: FileKey,
    main_path: PathBuf,
    files: IndexMap<FileKey, FileInfo>,
    declarations: Vec<Declaration>,
    references: Vec<Vec<Reference>>,
    events: Vec<InclusionEvent>,
}

impl CTranslationUnit {
    /// Files of the unit in the order they were entered.
    pub fn files(&self) -> impl Iterator<Item = (FileKey, &Path)> {
        self.files.iter().map(|(key, info)| (*key, info.path.as_path()))
    }

    /// Key of a file of this unit by its path as opened.
    pub fn file_key(&self, path: &Path) -> Option<FileKey> {
        self.files
            .iter()
            .find(|(_, info)| info.path == path)
            .map(|(key, _)| *key)
    }

    pub fn is_system_file(&self, key: FileKey) -> bool {
        self.files.get(&key).is_some_and(|info| info.is_system)
    }
}

impl TranslationUnit for CTranslationUnit {
    fn main_file(&self) -> FileKey {
        self.main
    }

    fn main_path(&self) -> &Path {
        &self.main_path
    }

    fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    fn is_in_system_header(&self, location: &SourceLocation) -> bool {
        location.file.is_some_and(|key| self.is_system_file(key))
    }

    fn file_path(&self, key: FileKey) -> Option<&Path> {
        self.files.get(&key).map(|info| info.path.as_path())
    }

    fn inclusion_events(&self) -> &[InclusionEvent] {
        &self.events
    }

    fn references<'a>(&'a self, decl: &'a Declaration) -> Box<dyn Iterator<Item = Reference> + 'a> {
        let references = self.references.get(decl.id.index()).map(Vec::as_slice).unwrap_or_default();
        Box::new(references.iter().copied())
    }
}

/// The C front-end: turns source paths into translation units.
pub struct Frontend {
    pool: ParserPool,
    config: FrontendConfig,
}

impl Frontend {
    pub fn new(config: FrontendConfig) -> Self {
        Self::with_pool(create_parser_pool(), config)
    }

    pub fn with_pool(pool: ParserPool, config: FrontendConfig) -> Self {
        Frontend { pool, config }
    }

    pub fn config(&self) -> &FrontendConfig {
        &self.config
    }

    /// Preprocess, parse and resolve one translation unit.
    pub fn parse_unit(&self, path: &Path) -> Result<CTranslationUnit> {
        let preprocessed = Preprocessor::new(&self.pool, &self.config).run(path)?;
        let (decls, references) = {
            let collected = declarations::collect(&preprocessed);
            let references = references::resolve(&collected);
            (collected.declarations, references)
        };

        let files = preprocessed
            .files
            .iter()
            .map(|(key, file)| {
                (*key, FileInfo {
                    path: file.path.clone(),
                    is_system: file.is_system,
                })
            })
            .collect();

        tracing::debug!(
            "Parsed {}: {} files, {} declarations, {} inclusion events",
            path.display(),
            preprocessed.files.len(),
            decls.len(),
            preprocessed.events.len()
        );
        Ok(CTranslationUnit {
            main: preprocessed.main,
            main_path: path.to_path_buf(),
            files,
            declarations: decls,
            references,
            events: preprocessed.events,
        })
    }

    /// Parse many units in parallel. Failures are logged and skipped; the
    /// surviving units keep their input order.
    pub fn parse_units(&self, paths: &[PathBuf]) -> Vec<CTranslationUnit> {
        let units: Vec<CTranslationUnit> = paths
            .par_iter()
            .filter_map(|path| match self.parse_unit(path) {
                Ok(unit) => Some(unit),
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    None
                }
            })
            .collect();
        tracing::info!("Parsed {} of {} translation units", units.len(), paths.len());
        units
    }
}
