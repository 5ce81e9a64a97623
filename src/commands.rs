//! CLI command implementations

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use closure_core::{
    ClosureConfig, ClosureEngine, ClosureReport, FileKey, FrontendConfig, InclusionTree, ListedSymbol, RelationGraphs,
    TranslationUnit, build_graphs, list_symbols, render_symbol_list,
};
use closure_frontend::{CTranslationUnit, Frontend};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use serde::Serialize;

use crate::Format;

/// Configuration sources given on the command line.
pub struct Options {
    pub config: Option<PathBuf>,
    pub include_dirs: Vec<PathBuf>,
    pub system_include_dirs: Vec<PathBuf>,
    pub include_type_refs: bool,
    pub exclude: Vec<String>,
}

impl Options {
    /// Load the configuration file and apply the flags on top of it.
    pub fn load(self) -> anyhow::Result<ClosureConfig> {
        let cwd = std::env::current_dir().context("Cannot determine the working directory")?;
        let mut config = ClosureConfig::discover(self.config.as_deref(), &cwd).context("Failed to load configuration")?;

        config.frontend.include_dirs.extend(self.include_dirs);
        // flag directories are searched before the configured ones
        if !self.system_include_dirs.is_empty() {
            let configured = std::mem::take(&mut config.frontend.system_include_dirs);
            config.frontend.system_include_dirs = self.system_include_dirs;
            config.frontend.system_include_dirs.extend(configured);
        }
        config.frontend.exclude.extend(self.exclude);
        if self.include_type_refs {
            config.relations.include_type_references = true;
        }
        tracing::debug!("Configuration: {:?}", config);
        Ok(config)
    }
}

/// One listing per file. A single file prints its bare listing; several
/// files are each headed by their path.
pub fn list(config: &ClosureConfig, files: &[PathBuf], format: Format) -> anyhow::Result<()> {
    let mut listings = Vec::with_capacity(files.len());
    for file in files {
        let unit = parse_seed_unit(config, file)?;
        let symbols = list_symbols(&unit).with_context(|| format!("Cannot list symbols of {}", file.display()))?;
        listings.push(FileListing {
            file: file.display().to_string(),
            symbols,
        });
    }

    match (format, listings.as_slice()) {
        (Format::Text, [single]) => print!("{}", render_symbol_list(&single.symbols)),
        (Format::Json, [single]) => println!("{}", serde_json::to_string_pretty(&single.symbols)?),
        (Format::Text, _) => {
            let blocks: Vec<String> = listings
                .iter()
                .map(|listing| format!("{}:\n{}", listing.file, render_symbol_list(&listing.symbols)))
                .collect();
            print!("{}", blocks.join("\n"));
        }
        (Format::Json, _) => println!("{}", serde_json::to_string_pretty(&listings)?),
    }
    Ok(())
}

#[derive(Serialize)]
struct FileListing {
    file: String,
    symbols: Vec<ListedSymbol>,
}

pub fn select(config: &ClosureConfig, file: &Path, symbol: usize) -> anyhow::Result<()> {
    let unit = parse_seed_unit(config, file)?;
    let key = closure_core::select(&unit, symbol)?;
    println!("{key}");
    Ok(())
}

pub fn tree(config: &ClosureConfig, sources: &[PathBuf], format: Format, dot: bool) -> anyhow::Result<()> {
    let graphs = build(config, sources, None)?;
    if dot {
        print!("{}", graphs.inclusion_dot());
        return Ok(());
    }

    let tree = InclusionTree::from_graphs(&graphs);
    match format {
        Format::Text => print!("{}", tree.render()),
        Format::Json => println!("{}", serde_json::to_string_pretty(&tree)?),
    }
    Ok(())
}

pub fn closure(
    config: &ClosureConfig,
    file: &Path,
    symbol: usize,
    sources: &[PathBuf],
    format: Format,
    dot: bool,
) -> anyhow::Result<()> {
    // Phase 1: the seed comes from the seed file alone
    let unit = parse_seed_unit(config, file)?;
    let seed_symbol = closure_core::select(&unit, symbol)?;
    let seed_file = unit.main_file();
    tracing::info!("Seed: {} in {}", seed_symbol, file.display());

    // Phase 2: graphs over the whole corpus
    let graphs = build(config, sources, Some(file))?;
    if dot {
        print!("{}", graphs.symbol_dot());
        return Ok(());
    }

    let result = ClosureEngine::new(&graphs).closure_of(seed_file, &seed_symbol)?;
    tracing::info!("Closure: {} files, {} symbols", result.files.len(), result.symbols.len());

    let report = ClosureReport::new(&graphs, seed_file, &seed_symbol, &result);
    match format {
        Format::Text => print!("{}", report.render()),
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn parse_seed_unit(config: &ClosureConfig, file: &Path) -> anyhow::Result<CTranslationUnit> {
    Frontend::new(config.frontend.clone())
        .parse_unit(file)
        .with_context(|| format!("Failed to parse {}", file.display()))
}

/// Parse every source and build the relation graphs. `seed` is added to the
/// corpus when no source resolves to it.
fn build(config: &ClosureConfig, sources: &[PathBuf], seed: Option<&Path>) -> anyhow::Result<RelationGraphs> {
    let mut paths = discover_sources(sources, &config.frontend)?;
    if let Some(seed) = seed {
        let seed_key = FileKey::for_path(seed).with_context(|| format!("Cannot read {}", seed.display()))?;
        if !paths.iter().any(|path| FileKey::for_path(path).is_ok_and(|key| key == seed_key)) {
            tracing::debug!("Adding seed file {} to the sources", seed.display());
            paths.push(seed.to_path_buf());
        }
    }
    if paths.is_empty() {
        anyhow::bail!("No C sources found");
    }

    let units = Frontend::new(config.frontend.clone()).parse_units(&paths);
    let graphs = build_graphs(&units, &config.relations);
    let stats = &graphs.stats;
    if stats.dropped_events + stats.skipped_declarations + stats.unresolved_symbols + stats.conflicting_definitions > 0 {
        tracing::info!(
            "Skipped during construction: {} inclusion events, {} declarations, {} unresolved symbols, {} conflicting definitions",
            stats.dropped_events,
            stats.skipped_declarations,
            stats.unresolved_symbols,
            stats.conflicting_definitions
        );
    }
    Ok(graphs)
}

/// Expand directories into their C sources. Files named explicitly are kept
/// as given; walked files are filtered by extension and exclude globs.
fn discover_sources(inputs: &[PathBuf], config: &FrontendConfig) -> anyhow::Result<Vec<PathBuf>> {
    let excludes = exclude_set(&config.exclude)?;
    let mut seen = HashSet::new();
    let mut sources = Vec::new();

    for input in inputs {
        if input.is_file() {
            if seen.insert(input.clone()) {
                sources.push(input.clone());
            }
            continue;
        }
        if !input.is_dir() {
            anyhow::bail!("No such file or directory: {}", input.display());
        }

        let walker = WalkBuilder::new(input)
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();
        for entry in walker.filter_map(|entry| entry.ok()) {
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(input).unwrap_or(path);
            if !has_extension(path, &config.extensions) || excludes.is_match(relative) {
                continue;
            }
            if seen.insert(path.to_path_buf()) {
                sources.push(path.to_path_buf());
            }
        }
    }

    tracing::info!("Discovered {} sources", sources.len());
    Ok(sources)
}

fn exclude_set(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid exclude pattern `{pattern}`"))?);
    }
    Ok(builder.build()?)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|wanted| wanted == ext))
}
