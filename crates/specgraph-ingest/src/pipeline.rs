//! The build: load every source, then run the importers in order, then
//! freeze.
//!
//! Loading finishes before any import starts, so a malformed source never
//! leaves a half-built database behind.

use crate::config::BuildConfig;
use crate::import::{
    import_documentation, import_identifier_overrides, import_legacy, import_oob_relationships,
    import_registry, import_sam, import_stateful_resources, merge_regions, ImportError,
};
use crate::loader::{LoadFailure, Loaded, SourceKind, SourceLoader};
use crate::patches::builtin_patch_sets;
use crate::sources::{
    DocsDocument, IdentifierOverrides, LegacySpec, OobRelationships, RegistrySchema, StatefulResources,
};
use specgraph_db::{Database, DbError, Snapshot};
use specgraph_patch::PatchSets;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Load(#[from] LoadFailure),

    #[error("{importer} import failed:{}", render_errors(.errors))]
    Import {
        importer: &'static str,
        errors: Vec<ImportError>,
    },

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    #[error("invalid build configuration {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },
}

fn render_errors(errors: &[ImportError]) -> String {
    errors.iter().map(|err| format!("\n  {err}")).collect()
}

impl BuildError {
    fn import(importer: &'static str, err: ImportError) -> Self {
        BuildError::Import {
            importer,
            errors: vec![err],
        }
    }
}

/// Every source document, patched and parsed.
#[derive(Debug, Default)]
pub struct LoadedSources {
    pub registry: Vec<Loaded<RegistrySchema>>,
    /// In merge order, with the region each came from.
    pub legacy: Vec<(String, Loaded<LegacySpec>)>,
    pub sam: Option<Loaded<LegacySpec>>,
    pub documentation: Option<Loaded<DocsDocument>>,
    pub stateful: Option<Loaded<StatefulResources>>,
    pub identifier_overrides: Option<Loaded<IdentifierOverrides>>,
    pub oob_relationships: Option<Loaded<OobRelationships>>,
}

impl LoadedSources {
    /// Total number of patches applied across every source.
    pub fn patch_count(&self) -> usize {
        let registry: usize = self.registry.iter().map(|l| l.patches.len()).sum();
        let legacy: usize = self.legacy.iter().map(|(_, l)| l.patches.len()).sum();
        registry
            + legacy
            + self.sam.as_ref().map_or(0, |l| l.patches.len())
            + self.documentation.as_ref().map_or(0, |l| l.patches.len())
            + self.stateful.as_ref().map_or(0, |l| l.patches.len())
            + self.identifier_overrides.as_ref().map_or(0, |l| l.patches.len())
            + self.oob_relationships.as_ref().map_or(0, |l| l.patches.len())
    }
}

/// Registry schema files under `dir`, in a stable order.
fn registry_files(dir: &Path) -> Result<Vec<PathBuf>, BuildError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let is_json = entry.path().extension().is_some_and(|ext| ext == "json");
        if entry.file_type().is_file() && is_json {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn load_optional<T: serde::de::DeserializeOwned>(
    loader: &SourceLoader,
    kind: SourceKind,
    path: Option<&PathBuf>,
) -> Result<Option<Loaded<T>>, LoadFailure> {
    path.map(|path| loader.load_file(kind, path)).transpose()
}

pub fn load_sources(config: &BuildConfig, loader: &SourceLoader) -> Result<LoadedSources, BuildError> {
    let mut sources = LoadedSources::default();
    for path in registry_files(&config.registry_dir)? {
        sources.registry.push(loader.load_file(SourceKind::Registry, &path)?);
    }
    for legacy in &config.legacy_specs {
        let loaded = loader.load_file(SourceKind::Legacy, &legacy.path)?;
        sources.legacy.push((legacy.region.clone(), loaded));
    }
    sources.sam = load_optional(loader, SourceKind::Sam, config.sam_spec.as_ref())?;
    sources.documentation = load_optional(loader, SourceKind::Documentation, config.documentation.as_ref())?;
    sources.stateful = load_optional(loader, SourceKind::Stateful, config.stateful_resources.as_ref())?;
    sources.identifier_overrides = load_optional(
        loader,
        SourceKind::IdentifierOverrides,
        config.identifier_overrides.as_ref(),
    )?;
    sources.oob_relationships = load_optional(
        loader,
        SourceKind::OobRelationships,
        config.oob_relationships.as_ref(),
    )?;

    tracing::info!(
        registry = sources.registry.len(),
        legacy = sources.legacy.len(),
        patches = sources.patch_count(),
        "loaded sources"
    );
    Ok(sources)
}

/// Run the importers in build order against a fresh database.
pub fn import_sources(sources: &LoadedSources) -> Result<Database, BuildError> {
    let mut db = Database::new();

    let mut registry_errors = Vec::new();
    for schema in &sources.registry {
        if let Err(err) = import_registry(&mut db, &schema.document) {
            tracing::warn!(source = %schema.source_name, error = %err, "registry schema rejected");
            registry_errors.push(err);
        }
    }
    if !registry_errors.is_empty() {
        return Err(BuildError::Import {
            importer: "registry",
            errors: registry_errors,
        });
    }

    if !sources.legacy.is_empty() {
        let merged = merge_regions(
            sources
                .legacy
                .iter()
                .map(|(region, loaded)| (region.as_str(), &loaded.document)),
        );
        import_legacy(&mut db, &merged).map_err(|err| BuildError::import("legacy", err))?;
    }
    if let Some(sam) = &sources.sam {
        import_sam(&mut db, &sam.document).map_err(|err| BuildError::import("sam", err))?;
    }
    if let Some(docs) = &sources.documentation {
        import_documentation(&mut db, &docs.document).map_err(|err| BuildError::import("docs", err))?;
    }
    if let Some(stateful) = &sources.stateful {
        import_stateful_resources(&mut db, &stateful.document)
            .map_err(|err| BuildError::import("stateful", err))?;
    }
    if let Some(overrides) = &sources.identifier_overrides {
        import_identifier_overrides(&mut db, &overrides.document).map_err(|errors| BuildError::Import {
            importer: "identifiers",
            errors,
        })?;
    }
    if let Some(relationships) = &sources.oob_relationships {
        import_oob_relationships(&mut db, &relationships.document).map_err(|errors| BuildError::Import {
            importer: "oob",
            errors,
        })?;
    }
    Ok(db)
}

/// Build a snapshot from the configured sources with the built-in patch
/// sets (when enabled).
pub fn build_database(config: &BuildConfig) -> Result<Snapshot, BuildError> {
    let patch_sets = if config.builtin_patches {
        builtin_patch_sets()
    } else {
        PatchSets::new()
    };
    build_database_with(config, &SourceLoader::new(patch_sets))
}

pub fn build_database_with(config: &BuildConfig, loader: &SourceLoader) -> Result<Snapshot, BuildError> {
    let sources = load_sources(config, loader)?;
    let db = import_sources(&sources)?;
    let snapshot = if config.validate {
        db.freeze()?
    } else {
        db.freeze_unchecked()
    };
    tracing::info!(
        resources = snapshot.count::<specgraph_db::Resource>(),
        services = snapshot.count::<specgraph_db::Service>(),
        type_definitions = snapshot.count::<specgraph_db::TypeDefinition>(),
        relationships = snapshot.relationships().len(),
        "built database"
    );
    Ok(snapshot)
}
