//! Source loading: read, patch, then parse into a typed source document.

use serde::de::DeserializeOwned;
use serde_json::Value;
use specgraph_patch::{PatchError, PatchLog, PatchSets};
use std::fmt;
use std::path::Path;

/// The upstream feeds, one patch-set family each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Registry,
    Legacy,
    Sam,
    Documentation,
    Stateful,
    IdentifierOverrides,
    OobRelationships,
}

impl SourceKind {
    /// Family name patch sets are registered under.
    pub fn family(self) -> &'static str {
        match self {
            SourceKind::Registry => "registry",
            SourceKind::Legacy => "legacy",
            SourceKind::Sam => "sam",
            SourceKind::Documentation => "docs",
            SourceKind::Stateful => "stateful",
            SourceKind::IdentifierOverrides => "identifiers",
            SourceKind::OobRelationships => "oob",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.family())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadFailureKind {
    #[error("cannot read source: {0}")]
    Io(#[from] std::io::Error),
    #[error("not valid JSON: {0}")]
    Syntax(serde_json::Error),
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error("does not match the expected shape: {0}")]
    Shape(serde_json::Error),
}

/// A source document could not be patched or parsed.
#[derive(Debug, thiserror::Error)]
#[error("failed to load {kind} source {source_name}: {cause}{}", render_chain(.reason_chain))]
pub struct LoadFailure {
    pub kind: SourceKind,
    pub source_name: String,
    /// Reasons of the patches applied before the failure.
    pub reason_chain: Vec<String>,
    #[source]
    pub cause: LoadFailureKind,
}

fn render_chain(chain: &[String]) -> String {
    if chain.is_empty() {
        String::new()
    } else {
        format!(" (after patches: {})", chain.join("; "))
    }
}

/// A parsed source document and the audit trail of how it was patched.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub source_name: String,
    pub document: T,
    pub patches: PatchLog,
}

/// Applies the configured patch sets to raw documents before parsing them.
#[derive(Debug, Default)]
pub struct SourceLoader {
    patch_sets: PatchSets,
}

impl SourceLoader {
    pub fn new(patch_sets: PatchSets) -> Self {
        Self { patch_sets }
    }

    pub fn patch_sets(&self) -> &PatchSets {
        &self.patch_sets
    }

    pub fn load_value<T: DeserializeOwned>(
        &self,
        kind: SourceKind,
        source_name: impl Into<String>,
        mut raw: Value,
    ) -> Result<Loaded<T>, LoadFailure> {
        let source_name = source_name.into();
        let fail = |reason_chain: Vec<String>, cause: LoadFailureKind| LoadFailure {
            kind,
            source_name: source_name.clone(),
            reason_chain,
            cause,
        };

        let patches = match self.patch_sets.apply(kind.family(), &mut raw) {
            Ok(log) => log,
            Err(err) => {
                let chain = err.reason_chain().to_vec();
                return Err(fail(chain, LoadFailureKind::Patch(err)));
            }
        };
        let document = serde_json::from_value(raw)
            .map_err(|err| fail(patches.reasons(), LoadFailureKind::Shape(err)))?;

        tracing::debug!(
            kind = %kind,
            source = %source_name,
            patches = patches.len(),
            "loaded source"
        );
        Ok(Loaded {
            source_name,
            document,
            patches,
        })
    }

    pub fn load_str<T: DeserializeOwned>(
        &self,
        kind: SourceKind,
        source_name: impl Into<String>,
        text: &str,
    ) -> Result<Loaded<T>, LoadFailure> {
        let source_name = source_name.into();
        let raw: Value = serde_json::from_str(text).map_err(|err| LoadFailure {
            kind,
            source_name: source_name.clone(),
            reason_chain: Vec::new(),
            cause: LoadFailureKind::Syntax(err),
        })?;
        self.load_value(kind, source_name, raw)
    }

    pub fn load_file<T: DeserializeOwned>(
        &self,
        kind: SourceKind,
        path: &Path,
    ) -> Result<Loaded<T>, LoadFailure> {
        let source_name = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|err| LoadFailure {
            kind,
            source_name: source_name.clone(),
            reason_chain: Vec::new(),
            cause: LoadFailureKind::Io(err),
        })?;
        self.load_str(kind, source_name, &text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::IdentifierOverrides;
    use serde_json::json;
    use specgraph_patch::{at_pointer, JsonPointer, Lens, PatchSet};

    #[test]
    fn patches_run_before_parsing() {
        let sets = PatchSets::new().with(
            "identifiers",
            PatchSet::new("fix-identifiers").with(
                "wrap-scalar",
                at_pointer(JsonPointer::root(), "identifier lists must be arrays", |v| {
                    if let Some(map) = v.as_object_mut() {
                        for value in map.values_mut() {
                            if value.is_string() {
                                *value = json!([value.clone()]);
                            }
                        }
                    }
                }),
            ),
        );
        let loader = SourceLoader::new(sets);
        let loaded: Loaded<IdentifierOverrides> = loader
            .load_value(
                SourceKind::IdentifierOverrides,
                "overrides.json",
                json!({"AWS::S3::Bucket": "BucketName"}),
            )
            .unwrap();
        assert_eq!(loaded.document.0["AWS::S3::Bucket"], vec!["BucketName".to_string()]);
        assert_eq!(loaded.patches.reasons(), vec!["identifier lists must be arrays".to_string()]);
    }

    #[test]
    fn a_failing_patcher_is_a_load_failure() {
        let sets = PatchSets::new().with(
            "stateful",
            PatchSet::new("strict").with("reject", |lens: &mut Lens<'_>| -> Result<(), PatchError> {
                if lens.pointer().is_root() {
                    return Err(PatchError::rule("refusing"));
                }
                Ok(())
            }),
        );
        let err = SourceLoader::new(sets)
            .load_value::<Value>(SourceKind::Stateful, "stateful.json", json!({}))
            .unwrap_err();
        assert_eq!(err.kind, SourceKind::Stateful);
        assert_eq!(err.source_name, "stateful.json");
        assert!(matches!(err.cause, LoadFailureKind::Patch(_)));
    }

    #[test]
    fn shape_errors_name_the_source() {
        let err = SourceLoader::default()
            .load_str::<IdentifierOverrides>(SourceKind::IdentifierOverrides, "ids.json", r#"{"A": 1}"#)
            .unwrap_err();
        assert!(matches!(err.cause, LoadFailureKind::Shape(_)));
        assert!(err.to_string().contains("ids.json"));
    }
}
