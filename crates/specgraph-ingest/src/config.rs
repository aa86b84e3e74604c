//! Where the build finds its sources.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One regional copy of the legacy specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSource {
    pub region: String,
    pub path: PathBuf,
}

/// Build configuration. Every source except the registry is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Directory of registry schemas, one `*.json` per resource type
    pub registry_dir: PathBuf,
    /// Legacy specifications in merge order; later regions win
    pub legacy_specs: Vec<RegionSource>,
    pub sam_spec: Option<PathBuf>,
    pub documentation: Option<PathBuf>,
    pub stateful_resources: Option<PathBuf>,
    pub identifier_overrides: Option<PathBuf>,
    pub oob_relationships: Option<PathBuf>,
    /// Apply the built-in patch sets while loading
    pub builtin_patches: bool,
    /// Refuse to freeze a database that fails validation
    pub validate: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            registry_dir: PathBuf::from("./sources/registry"),
            legacy_specs: vec![
                RegionSource {
                    region: "us-east-1".into(),
                    path: PathBuf::from("./sources/legacy/us-east-1.json"),
                },
                RegionSource {
                    region: "us-west-2".into(),
                    path: PathBuf::from("./sources/legacy/us-west-2.json"),
                },
            ],
            sam_spec: None,
            documentation: None,
            stateful_resources: None,
            identifier_overrides: None,
            oob_relationships: None,
            builtin_patches: true,
            validate: true,
        }
    }
}

impl BuildConfig {
    /// Read a JSON configuration file. Relative paths inside it are taken
    /// relative to the file's directory.
    pub fn from_path(path: &Path) -> Result<Self, crate::BuildError> {
        let text = std::fs::read_to_string(path).map_err(|source| crate::BuildError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|err| crate::BuildError::Config {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(config.relative_to(base))
    }

    /// Resolve every relative path against `base`.
    pub fn relative_to(mut self, base: &Path) -> Self {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.registry_dir);
        for legacy in &mut self.legacy_specs {
            resolve(&mut legacy.path);
        }
        for optional in [
            &mut self.sam_spec,
            &mut self.documentation,
            &mut self.stateful_resources,
            &mut self.identifier_overrides,
            &mut self.oob_relationships,
        ] {
            if let Some(p) = optional {
                resolve(p);
            }
        }
        self
    }

    /// A configuration with only a registry directory.
    pub fn registry_only(registry_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry_dir: registry_dir.into(),
            legacy_specs: Vec::new(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: BuildConfig = serde_json::from_value(json!({"validate": false})).unwrap();
        assert!(!config.validate);
        assert!(config.builtin_patches);
        assert_eq!(config.legacy_specs.len(), 2);
        assert_eq!(config.legacy_specs[1].region, "us-west-2");
    }

    #[test]
    fn relative_paths_resolve_against_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("build.json");
        std::fs::write(
            &path,
            json!({
                "registry_dir": "registry",
                "legacy_specs": [{"region": "us-east-1", "path": "/abs/east.json"}],
                "documentation": "docs.json"
            })
            .to_string(),
        )
        .unwrap();
        let config = BuildConfig::from_path(&path).unwrap();
        assert_eq!(config.registry_dir, dir.path().join("registry"));
        assert_eq!(config.legacy_specs[0].path, PathBuf::from("/abs/east.json"));
        assert_eq!(config.documentation, Some(dir.path().join("docs.json")));
        assert_eq!(config.sam_spec, None);
    }
}
