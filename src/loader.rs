//! Schema loader
//!
//! Loads form schemas from YAML or JSON files and compiles them, so a
//! malformed schema fails at load time rather than at first validation.

use anyhow::{anyhow, bail, Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::schema::{CompiledSchema, FormSchema, RefineRegistry};

const SCHEMA_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

#[derive(Debug, Clone)]
pub struct SchemaLoader {
    schema_dir: PathBuf,
    refines: RefineRegistry,
}

impl SchemaLoader {
    pub fn new(schema_dir: impl Into<PathBuf>) -> Self {
        Self {
            schema_dir: schema_dir.into(),
            refines: RefineRegistry::default(),
        }
    }

    /// Create loader from FORMKIT_SCHEMA_DIR env var or default to "schemas"
    ///
    /// Path resolution order:
    /// 1. FORMKIT_SCHEMA_DIR environment variable (explicit override)
    /// 2. Relative "schemas" path
    /// 3. CARGO_MANIFEST_DIR/schemas (tests and `cargo run`)
    pub fn from_env() -> Self {
        if let Ok(dir) = std::env::var("FORMKIT_SCHEMA_DIR") {
            return Self::new(dir);
        }
        if Path::new("schemas").is_dir() {
            return Self::new("schemas");
        }
        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            let dir = Path::new(&manifest_dir).join("schemas");
            if dir.is_dir() {
                return Self::new(dir);
            }
        }
        Self::new("schemas")
    }

    /// Host predicates for `named` refine rules
    pub fn with_refines(mut self, refines: RefineRegistry) -> Self {
        self.refines = refines;
        self
    }

    pub fn schema_dir(&self) -> &Path {
        &self.schema_dir
    }

    /// Load `<dir>/<name>.yaml` (or `.yml` / `.json`)
    pub fn load(&self, name: &str) -> Result<CompiledSchema> {
        let path = SCHEMA_EXTENSIONS
            .iter()
            .map(|ext| self.schema_dir.join(format!("{}.{}", name, ext)))
            .find(|p| p.is_file())
            .ok_or_else(|| {
                anyhow!(
                    "Schema '{}' not found in {}",
                    name,
                    self.schema_dir.display()
                )
            })?;
        self.load_file(&path)
    }

    /// Load and compile one schema file; the format follows the extension
    pub fn load_file(&self, path: &Path) -> Result<CompiledSchema> {
        info!("Loading form schema from {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let schema = if has_extension(path, "json") {
            FormSchema::from_json_str(&content)
        } else {
            FormSchema::from_yaml_str(&content)
        }
        .with_context(|| format!("Failed to parse {}", path.display()))?;

        let compiled = schema
            .compile_with(&self.refines)
            .with_context(|| format!("Invalid schema in {}", path.display()))?;

        info!(
            "Loaded schema '{}' with {} records and {} aggregates",
            compiled.name(),
            compiled.source().records.len(),
            compiled.aggregates().len()
        );
        Ok(compiled)
    }

    /// Load every schema file in the directory, keyed by schema name
    pub fn load_all(&self) -> Result<SchemaRegistry> {
        let entries = std::fs::read_dir(&self.schema_dir)
            .with_context(|| format!("Failed to read {}", self.schema_dir.display()))?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && SCHEMA_EXTENSIONS.iter().any(|ext| has_extension(&path, ext)) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut registry = SchemaRegistry::default();
        for path in paths {
            let schema = self.load_file(&path)?;
            if registry.contains(schema.name()) {
                bail!(
                    "Duplicate schema name '{}' in {}",
                    schema.name(),
                    path.display()
                );
            }
            registry.insert(schema);
        }

        info!(
            "Loaded {} schemas from {}",
            registry.len(),
            self.schema_dir.display()
        );
        Ok(registry)
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Compiled schemas by name
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, Arc<CompiledSchema>>,
}

impl SchemaRegistry {
    pub fn insert(&mut self, schema: CompiledSchema) -> Option<Arc<CompiledSchema>> {
        self.schemas
            .insert(schema.name().to_string(), Arc::new(schema))
    }

    pub fn get(&self, name: &str) -> Option<Arc<CompiledSchema>> {
        self.schemas.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.schemas.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<CompiledSchema>> + '_ {
        self.schemas.values()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CONTACT: &str = r#"
name: contact
root: contact
records:
  contact:
    fields:
      - name: email
        kind: { type: text }
        constraints:
          - { rule: email, message: "not a valid email address" }
"#;

    fn write(dir: &TempDir, file: &str, content: &str) {
        std::fs::write(dir.path().join(file), content).unwrap();
    }

    #[test]
    fn loads_by_name_with_any_extension() {
        let dir = TempDir::new().unwrap();
        write(&dir, "contact.yml", CONTACT);
        write(
            &dir,
            "ping.json",
            r#"{"name": "ping", "root": "r", "records": {"r": {}}}"#,
        );
        let loader = SchemaLoader::new(dir.path());

        assert_eq!(loader.load("contact").unwrap().name(), "contact");
        assert_eq!(loader.load("ping").unwrap().name(), "ping");
        let missing = loader.load("absent").unwrap_err();
        assert!(missing.to_string().contains("not found"));
    }

    #[test]
    fn invalid_schema_fails_with_file_context() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "broken.yaml",
            "name: broken\nroot: r\nrecords:\n  r:\n    slots:\n      - { name: items, record: ghost }\n",
        );
        let err = SchemaLoader::new(dir.path()).load("broken").unwrap_err();
        assert!(format!("{:#}", err).contains("undefined record 'ghost'"));
        assert!(err.to_string().contains("broken.yaml"));
    }

    #[test]
    fn named_refines_come_from_the_loader() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "code.yaml",
            r#"
name: code
root: r
records:
  r:
    fields:
      - name: code
        kind: { type: text }
        refine:
          - { rule: named, name: upper, message: "must be upper case" }
"#,
        );
        assert!(SchemaLoader::new(dir.path()).load("code").is_err());

        let mut refines = RefineRegistry::new();
        refines.register("upper", |value, _| {
            value.as_text().is_some_and(|t| t.chars().all(|c| c.is_ascii_uppercase()))
        });
        let loader = SchemaLoader::new(dir.path()).with_refines(refines);
        assert!(loader.load("code").is_ok());
    }

    #[test]
    fn load_all_builds_registry() {
        let dir = TempDir::new().unwrap();
        write(&dir, "contact.yaml", CONTACT);
        write(&dir, "notes.txt", "ignored");
        let registry = SchemaLoader::new(dir.path()).load_all().unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["contact"]);
        assert!(registry.get("contact").is_some());

        write(&dir, "contact-copy.json", &serde_json::to_string(
            &FormSchema::from_yaml_str(CONTACT).unwrap(),
        ).unwrap());
        let err = SchemaLoader::new(dir.path()).load_all().unwrap_err();
        assert!(err.to_string().contains("Duplicate schema name"));
    }

    #[test]
    fn bundled_schemas_load() {
        let loader = SchemaLoader::new(concat!(env!("CARGO_MANIFEST_DIR"), "/schemas"));
        let registry = loader.load_all().unwrap();
        assert!(registry.contains("user-registration"));
    }
}
