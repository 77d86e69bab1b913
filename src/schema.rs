//! Configuration schema tables, loaded once before any unit is processed.
//!
//! Two prerequisite artifacts live under the schema root: the marker
//! annotation (its element defaults become `option_defaults`) and the
//! configuration instance (its declared field order becomes the merge
//! order and the constructor descriptor). Both are build outputs of the
//! runtime side; their absence means the build is incomplete and the run
//! cannot continue.

use crate::codec;
use crate::model::{AnnotationUnit, AnnotationValue, ClassUnit};
use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

/// Descriptor of the marker annotation identifying methods to weave.
pub const MARKER_DESC: &str = "Latomic/Atomic;";
pub const MARKER_INTERNAL: &str = "atomic/Atomic";
/// Internal name of the configuration-instance class.
pub const INSTANCE_INTERNAL: &str = "atomic/AtomicInstance";
/// The abstract execution-context type stored in each context field.
pub const CONTEXT_INTERNAL: &str = "atomic/AtomicContext";
pub const CONTEXT_DESC: &str = "Latomic/AtomicContext;";
/// Single execution entry point on the context.
pub const CONTEXT_METHOD: &str = "doTransactionally";
pub const CONTEXT_METHOD_DESC: &str = "(Ljava/util/concurrent/Callable;)Ljava/lang/Object;";
/// Single-method callable capability implemented by capture classes.
pub const CALLABLE_INTERNAL: &str = "java/util/concurrent/Callable";
/// Context-acquisition entry point on the pluggable factory type.
pub const FACTORY_METHOD: &str = "newContext";
/// Option naming the factory type, present in every option-defaults table.
pub const CONTEXT_FACTORY_OPTION: &str = "contextFactory";

#[derive(Debug, Clone, Serialize)]
pub struct ConfigField {
    pub name: String,
    pub desc: String,
}

#[derive(Debug, Serialize)]
pub struct SchemaTables {
    option_defaults: HashMap<String, AnnotationValue>,
    config_fields: Vec<ConfigField>,
    config_ctor_desc: String,
}

impl SchemaTables {
    pub fn load(schema_root: &Path) -> Result<SchemaTables> {
        let marker = load_prerequisite(schema_root, MARKER_INTERNAL)?;
        let instance = load_prerequisite(schema_root, INSTANCE_INTERNAL)?;

        let mut option_defaults = HashMap::new();
        for element in &marker.methods {
            if let Some(default) = &element.annotation_default {
                option_defaults.insert(element.name.clone(), default.clone());
            }
        }

        let config_fields = instance
            .fields
            .iter()
            .map(|f| ConfigField {
                name: f.name.clone(),
                desc: f.desc.clone(),
            })
            .collect();

        Self::from_parts(option_defaults, config_fields)
    }

    pub fn from_parts(
        option_defaults: HashMap<String, AnnotationValue>,
        config_fields: Vec<ConfigField>,
    ) -> Result<SchemaTables> {
        if !option_defaults.contains_key(CONTEXT_FACTORY_OPTION) {
            bail!(
                "marker annotation {MARKER_INTERNAL} declares no '{CONTEXT_FACTORY_OPTION}' default"
            );
        }

        let mut config_ctor_desc = String::from("(");
        for field in &config_fields {
            config_ctor_desc.push_str(&field.desc);
        }
        config_ctor_desc.push_str(")V");

        Ok(SchemaTables {
            option_defaults,
            config_fields,
            config_ctor_desc,
        })
    }

    pub fn config_fields(&self) -> &[ConfigField] {
        &self.config_fields
    }

    pub fn config_ctor_desc(&self) -> &str {
        &self.config_ctor_desc
    }

    pub fn option_defaults(&self) -> &HashMap<String, AnnotationValue> {
        &self.option_defaults
    }

    /// Declared defaults overlaid with the explicit pairs on one marker
    /// instance. Options absent from the marker keep their defaults.
    pub fn merged_options(&self, marker: &AnnotationUnit) -> HashMap<String, AnnotationValue> {
        let mut merged = self.option_defaults.clone();
        for (name, value) in &marker.values {
            merged.insert(name.clone(), value.clone());
        }
        merged
    }
}

fn load_prerequisite(schema_root: &Path, internal_name: &str) -> Result<ClassUnit> {
    let path = schema_root.join(format!("{internal_name}.{}", codec::ARTIFACT_EXTENSION));
    let bytes = std::fs::read(&path).with_context(|| {
        format!(
            "prerequisite artifact {internal_name} missing at {} (has the runtime side been generated?)",
            path.display()
        )
    })?;
    codec::decode(&bytes)
        .with_context(|| format!("prerequisite artifact {} is unreadable", path.display()))
}
