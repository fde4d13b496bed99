use crate::error::{AtlasError, Result};
use serde::Deserialize;

const REGISTRY_JSON: &str = include_str!("../../models/registry.json");

#[derive(Debug, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    pub manifest: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Models known to the binary, compiled in from `models/registry.json`.
#[derive(Debug, Deserialize)]
pub struct Registry {
    #[serde(rename = "default")]
    pub default_model: String,
    pub models: Vec<RegistryEntry>,
}

impl Registry {
    pub fn embedded() -> Result<Registry> {
        let reg: Registry = serde_json::from_str(REGISTRY_JSON)?;
        if reg.find(&reg.default_model).is_none() {
            return Err(AtlasError::Registry(format!(
                "default model `{}` has no entry",
                reg.default_model
            )));
        }
        Ok(reg)
    }

    pub fn find(&self, name: &str) -> Option<&RegistryEntry> {
        self.models.iter().find(|m| m.name == name)
    }

    /// Manifest URL for `name`; an empty name means the default model.
    pub fn manifest_url(&self, name: &str) -> Result<&str> {
        let target = if name.is_empty() {
            self.default_model.as_str()
        } else {
            name
        };
        self.find(target)
            .map(|m| m.manifest.as_str())
            .ok_or_else(|| AtlasError::Registry(format!("Model `{target}` not found in registry")))
    }
}

pub fn load_registry() -> Result<Registry> {
    Registry::embedded()
}

pub fn resolve_manifest_url(model_name: &str) -> Result<String> {
    Ok(load_registry()?.manifest_url(model_name)?.to_string())
}
