//! Source resources and the manifest parsing seam.
//!
//! Resources arrive untyped: kind, namespace, name and metadata plus the `spec`
//! payload as JSON. Typed transforms decode the payload into their own input type.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::errors::{Error, Result};
use crate::xds::dispatch::key::ResourceKey;

/// Namespace assigned to manifests that do not name one
pub const DEFAULT_NAMESPACE: &str = "default";

/// A declarative resource with an untyped payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResource {
    pub api_version: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub spec: Value,
}

impl RawResource {
    pub fn new(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        spec: Value,
    ) -> Self {
        Self {
            api_version: String::new(),
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            spec,
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(&self.kind, &self.namespace, &self.name)
    }

    /// Decode the payload into a transform's input type
    pub fn typed<T: DeserializeOwned>(&self) -> std::result::Result<TypedResource<T>, serde_json::Error> {
        let spec = serde_json::from_value(self.spec.clone())?;
        Ok(TypedResource {
            key: self.key(),
            labels: self.labels.clone(),
            annotations: self.annotations.clone(),
            spec,
        })
    }
}

/// A resource whose payload has been decoded into `T`
#[derive(Debug, Clone, PartialEq)]
pub struct TypedResource<T> {
    pub key: ResourceKey,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub spec: T,
}

/// Turns a serialized manifest blob into resources, in document order
pub trait ManifestParser {
    fn parse(&self, manifests: &str) -> Result<Vec<RawResource>>;
}

/// Parses multi-document Kubernetes-style YAML
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlManifestParser;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    #[serde(default)]
    api_version: String,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    metadata: ManifestMetadata,
    #[serde(default)]
    spec: Value,
}

#[derive(Debug, Default, Deserialize)]
struct ManifestMetadata {
    #[serde(default)]
    name: String,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    labels: BTreeMap<String, String>,
    #[serde(default)]
    annotations: BTreeMap<String, String>,
}

impl ManifestParser for YamlManifestParser {
    fn parse(&self, manifests: &str) -> Result<Vec<RawResource>> {
        let mut resources = Vec::new();

        for (index, document) in serde_yaml::Deserializer::from_str(manifests).enumerate() {
            let value = serde_yaml::Value::deserialize(document)?;
            if value.is_null() {
                continue;
            }

            let manifest: Manifest = serde_yaml::from_value(value)?;
            if manifest.kind.is_empty() {
                return Err(Error::manifest(format!("document {} has no kind", index)));
            }
            if manifest.metadata.name.is_empty() {
                return Err(Error::manifest(format!(
                    "document {} ({}) has no metadata.name",
                    index, manifest.kind
                )));
            }

            resources.push(RawResource {
                api_version: manifest.api_version,
                kind: manifest.kind,
                namespace: manifest
                    .metadata
                    .namespace
                    .filter(|ns| !ns.is_empty())
                    .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
                name: manifest.metadata.name,
                labels: manifest.metadata.labels,
                annotations: manifest.metadata.annotations,
                spec: manifest.spec,
            });
        }

        debug!(resources = resources.len(), "Parsed manifests");
        Ok(resources)
    }
}
