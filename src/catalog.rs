//! Runtime catalog: what a source may reference and which artifact provides it.
//!
//! A [`Catalog`] is loaded from the YAML document the runtime's Maven plugin
//! generates (`CamelCatalog` resource). The [`CatalogProvider`] builds it at
//! most once and hands out shared read-only references afterwards.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};

use crate::executor::BuildInvoker;
use crate::model::DependencyIdentifier;
use crate::project::Project;
use crate::traits::{BuildGoal, CatalogBuilder, InspectError};

/// Runtime flavour the catalog is generated for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeProvider {
    #[default]
    Main,
    Quarkus,
}

impl fmt::Display for RuntimeProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeProvider::Main => f.write_str("main"),
            RuntimeProvider::Quarkus => f.write_str("quarkus"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuntimeSpec {
    pub provider: RuntimeProvider,
    pub version: String,
}

/// Catalog entry for one Maven artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogArtifact {
    pub group_id: String,

    /// Filled from the map key when the document omits it
    #[serde(default)]
    pub artifact_id: String,

    #[serde(default)]
    pub version: Option<String>,

    /// Endpoint URI schemes served by this artifact (`timer`, `log`, ...)
    #[serde(default)]
    pub schemes: Vec<CatalogScheme>,

    #[serde(default)]
    pub languages: Vec<String>,

    #[serde(default)]
    pub dataformats: Vec<String>,

    /// Fully qualified Java types that imply this artifact
    #[serde(default)]
    pub java_types: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogScheme {
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    spec: CatalogSpec,
}

#[derive(Debug, Deserialize)]
struct CatalogSpec {
    runtime: CatalogRuntime,
    #[serde(default)]
    artifacts: BTreeMap<String, CatalogArtifact>,
}

#[derive(Debug, Deserialize)]
struct CatalogRuntime {
    version: String,
    provider: RuntimeProvider,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

/// Immutable, indexed runtime catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    runtime: RuntimeSpec,
    camel_version: String,
    artifacts: BTreeMap<String, CatalogArtifact>,
    schemes: HashMap<String, String>,
    languages: HashMap<String, String>,
    dataformats: BTreeMap<String, String>,
    java_types: HashMap<String, String>,
}

impl Catalog {
    pub fn new(
        runtime: RuntimeSpec,
        camel_version: impl Into<String>,
        artifacts: BTreeMap<String, CatalogArtifact>,
    ) -> Self {
        let mut artifacts = artifacts;
        let mut schemes = HashMap::new();
        let mut languages = HashMap::new();
        let mut dataformats = BTreeMap::new();
        let mut java_types = HashMap::new();

        for (key, artifact) in artifacts.iter_mut() {
            if artifact.artifact_id.is_empty() {
                artifact.artifact_id = key.clone();
            }
            for scheme in &artifact.schemes {
                schemes.insert(scheme.id.clone(), key.clone());
            }
            for language in &artifact.languages {
                languages.insert(language.clone(), key.clone());
            }
            for dataformat in &artifact.dataformats {
                dataformats.insert(dataformat.clone(), key.clone());
            }
            for java_type in &artifact.java_types {
                java_types.insert(java_type.clone(), key.clone());
            }
        }

        Self {
            runtime,
            camel_version: camel_version.into(),
            artifacts,
            schemes,
            languages,
            dataformats,
            java_types,
        }
    }

    /// Parses a `CamelCatalog` YAML document.
    pub fn from_yaml(text: &str) -> Result<Self, InspectError> {
        let doc: CatalogDocument = serde_yaml::from_str(text)
            .map_err(|e| InspectError::CatalogUnavailable(format!("malformed catalog: {e}")))?;
        let camel_version = doc
            .spec
            .runtime
            .metadata
            .get("camel.version")
            .cloned()
            .unwrap_or_default();
        Ok(Self::new(
            RuntimeSpec {
                provider: doc.spec.runtime.provider,
                version: doc.spec.runtime.version,
            },
            camel_version,
            doc.spec.artifacts,
        ))
    }

    pub fn runtime(&self) -> &RuntimeSpec {
        &self.runtime
    }

    pub fn camel_version(&self) -> &str {
        &self.camel_version
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &CatalogArtifact> {
        self.artifacts.values()
    }

    pub fn artifact_for_scheme(&self, scheme: &str) -> Option<&CatalogArtifact> {
        self.schemes.get(scheme).and_then(|k| self.artifacts.get(k))
    }

    pub fn artifact_for_language(&self, language: &str) -> Option<&CatalogArtifact> {
        self.languages.get(language).and_then(|k| self.artifacts.get(k))
    }

    pub fn artifact_for_java_type(&self, java_type: &str) -> Option<&CatalogArtifact> {
        self.java_types.get(java_type).and_then(|k| self.artifacts.get(k))
    }

    /// Looks up a data format by id, accepting DSL spellings.
    ///
    /// `jsonJackson` and `json-jackson` both match `json-jackson`; a bare
    /// family name such as `json` picks the first `json-*` format.
    pub fn artifact_for_dataformat(&self, name: &str) -> Option<&CatalogArtifact> {
        let wanted = normalize_id(name);
        let key = self
            .dataformats
            .iter()
            .find(|(id, _)| normalize_id(id) == wanted)
            .or_else(|| {
                self.dataformats
                    .iter()
                    .find(|(id, _)| id.split('-').next().map(normalize_id) == Some(wanted.clone()))
            })
            .map(|(_, key)| key)?;
        self.artifacts.get(key)
    }

    /// Catalog artifact behind a `camel:<name>` identifier, if any.
    pub fn artifact_for_camel(&self, name: &str) -> Option<&CatalogArtifact> {
        let quarkus = format!("camel-quarkus-{name}");
        let main = format!("camel-{name}");
        match self.runtime.provider {
            RuntimeProvider::Quarkus => self
                .artifacts
                .get(&quarkus)
                .or_else(|| self.artifacts.get(&main)),
            RuntimeProvider::Main => self.artifacts.get(&main),
        }
    }

    /// Identifier a user would write for a catalog artifact.
    pub fn dependency_of(artifact: &CatalogArtifact) -> DependencyIdentifier {
        DependencyIdentifier::from_artifact(&artifact.group_id, &artifact.artifact_id)
    }
}

fn normalize_id(id: &str) -> String {
    id.chars()
        .filter(|c| *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Lazily built, shared catalog for one runtime.
///
/// Callers obtain the provider once and pass it to whatever needs a
/// catalog. The first [`get`](CatalogProvider::get) builds; concurrent
/// callers wait for that build instead of starting their own. A failed build
/// leaves the provider empty.
pub struct CatalogProvider {
    runtime: RuntimeSpec,
    builder: Arc<dyn CatalogBuilder>,
    cell: OnceCell<Arc<Catalog>>,
}

impl CatalogProvider {
    pub fn new(runtime: RuntimeSpec, builder: Arc<dyn CatalogBuilder>) -> Self {
        Self {
            runtime,
            builder,
            cell: OnceCell::new(),
        }
    }

    /// Provider already holding `catalog`; its builder is never called.
    pub fn with_catalog(catalog: Catalog, builder: Arc<dyn CatalogBuilder>) -> Self {
        Self {
            runtime: catalog.runtime().clone(),
            builder,
            cell: OnceCell::new_with(Some(Arc::new(catalog))),
        }
    }

    pub fn runtime(&self) -> &RuntimeSpec {
        &self.runtime
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    #[instrument(skip(self), fields(provider = %self.runtime.provider, version = %self.runtime.version))]
    pub async fn get(&self) -> Result<Arc<Catalog>, InspectError> {
        self.cell
            .get_or_try_init(|| async {
                info!("Building runtime catalog");
                let catalog = self.builder.build(&self.runtime).await.map_err(|e| match e {
                    InspectError::CatalogUnavailable(_) => e,
                    other => InspectError::CatalogUnavailable(other.to_string()),
                })?;
                info!(artifacts = catalog.artifacts.len(), "Runtime catalog ready");
                Ok(Arc::new(catalog))
            })
            .await
            .cloned()
    }
}

/// Loads a catalog document from disk.
pub struct FileCatalogBuilder {
    path: PathBuf,
}

impl FileCatalogBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogBuilder for FileCatalogBuilder {
    async fn build(&self, runtime: &RuntimeSpec) -> Result<Catalog, InspectError> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            InspectError::CatalogUnavailable(format!("{}: {e}", self.path.display()))
        })?;
        let catalog = Catalog::from_yaml(&text)?;
        if catalog.runtime().provider != runtime.provider {
            return Err(InspectError::CatalogUnavailable(format!(
                "{} is a {} catalog, {} requested",
                self.path.display(),
                catalog.runtime().provider,
                runtime.provider
            )));
        }
        if catalog.runtime().version != runtime.version {
            warn!(
                catalog = %catalog.runtime().version,
                requested = %runtime.version,
                "Catalog runtime version differs from requested version"
            );
        }
        Ok(catalog)
    }
}

/// Generates the catalog by running the build tool on an empty project.
pub struct ResolvingCatalogBuilder {
    invoker: Arc<BuildInvoker>,
}

impl ResolvingCatalogBuilder {
    pub fn new(invoker: Arc<BuildInvoker>) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl CatalogBuilder for ResolvingCatalogBuilder {
    async fn build(&self, runtime: &RuntimeSpec) -> Result<Catalog, InspectError> {
        let project = Project::bootstrap(runtime);
        let output = self.invoker.invoke(&project, BuildGoal::Catalog).await?;
        Catalog::from_yaml(&output.text)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use std::sync::atomic::Ordering;

    fn main_runtime() -> RuntimeSpec {
        RuntimeSpec {
            provider: RuntimeProvider::Main,
            version: "1.15.0".to_string(),
        }
    }

    #[test]
    fn test_catalog_from_yaml() {
        let catalog = catalog();
        assert_eq!(catalog.runtime(), &main_runtime());
        assert_eq!(catalog.camel_version(), "3.18.1");

        let timer = catalog.artifact_for_scheme("timer").unwrap();
        assert_eq!(timer.artifact_id, "camel-timer");
        assert_eq!(timer.group_id, "org.apache.camel");
        assert!(catalog.artifact_for_scheme("nope").is_none());
    }

    #[test]
    fn test_catalog_lookups() {
        let catalog = catalog();
        assert_eq!(
            catalog.artifact_for_language("jsonpath").unwrap().artifact_id,
            "camel-jsonpath"
        );
        assert_eq!(
            catalog.artifact_for_dataformat("json").unwrap().artifact_id,
            "camel-jackson"
        );
        assert_eq!(
            catalog.artifact_for_dataformat("jsonJackson").unwrap().artifact_id,
            "camel-jackson"
        );
        assert_eq!(
            catalog
                .artifact_for_java_type("org.apache.camel.component.kafka.KafkaConstants")
                .unwrap()
                .artifact_id,
            "camel-kafka"
        );
        assert_eq!(catalog.artifact_for_camel("log").unwrap().artifact_id, "camel-log");
    }

    #[test]
    fn test_malformed_catalog_is_unavailable() {
        let err = Catalog::from_yaml("spec: [").unwrap_err();
        assert!(matches!(err, InspectError::CatalogUnavailable(_)));
    }

    #[tokio::test]
    async fn test_provider_builds_once_under_concurrency() {
        let builder = Arc::new(CountingBuilder::new(false));
        let provider = Arc::new(CatalogProvider::new(main_runtime(), builder.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let provider = provider.clone();
                tokio::spawn(async move { provider.get().await.map(|c| Arc::as_ptr(&c) as usize) })
            })
            .collect();

        let mut pointers = Vec::new();
        for handle in handles {
            pointers.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(builder.calls.load(Ordering::SeqCst), 1);
        assert!(pointers.windows(2).all(|w| w[0] == w[1]));
        assert!(provider.is_initialized());
    }

    #[tokio::test]
    async fn test_provider_failure_is_catalog_unavailable_and_retried() {
        let builder = Arc::new(CountingBuilder::new(true));
        let provider = CatalogProvider::new(main_runtime(), builder.clone());

        let err = provider.get().await.unwrap_err();
        assert!(matches!(err, InspectError::CatalogUnavailable(ref m) if m.contains("no network")));
        assert!(!provider.is_initialized());

        assert!(provider.get().await.is_err());
        assert_eq!(builder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_provider_with_catalog_skips_builder() {
        let builder = Arc::new(CountingBuilder::new(true));
        let provider = CatalogProvider::with_catalog(catalog(), builder.clone());

        assert!(provider.get().await.is_ok());
        assert_eq!(builder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_file_builder_checks_provider() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.yaml");
        std::fs::write(&path, CATALOG_YAML).unwrap();

        let builder = FileCatalogBuilder::new(&path);
        assert!(builder.build(&main_runtime()).await.is_ok());

        let quarkus = RuntimeSpec {
            provider: RuntimeProvider::Quarkus,
            version: "1.15.0".to_string(),
        };
        assert!(matches!(
            builder.build(&quarkus).await.unwrap_err(),
            InspectError::CatalogUnavailable(_)
        ));

        let missing = FileCatalogBuilder::new(dir.path().join("missing.yaml"));
        assert!(missing.build(&main_runtime()).await.is_err());
    }
}
