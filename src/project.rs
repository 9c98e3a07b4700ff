//! Synthetic Maven project built from dependency identifiers.

use std::fmt;
use tracing::debug;

use crate::catalog::{Catalog, RuntimeProvider, RuntimeSpec};
use crate::model::{DependencyIdentifier, DependencySet, DependencyType};
use crate::traits::InspectError;

const JITPACK_URL: &str = "https://jitpack.io";
const GITHUB_DEFAULT_VERSION: &str = "main-SNAPSHOT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MavenCoordinate {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    pub packaging: Option<String>,
    pub classifier: Option<String>,
}

impl MavenCoordinate {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: None,
            packaging: None,
            classifier: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Parses `group:artifact[:packaging[:classifier]][:version]`.
    pub fn parse(text: &str) -> Result<Self, String> {
        let parts: Vec<&str> = text.split(':').collect();
        if parts.iter().any(|p| p.trim().is_empty()) {
            return Err(format!("empty segment in '{text}'"));
        }
        let mut coordinate = match parts.as_slice() {
            [g, a] => Self::new(*g, *a),
            [g, a, v] => Self::new(*g, *a).with_version(*v),
            [g, a, p, v] => Self {
                packaging: Some(p.to_string()),
                ..Self::new(*g, *a).with_version(*v)
            },
            [g, a, p, c, v] => Self {
                packaging: Some(p.to_string()),
                classifier: Some(c.to_string()),
                ..Self::new(*g, *a).with_version(*v)
            },
            _ => return Err(format!("expected group:artifact[:packaging[:classifier]]:version, got '{text}'")),
        };
        if coordinate.packaging.as_deref() == Some("jar") && coordinate.classifier.is_none() {
            coordinate.packaging = None;
        }
        Ok(coordinate)
    }
}

impl fmt::Display for MavenCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_id, self.artifact_id)?;
        if let Some(packaging) = &self.packaging {
            write!(f, ":{packaging}")?;
        }
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        if let Some(version) = &self.version {
            write!(f, ":{version}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub id: String,
    pub url: String,
}

/// Build descriptor handed to the build tool.
///
/// `identifiers` keeps the request as given; `imports`, `dependencies` and
/// `repositories` are what ends up in the POM.
#[derive(Debug, Clone)]
pub struct Project {
    pub runtime: RuntimeSpec,
    pub camel_version: String,
    pub identifiers: Vec<DependencyIdentifier>,
    pub imports: Vec<MavenCoordinate>,
    pub dependencies: Vec<MavenCoordinate>,
    pub repositories: Vec<Repository>,
}

impl Project {
    /// Empty project importing only the runtime BOM.
    pub fn bootstrap(runtime: &RuntimeSpec) -> Self {
        Self {
            runtime: runtime.clone(),
            camel_version: String::new(),
            identifiers: Vec::new(),
            imports: vec![MavenCoordinate {
                packaging: Some("pom".to_string()),
                ..MavenCoordinate::new("org.apache.camel.k", "camel-k-runtime-bom")
                    .with_version(runtime.version.clone())
            }],
            dependencies: Vec::new(),
            repositories: Vec::new(),
        }
    }

    /// Expands `ids` into a project for the catalog's runtime.
    ///
    /// # Errors
    ///
    /// Any identifier that cannot be expanded fails the whole batch with
    /// [`InspectError::InvalidCoordinates`]; no partial project is returned.
    pub fn synthesize(ids: &DependencySet, catalog: &Catalog) -> Result<Self, InspectError> {
        let mut project = Self::bootstrap(catalog.runtime());
        project.camel_version = catalog.camel_version().to_string();
        for id in ids {
            project.add(id, catalog)?;
        }
        debug!(
            imports = project.imports.len(),
            dependencies = project.dependencies.len(),
            repositories = project.repositories.len(),
            "Synthesized project"
        );
        Ok(project)
    }

    fn add(&mut self, id: &DependencyIdentifier, catalog: &Catalog) -> Result<(), InspectError> {
        let invalid = |reason: String| InspectError::InvalidCoordinates {
            dependency: id.to_string(),
            reason,
        };

        match id.kind {
            DependencyType::Bom => {
                let parts: Vec<&str> = id.name.split('/').collect();
                let [g, a, v] = parts.as_slice() else {
                    return Err(invalid("expected bom:group/artifact/version".to_string()));
                };
                if [g, a, v].iter().any(|p| p.is_empty()) {
                    return Err(invalid("empty segment".to_string()));
                }
                push_unique(
                    &mut self.imports,
                    MavenCoordinate {
                        packaging: Some("pom".to_string()),
                        ..MavenCoordinate::new(*g, *a).with_version(*v)
                    },
                );
            }
            DependencyType::Camel => {
                let coordinate = match catalog.artifact_for_camel(&id.name) {
                    Some(artifact) => MavenCoordinate {
                        version: artifact.version.clone(),
                        ..MavenCoordinate::new(&artifact.group_id, &artifact.artifact_id)
                    },
                    None => match self.runtime.provider {
                        RuntimeProvider::Main => MavenCoordinate::new(
                            "org.apache.camel",
                            format!("camel-{}", id.name),
                        ),
                        RuntimeProvider::Quarkus => MavenCoordinate::new(
                            "org.apache.camel.quarkus",
                            format!("camel-quarkus-{}", id.name),
                        ),
                    },
                };
                push_unique(&mut self.dependencies, coordinate);
            }
            DependencyType::CamelK => push_unique(
                &mut self.dependencies,
                MavenCoordinate::new("org.apache.camel.k", format!("camel-k-{}", id.name)),
            ),
            DependencyType::CamelQuarkus => push_unique(
                &mut self.dependencies,
                MavenCoordinate::new(
                    "org.apache.camel.quarkus",
                    format!("camel-quarkus-{}", id.name),
                ),
            ),
            DependencyType::Mvn => {
                let coordinate = MavenCoordinate::parse(&id.name).map_err(invalid)?;
                push_unique(&mut self.dependencies, coordinate);
            }
            DependencyType::Github => {
                let parts: Vec<&str> = id.name.split('/').collect();
                let (owner, repo, version) = match parts.as_slice() {
                    [owner, repo] => (*owner, *repo, GITHUB_DEFAULT_VERSION),
                    [owner, repo, version] => (*owner, *repo, *version),
                    _ => return Err(invalid("expected github:owner/repo[/version]".to_string())),
                };
                if owner.is_empty() || repo.is_empty() || version.is_empty() {
                    return Err(invalid("empty segment".to_string()));
                }
                push_unique(
                    &mut self.dependencies,
                    MavenCoordinate::new(format!("com.github.{owner}"), repo).with_version(version),
                );
                let jitpack = Repository {
                    id: "jitpack.io".to_string(),
                    url: JITPACK_URL.to_string(),
                };
                if !self.repositories.contains(&jitpack) {
                    self.repositories.push(jitpack);
                }
            }
        }

        self.identifiers.push(id.clone());
        Ok(())
    }

    /// Renders the project as a `pom.xml` document.
    pub fn to_pom(&self) -> String {
        let mut pom = String::new();
        pom.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        pom.push_str(
            "<project xmlns=\"http://maven.apache.org/POM/4.0.0\" \
             xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
             xsi:schemaLocation=\"http://maven.apache.org/POM/4.0.0 \
             https://maven.apache.org/xsd/maven-4.0.0.xsd\">\n",
        );
        element(&mut pom, 1, "modelVersion", "4.0.0");
        element(&mut pom, 1, "groupId", "org.apache.camel.k.integration");
        element(&mut pom, 1, "artifactId", "camel-k-integration");
        element(&mut pom, 1, "version", &self.runtime.version);
        element(&mut pom, 1, "packaging", "jar");

        open(&mut pom, 1, "properties");
        element(&mut pom, 2, "project.build.sourceEncoding", "UTF-8");
        element(&mut pom, 2, "camel-k-runtime.version", &self.runtime.version);
        element(&mut pom, 2, "camel-k-runtime.provider", &self.runtime.provider.to_string());
        if !self.camel_version.is_empty() {
            element(&mut pom, 2, "camel.version", &self.camel_version);
        }
        close(&mut pom, 1, "properties");

        open(&mut pom, 1, "dependencyManagement");
        open(&mut pom, 2, "dependencies");
        for import in &self.imports {
            dependency(&mut pom, 3, import, Some("import"));
        }
        close(&mut pom, 2, "dependencies");
        close(&mut pom, 1, "dependencyManagement");

        open(&mut pom, 1, "dependencies");
        for dep in &self.dependencies {
            dependency(&mut pom, 2, dep, None);
        }
        close(&mut pom, 1, "dependencies");

        if !self.repositories.is_empty() {
            open(&mut pom, 1, "repositories");
            for repository in &self.repositories {
                open(&mut pom, 2, "repository");
                element(&mut pom, 3, "id", &repository.id);
                element(&mut pom, 3, "url", &repository.url);
                close(&mut pom, 2, "repository");
            }
            close(&mut pom, 1, "repositories");
        }

        pom.push_str("</project>\n");
        pom
    }
}

fn push_unique(list: &mut Vec<MavenCoordinate>, coordinate: MavenCoordinate) {
    if !list.contains(&coordinate) {
        list.push(coordinate);
    }
}

fn indent(out: &mut String, depth: usize) {
    out.extend(std::iter::repeat("  ").take(depth));
}

fn open(out: &mut String, depth: usize, name: &str) {
    indent(out, depth);
    out.push_str(&format!("<{name}>\n"));
}

fn close(out: &mut String, depth: usize, name: &str) {
    indent(out, depth);
    out.push_str(&format!("</{name}>\n"));
}

fn element(out: &mut String, depth: usize, name: &str, value: &str) {
    indent(out, depth);
    out.push_str(&format!("<{name}>{}</{name}>\n", escape_xml(value)));
}

fn dependency(out: &mut String, depth: usize, coordinate: &MavenCoordinate, scope: Option<&str>) {
    open(out, depth, "dependency");
    element(out, depth + 1, "groupId", &coordinate.group_id);
    element(out, depth + 1, "artifactId", &coordinate.artifact_id);
    if let Some(version) = &coordinate.version {
        element(out, depth + 1, "version", version);
    }
    if let Some(packaging) = &coordinate.packaging {
        element(out, depth + 1, "type", packaging);
    }
    if let Some(classifier) = &coordinate.classifier {
        element(out, depth + 1, "classifier", classifier);
    }
    if let Some(scope) = scope {
        element(out, depth + 1, "scope", scope);
    }
    close(out, depth, "dependency");
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
