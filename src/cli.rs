//! `inspect` command line.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::catalog::{RuntimeProvider, RuntimeSpec};
use crate::config::{InspectorConfig, DEFAULT_DEPENDENCIES_DIRECTORY, DEFAULT_RUNTIME_VERSION};
use crate::harvest::{InspectPipeline, InspectRequest};
use crate::model::{DependencyIdentifier, SourceDocument};
use crate::output::{self, OutputFormat};
use crate::traits::InspectError;

/// Output dependencies for a list of integration files.
///
/// By default only the top level dependencies are printed. With
/// --all-dependencies the transitive dependencies are computed with Maven and
/// copied into the directory given by --dependencies-directory.
#[derive(Parser, Debug)]
#[command(name = "inspect", version, about = "Generate dependencies list given integration files.")]
pub struct Cli {
    /// Integration files to inspect
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Compute transitive dependencies and copy them to the dependencies directory
    #[arg(long)]
    pub all_dependencies: bool,

    /// Additional top-level dependency as <type>:<name>, type one of
    /// bom|camel|camel-k|camel-quarkus|mvn|github
    #[arg(short = 'd', long = "dependency", value_name = "TYPE:NAME")]
    pub dependencies: Vec<String>,

    /// Directory receiving the computed dependencies [default: ./dependencies]
    #[arg(long)]
    pub dependencies_directory: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    #[arg(long, value_enum, env = "INSPECT_RUNTIME_PROVIDER", default_value_t = RuntimeProvider::Main)]
    pub runtime_provider: RuntimeProvider,

    #[arg(long, env = "INSPECT_RUNTIME_VERSION", default_value = DEFAULT_RUNTIME_VERSION)]
    pub runtime_version: String,

    /// Pre-generated catalog; generated with Maven when omitted
    #[arg(long, env = "INSPECT_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Maven executable [default: mvn on PATH]
    #[arg(long, env = "INSPECT_MAVEN")]
    pub maven: Option<PathBuf>,

    /// Maven settings file
    #[arg(long, env = "INSPECT_MAVEN_SETTINGS")]
    pub maven_settings: Option<PathBuf>,

    /// Local Maven repository override
    #[arg(long, env = "INSPECT_MAVEN_REPOSITORY")]
    pub maven_repository: Option<PathBuf>,

    /// Build timeout in seconds
    #[arg(long, default_value_t = crate::config::DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// More logging (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Installs the stderr log subscriber.
    pub fn init_logging(&self) {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(match self.verbose {
                0 => "warn",
                1 => "info",
                _ => "debug",
            })
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(self.verbose > 1)
            .try_init();
    }

    pub fn config(&self) -> InspectorConfig {
        InspectorConfig {
            runtime: RuntimeSpec {
                provider: self.runtime_provider,
                version: self.runtime_version.clone(),
            },
            maven_executable: self.maven.clone(),
            maven_settings: self.maven_settings.clone(),
            local_repository: self.maven_repository.clone(),
            catalog_file: self.catalog.clone(),
            timeout_secs: self.timeout,
            ..InspectorConfig::default()
        }
    }

    /// Checks inputs before any work starts.
    pub fn validate(&self) -> Result<(), InspectError> {
        for file in &self.files {
            if !file.is_file() {
                return Err(InspectError::InvalidSource {
                    name: file.display().to_string(),
                    reason: "file does not exist".to_string(),
                });
            }
        }

        for dependency in &self.dependencies {
            dependency.parse::<DependencyIdentifier>()?;
        }

        if let Some(dir) = &self.dependencies_directory {
            if !dir.is_dir() {
                return Err(InspectError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("dependencies directory {} does not exist", dir.display()),
                )));
            }
        }
        Ok(())
    }

    /// Dependencies directory for transitive runs, created when missing.
    fn dependencies_dir(&self) -> Result<PathBuf> {
        let dir = match &self.dependencies_directory {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()
                .context("Failed to determine working directory")?
                .join(DEFAULT_DEPENDENCIES_DIRECTORY),
        };
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        Ok(dir)
    }

    pub async fn execute(self) -> Result<()> {
        self.validate()?;

        let mut documents = Vec::with_capacity(self.files.len());
        for file in &self.files {
            documents.push(SourceDocument::read(file).await?);
        }

        let request = if self.all_dependencies {
            InspectRequest::transitive(documents, self.dependencies_dir()?)
        } else {
            InspectRequest::top_level(documents)
        };
        let request = request.with_extra_dependencies(self.dependencies.clone());

        let config = self.config();
        debug!(?config, "Resolved configuration");
        let invoker = Arc::new(config.build_invoker());
        let catalogs = Arc::new(config.catalog_provider(invoker.clone()));
        let pipeline = InspectPipeline::new(catalogs, invoker).with_timeout(config.timeout());

        let report = pipeline.execute(request).await?;
        if let Some(text) = output::report(self.output, self.all_dependencies, &report.dependencies)? {
            print!("{text}");
        }
        Ok(())
    }
}
