//! Inspection pipeline.
//!
//! [`InspectPipeline`] drives one inspection run:
//! 1. **Validation**: user-supplied dependencies are parsed before anything else
//! 2. **Scanning**: every source is scanned against the shared catalog
//! 3. **Resolution** (transitive mode): project synthesis and a build tool run
//! 4. **Harvesting** (transitive mode): artifacts copied to the dependencies directory
//!
//! Blocking stages run on the blocking pool under the configured stage
//! timeout; the build stage is bounded by the invoker's own timeout. Any
//! stage failure ends the run and nothing partial is returned.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::catalog::CatalogProvider;
use crate::executor::BuildInvoker;
use crate::harvest::artifacts;
use crate::model::{DependencySet, SourceDocument};
use crate::project::Project;
use crate::scanner;
use crate::traits::InspectError;

// ============================================================================
// Pipeline Types
// ============================================================================

/// Where an inspection run is, or ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectState {
    Idle,
    ScanningSources,
    TopLevelOnly,
    ResolvingTransitive,
    HarvestingArtifacts,
    Done,
    Error,
}

/// What the run should produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InspectMode {
    /// Only the dependencies named by the sources themselves
    TopLevel,
    /// Full closure, copied into `dependencies_dir`
    Transitive { dependencies_dir: PathBuf },
}

#[derive(Debug, Clone)]
pub struct InspectRequest {
    pub documents: Vec<SourceDocument>,

    /// Raw `type:name` dependencies added by the user
    pub extra_dependencies: Vec<String>,

    pub mode: InspectMode,
}

impl InspectRequest {
    pub fn top_level(documents: Vec<SourceDocument>) -> Self {
        Self {
            documents,
            extra_dependencies: Vec::new(),
            mode: InspectMode::TopLevel,
        }
    }

    pub fn transitive(documents: Vec<SourceDocument>, dependencies_dir: impl Into<PathBuf>) -> Self {
        Self {
            documents,
            extra_dependencies: Vec::new(),
            mode: InspectMode::Transitive {
                dependencies_dir: dependencies_dir.into(),
            },
        }
    }

    pub fn with_extra_dependencies(mut self, extra: Vec<String>) -> Self {
        self.extra_dependencies = extra;
        self
    }
}

/// Result of a successful run.
#[derive(Debug)]
pub struct InspectReport {
    /// Sorted top-level identifiers, or harvested artifact paths in
    /// transitive mode
    pub dependencies: Vec<String>,

    /// Scanned plus user-supplied identifiers
    pub top_level: DependencySet,

    /// States visited, `Idle` through `Done`
    pub states: Vec<InspectState>,

    pub stats: InspectStats,
}

/// Statistics about the run.
#[derive(Debug, Default, Clone)]
pub struct InspectStats {
    pub total_duration_ms: u64,
    pub scan_duration_ms: u64,
    pub resolve_duration_ms: u64,
    pub harvest_duration_ms: u64,
    pub sources_scanned: usize,
    pub artifacts_harvested: usize,
}

struct StateTrail {
    states: Vec<InspectState>,
}

impl StateTrail {
    fn new() -> Self {
        Self {
            states: vec![InspectState::Idle],
        }
    }

    fn enter(&mut self, state: InspectState) {
        debug!(?state, "Entering state");
        self.states.push(state);
    }
}

// ============================================================================
// Pipeline Executor
// ============================================================================

pub struct InspectPipeline {
    catalogs: Arc<CatalogProvider>,
    invoker: Arc<BuildInvoker>,
    stage_timeout: Duration,
}

impl InspectPipeline {
    /// Default stage timeout: 5 minutes.
    pub fn new(catalogs: Arc<CatalogProvider>, invoker: Arc<BuildInvoker>) -> Self {
        Self {
            catalogs,
            invoker,
            stage_timeout: Duration::from_secs(300),
        }
    }

    /// Sets the timeout for the scanning and harvesting stages.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    #[instrument(skip(self, request), fields(sources = request.documents.len()))]
    pub async fn execute(&self, request: InspectRequest) -> Result<InspectReport, InspectError> {
        let mut trail = StateTrail::new();
        let result = self.run(request, &mut trail).await;
        if let Err(e) = &result {
            trail.enter(InspectState::Error);
            warn!(error = %e, states = ?trail.states, "Inspection failed");
        }
        result
    }

    async fn run(
        &self,
        request: InspectRequest,
        trail: &mut StateTrail,
    ) -> Result<InspectReport, InspectError> {
        let start = Instant::now();
        let mut stats = InspectStats::default();

        let mut extras = DependencySet::new();
        extras.merge_raw(&request.extra_dependencies)?;

        // ====================================================================
        // Stage 1: Scanning
        // ====================================================================

        trail.enter(InspectState::ScanningSources);
        let scan_start = Instant::now();
        let catalog = self.catalogs.get().await?;

        stats.sources_scanned = request.documents.len();
        let documents = request.documents;
        let scan_catalog = catalog.clone();
        let mut dependencies = self
            .blocking_stage("scan", move |_| scanner::scan_all(&documents, &scan_catalog))
            .await?;
        dependencies.merge(extras);

        stats.scan_duration_ms = scan_start.elapsed().as_millis() as u64;
        info!(
            duration_ms = stats.scan_duration_ms,
            dependencies = dependencies.len(),
            "Scanning completed"
        );

        let dependencies_dir = match request.mode {
            InspectMode::TopLevel => {
                trail.enter(InspectState::TopLevelOnly);
                trail.enter(InspectState::Done);
                stats.total_duration_ms = start.elapsed().as_millis() as u64;
                return Ok(InspectReport {
                    dependencies: dependencies.to_strings(),
                    top_level: dependencies,
                    states: std::mem::take(&mut trail.states),
                    stats,
                });
            }
            InspectMode::Transitive { dependencies_dir } => dependencies_dir,
        };

        // ====================================================================
        // Stage 2: Resolution
        // ====================================================================

        trail.enter(InspectState::ResolvingTransitive);
        let resolve_start = Instant::now();

        let project = Project::synthesize(&dependencies, &catalog)?;
        let graph = self.invoker.resolve(&project).await?;

        stats.resolve_duration_ms = resolve_start.elapsed().as_millis() as u64;
        info!(duration_ms = stats.resolve_duration_ms, "Resolution completed");

        // ====================================================================
        // Stage 3: Harvesting
        // ====================================================================

        trail.enter(InspectState::HarvestingArtifacts);
        let harvest_start = Instant::now();

        let target = dependencies_dir.clone();
        let harvested = self
            .blocking_stage("harvest", move |cancelled| {
                artifacts::harvest_until(&graph, &target, cancelled)
            })
            .await?;

        stats.harvest_duration_ms = harvest_start.elapsed().as_millis() as u64;
        stats.artifacts_harvested = harvested.len();
        info!(
            duration_ms = stats.harvest_duration_ms,
            artifacts = stats.artifacts_harvested,
            dir = %dependencies_dir.display(),
            "Harvesting completed"
        );

        trail.enter(InspectState::Done);
        stats.total_duration_ms = start.elapsed().as_millis() as u64;

        Ok(InspectReport {
            dependencies: harvested,
            top_level: dependencies,
            states: std::mem::take(&mut trail.states),
            stats,
        })
    }

    /// Runs `work` on the blocking pool under the stage timeout.
    ///
    /// On timeout the flag handed to `work` is set so it can stop at its next
    /// checkpoint; the run itself returns immediately.
    async fn blocking_stage<T, F>(&self, stage: &'static str, work: F) -> Result<T, InspectError>
    where
        F: FnOnce(&AtomicBool) -> Result<T, InspectError> + Send + 'static,
        T: Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let task = tokio::task::spawn_blocking(move || work(&flag));

        match timeout(self.stage_timeout, task).await {
            Ok(joined) => joined.map_err(|e| InspectError::StageFailed {
                stage: stage.to_string(),
                reason: format!("Task join error: {}", e),
            })?,
            Err(_) => {
                cancelled.store(true, Ordering::SeqCst);
                warn!(stage, timeout_secs = self.stage_timeout.as_secs(), "Stage timed out");
                Err(InspectError::StageTimeout {
                    stage: stage.to_string(),
                    timeout_secs: self.stage_timeout.as_secs(),
                })
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
