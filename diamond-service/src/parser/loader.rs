// Topology Loader
// Reads topology files and wires them into a runnable local engine

use super::error::{ParseError, ParseErrorKind, ParseResult};
use super::models::Topology;
use super::validator::TopologyValidator;
use crate::engine::{LocalEngine, LocalExecutor, ScriptedRunner};
use crate::error::ServiceResult;
use crate::events::ProgressSender;
use crate::join::JoinRunCoordinator;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Parser for topology YAML files
pub struct TopologyParser;

impl TopologyParser {
    /// Parse a topology from a file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> ParseResult<Topology> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ParseError::new(
                format!("failed to read {}: {}", path.display(), e),
                ParseErrorKind::IoError,
            )
        })?;
        Self::parse(&content)
    }

    /// Parse a topology from a YAML string
    pub fn parse(content: &str) -> ParseResult<Topology> {
        serde_yaml::from_str(content).map_err(|e| ParseError::from_yaml_error(&e, content))
    }

    /// Parse, then reject the topology if validation finds errors.
    ///
    /// Only the first validation error is reported; use
    /// [`TopologyValidator::report`] for the full list.
    pub fn parse_and_validate(content: &str) -> ParseResult<Topology> {
        let topology = Self::parse(content)?;
        if let Err(errors) = TopologyValidator::validate(&topology) {
            let count = errors.len();
            let first = &errors[0];
            let mut error = ParseError::new(
                format!("{} ({} problem(s) found)", first, count),
                ParseErrorKind::ValidationError,
            );
            error.suggestion = first.suggestion.clone();
            return Err(error);
        }
        Ok(topology)
    }
}

impl Topology {
    /// Registry populated with every job of the topology
    pub fn build_engine(&self) -> ServiceResult<LocalEngine> {
        LocalEngine::with_jobs(self.jobs.iter().map(|j| j.to_job()).collect())
    }

    /// Runner that reports each job's scripted outcome
    pub fn build_runner(&self) -> ScriptedRunner {
        self.jobs.iter().fold(
            ScriptedRunner::new().with_default_delay(self.settings.executor.default_delay_ms),
            |runner, job| runner.with_script(job.name.trim(), job.script()),
        )
    }

    /// Engine, coordinator and runner wired together
    pub fn build_executor(&self, progress: Option<ProgressSender>) -> ServiceResult<LocalExecutor> {
        let engine = Arc::new(self.build_engine()?);
        let mut coordinator = JoinRunCoordinator::with_settings(engine.clone(), &self.settings.resolver);
        if let Some(tx) = &progress {
            coordinator = coordinator.with_progress(tx.clone());
        }
        debug!(
            jobs = self.jobs.len(),
            edges = coordinator.dependency_graph().edges().len(),
            "Built topology"
        );

        let mut executor = LocalExecutor::new(engine, Arc::new(coordinator), Arc::new(self.build_runner()))
            .with_config(self.settings.executor.clone());
        if let Some(tx) = progress {
            executor = executor.with_progress(tx);
        }
        Ok(executor)
    }
}
