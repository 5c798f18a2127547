// Topology Validator
// Semantic checks on a parsed topology: names, references, join lists and trigger cycles

use super::error::{Validation, ValidationError};
use super::models::{JobDefinition, Topology};
use crate::graph::{Dependency, DependencyGraph};
use crate::model::parse_name_list;

use std::collections::HashSet;

/// Errors and warnings found in a topology
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validator for parsed topologies
pub struct TopologyValidator;

impl TopologyValidator {
    /// Validate a topology, returning only the errors
    pub fn validate(topology: &Topology) -> Result<(), Vec<ValidationError>> {
        let report = Self::report(topology);
        if report.is_valid() {
            Ok(())
        } else {
            Err(report.errors)
        }
    }

    /// Full validation report, warnings included
    pub fn report(topology: &Topology) -> ValidationReport {
        let mut report = ValidationReport::default();

        if topology.jobs.is_empty() {
            report
                .errors
                .push(ValidationError::new("topology must declare jobs", "jobs"));
            return report;
        }

        let mut names: Vec<&str> = Vec::new();
        for (i, job) in topology.jobs.iter().enumerate() {
            let name = job.name.trim();
            if name.is_empty() {
                report.errors.push(ValidationError::new(
                    "job name must not be empty",
                    format!("jobs[{}].name", i),
                ));
            } else if names.contains(&name) {
                report.errors.push(ValidationError::new(
                    format!("duplicate job name '{}'", name),
                    format!("jobs[{}].name", i),
                ));
            } else {
                names.push(name);
            }
        }

        for job in &topology.jobs {
            Self::validate_job(job, &names, &mut report);
        }
        Self::validate_trigger_cycles(topology, &mut report);

        report
    }

    fn validate_job(job: &JobDefinition, names: &[&str], report: &mut ValidationReport) {
        let path = format!("jobs.{}", job.name.trim());

        for (i, trigger) in job.triggers.iter().enumerate() {
            let trigger_path = format!("{}.triggers[{}].projects", path, i);
            if parse_name_list(&trigger.projects).is_empty() {
                report.warnings.push(ValidationError::new(
                    "trigger names no projects",
                    trigger_path.clone(),
                ));
            }
            Self::check_references(&trigger.projects, names, &trigger_path, report);
        }

        let Some(join) = &job.join else {
            return;
        };
        let join_path = format!("{}.join.projects", path);
        match Self::check_join_projects(&join.projects, names) {
            Validation::Ok => {}
            Validation::Warning(message) => report
                .warnings
                .push(ValidationError::new(message, join_path)),
            Validation::Error(message) => {
                report.errors.push(ValidationError::new(message, join_path))
            }
        }

        for (i, step) in join.post_join.iter().enumerate() {
            if let super::models::PostJoinDefinition::Trigger(configs) = step {
                for (j, config) in configs.iter().enumerate() {
                    let step_path = format!("{}.join.post_join[{}].trigger[{}].projects", path, i, j);
                    Self::check_references(&config.projects, names, &step_path, report);
                }
            }
        }
    }

    /// Check a comma-separated join list against the known job names.
    ///
    /// Blank entries and trailing commas are tolerated. An empty list is only
    /// a warning since the join then does nothing.
    pub fn check_join_projects(value: &str, names: &[&str]) -> Validation {
        if value.trim().is_empty() {
            return Validation::Warning("No join actions will be performed".to_string());
        }

        let projects = parse_name_list(value);
        for project in &projects {
            if !names.contains(&project.as_str()) {
                return Validation::Error(Self::no_such_project(project, names));
            }
        }
        if projects.is_empty() {
            return Validation::Error("No project specified".to_string());
        }
        Validation::Ok
    }

    fn check_references(value: &str, names: &[&str], path: &str, report: &mut ValidationReport) {
        for project in parse_name_list(value) {
            if !names.contains(&project.as_str()) {
                report
                    .errors
                    .push(ValidationError::new(Self::no_such_project(&project, names), path));
            }
        }
    }

    fn no_such_project(project: &str, names: &[&str]) -> String {
        match nearest(project, names) {
            Some(candidate) => format!(
                "No such project '{}'. Did you mean '{}'?",
                project, candidate
            ),
            None => format!("No such project '{}'", project),
        }
    }

    /// Trigger edges alone must not form a cycle, or runs would never stop
    fn validate_trigger_cycles(topology: &Topology, report: &mut ValidationReport) {
        let known: HashSet<&str> = topology.jobs.iter().map(|j| j.name.trim()).collect();
        let mut graph = DependencyGraph::new();
        for job in &topology.jobs {
            graph.add_node(job.name.trim());
            for trigger in &job.triggers {
                for child in parse_name_list(&trigger.projects) {
                    if known.contains(child.as_str()) {
                        graph.add_dependency(Dependency::trigger(
                            job.name.trim(),
                            child,
                            trigger.kind.to_string(),
                            trigger.threshold,
                        ));
                    }
                }
            }
        }

        if let Err(e) = graph.topological_sort() {
            report.errors.push(
                ValidationError::new(e.message, "jobs")
                    .with_suggestion("remove one of the triggers in the cycle"),
            );
        }
    }
}

/// Closest known name by edit distance
fn nearest<'a>(name: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .copied()
        .min_by_key(|candidate| edit_distance(name, candidate))
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut current = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        previous = current;
    }
    previous[b.len()]
}
