use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::PlanError;

use super::dto::TestElementDto;
use super::element::TestElement;
use super::parameter::Parameter;

/// Ordered collection of named plans; the top-level entity for save/load.
/// The agent only ever receives one plan root at a time, so projects exist
/// for library consumers (the authoring UI).
pub struct Project {
    pub name: String,
    pub plans: Vec<PlanEntry>,
}

/// One named plan inside a project, with its parameter definitions.
pub struct PlanEntry {
    pub name: String,
    pub root: Arc<dyn TestElement>,
    pub parameters: Vec<Parameter>,
}

impl Project {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            plans: Vec::new(),
        }
    }

    pub fn add_plan(&mut self, name: &str, root: Arc<dyn TestElement>) {
        self.plans.push(PlanEntry {
            name: name.to_owned(),
            root,
            parameters: Vec::new(),
        });
    }

    /// Removes the plan at `index`; out-of-range indexes are ignored.
    pub fn remove_plan_at(&mut self, index: usize) {
        if index < self.plans.len() {
            self.plans.remove(index);
        }
    }

    #[must_use]
    pub fn plan_count(&self) -> usize {
        self.plans.len()
    }
}

#[derive(Serialize, Deserialize)]
struct ProjectDto {
    name: String,
    plans: Vec<PlanEntryDto>,
}

#[derive(Serialize, Deserialize)]
struct PlanEntryDto {
    name: String,
    plan: TestElementDto,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<Parameter>,
}

/// Writes a project to disk as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error when encoding or writing fails.
pub fn write_project(path: &Path, project: &Project) -> Result<(), PlanError> {
    let dto = ProjectDto {
        name: project.name.clone(),
        plans: project
            .plans
            .iter()
            .map(|entry| PlanEntryDto {
                name: entry.name.clone(),
                plan: TestElementDto::from_element(entry.root.as_ref()),
                parameters: entry.parameters.clone(),
            })
            .collect(),
    };

    let rendered =
        serde_json::to_string_pretty(&dto).map_err(|err| PlanError::EncodePlan { source: err })?;
    std::fs::write(path, rendered).map_err(|err| PlanError::WriteProject {
        path: path.display().to_string(),
        source: err,
    })
}

/// Reads a project file and hydrates every plan in it.
///
/// # Errors
///
/// Returns an error when the file cannot be read, parsed, or any plan root
/// fails to hydrate.
pub fn read_project(path: &Path) -> Result<Project, PlanError> {
    let content = std::fs::read(path).map_err(|err| PlanError::ReadProject {
        path: path.display().to_string(),
        source: err,
    })?;
    let dto: ProjectDto =
        serde_json::from_slice(&content).map_err(|err| PlanError::DecodePlan { source: err })?;

    let mut project = Project::new(&dto.name);
    for entry in dto.plans {
        let root = entry.plan.into_element()?;
        project.plans.push(PlanEntry {
            name: entry.name,
            root,
            parameters: entry.parameters,
        });
    }
    Ok(project)
}
