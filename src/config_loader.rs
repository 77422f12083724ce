use crate::project::Project;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::{debug, info};
use std::fs::File;
use std::path::Path;

/// On-disk encoding of a project file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectFormat {
    Yaml,
    Json,
}

impl ProjectFormat {
    /// `.json` files are JSON, everything else is YAML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ProjectFormat::Json,
            _ => ProjectFormat::Yaml,
        }
    }
}

/// Load, parse and validate a project file
pub fn load_project(project_path: &Path) -> Result<Project> {
    info!("Loading project from: {:?}", project_path);

    let file = File::open(project_path)
        .wrap_err_with(|| format!("Failed to open project file {:?}", project_path))?;

    let format = ProjectFormat::from_path(project_path);
    let project: Project = match format {
        ProjectFormat::Yaml => serde_yaml::from_reader(file)
            .wrap_err_with(|| format!("Failed to parse YAML project {:?}", project_path))?,
        ProjectFormat::Json => serde_json::from_reader(file)
            .wrap_err_with(|| format!("Failed to parse JSON project {:?}", project_path))?,
    };
    debug!(
        "Parsed {:?} project: {} node(s), {} link(s), {} flow(s)",
        format,
        project.topology.node_count(),
        project.topology.link_count(),
        project.flows().len()
    );

    project
        .validate()
        .wrap_err_with(|| format!("Invalid project {:?}", project_path))?;

    Ok(project)
}

/// Write a project back in the format its extension names
pub fn save_project(project: &Project, project_path: &Path) -> Result<()> {
    let text = match ProjectFormat::from_path(project_path) {
        ProjectFormat::Yaml => serde_yaml::to_string(project).wrap_err("Failed to serialize project as YAML")?,
        ProjectFormat::Json => serde_json::to_string_pretty(project).wrap_err("Failed to serialize project as JSON")?,
    };
    std::fs::write(project_path, text)
        .wrap_err_with(|| format!("Failed to write project file {:?}", project_path))?;
    info!("Saved project to {:?}", project_path);
    Ok(())
}
