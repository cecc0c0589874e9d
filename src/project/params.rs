//! Derivation of the parameter map handed to the generation workflow.

use serde_json::{json, Map, Value};
use std::path::{Component, Path};
use thiserror::Error;

use super::profile::ApplicationProfile;
use super::request::Project;

/// Spring Boot line used from 7.18 onwards
pub const SPRING_BOOT_VERSION: &str = "2.3.4.RELEASE";
/// Spring Boot line used before 7.18
pub const LEGACY_SPRING_BOOT_VERSION: &str = "1.5.12.RELEASE";
/// First minor release that ships with the newer Spring Boot line
pub const SPRING_BOOT_MINOR_THRESHOLD: u32 = 18;

const KJAR_VERSION: &str = "1.0-SNAPSHOT";
const PER_CASE_RUNTIME_STRATEGY: &str = "PER_CASE";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("version '{version}' has no minor component")]
    MissingMinorVersion { version: String },
    #[error("version '{version}' has a non-numeric minor component '{minor}'")]
    InvalidMinorVersion { version: String, minor: String },
    #[error("project name '{name}' must be a single path segment")]
    InvalidProjectName { name: String },
}

/// Settings that do not vary per request
#[derive(Debug, Clone, Copy)]
pub struct GenerationSettings<'a> {
    pub kie_version: &'a str,
    pub maven_settings: Option<&'a str>,
}

/// Everything the workflow needs to generate one project
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowParameters {
    pub project: Project,
    pub profile: ApplicationProfile,
    pub kjar_settings: String,
    pub kie_version: String,
    pub maven_settings: String,
    pub spring_boot_version: &'static str,
}

impl WorkflowParameters {
    /// Derive parameters from a normalized project.
    ///
    /// Fails only when the version's minor component cannot be parsed.
    pub fn derive(
        project: &Project,
        settings: GenerationSettings<'_>,
    ) -> Result<Self, ValidationError> {
        validate_project_name(&project.name)?;
        let spring_boot_version = spring_boot_version_for(&project.version)?;

        Ok(Self {
            project: project.clone(),
            profile: ApplicationProfile::resolve(project),
            kjar_settings: kjar_settings(project),
            kie_version: settings.kie_version.to_string(),
            maven_settings: settings
                .maven_settings
                .map(|path| format!("-s {path}"))
                .unwrap_or_default(),
            spring_boot_version,
        })
    }

    /// Flatten into the key/value map the engine receives
    pub fn to_map(&self) -> Map<String, Value> {
        let project_options = self
            .project
            .options
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",");

        let mut params = Map::new();
        params.insert(
            "project".to_string(),
            serde_json::to_value(&self.project).unwrap_or(Value::Null),
        );
        params.insert("projectSetup".to_string(), json!(self.profile.as_str()));
        params.insert("kjarSettings".to_string(), json!(self.kjar_settings));
        params.insert("kieVersion".to_string(), json!(self.kie_version));
        params.insert("projectVersion".to_string(), json!(self.project.version));
        params.insert("projectOptions".to_string(), json!(project_options));
        params.insert("mavenSettings".to_string(), json!(self.maven_settings));
        params.insert(
            "generationType".to_string(),
            json!(self.project.origin.generation_type()),
        );
        params.insert(
            "springbootVersion".to_string(),
            json!(self.spring_boot_version),
        );
        params
    }
}

/// Maven properties describing the kjar module; `dkjar` adds a per-case runtime strategy.
pub fn kjar_settings(project: &Project) -> String {
    let base = format!(
        "-DkjarGroupId={} -DkjarArtifactId={}-kjar -DkjarVersion={}",
        project.package_name, project.name, KJAR_VERSION
    );

    if project.has_option("dkjar") {
        format!("{base} -DruntimeStrategy={PER_CASE_RUNTIME_STRATEGY}")
    } else if project.has_option("kjar") {
        base
    } else {
        String::new()
    }
}

/// The name becomes a directory and file names inside the working directory,
/// so it must stay one plain path segment.
pub fn validate_project_name(name: &str) -> Result<(), ValidationError> {
    let mut components = Path::new(name).components();
    let single_segment = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );

    if single_segment && !name.contains(['/', '\\']) {
        Ok(())
    } else {
        Err(ValidationError::InvalidProjectName {
            name: name.to_string(),
        })
    }
}

/// Parse the minor component of a dotted version string
pub fn minor_version(version: &str) -> Result<u32, ValidationError> {
    let minor = version
        .split('.')
        .nth(1)
        .ok_or_else(|| ValidationError::MissingMinorVersion {
            version: version.to_string(),
        })?;

    minor
        .trim()
        .parse::<u32>()
        .map_err(|_| ValidationError::InvalidMinorVersion {
            version: version.to_string(),
            minor: minor.to_string(),
        })
}

pub fn spring_boot_version_for(version: &str) -> Result<&'static str, ValidationError> {
    let minor = minor_version(version)?;
    Ok(if minor >= SPRING_BOOT_MINOR_THRESHOLD {
        SPRING_BOOT_VERSION
    } else {
        LEGACY_SPRING_BOOT_VERSION
    })
}
