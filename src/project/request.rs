use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use crate::config::DEFAULT_VERSION;

pub const DEFAULT_NAME: &str = "business-application";
pub const DEFAULT_PACKAGE: &str = "com.company";
pub const DEFAULT_OPTIONS: [&str; 3] = ["kjar", "model", "service"];
pub const DEFAULT_CAPABILITIES: [&str; 1] = ["bpm"];

/// Who asked for the build. Only interactive callers get a file name back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Web,
    #[default]
    Rest,
}

impl Origin {
    /// Generation type tag handed to the workflow
    pub fn generation_type(&self) -> &'static str {
        match self {
            Origin::Web => "web",
            Origin::Rest => "rest",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.generation_type())
    }
}

/// Project description as received from an adapter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub package_name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub options: Option<BTreeSet<String>>,
    #[serde(default)]
    pub capabilities: Option<BTreeSet<String>>,
    #[serde(default)]
    pub origin: Origin,
}

/// A request with every field filled in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    pub package_name: String,
    pub version: String,
    pub options: BTreeSet<String>,
    pub capabilities: BTreeSet<String>,
    #[serde(skip)]
    pub origin: Origin,
    /// Working directory of the build, set once one is allocated
    pub location: Option<PathBuf>,
}

impl BuildRequest {
    pub fn new(origin: Origin) -> Self {
        Self {
            origin,
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_package_name(mut self, package_name: impl Into<String>) -> Self {
        self.package_name = Some(package_name.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = Some(capabilities.into_iter().map(Into::into).collect());
        self
    }

    /// Fill every unset or empty field with its default. Never fails.
    pub fn normalize(self, default_version: &str) -> Project {
        let options = self
            .options
            .filter(|o| !o.is_empty())
            .unwrap_or_else(|| DEFAULT_OPTIONS.iter().map(|s| s.to_string()).collect());
        let capabilities = self
            .capabilities
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CAPABILITIES.iter().map(|s| s.to_string()).collect());

        let default_version = if default_version.is_empty() {
            DEFAULT_VERSION
        } else {
            default_version
        };

        Project {
            name: non_empty_or(self.name, DEFAULT_NAME),
            package_name: non_empty_or(self.package_name, DEFAULT_PACKAGE),
            version: non_empty_or(self.version, default_version),
            options,
            capabilities,
            origin: self.origin,
            location: None,
        }
    }
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => default.to_string(),
    }
}

impl Project {
    pub fn has_option(&self, option: &str) -> bool {
        self.options.contains(option)
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    /// File name of the packaged artifact inside the working directory
    pub fn archive_file_name(&self) -> String {
        format!("{}.zip", self.name)
    }

    /// File name of the completion marker inside the working directory
    pub fn marker_file_name(&self) -> String {
        format!("{}.marker", self.name)
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Project [name={}, packageName={}, version={}, options={:?}, capabilities={:?}]",
            self.name, self.package_name, self.version, self.options, self.capabilities
        )
    }
}
