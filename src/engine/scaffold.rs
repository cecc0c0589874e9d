//! Project skeleton written by the local generation process.

use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::project::{validate_project_name, ApplicationProfile, Project, ValidationError};

#[derive(Debug, Error)]
pub enum ScaffoldError {
    #[error("{0} parameter is mandatory")]
    MissingParameter(&'static str),
    #[error("project parameter is malformed: {0}")]
    InvalidProject(#[source] serde_json::Error),
    #[error("unknown project setup '{0}'")]
    UnknownSetup(String),
    #[error(transparent)]
    InvalidName(#[from] ValidationError),
    #[error("project has no location")]
    MissingLocation,
    #[error("project location {} no longer exists", path.display())]
    LocationGone { path: PathBuf },
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Everything needed to lay out a generated project on disk
#[derive(Debug, Clone)]
pub struct ProjectScaffold {
    pub project: Project,
    pub profile: ApplicationProfile,
    pub kjar_settings: String,
    pub kie_version: String,
    pub spring_boot_version: String,
}

impl ProjectScaffold {
    pub fn from_parameters(params: &Map<String, Value>) -> Result<Self, ScaffoldError> {
        let project_value = params
            .get("project")
            .cloned()
            .ok_or(ScaffoldError::MissingParameter("project"))?;
        let project: Project =
            serde_json::from_value(project_value).map_err(ScaffoldError::InvalidProject)?;
        validate_project_name(&project.name)?;

        let profile = match str_param(params, "projectSetup")? {
            "brm" => ApplicationProfile::Brm,
            "planner" => ApplicationProfile::Planner,
            "bpm" => ApplicationProfile::Bpm,
            other => return Err(ScaffoldError::UnknownSetup(other.to_string())),
        };

        Ok(Self {
            project,
            profile,
            kjar_settings: str_param(params, "kjarSettings")?.to_string(),
            kie_version: str_param(params, "kieVersion")?.to_string(),
            spring_boot_version: str_param(params, "springbootVersion")?.to_string(),
        })
    }

    pub fn location(&self) -> Result<&Path, ScaffoldError> {
        self.project
            .location
            .as_deref()
            .ok_or(ScaffoldError::MissingLocation)
    }

    /// Write the project below `<location>/<name>` and return the files created.
    ///
    /// The location itself is never created: a run that outlives its build
    /// fails here instead of bringing back a reclaimed working directory.
    pub fn write(&self) -> Result<Vec<PathBuf>, ScaffoldError> {
        let location = self.location()?;
        if !location.is_dir() {
            return Err(ScaffoldError::LocationGone {
                path: location.to_path_buf(),
            });
        }

        let root = location.join(&self.project.name);
        let name = &self.project.name;
        let mut written = FileSet {
            location,
            files: Vec::new(),
        };

        written.write(&root.join("README.md"), &self.readme())?;

        if self.project.has_option("model") {
            let module = root.join(format!("{name}-model"));
            written.write(&module.join("pom.xml"), &self.pom("model", None))?;
        }

        if self.project.has_option("kjar") || self.project.has_option("dkjar") {
            let module = root.join(format!("{name}-kjar"));
            written.write(&module.join("pom.xml"), &self.pom("kjar", None))?;
            written.write(
                &module.join("src/main/resources/META-INF/kmodule.xml"),
                KMODULE_XML,
            )?;
            let (asset, content) = self.profile_asset();
            written.write(&module.join("src/main/resources").join(asset), content)?;
        }

        if self.project.has_option("service") {
            let module = root.join(format!("{name}-service"));
            written.write(
                &module.join("pom.xml"),
                &self.pom("service", Some(&self.spring_boot_version)),
            )?;
            written.write(
                &module.join("src/main/resources/application.properties"),
                &self.application_properties(),
            )?;
        }

        Ok(written.files)
    }

    fn readme(&self) -> String {
        format!(
            "# {name}\n\nGenerated {profile} business application.\n\n\
             - package: {package}\n- version: {version}\n- options: {options}\n",
            name = self.project.name,
            profile = self.profile,
            package = self.project.package_name,
            version = self.project.version,
            options = self
                .project
                .options
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        )
    }

    fn pom(&self, module: &str, spring_boot: Option<&str>) -> String {
        let parent = spring_boot
            .map(|v| {
                format!(
                    "  <parent>\n    <groupId>org.springframework.boot</groupId>\n    \
                     <artifactId>spring-boot-starter-parent</artifactId>\n    \
                     <version>{v}</version>\n  </parent>\n"
                )
            })
            .unwrap_or_default();

        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<project>\n  <modelVersion>4.0.0</modelVersion>\n\
             {parent}  <groupId>{group}</groupId>\n  <artifactId>{name}-{module}</artifactId>\n  \
             <version>1.0-SNAPSHOT</version>\n  <properties>\n    \
             <version.org.kie>{kie}</version.org.kie>\n  </properties>\n</project>\n",
            group = self.project.package_name,
            name = self.project.name,
            kie = self.kie_version,
        )
    }

    fn application_properties(&self) -> String {
        let mut properties = format!(
            "server.address=0.0.0.0\nserver.port=8090\n\
             kieserver.serverId={name}-service\nkieserver.serverName={name}-service\n",
            name = self.project.name
        );
        if !self.kjar_settings.is_empty() {
            properties.push_str(&format!(
                "kieserver.deployments[0].groupId={}\nkieserver.deployments[0].artifactId={}-kjar\n\
                 kieserver.deployments[0].version=1.0-SNAPSHOT\n",
                self.project.package_name, self.project.name
            ));
        }
        if self.kjar_settings.contains("-DruntimeStrategy=PER_CASE") {
            properties.push_str("kieserver.runtimeStrategy=PER_CASE\n");
        }
        properties
    }

    fn profile_asset(&self) -> (&'static str, &'static str) {
        match self.profile {
            ApplicationProfile::Brm => ("rules/rules.drl", "package rules;\n"),
            ApplicationProfile::Planner => (
                "solver/solverConfig.xml",
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<solver/>\n",
            ),
            ApplicationProfile::Bpm => ("processes/.gitkeep", ""),
        }
    }
}

const KMODULE_XML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<kmodule xmlns=\"http://www.drools.org/xsd/kmodule\"/>\n";

fn str_param<'a>(params: &'a Map<String, Value>, name: &'static str) -> Result<&'a str, ScaffoldError> {
    params
        .get(name)
        .and_then(Value::as_str)
        .ok_or(ScaffoldError::MissingParameter(name))
}

/// Files written below one project location
struct FileSet<'a> {
    location: &'a Path,
    files: Vec<PathBuf>,
}

impl FileSet<'_> {
    fn write(&mut self, path: &Path, content: &str) -> Result<(), ScaffoldError> {
        let to_err = |source| ScaffoldError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            create_dirs_below(self.location, parent).map_err(to_err)?;
        }
        fs::write(path, content).map_err(to_err)?;
        self.files.push(path.to_path_buf());
        Ok(())
    }
}

/// Create the directories between `base` and `dir`, but never `base` itself
fn create_dirs_below(base: &Path, dir: &Path) -> io::Result<()> {
    let relative = dir.strip_prefix(base).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is outside {}", dir.display(), base.display()),
        )
    })?;

    let mut current = base.to_path_buf();
    for component in relative.components() {
        current.push(component);
        match fs::create_dir(&current) {
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
            other => other?,
        }
    }
    Ok(())
}
