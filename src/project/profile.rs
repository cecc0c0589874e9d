use serde::{Deserialize, Serialize};
use std::fmt;

use super::request::Project;

/// Generation profile selected from the requested capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationProfile {
    /// Rule-engine oriented project
    Brm,
    /// Planning oriented project
    Planner,
    /// Default process oriented project
    Bpm,
}

/// Capability tags checked in priority order; the first match wins.
pub const PROFILE_PRIORITY: &[(&str, ApplicationProfile)] = &[
    ("brm", ApplicationProfile::Brm),
    ("planner", ApplicationProfile::Planner),
];

pub const FALLBACK_PROFILE: ApplicationProfile = ApplicationProfile::Bpm;

impl ApplicationProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationProfile::Brm => "brm",
            ApplicationProfile::Planner => "planner",
            ApplicationProfile::Bpm => "bpm",
        }
    }

    pub fn resolve(project: &Project) -> Self {
        Self::resolve_capabilities(project.capabilities.iter().map(String::as_str))
    }

    pub fn resolve_capabilities<'a, I>(capabilities: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let capabilities: Vec<&str> = capabilities.into_iter().collect();
        PROFILE_PRIORITY
            .iter()
            .find(|(tag, _)| capabilities.contains(tag))
            .map(|(_, profile)| *profile)
            .unwrap_or(FALLBACK_PROFILE)
    }
}

impl fmt::Display for ApplicationProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brm_wins_over_planner() {
        assert_eq!(
            ApplicationProfile::resolve_capabilities(["planner", "brm"]),
            ApplicationProfile::Brm
        );
        assert_eq!(
            ApplicationProfile::resolve_capabilities(["brm", "planner"]),
            ApplicationProfile::Brm
        );
    }

    #[test]
    fn test_planner_alone() {
        assert_eq!(
            ApplicationProfile::resolve_capabilities(["planner"]),
            ApplicationProfile::Planner
        );
        assert_eq!(
            ApplicationProfile::resolve_capabilities(["bpm", "planner"]),
            ApplicationProfile::Planner
        );
    }

    #[test]
    fn test_fallback_is_bpm() {
        assert_eq!(
            ApplicationProfile::resolve_capabilities(Vec::<&str>::new()),
            ApplicationProfile::Bpm
        );
        assert_eq!(
            ApplicationProfile::resolve_capabilities(["bpm"]),
            ApplicationProfile::Bpm
        );
        assert_eq!(
            ApplicationProfile::resolve_capabilities(["dmn", "cases"]),
            ApplicationProfile::Bpm
        );
    }
}
