//! Project requests and the workflow parameters derived from them

pub mod filename;
pub mod params;
pub mod profile;
pub mod request;

pub use filename::{content_disposition, encode_word};
pub use params::{validate_project_name, GenerationSettings, ValidationError, WorkflowParameters};
pub use profile::ApplicationProfile;
pub use request::{BuildRequest, Origin, Project};
