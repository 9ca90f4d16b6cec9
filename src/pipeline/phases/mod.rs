// Generation steps, in execution order

#[path = "01_discover.rs"]
pub mod discover;
#[path = "02_validate.rs"]
pub mod validate;
#[path = "03_credentials.rs"]
pub mod credentials;
#[path = "04_manifest.rs"]
pub mod manifest;
#[path = "05_config.rs"]
pub mod config;
#[path = "06_dockerize.rs"]
pub mod dockerize;
#[path = "07_image.rs"]
pub mod image;

use super::phase_trait::WorkflowPhase;

/// Every phase of a full run.
pub fn default_phases() -> Vec<Box<dyn WorkflowPhase>> {
    vec![
        Box::new(discover::DiscoverPhase),
        Box::new(validate::ValidatePhase),
        Box::new(credentials::CredentialsPhase),
        Box::new(manifest::ManifestPhase),
        Box::new(config::ConfigPhase),
        Box::new(dockerize::DockerizePhase),
        Box::new(image::ImagePhase),
    ]
}
