//! Pod Checkpoint CLI - checkpoint a pod's container into a registry image.

pub mod command;
pub mod logging;
