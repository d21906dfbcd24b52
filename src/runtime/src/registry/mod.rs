//! Container registry collaborators.
//!
//! - [`CredentialProvider`]: short-lived authorization from the cloud provider
//! - [`RegistryPusher`]: local push agent (login + push)

pub mod credentials;
pub mod pusher;

pub use credentials::{decode_authorization_token, AwsEcrProvider, CredentialProvider};
pub use pusher::{PodmanPusher, RegistryPusher};
