//! # Tracking
//!
//! Artifact tracking service implementations.
//!
//! Responsibilities:
//! - Resolve `name:version` references to local files
//! - Publish new immutable versions and move the `latest` alias
//! - Acknowledge durability of in-flight uploads, in submission order
//! - Provide an in-memory mock with failure injection for tests

pub mod local;
pub mod manifest;
pub mod mock;

pub use contracts::{ArtifactHandle, ArtifactRef, PublishRequest, TrackingService};
pub use local::LocalTracker;
pub use manifest::ArtifactManifest;
pub use mock::{MockConfig, MockTracker, TrackerEvent};
