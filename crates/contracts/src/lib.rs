//! # Contracts
//!
//! Frozen interface contracts shared by every pipeline crate: run
//! configuration, step identifiers, artifact references, step invocation and
//! the tracking-service and step-runner traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Artifact Model
//! - References are `name[:version]`; a missing version means `latest`
//! - Numbered versions (`vN`) are immutable, aliases move

mod artifact;
mod error;
mod run_config;
mod runtime;
mod step;

pub use artifact::*;
pub use error::*;
pub use run_config::*;
pub use runtime::*;
pub use step::*;
