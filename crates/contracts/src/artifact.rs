//! Artifact references and the tracking-service interface
//!
//! An artifact is a named, typed, versioned blob. References take the form
//! `name[:version]`; a reference without a version points at the mutable
//! `latest` alias.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Alias that always points at the most recently committed version
pub const LATEST: &str = "latest";

/// Separator between artifact name and version
pub const VERSION_SEPARATOR: char = ':';

/// Version part of an artifact reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ArtifactVersion {
    /// Immutable numbered version (`v0`, `v1`, ...)
    Number(u32),
    /// Mutable alias (`latest`, `prod`, ...)
    Alias(String),
}

impl ArtifactVersion {
    /// The `latest` alias
    pub fn latest() -> Self {
        Self::Alias(LATEST.to_string())
    }

    /// Whether this version is the `latest` alias
    pub fn is_latest(&self) -> bool {
        matches!(self, Self::Alias(a) if a == LATEST)
    }
}

impl fmt::Display for ArtifactVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "v{n}"),
            Self::Alias(a) => f.write_str(a),
        }
    }
}

impl FromStr for ArtifactVersion {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ContractError::resolution(s, "empty artifact version"));
        }
        if let Some(n) = s.strip_prefix('v').and_then(|d| d.parse::<u32>().ok()) {
            return Ok(Self::Number(n));
        }
        Ok(Self::Alias(s.to_string()))
    }
}

impl From<ArtifactVersion> for String {
    fn from(v: ArtifactVersion) -> Self {
        v.to_string()
    }
}

impl TryFrom<String> for ArtifactVersion {
    type Error = ContractError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Reference to a named artifact version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactRef {
    name: String,
    version: Option<ArtifactVersion>,
}

impl ArtifactRef {
    /// Parse `name[:version]`
    ///
    /// An explicit version is kept verbatim; a missing version stays `None`
    /// until [`ArtifactRef::qualified`] is applied.
    pub fn parse(raw: &str) -> Result<Self, ContractError> {
        let (name, version) = match raw.split_once(VERSION_SEPARATOR) {
            Some((name, version)) => (name, Some(version)),
            None => (raw, None),
        };

        if name.is_empty() {
            return Err(ContractError::resolution(raw, "empty artifact name"));
        }
        if let Some(v) = version {
            if v.contains(VERSION_SEPARATOR) {
                return Err(ContractError::resolution(raw, "too many ':' separators"));
            }
        }

        let version = version.map(str::parse).transpose().map_err(|e| match e {
            ContractError::Resolution { message, .. } => ContractError::resolution(raw, message),
            other => other,
        })?;

        Ok(Self {
            name: name.to_string(),
            version,
        })
    }

    /// Build a reference to an explicit version
    pub fn new(name: impl Into<String>, version: ArtifactVersion) -> Self {
        Self {
            name: name.into(),
            version: Some(version),
        }
    }

    /// Normalize a raw reference string
    ///
    /// `sample.csv` becomes `sample.csv:latest`, `sample.csv:v3` is returned
    /// unchanged.
    pub fn normalize(raw: &str) -> Result<String, ContractError> {
        Ok(Self::parse(raw)?.qualified().to_string())
    }

    /// Fully-qualified copy of this reference
    pub fn qualified(&self) -> Self {
        Self {
            name: self.name.clone(),
            version: Some(self.version().clone()),
        }
    }

    /// Artifact name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version, defaulting to `latest` when absent
    pub fn version(&self) -> &ArtifactVersion {
        static LATEST_VERSION: std::sync::OnceLock<ArtifactVersion> = std::sync::OnceLock::new();
        self.version
            .as_ref()
            .unwrap_or_else(|| LATEST_VERSION.get_or_init(ArtifactVersion::latest))
    }

    /// Whether the caller supplied an explicit version
    pub fn has_explicit_version(&self) -> bool {
        self.version.is_some()
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}{}{}", self.name, VERSION_SEPARATOR, v),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for ArtifactRef {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Request to publish a local file as a new artifact version
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Artifact name (e.g. `test_data.csv`)
    pub name: String,
    /// Artifact type (e.g. `split_data`)
    pub artifact_type: String,
    /// Human-readable description
    pub description: String,
    /// File to upload
    pub local_path: PathBuf,
}

/// Handle to a published artifact version
///
/// The upload behind a handle may still be in flight; durability is
/// confirmed through [`TrackingService::await_durable`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactHandle {
    pub name: String,
    pub artifact_type: String,
    pub version: u32,
}

impl ArtifactHandle {
    /// Immutable reference to exactly this version
    pub fn reference(&self) -> ArtifactRef {
        ArtifactRef::new(self.name.clone(), ArtifactVersion::Number(self.version))
    }
}

/// Artifact / experiment tracking service
#[trait_variant::make(TrackingService: Send)]
pub trait LocalTrackingService {
    /// Resolve a fully-qualified reference to a local file
    ///
    /// # Errors
    /// `ContractError::Resolution` if the name or version does not exist
    async fn resolve(&self, reference: &ArtifactRef) -> Result<PathBuf, ContractError>;

    /// Publish a local file as a new version
    ///
    /// May return before the content is durable.
    async fn publish(&self, request: PublishRequest) -> Result<ArtifactHandle, ContractError>;

    /// Block until the given version is confirmed stored
    async fn await_durable(&self, handle: &ArtifactHandle) -> Result<(), ContractError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_appends_latest() {
        assert_eq!(
            ArtifactRef::normalize("sample.csv").unwrap(),
            "sample.csv:latest"
        );
    }

    #[test]
    fn test_normalize_keeps_explicit_version() {
        assert_eq!(ArtifactRef::normalize("sample.csv:v3").unwrap(), "sample.csv:v3");
        assert_eq!(
            ArtifactRef::normalize("model_export:prod").unwrap(),
            "model_export:prod"
        );
    }

    #[test]
    fn test_parse_versions() {
        let r = ArtifactRef::parse("sample.csv:v12").unwrap();
        assert_eq!(r.name(), "sample.csv");
        assert_eq!(r.version(), &ArtifactVersion::Number(12));
        assert!(r.has_explicit_version());

        let r = ArtifactRef::parse("sample.csv").unwrap();
        assert!(!r.has_explicit_version());
        assert!(r.version().is_latest());
        assert_eq!(r.to_string(), "sample.csv");
        assert_eq!(r.qualified().to_string(), "sample.csv:latest");

        // "version" is an alias, not a numbered version
        let r = ArtifactRef::parse("a:version").unwrap();
        assert_eq!(r.version(), &ArtifactVersion::Alias("version".into()));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for raw in ["", ":v1", "sample.csv:", "a:b:c"] {
            let err = ArtifactRef::parse(raw).unwrap_err();
            assert_eq!(err.kind(), "ResolutionError", "input {raw:?}");
        }
    }

    #[test]
    fn test_handle_reference_is_immutable_version() {
        let handle = ArtifactHandle {
            name: "test_data.csv".into(),
            artifact_type: "split_data".into(),
            version: 4,
        };
        assert_eq!(handle.reference().to_string(), "test_data.csv:v4");
    }
}
