//! Per-version manifest and alias table, stored as JSON next to the data.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use contracts::{ArtifactHandle, ContractError};
use serde::{Deserialize, Serialize};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const ALIASES_FILE: &str = "aliases.json";

/// Metadata of one committed artifact version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub name: String,
    pub version: u32,
    pub artifact_type: String,
    pub description: String,
    /// Data file inside the version directory
    pub file_name: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

impl ArtifactManifest {
    pub fn handle(&self) -> ArtifactHandle {
        ArtifactHandle {
            name: self.name.clone(),
            artifact_type: self.artifact_type.clone(),
            version: self.version,
        }
    }

    pub fn read(version_dir: &Path) -> Result<Self, ContractError> {
        let raw = fs::read(version_dir.join(MANIFEST_FILE))?;
        serde_json::from_slice(&raw).map_err(|e| {
            ContractError::Other(format!(
                "corrupt manifest in {}: {e}",
                version_dir.display()
            ))
        })
    }

    pub fn write(&self, version_dir: &Path) -> Result<(), ContractError> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| ContractError::Other(format!("manifest serialize error: {e}")))?;
        write_synced(&version_dir.join(MANIFEST_FILE), &json)
    }
}

/// Alias -> version table of one artifact name
pub type AliasTable = BTreeMap<String, u32>;

pub fn read_aliases(name_dir: &Path) -> Result<AliasTable, ContractError> {
    let path = name_dir.join(ALIASES_FILE);
    if !path.exists() {
        return Ok(AliasTable::new());
    }
    let raw = fs::read(&path)?;
    serde_json::from_slice(&raw)
        .map_err(|e| ContractError::Other(format!("corrupt alias table {}: {e}", path.display())))
}

/// Replace the alias table atomically (write temp file, then rename)
pub fn write_aliases(name_dir: &Path, aliases: &AliasTable) -> Result<(), ContractError> {
    let json = serde_json::to_vec_pretty(aliases)
        .map_err(|e| ContractError::Other(format!("alias serialize error: {e}")))?;
    let tmp = name_dir.join(format!("{ALIASES_FILE}.tmp"));
    write_synced(&tmp, &json)?;
    fs::rename(&tmp, name_dir.join(ALIASES_FILE))?;
    Ok(())
}

pub(crate) fn write_synced(path: &Path, data: &[u8]) -> Result<(), ContractError> {
    let mut file = fs::File::create(path)?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_table_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_aliases(dir.path()).unwrap().is_empty());

        let mut aliases = AliasTable::new();
        aliases.insert("latest".into(), 3);
        aliases.insert("prod".into(), 1);
        write_aliases(dir.path(), &aliases).unwrap();

        assert_eq!(read_aliases(dir.path()).unwrap(), aliases);
        assert!(!dir.path().join("aliases.json.tmp").exists());
    }
}
