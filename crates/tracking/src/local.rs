//! Filesystem-backed tracking service
//!
//! Layout under `<root>/<project>/<name>/`:
//! - `v<N>/`            committed version (data file + `manifest.json`)
//! - `v<N>.partial/`    upload in progress
//! - `aliases.json`     alias -> version table (`latest`, `prod`, ...)
//!
//! Uploads run on one background worker in submission order. Awaiting a
//! handle also collects the acknowledgment of every upload queued before it
//! and reports the first failure, so a clean return means the whole prefix
//! is durable.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use contracts::{
    ArtifactHandle, ArtifactRef, ArtifactVersion, ContractError, PublishRequest, TrackingService,
    LATEST,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, warn};

use crate::manifest::{read_aliases, write_aliases, write_synced, ArtifactManifest};

type UploadAck = oneshot::Receiver<Result<(), String>>;

/// Acknowledgment not yet collected, in submission order
struct PendingAck {
    name: String,
    version: u32,
    ack: UploadAck,
}

struct UploadJob {
    manifest: ArtifactManifest,
    source: PathBuf,
    name_dir: PathBuf,
    ack: oneshot::Sender<Result<(), String>>,
}

/// Local artifact store
///
/// Must be created inside a Tokio runtime (the upload worker is spawned on
/// construction).
pub struct LocalTracker {
    project_dir: PathBuf,
    /// Next free version per artifact name
    next_versions: Mutex<HashMap<String, u32>>,
    /// Acknowledgments not yet awaited
    pending: Mutex<VecDeque<PendingAck>>,
    uploads: mpsc::UnboundedSender<UploadJob>,
    /// Serializes alias updates between the worker and `promote`
    alias_lock: Arc<Mutex<()>>,
}

impl LocalTracker {
    /// Open (or create) the store for `project` under `root`
    pub fn open(root: impl AsRef<Path>, project: &str) -> Result<Self, ContractError> {
        if project.is_empty() || project.contains(['/', '\\']) {
            return Err(ContractError::config_validation(
                "project_name",
                format!("'{project}' is not a valid project name"),
            ));
        }
        let project_dir = root.as_ref().join(project);
        fs::create_dir_all(&project_dir)?;

        let alias_lock = Arc::new(Mutex::new(()));
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(upload_worker(rx, Arc::clone(&alias_lock)));

        info!(path = %project_dir.display(), "local tracker opened");

        Ok(Self {
            project_dir,
            next_versions: Mutex::new(HashMap::new()),
            pending: Mutex::new(VecDeque::new()),
            uploads: tx,
            alias_lock,
        })
    }

    /// Uploads whose acknowledgment has not been collected yet
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Directory holding this project's artifacts
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Point `alias` at the version `reference` resolves to
    ///
    /// Used to promote a model export to `prod`.
    #[instrument(name = "local_tracker_promote", skip(self), fields(reference = %reference))]
    pub fn promote(
        &self,
        reference: &ArtifactRef,
        alias: &str,
    ) -> Result<ArtifactHandle, ContractError> {
        if alias.is_empty() || alias.parse::<ArtifactVersion>().ok().map_or(true, |v| {
            matches!(v, ArtifactVersion::Number(_))
        }) {
            return Err(ContractError::config_validation(
                "alias",
                format!("'{alias}' is not a valid alias"),
            ));
        }

        let version = self.resolve_version(reference)?;
        let name_dir = self.name_dir(reference.name())?;
        let manifest = ArtifactManifest::read(&name_dir.join(version_dir_name(version)))?;

        let _guard = self.alias_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut aliases = read_aliases(&name_dir)?;
        aliases.insert(alias.to_string(), version);
        write_aliases(&name_dir, &aliases)?;

        info!(alias, version, "alias moved");
        Ok(manifest.handle())
    }

    /// Committed versions of `name`, oldest first
    pub fn list(&self, name: &str) -> Result<Vec<ArtifactManifest>, ContractError> {
        let name_dir = self.name_dir(name)?;
        if !name_dir.exists() {
            return Ok(Vec::new());
        }
        let mut manifests = Vec::new();
        for entry in fs::read_dir(&name_dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            if parse_version_dir(&file_name.to_string_lossy()).is_some() {
                manifests.push(ArtifactManifest::read(&entry.path())?);
            }
        }
        manifests.sort_by_key(|m| m.version);
        Ok(manifests)
    }

    /// Alias table of `name`
    pub fn aliases(&self, name: &str) -> Result<Vec<(String, u32)>, ContractError> {
        Ok(read_aliases(&self.name_dir(name)?)?.into_iter().collect())
    }

    fn name_dir(&self, name: &str) -> Result<PathBuf, ContractError> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ContractError::resolution(name, "invalid artifact name"));
        }
        Ok(self.project_dir.join(name))
    }

    fn resolve_version(&self, reference: &ArtifactRef) -> Result<u32, ContractError> {
        let name_dir = self.name_dir(reference.name())?;
        if !name_dir.exists() {
            return Err(ContractError::resolution(
                reference.qualified().to_string(),
                "no such artifact",
            ));
        }

        let version = match reference.version() {
            ArtifactVersion::Number(n) => *n,
            ArtifactVersion::Alias(alias) => {
                let aliases = read_aliases(&name_dir)?;
                *aliases.get(alias).ok_or_else(|| {
                    ContractError::resolution(
                        reference.qualified().to_string(),
                        format!("no version is aliased '{alias}'"),
                    )
                })?
            }
        };

        if !name_dir.join(version_dir_name(version)).is_dir() {
            return Err(ContractError::resolution(
                reference.qualified().to_string(),
                format!("version v{version} does not exist"),
            ));
        }
        Ok(version)
    }

    /// Reserve the next version number of `name`
    fn reserve_version(&self, name: &str, name_dir: &Path) -> Result<u32, ContractError> {
        let mut next = self.next_versions.lock().unwrap_or_else(|e| e.into_inner());
        let version = match next.get(name) {
            Some(v) => *v,
            None => scan_next_version(name_dir)?,
        };
        next.insert(name.to_string(), version + 1);
        Ok(version)
    }
}

impl TrackingService for LocalTracker {
    #[instrument(name = "local_tracker_resolve", skip(self), fields(reference = %reference))]
    async fn resolve(&self, reference: &ArtifactRef) -> Result<PathBuf, ContractError> {
        let version = self.resolve_version(reference)?;
        let version_dir = self.name_dir(reference.name())?.join(version_dir_name(version));
        let manifest = ArtifactManifest::read(&version_dir)?;
        let path = version_dir.join(&manifest.file_name);

        debug!(version, path = %path.display(), "artifact resolved");
        Ok(path)
    }

    #[instrument(
        name = "local_tracker_publish",
        skip(self, request),
        fields(artifact = %request.name, artifact_type = %request.artifact_type)
    )]
    async fn publish(&self, request: PublishRequest) -> Result<ArtifactHandle, ContractError> {
        let name_dir = self.name_dir(&request.name)?;
        let meta = fs::metadata(&request.local_path)
            .map_err(|e| ContractError::upload(&request.name, e.to_string()))?;
        if !meta.is_file() {
            return Err(ContractError::upload(
                &request.name,
                format!("{} is not a regular file", request.local_path.display()),
            ));
        }
        fs::create_dir_all(&name_dir)?;

        let version = self.reserve_version(&request.name, &name_dir)?;
        let file_name = request
            .local_path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| request.name.clone());

        let manifest = ArtifactManifest {
            name: request.name.clone(),
            version,
            artifact_type: request.artifact_type,
            description: request.description,
            file_name,
            size_bytes: meta.len(),
            created_at: Utc::now(),
        };
        let handle = manifest.handle();

        let (ack_tx, ack_rx) = oneshot::channel();
        // queue order and worker order must match
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        self.uploads
            .send(UploadJob {
                manifest,
                source: request.local_path,
                name_dir,
                ack: ack_tx,
            })
            .map_err(|_| ContractError::upload(&handle.name, "upload worker stopped"))?;
        pending.push_back(PendingAck {
            name: handle.name.clone(),
            version,
            ack: ack_rx,
        });
        drop(pending);

        info!(version, "upload queued");
        Ok(handle)
    }

    #[instrument(
        name = "local_tracker_await_durable",
        skip(self, handle),
        fields(artifact = %handle.name, version = handle.version)
    )]
    async fn await_durable(&self, handle: &ArtifactHandle) -> Result<(), ContractError> {
        let prefix: Vec<PendingAck> = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            match pending
                .iter()
                .position(|p| p.name == handle.name && p.version == handle.version)
            {
                Some(pos) => pending.drain(..=pos).collect(),
                None => Vec::new(),
            }
        };

        if prefix.is_empty() {
            let committed = self
                .name_dir(&handle.name)?
                .join(version_dir_name(handle.version));
            return if committed.is_dir() {
                Ok(())
            } else {
                Err(ContractError::upload(
                    &handle.name,
                    format!("no upload known for v{}", handle.version),
                ))
            };
        }

        let mut first_error = None;
        for PendingAck { name, version, ack } in prefix {
            let result = match ack.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(message)) => Err(ContractError::upload(
                    format!("{name}:v{version}"),
                    message,
                )),
                Err(_) => Err(ContractError::upload(
                    format!("{name}:v{version}"),
                    "upload worker stopped before acknowledging",
                )),
            };
            if let Err(e) = result {
                warn!(artifact = %name, version, error = %e, "queued upload not durable");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                debug!("upload durable");
                Ok(())
            }
        }
    }
}

/// Commits uploads one at a time, in the order they were queued
async fn upload_worker(mut rx: mpsc::UnboundedReceiver<UploadJob>, alias_lock: Arc<Mutex<()>>) {
    while let Some(job) = rx.recv().await {
        let UploadJob {
            manifest,
            source,
            name_dir,
            ack,
        } = job;
        let name = manifest.name.clone();
        let version = manifest.version;
        let lock = Arc::clone(&alias_lock);

        let result = tokio::task::spawn_blocking(move || {
            commit_version(&manifest, &source, &name_dir, &lock)
        })
        .await
        .map_err(|e| format!("upload task panicked: {e}"))
        .and_then(|r| r.map_err(|e| e.to_string()));

        if let Err(ref message) = result {
            warn!(artifact = %name, version, error = %message, "upload failed");
        } else {
            debug!(artifact = %name, version, "upload committed");
        }

        // Receiver may already be gone if nobody waits for this upload.
        let _ = ack.send(result);
    }
}

fn commit_version(
    manifest: &ArtifactManifest,
    source: &Path,
    name_dir: &Path,
    alias_lock: &Mutex<()>,
) -> Result<(), ContractError> {
    let final_dir = name_dir.join(version_dir_name(manifest.version));
    let staging = name_dir.join(format!("{}.partial", version_dir_name(manifest.version)));
    if final_dir.exists() {
        return Err(ContractError::upload(
            &manifest.name,
            format!("version v{} already committed", manifest.version),
        ));
    }
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;

    let data = fs::read(source)
        .map_err(|e| ContractError::upload(&manifest.name, format!("{}: {e}", source.display())))?;
    write_synced(&staging.join(&manifest.file_name), &data)?;
    let mut manifest = manifest.clone();
    manifest.size_bytes = data.len() as u64;
    manifest.write(&staging)?;
    fs::rename(&staging, &final_dir)?;

    let _guard = alias_lock.lock().unwrap_or_else(|e| e.into_inner());
    let mut aliases = read_aliases(name_dir)?;
    let newer = aliases.get(LATEST).map_or(true, |v| *v < manifest.version);
    if newer {
        aliases.insert(LATEST.to_string(), manifest.version);
        write_aliases(name_dir, &aliases)?;
    }
    Ok(())
}

fn version_dir_name(version: u32) -> String {
    format!("v{version}")
}

fn parse_version_dir(name: &str) -> Option<u32> {
    name.strip_prefix('v')?.parse().ok()
}

/// First version number not used by a committed or staged directory
fn scan_next_version(name_dir: &Path) -> Result<u32, ContractError> {
    if !name_dir.exists() {
        return Ok(0);
    }
    let mut next = 0;
    for entry in fs::read_dir(name_dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        let stem = file_name.strip_suffix(".partial").unwrap_or(&file_name);
        if let Some(v) = parse_version_dir(stem) {
            next = next.max(v + 1);
        }
    }
    Ok(next)
}
