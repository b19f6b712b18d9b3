//! Mock tracking service
//!
//! 用于单元测试的 mock 实现，支持注入失败场景。
//! Uploads are lazy: `publish` only records the local path and the file is
//! read when durability is awaited, the same way a real asynchronous upload
//! would still need the file after `publish` returns.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;

use bytes::Bytes;
use contracts::{
    ArtifactHandle, ArtifactRef, ArtifactVersion, ContractError, PublishRequest, TrackingService,
    LATEST,
};
use tempfile::TempDir;
use tracing::instrument;

/// Mock 配置
#[derive(Debug, Default, Clone)]
pub struct MockConfig {
    /// 解析时应该失败的 artifact names
    pub fail_resolve: Vec<String>,
    /// 发布时应该失败的 artifact names
    pub fail_publish: Vec<String>,
    /// 确认持久化时应该失败的 artifact names
    pub fail_durable: Vec<String>,
}

/// Observable tracker activity, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    Resolved { reference: String },
    Published { name: String, version: u32 },
    Durable { name: String, version: u32 },
}

#[derive(Debug, Clone)]
struct StoredVersion {
    artifact_type: String,
    description: String,
    content: Bytes,
}

struct PendingUpload {
    handle: ArtifactHandle,
    description: String,
    local_path: PathBuf,
}

#[derive(Default)]
struct MockState {
    /// name -> committed versions, keyed by version number
    artifacts: HashMap<String, BTreeMap<u32, StoredVersion>>,
    /// (name, alias) -> version
    aliases: HashMap<(String, String), u32>,
    /// Reserved but not yet durable, FIFO
    pending: Vec<PendingUpload>,
    reserved: HashMap<String, u32>,
    events: Vec<TrackerEvent>,
}

/// Mock tracking service
pub struct MockTracker {
    /// 配置（可注入失败场景）
    config: MockConfig,
    state: Mutex<MockState>,
    /// Where resolved artifacts are materialized
    downloads: TempDir,
}

impl MockTracker {
    /// 创建默认 mock
    pub fn new() -> Result<Self, ContractError> {
        Self::with_config(MockConfig::default())
    }

    /// 使用配置创建 mock
    pub fn with_config(config: MockConfig) -> Result<Self, ContractError> {
        Ok(Self {
            config,
            state: Mutex::new(MockState::default()),
            downloads: tempfile::Builder::new()
                .prefix("mock-tracker-")
                .tempdir()?,
        })
    }

    /// Store a committed version directly, moving `latest`
    pub fn seed(&self, name: &str, artifact_type: &str, content: impl Into<Bytes>) -> u32 {
        let mut state = self.state.lock().unwrap();
        let version = reserve(&mut state, name);
        commit(
            &mut state,
            name,
            version,
            StoredVersion {
                artifact_type: artifact_type.to_string(),
                description: "seeded".to_string(),
                content: content.into(),
            },
        );
        version
    }

    /// Point `alias` at `version`
    pub fn set_alias(&self, name: &str, alias: &str, version: u32) {
        self.state
            .lock()
            .unwrap()
            .aliases
            .insert((name.to_string(), alias.to_string()), version);
    }

    /// Content of a committed version
    pub fn content(&self, name: &str, version: u32) -> Option<Bytes> {
        let state = self.state.lock().unwrap();
        state
            .artifacts
            .get(name)
            .and_then(|versions| versions.get(&version))
            .map(|v| v.content.clone())
    }

    /// Content `latest` points at
    pub fn latest_content(&self, name: &str) -> Option<Bytes> {
        let version = *self
            .state
            .lock()
            .unwrap()
            .aliases
            .get(&(name.to_string(), LATEST.to_string()))?;
        self.content(name, version)
    }

    /// (type, description) of a committed version
    pub fn metadata(&self, name: &str, version: u32) -> Option<(String, String)> {
        let state = self.state.lock().unwrap();
        state
            .artifacts
            .get(name)
            .and_then(|versions| versions.get(&version))
            .map(|v| (v.artifact_type.clone(), v.description.clone()))
    }

    /// Number of committed versions of `name`
    pub fn version_count(&self, name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .artifacts
            .get(name)
            .map_or(0, BTreeMap::len)
    }

    /// Uploads published but not yet durable
    pub fn pending_count(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    /// Recorded events, in order
    pub fn events(&self) -> Vec<TrackerEvent> {
        self.state.lock().unwrap().events.clone()
    }
}

/// Next unused version number of `name`
fn reserve(state: &mut MockState, name: &str) -> u32 {
    let committed = state
        .artifacts
        .get(name)
        .and_then(|versions| versions.keys().next_back())
        .map_or(0, |v| v + 1);
    let next = state.reserved.get(name).copied().unwrap_or(0).max(committed);
    state.reserved.insert(name.to_string(), next + 1);
    next
}

/// Store `stored` as `version`, moving `latest` forward only
fn commit(state: &mut MockState, name: &str, version: u32, stored: StoredVersion) {
    state
        .artifacts
        .entry(name.to_string())
        .or_default()
        .insert(version, stored);
    let latest = state
        .aliases
        .entry((name.to_string(), LATEST.to_string()))
        .or_insert(version);
    *latest = (*latest).max(version);
}

impl TrackingService for MockTracker {
    #[instrument(name = "mock_tracker_resolve", skip(self), fields(reference = %reference))]
    async fn resolve(&self, reference: &ArtifactRef) -> Result<PathBuf, ContractError> {
        let qualified = reference.qualified().to_string();
        if self.config.fail_resolve.iter().any(|n| n == reference.name()) {
            return Err(ContractError::resolution(qualified, "injected resolve failure"));
        }

        let mut state = self.state.lock().unwrap();
        let version = match reference.version() {
            ArtifactVersion::Number(n) => *n,
            ArtifactVersion::Alias(alias) => *state
                .aliases
                .get(&(reference.name().to_string(), alias.clone()))
                .ok_or_else(|| ContractError::resolution(&qualified, "unknown alias"))?,
        };
        let content = state
            .artifacts
            .get(reference.name())
            .and_then(|versions| versions.get(&version))
            .map(|v| v.content.clone())
            .ok_or_else(|| ContractError::resolution(&qualified, "no such artifact version"))?;

        let dir = self
            .downloads
            .path()
            .join(format!("{}-v{version}", reference.name()));
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(reference.name());
        std::fs::write(&path, &content)?;

        state.events.push(TrackerEvent::Resolved {
            reference: qualified,
        });
        Ok(path)
    }

    #[instrument(name = "mock_tracker_publish", skip(self, request), fields(artifact = %request.name))]
    async fn publish(&self, request: PublishRequest) -> Result<ArtifactHandle, ContractError> {
        if self.config.fail_publish.contains(&request.name) {
            return Err(ContractError::upload(&request.name, "injected publish failure"));
        }

        let mut state = self.state.lock().unwrap();
        let next = reserve(&mut state, &request.name);

        let handle = ArtifactHandle {
            name: request.name.clone(),
            artifact_type: request.artifact_type,
            version: next,
        };
        state.pending.push(PendingUpload {
            handle: handle.clone(),
            description: request.description,
            local_path: request.local_path,
        });
        state.events.push(TrackerEvent::Published {
            name: handle.name.clone(),
            version: next,
        });
        Ok(handle)
    }

    /// Flushes every pending upload up to and including `handle`, in order
    ///
    /// The whole prefix is processed; the first failure is returned.
    #[instrument(name = "mock_tracker_await_durable", skip(self), fields(artifact = %handle.name))]
    async fn await_durable(&self, handle: &ArtifactHandle) -> Result<(), ContractError> {
        let mut state = self.state.lock().unwrap();
        let Some(pos) = state.pending.iter().position(|p| &p.handle == handle) else {
            let committed = state
                .artifacts
                .get(&handle.name)
                .is_some_and(|v| v.contains_key(&handle.version));
            return if committed {
                Ok(())
            } else {
                Err(ContractError::upload(&handle.name, "unknown upload"))
            };
        };

        let flushed: Vec<PendingUpload> = state.pending.drain(..=pos).collect();
        let mut first_error = None;
        for upload in flushed {
            let name = upload.handle.name.clone();
            let version = upload.handle.version;
            let content = if self.config.fail_durable.contains(&name) {
                Err(ContractError::upload(&name, "injected durability failure"))
            } else {
                std::fs::read(&upload.local_path).map_err(|e| {
                    ContractError::upload(
                        &name,
                        format!("{} vanished before upload: {e}", upload.local_path.display()),
                    )
                })
            };
            match content {
                Ok(content) => {
                    commit(
                        &mut state,
                        &name,
                        version,
                        StoredVersion {
                            artifact_type: upload.handle.artifact_type.clone(),
                            description: upload.description,
                            content: Bytes::from(content),
                        },
                    );
                    state.events.push(TrackerEvent::Durable { name, version });
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
