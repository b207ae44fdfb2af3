//! Recorded session files
//!
//! A session file is a provider's raw response for a whole session, saved
//! so a replay can be repeated without the original source. Three
//! encodings are supported, picked by file extension:
//!
//! - `.json`: plain JSON, handy for hand-made fixtures
//! - `.json.zst`: zstd-compressed JSON
//! - `.lrs`: zstd-compressed MessagePack, the compact default
//!
//! Saved sessions are also the cache: [`SessionCache`] keeps them under the
//! platform cache directory, keyed by name.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use lr_core::model::{EntityId, LapRun, ReplayMode};
use lr_core::provider::TelemetryProvider;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFormat {
    Json,
    JsonZstd,
    MessagePackZstd,
}

impl SessionFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        if name.ends_with(".json.zst") {
            Ok(SessionFormat::JsonZstd)
        } else if name.ends_with(".json") {
            Ok(SessionFormat::Json)
        } else if name.ends_with(".lrs") {
            Ok(SessionFormat::MessagePackZstd)
        } else {
            bail!(
                "Unsupported session file '{}' (expected .json, .json.zst or .lrs)",
                path.display()
            )
        }
    }
}

/// Raw telemetry of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    #[serde(default)]
    pub team: Option<String>,
    /// Lap number of the entity's fastest lap, if known
    #[serde(default)]
    pub fastest_lap: Option<u32>,
    #[serde(default)]
    pub laps: Vec<LapRun>,
}

/// A whole recorded session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionFile {
    pub name: String,
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
    pub entities: Vec<EntityRecord>,
}

impl SessionFile {
    pub fn load(path: &Path) -> Result<Self> {
        let format = SessionFormat::from_path(path)?;
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read session file {}", path.display()))?;
        Self::from_bytes(&bytes, format)
            .with_context(|| format!("Failed to decode session file {}", path.display()))
    }

    pub fn from_bytes(bytes: &[u8], format: SessionFormat) -> Result<Self> {
        let session = match format {
            SessionFormat::Json => serde_json::from_slice(bytes)?,
            SessionFormat::JsonZstd => {
                let raw = zstd::decode_all(bytes).context("zstd decompression failed")?;
                serde_json::from_slice(&raw)?
            }
            SessionFormat::MessagePackZstd => {
                let raw = zstd::decode_all(bytes).context("zstd decompression failed")?;
                rmp_serde::from_slice(&raw)?
            }
        };
        Ok(session)
    }

    pub fn to_bytes(&self, format: SessionFormat) -> Result<Vec<u8>> {
        let bytes = match format {
            SessionFormat::Json => serde_json::to_vec_pretty(self)?,
            SessionFormat::JsonZstd => {
                zstd::encode_all(serde_json::to_vec(self)?.as_slice(), ZSTD_LEVEL)?
            }
            SessionFormat::MessagePackZstd => {
                zstd::encode_all(rmp_serde::to_vec_named(self)?.as_slice(), ZSTD_LEVEL)?
            }
        };
        Ok(bytes)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let format = SessionFormat::from_path(path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, self.to_bytes(format)?)
            .with_context(|| format!("Failed to write session file {}", path.display()))?;
        info!("Saved session '{}' to {}", self.name, path.display());
        Ok(())
    }

    /// Capture a provider's full-session response for the given entities.
    ///
    /// Entities the provider has no data for, or fails to fetch, are kept
    /// with no laps, so the recorded session replays exactly like the live
    /// one.
    pub fn record(
        provider: &dyn TelemetryProvider,
        entities: &[EntityId],
        name: impl Into<String>,
    ) -> Result<Self> {
        let mut records = Vec::with_capacity(entities.len());

        for id in entities {
            let laps = match provider.fetch_samples(id, ReplayMode::FullSession) {
                Ok(laps) => laps.unwrap_or_default(),
                Err(e) => {
                    warn!("Failed to record {} from {}: {:#}", id, provider.name(), e);
                    Vec::new()
                }
            };

            let fastest_lap = if laps.is_empty() {
                None
            } else {
                match provider.fetch_samples(id, ReplayMode::FastestLap) {
                    Ok(Some(runs)) if runs.len() == 1 => Some(runs[0].lap_number),
                    Ok(_) => None,
                    Err(e) => {
                        warn!("No fastest lap for {}: {:#}", id, e);
                        None
                    }
                }
            };

            records.push(EntityRecord {
                id: id.clone(),
                team: provider.team(id),
                fastest_lap,
                laps,
            });
        }

        Ok(SessionFile {
            name: name.into(),
            recorded_at: Some(Utc::now()),
            entities: records,
        })
    }

    pub fn entity(&self, id: &str) -> Option<&EntityRecord> {
        self.entities.iter().find(|e| e.id == id)
    }
}

/// Serves telemetry out of a loaded [`SessionFile`]
pub struct SessionFileProvider {
    session: SessionFile,
}

impl SessionFileProvider {
    pub fn new(session: SessionFile) -> Self {
        Self { session }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(SessionFile::load(path)?))
    }

    pub fn session(&self) -> &SessionFile {
        &self.session
    }
}

impl TelemetryProvider for SessionFileProvider {
    fn name(&self) -> &str {
        &self.session.name
    }

    fn entities(&self) -> Vec<EntityId> {
        self.session.entities.iter().map(|e| e.id.clone()).collect()
    }

    fn team(&self, entity: &str) -> Option<String> {
        self.session.entity(entity).and_then(|e| e.team.clone())
    }

    fn fetch_samples(&self, entity: &str, mode: ReplayMode) -> Result<Option<Vec<LapRun>>> {
        let record = match self.session.entity(entity) {
            Some(record) if !record.laps.is_empty() => record,
            _ => return Ok(None),
        };

        let runs = match (mode, record.fastest_lap) {
            (ReplayMode::FastestLap, Some(lap)) => {
                match record.laps.iter().find(|run| run.lap_number == lap) {
                    Some(run) => vec![run.clone()],
                    // Stale fastest-lap marker: let the normalizer pick
                    None => record.laps.clone(),
                }
            }
            _ => record.laps.clone(),
        };

        Ok(Some(runs))
    }
}

/// Directory of saved sessions, keyed by name
pub struct SessionCache {
    dir: PathBuf,
}

impl SessionCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache under the platform cache directory
    /// (e.g. `~/.cache/lapreplay/sessions` on Linux)
    pub fn platform_default() -> Option<Self> {
        dirs::cache_dir().map(|d| Self::new(d.join("lapreplay").join("sessions")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.lrs", safe))
    }

    /// Load a cached session; `Ok(None)` on a cache miss
    pub fn load(&self, key: &str) -> Result<Option<SessionFile>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        SessionFile::load(&path).map(Some)
    }

    /// Provider over a cached session; a cache miss is an error here
    pub fn provider(&self, key: &str) -> Result<SessionFileProvider> {
        match self.load(key)? {
            Some(session) => Ok(SessionFileProvider::new(session)),
            None => bail!(
                "No cached session '{}' in {}",
                key,
                self.dir.display()
            ),
        }
    }

    pub fn store(&self, key: &str, session: &SessionFile) -> Result<PathBuf> {
        let path = self.path_for(key);
        session.save(&path)?;
        Ok(path)
    }
}
