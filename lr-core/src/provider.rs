//! Telemetry provider trait and series loading
//!
//! Providers are the only blocking part of a replay: all raw telemetry is
//! fetched once per entity before playback starts.

use crate::model::{EntityId, LapRun, ReplayMode};
use crate::normalize::Normalizer;
use crate::series::SeriesSet;
use anyhow::Result;
use tracing::{info, warn};

/// Source of raw per-entity telemetry
///
/// Each provider is responsible for:
/// - Listing the entities it knows about for the loaded session
/// - Delivering raw lap runs for one entity in the requested mode
pub trait TelemetryProvider: Send + Sync {
    /// Get the name of this provider (e.g., "Demo", "Session file")
    fn name(&self) -> &str;

    /// Entities available in the session, in the provider's preferred order
    fn entities(&self) -> Vec<EntityId>;

    /// Team of an entity, if the provider knows it. Renderers use this for
    /// styling only; the replay core never reads it.
    fn team(&self, _entity: &str) -> Option<String> {
        None
    }

    /// Fetch raw lap runs for one entity
    ///
    /// Returns:
    /// - `Ok(Some(runs))` with the laps to replay. For
    ///   [`ReplayMode::FastestLap`] this is normally a single run.
    /// - `Ok(None)` if the provider has no data for this entity
    /// - `Err(_)` if retrieval failed
    fn fetch_samples(&self, entity: &str, mode: ReplayMode) -> Result<Option<Vec<LapRun>>>;
}

/// Normalized series plus the entities that were left out
#[derive(Debug, Clone, Default)]
pub struct LoadedSeries {
    pub series: SeriesSet,
    pub excluded: Vec<EntityId>,
}

/// Fetch and normalize every requested entity.
///
/// Entities without usable telemetry are excluded rather than failing the
/// load; a provider error for one entity is logged and treated the same way.
pub fn load_series(
    provider: &dyn TelemetryProvider,
    entities: &[EntityId],
    mode: ReplayMode,
    normalizer: &Normalizer,
) -> LoadedSeries {
    let mut loaded = LoadedSeries::default();

    for entity in entities {
        let runs = match provider.fetch_samples(entity, mode) {
            Ok(runs) => runs,
            Err(e) => {
                warn!("Failed to fetch telemetry for {} from {}: {:#}", entity, provider.name(), e);
                None
            }
        };

        match runs.and_then(|runs| normalizer.normalize(&runs, mode)) {
            Some(series) => {
                info!(
                    entity = entity.as_str(),
                    samples = series.len(),
                    laps = series.lap_starts().len(),
                    "Loaded telemetry"
                );
                loaded.series.insert(entity.clone(), series);
            }
            None => {
                info!("No usable telemetry for {}, excluding from replay", entity);
                loaded.excluded.push(entity.clone());
            }
        }
    }

    loaded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaderboard::RankingEngine;
    use crate::model::RawSample;
    use anyhow::bail;

    struct FixedProvider;

    impl TelemetryProvider for FixedProvider {
        fn name(&self) -> &str {
            "Fixed"
        }

        fn entities(&self) -> Vec<EntityId> {
            vec!["AAA".into(), "NONE".into(), "EMPTY".into(), "FAIL".into(), "BBB".into()]
        }

        fn fetch_samples(&self, entity: &str, _mode: ReplayMode) -> Result<Option<Vec<LapRun>>> {
            match entity {
                "AAA" => Ok(Some(vec![LapRun::new(
                    1,
                    vec![RawSample::new(0.0, 0.0, 0.0), RawSample::new(100.0, 0.0, 10.0)],
                )])),
                "BBB" => Ok(Some(vec![LapRun::new(
                    1,
                    vec![RawSample::new(0.0, 0.0, 0.0), RawSample::new(50.0, 0.0, 10.0)],
                )])),
                "EMPTY" => Ok(Some(vec![LapRun::new(1, vec![RawSample::default()])])),
                "FAIL" => bail!("connection reset"),
                _ => Ok(None),
            }
        }
    }

    #[test]
    fn test_entities_without_data_are_excluded() {
        let provider = FixedProvider;
        let loaded = load_series(
            &provider,
            &provider.entities(),
            ReplayMode::FullSession,
            &Normalizer::default(),
        );

        let ids: Vec<&str> = loaded.series.ids().map(String::as_str).collect();
        assert_eq!(ids, vec!["AAA", "BBB"]);
        assert_eq!(loaded.excluded, vec!["NONE", "EMPTY", "FAIL"]);
    }

    #[test]
    fn test_excluded_entities_never_appear_in_snapshots() {
        let provider = FixedProvider;
        let loaded = load_series(
            &provider,
            &provider.entities(),
            ReplayMode::FastestLap,
            &Normalizer::default(),
        );

        let engine = RankingEngine::default();
        for t in [0.0, 5.0, 10.0, 1000.0] {
            let snap = engine.snapshot(&loaded.series, t);
            assert_eq!(snap.len(), 2);
            assert!(snap.get("EMPTY").is_none());
            assert!(snap.get("FAIL").is_none());
        }
    }
}
