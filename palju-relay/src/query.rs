/**
 * QUERY SERVICE - Lecture de l'historique
 *
 * RÔLE : couche mince au-dessus du `SampleStore`, partagée par l'API HTTP
 * (sessions, plages) et par le relais (push à la connexion, backlog).
 * Tout ce qui sort d'ici est un `Sample` nu, sans tenue de livre du stockage.
 */

use crate::models::{Sample, Session};
use crate::segment::{segment, SessionPolicy};
use crate::store::{SampleStore, StoreError, StoredSample};
use std::sync::Arc;

pub struct QueryService {
    store: Arc<dyn SampleStore>,
    policy: SessionPolicy,
}

impl QueryService {
    pub fn new(store: Arc<dyn SampleStore>, policy: SessionPolicy) -> Self {
        Self { store, policy }
    }

    /// Épisodes de chauffe reconstruits sur tout l'historique
    pub fn list_sessions(&self) -> Result<Vec<Session>, StoreError> {
        let records = self.store.scan_all()?;
        Ok(segment(records.iter().map(|r| r.sample.timestamp), &self.policy))
    }

    /// Échantillons avec `after <= timestamp <= before`, sans limite de taille
    pub fn list_samples(&self, after: i64, before: i64) -> Result<Vec<Sample>, StoreError> {
        Ok(strip(self.store.scan_range(after, before)?))
    }

    /// Dernier échantillon strictement plus récent que `now - window_secs`, s'il existe
    pub fn latest_within(&self, now: i64, window_secs: i64) -> Result<Option<Sample>, StoreError> {
        let since = now.saturating_sub(window_secs).saturating_add(1);
        let mut records = self.store.scan_since(since)?;
        Ok(records.pop().map(StoredSample::into_sample))
    }

    /// Les `limit` derniers échantillons, du plus ancien au plus récent
    pub fn backlog(&self, limit: usize) -> Result<Vec<Sample>, StoreError> {
        Ok(strip(self.store.scan_recent_limit(limit)?))
    }

    pub fn stored_count(&self) -> Result<usize, StoreError> {
        self.store.len()
    }
}

fn strip(records: Vec<StoredSample>) -> Vec<Sample> {
    records.into_iter().map(StoredSample::into_sample).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{sample_at, MemoryStore};
    use palju_devkit::timeline::evenly_spaced;

    fn service_with(timestamps: &[i64]) -> QueryService {
        let store = Arc::new(MemoryStore::new());
        for ts in timestamps {
            store.append(&sample_at(*ts)).unwrap();
        }
        QueryService::new(store, SessionPolicy::default())
    }

    #[test]
    fn test_list_samples_is_inclusive_and_ordered() {
        let service = service_with(&[500, 100, 300, 200, 400]);
        let stamps: Vec<i64> = service.list_samples(200, 400).unwrap().iter().map(|s| s.timestamp).collect();
        assert_eq!(stamps, vec![200, 300, 400]);
        assert!(service.list_samples(401, 499).unwrap().is_empty());
    }

    #[test]
    fn test_list_samples_is_idempotent() {
        let service = service_with(&evenly_spaced(1_000, 7, 300));
        let first = service.list_samples(1_100, 2_000).unwrap();
        let second = service.list_samples(1_100, 2_000).unwrap();
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_list_samples_exposes_only_sample_fields() {
        let service = service_with(&[42]);
        let json = serde_json::to_value(service.list_samples(0, 100).unwrap()).unwrap();
        let record = json[0].as_object().unwrap();
        assert!(!record.contains_key("id"));
        assert!(!record.contains_key("stored_at"));
        assert_eq!(record.len(), 8);
    }

    #[test]
    fn test_list_sessions_runs_segmentation() {
        let mut stamps = evenly_spaced(0, 60, 120);
        stamps.extend(evenly_spaced(100_000, 60, 20));
        let service = service_with(&stamps);

        assert_eq!(
            service.list_sessions().unwrap(),
            vec![Session { start: 0, end: 119 * 60 }]
        );
    }

    #[test]
    fn test_latest_within_window() {
        let service = service_with(&[1_000, 4_000, 4_500]);
        assert_eq!(service.latest_within(5_000, 3_600).unwrap().map(|s| s.timestamp), Some(4_500));
        assert_eq!(service.latest_within(9_000, 3_600).unwrap(), None);
        assert_eq!(service_with(&[]).latest_within(9_000, 3_600).unwrap(), None);
    }

    #[test]
    fn test_latest_within_excludes_window_start() {
        assert_eq!(service_with(&[1_400]).latest_within(5_000, 3_600).unwrap(), None);
        assert_eq!(
            service_with(&[1_401]).latest_within(5_000, 3_600).unwrap().map(|s| s.timestamp),
            Some(1_401)
        );
    }

    #[test]
    fn test_backlog_returns_latest_in_ascending_order() {
        let service = service_with(&evenly_spaced(0, 10, 80));
        let backlog = service.backlog(50).unwrap();
        assert_eq!(backlog.len(), 50);
        assert_eq!(backlog.first().unwrap().timestamp, 300);
        assert_eq!(backlog.last().unwrap().timestamp, 790);
        assert_eq!(service.stored_count().unwrap(), 80);
    }
}
