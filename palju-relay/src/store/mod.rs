/**
 * SAMPLE STORE - Interface de persistance des échantillons de télémétrie
 *
 * RÔLE :
 * Le relais ne parle au stockage qu'à travers le trait `SampleStore`.
 * Append-only : un échantillon écrit n'est jamais modifié ni supprimé.
 *
 * FONCTIONNEMENT :
 * - StoredSample = échantillon + tenue de livre du stockage (id, date d'écriture)
 * - SampleIndex = vecteur trié par timestamp partagé par les implémentations
 * - JsonLinesStore = un enregistrement JSON par ligne, rechargé au démarrage
 * - MemoryStore = même contrat sans disque (tests uniquement)
 *
 * La tenue de livre (id, stored_at) ne sort jamais du service de requêtes :
 * voir `StoredSample::into_sample`.
 */

mod jsonl;
#[cfg(test)]
mod memory;

pub use jsonl::JsonLinesStore;
#[cfg(test)]
pub use memory::MemoryStore;

use crate::models::Sample;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Erreurs possibles lors des opérations sur le stockage
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Enregistrement tel que conservé par le stockage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSample {
    /// Identifiant interne de l'enregistrement
    pub id: Uuid,
    /// Date d'écriture côté stockage
    #[serde(with = "time::serde::rfc3339")]
    pub stored_at: OffsetDateTime,
    #[serde(flatten)]
    pub sample: Sample,
}

impl StoredSample {
    pub fn new(sample: Sample) -> Self {
        Self {
            id: Uuid::new_v4(),
            stored_at: OffsetDateTime::now_utc(),
            sample,
        }
    }

    /// Retire la tenue de livre : seul le modèle `Sample` traverse la frontière
    pub fn into_sample(self) -> Sample {
        self.sample
    }
}

/// Contrat consommé par le relais et le service de requêtes.
/// Tous les résultats sont triés par timestamp croissant.
pub trait SampleStore: Send + Sync {
    /// Persiste un échantillon
    fn append(&self, sample: &Sample) -> Result<(), StoreError>;

    /// Historique complet
    fn scan_all(&self) -> Result<Vec<StoredSample>, StoreError>;

    /// `after <= timestamp <= before`, bornes incluses
    fn scan_range(&self, after: i64, before: i64) -> Result<Vec<StoredSample>, StoreError>;

    /// Les `n` échantillons les plus récents
    fn scan_recent_limit(&self, n: usize) -> Result<Vec<StoredSample>, StoreError>;

    /// `timestamp >= since`
    fn scan_since(&self, since: i64) -> Result<Vec<StoredSample>, StoreError>;

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.scan_all()?.len())
    }
}

/// Index mémoire trié par timestamp ; à timestamp égal, l'ordre d'insertion est gardé
#[derive(Debug, Default)]
pub(crate) struct SampleIndex {
    records: Vec<StoredSample>,
}

impl SampleIndex {
    pub(crate) fn insert(&mut self, record: StoredSample) {
        let ts = record.sample.timestamp;
        let pos = self.records.partition_point(|r| r.sample.timestamp <= ts);
        self.records.insert(pos, record);
    }

    pub(crate) fn all(&self) -> Vec<StoredSample> {
        self.records.clone()
    }

    pub(crate) fn range(&self, after: i64, before: i64) -> Vec<StoredSample> {
        let lo = self.records.partition_point(|r| r.sample.timestamp < after);
        let hi = self.records.partition_point(|r| r.sample.timestamp <= before);
        if lo >= hi {
            return Vec::new();
        }
        self.records[lo..hi].to_vec()
    }

    pub(crate) fn recent(&self, n: usize) -> Vec<StoredSample> {
        let start = self.records.len().saturating_sub(n);
        self.records[start..].to_vec()
    }

    pub(crate) fn since(&self, since: i64) -> Vec<StoredSample> {
        let lo = self.records.partition_point(|r| r.sample.timestamp < since);
        self.records[lo..].to_vec()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
pub(crate) fn sample_at(timestamp: i64) -> Sample {
    Sample {
        temp_low: 30.0,
        temp_high: 32.0,
        temp_ambient: 4.0,
        warming_phase: "ON".into(),
        target: 38.0,
        low_limit: 35.0,
        timestamp,
        estimation: crate::models::estimate_ready_at(38.0, 32.0, timestamp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(timestamps: &[i64]) -> SampleIndex {
        let mut index = SampleIndex::default();
        for ts in timestamps {
            index.insert(StoredSample::new(sample_at(*ts)));
        }
        index
    }

    fn stamps(records: &[StoredSample]) -> Vec<i64> {
        records.iter().map(|r| r.sample.timestamp).collect()
    }

    #[test]
    fn test_insert_keeps_timestamp_order() {
        let index = index_of(&[50, 10, 40, 20, 30]);
        assert_eq!(stamps(&index.all()), vec![10, 20, 30, 40, 50]);
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let index = index_of(&[10, 20, 30, 40, 50]);
        assert_eq!(stamps(&index.range(20, 40)), vec![20, 30, 40]);
        assert_eq!(stamps(&index.range(21, 39)), vec![30]);
        assert!(index.range(40, 20).is_empty());
        assert!(index.range(60, 70).is_empty());
    }

    #[test]
    fn test_recent_and_since() {
        let index = index_of(&[10, 20, 30, 40, 50]);
        assert_eq!(stamps(&index.recent(2)), vec![40, 50]);
        assert_eq!(stamps(&index.recent(10)), vec![10, 20, 30, 40, 50]);
        assert!(index.recent(0).is_empty());
        assert_eq!(stamps(&index.since(30)), vec![30, 40, 50]);
        assert!(index.since(51).is_empty());
    }

    #[test]
    fn test_stored_sample_strips_bookkeeping() {
        let record = StoredSample::new(sample_at(7));
        let line = serde_json::to_value(&record).unwrap();
        assert!(line.get("id").is_some());
        assert!(line.get("stored_at").is_some());

        let public = serde_json::to_value(record.into_sample()).unwrap();
        assert!(public.get("id").is_none());
        assert!(public.get("stored_at").is_none());
        assert_eq!(public["timestamp"], 7);
    }
}
