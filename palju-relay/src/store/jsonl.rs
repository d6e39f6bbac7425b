/**
 * STOCKAGE JSON LINES - Journal append-only des échantillons
 *
 * FONCTIONNEMENT :
 * - Un enregistrement `StoredSample` par ligne, écrit en mode append
 * - Au démarrage, tout le fichier est relu dans un `SampleIndex` trié
 * - Les lectures ne touchent que l'index mémoire
 * - Une ligne corrompue (écriture interrompue) est ignorée avec un warning
 * - Avant chaque append, une dernière ligne sans `\n` est terminée : le
 *   nouvel enregistrement ne se colle jamais à un reste corrompu
 * - Un append qui échoue en cours d'écriture est tronqué à la taille d'avant
 */

use super::{SampleIndex, SampleStore, StoreError, StoredSample};
use crate::models::Sample;
use parking_lot::{Mutex, RwLock};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub struct JsonLinesStore {
    path: PathBuf,
    /// Handle lecture + append ; le verrou sérialise les appends
    writer: Mutex<File>,
    index: RwLock<SampleIndex>,
}

impl JsonLinesStore {
    /// Ouvre (ou crée) le journal et recharge l'historique
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let index = Self::load(&path)?;
        let writer = OpenOptions::new().create(true).read(true).append(true).open(&path)?;

        log::info!("[store] opened {:?} with {} samples", path, index.len());
        Ok(Self {
            path,
            writer: Mutex::new(writer),
            index: RwLock::new(index),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<SampleIndex, StoreError> {
        let mut index = SampleIndex::default();
        if !path.exists() {
            return Ok(index);
        }

        let reader = BufReader::new(File::open(path)?);
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StoredSample>(&line) {
                Ok(record) => index.insert(record),
                Err(e) => log::warn!("[store] skipping corrupt line {} in {:?}: {}", lineno + 1, path, e),
            }
        }
        Ok(index)
    }
}

impl SampleStore for JsonLinesStore {
    fn append(&self, sample: &Sample) -> Result<(), StoreError> {
        let record = StoredSample::new(sample.clone());
        let line = serde_json::to_string(&record)?;

        {
            let mut writer = self.writer.lock();
            let len = writer.metadata()?.len();

            let mut bytes = Vec::with_capacity(line.len() + 2);
            if ends_mid_line(&mut writer, len)? {
                bytes.push(b'\n');
            }
            bytes.extend_from_slice(line.as_bytes());
            bytes.push(b'\n');

            if let Err(e) = write_through(&mut writer, &bytes) {
                if let Err(trunc) = writer.set_len(len) {
                    log::error!("[store] could not roll back partial write in {:?}: {}", self.path, trunc);
                }
                return Err(e.into());
            }
        }

        self.index.write().insert(record);
        Ok(())
    }

    fn scan_all(&self) -> Result<Vec<StoredSample>, StoreError> {
        Ok(self.index.read().all())
    }

    fn scan_range(&self, after: i64, before: i64) -> Result<Vec<StoredSample>, StoreError> {
        Ok(self.index.read().range(after, before))
    }

    fn scan_recent_limit(&self, n: usize) -> Result<Vec<StoredSample>, StoreError> {
        Ok(self.index.read().recent(n))
    }

    fn scan_since(&self, since: i64) -> Result<Vec<StoredSample>, StoreError> {
        Ok(self.index.read().since(since))
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.index.read().len())
    }
}

/// Le fichier se termine par une ligne inachevée
fn ends_mid_line(file: &mut File, len: u64) -> std::io::Result<bool> {
    if len == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

fn write_through(file: &mut File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes)?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::sample_at;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_parent_dir_and_empty_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("palju.jsonl");

        let store = JsonLinesStore::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.len().unwrap(), 0);
        assert!(store.scan_all().unwrap().is_empty());
    }

    #[test]
    fn test_samples_survive_reopen_in_timestamp_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("palju.jsonl");

        {
            let store = JsonLinesStore::open(&path).unwrap();
            for ts in [300, 100, 200] {
                store.append(&sample_at(ts)).unwrap();
            }
        }

        let store = JsonLinesStore::open(&path).unwrap();
        let stamps: Vec<i64> = store.scan_all().unwrap().iter().map(|r| r.sample.timestamp).collect();
        assert_eq!(stamps, vec![100, 200, 300]);
        assert_eq!(store.scan_all().unwrap()[0].sample, sample_at(100));
    }

    #[test]
    fn test_corrupt_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("palju.jsonl");

        {
            let store = JsonLinesStore::open(&path).unwrap();
            store.append(&sample_at(10)).unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{\"id\": truncated").unwrap();
        writeln!(file).unwrap();
        drop(file);

        let store = JsonLinesStore::open(&path).unwrap();
        assert_eq!(store.len().unwrap(), 1);

        store.append(&sample_at(20)).unwrap();
        assert_eq!(store.scan_since(15).unwrap().len(), 1);
    }

    #[test]
    fn test_each_record_gets_its_own_id() {
        let dir = TempDir::new().unwrap();
        let store = JsonLinesStore::open(dir.path().join("palju.jsonl")).unwrap();
        store.append(&sample_at(1)).unwrap();
        store.append(&sample_at(1)).unwrap();

        let records = store.scan_range(1, 1).unwrap();
        assert_eq!(records.len(), 2);
        assert_ne!(records[0].id, records[1].id);
    }

    #[test]
    fn test_append_after_unfinished_line_keeps_new_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("palju.jsonl");
        let store = JsonLinesStore::open(&path).unwrap();
        store.append(&sample_at(10)).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, "{{\"id\":\"trunc").unwrap();
        drop(file);

        store.append(&sample_at(20)).unwrap();
        assert_eq!(store.len().unwrap(), 2);
        drop(store);

        let reopened = JsonLinesStore::open(&path).unwrap();
        let stamps: Vec<i64> = reopened.scan_all().unwrap().iter().map(|r| r.sample.timestamp).collect();
        assert_eq!(stamps, vec![10, 20]);

        reopened.append(&sample_at(30)).unwrap();
        let lines = std::fs::read_to_string(&path).unwrap();
        assert!(lines.ends_with("}\n"));
        assert_eq!(lines.lines().count(), 4);
    }
}
