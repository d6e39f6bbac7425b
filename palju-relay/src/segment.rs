/**
 * SEGMENTATION - Reconstruction des épisodes de chauffe
 *
 * Passe unique sur des timestamps croissants :
 * - un écart strictement supérieur à `gap_secs` ouvre une nouvelle session
 * - une session de `min_points` points ou moins est du bruit (données de test)
 * - la dernière session ouverte est fermée en fin d'entrée
 *
 * Seuls début, fin et nombre de points de la session courante sont gardés.
 */

use crate::models::Session;

/// Seuils de découpage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Écart maximal entre deux points d'une même session (6 h)
    pub gap_secs: i64,
    /// Une session doit compter strictement plus de points que ça pour être gardée
    pub min_points: usize,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            gap_secs: 6 * 60 * 60,
            min_points: 100,
        }
    }
}

struct OpenRun {
    start: i64,
    last: i64,
    count: usize,
}

impl OpenRun {
    fn new(ts: i64) -> Self {
        Self { start: ts, last: ts, count: 1 }
    }

    fn accepts(&self, ts: i64, policy: &SessionPolicy) -> bool {
        ts <= self.last.saturating_add(policy.gap_secs)
    }

    fn push(&mut self, ts: i64) {
        self.last = ts;
        self.count += 1;
    }

    fn close_into(self, sessions: &mut Vec<Session>, policy: &SessionPolicy) {
        if self.count > policy.min_points {
            sessions.push(Session { start: self.start, end: self.last });
        }
    }
}

/// Découpe une suite croissante de timestamps en sessions `{start, end}`
pub fn segment<I>(timestamps: I, policy: &SessionPolicy) -> Vec<Session>
where
    I: IntoIterator<Item = i64>,
{
    let mut sessions = Vec::new();
    let mut current: Option<OpenRun> = None;

    for ts in timestamps {
        if let Some(run) = current.as_mut() {
            if run.accepts(ts, policy) {
                run.push(ts);
                continue;
            }
        }
        if let Some(run) = current.replace(OpenRun::new(ts)) {
            run.close_into(&mut sessions, policy);
        }
    }

    if let Some(run) = current {
        run.close_into(&mut sessions, policy);
    }
    sessions
}
