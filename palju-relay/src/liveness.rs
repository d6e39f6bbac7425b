/**
 * LIVENESS SUPERVISOR - Détection des connexions mortes
 *
 * À chaque tick (10 s par défaut), pour chaque connexion :
 * - alive == false : la sonde précédente est restée sans pong, on évince
 * - sinon : alive = false puis ping ; le pong remettra alive à true
 *
 * Une connexion morte part donc en deux périodes au plus, jamais à la
 * première sonde manquée. Un ping impossible à envoyer évince tout de suite.
 * Aucune erreur de connexion n'arrête la boucle.
 */

use crate::error::RelayError;
use crate::registry::{ConnectionId, ConnectionRegistry, Outbound};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub probed: usize,
    pub evicted: Vec<ConnectionId>,
}

pub struct LivenessSupervisor {
    registry: ConnectionRegistry,
    period: Duration,
}

impl LivenessSupervisor {
    pub fn new(registry: ConnectionRegistry, period: Duration) -> Self {
        Self { registry, period }
    }

    /// Un tick du détecteur
    pub fn sweep(&self) -> SweepReport {
        let mut ids = Vec::new();
        self.registry.for_each_open(|view| ids.push(view.id));

        let mut report = SweepReport::default();
        for id in ids {
            match self.registry.mark_probed(id) {
                Ok(true) => match self.registry.send(id, Outbound::Ping) {
                    Ok(()) => report.probed += 1,
                    Err(e) => self.evict(id, e, &mut report),
                },
                Ok(false) => self.evict(id, RelayError::ProbeTimeout(id), &mut report),
                // fermée entre l'instantané et la sonde
                Err(_) => {}
            }
        }
        report
    }

    fn evict(&self, id: ConnectionId, reason: RelayError, report: &mut SweepReport) {
        log::warn!("[liveness] evicting {}: {}", id, reason);
        if self.registry.unregister(id).is_ok() {
            report.evicted.push(id);
        }
    }

    /// Lance la boucle périodique ; premier tick après une période complète
    pub fn spawn(self) -> JoinHandle<()> {
        log::info!("[liveness] probing connections every {:?}", self.period);

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.period, self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let report = self.sweep();
                if !report.evicted.is_empty() {
                    log::info!(
                        "[liveness] probed {}, evicted {} (remaining: {})",
                        report.probed,
                        report.evicted.len(),
                        self.registry.len()
                    );
                }
            }
        })
    }
}
