/**
 * CONNECTION REGISTRY - Catalogue des connexions relais ouvertes
 *
 * RÔLE :
 * Seul propriétaire des connexions. Le routeur et le superviseur de vivacité
 * ne manipulent que des `ConnectionId` opaques.
 *
 * FONCTIONNEMENT :
 * - Chaque entrée = rôle + drapeau alive + file d'envoi vers la tâche de la socket
 * - Map protégée par un Mutex parking_lot, verrou tenu le temps d'une opération
 * - `unregister` retire l'entrée et ferme le transport : la suppression de la map
 *   garantit une fermeture unique même si socket et superviseur se croisent
 * - Toute opération sur un id retiré échoue en `ConnectionClosed`
 */

use crate::error::RelayError;
use crate::models::Role;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Handle opaque d'une connexion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Ce que la tâche de la socket doit écrire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Ping,
    Close,
}

pub type OutboundSender = mpsc::UnboundedSender<Outbound>;

struct ConnectionEntry {
    role: Role,
    alive: bool,
    tx: OutboundSender,
}

/// Vue figée d'une connexion, passée aux itérations
#[derive(Debug, Clone, Copy)]
pub struct ConnectionView {
    pub id: ConnectionId,
    pub role: Role,
    /// La tâche d'écriture tourne encore
    pub writable: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleCounts {
    pub devices: usize,
    pub observers: usize,
}

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<Mutex<HashMap<ConnectionId, ConnectionEntry>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enregistre une connexion ouverte, vivante par défaut
    pub fn register(&self, role: Role, tx: OutboundSender) -> ConnectionId {
        let id = ConnectionId::new();
        let total = {
            let mut connections = self.connections.lock();
            connections.insert(id, ConnectionEntry { role, alive: true, tx });
            connections.len()
        };
        log::info!("[registry] {} connected as {} (total: {})", id, role.as_str(), total);
        id
    }

    /// Retire la connexion et ferme son transport ; un second appel échoue
    pub fn unregister(&self, id: ConnectionId) -> Result<Role, RelayError> {
        let entry = self.connections.lock().remove(&id).ok_or(RelayError::ConnectionClosed(id))?;
        // la tâche socket peut déjà être partie
        let _ = entry.tx.send(Outbound::Close);
        log::info!("[registry] {} ({}) unregistered", id, entry.role.as_str());
        Ok(entry.role)
    }

    /// Parcourt un instantané des connexions ; le verrou est relâché avant les appels
    pub fn for_each_open<F: FnMut(ConnectionView)>(&self, mut f: F) {
        let snapshot: Vec<ConnectionView> = {
            let connections = self.connections.lock();
            connections
                .iter()
                .map(|(id, entry)| ConnectionView {
                    id: *id,
                    role: entry.role,
                    writable: !entry.tx.is_closed(),
                })
                .collect()
        };
        for view in snapshot {
            f(view);
        }
    }

    /// Pong reçu
    pub fn mark_alive(&self, id: ConnectionId) -> Result<(), RelayError> {
        let mut connections = self.connections.lock();
        let entry = connections.get_mut(&id).ok_or(RelayError::ConnectionClosed(id))?;
        entry.alive = true;
        Ok(())
    }

    /// Passe le drapeau à false avant une sonde ; renvoie l'ancienne valeur
    pub fn mark_probed(&self, id: ConnectionId) -> Result<bool, RelayError> {
        let mut connections = self.connections.lock();
        let entry = connections.get_mut(&id).ok_or(RelayError::ConnectionClosed(id))?;
        Ok(std::mem::replace(&mut entry.alive, false))
    }

    /// Met un message dans la file d'envoi de la connexion
    pub fn send(&self, id: ConnectionId, message: Outbound) -> Result<(), RelayError> {
        let tx = {
            let connections = self.connections.lock();
            connections.get(&id).map(|entry| entry.tx.clone()).ok_or(RelayError::ConnectionClosed(id))?
        };
        tx.send(message).map_err(|_| RelayError::ConnectionClosed(id))
    }

    pub fn role_of(&self, id: ConnectionId) -> Option<Role> {
        self.connections.lock().get(&id).map(|entry| entry.role)
    }

    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn role_counts(&self) -> RoleCounts {
        let connections = self.connections.lock();
        let observers = connections.values().filter(|entry| entry.role.is_observer()).count();
        RoleCounts {
            devices: connections.len() - observers,
            observers,
        }
    }

    /// Ferme tout (arrêt du process) ; renvoie le nombre de connexions fermées
    pub fn close_all(&self) -> usize {
        let mut ids = Vec::new();
        self.for_each_open(|view| ids.push(view.id));
        ids.into_iter().filter(|id| self.unregister(*id).is_ok()).count()
    }
}
