/**
 * RELAY ROUTER - Validation, persistance et diffusion de la télémétrie
 *
 * RÔLE :
 * Traite chaque trame entrante d'une connexion, dans l'ordre d'arrivée.
 *
 * FONCTIONNEMENT :
 * - Trame JSON illisible : MalformedMessage, abandon silencieux
 * - `temp_low` non nul : télémétrie, validée puis horodatée par le serveur
 * - `from` non nul : demande d'historique, réponse au seul demandeur
 * - Autre chose : ignoré
 *
 * RÈGLES DE DIFFUSION :
 * - Un observer n'écrit jamais dans le stockage
 * - Un échantillon part vers toutes les autres connexions ouvertes dont
 *   l'émetteur OU le destinataire est un observer (pas de device → device)
 *
 * Aucune trame d'erreur n'est renvoyée à l'émetteur : une trame rejetée est
 * simplement abandonnée, c'est le comportement attendu du protocole.
 */

use crate::clock::Clock;
use crate::error::RelayError;
use crate::models::{estimate_ready_at, Role, Sample};
use crate::query::QueryService;
use crate::registry::{ConnectionId, ConnectionRegistry, Outbound};
use crate::store::SampleStore;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Payload poussé à la connexion quand aucun échantillon récent n'existe
pub const EMPTY_PAYLOAD: &str = "{}";

/// Résultat du traitement d'une trame
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Relayed {
        sample: Sample,
        persisted: bool,
        delivered: usize,
    },
    History {
        sent: usize,
    },
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterSettings {
    /// Taille de la réponse à une demande d'historique
    pub history_limit: usize,
    /// Fenêtre du push à la connexion
    pub recent_window_secs: i64,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            history_limit: 50,
            recent_window_secs: 60 * 60,
        }
    }
}

pub struct RelayRouter {
    registry: ConnectionRegistry,
    store: Arc<dyn SampleStore>,
    queries: Arc<QueryService>,
    clock: Arc<dyn Clock>,
    settings: RouterSettings,
}

impl RelayRouter {
    pub fn new(
        registry: ConnectionRegistry,
        store: Arc<dyn SampleStore>,
        queries: Arc<QueryService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            store,
            queries,
            clock,
            settings: RouterSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: RouterSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Push initial : dernier échantillon de la dernière heure, ou `{}`.
    /// Mis en tête de file avant l'inscription de la connexion au registre.
    pub fn greeting(&self) -> String {
        let now = self.clock.now();
        let latest = match self.queries.latest_within(now, self.settings.recent_window_secs) {
            Ok(latest) => latest,
            Err(e) => {
                log::error!("[relay] {}", RelayError::from(e));
                None
            }
        };

        latest
            .and_then(|sample| match serde_json::to_string(&sample) {
                Ok(payload) => Some(payload),
                Err(e) => {
                    log::error!("[relay] {}", RelayError::from(e));
                    None
                }
            })
            .unwrap_or_else(|| EMPTY_PAYLOAD.to_string())
    }

    /// Traite une trame reçue de `from`
    pub fn handle_frame(&self, from: ConnectionId, payload: &str) -> Result<Dispatch, RelayError> {
        let role = self.registry.role_of(from).ok_or(RelayError::ConnectionClosed(from))?;

        match classify(payload)? {
            Intent::Telemetry(reading) => self.relay(from, role, reading),
            Intent::History => self.send_history(from),
            Intent::Ignored => Ok(Dispatch::Ignored),
        }
    }

    fn relay(&self, from: ConnectionId, role: Role, reading: Reading) -> Result<Dispatch, RelayError> {
        let sample = reading.stamp(self.clock.now());

        let persisted = if role.is_observer() {
            false
        } else {
            match self.store.append(&sample) {
                Ok(()) => true,
                Err(e) => {
                    log::error!("[relay] sample at {} not stored: {}", sample.timestamp, RelayError::from(e));
                    false
                }
            }
        };

        let payload = serde_json::to_string(&sample)?;
        let delivered = self.fan_out(from, role, &payload);

        Ok(Dispatch::Relayed { sample, persisted, delivered })
    }

    fn fan_out(&self, from: ConnectionId, role: Role, payload: &str) -> usize {
        let mut targets = Vec::new();
        self.registry.for_each_open(|peer| {
            if peer.id != from && peer.writable && (role.is_observer() || peer.role.is_observer()) {
                targets.push(peer.id);
            }
        });

        targets
            .into_iter()
            .filter(|peer| match self.registry.send(*peer, Outbound::Text(payload.to_owned())) {
                Ok(()) => true,
                Err(e) => {
                    log::debug!("[relay] skipped peer: {}", e);
                    false
                }
            })
            .count()
    }

    fn send_history(&self, to: ConnectionId) -> Result<Dispatch, RelayError> {
        let backlog = self.queries.backlog(self.settings.history_limit)?;
        let sent = backlog.len();
        self.registry.send(to, Outbound::Text(serde_json::to_string(&backlog)?))?;
        Ok(Dispatch::History { sent })
    }
}

/// Intention d'une trame entrante
#[derive(Debug, PartialEq)]
enum Intent {
    Telemetry(Reading),
    History,
    Ignored,
}

/// Lecture validée, pas encore horodatée
#[derive(Debug, PartialEq)]
struct Reading {
    temp_low: f64,
    temp_high: f64,
    temp_ambient: f64,
    warming_phase: String,
    target: f64,
    low_limit: f64,
}

impl Reading {
    fn from_frame(frame: &Map<String, Value>) -> Result<Self, RelayError> {
        Ok(Self {
            temp_low: number_field(frame, "temp_low")?,
            temp_high: number_field(frame, "temp_high")?,
            temp_ambient: number_field(frame, "temp_ambient")?,
            warming_phase: phase_field(frame)?,
            target: number_field(frame, "target")?,
            low_limit: number_field(frame, "low_limit")?,
        })
    }

    /// Horodatage serveur ; un éventuel timestamp client n'est jamais lu
    fn stamp(self, now: i64) -> Sample {
        Sample {
            estimation: estimate_ready_at(self.target, self.temp_high, now),
            temp_low: self.temp_low,
            temp_high: self.temp_high,
            temp_ambient: self.temp_ambient,
            warming_phase: self.warming_phase,
            target: self.target,
            low_limit: self.low_limit,
            timestamp: now,
        }
    }
}

fn classify(payload: &str) -> Result<Intent, RelayError> {
    let value: Value = serde_json::from_str(payload).map_err(|e| RelayError::MalformedMessage(e.to_string()))?;
    let Some(frame) = value.as_object() else {
        return Ok(Intent::Ignored);
    };

    if frame.get("temp_low").is_some_and(|v| !v.is_null()) {
        return Reading::from_frame(frame).map(Intent::Telemetry);
    }
    if frame.get("from").is_some_and(|v| !v.is_null()) {
        return Ok(Intent::History);
    }
    Ok(Intent::Ignored)
}

/// Nombre JSON ou chaîne décimale, fini obligatoirement
fn number_field(frame: &Map<String, Value>, name: &str) -> Result<f64, RelayError> {
    let parsed = match frame.get(name) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| RelayError::InvalidTelemetry(format!("`{name}` is not a finite number")))
}

fn phase_field(frame: &Map<String, Value>) -> Result<String, RelayError> {
    match frame.get("warming_phase") {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(v @ (Value::Bool(_) | Value::Number(_))) => Ok(v.to_string()),
        _ => Err(RelayError::InvalidTelemetry("`warming_phase` is missing".into())),
    }
}
