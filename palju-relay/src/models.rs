use serde::{Deserialize, Serialize};

/// Vitesse de chauffe supposée par l'estimation (degrés par heure)
pub const DEGREES_PER_HOUR: f64 = 10.0;

/// Secondes nécessaires pour gagner un degré : 3600 / 10 = 360
pub const SECONDS_PER_DEGREE: f64 = 3600.0 / DEGREES_PER_HOUR;

/// Rôle d'une connexion relais, fixé une fois pour toutes à l'ouverture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Contrôleur physique, source de la télémétrie
    Device,
    /// Client secondaire (app mobile) : reçoit tout, n'est jamais persisté
    Observer,
}

impl Role {
    /// Seul le jeton observateur exact donne `Observer`, tout le reste est un device
    pub fn from_protocol(token: Option<&str>, observer_token: &str) -> Self {
        match token {
            Some(t) if t == observer_token => Role::Observer,
            _ => Role::Device,
        }
    }

    pub fn is_observer(self) -> bool {
        matches!(self, Role::Observer)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Device => "device",
            Role::Observer => "observer",
        }
    }
}

/// Une lecture du contrôleur telle que stockée et relayée
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub temp_low: f64,
    pub temp_high: f64,
    pub temp_ambient: f64,
    pub warming_phase: String,
    pub target: f64,
    pub low_limit: f64,
    /// Epoch secondes, posé par le relais à la réception
    pub timestamp: i64,
    /// Instant estimé (epoch secondes) où `temp_high` atteint `target`
    pub estimation: f64,
}

/// Épisode de chauffe reconstruit à la volée, jamais stocké
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub start: i64,
    pub end: i64,
}

/// Modèle linéaire à 10 °C/h ; peut tomber dans le passé si la cible est déjà dépassée
pub fn estimate_ready_at(target: f64, temp_high: f64, timestamp: i64) -> f64 {
    (target - temp_high) * SECONDS_PER_DEGREE + timestamp as f64
}
