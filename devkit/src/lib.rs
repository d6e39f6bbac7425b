/*!
# Palju DevKit - Utilitaires de test pour le relais

Bibliothèque partagée par les tests du workspace:
- Builders de trames de télémétrie (valides, invalides, illisibles)
- Chronologies synthétiques de timestamps pour la segmentation
- Initialisation des logs de test
*/

pub mod frames;
pub mod timeline;

pub use frames::{history_request, TelemetryFrame, MALFORMED_FRAME};
pub use timeline::{evenly_spaced, Timeline};

/// Active `env_logger` une seule fois pour tout le binaire de test
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
