/*!
Builders de trames client → relais

Une trame de télémétrie porte six champs ; le relais accepte les nombres
JSON comme les chaînes décimales. Les builders partent d'une trame valide
et la dégradent champ par champ.
*/

use serde_json::{json, Map, Value};

/// Trame qui n'est pas du JSON
pub const MALFORMED_FRAME: &str = "not valid structured data";

const NUMERIC_FIELDS: [&str; 5] = ["temp_low", "temp_high", "temp_ambient", "target", "low_limit"];

#[derive(Debug, Clone)]
pub struct TelemetryFrame {
    fields: Map<String, Value>,
}

impl TelemetryFrame {
    /// Lecture typique d'un bain en chauffe
    pub fn heating() -> Self {
        let mut fields = Map::new();
        fields.insert("temp_low".into(), json!(30.5));
        fields.insert("temp_high".into(), json!(31.0));
        fields.insert("temp_ambient".into(), json!(2.5));
        fields.insert("warming_phase".into(), json!("ON"));
        fields.insert("target".into(), json!(38.0));
        fields.insert("low_limit".into(), json!(35.0));
        Self { fields }
    }

    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn without(mut self, key: &str) -> Self {
        self.fields.remove(key);
        self
    }

    /// Réécrit les champs numériques en chaînes décimales, comme certains firmwares
    pub fn as_strings(mut self) -> Self {
        for key in NUMERIC_FIELDS {
            if let Some(Value::Number(n)) = self.fields.get(key) {
                let text = n.to_string();
                self.fields.insert(key.to_string(), Value::String(text));
            }
        }
        self
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }
}

/// Demande des derniers échantillons ; la valeur de `from` est opaque
pub fn history_request() -> String {
    json!({ "from": 0 }).to_string()
}
