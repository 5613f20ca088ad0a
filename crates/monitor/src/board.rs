//! Estado exibido: último valor conhecido de cada sensor.
//!
//! Leituras parciais só atualizam os sensores presentes; os demais mantêm
//! o valor anterior.

use indexmap::IndexMap;
use sensor_core::status::DEFAULT_STATUS_LABEL;
use sensor_core::{ParsedReading, SensorSchema, SensorValue};
use std::fmt::Write as _;

/// Um mostrador do painel.
#[derive(Debug, Clone, PartialEq)]
pub enum Dial {
    Gauge {
        value: f64,
        min: f64,
        max: f64,
        unit: String,
    },
    Status(String),
}

/// Painel de mostradores, na ordem do schema.
#[derive(Debug, Clone, Default)]
pub struct Board {
    entries: IndexMap<String, Dial>,
}

impl Board {
    /// Gauges começam no mínimo; status começa em `idle`.
    pub fn new(schema: &SensorSchema) -> Self {
        let entries = schema
            .iter()
            .map(|(name, spec)| {
                let display = if spec.is_status {
                    Dial::Status(DEFAULT_STATUS_LABEL.into())
                } else {
                    let min = spec.min.unwrap_or(0.0);
                    Dial::Gauge {
                        value: min,
                        min,
                        max: spec.max.unwrap_or(min),
                        unit: spec.unit.clone(),
                    }
                };
                (name.to_string(), display)
            })
            .collect();
        Self { entries }
    }

    /// Aplica uma leitura e retorna quantos mostradores mudaram.
    pub fn apply(&mut self, reading: &ParsedReading) -> usize {
        let mut changed = 0;
        for (name, value) in &reading.values {
            let Some(display) = self.entries.get_mut(name) else {
                continue;
            };
            match (display, value) {
                (Dial::Gauge { value: current, .. }, SensorValue::Numeric(v)) => {
                    if *current != *v {
                        *current = *v;
                        changed += 1;
                    }
                }
                (Dial::Status(current), SensorValue::Status(label)) => {
                    if current != label {
                        current.clone_from(label);
                        changed += 1;
                    }
                }
                _ => {}
            }
        }
        changed
    }

    /// Fração do arco do gauge (0–1). Faixa nula conta como 1.
    pub fn fraction(&self, name: &str) -> Option<f64> {
        match self.entries.get(name)? {
            Dial::Gauge {
                value, min, max, ..
            } => {
                let span = if max - min != 0.0 { max - min } else { 1.0 };
                Some(((value - min) / span).clamp(0.0, 1.0))
            }
            Dial::Status(_) => None,
        }
    }

    /// Uma linha com todos os mostradores, ex: `temperature=23.4℃ status=idle`.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for (name, display) in &self.entries {
            if !out.is_empty() {
                out.push(' ');
            }
            let _ = match display {
                Dial::Gauge { value, unit, .. } => write!(out, "{name}={value:.1}{unit}"),
                Dial::Status(label) => write!(out, "{name}={label}"),
            };
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensor_core::{SchemaBuilder, SensorSpec, parse};

    fn schema() -> SensorSchema {
        SchemaBuilder::new()
            .sensor("temperature", SensorSpec::numeric("T", "℃", 0.0, 50.0))
            .sensor("battery", SensorSpec::numeric("BAT", "V", 3.0, 4.2))
            .sensor("status", SensorSpec::status("ST"))
            .build()
            .unwrap()
            .schema
    }

    #[test]
    fn starts_at_min_and_idle() {
        let board = Board::new(&schema());
        assert_eq!(board.summary(), "temperature=0.0℃ battery=3.0V status=idle");
        assert_eq!(board.fraction("battery"), Some(0.0));
        assert_eq!(board.fraction("status"), None);
    }

    #[test]
    fn partial_reading_keeps_previous_values() {
        let schema = schema();
        let mut board = Board::new(&schema);
        assert_eq!(board.apply(&parse("T:25,ST:3", &schema)), 2);
        assert_eq!(board.apply(&parse("BAT:4.2", &schema)), 1);
        assert_eq!(board.summary(), "temperature=25.0℃ battery=4.2V status=charging");
        assert_eq!(board.fraction("temperature"), Some(0.5));
        assert_eq!(board.fraction("battery"), Some(1.0));
    }

    #[test]
    fn unchanged_values_are_not_counted() {
        let schema = schema();
        let mut board = Board::new(&schema);
        board.apply(&parse("T:10", &schema));
        assert_eq!(board.apply(&parse("T:10", &schema)), 0);
        assert_eq!(board.apply(&parse("T:abc", &schema)), 0);
    }

    #[test]
    fn zero_span_gauge_does_not_divide_by_zero() {
        let schema = SchemaBuilder::new()
            .sensor("fixed", SensorSpec::numeric("F", "", 5.0, 5.0))
            .build()
            .unwrap()
            .schema;
        let mut board = Board::new(&schema);
        board.apply(&parse("F:9", &schema));
        assert_eq!(board.fraction("fixed"), Some(0.0));
    }
}
