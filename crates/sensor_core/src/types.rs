//! Tipos de dados do protocolo de sensores.
//!
//! Um [`SensorSpec`] descreve como localizar e limitar um sensor numa linha;
//! uma [`ParsedReading`] é o resultado transitório de uma única linha.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

// ──────────────────────────────────────────────
// Especificação de sensor
// ──────────────────────────────────────────────

/// Descrição de um sensor dentro do schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSpec {
    /// Token do protocolo (ex: "T" em `T:25.5`)
    pub key: String,
    /// Unidade de exibição (informativa, não usada no parse)
    pub unit: String,
    /// Limite inferior do gauge
    pub min: Option<f64>,
    /// Limite superior do gauge
    pub max: Option<f64>,
    /// Valor é um código de status, não uma medida contínua
    pub is_status: bool,
}

impl SensorSpec {
    /// Sensor numérico com limites inclusivos.
    pub fn numeric(key: impl Into<String>, unit: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            key: key.into(),
            unit: unit.into(),
            min: Some(min),
            max: Some(max),
            is_status: false,
        }
    }

    /// Sensor de status (código enumerado).
    pub fn status(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            unit: String::new(),
            min: None,
            max: None,
            is_status: true,
        }
    }

    /// Limita `value` ao intervalo `[min, max]`. Limites ausentes não restringem.
    pub fn clamp(&self, value: f64) -> f64 {
        let mut v = value;
        if let Some(min) = self.min {
            if v < min {
                v = min;
            }
        }
        if let Some(max) = self.max {
            if v > max {
                v = max;
            }
        }
        v
    }
}

// ──────────────────────────────────────────────
// Leitura
// ──────────────────────────────────────────────

/// Valor decodificado de um sensor.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorValue {
    /// Medida já limitada aos bounds do sensor
    Numeric(f64),
    /// Rótulo de status resolvido (ou o código cru, se desconhecido)
    Status(String),
}

impl SensorValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Numeric(v) => Some(*v),
            Self::Status(_) => None,
        }
    }

    pub fn as_label(&self) -> Option<&str> {
        match self {
            Self::Numeric(_) => None,
            Self::Status(s) => Some(s),
        }
    }
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "{v}"),
            Self::Status(s) => f.write_str(s),
        }
    }
}

/// Motivo de um aviso de parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningReason {
    /// Valor de sensor numérico não pôde ser convertido para float
    NotNumeric,
    /// Código de status fora da tabela (só com política estrita)
    UnknownStatusCode,
}

impl fmt::Display for WarningReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotNumeric => "valor não numérico",
            Self::UnknownStatusCode => "código de status desconhecido",
        })
    }
}

/// Aviso não fatal gerado durante o parse de uma linha.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseWarning {
    pub sensor: String,
    pub raw: String,
    pub reason: WarningReason,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: '{}' ({})", self.sensor, self.raw, self.reason)
    }
}

/// Resultado do parse de uma linha: nome do sensor → valor, mais avisos.
///
/// Sensores ausentes da linha simplesmente não aparecem; cabe à UI manter
/// o valor exibido anteriormente.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedReading {
    pub values: IndexMap<String, SensorValue>,
    pub warnings: Vec<ParseWarning>,
}

impl ParsedReading {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, sensor: &str) -> Option<&SensorValue> {
        self.values.get(sensor)
    }

    pub fn numeric(&self, sensor: &str) -> Option<f64> {
        self.get(sensor).and_then(SensorValue::as_f64)
    }

    pub fn label(&self, sensor: &str) -> Option<&str> {
        self.get(sensor).and_then(SensorValue::as_label)
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
