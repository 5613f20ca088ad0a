//! Parser de linhas `CHAVE:valor,CHAVE:valor`.
//!
//! Função pura de `(linha, schema)`: nunca falha, nunca guarda estado.
//! Entrada malformada vira omissão no resultado mais, quando for o caso,
//! um [`ParseWarning`].

use crate::schema::SensorSchema;
use crate::status;
use crate::types::{ParseWarning, ParsedReading, SensorValue, WarningReason};
use indexmap::IndexMap;
use tracing::debug;

/// Decodifica uma linha já limpa de espaços nas pontas.
pub fn parse(line: &str, schema: &SensorSchema) -> ParsedReading {
    let observed = split_items(line, schema.item_separator(), schema.kv_separator());
    let mut reading = ParsedReading::default();

    for (name, spec) in schema.iter() {
        let Some(&raw) = observed.get(spec.key.as_str()) else {
            continue;
        };

        if spec.is_status {
            if schema.policy().strict_status && !status::is_known_status(raw) {
                push_warning(&mut reading, name, raw, WarningReason::UnknownStatusCode);
            }
            let label = status::resolve_status(raw).to_string();
            reading
                .values
                .insert(name.to_string(), SensorValue::Status(label));
            continue;
        }

        match parse_number(raw) {
            Some(value) => {
                reading
                    .values
                    .insert(name.to_string(), SensorValue::Numeric(spec.clamp(value)));
            }
            None => push_warning(&mut reading, name, raw, WarningReason::NotNumeric),
        }
    }

    reading
}

/// Decodifica bytes recebidos (UTF-8) e faz o parse da linha.
///
/// Bytes que não são UTF-8 válido produzem uma leitura vazia.
pub fn parse_bytes(data: &[u8], schema: &SensorSchema) -> ParsedReading {
    match std::str::from_utf8(data) {
        Ok(text) => parse(text.trim(), schema),
        Err(e) => {
            debug!("Linha ignorada, UTF-8 inválido: {e}");
            ParsedReading::default()
        }
    }
}

/// Mapa chave observada → valor. Em chaves repetidas, a última vence.
fn split_items<'a>(line: &'a str, item_sep: &str, kv_sep: &str) -> IndexMap<&'a str, &'a str> {
    let mut observed = IndexMap::new();
    for item in line.split(item_sep) {
        if item.is_empty() {
            continue;
        }
        // Split único: "K:a:b" → ("K", "a:b")
        let Some((key, value)) = item.split_once(kv_sep) else {
            continue;
        };
        observed.insert(key.trim(), value.trim());
    }
    observed
}

/// NaN não é uma medida; infinitos são aceitos e depois limitados.
fn parse_number(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| !v.is_nan())
}

fn push_warning(reading: &mut ParsedReading, sensor: &str, raw: &str, reason: WarningReason) {
    let warning = ParseWarning {
        sensor: sensor.to_string(),
        raw: raw.to_string(),
        reason,
    };
    debug!("Aviso de parse – {warning}");
    reading.warnings.push(warning);
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
