//! # Sensor Core
//!
//! Crate compartilhada que define o protocolo de linhas de sensores
//! (`CHAVE:valor,CHAVE:valor`), o schema configurável, o parser e a
//! persistência das configurações do monitor serial.
//!
//! ## Módulos
//! - [`types`] – Specs de sensor, valores e avisos de parse
//! - [`schema`] – Schema imutável e validação na construção
//! - [`parser`] – Parse total e puro de uma linha
//! - [`status`] – Tabela fixa de códigos de status
//! - [`config`] – Configurações JSON/TOML
//! - [`protocol`] – Texto/HEX da porta serial e enquadramento de linhas

pub mod types;
pub mod schema;
pub mod parser;
pub mod status;
pub mod config;
pub mod protocol;

// Re-exports convenientes
pub use types::{ParseWarning, ParsedReading, SensorSpec, SensorValue, WarningReason};
pub use schema::{BuiltSchema, ConfigError, ConfigWarning, ParsePolicy, SchemaBuilder, SensorSchema};
pub use parser::{parse, parse_bytes};
pub use config::{FormatEntry, Settings, SettingsError};
pub use protocol::{CodecError, LineFramer, RxText, decode_rx, encode_tx, format_hex};
