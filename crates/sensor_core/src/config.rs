//! Configurações persistidas do monitor.
//!
//! Arquivo JSON (`serial_settings.json`) com comandos rápidos, formato dos
//! dados e separadores. Arquivos `.toml` também são aceitos.

use crate::schema::{
    BuiltSchema, ConfigError, DEFAULT_ITEM_SEPARATOR, DEFAULT_KV_SEPARATOR, ParsePolicy,
    SchemaBuilder,
};
use crate::types::SensorSpec;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Nome do arquivo de configurações padrão.
pub const SETTINGS_FILE: &str = "serial_settings.json";

/// Limites usados quando um sensor numérico omite `min` ou `max`.
const FALLBACK_MIN: f64 = 0.0;
const FALLBACK_MAX: f64 = 100.0;

/// Erros ao ler ou gravar configurações.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Erro de E/S: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON inválido: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML inválido: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Erro ao gerar TOML: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Schema inválido: {0}")]
    Schema(#[from] ConfigError),
}

/// Uma entrada de `data_format`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatEntry {
    pub key: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Sem este campo, a entrada é de status se não tiver nenhum limite
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<bool>,
}

impl FormatEntry {
    pub fn numeric(key: &str, unit: &str, min: f64, max: f64) -> Self {
        Self {
            key: key.into(),
            unit: unit.into(),
            min: Some(min),
            max: Some(max),
            status: None,
        }
    }

    pub fn status(key: &str) -> Self {
        Self {
            key: key.into(),
            unit: String::new(),
            min: None,
            max: None,
            status: None,
        }
    }

    pub fn is_status(&self) -> bool {
        self.status
            .unwrap_or(self.min.is_none() && self.max.is_none())
    }

    /// Converte para [`SensorSpec`], preenchendo limites ausentes.
    pub fn to_spec(&self) -> SensorSpec {
        if self.is_status() {
            return SensorSpec {
                key: self.key.clone(),
                unit: self.unit.clone(),
                min: self.min,
                max: self.max,
                is_status: true,
            };
        }
        SensorSpec {
            key: self.key.clone(),
            unit: self.unit.clone(),
            min: Some(self.min.unwrap_or(FALLBACK_MIN)),
            max: Some(self.max.unwrap_or(FALLBACK_MAX)),
            is_status: false,
        }
    }
}

/// Configurações completas do monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Separador entre itens de uma linha
    pub data_separator: String,
    /// Separador entre chave e valor
    pub kv_separator: String,
    /// Avisar sobre códigos de status fora da tabela
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub strict_status: bool,
    /// Comandos rápidos: nome → texto enviado
    pub cmd_buttons: IndexMap<String, String>,
    /// Sensores: nome → formato
    pub data_format: IndexMap<String, FormatEntry>,
}

impl Default for Settings {
    fn default() -> Self {
        let cmd_buttons = [
            ("forward", "CMD:FWD"),
            ("backward", "CMD:BWD"),
            ("left", "CMD:LEFT"),
            ("right", "CMD:RIGHT"),
            ("stop", "CMD:STOP"),
            ("auto", "CMD:AUTO"),
            ("manual", "CMD:MANUAL"),
        ]
        .into_iter()
        .map(|(name, cmd)| (name.to_string(), cmd.to_string()))
        .collect();

        let data_format = [
            ("temperature", FormatEntry::numeric("T", "℃", 0.0, 50.0)),
            ("humidity", FormatEntry::numeric("H", "%", 0.0, 100.0)),
            ("light", FormatEntry::numeric("L", "lux", 0.0, 2000.0)),
            ("soil_moisture", FormatEntry::numeric("SM", "%", 0.0, 100.0)),
            ("battery", FormatEntry::numeric("BAT", "V", 3.0, 4.2)),
            ("solar_voltage", FormatEntry::numeric("SOL", "V", 0.0, 6.0)),
            ("speed", FormatEntry::numeric("SPD", "cm/s", 0.0, 50.0)),
            ("status", FormatEntry::status("ST")),
        ]
        .into_iter()
        .map(|(name, entry)| (name.to_string(), entry))
        .collect();

        Self {
            data_separator: DEFAULT_ITEM_SEPARATOR.into(),
            kv_separator: DEFAULT_KV_SEPARATOR.into(),
            strict_status: false,
            cmd_buttons,
            data_format,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Json,
    Toml,
}

impl FileFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

impl Settings {
    /// Carrega configurações; em qualquer falha usa o padrão.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match Self::load_strict(path) {
                Ok(settings) => {
                    info!("Configurações carregadas de {}", path.display());
                    return settings;
                }
                Err(e) => {
                    warn!("Erro ao carregar {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configurações padrão");
        Settings::default()
    }

    /// Carrega configurações propagando erros de leitura e parse.
    pub fn load_strict(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str_as(&content, FileFormat::for_path(path))
    }

    /// Carrega configurações e já constrói o schema, propagando qualquer erro.
    pub fn load_schema(path: &Path) -> Result<(Self, BuiltSchema), SettingsError> {
        let settings = Self::load_strict(path)?;
        let built = settings.schema()?;
        Ok((settings, built))
    }

    fn from_str_as(content: &str, format: FileFormat) -> Result<Self, SettingsError> {
        Ok(match format {
            FileFormat::Json => serde_json::from_str(content)?,
            FileFormat::Toml => toml::from_str(content)?,
        })
    }

    /// Salva configurações (JSON indentado, ou TOML pela extensão).
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let content = match FileFormat::for_path(path) {
            FileFormat::Json => serde_json::to_string_pretty(self)?,
            FileFormat::Toml => toml::to_string_pretty(self)?,
        };
        std::fs::write(path, content)?;
        info!("Configurações salvas em {}", path.display());
        Ok(())
    }

    /// Caminho padrão: `serial_settings.json` ao lado do executável.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join(SETTINGS_FILE)
    }

    /// Constrói o schema de sensores descrito por estas configurações.
    pub fn schema(&self) -> Result<BuiltSchema, ConfigError> {
        let mut builder = SchemaBuilder::new()
            .item_separator(self.data_separator.as_str())
            .kv_separator(self.kv_separator.as_str())
            .policy(ParsePolicy {
                strict_status: self.strict_status,
            });
        for (name, entry) in &self.data_format {
            builder = builder.sensor(name.as_str(), entry.to_spec());
        }
        builder.build()
    }

    /// Texto do comando rápido `name`.
    pub fn command(&self, name: &str) -> Option<&str> {
        self.cmd_buttons.get(name).map(String::as_str)
    }

    /// `true` se estas configurações esvaziam um `data_format` que não era vazio.
    pub fn clears_data_format(&self, previous: &Settings) -> bool {
        self.data_format.is_empty() && !previous.data_format.is_empty()
    }

    /// Valida as configurações e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (name, cmd) in &self.cmd_buttons {
            if name.trim().is_empty() {
                errors.push(format!("Comando sem nome: '{cmd}'"));
            }
            if cmd.trim().is_empty() {
                errors.push(format!("Comando '{name}' está vazio"));
            }
        }
        if let Err(e) = self.schema() {
            errors.push(e.to_string());
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn default_settings_are_valid() {
        let settings = Settings::default();
        let errors = settings.validate();
        assert!(errors.is_empty(), "Erros: {:?}", errors);
        let built = settings.schema().unwrap();
        assert_eq!(built.schema.len(), 8);
        assert!(built.schema.sensor("status").unwrap().is_status);
        assert!(!built.schema.sensor("battery").unwrap().is_status);
    }

    #[test]
    fn reads_device_settings_file() {
        let json = r#"{
  "cmd_buttons": { "前进": "CMD:FWD" },
  "data_format": {
    "温度": { "key": "T", "unit": "℃", "min": 0, "max": 50 },
    "当前状态": { "key": "ST", "unit": "" }
  },
  "data_separator": ";",
  "kv_separator": "="
}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.command("前进"), Some("CMD:FWD"));
        let schema = settings.schema().unwrap().schema;
        let r = parse("T=60;ST=4", &schema);
        assert_eq!(r.numeric("温度"), Some(50.0));
        assert_eq!(r.label("当前状态"), Some("alarm"));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let settings: Settings = serde_json::from_str(r#"{ "data_separator": "|" }"#).unwrap();
        assert_eq!(settings.data_separator, "|");
        assert_eq!(settings.kv_separator, ":");
        assert_eq!(settings.cmd_buttons.len(), 7);
        assert_eq!(settings.data_format.len(), 8);
    }

    #[test]
    fn single_missing_bound_falls_back() {
        let entry: FormatEntry = serde_json::from_str(r#"{ "key": "L", "max": 2000 }"#).unwrap();
        assert!(!entry.is_status());
        let spec = entry.to_spec();
        assert_eq!(spec.min, Some(0.0));
        assert_eq!(spec.max, Some(2000.0));

        let entry: FormatEntry = serde_json::from_str(r#"{ "key": "L", "min": 5 }"#).unwrap();
        assert_eq!(entry.to_spec().max, Some(100.0));
    }

    #[test]
    fn explicit_status_flag_wins() {
        let entry: FormatEntry =
            serde_json::from_str(r#"{ "key": "X", "status": false }"#).unwrap();
        let spec = entry.to_spec();
        assert!(!spec.is_status);
        assert_eq!((spec.min, spec.max), (Some(0.0), Some(100.0)));

        let entry: FormatEntry =
            serde_json::from_str(r#"{ "key": "M", "min": 0, "max": 3, "status": true }"#).unwrap();
        assert!(entry.to_spec().is_status);
    }

    #[test]
    fn duplicate_keys_fail_validation() {
        let mut settings = Settings::default();
        settings
            .data_format
            .insert("outra".into(), FormatEntry::numeric("T", "", 0.0, 1.0));
        assert!(matches!(
            settings.schema(),
            Err(ConfigError::DuplicateKey { .. })
        ));
        assert_eq!(settings.validate().len(), 1);
    }

    #[test]
    fn empty_commands_fail_validation() {
        let mut settings = Settings::default();
        settings.cmd_buttons.insert("vazio".into(), "  ".into());
        let errors = settings.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("vazio"));
    }

    #[test]
    fn json_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        let settings = Settings::default();
        settings.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        // Caracteres não-ASCII são gravados sem escape
        assert!(content.contains("℃"));

        assert_eq!(Settings::load_strict(&path).unwrap(), settings);
    }

    #[test]
    fn toml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let mut settings = Settings::default();
        settings.strict_status = true;
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path), settings);
    }

    #[test]
    fn broken_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "{ isto não é json").unwrap();
        assert!(matches!(
            Settings::load_strict(&path),
            Err(SettingsError::Json(_))
        ));
        assert_eq!(Settings::load(&path), Settings::default());
    }

    #[test]
    fn missing_file_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nao_existe.json");
        assert_eq!(Settings::load(&path), Settings::default());
        assert!(matches!(
            Settings::load_strict(&path),
            Err(SettingsError::Io(_))
        ));
    }

    #[test]
    fn load_schema_builds_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        Settings::default().save(&path).unwrap();

        let (settings, built) = Settings::load_schema(&path).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(built.schema.len(), 8);
    }

    #[test]
    fn load_schema_reports_schema_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        let mut settings = Settings::default();
        settings.kv_separator.clear();
        settings.save(&path).unwrap();

        assert!(matches!(
            Settings::load_schema(&path),
            Err(SettingsError::Schema(ConfigError::EmptySeparator(_)))
        ));
    }

    #[test]
    fn detects_cleared_data_format() {
        let previous = Settings::default();
        let mut next = previous.clone();
        next.data_format.clear();
        assert!(next.clears_data_format(&previous));
        assert!(!previous.clears_data_format(&next));
    }
}
