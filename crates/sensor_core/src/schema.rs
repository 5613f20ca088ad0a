//! Schema de sensores e validação em tempo de construção.
//!
//! O schema é imutável depois de construído. Recarregar configurações
//! significa construir um schema novo e substituir o anterior por inteiro;
//! se a construção falhar, o schema ativo continua valendo.

use crate::types::SensorSpec;
use indexmap::IndexMap;
use std::fmt;
use tracing::warn;

/// Separador padrão entre itens de uma linha.
pub const DEFAULT_ITEM_SEPARATOR: &str = ",";

/// Separador padrão entre chave e valor de um item.
pub const DEFAULT_KV_SEPARATOR: &str = ":";

/// Erros fatais de configuração do schema.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Sensor '{sensor}' com chave vazia")]
    EmptyKey { sensor: String },

    #[error("Chave '{key}' duplicada entre '{first}' e '{second}'")]
    DuplicateKey {
        key: String,
        first: String,
        second: String,
    },

    #[error("Limites inválidos para '{sensor}': min {min} > max {max}")]
    InvalidBounds { sensor: String, min: f64, max: f64 },

    #[error("Limite NaN para '{sensor}'")]
    NanBound { sensor: String },

    #[error("Sensor numérico '{sensor}' sem min/max")]
    MissingBounds { sensor: String },

    #[error("Separador {0} não pode ser vazio")]
    EmptySeparator(&'static str),
}

/// Avisos não fatais de configuração.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// Separador de itens igual ao de chave/valor
    AmbiguousSeparators(String),
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AmbiguousSeparators(sep) => write!(
                f,
                "Separador de itens e de chave/valor são iguais ('{sep}'); \
                 nenhum item terá valor"
            ),
        }
    }
}

/// Política de tolerância do parser.
///
/// O padrão é leniente. A política estrita só acrescenta avisos, nunca
/// altera os valores produzidos.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParsePolicy {
    /// Gera aviso para códigos de status fora da tabela
    pub strict_status: bool,
}

/// Schema ativo: sensores em ordem, separadores e política.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSchema {
    specs: IndexMap<String, SensorSpec>,
    item_separator: String,
    kv_separator: String,
    policy: ParsePolicy,
}

impl Default for SensorSchema {
    fn default() -> Self {
        Self {
            specs: IndexMap::new(),
            item_separator: DEFAULT_ITEM_SEPARATOR.into(),
            kv_separator: DEFAULT_KV_SEPARATOR.into(),
            policy: ParsePolicy::default(),
        }
    }
}

impl SensorSchema {
    /// Constrói e valida um schema a partir de pares (nome, spec).
    pub fn build<I, S>(
        specs: I,
        item_separator: &str,
        kv_separator: &str,
    ) -> Result<BuiltSchema, ConfigError>
    where
        I: IntoIterator<Item = (S, SensorSpec)>,
        S: Into<String>,
    {
        let mut builder = SchemaBuilder::new()
            .item_separator(item_separator)
            .kv_separator(kv_separator);
        for (name, spec) in specs {
            builder = builder.sensor(name, spec);
        }
        builder.build()
    }

    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    pub fn sensor(&self, name: &str) -> Option<&SensorSpec> {
        self.specs.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SensorSpec)> {
        self.specs.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn item_separator(&self) -> &str {
        &self.item_separator
    }

    pub fn kv_separator(&self) -> &str {
        &self.kv_separator
    }

    pub fn policy(&self) -> ParsePolicy {
        self.policy
    }
}

/// Schema validado com os avisos encontrados na construção.
#[derive(Debug, Clone)]
pub struct BuiltSchema {
    pub schema: SensorSchema,
    pub warnings: Vec<ConfigWarning>,
}

/// Builder de [`SensorSchema`]. Nomes repetidos substituem a spec anterior.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    specs: IndexMap<String, SensorSpec>,
    item_separator: String,
    kv_separator: String,
    policy: ParsePolicy,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            specs: IndexMap::new(),
            item_separator: DEFAULT_ITEM_SEPARATOR.into(),
            kv_separator: DEFAULT_KV_SEPARATOR.into(),
            policy: ParsePolicy::default(),
        }
    }

    pub fn item_separator(mut self, sep: impl Into<String>) -> Self {
        self.item_separator = sep.into();
        self
    }

    pub fn kv_separator(mut self, sep: impl Into<String>) -> Self {
        self.kv_separator = sep.into();
        self
    }

    pub fn policy(mut self, policy: ParsePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn sensor(mut self, name: impl Into<String>, spec: SensorSpec) -> Self {
        self.specs.insert(name.into(), spec);
        self
    }

    /// Valida e congela o schema.
    pub fn build(self) -> Result<BuiltSchema, ConfigError> {
        if self.item_separator.is_empty() {
            return Err(ConfigError::EmptySeparator("de itens"));
        }
        if self.kv_separator.is_empty() {
            return Err(ConfigError::EmptySeparator("de chave/valor"));
        }

        let mut seen: IndexMap<&str, &str> = IndexMap::new();
        for (name, spec) in &self.specs {
            if spec.key.trim().is_empty() {
                return Err(ConfigError::EmptyKey {
                    sensor: name.clone(),
                });
            }
            if let Some(first) = seen.insert(spec.key.as_str(), name.as_str()) {
                return Err(ConfigError::DuplicateKey {
                    key: spec.key.clone(),
                    first: first.to_string(),
                    second: name.clone(),
                });
            }
            if spec.min.is_some_and(f64::is_nan) || spec.max.is_some_and(f64::is_nan) {
                return Err(ConfigError::NanBound {
                    sensor: name.clone(),
                });
            }
            if !spec.is_status {
                let (Some(min), Some(max)) = (spec.min, spec.max) else {
                    return Err(ConfigError::MissingBounds {
                        sensor: name.clone(),
                    });
                };
                if min > max {
                    return Err(ConfigError::InvalidBounds {
                        sensor: name.clone(),
                        min,
                        max,
                    });
                }
            }
        }

        let mut warnings = Vec::new();
        if self.item_separator == self.kv_separator {
            let w = ConfigWarning::AmbiguousSeparators(self.item_separator.clone());
            warn!("{w}");
            warnings.push(w);
        }

        Ok(BuiltSchema {
            schema: SensorSchema {
                specs: self.specs,
                item_separator: self.item_separator,
                kv_separator: self.kv_separator,
                policy: self.policy,
            },
            warnings,
        })
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
