//! Tabela fixa de códigos de status do dispositivo.

/// Rótulo exibido antes de qualquer linha chegar.
pub const DEFAULT_STATUS_LABEL: &str = "idle";

/// Código → rótulo. Apenas estes cinco literais são reconhecidos.
pub const STATUS_TABLE: [(&str, &str); 5] = [
    ("0", "idle"),
    ("1", "auto-monitor"),
    ("2", "manual-control"),
    ("3", "charging"),
    ("4", "alarm"),
];

/// Retorna o rótulo para `raw`, ou o próprio `raw` se o código for desconhecido.
pub fn resolve_status(raw: &str) -> &str {
    lookup(raw).unwrap_or(raw)
}

pub fn is_known_status(raw: &str) -> bool {
    lookup(raw).is_some()
}

fn lookup(raw: &str) -> Option<&'static str> {
    STATUS_TABLE
        .iter()
        .find(|(code, _)| *code == raw)
        .map(|(_, label)| *label)
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
