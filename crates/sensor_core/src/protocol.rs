//! Codecs da porta serial: texto/HEX na recepção e no envio, e
//! enquadramento de linhas.
//!
//! Formato das linhas enviadas pelo dispositivo:
//!
//! ```text
//! T:23.4,H:61,L:820,SM:40,BAT:3.91,SOL:5.2,SPD:0,ST:1\r\n
//! ```

use std::fmt::Write as _;
use tracing::warn;

/// Tamanho máximo de uma linha antes de ser descartada.
pub const MAX_LINE_LEN: usize = 4096;

/// Erros de codificação para envio.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("Nada para enviar")]
    Empty,

    #[error("Dígito HEX inválido '{digit}' na posição {position}")]
    InvalidHex { digit: char, position: usize },
}

/// Texto pronto para exibição de um bloco recebido.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RxText {
    Text(String),
    /// Bytes em HEX, por escolha ou porque não eram UTF-8
    Hex(String),
}

impl RxText {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(s) | Self::Hex(s) => s,
        }
    }
}

/// Formata bytes como `"54 3A 32"`.
pub fn format_hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02X}");
    }
    out
}

/// Decodifica bytes recebidos, caindo para HEX se não forem UTF-8.
pub fn decode_rx(data: &[u8], hex_display: bool) -> RxText {
    if hex_display {
        return RxText::Hex(format_hex(data));
    }
    match std::str::from_utf8(data) {
        Ok(text) => RxText::Text(text.to_string()),
        Err(_) => RxText::Hex(format_hex(data)),
    }
}

/// Codifica o texto digitado para envio.
///
/// Em modo HEX, espaços e quebras de linha são ignorados e uma quantidade
/// ímpar de dígitos é completada com `0` à direita.
pub fn encode_tx(text: &str, hex_send: bool) -> Result<Vec<u8>, CodecError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CodecError::Empty);
    }
    if !hex_send {
        return Ok(text.as_bytes().to_vec());
    }

    let mut digits = Vec::with_capacity(text.len() + 1);
    for (position, c) in text.chars().enumerate() {
        if c.is_whitespace() {
            continue;
        }
        let Some(d) = c.to_digit(16) else {
            return Err(CodecError::InvalidHex { digit: c, position });
        };
        digits.push(d as u8);
    }
    if digits.len() % 2 != 0 {
        digits.push(0);
    }

    Ok(digits.chunks(2).map(|pair| (pair[0] << 4) | pair[1]).collect())
}

/// Acumula blocos recebidos e devolve linhas completas.
///
/// Linhas terminam em `\n`; um `\r` final é removido.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: Vec<u8>,
    discarding: bool,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alimenta um bloco e retorna as linhas que ficaram completas.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' {
                if self.discarding {
                    self.discarding = false;
                } else {
                    let mut line = std::mem::take(&mut self.buf);
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                    lines.push(line);
                }
                self.buf.clear();
                continue;
            }
            if self.discarding {
                continue;
            }
            if self.buf.len() >= MAX_LINE_LEN {
                warn!("Linha excedeu {MAX_LINE_LEN} bytes, descartando");
                self.buf.clear();
                self.discarding = true;
                continue;
            }
            self.buf.push(byte);
        }
        lines
    }

    /// Bytes pendentes sem terminador.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Devolve o resto do buffer como uma última linha.
    pub fn flush(&mut self) -> Option<Vec<u8>> {
        self.discarding = false;
        if self.buf.is_empty() {
            return None;
        }
        let mut line = std::mem::take(&mut self.buf);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(line)
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
