//! Estado de uma sessão de monitoramento: schema ativo, painel e framer.

use crate::board::Board;
use sensor_core::protocol::{decode_rx, encode_tx};
use sensor_core::{LineFramer, SensorSchema, Settings, parse_bytes};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Intervalo de envio automático aceito, em milissegundos.
pub const AUTO_SEND_MIN_MS: u64 = 10;
pub const AUTO_SEND_MAX_MS: u64 = 10_000;
pub const AUTO_SEND_DEFAULT_MS: u64 = 1000;

/// Ação pedida por uma linha digitada no stdin.
#[derive(Debug, PartialEq, Eq)]
pub enum InputAction {
    Send(Vec<u8>),
    /// Liga (`Some`) ou desliga (`None`) o reenvio periódico
    AutoSend(Option<Duration>),
    Quit,
    None,
}

/// Converte o argumento de `/loop` num intervalo válido.
pub fn parse_auto_interval(arg: &str) -> Option<Duration> {
    let ms = match arg.trim() {
        "" => AUTO_SEND_DEFAULT_MS,
        raw => raw.parse::<u64>().ok()?,
    };
    (AUTO_SEND_MIN_MS..=AUTO_SEND_MAX_MS)
        .contains(&ms)
        .then(|| Duration::from_millis(ms))
}

pub struct Session {
    settings_path: PathBuf,
    settings: Settings,
    schema: SensorSchema,
    board: Board,
    framer: LineFramer,
    hex_display: bool,
    hex_send: bool,
    last_sent: Option<Vec<u8>>,
}

impl Session {
    pub fn new(
        settings_path: PathBuf,
        settings: Settings,
        schema: SensorSchema,
        hex_display: bool,
        hex_send: bool,
    ) -> Self {
        let board = Board::new(&schema);
        Self {
            settings_path,
            settings,
            schema,
            board,
            framer: LineFramer::new(),
            hex_display,
            hex_send,
            last_sent: None,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn schema(&self) -> &SensorSchema {
        &self.schema
    }

    /// Último payload enviado, reenviado a cada tick do envio automático.
    pub fn auto_payload(&self) -> Option<Vec<u8>> {
        self.last_sent.clone()
    }

    /// Processa um bloco recebido. Retorna quantas linhas foram decodificadas.
    pub fn on_rx(&mut self, data: &[u8]) -> usize {
        debug!("RX: {}", decode_rx(data, self.hex_display).as_str());
        let lines = self.framer.push(data);
        let count = lines.len();
        for line in lines {
            self.apply_line(&line);
        }
        count
    }

    /// Processa o resto do buffer quando a porta fecha.
    pub fn on_closed(&mut self) {
        if let Some(line) = self.framer.flush() {
            self.apply_line(&line);
        }
    }

    fn apply_line(&mut self, line: &[u8]) {
        let reading = parse_bytes(line, &self.schema);
        for w in &reading.warnings {
            warn!("Não foi possível usar '{}' para '{}': {}", w.raw, w.sensor, w.reason);
        }
        if self.board.apply(&reading) == 0 {
            return;
        }
        for name in reading.values.keys() {
            if let Some(f) = self.board.fraction(name) {
                debug!("{name}: {:.0}% do gauge", f * 100.0);
            }
        }
        info!("{}", self.board.summary());
    }

    /// Interpreta uma linha digitada.
    ///
    /// `/quit` encerra, `/reload` relê as configurações, `/loop [ms]` e
    /// `/loop off` controlam o envio automático, `/NOME` envia o comando
    /// rápido `NOME`; qualquer outro texto é enviado como está.
    pub fn on_input(&mut self, input: &str) -> InputAction {
        let action = self.interpret(input.trim());
        if let InputAction::Send(data) = &action {
            self.last_sent = Some(data.clone());
        }
        action
    }

    fn interpret(&mut self, input: &str) -> InputAction {
        let text = match input.strip_prefix('/') {
            Some("quit") => return InputAction::Quit,
            Some("reload") => {
                self.reload();
                return InputAction::None;
            }
            Some("loop off") => return InputAction::AutoSend(None),
            Some(cmd) if cmd == "loop" || cmd.starts_with("loop ") => {
                let arg = &cmd["loop".len()..];
                return match parse_auto_interval(arg) {
                    Some(interval) => InputAction::AutoSend(Some(interval)),
                    None => {
                        warn!(
                            "Intervalo inválido '{}': use {AUTO_SEND_MIN_MS}..={AUTO_SEND_MAX_MS} ms",
                            arg.trim()
                        );
                        InputAction::None
                    }
                };
            }
            Some(name) => match self.settings.command(name) {
                // Comandos rápidos são sempre texto
                Some(cmd) => return InputAction::Send(cmd.as_bytes().to_vec()),
                None => {
                    warn!("Comando rápido desconhecido: {name}");
                    return InputAction::None;
                }
            },
            None => input,
        };

        match encode_tx(text, self.hex_send) {
            Ok(data) => InputAction::Send(data),
            Err(e) => {
                warn!("Envio ignorado: {e}");
                InputAction::None
            }
        }
    }

    /// Relê as configurações. O schema só é substituído se o novo for válido.
    pub fn reload(&mut self) -> bool {
        let (next, built) = match Settings::load_schema(&self.settings_path) {
            Ok(loaded) => loaded,
            Err(e) => {
                error!(
                    "Falha ao recarregar {}, mantendo o schema atual: {e}",
                    self.settings_path.display()
                );
                return false;
            }
        };
        if next.clears_data_format(&self.settings) {
            warn!("Novas configurações não definem nenhum sensor");
        }

        self.board = Board::new(&built.schema);
        self.schema = built.schema;
        self.settings = next;
        info!("Configurações recarregadas: {} sensores", self.schema.len());
        true
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use sensor_core::FormatEntry;

    fn session_at(path: PathBuf, settings: Settings) -> Session {
        let schema = settings.schema().unwrap().schema;
        Session::new(path, settings, schema, false, false)
    }

    fn session() -> Session {
        session_at(PathBuf::from("nao_existe.json"), Settings::default())
    }

    #[test]
    fn rx_chunks_update_board() {
        let mut s = session();
        assert_eq!(s.on_rx(b"T:2"), 0);
        assert_eq!(s.on_rx(b"5.5,ST:2\r\nBAT:9\n"), 2);
        let summary = s.board().summary();
        assert!(summary.contains("temperature=25.5℃"), "{summary}");
        assert!(summary.contains("status=manual-control"), "{summary}");
        assert!(summary.contains("battery=4.2V"), "{summary}");
    }

    #[test]
    fn closing_flushes_partial_line() {
        let mut s = session();
        s.on_rx(b"H:77");
        s.on_closed();
        assert!(s.board().summary().contains("humidity=77.0%"));
    }

    #[test]
    fn input_commands() {
        let mut s = session();
        assert_eq!(s.on_input("/quit"), InputAction::Quit);
        assert_eq!(s.on_input("/forward"), InputAction::Send(b"CMD:FWD".to_vec()));
        assert_eq!(s.on_input("/desconhecido"), InputAction::None);
        assert_eq!(s.on_input(" hello "), InputAction::Send(b"hello".to_vec()));
        assert_eq!(s.on_input("   "), InputAction::None);
    }

    #[test]
    fn hex_send_mode() {
        let settings = Settings::default();
        let schema = settings.schema().unwrap().schema;
        let mut s = Session::new(PathBuf::from("x.json"), settings, schema, false, true);
        assert_eq!(s.on_input("0102 03"), InputAction::Send(vec![1, 2, 3]));
        assert_eq!(s.on_input("zz"), InputAction::None);
        // Comandos rápidos não passam pelo modo HEX
        assert_eq!(s.on_input("/stop"), InputAction::Send(b"CMD:STOP".to_vec()));
    }

    #[test]
    fn loop_commands() {
        let mut s = session();
        assert_eq!(
            s.on_input("/loop 500"),
            InputAction::AutoSend(Some(Duration::from_millis(500)))
        );
        assert_eq!(
            s.on_input("/loop"),
            InputAction::AutoSend(Some(Duration::from_millis(1000)))
        );
        assert_eq!(s.on_input("/loop off"), InputAction::AutoSend(None));
        // Fora do intervalo ou não numérico
        assert_eq!(s.on_input("/loop 5"), InputAction::None);
        assert_eq!(s.on_input("/loop 10001"), InputAction::None);
        assert_eq!(s.on_input("/loop abc"), InputAction::None);
        // O comando rápido "auto" continua disponível
        assert_eq!(s.on_input("/auto"), InputAction::Send(b"CMD:AUTO".to_vec()));
    }

    #[test]
    fn auto_interval_bounds_are_inclusive() {
        assert_eq!(parse_auto_interval("10"), Some(Duration::from_millis(10)));
        assert_eq!(
            parse_auto_interval(" 10000 "),
            Some(Duration::from_millis(10_000))
        );
        assert_eq!(parse_auto_interval("9"), None);
        assert_eq!(parse_auto_interval("-1"), None);
    }

    #[test]
    fn auto_payload_repeats_last_send() {
        let mut s = session();
        assert_eq!(s.auto_payload(), None);

        s.on_input("T:1");
        assert_eq!(s.auto_payload(), Some(b"T:1".to_vec()));
        s.on_input("/left");
        assert_eq!(s.auto_payload(), Some(b"CMD:LEFT".to_vec()));

        // Entradas que não enviam nada mantêm o último payload
        s.on_input("/loop 200");
        s.on_input("   ");
        assert_eq!(s.auto_payload(), Some(b"CMD:LEFT".to_vec()));
    }

    #[test]
    fn reload_replaces_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("serial_settings.json");
        let mut s = session_at(path.clone(), Settings::default());

        let mut next = Settings::default();
        next.data_format.clear();
        next.data_format
            .insert("pressure".into(), FormatEntry::numeric("P", "hPa", 900.0, 1100.0));
        next.save(&path).unwrap();

        assert!(s.reload());
        assert_eq!(s.schema().len(), 1);
        s.on_rx(b"P:1013\n");
        assert_eq!(s.board().summary(), "pressure=1013.0hPa");
    }

    #[test]
    fn invalid_reload_keeps_previous_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("serial_settings.json");
        let mut s = session_at(path.clone(), Settings::default());

        let mut bad = Settings::default();
        bad.data_format
            .insert("dup".into(), FormatEntry::numeric("T", "", 0.0, 1.0));
        bad.save(&path).unwrap();

        assert!(!s.reload());
        assert_eq!(s.schema().len(), 8);
        s.on_rx(b"T:20\n");
        assert!(s.board().summary().contains("temperature=20.0℃"));
    }

    #[test]
    fn missing_file_reload_fails() {
        let mut s = session();
        assert!(!s.reload());
        assert_eq!(s.schema().len(), 8);
    }
}
