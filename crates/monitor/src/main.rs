//! # Sensor Monitor
//!
//! Monitor serial sem interface gráfica. Lê linhas `CHAVE:valor` do
//! dispositivo, decodifica com o schema de `serial_settings.json` e mantém
//! o último valor de cada sensor.
//!
//! ## Uso
//! ```bash
//! sensor_monitor --port /dev/ttyUSB0 --baud 115200
//! sensor_monitor --replay captura.txt
//! sensor_monitor --list-ports
//! ```
//!
//! Linhas digitadas no terminal são enviadas ao dispositivo. `/NOME` envia
//! o comando rápido `NOME`, `/reload` relê as configurações e `/quit` sai.
//! `/loop [ms]` reenvia o último payload periodicamente (padrão 1000 ms,
//! 10..=10000) e `/loop off` desliga; `--auto-send-ms` liga desde o início.

mod board;
mod serial_thread;
mod session;

use clap::{Parser, ValueEnum};
use crossbeam_channel::{Receiver, bounded, never, select, tick};
use sensor_core::Settings;
use serial_thread::{SerialEvent, SerialHandle, SerialOptions};
use session::{AUTO_SEND_MAX_MS, AUTO_SEND_MIN_MS, InputAction, Session};
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ParityArg {
    None,
    Odd,
    Even,
}

#[derive(Debug, Parser)]
#[command(name = "sensor_monitor", version, about = "Monitor serial de sensores")]
struct Args {
    /// Porta serial (ex: /dev/ttyUSB0, COM3)
    #[arg(short, long)]
    port: Option<String>,

    #[arg(short, long, default_value_t = 115_200)]
    baud: u32,

    #[arg(long, default_value_t = 8, value_parser = clap::value_parser!(u8).range(5..=8))]
    data_bits: u8,

    #[arg(long, value_enum, default_value_t = ParityArg::None)]
    parity: ParityArg,

    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=2))]
    stop_bits: u8,

    /// Arquivo de configurações (padrão: serial_settings.json ao lado do executável)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Reproduz uma captura em vez de abrir uma porta
    #[arg(long, conflicts_with = "port")]
    replay: Option<PathBuf>,

    /// Intervalo entre linhas no replay (ms)
    #[arg(long, default_value_t = 0)]
    replay_interval_ms: u64,

    /// Mostra os dados recebidos em HEX
    #[arg(long)]
    hex_display: bool,

    /// Interpreta o texto digitado como HEX
    #[arg(long)]
    hex_send: bool,

    /// Reenvia o último payload a cada N ms
    #[arg(
        long,
        value_parser = clap::value_parser!(u64).range(AUTO_SEND_MIN_MS..=AUTO_SEND_MAX_MS)
    )]
    auto_send_ms: Option<u64>,

    /// Lista as portas disponíveis e sai
    #[arg(long)]
    list_ports: bool,
}

impl Args {
    fn serial_options(&self, port_name: String) -> SerialOptions {
        SerialOptions {
            port_name,
            baud_rate: self.baud,
            data_bits: match self.data_bits {
                5 => serialport::DataBits::Five,
                6 => serialport::DataBits::Six,
                7 => serialport::DataBits::Seven,
                _ => serialport::DataBits::Eight,
            },
            parity: match self.parity {
                ParityArg::None => serialport::Parity::None,
                ParityArg::Odd => serialport::Parity::Odd,
                ParityArg::Even => serialport::Parity::Even,
            },
            stop_bits: match self.stop_bits {
                2 => serialport::StopBits::Two,
                _ => serialport::StopBits::One,
            },
        }
    }
}

fn main() -> ExitCode {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    if args.list_ports {
        let ports = serial_thread::list_ports();
        if ports.is_empty() {
            println!("Nenhuma porta serial disponível");
        }
        for (name, kind) in ports {
            println!("{name}\t{kind}");
        }
        return ExitCode::SUCCESS;
    }

    // ── Config ──
    let settings_path = args.settings.clone().unwrap_or_else(Settings::default_path);
    let settings = Settings::load(&settings_path);

    // Salva config padrão se não existir
    if !settings_path.exists() {
        if let Err(e) = settings.save(&settings_path) {
            warn!("Não foi possível salvar configurações padrão: {e}");
        }
    }

    for problem in settings.validate() {
        warn!("Configuração: {problem}");
    }
    let schema = match settings.schema() {
        Ok(built) => built.schema,
        Err(e) => {
            error!("Schema de sensores inválido: {e}");
            return ExitCode::FAILURE;
        }
    };
    // ── Fonte de dados ──
    let handle = match (&args.replay, &args.port) {
        (Some(path), _) => serial_thread::spawn_replay_thread(
            path.clone(),
            Duration::from_millis(args.replay_interval_ms),
        ),
        (None, Some(port)) => serial_thread::spawn_serial_thread(args.serial_options(port.clone())),
        (None, None) => {
            error!("Informe --port ou --replay (veja --list-ports)");
            return ExitCode::FAILURE;
        }
    };
    let handle = match handle {
        Ok(handle) => handle,
        Err(e) => {
            error!("Falha ao iniciar a leitura: {e}");
            return ExitCode::FAILURE;
        }
    };

    let session = Session::new(settings_path, settings, schema, args.hex_display, args.hex_send);
    info!("{} sensores configurados", session.schema().len());
    let auto_send = args.auto_send_ms.map(Duration::from_millis);
    run(&handle, session, spawn_stdin_thread(), auto_send)
}

/// Lê o stdin numa thread e entrega linha a linha.
fn spawn_stdin_thread() -> Receiver<String> {
    let (tx, rx) = bounded::<String>(16);
    let spawned = std::thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        warn!("Sem entrada do terminal: {e}");
    }
    rx
}

enum Next {
    Serial(Result<SerialEvent, crossbeam_channel::RecvError>),
    Input(Result<String, crossbeam_channel::RecvError>),
    Tick,
}

fn ticker(interval: Option<Duration>) -> Receiver<Instant> {
    match interval {
        Some(interval) => {
            info!("Envio automático a cada {} ms", interval.as_millis());
            tick(interval)
        }
        None => never(),
    }
}

fn run(
    handle: &SerialHandle,
    mut session: Session,
    mut stdin: Receiver<String>,
    auto_send: Option<Duration>,
) -> ExitCode {
    let mut failed = false;
    let mut auto = ticker(auto_send);

    loop {
        let next = select! {
            recv(handle.events()) -> evt => Next::Serial(evt),
            recv(stdin) -> line => Next::Input(line),
            recv(auto) -> _ => Next::Tick,
        };

        match next {
            Next::Serial(Ok(SerialEvent::Opened(name))) => info!("Conectado a {name}"),
            Next::Serial(Ok(SerialEvent::Rx(data))) => {
                session.on_rx(&data);
            }
            Next::Serial(Ok(SerialEvent::Tx(n))) => debug!("TX: {n} bytes"),
            Next::Serial(Ok(SerialEvent::Error(e))) => {
                error!("{e}");
                failed = true;
            }
            Next::Serial(Ok(SerialEvent::Closed) | Err(_)) => {
                session.on_closed();
                info!("Porta fechada – {}", session.board().summary());
                break;
            }
            Next::Input(Ok(line)) => match session.on_input(&line) {
                InputAction::Send(data) => {
                    if let Err(e) = handle.send(data) {
                        warn!("Falha ao enviar: {e}");
                    }
                }
                InputAction::AutoSend(interval) => {
                    if interval.is_none() {
                        info!("Envio automático desligado");
                    }
                    auto = ticker(interval);
                }
                InputAction::Quit => handle.close(),
                InputAction::None => {}
            },
            Next::Tick => {
                // Nada digitado ainda: o tick passa em branco
                if let Some(data) = session.auto_payload() {
                    if let Err(e) = handle.send(data) {
                        warn!("Falha ao enviar: {e}");
                    }
                }
            }
            // stdin fechado: continua só com a porta
            Next::Input(Err(_)) => stdin = never(),
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
