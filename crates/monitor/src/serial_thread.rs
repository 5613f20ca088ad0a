//! Thread da porta serial: lê blocos e envia para o loop principal via channel.

use crossbeam_channel::{Receiver, Sender, unbounded};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Parâmetros de abertura da porta.
#[derive(Debug, Clone)]
pub struct SerialOptions {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: serialport::DataBits,
    pub parity: serialport::Parity,
    pub stop_bits: serialport::StopBits,
}

/// Evento enviado da thread serial para o loop principal.
#[derive(Debug, Clone)]
pub enum SerialEvent {
    Opened(String),
    Rx(Vec<u8>),
    Tx(usize),
    Error(String),
    Closed,
}

enum Command {
    Send(Vec<u8>),
    Close,
}

/// Canais de comunicação com uma thread de leitura.
pub struct SerialHandle {
    tx_cmd: Sender<Command>,
    rx_evt: Receiver<SerialEvent>,
}

impl SerialHandle {
    pub fn send(&self, data: Vec<u8>) -> Result<(), String> {
        self.tx_cmd
            .send(Command::Send(data))
            .map_err(|e| e.to_string())
    }

    pub fn close(&self) {
        let _ = self.tx_cmd.send(Command::Close);
    }

    pub fn events(&self) -> &Receiver<SerialEvent> {
        &self.rx_evt
    }
}

/// Lista as portas disponíveis como `(nome, tipo)`.
pub fn list_ports() -> Vec<(String, &'static str)> {
    serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .map(|info| {
            let kind = match info.port_type {
                serialport::SerialPortType::UsbPort(_) => "USB",
                serialport::SerialPortType::PciPort => "PCI",
                serialport::SerialPortType::BluetoothPort => "Bluetooth",
                serialport::SerialPortType::Unknown => "Unknown",
            };
            (info.port_name, kind)
        })
        .collect()
}

/// Abre a porta numa thread dedicada.
pub fn spawn_serial_thread(opts: SerialOptions) -> std::io::Result<SerialHandle> {
    let (tx_cmd, rx_cmd) = unbounded::<Command>();
    let (tx_evt, rx_evt) = unbounded::<SerialEvent>();

    std::thread::Builder::new()
        .name("serial-reader".into())
        .spawn(move || serial_loop(&opts, &rx_cmd, &tx_evt))?;

    Ok(SerialHandle { tx_cmd, rx_evt })
}

fn serial_loop(opts: &SerialOptions, rx_cmd: &Receiver<Command>, tx_evt: &Sender<SerialEvent>) {
    let opened = serialport::new(&opts.port_name, opts.baud_rate)
        .data_bits(opts.data_bits)
        .parity(opts.parity)
        .stop_bits(opts.stop_bits)
        .timeout(READ_TIMEOUT)
        .open();

    let mut port = match opened {
        Ok(port) => port,
        Err(e) => {
            let _ = tx_evt.send(SerialEvent::Error(format!("Falha ao abrir a porta: {e}")));
            let _ = tx_evt.send(SerialEvent::Closed);
            return;
        }
    };

    info!("Porta {} aberta a {} baud", opts.port_name, opts.baud_rate);
    let _ = tx_evt.send(SerialEvent::Opened(opts.port_name.clone()));

    let mut buf = [0u8; 4096];
    loop {
        match port.read(&mut buf) {
            Ok(n) if n > 0 => {
                let _ = tx_evt.send(SerialEvent::Rx(buf[..n].to_vec()));
            }
            Ok(_) => {}
            Err(ref e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                // Timeout normal, continua
            }
            Err(e) => {
                let _ = tx_evt.send(SerialEvent::Error(format!("Erro de leitura: {e}")));
                let _ = tx_evt.send(SerialEvent::Closed);
                return;
            }
        }

        while let Ok(cmd) = rx_cmd.try_recv() {
            match cmd {
                Command::Send(data) => match port.write_all(&data) {
                    Ok(()) => {
                        let _ = tx_evt.send(SerialEvent::Tx(data.len()));
                    }
                    Err(e) => {
                        let _ = tx_evt.send(SerialEvent::Error(e.to_string()));
                    }
                },
                Command::Close => {
                    let _ = tx_evt.send(SerialEvent::Closed);
                    return;
                }
            }
        }
    }
}

/// Reproduz uma captura de texto como se viesse da porta, linha a linha.
pub fn spawn_replay_thread(path: PathBuf, interval: Duration) -> std::io::Result<SerialHandle> {
    let file = std::fs::File::open(&path)?;
    let (tx_cmd, rx_cmd) = unbounded::<Command>();
    let (tx_evt, rx_evt) = unbounded::<SerialEvent>();

    std::thread::Builder::new()
        .name("serial-replay".into())
        .spawn(move || {
            let _ = tx_evt.send(SerialEvent::Opened(path.display().to_string()));
            let mut reader = BufReader::new(file);
            let mut line = Vec::new();
            loop {
                line.clear();
                match reader.read_until(b'\n', &mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        let _ = tx_evt.send(SerialEvent::Rx(line.clone()));
                    }
                    Err(e) => {
                        let _ = tx_evt.send(SerialEvent::Error(format!("Erro de leitura: {e}")));
                        break;
                    }
                }

                while let Ok(cmd) = rx_cmd.try_recv() {
                    match cmd {
                        Command::Send(data) => {
                            debug!("Replay: descartando {} bytes enviados", data.len());
                            let _ = tx_evt.send(SerialEvent::Tx(data.len()));
                        }
                        Command::Close => {
                            let _ = tx_evt.send(SerialEvent::Closed);
                            return;
                        }
                    }
                }
                if !interval.is_zero() {
                    std::thread::sleep(interval);
                }
            }
            if let Err(e) = tx_evt.send(SerialEvent::Closed) {
                warn!("Loop principal encerrado antes do fim do replay: {e}");
            }
        })?;

    Ok(SerialHandle { tx_cmd, rx_evt })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_emits_lines_then_closes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.txt");
        std::fs::write(&path, "T:25\r\nH:40\nST:1").unwrap();

        let handle = spawn_replay_thread(path, Duration::ZERO).unwrap();
        let events: Vec<_> = handle.events().iter().collect();

        assert!(matches!(events.first(), Some(SerialEvent::Opened(_))));
        let rx: Vec<Vec<u8>> = events
            .iter()
            .filter_map(|e| match e {
                SerialEvent::Rx(data) => Some(data.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(rx, vec![b"T:25\r\n".to_vec(), b"H:40\n".to_vec(), b"ST:1".to_vec()]);
        assert!(matches!(events.last(), Some(SerialEvent::Closed)));
    }

    #[test]
    fn replay_missing_file_fails() {
        assert!(spawn_replay_thread(PathBuf::from("/nao/existe.txt"), Duration::ZERO).is_err());
    }
}
