//! The reader/writer/pinger OS threads that drive one UDP connection,
//! grounded directly in the teacher's `UdpClientSocket::split` (a
//! reader thread looping on `socket.recv`, a writer thread draining an
//! `mpsc::Receiver`, and a monitor thread on a sleep-poll loop —
//! here repurposed from fragment-resend to keep-alive pinging, §5).

use crate::errors::*;
use crate::protocol::OuterFrame;
use crate::reliability::Reliability;
use slog::Logger;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const PINGER_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One event the reader thread hands to the session's owning thread.
pub enum ReaderEvent {
    /// A full datagram arrived
    Datagram(Vec<u8>),
    /// No datagram arrived within the socket's read timeout
    Timeout,
}

/// A live UDP connection split into its reader/writer/pinger threads.
/// Dropping this stops all three (the writer and pinger exit once their
/// channel senders are dropped; the reader exits on its next recv error
/// once the socket is closed by `Drop`).
pub struct UdpTransport {
    write_tx: mpsc::Sender<Vec<u8>>,
    reader_rx: mpsc::Receiver<ReaderEvent>,
    ready: Arc<AtomicBool>,
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

impl UdpTransport {
    /// Binds an ephemeral local port, connects it to `remote`, and
    /// spawns the reader/writer/pinger threads. The pinger stays
    /// dormant (per §4.5/§4.4, pings only while `ready`) until
    /// [`UdpTransport::mark_ready`] is called.
    pub fn connect(
        logger: Logger,
        remote: SocketAddr,
        recv_timeout: Duration,
        reliability: Arc<Mutex<Reliability>>,
    ) -> Result<UdpTransport> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        socket.connect(remote)?;
        socket.set_read_timeout(Some(recv_timeout))?;
        let write_socket = socket.try_clone()?;

        let (reader_tx, reader_rx) = mpsc::channel();
        let (write_tx, write_rx) = mpsc::channel::<Vec<u8>>();
        let ready = Arc::new(AtomicBool::new(false));

        {
            let logger = logger.new(o!("role" => "reader", "remote" => remote.to_string()));
            thread::spawn(move || {
                let mut buf = [0u8; 1500];
                loop {
                    match socket.recv(&mut buf) {
                        Ok(n) => {
                            if reader_tx.send(ReaderEvent::Datagram(buf[..n].to_vec())).is_err() {
                                break;
                            }
                        }
                        Err(ref e) if is_timeout(e) => {
                            if reader_tx.send(ReaderEvent::Timeout).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(logger, "reader thread exiting on socket error"; "error" => %e);
                            break;
                        }
                    }
                }
            });
        }

        {
            let logger = logger.new(o!("role" => "writer", "remote" => remote.to_string()));
            thread::spawn(move || {
                while let Ok(data) = write_rx.recv() {
                    if let Err(e) = write_socket.send(&data) {
                        warn!(logger, "writer thread exiting on socket error"; "error" => %e);
                        break;
                    }
                }
            });
        }

        {
            let write_tx = write_tx.clone();
            let ready = ready.clone();
            let logger = logger.new(o!("role" => "pinger", "remote" => remote.to_string()));
            thread::spawn(move || loop {
                thread::sleep(PINGER_POLL_INTERVAL);
                if !ready.load(Ordering::SeqCst) {
                    continue;
                }
                let mut rel = match reliability.lock() {
                    Ok(g) => g,
                    Err(_) => return,
                };
                if !rel.pinger_due() {
                    continue;
                }
                let id = match rel.next_id() {
                    Ok(id) => id,
                    Err(e) => {
                        warn!(logger, "pinger stopping: reliable id space exhausted"; "error" => %e);
                        return;
                    }
                };
                rel.mark_ping_sent();
                rel.track(id, None);
                drop(rel);
                match (OuterFrame::Ping { id }).encode() {
                    Ok(bytes) => {
                        if write_tx.send(bytes).is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!(logger, "failed to encode ping"; "error" => %e),
                }
            });
        }

        Ok(UdpTransport { write_tx, reader_rx, ready })
    }

    /// Marks the pinger active; called once the session reaches Ready.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Sends a raw datagram.
    pub fn send(&self, data: Vec<u8>) -> Result<()> {
        self.write_tx
            .send(data)
            .map_err(|_| ErrorKind::ConnectionClosed.into())
    }

    /// Blocks for the next reader event.
    pub fn recv_event(&self) -> Result<ReaderEvent> {
        self.reader_rx
            .recv()
            .map_err(|_| ErrorKind::ConnectionClosed.into())
    }

    /// Blocks for the next reader event, bounded by `timeout`,
    /// independent of the socket's own read timeout — used to bound
    /// the initial connect-timeout window distinctly from the
    /// steady-state recv-timeout.
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<ReaderEvent> {
        self.reader_rx.recv_timeout(timeout).ok()
    }
}
