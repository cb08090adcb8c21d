//! # Connection
//!
//! Owns one TCP socket: multi-address fail-over connect, bounded send/receive
//! framed by an optional terminator, cooperative cancellation, and a
//! re-entrant lock so the same calling thread may nest `send` calls (the
//! command channel calls into the connection, which is itself invoked from
//! under the channel's own higher-level lock in some call paths).

use std::cell::RefCell;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;
use std::time::{Duration, Instant};

use parking_lot::ReentrantMutex;

use crate::error::AutoloaderError;

/// How often the receive loop polls the non-blocking socket and re-checks
/// the timeout and cancellation flag.
const POLL_INTERVAL: Duration = Duration::from_millis(500);
const RECEIVE_CHUNK: usize = 2048;
/// Bound on each candidate address's `connect` attempt, so one
/// black-holed host cannot stall `send` past the caller's own timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

static CANCEL_REQUESTED: AtomicBool = AtomicBool::new(false);
static INSTALL_HANDLER: Once = Once::new();

/// Install the process-wide Ctrl-C handler exactly once. Every `Connection`
/// constructed calls this; only the first call actually registers a
/// handler. This is the single cancellation signal that unblocks every
/// in-flight receive loop across every `Connection` in the process — one
/// INT cancels all of them.
fn install_cancel_handler() {
    INSTALL_HANDLER.call_once(|| {
        if let Err(err) = ctrlc::set_handler(|| {
            CANCEL_REQUESTED.store(true, Ordering::SeqCst);
        }) {
            log::warn!("failed to install Ctrl-C handler: {err}");
        }
    });
}

/// True if a cancellation has been requested (Ctrl-C, or a manual call to
/// [`request_cancel`]). Checked by every receive loop iteration.
pub fn is_cancelled() -> bool {
    CANCEL_REQUESTED.load(Ordering::SeqCst)
}

/// Manually request cancellation of all in-flight receives, as if Ctrl-C had
/// been pressed.
pub fn request_cancel() {
    CANCEL_REQUESTED.store(true, Ordering::SeqCst);
}

/// Clear a previously requested cancellation so subsequent operations are
/// not immediately cancelled. Mostly useful for tests and for embedding
/// applications that want to resume after handling a Ctrl-C.
pub fn clear_cancel() {
    CANCEL_REQUESTED.store(false, Ordering::SeqCst);
}

struct State {
    socket: Option<TcpStream>,
    address_active: Option<String>,
}

impl State {
    fn disconnect(&mut self) {
        self.socket = None;
        self.address_active = None;
    }
}

/// One TCP connection to the device, with fail-over across candidate
/// addresses and lazy (re)connection.
pub struct Connection {
    addresses: Vec<String>,
    port: u16,
    terminator: Option<Vec<u8>>,
    state: ReentrantMutex<RefCell<State>>,
}

impl Connection {
    /// Record the candidate addresses, port, and optional terminator
    /// sequence. Performs no network I/O.
    pub fn new(addresses: Vec<String>, port: u16, terminator: Option<Vec<u8>>) -> Self {
        install_cancel_handler();
        Connection {
            addresses,
            port,
            terminator,
            state: ReentrantMutex::new(RefCell::new(State {
                socket: None,
                address_active: None,
            })),
        }
    }

    /// The address currently in use, if connected.
    pub fn address_active(&self) -> Option<String> {
        self.state.lock().borrow().address_active.clone()
    }

    /// Send `msg` and return the response, observing `timeout` and the
    /// process-wide cancellation flag. On any failure the socket is closed
    /// so the next call reconnects.
    pub fn send(&self, msg: &[u8], timeout: Duration) -> Result<Vec<u8>, AutoloaderError> {
        let guard = self.state.lock();
        let outcome = (|| {
            let start = Instant::now();
            {
                let mut state = guard.borrow_mut();
                if state.socket.is_none() {
                    self.connect(&mut state)?;
                }
            }
            {
                let mut state = guard.borrow_mut();
                let socket = state.socket.as_mut().expect("connected above");
                Self::write_all(socket, msg, start, timeout)?;
            }
            let mut state = guard.borrow_mut();
            let socket = state.socket.as_mut().expect("connected above");
            Self::read_response(socket, &self.terminator, start, timeout)
        })();

        if outcome.is_err() {
            guard.borrow_mut().disconnect();
        }
        outcome
    }

    /// Iterate candidate addresses in order, first success wins. A prior
    /// working address is not preferred on reconnect — the search always
    /// restarts at the head of the list.
    fn connect(&self, state: &mut State) -> Result<(), AutoloaderError> {
        state.disconnect();
        let mut last_err: Option<std::io::Error> = None;
        for address in &self.addresses {
            if is_cancelled() {
                return Err(AutoloaderError::Cancelled);
            }
            let resolved = match (address.as_str(), self.port).to_socket_addrs() {
                Ok(addrs) => addrs,
                Err(err) => {
                    last_err = Some(err);
                    continue;
                }
            };
            let mut stream = None;
            for addr in resolved {
                match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
                    Ok(socket) => {
                        stream = Some(socket);
                        break;
                    }
                    Err(err) => last_err = Some(err),
                }
            }
            let Some(stream) = stream else { continue };
            if let Err(err) = stream.set_nonblocking(true) {
                last_err = Some(err);
                continue;
            }
            log::debug!("connected to {address}:{}", self.port);
            state.socket = Some(stream);
            state.address_active = Some(address.clone());
            return Ok(());
        }
        match last_err {
            Some(err) => Err(AutoloaderError::Io(err)),
            None => Err(AutoloaderError::ConnectionFailed),
        }
    }

    fn write_all(
        socket: &mut TcpStream,
        msg: &[u8],
        start: Instant,
        timeout: Duration,
    ) -> Result<(), AutoloaderError> {
        let mut written = 0;
        while written < msg.len() {
            if is_cancelled() {
                return Err(AutoloaderError::Cancelled);
            }
            if start.elapsed() > timeout {
                return Err(AutoloaderError::Timeout);
            }
            match socket.write(&msg[written..]) {
                Ok(0) => {
                    return Err(AutoloaderError::Io(std::io::Error::new(
                        std::io::ErrorKind::ConnectionAborted,
                        "connection closed while writing",
                    )));
                }
                Ok(n) => written += n,
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(err) => return Err(AutoloaderError::Io(err)),
            }
        }
        Ok(())
    }

    fn read_response(
        socket: &mut TcpStream,
        terminator: &Option<Vec<u8>>,
        start: Instant,
        timeout: Duration,
    ) -> Result<Vec<u8>, AutoloaderError> {
        let mut accumulator: Vec<u8> = Vec::new();
        let mut chunk = [0u8; RECEIVE_CHUNK];
        loop {
            if is_cancelled() {
                return Err(AutoloaderError::Cancelled);
            }
            if start.elapsed() > timeout {
                return Err(AutoloaderError::Timeout);
            }
            match socket.read(&mut chunk) {
                Ok(0) => {
                    return Err(AutoloaderError::Io(std::io::Error::new(
                        std::io::ErrorKind::ConnectionAborted,
                        "connection closed while reading",
                    )));
                }
                Ok(n) => {
                    accumulator.extend_from_slice(&chunk[..n]);
                    match terminator {
                        Some(t) => {
                            if let Some(end) = find_subslice(&accumulator, t) {
                                let cut = end + t.len();
                                accumulator.truncate(cut);
                                return Ok(accumulator);
                            }
                        }
                        None => return Ok(accumulator),
                    }
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(err) => return Err(AutoloaderError::Io(err)),
            }
        }
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn fails_over_to_second_address() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(b"pong\r\n").unwrap();
        });

        // "autoloader.invalid" (RFC 2606 reserved TLD) never resolves, so
        // the connection must fail over to 127.0.0.1.
        let conn = Connection::new(
            vec!["autoloader.invalid".to_string(), "127.0.0.1".to_string()],
            port,
            Some(vec![b'\r', b'\n']),
        );
        let resp = conn.send(b"ping", Duration::from_secs(2)).unwrap();
        assert_eq!(resp, b"pong\r\n");
        handle.join().unwrap();
    }

    #[test]
    fn find_subslice_locates_terminator() {
        assert_eq!(find_subslice(b"abcde", b"cd"), Some(2));
        assert_eq!(find_subslice(b"abcde", b"zz"), None);
    }
}
