use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use callwatch_core::AmiEvent;
use callwatch_config::AmiConfig;
use callwatch_events::{CallEventSubscriber, Reporter};

use crate::handler::{EventHandler, is_interesting};

use super::RunnerError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Read timeout also bounds how long a shutdown request can go unnoticed
const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Live connection to the switch's management interface.
///
/// Connects, logs in, and pumps the line-oriented event stream into the
/// engine. On connection loss the in-memory topology is dropped and the
/// runner reconnects after a configurable delay; calls in flight across
/// the gap are rebuilt from whatever events follow.
pub struct AmiRunner<S, R> {
    config: AmiConfig,
    handler: EventHandler<S, R>,
    running: Arc<AtomicBool>,
}

impl<S: CallEventSubscriber, R: Reporter> AmiRunner<S, R> {
    pub fn new(config: AmiConfig, subscriber: S, reporter: R) -> Self {
        Self {
            config,
            handler: EventHandler::new(subscriber, reporter),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Flag that stops the runner when cleared. Hand this to a signal
    /// handler.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn handler(&self) -> &EventHandler<S, R> {
        &self.handler
    }

    /// Connect and pump until the running flag is cleared. Connection
    /// losses reconnect forever; engine errors are fatal.
    pub fn run(&mut self) -> Result<(), RunnerError> {
        while self.running.load(Ordering::SeqCst) {
            match self.connect_and_pump() {
                Ok(()) => return Ok(()),
                Err(RunnerError::Engine(err)) => return Err(RunnerError::Engine(err)),
                Err(err) => {
                    if !self.running.load(Ordering::SeqCst) {
                        return Ok(());
                    }
                    tracing::warn!("connection lost ({}), reconnecting in {}s", err, self.config.reconnect_delay_secs);
                    // Stale topology is useless after a gap in the stream
                    self.handler.reset();
                    std::thread::sleep(Duration::from_secs(self.config.reconnect_delay_secs));
                }
            }
        }
        Ok(())
    }

    fn connect_and_pump(&mut self) -> Result<(), RunnerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        tracing::debug!("connecting to {}", addr);

        let sock_addr = addr
            .to_socket_addrs()
            .map_err(|e| RunnerError::ConnectionFailed(format!("invalid address {}: {}", addr, e)))?
            .next()
            .ok_or_else(|| RunnerError::ConnectionFailed(format!("no address for {}", addr)))?;
        let mut stream = TcpStream::connect_timeout(&sock_addr, CONNECT_TIMEOUT)
            .map_err(|e| RunnerError::ConnectionFailed(format!("connect to {}: {}", addr, e)))?;
        stream
            .set_read_timeout(Some(READ_TIMEOUT))
            .map_err(|e| RunnerError::ConnectionFailed(format!("set timeout: {}", e)))?;

        let mut reader = BufReader::new(
            stream
                .try_clone()
                .map_err(|e| RunnerError::ConnectionFailed(format!("clone stream: {}", e)))?,
        );

        // Banner line, e.g. "Asterisk Call Manager/5.0"
        let Some(banner) = self.read_line(&mut reader)? else {
            return Err(RunnerError::ConnectionFailed("closed before banner".to_string()));
        };
        tracing::info!("connected: {}", banner);

        self.login(&mut stream, &mut reader)?;

        // Pump frames until disconnect or shutdown
        while self.running.load(Ordering::SeqCst) {
            let Some(frame) = self.read_frame(&mut reader)? else {
                return Ok(());
            };
            if is_interesting(frame.name()) {
                self.handler.on_event(&frame)?;
            }
        }
        Ok(())
    }

    fn login(&mut self, stream: &mut TcpStream, reader: &mut BufReader<TcpStream>) -> Result<(), RunnerError> {
        let action = format!(
            "Action: Login\r\nUsername: {}\r\nSecret: {}\r\nEvents: on\r\n\r\n",
            self.config.username, self.config.secret
        );
        stream
            .write_all(action.as_bytes())
            .map_err(|e| RunnerError::ConnectionFailed(format!("send login: {}", e)))?;

        let Some(response) = self.read_frame(reader)? else {
            return Err(RunnerError::LoginFailed("closed during login".to_string()));
        };
        match response.get("Response") {
            Some("Success") => Ok(()),
            other => Err(RunnerError::LoginFailed(format!(
                "{} ({})",
                response.get("Message").unwrap_or("no message"),
                other.unwrap_or("no response")
            ))),
        }
    }

    /// One CRLF-terminated line. Read timeouts are used to poll the
    /// shutdown flag; partial lines survive them. `None` means the
    /// shutdown flag was cleared mid-read.
    fn read_line(&self, reader: &mut BufReader<TcpStream>) -> Result<Option<String>, RunnerError> {
        let mut buf: Vec<u8> = Vec::new();
        loop {
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => {
                    return Err(RunnerError::ReadFailed("connection closed".to_string()));
                }
                Ok(_) => {
                    let mut line = String::from_utf8_lossy(&buf).into_owned();
                    while line.ends_with('\n') || line.ends_with('\r') {
                        line.pop();
                    }
                    return Ok(Some(line));
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    if !self.running.load(Ordering::SeqCst) {
                        return Ok(None);
                    }
                }
                Err(e) => return Err(RunnerError::ReadFailed(e.to_string())),
            }
        }
    }

    /// One frame: "Key: Value" lines up to a blank line
    fn read_frame(&self, reader: &mut BufReader<TcpStream>) -> Result<Option<AmiEvent>, RunnerError> {
        let mut event = AmiEvent::new();
        loop {
            let Some(line) = self.read_line(reader)? else {
                return Ok(None);
            };
            if line.is_empty() {
                if event.is_empty() {
                    // Stray separator, keep reading
                    continue;
                }
                return Ok(Some(event));
            }
            match line.split_once(": ") {
                Some((key, value)) => event.set(key, value),
                None => {
                    // Command output and continuation lines are not ours
                    tracing::trace!("skipping unparseable line: {:?}", line);
                }
            }
        }
    }
}
