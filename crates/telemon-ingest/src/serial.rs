//! Byte-stream transport: serial device discovery, polling, reconnect.
//!
//! The physical port sits behind [`Connector`] / [`SerialHandle`] so the
//! ingestion loop can be driven by [`ScriptedConnector`](crate::scripted::ScriptedConnector)
//! in tests and by [`SystemPorts`] in production.

use std::io::{self, Read};
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;

use crate::error::Error;

// ── Platform defaults ────────────────────────────────────────────────

pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// Device paths that look like a USB serial adapter on this platform.
pub fn default_port_pattern() -> &'static str {
    if cfg!(target_os = "macos") {
        r"^/dev/(tty|cu)\.usb(serial|modem)"
    } else if cfg!(windows) {
        r"^COM\d+$"
    } else {
        r"^/dev/tty(USB|ACM)\d+$"
    }
}

// ── Injectable port seams ────────────────────────────────────────────

/// An open serial link.
pub trait SerialHandle: Send {
    /// Bytes waiting in the receive buffer; never blocks.
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// Read whatever is currently buffered (possibly nothing).
    fn read_available(&mut self) -> io::Result<Vec<u8>>;

    fn name(&self) -> &str;
}

/// Lists and opens ports.
pub trait Connector: Send + Sync {
    fn candidates(&self) -> io::Result<Vec<String>>;

    fn open(&self, path: &str, baud_rate: u32, timeout: Duration)
    -> io::Result<Box<dyn SerialHandle>>;
}

// ── System ports ─────────────────────────────────────────────────────

/// Real ports through the `serialport` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPorts;

impl Connector for SystemPorts {
    #[cfg(unix)]
    fn candidates(&self) -> io::Result<Vec<String>> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir("/dev")? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                paths.push(format!("/dev/{name}"));
            }
        }
        Ok(paths)
    }

    #[cfg(not(unix))]
    fn candidates(&self) -> io::Result<Vec<String>> {
        let ports = serialport::available_ports().map_err(io::Error::from)?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    fn open(
        &self,
        path: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> io::Result<Box<dyn SerialHandle>> {
        let port = serialport::new(path, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(io::Error::from)?;
        Ok(Box::new(SystemHandle {
            port,
            name: path.to_owned(),
        }))
    }
}

struct SystemHandle {
    port: Box<dyn serialport::SerialPort>,
    name: String,
}

impl SerialHandle for SystemHandle {
    fn bytes_available(&mut self) -> io::Result<usize> {
        let n = self.port.bytes_to_read().map_err(io::Error::from)?;
        Ok(usize::try_from(n).unwrap_or(usize::MAX))
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        let waiting = self.bytes_available()?;
        if waiting == 0 {
            return Ok(Vec::new());
        }
        let mut buf = vec![0; waiting];
        let n = self.port.read(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ── Configuration ────────────────────────────────────────────────────

/// Which port to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSelection {
    /// Open exactly this path.
    Path(String),
    /// Scan for a matching device. `search` is a regex (plain substrings
    /// work as-is) applied on top of the platform pattern.
    Autodetect { search: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub port: PortSelection,
    pub baud_rate: u32,
    pub timeout: Duration,
    /// Platform filter for autodetection; see [`default_port_pattern`].
    pub pattern: String,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: PortSelection::Autodetect { search: None },
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
            pattern: default_port_pattern().to_owned(),
        }
    }
}

// ── Discovery ────────────────────────────────────────────────────────

/// Candidate paths matching the platform pattern and `search`, sorted.
pub fn matching_ports(
    connector: &dyn Connector,
    pattern: &str,
    search: Option<&str>,
) -> Result<Vec<String>, Error> {
    let platform = Regex::new(pattern)?;
    let search = search.map(Regex::new).transpose()?;

    let mut paths: Vec<String> = connector
        .candidates()
        .map_err(|e| Error::ConnectionLost {
            path: "<enumeration>".into(),
            message: e.to_string(),
        })?
        .into_iter()
        .filter(|p| platform.is_match(p))
        .filter(|p| search.as_ref().is_none_or(|s| s.is_match(p)))
        .collect();
    paths.sort();
    paths.dedup();
    Ok(paths)
}

fn discover(
    connector: &dyn Connector,
    config: &SerialConfig,
    search: Option<&str>,
) -> Result<(String, Box<dyn SerialHandle>), Error> {
    let candidates = matching_ports(connector, &config.pattern, search)?;
    let mut tried = Vec::with_capacity(candidates.len());

    for path in candidates {
        match connector.open(&path, config.baud_rate, config.timeout) {
            Ok(handle) => {
                tracing::info!(path = %path, baud = config.baud_rate, "Serial device found");
                return Ok((path, handle));
            }
            Err(e) => {
                tracing::debug!(path = %path, error = %e, "Candidate did not open");
                tried.push(path);
            }
        }
    }

    let pattern = match search {
        Some(s) => format!("{} and {s}", config.pattern),
        None => config.pattern.clone(),
    };
    Err(Error::DeviceNotFound { pattern, tried })
}

// ── ByteStreamTransport ──────────────────────────────────────────────

/// An owned serial link with reconnect-in-place.
///
/// The ingestion loop owns this exclusively; [`reconnect`](Self::reconnect)
/// closes the old handle before opening the new one.
pub struct ByteStreamTransport {
    connector: Arc<dyn Connector>,
    config: SerialConfig,
    path: String,
    handle: Option<Box<dyn SerialHandle>>,
}

impl std::fmt::Debug for ByteStreamTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteStreamTransport")
            .field("path", &self.path)
            .field("baud_rate", &self.config.baud_rate)
            .field("open", &self.handle.is_some())
            .finish_non_exhaustive()
    }
}

impl ByteStreamTransport {
    /// Open the configured port, scanning for it when autodetecting.
    pub fn open(config: SerialConfig, connector: Arc<dyn Connector>) -> Result<Self, Error> {
        let (path, handle) = match &config.port {
            PortSelection::Path(path) => {
                let handle = connector
                    .open(path, config.baud_rate, config.timeout)
                    .map_err(|e| Error::OpenFailed {
                        path: path.clone(),
                        message: e.to_string(),
                    })?;
                tracing::info!(path = %path, baud = config.baud_rate, "Serial port opened");
                (path.clone(), handle)
            }
            PortSelection::Autodetect { search } => {
                discover(connector.as_ref(), &config, search.as_deref())?
            }
        };

        Ok(Self {
            connector,
            config,
            path,
            handle: Some(handle),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// `true` when bytes are waiting.
    pub fn poll(&mut self) -> Result<bool, Error> {
        let handle = self.handle.as_mut().ok_or(Error::NotConnected)?;
        match handle.bytes_available() {
            Ok(n) => Ok(n > 0),
            Err(e) => Err(self.lost(&e)),
        }
    }

    /// Whatever is buffered right now; not a fixed size.
    pub fn read(&mut self) -> Result<Vec<u8>, Error> {
        let handle = self.handle.as_mut().ok_or(Error::NotConnected)?;
        match handle.read_available() {
            Ok(bytes) => Ok(bytes),
            Err(e) => Err(self.lost(&e)),
        }
    }

    pub fn close(&mut self) {
        if self.handle.take().is_some() {
            tracing::debug!(path = %self.path, "Serial port closed");
        }
    }

    /// Close, wait `delay`, then reopen the same path at the same rate.
    ///
    /// A failed reopen is logged and leaves the link closed so the next
    /// cycle retries. Returns whether the link is open afterwards.
    pub async fn reconnect(&mut self, delay: Duration) -> bool {
        self.close();
        tracing::info!(
            path = %self.path,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Waiting before reconnect"
        );
        tokio::time::sleep(delay).await;

        match self
            .connector
            .open(&self.path, self.config.baud_rate, self.config.timeout)
        {
            Ok(handle) => {
                tracing::info!(path = %self.path, "Serial port reconnected");
                self.handle = Some(handle);
                true
            }
            Err(e) => {
                tracing::warn!(path = %self.path, error = %e, "Reconnect failed");
                false
            }
        }
    }

    fn lost(&self, e: &io::Error) -> Error {
        Error::ConnectionLost {
            path: self.path.clone(),
            message: e.to_string(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::scripted::ScriptedConnector;

    const LINUX: &str = r"^/dev/tty(USB|ACM)\d+$";

    fn autodetect(search: Option<&str>) -> SerialConfig {
        SerialConfig {
            port: PortSelection::Autodetect {
                search: search.map(str::to_owned),
            },
            pattern: LINUX.into(),
            ..SerialConfig::default()
        }
    }

    fn connector() -> ScriptedConnector {
        ScriptedConnector::new(["/dev/ttyS0", "/dev/ttyUSB1", "/dev/ttyACM0", "/dev/ttyUSB0", "/dev/null"])
    }

    #[test]
    fn platform_patterns() {
        let linux = Regex::new(LINUX).unwrap();
        assert!(linux.is_match("/dev/ttyUSB0"));
        assert!(linux.is_match("/dev/ttyACM12"));
        assert!(!linux.is_match("/dev/ttyS0"));

        let mac = Regex::new(r"^/dev/(tty|cu)\.usb(serial|modem)").unwrap();
        assert!(mac.is_match("/dev/cu.usbmodem1101"));
        assert!(!mac.is_match("/dev/cu.Bluetooth-Incoming-Port"));
    }

    #[test]
    fn matching_ports_filters_and_sorts() {
        let conn = connector();
        let all = matching_ports(&conn, LINUX, None).unwrap();
        assert_eq!(all, vec!["/dev/ttyACM0", "/dev/ttyUSB0", "/dev/ttyUSB1"]);

        let usb = matching_ports(&conn, LINUX, Some("USB")).unwrap();
        assert_eq!(usb, vec!["/dev/ttyUSB0", "/dev/ttyUSB1"]);
    }

    #[test]
    fn autodetect_skips_ports_that_fail_to_open() {
        let conn = connector();
        conn.refuse("/dev/ttyUSB0");

        let transport = ByteStreamTransport::open(autodetect(Some("USB")), Arc::new(conn.clone())).unwrap();
        assert_eq!(transport.path(), "/dev/ttyUSB1");
        assert_eq!(conn.opened(), vec!["/dev/ttyUSB1"]);
    }

    #[test]
    fn exhausted_candidates_is_device_not_found() {
        let conn = connector();
        conn.refuse("/dev/ttyUSB0");
        conn.refuse("/dev/ttyUSB1");

        let err = ByteStreamTransport::open(autodetect(Some("USB")), Arc::new(conn)).unwrap_err();
        match err {
            Error::DeviceNotFound { tried, .. } => {
                assert_eq!(tried, vec!["/dev/ttyUSB0", "/dev/ttyUSB1"]);
            }
            other => panic!("expected DeviceNotFound, got {other:?}"),
        }
    }

    #[test]
    fn explicit_path_failure_is_open_failed() {
        let conn = connector();
        conn.refuse("/dev/ttyACM0");
        let config = SerialConfig {
            port: PortSelection::Path("/dev/ttyACM0".into()),
            ..SerialConfig::default()
        };
        let err = ByteStreamTransport::open(config, Arc::new(conn)).unwrap_err();
        assert!(matches!(err, Error::OpenFailed { .. }));
    }

    #[test]
    fn poll_and_read_drain_scripted_bytes() {
        let conn = connector();
        let mut transport = ByteStreamTransport::open(autodetect(None), Arc::new(conn.clone())).unwrap();

        assert!(!transport.poll().unwrap());
        conn.push_bytes(b"1,2\n");
        assert!(transport.poll().unwrap());
        assert_eq!(transport.read().unwrap(), b"1,2\n");
        assert!(!transport.poll().unwrap());
    }

    #[test]
    fn io_error_surfaces_as_connection_lost() {
        let conn = connector();
        let mut transport = ByteStreamTransport::open(autodetect(None), Arc::new(conn.clone())).unwrap();

        conn.push_error(io::ErrorKind::BrokenPipe);
        let err = transport.poll().unwrap_err();
        assert!(matches!(err, Error::ConnectionLost { .. }));
        assert!(err.is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_waits_then_reopens_same_path() {
        let conn = connector();
        let mut transport = ByteStreamTransport::open(autodetect(None), Arc::new(conn.clone())).unwrap();
        let before = tokio::time::Instant::now();

        assert!(transport.reconnect(Duration::from_secs(5)).await);
        assert!(before.elapsed() >= Duration::from_secs(5));
        assert!(transport.is_open());
        assert_eq!(conn.opened(), vec!["/dev/ttyACM0", "/dev/ttyACM0"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_reconnect_leaves_link_closed() {
        let conn = connector();
        let mut transport = ByteStreamTransport::open(autodetect(None), Arc::new(conn.clone())).unwrap();
        conn.refuse("/dev/ttyACM0");

        assert!(!transport.reconnect(Duration::from_millis(10)).await);
        assert!(!transport.is_open());
        assert!(matches!(transport.read(), Err(Error::NotConnected)));
    }
}
