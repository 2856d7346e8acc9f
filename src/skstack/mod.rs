//! The skstack module drives the Wi-SUN radio module's SKSTACK-IP text
//! interface: the serial line transport, line classification, typed
//! commands and the scan result collector.

pub mod command;
pub mod event;
pub mod mock;
pub mod scan;
pub mod transport;

pub use command::{format_ipv6, CommandSession, Reply, SkCommand};
pub use event::{Erxudp, EventKind, SkEvent, SkLine};
pub use scan::{ScanCollector, ScanResult};
pub use transport::{open_serial, LineReader, LineWriter, SerialPort, SkTransport};
