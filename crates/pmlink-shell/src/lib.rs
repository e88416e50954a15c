// pmlink-shell: line-oriented shell transport for PMIC evaluation boards.
//
// Physical framing (USB CDC, UART) is someone else's problem: adapters here
// receive already-delimited text lines and transmit command strings.

pub mod error;
pub mod loopback;
pub mod stream;
pub mod transport;

pub use error::Error;
pub use loopback::{LoopbackDevice, loopback};
pub use transport::{ShellLink, ShellSink, TransportConfig, sanitize_line};
