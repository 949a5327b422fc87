/// Compile-time sizing and runtime window configuration.
///
/// Table capacity, payload width and the wire layout are fixed at build
/// time. Only the window pacing and logging behavior are carried in
/// [`WindowConfig`].

/// Number of slots in the deduplication table (power of two).
pub const TABLE_CAPACITY: usize = 1024;

/// Width of the advertisement payload buffer in every record.
pub const PAYLOAD_LEN: usize = 31;

/// Length of an originating identifier (BLE device address).
pub const IDENTIFIER_LEN: usize = 6;

/// Default window period in milliseconds.
pub const WINDOW_PERIOD_MS: u64 = 7000;

/// Frame sync byte (0b0101_0101), repeated [`SYNC_LEN`] times.
pub const SYNC_BYTE: u8 = 0x55;

/// Number of sync bytes at the start of every frame.
pub const SYNC_LEN: usize = 4;

/// Report UART baud rate
pub const SERIAL_BAUD: u32 = 115200;

/// Runtime window configuration, handed to the controller at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    /// Window length in milliseconds. Drives the periodic drain tick.
    pub period_ms: u64,
    /// Emit a warning the first time the table fills in a window.
    pub warn_on_full: bool,
}

impl WindowConfig {
    pub const fn new() -> Self {
        Self {
            period_ms: WINDOW_PERIOD_MS,
            warn_on_full: true,
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self::new()
    }
}
