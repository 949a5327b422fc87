/// Hardware abstraction for supported boards.
///
/// Each board module defines the report UART pins and identity
/// selected at compile time via feature flags.

#[cfg(feature = "board-xiao")]
mod hw {
    pub const UART_TX_PIN: u8 = 43;
    pub const UART_RX_PIN: u8 = 44;
    pub const BOARD_NAME: &str = "xiao_esp32s3";
}

#[cfg(feature = "board-m5stickc")]
mod hw {
    pub const UART_TX_PIN: u8 = 32;
    pub const UART_RX_PIN: u8 = 33;
    pub const BOARD_NAME: &str = "m5stickc_plus2";
}

#[cfg(not(any(feature = "board-xiao", feature = "board-m5stickc")))]
mod hw {
    pub const BOARD_NAME: &str = "unknown";
}

pub use hw::*;
