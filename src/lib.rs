//! advtally library — windowed BLE advertisement deduplication.
//!
//! Absorbs a bursty stream of advertisement reports, keeps one freshest
//! record per device address in a fixed-size open-addressing table, and
//! once per window emits the accumulated set as a compact binary frame
//! over a byte sink (the report UART on hardware). All storage is sized
//! at compile time; nothing allocates.
//!
//! Layering, leaf first:
//! - `hash`, `table`, `record` — identifier hashing and the dedup table
//! - `window` — one window's table and header counters, single-context
//! - `controller` — shares a window between capture and periodic drain
//! - `protocol`, `comm` — frame layout, byte sink, receiver-side reader
//! - `config`, `board`, `error` — constants, board pins, error taxonomy
//!
//! Platform binaries (Embassy firmware, ESP-IDF std firmware) are thin
//! consumers that provide the radio, the timer and the UART.

#![cfg_attr(not(test), no_std)]

pub mod board;
pub mod comm;
pub mod config;
pub mod controller;
pub mod error;
pub mod hash;
pub mod protocol;
pub mod record;
pub mod table;
pub mod window;

pub use controller::{Recorded, WindowController};
pub use error::Error;
pub use record::{Observation, ObservationRecord};
