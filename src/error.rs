/// Error taxonomy for the capture-and-aggregation engine.
use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No free slot for a new identifier in the current window.
    ///
    /// Absorbed by the recorder: the observation is dropped and only
    /// shows up in the header's raw event count.
    TableFull,
    /// The outbound byte sink was not ready at startup. Fatal.
    TransportUnready,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TableFull => f.write_str("deduplication table full"),
            Error::TransportUnready => f.write_str("outbound transport not ready"),
        }
    }
}

impl core::error::Error for Error {}

pub type Result<T> = core::result::Result<T, Error>;
