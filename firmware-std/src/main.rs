//! advtally — ESP-IDF std firmware
//!
//! Thread-based variant of the Embassy firmware: NimBLE (via esp32-nimble)
//! feeds the shared window controller from its scan callback, and a window
//! thread drains it to the report UART once per period.

use std::thread;
use std::time::{Duration, Instant};

use advtally::comm::{window_status, ByteSink};
use advtally::config::{WindowConfig, SERIAL_BAUD, TABLE_CAPACITY};
use advtally::protocol::VERSION;
use advtally::{board, Observation, WindowController};

use esp_idf_svc::hal::gpio::AnyIOPin;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::task::block_on;
use esp_idf_svc::hal::uart::{self, UartDriver};
use esp_idf_svc::hal::units::Hertz;

use esp32_nimble::{BLEDevice, BLEScan};

// ── Shared state ─────────────────────────────────────────────────────

static CONTROLLER: WindowController<TABLE_CAPACITY> = WindowController::new(WindowConfig::new());

/// Length of one NimBLE scan round before it is restarted.
const SCAN_ROUND_MS: i32 = 5000;

// ── Report UART ──────────────────────────────────────────────────────

struct UartSink {
    uart: UartDriver<'static>,
}

impl ByteSink for UartSink {
    fn write(&mut self, bytes: &[u8]) {
        let mut rest = bytes;
        while !rest.is_empty() {
            match self.uart.write(rest) {
                Ok(0) | Err(_) => break,
                Ok(n) => rest = &rest[n..],
            }
        }
        let _ = self.uart.wait_tx_done(esp_idf_svc::hal::delay::BLOCK);
    }
}

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();

    // Bind the ESP-IDF logger to the `log` facade
    esp_idf_svc::log::EspLogger::initialize_default();

    log::info!("advtally v{} starting on {} (std)", VERSION, board::BOARD_NAME);

    // ── Peripherals ──────────────────────────────────────────────────

    let peripherals = Peripherals::take()?;

    #[cfg(feature = "xiao")]
    let (tx_pin, rx_pin) = (peripherals.pins.gpio43, peripherals.pins.gpio44);
    #[cfg(feature = "m5stickc")]
    let (tx_pin, rx_pin) = (peripherals.pins.gpio32, peripherals.pins.gpio33);

    let config = uart::config::Config::default().baudrate(Hertz(SERIAL_BAUD));
    let uart = UartDriver::new(
        peripherals.uart1,
        tx_pin,
        rx_pin,
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &config,
    )?;
    log::info!(
        "Report UART on TX GPIO{} / RX GPIO{} at {} baud",
        board::UART_TX_PIN,
        board::UART_RX_PIN,
        SERIAL_BAUD
    );

    let sink = UartSink { uart };

    // First window opens before the scan starts delivering reports
    CONTROLLER.start(&sink)?;

    // ── Window thread ────────────────────────────────────────────────

    thread::Builder::new()
        .name("window".into())
        .stack_size(4096)
        .spawn(move || {
            window_thread(sink);
        })?;
    log::info!("Window thread spawned");

    // ── BLE (NimBLE) scan, on the main thread ────────────────────────

    ble_scan_loop()
}

// ── Window thread ────────────────────────────────────────────────────

/// Drains the controller once per period, on a fixed schedule measured
/// from boot so drain time does not accumulate as drift.
fn window_thread(mut sink: UartSink) {
    let boot = Instant::now();
    let period = Duration::from_millis(CONTROLLER.config().period_ms);
    let mut deadline = boot + period;

    loop {
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        }
        deadline += period;

        let Some(summary) = CONTROLLER.drain(&mut sink) else {
            continue;
        };

        let uptime = boot.elapsed().as_secs() as u32;
        if let Some(line) = window_status(&summary, uptime) {
            if let Ok(s) = std::str::from_utf8(&line) {
                log::info!("{}", s.trim_end());
            }
        }
    }
}

// ── BLE scan ─────────────────────────────────────────────────────────

fn ble_scan_loop() -> ! {
    let ble_device = BLEDevice::take();
    let mut scan = BLEScan::new();
    scan.active_scan(false).interval(100).window(99);

    log::info!("BLE scan started (passive, {} ms rounds)", SCAN_ROUND_MS);

    loop {
        let _ = block_on(scan.start(ble_device, SCAN_ROUND_MS, |device, data| {
            let obs = Observation {
                id: device.addr().as_le_bytes(),
                id_kind: device.addr().addr_type() as u8,
                event_kind: device.adv_type() as u8,
                rssi: device.rssi(),
                payload: data.payload(),
            };
            CONTROLLER.record(&obs);
            None::<()> // Continue scanning
        }));
    }
}
