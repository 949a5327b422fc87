//! advtally — BLE advertisement tally firmware
//!
//! Passively scans BLE advertisements, deduplicates them by advertiser
//! address over fixed windows, and writes one binary frame per window to
//! the report UART. A one-line NDJSON status per window goes to the log
//! console.
//!
//! The collector on the other end of the UART handles decoding, storage
//! and forwarding.

#![no_std]
#![no_main]

use esp_backtrace as _;

esp_bootloader_esp_idf::esp_app_desc!();

#[cfg(not(any(feature = "board-xiao", feature = "board-m5stickc")))]
compile_error!("select a board feature: `xiao` or `m5stickc`");

use embassy_time::{Duration, Instant, Ticker, Timer};
use esp_hal::interrupt::software::SoftwareInterruptControl;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::uart::{self, Uart};
use esp_hal::Blocking;
use static_cell::StaticCell;

use trouble_host::prelude::*;

use advtally::comm::{window_status, ByteSink};
use advtally::config::{WindowConfig, SERIAL_BAUD, TABLE_CAPACITY};
use advtally::protocol::VERSION;
use advtally::{board, Observation, WindowController};

// ── Shared state ─────────────────────────────────────────────────────

/// The window shared by the BLE report handler (capture) and the
/// window task (drain).
static CONTROLLER: WindowController<TABLE_CAPACITY> = WindowController::new(WindowConfig::new());

// ── Report UART ──────────────────────────────────────────────────────

/// Blocking UART sink for window frames.
struct UartSink {
    uart: Uart<'static, Blocking>,
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
        let _ = self.uart.flush();
    }
}

// ── BLE scan event handler ───────────────────────────────────────────

/// EventHandler for BLE advertisement reports from trouble-host.
///
/// Called synchronously from the runner, so it must not block. Each report
/// goes straight into the controller.
struct ScanEventHandler;

impl EventHandler for ScanEventHandler {
    fn on_adv_reports(&self, mut it: LeAdvReportsIter<'_>) {
        while let Some(Ok(report)) = it.next() {
            let Ok(id) = <[u8; 6]>::try_from(report.addr.raw()) else {
                continue;
            };
            let obs = Observation {
                id,
                id_kind: addr_kind_code(report.addr_kind),
                event_kind: report.event_kind as u8,
                rssi: report.rssi,
                payload: report.data,
            };
            CONTROLLER.record(&obs);
        }
    }
}

/// HCI address type code (0 public, 1 random, 2/3 resolvable).
fn addr_kind_code(kind: AddrKind) -> u8 {
    if kind == AddrKind::PUBLIC {
        0x00
    } else if kind == AddrKind::RANDOM {
        0x01
    } else if kind == AddrKind::RESOLVABLE_PRIVATE_OR_PUBLIC {
        0x02
    } else if kind == AddrKind::RESOLVABLE_PRIVATE_OR_RANDOM {
        0x03
    } else {
        0xFF
    }
}

// ── Entry point ──────────────────────────────────────────────────────

#[esp_rtos::main]
async fn main(spawner: embassy_executor::Spawner) {
    esp_println::logger::init_logger_from_env();

    let peripherals = esp_hal::init(esp_hal::Config::default());

    // Heap for the BLE controller only; the table itself is static
    esp_alloc::heap_allocator!(size: 72 * 1024);

    // Start the RTOS (needs a timer and a software interrupt)
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let sw_int = SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    esp_rtos::start(timg0.timer0, sw_int.software_interrupt0);

    log::info!("advtally v{} starting on {}", VERSION, board::BOARD_NAME);

    // ── Report UART ─────────────────────────────────────────────────

    #[cfg(feature = "board-xiao")]
    let (tx_pin, rx_pin) = (peripherals.GPIO43, peripherals.GPIO44);
    #[cfg(feature = "board-m5stickc")]
    let (tx_pin, rx_pin) = (peripherals.GPIO32, peripherals.GPIO33);

    let uart = match Uart::new(
        peripherals.UART1,
        uart::Config::default().with_baudrate(SERIAL_BAUD),
    ) {
        Ok(uart) => uart.with_tx(tx_pin).with_rx(rx_pin),
        Err(e) => {
            log::error!("Report UART init failed: {:?}", e);
            return;
        }
    };

    log::info!(
        "Report UART on TX GPIO{} / RX GPIO{} at {} baud",
        board::UART_TX_PIN,
        board::UART_RX_PIN,
        SERIAL_BAUD
    );

    static SINK: StaticCell<UartSink> = StaticCell::new();
    let sink = SINK.init(UartSink { uart });

    // First window opens here, before the first tick can fire
    if let Err(e) = CONTROLLER.start(&*sink) {
        log::error!("Startup aborted: {}", e);
        return;
    }

    spawner.spawn(window_task(sink)).unwrap();

    // ── BLE radio initialization ───────────────────────────────────────

    let connector =
        esp_radio::ble::controller::BleConnector::new(peripherals.BT, Default::default())
            .expect("BLE connector init failed");

    log::info!("BLE connector initialized");

    let controller: ExternalController<_, 20> = ExternalController::new(connector);

    static HOST_RESOURCES: StaticCell<HostResources<DefaultPacketPool, 1, 1>> = StaticCell::new();
    let resources = HOST_RESOURCES.init(HostResources::new());

    let address = Address::random([0xff, 0x8f, 0x1a, 0x05, 0xe4, 0xab]);

    let stack = trouble_host::new(controller, resources).set_random_address(address);
    let Host {
        central,
        mut runner,
        ..
    } = stack.build();

    log::info!("BLE radio initialized");

    let scan_handler = ScanEventHandler;

    // ── BLE orchestration ──────────────────────────────────────────────
    //
    //   1. BLE stack runner (drives HCI, delivers scan reports to handler)
    //   2. BLE scanner (starts scan, keeps session alive)

    let _ = embassy_futures::join::join(
        async {
            loop {
                if let Err(e) = runner.run_with_handler(&scan_handler).await {
                    log::error!("BLE runner error: {:?}", e);
                    Timer::after(Duration::from_secs(1)).await;
                }
            }
        },
        async {
            let mut scanner = trouble_host::scan::Scanner::new(central);
            let config = ScanConfig {
                active: false,
                interval: Duration::from_millis(100),
                window: Duration::from_millis(100),
                ..Default::default()
            };

            let _session = match scanner.scan(&config).await {
                Ok(session) => session,
                Err(e) => {
                    log::error!("BLE scan failed to start: {:?}", e);
                    return;
                }
            };

            log::info!("BLE scan started (passive, continuous)");
            // Reports flow through ScanEventHandler while _session lives
            loop {
                Timer::after(Duration::from_secs(60)).await;
            }
        },
    )
    .await;
}

/// Drains the controller every period and logs a status line.
///
/// The drain writes the frame through the blocking UART on this executor,
/// so the BLE runner does not run until the frame is out. A full table is
/// about 43 KB, roughly 3.7 s at 115200 baud. The stall is accepted:
/// capture is closed for the whole drain, so reports delayed by it would
/// be discarded uncounted anyway. If the HCI queue overflows meanwhile,
/// the runner loop in `main` logs the error and resumes.
#[embassy_executor::task]
async fn window_task(sink: &'static mut UartSink) {
    let period = CONTROLLER.config().period_ms;
    let mut ticker = Ticker::every(Duration::from_millis(period));

    loop {
        ticker.next().await;

        let Some(summary) = CONTROLLER.drain(sink) else {
            continue;
        };

        let uptime_secs = (Instant::now().as_millis() / 1000) as u32;
        if let Some(line) = window_status(&summary, uptime_secs) {
            if let Ok(s) = core::str::from_utf8(&line) {
                log::info!("{}", s.trim_end());
            }
        }
    }
}
