//! N-Defender front panel firmware (ESP32-S3).
//!
//! Brings up the receiver bus, LEDs, buzzer, ADC inputs, host UART and the
//! OLED, then runs the control core's single cooperative loop. Everything
//! protocol- or policy-shaped lives in the library; this binary only maps
//! [`Line`]s onto pins and shuttles bytes.

#![no_std]
#![no_main]

use esp_backtrace as _;

esp_bootloader_esp_idf::esp_app_desc!();

mod ssd1327;

use embassy_time::{Duration, Instant, Timer};
use esp_hal::analog::adc::{Adc, AdcConfig, AdcPin, Attenuation};
use esp_hal::delay::Delay;
use esp_hal::gpio::{AnyPin, Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::interrupt::software::SoftwareInterruptControl;
use esp_hal::peripherals::{ADC1, ADC2, GPIO1, GPIO14, GPIO2, GPIO8, GPIO9};
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::uart::{Config as UartConfig, Uart};
use esp_hal::Blocking;
use heapless::Deque;

use ndefender_panel::display::Screen;

use ndefender_panel::board;
use ndefender_panel::comm::{ByteSource, LineSink};
use ndefender_panel::config;
use ndefender_panel::hal::{Line, PanelHal};
use ndefender_panel::input::{Controls, RawInputs};
use ndefender_panel::panel::Panel;

use ssd1327::{Ssd1327, TextPanel};

/// Bytes buffered between UART FIFO drains
const RX_BUFFER: usize = 1024;

/// Idle time handed back to the executor each loop iteration
const LOOP_IDLE_MS: u64 = 1;

// Pins taken from `peripherals` below must match the board map
const _: () = {
    assert!(board::VRX_DATA_PIN == 3 && board::VRX_CLK_PIN == 5);
    assert!(board::VRX_LE_PINS[0] == 4 && board::VRX_LE_PINS[1] == 10 && board::VRX_LE_PINS[2] == 11);
    assert!(board::VRX_RSSI_PINS[0] == 8 && board::VRX_RSSI_PINS[1] == 14 && board::VRX_RSSI_PINS[2] == 9);
    assert!(board::LED_RED_PIN == 16 && board::LED_YELLOW_PIN == 15 && board::LED_GREEN_PIN == 7);
    assert!(board::BUZZER_PIN == 17);
    assert!(board::BTN_SCAN_PIN == 18 && board::JOY_SW_PIN == 6);
    assert!(board::JOY_X_PIN == 1 && board::JOY_Y_PIN == 2);
    assert!(board::OLED_SDA_PIN == 13 && board::OLED_SCL_PIN == 12);
    assert!(board::UART_TX_PIN == 43 && board::UART_RX_PIN == 44);
};

/// Blocking one-shot conversion on an enabled ADC pin.
macro_rules! oneshot {
    ($adc:expr, $pin:expr) => {
        loop {
            if let Ok(raw) = $adc.read_oneshot($pin) {
                break raw;
            }
        }
    };
}

// ── Hardware access ──────────────────────────────────────────────────

/// Analog inputs. RSSI-2 sits on an ADC2 pin, everything else on ADC1.
struct Analog {
    adc1: Adc<'static, ADC1<'static>, Blocking>,
    adc2: Adc<'static, ADC2<'static>, Blocking>,
    rssi1: AdcPin<GPIO8<'static>, ADC1<'static>>,
    rssi2: AdcPin<GPIO14<'static>, ADC2<'static>>,
    rssi3: AdcPin<GPIO9<'static>, ADC1<'static>>,
    joy_x: AdcPin<GPIO1<'static>, ADC1<'static>>,
    joy_y: AdcPin<GPIO2<'static>, ADC1<'static>>,
}

struct EspHal {
    vrx_data: Output<'static>,
    vrx_clock: Output<'static>,
    vrx_latch: [Output<'static>; 3],
    led_red: Output<'static>,
    led_yellow: Output<'static>,
    led_green: Output<'static>,
    buzzer: Output<'static>,
    analog: Analog,
    delay: Delay,
    /// None when the OLED is absent or failed to start
    screen: Option<TextPanel<I2c<'static, Blocking>>>,
}

impl EspHal {
    fn output(&mut self, line: Line) -> Option<&mut Output<'static>> {
        match line {
            Line::VrxData => Some(&mut self.vrx_data),
            Line::VrxClock => Some(&mut self.vrx_clock),
            Line::VrxLatch(id @ 1..=3) => Some(&mut self.vrx_latch[id as usize - 1]),
            Line::LedRed => Some(&mut self.led_red),
            Line::LedYellow => Some(&mut self.led_yellow),
            Line::LedGreen => Some(&mut self.led_green),
            Line::Buzzer => Some(&mut self.buzzer),
            Line::VrxLatch(_) | Line::Rssi(_) => None,
        }
    }

    fn joystick(&mut self) -> (u16, u16) {
        let a = &mut self.analog;
        (oneshot!(a.adc1, &mut a.joy_x), oneshot!(a.adc1, &mut a.joy_y))
    }
}

impl PanelHal for EspHal {
    fn set_line(&mut self, line: Line, high: bool) {
        match self.output(line) {
            Some(pin) => pin.set_level(Level::from(high)),
            None => log::warn!("No output pin for {:?}", line),
        }
    }

    fn read_analog(&mut self, line: Line) -> u16 {
        let a = &mut self.analog;
        match line {
            Line::Rssi(1) => oneshot!(a.adc1, &mut a.rssi1),
            Line::Rssi(2) => oneshot!(a.adc2, &mut a.rssi2),
            Line::Rssi(3) => oneshot!(a.adc1, &mut a.rssi3),
            _ => {
                log::warn!("No analog input for {:?}", line);
                0
            }
        }
    }

    fn millis(&self) -> u32 {
        // wraps; the core compares with elapsed-time arithmetic
        Instant::now().as_millis() as u32
    }

    fn delay_us(&mut self, us: u32) {
        self.delay.delay_micros(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_millis(ms);
    }

    fn present(&mut self, screen: &Screen) {
        if let Some(panel) = self.screen.as_mut() {
            if let Err(e) = panel.show(screen, || {}) {
                log::warn!("OLED write failed: {:?}", e);
            }
        }
    }
}

// ── Host link ────────────────────────────────────────────────────────

/// UART0 to the host. Inbound bytes are moved out of the 128-byte hardware
/// FIFO into a larger ring whenever [`HostLink::pump`] runs, so slow display
/// refreshes do not drop command bytes.
struct HostLink {
    uart: Uart<'static, Blocking>,
    pending: Deque<u8, RX_BUFFER>,
    overruns: u32,
}

impl HostLink {
    fn pump(&mut self) {
        let mut chunk = [0u8; 64];
        while self.uart.read_ready() {
            let n = match self.uart.read(&mut chunk) {
                Ok(n) => n,
                Err(e) => {
                    log::warn!("UART rx error: {:?}", e);
                    return;
                }
            };
            for &byte in &chunk[..n] {
                if self.pending.push_back(byte).is_err() {
                    self.overruns += 1;
                    if self.overruns == 1 || self.overruns % 256 == 0 {
                        log::warn!("Host rx buffer full, {} bytes dropped", self.overruns);
                    }
                }
            }
        }
    }
}

impl LineSink for HostLink {
    fn send_line(&mut self, line: &[u8]) {
        let mut rest = line;
        while !rest.is_empty() {
            match self.uart.write(rest) {
                Ok(n) => rest = &rest[n..],
                Err(e) => {
                    log::warn!("UART tx error: {:?}", e);
                    return;
                }
            }
        }
    }
}

impl ByteSource for HostLink {
    fn read_byte(&mut self) -> Option<u8> {
        if self.pending.is_empty() {
            self.pump();
        }
        self.pending.pop_front()
    }
}

// ── Local controls ───────────────────────────────────────────────────

struct Buttons {
    scan: Input<'static>,
    switch: Input<'static>,
}

fn sample_controls(hal: &mut EspHal, buttons: &Buttons) -> RawInputs {
    let (joy_x, joy_y) = hal.joystick();
    RawInputs {
        scan_pressed: buttons.scan.is_low(),
        switch_pressed: buttons.switch.is_low(),
        joy_x,
        joy_y,
    }
}

// ── Entry point ──────────────────────────────────────────────────────

#[esp_rtos::main]
async fn main(_spawner: embassy_executor::Spawner) {
    esp_println::logger::init_logger_from_env();

    let peripherals = esp_hal::init(esp_hal::Config::default());

    // Start the RTOS: embassy-time needs the timer driver
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let sw_int = SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    esp_rtos::start(timg0.timer0, sw_int.software_interrupt0);

    log::info!("Board: {}", board::BOARD_NAME);

    let low = |pin: AnyPin<'static>| Output::new(pin, Level::Low, OutputConfig::default());
    let pull_up = InputConfig::default().with_pull(Pull::Up);

    let mut adc1_config = AdcConfig::new();
    let rssi1 = adc1_config.enable_pin(peripherals.GPIO8, Attenuation::_11dB);
    let rssi3 = adc1_config.enable_pin(peripherals.GPIO9, Attenuation::_11dB);
    let joy_x = adc1_config.enable_pin(peripherals.GPIO1, Attenuation::_11dB);
    let joy_y = adc1_config.enable_pin(peripherals.GPIO2, Attenuation::_11dB);
    let mut adc2_config = AdcConfig::new();
    let rssi2 = adc2_config.enable_pin(peripherals.GPIO14, Attenuation::_11dB);

    // Receiver bus idles low; latches are pulsed high
    let mut hal = EspHal {
        vrx_data: low(peripherals.GPIO3.into()),
        vrx_clock: low(peripherals.GPIO5.into()),
        vrx_latch: [
            low(peripherals.GPIO4.into()),
            low(peripherals.GPIO10.into()),
            low(peripherals.GPIO11.into()),
        ],
        led_red: low(peripherals.GPIO16.into()),
        led_yellow: low(peripherals.GPIO15.into()),
        led_green: low(peripherals.GPIO7.into()),
        buzzer: low(peripherals.GPIO17.into()),
        analog: Analog {
            adc1: Adc::new(peripherals.ADC1, adc1_config),
            adc2: Adc::new(peripherals.ADC2, adc2_config),
            rssi1,
            rssi2,
            rssi3,
            joy_x,
            joy_y,
        },
        delay: Delay::new(),
        screen: None,
    };

    let buttons = Buttons {
        scan: Input::new(peripherals.GPIO18, pull_up),
        switch: Input::new(peripherals.GPIO6, pull_up),
    };

    let uart = Uart::new(
        peripherals.UART0,
        UartConfig::default().with_baudrate(config::SERIAL_BAUD),
    )
    .expect("UART0 config")
    .with_tx(peripherals.GPIO43)
    .with_rx(peripherals.GPIO44);
    let mut link = HostLink {
        uart,
        pending: Deque::new(),
        overruns: 0,
    };

    if board::HAS_DISPLAY {
        let i2c = I2c::new(
            peripherals.I2C0,
            I2cConfig::default().with_frequency(Rate::from_hz(board::OLED_I2C_HZ)),
        )
        .expect("I2C0 config")
        .with_sda(peripherals.GPIO13)
        .with_scl(peripherals.GPIO12);
        let mut oled = Ssd1327::new(i2c);
        match oled.init() {
            Ok(()) => hal.screen = Some(TextPanel::new(oled)),
            Err(e) => log::warn!("OLED init failed: {:?}, running headless", e),
        }
    }

    // The joystick rests at its centre at power-on
    let mut controls = Controls::new(sample_controls(&mut hal, &buttons), hal.millis());

    let mut panel = Panel::new(hal.millis());
    panel.boot(&mut hal, &mut link);

    loop {
        let now = hal.millis();
        let raw = sample_controls(&mut hal, &buttons);
        let mut events = controls.update(raw, now);

        if let Some(frame) = panel.tick(&mut hal, &mut link, &mut events) {
            if let Some(screen) = hal.screen.as_mut() {
                if let Err(e) = screen.show(&frame, || link.pump()) {
                    log::warn!("OLED write failed: {:?}", e);
                }
            }
        }

        Timer::after(Duration::from_millis(LOOP_IDLE_MS)).await;
    }
}
