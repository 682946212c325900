/// Hardware pin map for supported boards.
///
/// Each board module defines pin assignments and capabilities
/// selected at compile time via feature flags.

#[cfg(feature = "board-frontpanel")]
mod hw {
    // Status LEDs (locked wiring)
    pub const LED_RED_PIN: u8 = 16;
    pub const LED_YELLOW_PIN: u8 = 15;
    pub const LED_GREEN_PIN: u8 = 7;

    /// Active DC siren through a transistor, on = HIGH
    pub const BUZZER_PIN: u8 = 17;

    // SSD1327 128x96 OLED on I2C
    pub const OLED_SDA_PIN: u8 = 13;
    pub const OLED_SCL_PIN: u8 = 12;
    pub const OLED_I2C_HZ: u32 = 400_000;
    pub const OLED_I2C_ADDR: u8 = 0x3C;
    pub const DISPLAY_WIDTH: u16 = 128;
    pub const DISPLAY_HEIGHT: u16 = 96;

    // Host link on UART0 (logs go to the USB console instead)
    pub const UART_TX_PIN: u8 = 43;
    pub const UART_RX_PIN: u8 = 44;

    // Shared VRX register bus
    pub const VRX_DATA_PIN: u8 = 3;
    pub const VRX_CLK_PIN: u8 = 5;

    /// Latch-enable pin per receiver, indexed by channel id - 1
    pub const VRX_LE_PINS: [u8; 3] = [4, 10, 11];
    /// RSSI analog input per receiver, indexed by channel id - 1
    pub const VRX_RSSI_PINS: [u8; 3] = [8, 14, 9];

    // Local controls
    pub const BTN_SCAN_PIN: u8 = 18;
    pub const JOY_X_PIN: u8 = 1;
    pub const JOY_Y_PIN: u8 = 2;
    pub const JOY_SW_PIN: u8 = 6;

    pub const HAS_DISPLAY: bool = true;
    pub const BOARD_NAME: &str = "ndefender_frontpanel_s3";
}

#[cfg(not(feature = "board-frontpanel"))]
mod hw {
    pub const HAS_DISPLAY: bool = false;
    pub const BOARD_NAME: &str = "unknown";
}

pub use hw::*;
