//! SSD1327 OLED driver (128x96, 4-bit grayscale, I2C).
//!
//! Keeps a full frame buffer and implements embedded-graphics
//! [`DrawTarget`]. The control core hands over text screens; [`TextPanel`]
//! redraws only the rows that changed and pushes just those bands, so a
//! refresh holds the bus for as short as possible.

use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::Gray4;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Baseline, Text};
use embedded_hal::i2c::I2c;

use ndefender_panel::board;
use ndefender_panel::display::{Screen, ROWS};

const WIDTH: usize = board::DISPLAY_WIDTH as usize;
const HEIGHT: usize = board::DISPLAY_HEIGHT as usize;
/// Two pixels per byte
const STRIDE: usize = WIDTH / 2;

/// Pixel height of one text row (6x10 font plus spacing)
const ROW_PX: usize = HEIGHT / ROWS;

/// Data bytes per I2C transfer
const CHUNK: usize = 32;

const CONTROL_CMD: u8 = 0x00;
const CONTROL_DATA: u8 = 0x40;

#[allow(dead_code)]
mod cmd {
    pub const DISPLAY_OFF: u8 = 0xAE;
    pub const DISPLAY_ON: u8 = 0xAF;
    pub const SET_COLUMN_ADDR: u8 = 0x15;
    pub const SET_ROW_ADDR: u8 = 0x75;
    pub const SET_CONTRAST: u8 = 0x81;
    pub const SET_REMAP: u8 = 0xA0;
    pub const SET_START_LINE: u8 = 0xA1;
    pub const SET_DISPLAY_OFFSET: u8 = 0xA2;
    pub const SET_NORMAL: u8 = 0xA4;
    pub const SET_MUX_RATIO: u8 = 0xA8;
    pub const SET_VDD_INTERNAL: u8 = 0xAB;
    pub const SET_PHASE_LENGTH: u8 = 0xB1;
    pub const SET_CLOCK_DIV: u8 = 0xB3;
    pub const SET_SECOND_PRECHARGE: u8 = 0xB6;
    pub const SET_PRECHARGE_VOLTAGE: u8 = 0xBC;
    pub const SET_VCOMH: u8 = 0xBE;
    pub const SET_FUNCTION_B: u8 = 0xD5;
    pub const SET_COMMAND_LOCK: u8 = 0xFD;
}

pub struct Ssd1327<I2C> {
    i2c: I2C,
    buffer: [u8; STRIDE * HEIGHT],
}

impl<I2C: I2c> Ssd1327<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            buffer: [0; STRIDE * HEIGHT],
        }
    }

    pub fn init(&mut self) -> Result<(), I2C::Error> {
        let init_cmds: &[u8] = &[
            cmd::SET_COMMAND_LOCK,
            0x12,
            cmd::DISPLAY_OFF,
            cmd::SET_MUX_RATIO,
            (HEIGHT - 1) as u8,
            cmd::SET_START_LINE,
            0x00,
            cmd::SET_DISPLAY_OFFSET,
            0x00,
            cmd::SET_REMAP,
            0x51,
            cmd::SET_CONTRAST,
            0x80,
            cmd::SET_PHASE_LENGTH,
            0xF1,
            cmd::SET_CLOCK_DIV,
            0x00,
            cmd::SET_VDD_INTERNAL,
            0x01,
            cmd::SET_SECOND_PRECHARGE,
            0x0F,
            cmd::SET_VCOMH,
            0x0F,
            cmd::SET_PRECHARGE_VOLTAGE,
            0x08,
            cmd::SET_FUNCTION_B,
            0x62,
            cmd::SET_NORMAL,
        ];
        for &c in init_cmds {
            self.command(c)?;
        }
        self.flush_rows(0, HEIGHT)?;
        self.command(cmd::DISPLAY_ON)
    }

    fn command(&mut self, c: u8) -> Result<(), I2C::Error> {
        self.i2c.write(board::OLED_I2C_ADDR, &[CONTROL_CMD, c])
    }

    fn set_pixel(&mut self, x: usize, y: usize, luma: u8) {
        let byte = &mut self.buffer[y * STRIDE + x / 2];
        // even column in the high nibble
        if x % 2 == 0 {
            *byte = (*byte & 0x0F) | (luma << 4);
        } else {
            *byte = (*byte & 0xF0) | (luma & 0x0F);
        }
    }

    /// Push pixel rows `top..bottom` to the panel.
    pub fn flush_rows(&mut self, top: usize, bottom: usize) -> Result<(), I2C::Error> {
        let bottom = bottom.min(HEIGHT);
        if top >= bottom {
            return Ok(());
        }
        for c in [
            cmd::SET_COLUMN_ADDR,
            0,
            (STRIDE - 1) as u8,
            cmd::SET_ROW_ADDR,
            top as u8,
            (bottom - 1) as u8,
        ] {
            self.command(c)?;
        }

        let mut packet = [0u8; CHUNK + 1];
        packet[0] = CONTROL_DATA;
        for chunk in self.buffer[top * STRIDE..bottom * STRIDE].chunks(CHUNK) {
            packet[1..=chunk.len()].copy_from_slice(chunk);
            self.i2c.write(board::OLED_I2C_ADDR, &packet[..=chunk.len()])?;
        }
        Ok(())
    }
}

impl<I2C> OriginDimensions for Ssd1327<I2C> {
    fn size(&self) -> Size {
        Size::new(WIDTH as u32, HEIGHT as u32)
    }
}

impl<I2C: I2c> DrawTarget for Ssd1327<I2C> {
    type Color = Gray4;
    type Error = core::convert::Infallible;

    fn draw_iter<P>(&mut self, pixels: P) -> Result<(), Self::Error>
    where
        P: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if let (Ok(x), Ok(y)) = (usize::try_from(point.x), usize::try_from(point.y)) {
                if x < WIDTH && y < HEIGHT {
                    self.set_pixel(x, y, color.luma());
                }
            }
        }
        Ok(())
    }
}

/// Text front end: one font row per screen row, redrawn on change.
pub struct TextPanel<I2C> {
    oled: Ssd1327<I2C>,
    shown: Screen,
}

impl<I2C: I2c> TextPanel<I2C> {
    pub fn new(oled: Ssd1327<I2C>) -> Self {
        Self {
            oled,
            shown: Screen::new(),
        }
    }

    /// Draw `screen`, touching only rows whose text differs from what is on
    /// the glass. `between` runs after each pushed row.
    pub fn show(&mut self, screen: &Screen, mut between: impl FnMut()) -> Result<(), I2C::Error> {
        let title = MonoTextStyle::new(&FONT_6X10, Gray4::WHITE);
        let body = MonoTextStyle::new(&FONT_6X10, Gray4::new(0x0A));
        let blank = PrimitiveStyle::with_fill(Gray4::BLACK);

        for i in 0..ROWS {
            let new = screen.get(i).map(|r| r.as_str()).unwrap_or("");
            let old = self.shown.get(i).map(|r| r.as_str()).unwrap_or("");
            if new == old && !self.shown.is_empty() {
                continue;
            }
            let top = i * ROW_PX;
            let _ = Rectangle::new(Point::new(0, top as i32), Size::new(WIDTH as u32, ROW_PX as u32))
                .into_styled(blank)
                .draw(&mut self.oled);
            let style = if i == 0 { title } else { body };
            let _ = Text::with_baseline(new, Point::new(1, top as i32 + 1), style, Baseline::Top)
                .draw(&mut self.oled);
            self.oled.flush_rows(top, top + ROW_PX)?;
            between();
        }
        self.shown = screen.clone();
        Ok(())
    }
}
