//! # Touchscreen controller (TSC)
//!
//! The TSC is an ADC on the SPI bus. Software clocks a control byte in and
//! then reads the conversion result back, one byte per exchanged byte:
//!
//! ```text
//! host  ->  1ccc mrpp   0000 0000   next cmd / 0
//! tsc   <-  0000 0000   0sss ssss   ssss s000      (12-bit sample)
//! ```
//!
//! Control byte: bit 7 start, bits 6-4 channel, bit 3 8-bit mode, bit 2
//! reference select, bits 1-0 power-down mode.
//!
//! A sample is always sent with one leading zero bit, so it takes two bytes.
//! While the second byte goes out, the byte coming in may already be the next
//! command, which starts a new conversion right away.
//!
//! Touch coordinates are produced from the pen position and the calibration
//! points stored in the firmware user settings.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bus::MemoryRead;
use crate::memory::USER_SETTINGS_OFFSET;

/// Mid-scale value returned by channels that are not emulated.
const ADC_MID_SCALE: u16 = 0x800;
const ADC_MAX: u16 = 0xFFF;

pub const CHANNEL_NAMES: [&str; 8] = [
    "temp0", "touch_y", "battery", "touch_z1", "touch_z2", "touch_x", "aux", "temp1",
];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenState {
    pub x: i32,
    pub y: i32,
    pub down: bool,
}

/// A TSC control byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command(pub u8);

impl Command {
    #[must_use]
    pub const fn start(self) -> bool {
        self.0 & 0x80 != 0
    }

    #[must_use]
    pub const fn channel(self) -> u8 {
        (self.0 >> 4) & 7
    }

    #[must_use]
    pub const fn bits8(self) -> bool {
        self.0 & 0x08 != 0
    }

    #[must_use]
    pub const fn reference(self) -> u8 {
        (self.0 >> 2) & 1
    }

    #[must_use]
    pub const fn power_down(self) -> u8 {
        self.0 & 3
    }
}

/// Calibration points from the firmware user settings: two (ADC, screen)
/// pairs per axis.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    pub adc_x1: u16,
    pub adc_y1: u16,
    pub scr_x1: u8,
    pub scr_y1: u8,
    pub adc_x2: u16,
    pub adc_y2: u16,
    pub scr_x2: u8,
    pub scr_y2: u8,
}

impl Calibration {
    pub fn read(mem: &dyn MemoryRead) -> Self {
        let base = USER_SETTINGS_OFFSET;
        Self {
            adc_x1: mem.read16(base + 0x58),
            adc_y1: mem.read16(base + 0x5A),
            scr_x1: mem.read8(base + 0x5C),
            scr_y1: mem.read8(base + 0x5D),
            adc_x2: mem.read16(base + 0x5E),
            adc_y2: mem.read16(base + 0x60),
            scr_x2: mem.read8(base + 0x62),
            scr_y2: mem.read8(base + 0x63),
        }
    }
}

pub struct HwTouchScreen {
    pen: Arc<Mutex<PenState>>,
    mem: Arc<dyn MemoryRead + Send + Sync>,
}

impl HwTouchScreen {
    /// `mem` is the main RAM image holding the firmware user settings.
    pub fn new(mem: Arc<dyn MemoryRead + Send + Sync>) -> Self {
        Self {
            pen: Arc::new(Mutex::new(PenState::default())),
            mem,
        }
    }

    /// Updates the pen state. May be called from the input thread at any
    /// time; running conversions keep the state they started with.
    pub fn set_pen(&self, down: bool, x: i32, y: i32) {
        *self.pen.lock().unwrap_or_else(PoisonError::into_inner) = PenState { x, y, down };
    }

    #[must_use]
    pub fn pen(&self) -> PenState {
        *self.pen.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a new SPI transaction with the controller.
    #[must_use]
    pub fn begin_transfer(&self) -> TscTransfer {
        TscTransfer {
            pen: Arc::clone(&self.pen),
            mem: Arc::clone(&self.mem),
            state: TransferState::Idle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransferState {
    /// Waiting for a byte with the start bit.
    Idle,
    /// A sample is being shifted out, most significant part first.
    Transmitting { msb: u8, lsb: u8, msb_sent: bool },
    /// The last sample went out without a chained command.
    Draining,
}

/// One SPI transaction: every byte offered gets exactly one reply.
pub struct TscTransfer {
    pen: Arc<Mutex<PenState>>,
    mem: Arc<dyn MemoryRead + Send + Sync>,
    state: TransferState,
}

impl TscTransfer {
    /// Exchanges one byte with the controller.
    pub fn transfer(&mut self, data: u8) -> u8 {
        match self.state {
            TransferState::Idle => {
                if Command(data).start() {
                    self.convert(Command(data));
                }
                0
            }
            TransferState::Transmitting {
                msb,
                lsb,
                msb_sent: false,
            } => {
                self.state = TransferState::Transmitting {
                    msb,
                    lsb,
                    msb_sent: true,
                };
                msb
            }
            TransferState::Transmitting { lsb, .. } => {
                if Command(data).start() {
                    self.convert(Command(data));
                } else {
                    self.state = TransferState::Draining;
                }
                lsb
            }
            TransferState::Draining => 0,
        }
    }

    /// Ends the transaction. A conversion in flight is abandoned.
    pub fn close(self) {
        debug!("tsc: transfer closed in state {:?}", self.state);
    }

    fn convert(&mut self, cmd: Command) {
        let pen = *self.pen.lock().unwrap_or_else(PoisonError::into_inner);
        let channel = cmd.channel();

        info!(
            bits8 = cmd.bits8(),
            reference = cmd.reference(),
            power_down = cmd.power_down(),
            value = format_args!("{:#04X}", cmd.0),
            "tsc: reading channel {}",
            CHANNEL_NAMES[usize::from(channel)]
        );

        // Samples are always 12 bits, then optionally cut to 8.
        let sample = match channel {
            0 => ADC_MID_SCALE,
            1 if pen.down => {
                let cal = Calibration::read(self.mem.as_ref());
                interpolate(pen.y, cal.adc_y1, cal.scr_y1, cal.adc_y2, cal.scr_y2)
            }
            1 => ADC_MAX,
            5 if pen.down => {
                let cal = Calibration::read(self.mem.as_ref());
                interpolate(pen.x, cal.adc_x1, cal.scr_x1, cal.adc_x2, cal.scr_x2)
            }
            5 => 0,
            _ => {
                warn!(
                    "tsc: channel {} unimplemented",
                    CHANNEL_NAMES[usize::from(channel)]
                );
                ADC_MID_SCALE
            }
        };

        let (msb, lsb) = if cmd.bits8() {
            let sample = sample >> 4;
            ((sample >> 1) as u8, (sample << 7) as u8)
        } else {
            ((sample >> 5) as u8, (sample << 3) as u8)
        };
        self.state = TransferState::Transmitting {
            msb,
            lsb,
            msb_sent: false,
        };
    }
}

/// Maps a screen coordinate to an ADC value through two calibration points,
/// clamped to the 12-bit range.
fn interpolate(pos: i32, adc1: u16, scr1: u8, adc2: u16, scr2: u8) -> u16 {
    let span = i64::from(scr2) - i64::from(scr1);
    let value = if span == 0 {
        warn!("tsc: zero calibration span at screen coordinate {scr1}");
        i64::from(adc1)
    } else {
        (i64::from(pos) - i64::from(scr1)) * (i64::from(adc2) - i64::from(adc1)) / span
            + i64::from(adc1)
    };
    value.clamp(0, i64::from(ADC_MAX)) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Bus;
    use crate::memory::{MAIN_RAM_SIZE, Ram};
    use pretty_assertions::assert_eq;

    fn touchscreen(cal: Calibration) -> HwTouchScreen {
        let mut ram = Ram::new(MAIN_RAM_SIZE);
        let base = USER_SETTINGS_OFFSET;
        ram.write16(base + 0x58, cal.adc_x1);
        ram.write16(base + 0x5A, cal.adc_y1);
        ram.write8(base + 0x5C, cal.scr_x1);
        ram.write8(base + 0x5D, cal.scr_y1);
        ram.write16(base + 0x5E, cal.adc_x2);
        ram.write16(base + 0x60, cal.adc_y2);
        ram.write8(base + 0x62, cal.scr_x2);
        ram.write8(base + 0x63, cal.scr_y2);
        HwTouchScreen::new(Arc::new(Mutex::new(ram)))
    }

    fn unit_calibration() -> Calibration {
        Calibration {
            adc_x1: 16,
            adc_y1: 16,
            scr_x1: 16,
            scr_y1: 16,
            adc_x2: 240,
            adc_y2: 176,
            scr_x2: 240,
            scr_y2: 176,
        }
    }

    /// Runs one 12-bit conversion and reassembles the sample.
    fn sample12(tsc: &HwTouchScreen, cmd: u8) -> u16 {
        let mut xfer = tsc.begin_transfer();
        assert_eq!(xfer.transfer(cmd), 0);
        let msb = xfer.transfer(0);
        let lsb = xfer.transfer(0);
        xfer.close();
        (u16::from(msb) << 5) | (u16::from(lsb) >> 3)
    }

    #[test]
    fn check_pen_up() {
        let tsc = touchscreen(unit_calibration());

        assert_eq!(sample12(&tsc, 0x90), 0xFFF);
        assert_eq!(sample12(&tsc, 0xD0), 0);
    }

    #[test]
    fn check_unit_mapping() {
        let tsc = touchscreen(unit_calibration());
        tsc.set_pen(true, 123, 45);

        assert_eq!(sample12(&tsc, 0xD0), 123);
        assert_eq!(sample12(&tsc, 0x90), 45);
    }

    #[test]
    fn check_scaled_mapping() {
        let tsc = touchscreen(Calibration {
            adc_x1: 0x100,
            scr_x1: 0,
            adc_x2: 0xF00,
            scr_x2: 255,
            ..unit_calibration()
        });
        tsc.set_pen(true, 128, 0);

        // 128 * 0xE00 / 255 + 0x100
        assert_eq!(sample12(&tsc, 0xD0), 0x807);
    }

    #[test]
    fn check_clamped() {
        let tsc = touchscreen(unit_calibration());
        tsc.set_pen(true, -500, 10_000);

        assert_eq!(sample12(&tsc, 0xD0), 0);
        assert_eq!(sample12(&tsc, 0x90), 0xFFF);
    }

    #[test]
    fn check_zero_span() {
        let tsc = touchscreen(Calibration {
            adc_y1: 0x300,
            scr_y1: 50,
            adc_y2: 0xC00,
            scr_y2: 50,
            ..unit_calibration()
        });
        tsc.set_pen(true, 0, 100);

        assert_eq!(sample12(&tsc, 0x90), 0x300);
    }

    #[test]
    fn check_other_channels() {
        let tsc = touchscreen(unit_calibration());
        tsc.set_pen(true, 1, 1);

        assert_eq!(sample12(&tsc, 0x80), 0x800);
        assert_eq!(sample12(&tsc, 0xA0), 0x800);
        assert_eq!(sample12(&tsc, 0xF0), 0x800);
    }

    #[test]
    fn check_framing() {
        let tsc = touchscreen(unit_calibration());
        tsc.set_pen(true, 0xAB, 0);

        let mut xfer = tsc.begin_transfer();
        xfer.transfer(0xD0);
        assert_eq!(xfer.transfer(0), 0xAB >> 5);
        assert_eq!(xfer.transfer(0), 0xAB_u16.wrapping_shl(3) as u8);
        // Draining.
        assert_eq!(xfer.transfer(0xFF), 0);
        assert_eq!(xfer.transfer(0x90), 0);
    }

    #[test]
    fn check_8bit_mode() {
        let tsc = touchscreen(unit_calibration());

        let mut xfer = tsc.begin_transfer();
        xfer.transfer(0x98);
        assert_eq!(xfer.transfer(0), 0x7F);
        assert_eq!(xfer.transfer(0), 0x80);
    }

    #[test]
    fn check_idle_scan() {
        let tsc = touchscreen(unit_calibration());
        tsc.set_pen(true, 100, 100);

        let mut xfer = tsc.begin_transfer();
        for b in [0x00, 0x7F, 0x10] {
            assert_eq!(xfer.transfer(b), 0);
        }
        xfer.transfer(0xD0);
        assert_eq!(xfer.transfer(0), 100 >> 5);
        xfer.close();

        // Closing during the scan produces nothing.
        let mut xfer = tsc.begin_transfer();
        assert_eq!(xfer.transfer(0x01), 0);
        xfer.close();
    }

    #[test]
    fn check_chained_commands() {
        let tsc = touchscreen(unit_calibration());
        tsc.set_pen(true, 200, 60);

        let mut xfer = tsc.begin_transfer();
        xfer.transfer(0xD0);
        let x_msb = xfer.transfer(0);
        let x_lsb = xfer.transfer(0x90);
        let y_msb = xfer.transfer(0);
        let y_lsb = xfer.transfer(0);

        assert_eq!((u16::from(x_msb) << 5) | (u16::from(x_lsb) >> 3), 200);
        assert_eq!((u16::from(y_msb) << 5) | (u16::from(y_lsb) >> 3), 60);
        assert_eq!(xfer.transfer(0), 0);
    }

    #[test]
    fn check_pen_snapshot() {
        let tsc = touchscreen(unit_calibration());
        tsc.set_pen(true, 100, 0);

        let mut xfer = tsc.begin_transfer();
        xfer.transfer(0xD0);
        tsc.set_pen(false, 0, 0);
        let msb = xfer.transfer(0);
        let lsb = xfer.transfer(0);

        assert_eq!((u16::from(msb) << 5) | (u16::from(lsb) >> 3), 100);
        assert!(!tsc.pen().down);
    }

    #[test]
    fn check_command_decoding() {
        let cmd = Command(0b1101_1110);
        assert!(cmd.start());
        assert_eq!(cmd.channel(), 5);
        assert!(cmd.bits8());
        assert_eq!(cmd.reference(), 1);
        assert_eq!(cmd.power_down(), 2);
        assert_eq!(CHANNEL_NAMES[usize::from(cmd.channel())], "touch_x");
    }
}
