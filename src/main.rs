use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};
use emu::bus::Bus;
use emu::cpu::arm::{Arch, Cpu};
use emu::cpu::coprocessor::Coprocessor;
use emu::cpu::registers::{REG_LR, REG_SP};
use emu::hardware::divisor::HwDivisor;
use emu::hardware::touchscreen::{CHANNEL_NAMES, Calibration, Command as TscCommand, HwTouchScreen};
use emu::hwio::BankTable;
use emu::memory::{MAIN_RAM_SIZE, Ram, USER_SETTINGS_OFFSET};
use tracing::info;

/// Drives the emulated console hardware from the command line.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one division through the divisor's registers
    Div {
        /// DIVCNT mode: 0 = 32/32, 1 = 64/32, 2 = 64/64
        #[arg(long, default_value_t = 0)]
        mode: u16,

        /// Numerator (hex: 0x1234, decimal, or negative decimal)
        #[arg(value_parser = parse_hex_or_dec, allow_hyphen_values = true)]
        numer: u64,

        /// Denominator (hex: 0x1234, decimal, or negative decimal)
        #[arg(value_parser = parse_hex_or_dec, allow_hyphen_values = true)]
        denom: u64,
    },

    /// Run one touchscreen conversion
    Touch {
        /// Pen X position in screen pixels
        x: i32,

        /// Pen Y position in screen pixels
        y: i32,

        /// Pen is lifted
        #[arg(long)]
        up: bool,

        /// Control byte sent to the controller (default reads X in 12-bit mode)
        #[arg(long, default_value = "0xD0", value_parser = parse_byte)]
        cmd: u8,

        /// Calibration: adc_x1,adc_y1,scr_x1,scr_y1,adc_x2,adc_y2,scr_x2,scr_y2
        #[arg(long, value_delimiter = ',')]
        calibration: Option<Vec<u16>>,
    },

    /// Reset a CPU and print its state
    Reset {
        /// Emulate the ARMv4 core instead of the ARMv5 one
        #[arg(long)]
        armv4: bool,

        /// Select high exception vectors through CP15 (ARMv5 only)
        #[arg(long)]
        high_vectors: bool,
    },
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match args.command {
        Command::Div { mode, numer, denom } => div(mode, numer, denom),
        Command::Touch {
            x,
            y,
            up,
            cmd,
            calibration,
        } => touch(x, y, up, cmd, calibration.as_deref()),
        Command::Reset {
            armv4,
            high_vectors,
        } => reset(armv4, high_vectors),
    }
}

fn div(mode: u16, numer: u64, denom: u64) {
    let mut divisor = HwDivisor::new();
    let bank = match BankTable::<HwDivisor>::new(0) {
        Ok(bank) => bank,
        Err(e) => {
            eprintln!("Failed to build divisor registers: {e}");
            std::process::exit(2);
        }
    };

    bank.write16(&mut divisor, 0x00, mode);
    bank.write64(&mut divisor, 0x10, numer);
    bank.write64(&mut divisor, 0x18, denom);

    let res = bank.read64(&mut divisor, 0x20);
    let modulus = bank.read64(&mut divisor, 0x28);
    let cnt = bank.read16(&mut divisor, 0x00);

    println!("DIVCNT = {cnt:#06X}");
    println!("RES    = {res:#018X} ({})", res as i64);
    println!("MOD    = {modulus:#018X} ({})", modulus as i64);
}

/// A typical factory calibration.
const DEFAULT_CALIBRATION: Calibration = Calibration {
    adc_x1: 0x02C0,
    adc_y1: 0x03A0,
    scr_x1: 32,
    scr_y1: 32,
    adc_x2: 0x0D60,
    adc_y2: 0x0C40,
    scr_x2: 224,
    scr_y2: 160,
};

fn touch(x: i32, y: i32, up: bool, cmd: u8, calibration: Option<&[u16]>) {
    let cal = match calibration.map(parse_calibration) {
        Some(Ok(cal)) => cal,
        Some(Err(e)) => {
            eprintln!("Invalid calibration: {e}");
            std::process::exit(2);
        }
        None => DEFAULT_CALIBRATION,
    };

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

    let tsc = HwTouchScreen::new(Arc::new(Mutex::new(ram)));
    tsc.set_pen(!up, x, y);

    let command = TscCommand(cmd);
    let mut xfer = tsc.begin_transfer();
    xfer.transfer(cmd);
    let msb = xfer.transfer(0);
    let lsb = xfer.transfer(0);
    xfer.close();

    let sample = if command.bits8() {
        (u16::from(msb) << 1) | (u16::from(lsb) >> 7)
    } else {
        (u16::from(msb) << 5) | (u16::from(lsb) >> 3)
    };
    println!(
        "channel {} ({}): bytes {msb:#04X} {lsb:#04X} -> sample {sample:#X}",
        command.channel(),
        CHANNEL_NAMES[usize::from(command.channel())]
    );
}

fn reset(armv4: bool, high_vectors: bool) {
    let arch = if armv4 { Arch::ArmV4 } else { Arch::ArmV5 };
    let mut cpu = Cpu::new(arch, Box::new(Ram::new(0x1000)));

    if high_vectors {
        if arch == Arch::ArmV4 {
            eprintln!("High vectors need the ARMv5 core");
            std::process::exit(2);
        }
        let cp15 = cpu.enable_cp15();
        let control = cp15.read(0, 1, 0, 0);
        cp15.write(0, 1, 0, 0, control | (1 << 13));
    }

    info!("resetting {:?} core", arch);
    cpu.reset();

    let cpsr = cpu.cpsr();
    println!("PC    = {:#010X}", cpu.pc());
    println!("LR    = {:#010X}", cpu.reg(REG_LR));
    println!("SP    = {:#010X}", cpu.reg(REG_SP));
    println!("CPSR  = {:#010X} ({:?})", u32::from(cpsr), cpsr.mode());
    println!("I/F   = {}/{}", cpsr.irq_disable(), cpsr.fiq_disable());
    println!("clock = {}", cpu.clock);
}

/// Builds a calibration from `adc_x1,adc_y1,scr_x1,scr_y1,adc_x2,adc_y2,scr_x2,scr_y2`.
fn parse_calibration(values: &[u16]) -> Result<Calibration, String> {
    let &[adc_x1, adc_y1, scr_x1, scr_y1, adc_x2, adc_y2, scr_x2, scr_y2] = values else {
        return Err(format!("expected 8 values, got {}", values.len()));
    };
    let screen = |name: &str, v: u16| {
        u8::try_from(v).map_err(|_| format!("{name} = {v} does not fit in a byte"))
    };
    Ok(Calibration {
        adc_x1,
        adc_y1,
        scr_x1: screen("scr_x1", scr_x1)?,
        scr_y1: screen("scr_y1", scr_y1)?,
        adc_x2,
        adc_y2,
        scr_x2: screen("scr_x2", scr_x2)?,
        scr_y2: screen("scr_y2", scr_y2)?,
    })
}

fn parse_hex_or_dec(s: &str) -> Result<u64, std::num::ParseIntError> {
    if let Some(neg) = s.strip_prefix('-') {
        parse_hex_or_dec(neg).map(|v| v.wrapping_neg())
    } else if let Some(hex) = s.strip_prefix("0x") {
        u64::from_str_radix(hex, 16)
    } else {
        s.parse()
    }
}

fn parse_byte(s: &str) -> Result<u8, String> {
    let value = parse_hex_or_dec(s).map_err(|e| e.to_string())?;
    u8::try_from(value).map_err(|_| format!("{s} does not fit in a byte"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn check_hex_or_dec() {
        assert_eq!(parse_hex_or_dec("0x10"), Ok(16));
        assert_eq!(parse_hex_or_dec("10"), Ok(10));
        assert_eq!(parse_hex_or_dec("-1"), Ok(u64::MAX));
        assert!(parse_hex_or_dec("zz").is_err());
    }

    #[test]
    fn check_byte() {
        assert_eq!(parse_byte("0xD0"), Ok(0xD0));
        assert!(parse_byte("256").is_err());
    }

    #[test]
    fn check_args() {
        let args = Args::try_parse_from(["nitro", "div", "--mode", "2", "20", "-7"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Div {
                mode: 2,
                numer: 20,
                denom
            } if denom as i64 == -7
        ));
    }

    #[test]
    fn check_calibration_args() {
        let args = Args::try_parse_from([
            "nitro",
            "touch",
            "200",
            "60",
            "--calibration",
            "16,16,16,16,240,176,240,176",
        ])
        .unwrap();
        let Command::Touch {
            calibration: Some(values),
            ..
        } = args.command
        else {
            panic!("expected a touch command with calibration");
        };
        assert_eq!(values, vec![16, 16, 16, 16, 240, 176, 240, 176]);

        let cal = parse_calibration(&values).unwrap();
        assert_eq!((cal.scr_x2, cal.scr_y2), (240, 176));
    }

    #[test]
    fn check_calibration_rejects_bad_values() {
        assert_eq!(
            parse_calibration(&[16, 16, 16, 16, 240, 176, 300, 176]).map(|_| ()),
            Err("scr_x2 = 300 does not fit in a byte".to_string())
        );
        assert_eq!(
            parse_calibration(&[16, 16, 16]).map(|_| ()),
            Err("expected 8 values, got 3".to_string())
        );
    }
}
