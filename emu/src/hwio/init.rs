use tracing::debug;

use crate::hwio::{
    Callback, HwioError, IoDevice, Method, Reg, RegAccess, RegField, RegValue, Tag, parse_uint,
};

/// A register of one bank, located at `offset`.
pub struct BankReg<P> {
    pub name: &'static str,
    pub offset: u32,
    pub access: RegAccess<P>,
}

/// Applies the metadata tags of `P`'s fields to `dev`: read-only masks, reset
/// values and callbacks.
///
/// # Errors
///
/// Fails on a tagged field that is not a 16/32/64-bit register, on a `reset`
/// or `rwmask` that does not parse or does not fit the register, and on a
/// callback that `P` does not declare with the right width and kind.
pub fn init_regs<P: IoDevice>(dev: &mut P) -> Result<(), HwioError> {
    let methods = P::methods();
    for field in P::fields() {
        let tag = Tag::new(field.tag);
        if tag.is_empty() {
            continue;
        }
        match field.access {
            RegAccess::R16(get) => init_field(get(dev), &field, tag, &methods)?,
            RegAccess::R32(get) => init_field(get(dev), &field, tag, &methods)?,
            RegAccess::R64(get) => init_field(get(dev), &field, tag, &methods)?,
            RegAccess::Unsupported(ty) => {
                return Err(HwioError::UnsupportedType {
                    field: field.name,
                    ty,
                });
            }
        }
    }
    Ok(())
}

/// Like [`init_regs`], for tables known to be correct.
///
/// # Panics
///
/// Panics on any error [`init_regs`] reports.
pub fn must_init_regs<P: IoDevice>(dev: &mut P) {
    if let Err(err) = init_regs(dev) {
        panic!("{err}");
    }
}

fn init_field<T: RegValue, P>(
    reg: &mut Reg<T, P>,
    field: &RegField<P>,
    tag: Tag<'_>,
    methods: &[Method<P>],
) -> Result<(), HwioError> {
    let rwmask = tag.get("rwmask");
    if !rwmask.is_empty() {
        reg.ro_mask = !parse_field::<T>(field.name, "rwmask", rwmask)?;
    }

    let reset = tag.get("reset");
    if !reset.is_empty() {
        reg.value = parse_field::<T>(field.name, "reset", reset)?;
    }

    let rcb = tag.get("rcb");
    if !rcb.is_empty() {
        let method = callback_name(field, rcb, "Read");
        let func = find_method(methods, field, &method)?;
        reg.read_cb =
            Some(
                T::read_callback(func).ok_or_else(|| HwioError::CallbackSignature {
                    field: field.name,
                    found: func.kind(),
                    expected: format!("read{}", T::BITS),
                    method,
                })?,
            );
    }

    let wcb = tag.get("wcb");
    if !wcb.is_empty() {
        let method = callback_name(field, wcb, "Write");
        let func = find_method(methods, field, &method)?;
        reg.write_cb =
            Some(
                T::write_callback(func).ok_or_else(|| HwioError::CallbackSignature {
                    field: field.name,
                    found: func.kind(),
                    expected: format!("write{}", T::BITS),
                    method,
                })?,
            );
    }

    debug!(
        "hwio: {} value={:#X} ro_mask={:#X}",
        field.name, reg.value, reg.ro_mask
    );
    Ok(())
}

fn parse_field<T: RegValue>(
    field: &'static str,
    key: &'static str,
    value: &str,
) -> Result<T, HwioError> {
    parse_uint(value, T::BITS)
        .map(T::truncate)
        .ok_or_else(|| HwioError::Parse {
            field,
            key,
            value: value.to_string(),
        })
}

/// `Read`/`Write` + upper-cased field name for a bare flag.
fn callback_name<P>(field: &RegField<P>, opt: &str, prefix: &str) -> String {
    if opt == "true" {
        format!("{prefix}{}", field.name.to_uppercase())
    } else {
        opt.to_string()
    }
}

fn find_method<P>(
    methods: &[Method<P>],
    field: &RegField<P>,
    name: &str,
) -> Result<Callback<P>, HwioError> {
    methods
        .iter()
        .find(|m| m.name == name)
        .map(|m| m.func)
        .ok_or_else(|| HwioError::MissingMethod {
            field: field.name,
            method: name.to_string(),
        })
}

/// Collects the registers of `P` that belong to `bank`, with their offsets.
///
/// # Errors
///
/// Fails if any tagged field has a missing or malformed `offset`, a malformed
/// `bank`, or is not a register.
pub fn bank_get_regs<P: IoDevice>(bank: u32) -> Result<Vec<BankReg<P>>, HwioError> {
    let mut regs = Vec::new();
    for field in P::fields() {
        let tag = Tag::new(field.tag);
        if tag.is_empty() {
            continue;
        }

        let offset = tag.get("offset");
        if offset.is_empty() {
            return Err(HwioError::MissingOffset { field: field.name });
        }
        let offset = parse_uint(offset, 32).ok_or_else(|| HwioError::Parse {
            field: field.name,
            key: "offset",
            value: offset.to_string(),
        })?;

        let field_bank = match tag.get("bank") {
            "" => 0,
            b => parse_uint(b, 32).ok_or_else(|| HwioError::Parse {
                field: field.name,
                key: "bank",
                value: b.to_string(),
            })?,
        };
        if field_bank != u64::from(bank) {
            continue;
        }

        if let RegAccess::Unsupported(ty) = field.access {
            return Err(HwioError::UnsupportedType {
                field: field.name,
                ty,
            });
        }

        regs.push(BankReg {
            name: field.name,
            offset: offset as u32,
            access: field.access,
        });
    }
    Ok(regs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hwio::{Reg16, Reg32, Reg64};
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Dev {
        ctrl: Reg16<Self>,
        status: Reg32<Self>,
        data: Reg64<Self>,
        aux: Reg32<Self>,
        wide: Reg64<Self>,
        reads: u32,
        last_write: Option<(u64, u64)>,
    }

    impl Dev {
        fn read_ctrl(&mut self, val: u16) -> u16 {
            self.reads += 1;
            val | 0x4000
        }

        fn write_data(&mut self, old: u64, new: u64) {
            self.last_write = Some((old, new));
        }
    }

    impl IoDevice for Dev {
        fn fields() -> Vec<RegField<Self>> {
            vec![
                RegField {
                    name: "Ctrl",
                    tag: "offset=0x0,reset=0x8001,rwmask=0x00FF,rcb",
                    access: RegAccess::R16(|d| &mut d.ctrl),
                },
                RegField {
                    name: "Status",
                    tag: "offset=0x4,reset=0xFFFFFFFF,rwmask=0",
                    access: RegAccess::R32(|d| &mut d.status),
                },
                RegField {
                    name: "Data",
                    tag: "offset=0x8,wcb=Store",
                    access: RegAccess::R64(|d| &mut d.data),
                },
                RegField {
                    name: "Aux",
                    tag: "bank=1,offset=0x10",
                    access: RegAccess::R32(|d| &mut d.aux),
                },
                RegField {
                    name: "Wide",
                    tag: "bank=1,offset=0x18,reset=0xFFFF000000000001,rwmask=0xFFFFFFFF",
                    access: RegAccess::R64(|d| &mut d.wide),
                },
                RegField {
                    name: "Scratch",
                    tag: "",
                    access: RegAccess::Unsupported("u8"),
                },
            ]
        }

        fn methods() -> Vec<Method<Self>> {
            vec![
                Method {
                    name: "ReadCTRL",
                    func: Callback::Read16(Self::read_ctrl),
                },
                Method {
                    name: "Store",
                    func: Callback::Write64(Self::write_data),
                },
            ]
        }
    }

    #[test]
    fn check_reset_and_masks() {
        let mut dev = Dev::default();
        init_regs(&mut dev).unwrap();

        assert_eq!(dev.ctrl.value, 0x8001);
        assert_eq!(dev.ctrl.ro_mask, 0xFF00);
        assert_eq!(dev.status.value, 0xFFFF_FFFF);
        assert_eq!(dev.status.ro_mask, 0xFFFF_FFFF);
        assert_eq!(dev.data.ro_mask, 0);
        assert!(dev.data.read_cb.is_none());
        assert_eq!(dev.wide.value, 0xFFFF_0000_0000_0001);
        assert_eq!(dev.wide.ro_mask, 0xFFFF_FFFF_0000_0000);
    }

    #[test]
    fn check_wide_mask_on_store() {
        let mut dev = Dev::default();
        must_init_regs(&mut dev);

        let wide = RegAccess::<Dev>::R64(|d| &mut d.wide);
        wide.bus_write(&mut dev, 0x1234_5678_9ABC_DEF0, u64::MAX);
        assert_eq!(dev.wide.value, 0xFFFF_0000_9ABC_DEF0);
    }

    #[test]
    fn check_default_and_named_callbacks() {
        let mut dev = Dev::default();
        must_init_regs(&mut dev);

        let ctrl = RegAccess::<Dev>::R16(|d| &mut d.ctrl);
        assert_eq!(ctrl.bus_read(&mut dev), 0xC001);
        assert_eq!(dev.reads, 1);

        let data = RegAccess::<Dev>::R64(|d| &mut d.data);
        data.bus_write(&mut dev, 0x1_0000_0000, u64::MAX);
        assert_eq!(dev.last_write, Some((0, 0x1_0000_0000)));
    }

    #[test]
    fn check_banks() {
        let bank0 = bank_get_regs::<Dev>(0).unwrap();
        let offsets: Vec<_> = bank0.iter().map(|r| (r.name, r.offset)).collect();
        assert_eq!(offsets, vec![("Ctrl", 0x0), ("Status", 0x4), ("Data", 0x8)]);

        let bank1 = bank_get_regs::<Dev>(1).unwrap();
        let offsets: Vec<_> = bank1.iter().map(|r| (r.name, r.offset)).collect();
        assert_eq!(offsets, vec![("Aux", 0x10), ("Wide", 0x18)]);

        assert!(bank_get_regs::<Dev>(2).unwrap().is_empty());
    }

    macro_rules! device {
        ($name:ident, $access:expr, $tag:expr) => {
            #[derive(Default)]
            struct $name {
                r16: Reg16<Self>,
                r32: Reg32<Self>,
            }

            impl $name {
                fn write_r16(&mut self, _: u16, _: u16) {}
            }

            impl IoDevice for $name {
                fn fields() -> Vec<RegField<Self>> {
                    vec![RegField {
                        name: "Reg",
                        tag: $tag,
                        access: $access,
                    }]
                }

                fn methods() -> Vec<Method<Self>> {
                    vec![Method {
                        name: "WriteR16",
                        func: Callback::Write16(Self::write_r16),
                    }]
                }
            }
        };
    }

    #[test]
    fn check_errors() {
        device!(BadType, RegAccess::Unsupported("u8"), "offset=0");
        device!(TooWide, RegAccess::R16(|d| &mut d.r16), "reset=0x10000");
        device!(BadMask, RegAccess::R32(|d| &mut d.r32), "rwmask=0xZZ");
        device!(NoMethod, RegAccess::R32(|d| &mut d.r32), "rcb");
        device!(WrongKind, RegAccess::R32(|d| &mut d.r32), "wcb=WriteR16");
        device!(NoOffset, RegAccess::R32(|d| &mut d.r32), "reset=1");
        device!(BadBank, RegAccess::R32(|d| &mut d.r32), "offset=4,bank=x");

        assert_eq!(
            init_regs(&mut BadType::default()),
            Err(HwioError::UnsupportedType {
                field: "Reg",
                ty: "u8"
            })
        );
        assert_eq!(
            init_regs(&mut TooWide::default()),
            Err(HwioError::Parse {
                field: "Reg",
                key: "reset",
                value: "0x10000".to_string()
            })
        );
        assert!(matches!(
            init_regs(&mut BadMask::default()),
            Err(HwioError::Parse { key: "rwmask", .. })
        ));
        assert_eq!(
            init_regs(&mut NoMethod::default()),
            Err(HwioError::MissingMethod {
                field: "Reg",
                method: "ReadREG".to_string()
            })
        );
        assert!(matches!(
            init_regs(&mut WrongKind::default()),
            Err(HwioError::CallbackSignature {
                found: "write16",
                ..
            })
        ));
        assert!(matches!(
            bank_get_regs::<NoOffset>(0),
            Err(HwioError::MissingOffset { field: "Reg" })
        ));
        assert!(matches!(
            bank_get_regs::<BadBank>(0),
            Err(HwioError::Parse { key: "bank", .. })
        ));
    }

    #[test]
    #[should_panic(expected = "cannot find method")]
    fn check_must_init_panics() {
        device!(Broken, RegAccess::R32(|d| &mut d.r32), "wcb=Missing");
        must_init_regs(&mut Broken::default());
    }

    #[test]
    fn check_full_width_masks() {
        let mut dev = Dev::default();
        init_regs(&mut dev).unwrap();

        // rwmask=0 on a 32-bit register makes every bit read-only.
        let status = RegAccess::<Dev>::R32(|d| &mut d.status);
        status.bus_write(&mut dev, 0, u64::MAX);
        assert_eq!(dev.status.value, 0xFFFF_FFFF);
    }
}
