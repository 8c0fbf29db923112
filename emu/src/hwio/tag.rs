/// A register metadata tag: comma-separated `key` or `key=value` options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag<'a>(&'a str);

impl<'a> Tag<'a> {
    #[must_use]
    pub const fn new(tag: &'a str) -> Self {
        Self(tag)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value of option `opt`: `""` if absent, `"true"` for a bare flag.
    #[must_use]
    pub fn get(&self, opt: &str) -> &'a str {
        for token in self.0.split(',') {
            match token.split_once('=') {
                Some((key, value)) if key == opt => return value,
                None if token == opt => return "true",
                _ => {}
            }
        }
        ""
    }
}

/// Parses an unsigned literal that must fit in `bits` bits.
///
/// The base comes from the prefix: `0x`, `0o`, `0b`, a bare leading `0` for
/// octal, decimal otherwise. Underscores may separate digits, or follow the
/// base prefix.
#[must_use]
pub fn parse_uint(literal: &str, bits: u32) -> Option<u64> {
    let (digits, radix, prefixed) = if let Some(rest) = strip_prefix_ci(literal, "0x") {
        (rest, 16, true)
    } else if let Some(rest) = strip_prefix_ci(literal, "0o") {
        (rest, 8, true)
    } else if let Some(rest) = strip_prefix_ci(literal, "0b") {
        (rest, 2, true)
    } else if literal.len() > 1 && literal.starts_with('0') {
        (&literal[1..], 8, true)
    } else {
        (literal, 10, false)
    };

    // A base prefix counts as a digit, so an underscore may follow it.
    let inner = if prefixed {
        digits.strip_prefix('_').unwrap_or(digits)
    } else {
        digits
    };
    if inner.starts_with('_') || digits.ends_with('_') || digits.contains("__") {
        return None;
    }
    let digits = digits.replace('_', "");
    // from_str_radix accepts a leading '+'.
    if digits.is_empty() || digits.starts_with('+') {
        return None;
    }

    let value = u64::from_str_radix(&digits, radix).ok()?;
    (bits >= 64 || value >> bits == 0).then_some(value)
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}
