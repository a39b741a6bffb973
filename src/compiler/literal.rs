//! Number and char literal parsing: suffix validation, radix handling, and
//! range checking (spec.md §6.2 grammar, §7 `InvalidLiteral`).
//!
//! The lexer only separates a literal from the surrounding source text; it
//! does not know the type suffix set or the radix prefixes, since those
//! are a grammar-and-types concern, not a character-classification one.
//! Grounded in `examples/original_source/bootstrap/compiler/compiler.go`'s
//! `putUvarint`-style little-endian byte writer for the encoding direction
//! (this module does the inverse: text to a fixed-width LE byte buffer).

use crate::compiler::error::CompileError;
use crate::compiler::types::Typ;

/// Ordered longest-suffix-first so `u128` is tried before `u8` would
/// otherwise spuriously match a trailing `"8"`.
const SUFFIXES: &[(&str, Typ)] = &[
    ("u128", Typ::U128),
    ("i128", Typ::I128),
    ("u64", Typ::U64),
    ("i64", Typ::I64),
    ("u32", Typ::U32),
    ("i32", Typ::I32),
    ("u16", Typ::U16),
    ("i16", Typ::I16),
    ("u8", Typ::U8),
    ("i8", Typ::I8),
];

/// Parse a raw number-literal token (as produced by the lexer, e.g.
/// `"0x2Au32"`, `"-5i8"`) into its declared `Typ` and little-endian bytes.
pub fn parse_number(text: &str) -> Result<(Typ, Vec<u8>), CompileError> {
    let negative = text.starts_with('-');
    let unsigned_text = if negative { &text[1..] } else { text };

    let (suffix, typ) = SUFFIXES
        .iter()
        .find(|(suf, _)| unsigned_text.ends_with(suf))
        .ok_or_else(|| CompileError::InvalidLiteral {
            literal: text.to_string(),
            detail: "missing a type suffix".to_string(),
        })?;

    if negative && !matches!(typ, Typ::I8 | Typ::I16 | Typ::I32 | Typ::I64 | Typ::I128) {
        return Err(CompileError::InvalidLiteral {
            literal: text.to_string(),
            detail: "negative literal needs a signed suffix".to_string(),
        });
    }

    let digits = &unsigned_text[..unsigned_text.len() - suffix.len()];
    if digits.is_empty() {
        return Err(CompileError::InvalidLiteral {
            literal: text.to_string(),
            detail: "no digits before the type suffix".to_string(),
        });
    }

    let (radix, digits) = if let Some(rest) = digits.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = digits.strip_prefix("0b") {
        (2, rest)
    } else {
        (10, digits)
    };
    if digits.is_empty() {
        return Err(CompileError::InvalidLiteral {
            literal: text.to_string(),
            detail: "no digits after the radix prefix".to_string(),
        });
    }

    let magnitude = u128::from_str_radix(digits, radix).map_err(|_| CompileError::InvalidLiteral {
        literal: text.to_string(),
        detail: "not a valid integer".to_string(),
    })?;

    let width_bytes = typ.size() as usize;
    let is_unsigned = matches!(typ, Typ::U8 | Typ::U16 | Typ::U32 | Typ::U64 | Typ::U128);

    let bytes = if is_unsigned {
        check_unsigned_range(typ, magnitude, text)?;
        magnitude.to_le_bytes()[..width_bytes].to_vec()
    } else {
        if magnitude > i128::MAX as u128 {
            return Err(CompileError::InvalidLiteral {
                literal: text.to_string(),
                detail: format!("value out of range for {}", typ),
            });
        }
        let value: i128 = if negative { -(magnitude as i128) } else { magnitude as i128 };
        check_signed_range(typ, value, text)?;
        value.to_le_bytes()[..width_bytes].to_vec()
    };

    Ok((typ.clone(), bytes))
}

fn check_unsigned_range(typ: &Typ, magnitude: u128, text: &str) -> Result<(), CompileError> {
    let max: u128 = match typ {
        Typ::U8 => u8::MAX as u128,
        Typ::U16 => u16::MAX as u128,
        Typ::U32 => u32::MAX as u128,
        Typ::U64 => u64::MAX as u128,
        Typ::U128 => u128::MAX,
        _ => unreachable!("not an unsigned type"),
    };
    if magnitude > max {
        return Err(CompileError::InvalidLiteral {
            literal: text.to_string(),
            detail: format!("value out of range for {}", typ),
        });
    }
    Ok(())
}

fn check_signed_range(typ: &Typ, value: i128, text: &str) -> Result<(), CompileError> {
    let (min, max): (i128, i128) = match typ {
        Typ::I8 => (i8::MIN as i128, i8::MAX as i128),
        Typ::I16 => (i16::MIN as i128, i16::MAX as i128),
        Typ::I32 => (i32::MIN as i128, i32::MAX as i128),
        Typ::I64 => (i64::MIN as i128, i64::MAX as i128),
        Typ::I128 => (i128::MIN, i128::MAX),
        _ => unreachable!("not a signed type"),
    };
    if value < min || value > max {
        return Err(CompileError::InvalidLiteral {
            literal: text.to_string(),
            detail: format!("value out of range for {}", typ),
        });
    }
    Ok(())
}

/// Validate a char literal's decoded content is exactly one byte and
/// return that byte.
pub fn parse_char(content: &str) -> Result<u8, CompileError> {
    let bytes = content.as_bytes();
    if bytes.len() != 1 {
        return Err(CompileError::InvalidLiteral {
            literal: content.to_string(),
            detail: "char literal must be exactly one byte".to_string(),
        });
    }
    Ok(bytes[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_with_suffix() {
        let (typ, bytes) = parse_number("42u8").unwrap();
        assert_eq!(typ, Typ::U8);
        assert_eq!(bytes, vec![42]);
    }

    #[test]
    fn parses_hex_and_binary() {
        assert_eq!(parse_number("0x2Au32").unwrap().1, vec![42, 0, 0, 0]);
        assert_eq!(parse_number("0b101u8").unwrap().1, vec![5]);
    }

    #[test]
    fn parses_negative_signed() {
        let (typ, bytes) = parse_number("-5i8").unwrap();
        assert_eq!(typ, Typ::I8);
        assert_eq!(bytes, vec![(-5i8) as u8]);
    }

    #[test]
    fn rejects_missing_suffix() {
        assert!(parse_number("42").is_err());
    }

    #[test]
    fn rejects_negative_unsigned() {
        assert!(parse_number("-5u8").is_err());
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(parse_number("256u8").is_err());
        assert!(parse_number("128i8").is_err());
    }

    #[test]
    fn char_must_be_one_byte() {
        assert_eq!(parse_char("x").unwrap(), b'x');
        assert!(parse_char("").is_err());
        assert!(parse_char("€").is_err());
    }
}
