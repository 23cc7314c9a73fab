// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{FheType, InputError};
use alloy::primitives::U256;

/// Parse a plaintext given as text into a value checked against `ty`.
///
/// Accepts decimal (`1000000`, `1_000_000`) and `0x` prefixed hex. Booleans additionally accept
/// `true` and `false`. Nothing is truncated: a value that does not fit is an error.
pub fn parse_plaintext(raw: &str, ty: FheType) -> Result<U256, InputError> {
    let trimmed = raw.trim();
    if trimmed.starts_with('-') {
        return Err(InputError::ValueOutOfRange {
            value: trimmed.to_string(),
            ty,
        });
    }

    if ty == FheType::Bool {
        match trimmed {
            "true" => return Ok(U256::from(1)),
            "false" => return Ok(U256::ZERO),
            _ => {}
        }
    }

    let cleaned = trimmed.replace('_', "");
    let (digits, radix) = match cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        Some(hex_digits) => (hex_digits, 16),
        None => (cleaned.as_str(), 10),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(InputError::InvalidNumber(trimmed.to_string()));
    }

    // Well formed digits that still fail to parse overflow 256 bits
    let value =
        U256::from_str_radix(digits, radix as u64).map_err(|_| InputError::ValueOutOfRange {
            value: trimmed.to_string(),
            ty,
        })?;

    if !ty.fits(&value) {
        return Err(InputError::ValueOutOfRange {
            value: trimmed.to_string(),
            ty,
        });
    }
    Ok(value)
}
