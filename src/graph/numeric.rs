//! Arbitrary-precision numbers.
//!
//! [`BigInteger`] keeps the big-endian two's complement bytes the wire
//! carries; [`BigDecimal`] pairs one with a decimal scale.

use std::fmt;
use std::str::FromStr;

use super::error::{GraphError, GraphResult};

// ============================================================================
// BigInteger
// ============================================================================

/// Arbitrary-precision signed integer.
///
/// Stored as minimal big-endian two's complement bytes, never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BigInteger {
    bytes: Vec<u8>,
}

impl BigInteger {
    /// Zero.
    pub fn zero() -> Self {
        Self { bytes: vec![0] }
    }

    /// From big-endian two's complement bytes. Redundant sign bytes are
    /// dropped; an empty slice is zero.
    pub fn from_signed_bytes_be(bytes: &[u8]) -> Self {
        let Some(&first) = bytes.first() else {
            return Self::zero();
        };
        let negative = first & 0x80 != 0;
        let fill = if negative { 0xFF } else { 0x00 };
        let mut start = 0;
        while start + 1 < bytes.len()
            && bytes[start] == fill
            && (bytes[start + 1] & 0x80 != 0) == negative
        {
            start += 1;
        }
        Self {
            bytes: bytes[start..].to_vec(),
        }
    }

    /// Big-endian two's complement bytes.
    pub fn to_signed_bytes_be(&self) -> &[u8] {
        &self.bytes
    }

    /// Sign check.
    pub fn is_negative(&self) -> bool {
        self.bytes.first().map_or(false, |b| b & 0x80 != 0)
    }

    /// Value as `i128`, if it fits.
    pub fn to_i128(&self) -> Option<i128> {
        if self.bytes.len() > 16 {
            return None;
        }
        let fill = if self.is_negative() { 0xFF } else { 0x00 };
        let mut raw = [fill; 16];
        raw[16 - self.bytes.len()..].copy_from_slice(&self.bytes);
        Some(i128::from_be_bytes(raw))
    }

    /// Value as `i64`, if it fits.
    pub fn to_i64(&self) -> Option<i64> {
        self.to_i128().and_then(|v| i64::try_from(v).ok())
    }

    /// Unsigned big-endian magnitude.
    fn magnitude(&self) -> Vec<u8> {
        if !self.is_negative() {
            return self.bytes.clone();
        }
        let mut magnitude: Vec<u8> = self.bytes.iter().map(|b| !b).collect();
        add_small(&mut magnitude, 1);
        magnitude
    }

    fn from_magnitude(mut magnitude: Vec<u8>, negative: bool) -> Self {
        magnitude.insert(0, 0);
        if negative {
            // two's complement negation, wrapping
            let mut carry = true;
            for byte in magnitude.iter_mut().rev() {
                let (sum, overflow) = (!*byte).overflowing_add(u8::from(carry));
                *byte = sum;
                carry = overflow;
            }
        }
        Self::from_signed_bytes_be(&magnitude)
    }

    /// Decimal digits of the absolute value.
    fn abs_digits(&self) -> String {
        let mut magnitude = self.magnitude();
        let mut digits = Vec::new();
        while magnitude.iter().any(|&b| b != 0) {
            digits.push(b'0' + div_small(&mut magnitude, 10));
        }
        if digits.is_empty() {
            digits.push(b'0');
        }
        digits.reverse();
        String::from_utf8_lossy(&digits).into_owned()
    }
}

// magnitude += n, growing at the front on carry
fn add_small(magnitude: &mut Vec<u8>, n: u8) {
    let mut carry = u16::from(n);
    for byte in magnitude.iter_mut().rev() {
        if carry == 0 {
            return;
        }
        let sum = u16::from(*byte) + carry;
        *byte = sum as u8;
        carry = sum >> 8;
    }
    if carry > 0 {
        magnitude.insert(0, carry as u8);
    }
}

// magnitude = magnitude * m + add
fn mul_add_small(magnitude: &mut Vec<u8>, m: u8, add: u8) {
    let mut carry = u16::from(add);
    for byte in magnitude.iter_mut().rev() {
        let product = u16::from(*byte) * u16::from(m) + carry;
        *byte = product as u8;
        carry = product >> 8;
    }
    if carry > 0 {
        magnitude.insert(0, carry as u8);
    }
}

// magnitude /= d, returns the remainder
fn div_small(magnitude: &mut [u8], d: u8) -> u8 {
    let mut remainder = 0u16;
    for byte in magnitude.iter_mut() {
        let current = (remainder << 8) | u16::from(*byte);
        *byte = (current / u16::from(d)) as u8;
        remainder = current % u16::from(d);
    }
    remainder as u8
}

fn parse_digits(digits: &str, negative: bool) -> Option<BigInteger> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut magnitude = vec![0u8];
    for b in digits.bytes() {
        mul_add_small(&mut magnitude, 10, b - b'0');
    }
    Some(BigInteger::from_magnitude(magnitude, negative))
}

fn split_sign(text: &str) -> (bool, &str) {
    match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    }
}

impl From<i64> for BigInteger {
    fn from(v: i64) -> Self {
        Self::from_signed_bytes_be(&v.to_be_bytes())
    }
}

impl From<i128> for BigInteger {
    fn from(v: i128) -> Self {
        Self::from_signed_bytes_be(&v.to_be_bytes())
    }
}

impl From<u64> for BigInteger {
    fn from(v: u64) -> Self {
        Self::from(i128::from(v))
    }
}

impl FromStr for BigInteger {
    type Err = GraphError;

    fn from_str(text: &str) -> GraphResult<Self> {
        let (negative, digits) = split_sign(text.trim());
        parse_digits(digits, negative)
            .ok_or_else(|| GraphError::type_conversion(format!("Invalid integer: {:?}", text)))
    }
}

impl fmt::Display for BigInteger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            write!(f, "-")?;
        }
        write!(f, "{}", self.abs_digits())
    }
}

// ============================================================================
// BigDecimal
// ============================================================================

/// Arbitrary-precision decimal: `unscaled × 10^-scale`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BigDecimal {
    unscaled: BigInteger,
    scale: i32,
}

impl BigDecimal {
    /// Create from an unscaled value and a scale.
    pub fn new(unscaled: impl Into<BigInteger>, scale: i32) -> Self {
        Self {
            unscaled: unscaled.into(),
            scale,
        }
    }

    /// Unscaled value.
    pub fn unscaled(&self) -> &BigInteger {
        &self.unscaled
    }

    /// Scale (digits after the decimal point).
    pub fn scale(&self) -> i32 {
        self.scale
    }

    /// Approximate value as `f64`.
    pub fn to_f64(&self) -> Option<f64> {
        self.to_string().parse().ok()
    }
}

impl FromStr for BigDecimal {
    type Err = GraphError;

    fn from_str(text: &str) -> GraphResult<Self> {
        let invalid = || GraphError::type_conversion(format!("Invalid decimal: {:?}", text));

        let (negative, rest) = split_sign(text.trim());
        let (mantissa, exponent) = match rest.find(['e', 'E']) {
            Some(at) => {
                let exponent: i64 = rest[at + 1..].parse().map_err(|_| invalid())?;
                (&rest[..at], exponent)
            }
            None => (rest, 0),
        };
        let (whole, fraction) = match mantissa.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (mantissa, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }

        let digits = format!("{}{}", whole, fraction);
        let unscaled = parse_digits(&digits, negative).ok_or_else(invalid)?;
        let scale = i32::try_from(fraction.len() as i64 - exponent).map_err(|_| invalid())?;
        Ok(Self { unscaled, scale })
    }
}

impl fmt::Display for BigDecimal {
    // Plain notation unless the exponent is below -6 or the scale is
    // negative, then scientific.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.unscaled.abs_digits();
        let sign = if self.unscaled.is_negative() { "-" } else { "" };
        let scale = i64::from(self.scale);
        let adjusted = digits.len() as i64 - 1 - scale;

        if scale >= 0 && adjusted >= -6 {
            let scale = scale as usize;
            if scale == 0 {
                return write!(f, "{}{}", sign, digits);
            }
            if digits.len() > scale {
                let (whole, fraction) = digits.split_at(digits.len() - scale);
                return write!(f, "{}{}.{}", sign, whole, fraction);
            }
            let zeros = "0".repeat(scale - digits.len());
            return write!(f, "{}0.{}{}", sign, zeros, digits);
        }

        let (head, tail) = digits.split_at(1);
        write!(f, "{}{}", sign, head)?;
        if !tail.is_empty() {
            write!(f, ".{}", tail)?;
        }
        write!(f, "E{}{}", if adjusted >= 0 { "+" } else { "" }, adjusted)
    }
}
