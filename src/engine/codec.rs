// Byte order is always explicit here. Only BigInt kinds can lose a value.

use crate::types::{JsBigInt, Numeric, bigint_ops};

/// Quiet NaN returned by big-endian float decoding when the stored pattern is
/// any other NaN.
pub const CANONICAL_NAN_BITS: u64 = 0x7FF8_0000_0000_0000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Int8,
    Uint8,
    Uint8Clamped,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
    BigInt64,
    BigUint64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentType {
    Number,
    BigInt,
}

impl ElementKind {
    pub const ALL: [ElementKind; 11] = [
        ElementKind::Int8,
        ElementKind::Uint8,
        ElementKind::Uint8Clamped,
        ElementKind::Int16,
        ElementKind::Uint16,
        ElementKind::Int32,
        ElementKind::Uint32,
        ElementKind::Float32,
        ElementKind::Float64,
        ElementKind::BigInt64,
        ElementKind::BigUint64,
    ];

    pub fn bytes_per_element(self) -> usize {
        match self {
            ElementKind::Int8 | ElementKind::Uint8 | ElementKind::Uint8Clamped => 1,
            ElementKind::Int16 | ElementKind::Uint16 => 2,
            ElementKind::Int32 | ElementKind::Uint32 | ElementKind::Float32 => 4,
            ElementKind::Float64 | ElementKind::BigInt64 | ElementKind::BigUint64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementKind::Int8 => "Int8Array",
            ElementKind::Uint8 => "Uint8Array",
            ElementKind::Uint8Clamped => "Uint8ClampedArray",
            ElementKind::Int16 => "Int16Array",
            ElementKind::Uint16 => "Uint16Array",
            ElementKind::Int32 => "Int32Array",
            ElementKind::Uint32 => "Uint32Array",
            ElementKind::Float32 => "Float32Array",
            ElementKind::Float64 => "Float64Array",
            ElementKind::BigInt64 => "BigInt64Array",
            ElementKind::BigUint64 => "BigUint64Array",
        }
    }

    pub fn is_bigint(self) -> bool {
        matches!(self, ElementKind::BigInt64 | ElementKind::BigUint64)
    }

    pub fn content_type(self) -> ContentType {
        if self.is_bigint() {
            ContentType::BigInt
        } else {
            ContentType::Number
        }
    }
}

fn read_raw(bytes: &[u8], size: usize, little_endian: bool) -> u64 {
    debug_assert!(bytes.len() >= size, "element needs {size} bytes, got {}", bytes.len());
    let mut raw = [0u8; 8];
    if little_endian {
        raw[..size].copy_from_slice(&bytes[..size]);
        u64::from_le_bytes(raw)
    } else {
        raw[8 - size..].copy_from_slice(&bytes[..size]);
        u64::from_be_bytes(raw)
    }
}

fn write_raw(out: &mut [u8], size: usize, bits: u64, little_endian: bool) {
    debug_assert!(out.len() >= size, "element needs {size} bytes, got {}", out.len());
    if little_endian {
        out[..size].copy_from_slice(&bits.to_le_bytes()[..size]);
    } else {
        out[..size].copy_from_slice(&bits.to_be_bytes()[8 - size..]);
    }
}

/// Decode one element from the first `bytes_per_element` bytes of `bytes`.
///
/// # Panics
///
/// Panics if `bytes` is shorter than one element.
pub fn decode(bytes: &[u8], kind: ElementKind, little_endian: bool) -> Numeric {
    let size = kind.bytes_per_element();
    let raw = read_raw(bytes, size, little_endian);
    match kind {
        ElementKind::Int8 => Numeric::Int(raw as u8 as i8 as i32),
        ElementKind::Uint8 | ElementKind::Uint8Clamped => Numeric::Int(raw as u8 as i32),
        ElementKind::Int16 => Numeric::Int(raw as u16 as i16 as i32),
        ElementKind::Uint16 => Numeric::Int(raw as u16 as i32),
        ElementKind::Int32 => Numeric::Int(raw as u32 as i32),
        ElementKind::Uint32 => {
            let v = raw as u32;
            if v > i32::MAX as u32 {
                Numeric::Double(v as f64)
            } else {
                Numeric::Int(v as i32)
            }
        }
        ElementKind::Float32 => {
            let d = f32::from_bits(raw as u32) as f64;
            Numeric::Double(canonicalize(d, little_endian))
        }
        ElementKind::Float64 => {
            let d = f64::from_bits(raw);
            Numeric::Double(canonicalize(d, little_endian))
        }
        ElementKind::BigInt64 => Numeric::BigInt(JsBigInt::from(raw as i64)),
        ElementKind::BigUint64 => Numeric::BigInt(JsBigInt::from(raw)),
    }
}

fn canonicalize(d: f64, little_endian: bool) -> f64 {
    if !little_endian && d.is_nan() && d.to_bits() != CANONICAL_NAN_BITS {
        f64::from_bits(CANONICAL_NAN_BITS)
    } else {
        d
    }
}

/// ToUint8Clamp, ties to even.
pub fn clamp_to_uint8(n: f64) -> u8 {
    if n.is_nan() || n <= 0.0 {
        return 0;
    }
    if n >= 255.0 {
        return 255;
    }
    let f = n.floor();
    let diff = n - f;
    let rounded = if diff > 0.5 {
        f + 1.0
    } else if diff < 0.5 {
        f
    } else if f % 2.0 == 0.0 {
        f
    } else {
        f + 1.0
    };
    rounded as u8
}

/// Truncate toward zero and reduce modulo 2^bits. Non-finite values become 0.
fn to_uint_bits(n: f64, bits: i32) -> u64 {
    if !n.is_finite() {
        return 0;
    }
    let modulus = 2f64.powi(bits);
    n.trunc().rem_euclid(modulus) as u64
}

fn number_bits(n: f64, kind: ElementKind) -> u64 {
    match kind {
        ElementKind::Int8 | ElementKind::Uint8 => to_uint_bits(n, 8),
        ElementKind::Uint8Clamped => clamp_to_uint8(n) as u64,
        ElementKind::Int16 | ElementKind::Uint16 => to_uint_bits(n, 16),
        ElementKind::Int32 | ElementKind::Uint32 => to_uint_bits(n, 32),
        ElementKind::Float32 => (n as f32).to_bits() as u64,
        ElementKind::Float64 => n.to_bits(),
        ElementKind::BigInt64 | ElementKind::BigUint64 => {
            unreachable!("number value routed to {}", kind.name())
        }
    }
}

/// Encode `value` into the first `bytes_per_element` bytes of `out`.
///
/// Returns whether the value was stored without loss. Number kinds always
/// report `true`; BigInt kinds report `false` when the value was wrapped
/// modulo 2^64.
///
/// # Panics
///
/// Panics if `out` is shorter than one element, or if a BigInt is paired
/// with a number kind (or the reverse).
pub fn encode(value: &Numeric, kind: ElementKind, little_endian: bool, out: &mut [u8]) -> bool {
    let size = kind.bytes_per_element();
    let (bits, lossless) = element_bits(value, kind);
    write_raw(out, size, bits, little_endian);
    lossless
}

fn element_bits(value: &Numeric, kind: ElementKind) -> (u64, bool) {
    match (value, kind) {
        (Numeric::BigInt(b), ElementKind::BigInt64) => {
            let (v, lossless) = bigint_ops::to_int64(&b.value);
            (v as u64, lossless)
        }
        (Numeric::BigInt(b), ElementKind::BigUint64) => bigint_ops::to_uint64(&b.value),
        (Numeric::Int(i), _) => (number_bits(*i as f64, kind), true),
        (Numeric::Double(d), _) => (number_bits(*d, kind), true),
        (Numeric::BigInt(_), _) => unreachable!("BigInt value routed to {}", kind.name()),
    }
}

/// Encode `value` once and replicate it over every element slot in `out`.
/// Single-byte kinds take a plain memset; trailing bytes that do not make up
/// a whole element are left alone.
///
/// # Panics
///
/// Panics on a content type mismatch, as `encode` does.
pub fn encode_fill(value: &Numeric, kind: ElementKind, little_endian: bool, out: &mut [u8]) -> bool {
    let size = kind.bytes_per_element();
    let (bits, lossless) = element_bits(value, kind);
    if size == 1 {
        out.fill(bits as u8);
        return lossless;
    }
    let mut pattern = [0u8; 8];
    write_raw(&mut pattern, size, bits, little_endian);
    for slot in out.chunks_exact_mut(size) {
        slot.copy_from_slice(&pattern[..size]);
    }
    lossless
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: Numeric, kind: ElementKind, little_endian: bool) -> Numeric {
        let mut buf = [0u8; 8];
        encode(&value, kind, little_endian, &mut buf);
        decode(&buf, kind, little_endian)
    }

    #[test]
    fn representable_values_survive_both_byte_orders() {
        let cases = [
            (ElementKind::Int8, Numeric::Int(-128)),
            (ElementKind::Uint8, Numeric::Int(255)),
            (ElementKind::Uint8Clamped, Numeric::Int(200)),
            (ElementKind::Int16, Numeric::Int(-12345)),
            (ElementKind::Uint16, Numeric::Int(65535)),
            (ElementKind::Int32, Numeric::Int(i32::MIN)),
            (ElementKind::Uint32, Numeric::Double(4294967295.0)),
            (ElementKind::Float32, Numeric::Double(1.5)),
            (ElementKind::Float64, Numeric::Double(-0.1)),
            (ElementKind::BigInt64, Numeric::BigInt(JsBigInt::from(i64::MIN))),
            (ElementKind::BigUint64, Numeric::BigInt(JsBigInt::from(u64::MAX))),
        ];
        for (kind, value) in cases {
            for le in [true, false] {
                assert_eq!(round_trip(value.clone(), kind, le), value, "{kind:?} le={le}");
            }
        }
    }

    #[test]
    fn byte_orders_are_mirror_images() {
        for kind in ElementKind::ALL {
            let value = if kind.is_bigint() {
                Numeric::BigInt(JsBigInt::from(0x0102_0304_0506_0708i64))
            } else {
                match kind.bytes_per_element() {
                    1 => Numeric::Int(0x12),
                    2 => Numeric::Int(0x1234),
                    _ => Numeric::Int(0x1234_5678),
                }
            };
            let size = kind.bytes_per_element();
            let mut le = [0u8; 8];
            let mut be = [0u8; 8];
            encode(&value, kind, true, &mut le);
            encode(&value, kind, false, &mut be);
            let mut reversed = le[..size].to_vec();
            reversed.reverse();
            assert_eq!(&be[..size], &reversed[..], "{kind:?}");
        }
    }

    #[test]
    fn uint32_above_int_range_decodes_as_double() {
        let bytes = 0x8000_0000u32.to_le_bytes();
        assert_eq!(decode(&bytes, ElementKind::Uint32, true), Numeric::Double(2147483648.0));
        let bytes = 0x7FFF_FFFFu32.to_le_bytes();
        assert_eq!(decode(&bytes, ElementKind::Uint32, true), Numeric::Int(i32::MAX));
    }

    #[test]
    fn nan_canonicalization_only_on_big_endian() {
        let impure: u64 = 0x7FF8_0000_0000_0001;
        let le = impure.to_le_bytes();
        match decode(&le, ElementKind::Float64, true) {
            Numeric::Double(d) => assert_eq!(d.to_bits(), impure),
            other => panic!("unexpected {other:?}"),
        }
        let be = impure.to_be_bytes();
        match decode(&be, ElementKind::Float64, false) {
            Numeric::Double(d) => assert_eq!(d.to_bits(), CANONICAL_NAN_BITS),
            other => panic!("unexpected {other:?}"),
        }
        let be32 = 0x7FC0_0001u32.to_be_bytes();
        match decode(&be32, ElementKind::Float32, false) {
            Numeric::Double(d) => assert_eq!(d.to_bits(), CANONICAL_NAN_BITS),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn float32_nan_payload_is_widened_on_little_endian() {
        let impure32 = 0x7FC0_0001u32;
        match decode(&impure32.to_le_bytes(), ElementKind::Float32, true) {
            Numeric::Double(d) => {
                assert!(d.is_nan());
                assert_eq!(d.to_bits(), (f32::from_bits(impure32) as f64).to_bits());
                // widening shifts the 23-bit payload into the top of the 52-bit one
                #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
                assert_eq!(d.to_bits(), 0x7FF8_0000_2000_0000);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn integer_kinds_wrap() {
        let mut buf = [0u8; 8];
        encode(&Numeric::Double(300.0), ElementKind::Uint8, true, &mut buf);
        assert_eq!(buf[0], 44);
        encode(&Numeric::Double(-1.0), ElementKind::Uint16, true, &mut buf);
        assert_eq!(&buf[..2], &[0xFF, 0xFF]);
        encode(&Numeric::Double(-2.9), ElementKind::Int8, true, &mut buf);
        assert_eq!(buf[0] as i8, -2);
        encode(&Numeric::Double(f64::NAN), ElementKind::Int32, true, &mut buf);
        assert_eq!(&buf[..4], &[0, 0, 0, 0]);
        encode(&Numeric::Double(f64::INFINITY), ElementKind::Int32, true, &mut buf);
        assert_eq!(&buf[..4], &[0, 0, 0, 0]);
        encode(&Numeric::Double(4294967296.0 + 7.0), ElementKind::Uint32, true, &mut buf);
        assert_eq!(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]), 7);
    }

    #[test]
    fn clamping_rounds_half_to_even() {
        assert_eq!(clamp_to_uint8(0.5), 0);
        assert_eq!(clamp_to_uint8(1.5), 2);
        assert_eq!(clamp_to_uint8(2.5), 2);
        assert_eq!(clamp_to_uint8(2.6), 3);
        assert_eq!(clamp_to_uint8(-3.0), 0);
        assert_eq!(clamp_to_uint8(300.0), 255);
        assert_eq!(clamp_to_uint8(f64::NAN), 0);
        assert_eq!(clamp_to_uint8(254.5), 254);
    }

    #[test]
    fn bigint_writes_report_loss() {
        let mut buf = [0u8; 8];
        let minus_one = Numeric::BigInt(JsBigInt::from(-1i64));
        assert!(encode(&minus_one, ElementKind::BigInt64, true, &mut buf));
        assert!(!encode(&minus_one, ElementKind::BigUint64, true, &mut buf));
        assert_eq!(buf, [0xFF; 8]);
        assert_eq!(
            decode(&buf, ElementKind::BigUint64, true),
            Numeric::BigInt(JsBigInt::from(u64::MAX))
        );
    }

    #[test]
    #[should_panic]
    fn number_into_bigint_kind_panics() {
        let mut buf = [0u8; 8];
        encode(&Numeric::Int(1), ElementKind::BigInt64, true, &mut buf);
    }

    #[test]
    fn fill_replicates_pattern() {
        let mut buf = [0u8; 8];
        encode_fill(&Numeric::Int(0x0102), ElementKind::Uint16, false, &mut buf);
        assert_eq!(buf, [1, 2, 1, 2, 1, 2, 1, 2]);
        let mut bytes = [0u8; 5];
        encode_fill(&Numeric::Double(-1.0), ElementKind::Int8, true, &mut bytes);
        assert_eq!(bytes, [0xFF; 5]);
    }
}
