use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum JsValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(JsString),
    BigInt(JsBigInt),
}

impl JsValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, JsValue::Undefined)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, JsValue::Number(_))
    }

    pub fn is_bigint(&self) -> bool {
        matches!(self, JsValue::BigInt(_))
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, JsValue::Number(n) if n.is_nan())
    }

    pub fn bigint(n: i64) -> Self {
        JsValue::BigInt(JsBigInt::from(n))
    }

    pub fn string(s: &str) -> Self {
        JsValue::String(JsString::from_str(s))
    }
}

impl From<f64> for JsValue {
    fn from(n: f64) -> Self {
        JsValue::Number(n)
    }
}

// Strings are kept in one of two widths. A string is one-byte iff every code
// unit is in 0x01..=0x7F; constructors normalize so equal strings compare equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct JsString {
    repr: StringRepr,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum StringRepr {
    OneByte(Vec<u8>),
    TwoByte(Vec<u16>),
}

pub(crate) fn is_one_byte_unit(c: u16) -> bool {
    c > 0 && c <= 0x7F
}

impl JsString {
    pub fn from_str(s: &str) -> Self {
        if s.bytes().all(|b| is_one_byte_unit(b as u16)) {
            Self {
                repr: StringRepr::OneByte(s.as_bytes().to_vec()),
            }
        } else {
            Self {
                repr: StringRepr::TwoByte(s.encode_utf16().collect()),
            }
        }
    }

    pub fn from_code_units(units: Vec<u16>) -> Self {
        if units.iter().all(|&c| is_one_byte_unit(c)) {
            Self {
                repr: StringRepr::OneByte(units.into_iter().map(|c| c as u8).collect()),
            }
        } else {
            Self {
                repr: StringRepr::TwoByte(units),
            }
        }
    }

    pub(crate) fn from_one_byte(bytes: Vec<u8>) -> Self {
        debug_assert!(bytes.iter().all(|&b| is_one_byte_unit(b as u16)));
        Self {
            repr: StringRepr::OneByte(bytes),
        }
    }

    pub(crate) fn from_two_byte(units: Vec<u16>) -> Self {
        Self {
            repr: StringRepr::TwoByte(units),
        }
    }

    pub fn empty() -> Self {
        Self {
            repr: StringRepr::OneByte(Vec::new()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        match &self.repr {
            StringRepr::OneByte(b) => b.len(),
            StringRepr::TwoByte(u) => u.len(),
        }
    }

    pub fn is_one_byte(&self) -> bool {
        matches!(self.repr, StringRepr::OneByte(_))
    }

    pub fn code_unit(&self, index: usize) -> Option<u16> {
        match &self.repr {
            StringRepr::OneByte(b) => b.get(index).map(|&c| c as u16),
            StringRepr::TwoByte(u) => u.get(index).copied(),
        }
    }

    pub fn code_units(&self) -> Vec<u16> {
        match &self.repr {
            StringRepr::OneByte(b) => b.iter().map(|&c| c as u16).collect(),
            StringRepr::TwoByte(u) => u.clone(),
        }
    }

    /// Append into a one-byte buffer. Only valid for one-byte strings.
    pub(crate) fn write_one_byte(&self, out: &mut Vec<u8>) {
        match &self.repr {
            StringRepr::OneByte(b) => out.extend_from_slice(b),
            StringRepr::TwoByte(_) => unreachable!("two-byte string written into one-byte output"),
        }
    }

    pub(crate) fn write_two_byte(&self, out: &mut Vec<u16>) {
        match &self.repr {
            StringRepr::OneByte(b) => out.extend(b.iter().map(|&c| c as u16)),
            StringRepr::TwoByte(u) => out.extend_from_slice(u),
        }
    }

    pub fn to_rust_string(&self) -> String {
        match &self.repr {
            StringRepr::OneByte(b) => b.iter().map(|&c| c as char).collect(),
            StringRepr::TwoByte(u) => String::from_utf16_lossy(u),
        }
    }
}

impl fmt::Display for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rust_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JsBigInt {
    pub value: num_bigint::BigInt,
}

impl From<i64> for JsBigInt {
    fn from(n: i64) -> Self {
        Self {
            value: num_bigint::BigInt::from(n),
        }
    }
}

impl From<u64> for JsBigInt {
    fn from(n: u64) -> Self {
        Self {
            value: num_bigint::BigInt::from(n),
        }
    }
}

/// A decoded element. Small integers and doubles are kept apart the way a
/// tagged VM value would be; Uint32 elements above `i32::MAX` are doubles.
#[derive(Clone, Debug, PartialEq)]
pub enum Numeric {
    Int(i32),
    Double(f64),
    BigInt(JsBigInt),
}

impl Numeric {
    pub fn is_bigint(&self) -> bool {
        matches!(self, Numeric::BigInt(_))
    }

    /// Numeric value as a double. `None` for BigInts.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Numeric::Int(i) => Some(*i as f64),
            Numeric::Double(d) => Some(*d),
            Numeric::BigInt(_) => None,
        }
    }

    pub fn into_value(self) -> JsValue {
        match self {
            Numeric::Int(i) => JsValue::Number(i as f64),
            Numeric::Double(d) => JsValue::Number(d),
            Numeric::BigInt(b) => JsValue::BigInt(b),
        }
    }

    pub fn to_js_string(&self) -> JsString {
        match self {
            Numeric::Int(i) => JsString::from_str(&i.to_string()),
            Numeric::Double(d) => JsString::from_str(&number_ops::to_string(*d)),
            Numeric::BigInt(b) => JsString::from_str(&b.value.to_string()),
        }
    }
}

// §6.1.6.1 Number type operations
pub mod number_ops {
    pub fn same_value_zero(x: f64, y: f64) -> bool {
        if x.is_nan() && y.is_nan() {
            return true;
        }
        x == y
    }

    pub fn to_string(x: f64) -> String {
        if x.is_nan() {
            return "NaN".to_string();
        }
        if x == 0.0 {
            return "0".to_string();
        }
        if x.is_infinite() {
            return if x > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
        }
        // ryu-js gives the shortest round-trip form
        let mut buf = ryu_js::Buffer::new();
        buf.format(x).to_string()
    }

    // §7.1.5 ToIntegerOrInfinity
    pub fn to_integer_or_infinity(x: f64) -> f64 {
        if x.is_nan() || x == 0.0 {
            return 0.0;
        }
        if x.is_infinite() {
            return x;
        }
        x.trunc()
    }

    // §7.1.20 ToLength
    pub fn to_length(x: f64) -> u64 {
        let len = to_integer_or_infinity(x);
        if len <= 0.0 {
            0
        } else {
            len.min(9007199254740991.0) as u64
        }
    }

    fn is_js_whitespace(c: char) -> bool {
        matches!(
            c,
            '\u{9}' | '\u{A}' | '\u{B}' | '\u{C}' | '\u{D}' | ' ' | '\u{A0}' | '\u{1680}'
                | '\u{2000}'..='\u{200A}'
                | '\u{2028}' | '\u{2029}' | '\u{202F}' | '\u{205F}' | '\u{3000}' | '\u{FEFF}'
        )
    }

    pub(crate) fn trim_js(s: &str) -> &str {
        s.trim_matches(is_js_whitespace)
    }

    // §7.1.4.1.1 StringToNumber
    pub fn string_to_number(s: &str) -> f64 {
        let s = trim_js(s);
        if s.is_empty() {
            return 0.0;
        }
        match s {
            "Infinity" | "+Infinity" => return f64::INFINITY,
            "-Infinity" => return f64::NEG_INFINITY,
            _ => {}
        }
        let radix = match s.get(..2) {
            Some("0x") | Some("0X") => Some(16),
            Some("0o") | Some("0O") => Some(8),
            Some("0b") | Some("0B") => Some(2),
            _ => None,
        };
        if let Some(radix) = radix {
            let digits = &s[2..];
            if digits.is_empty() {
                return f64::NAN;
            }
            let mut acc = 0.0f64;
            for c in digits.chars() {
                match c.to_digit(radix) {
                    Some(d) => acc = acc * radix as f64 + d as f64,
                    None => return f64::NAN,
                }
            }
            return acc;
        }
        // Rust's float parser also accepts "inf" and "nan"; JS does not.
        let valid = s
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
        if !valid {
            return f64::NAN;
        }
        s.parse::<f64>().unwrap_or(f64::NAN)
    }
}

// §6.1.6.2 BigInt type operations
pub mod bigint_ops {
    use num_bigint::{BigInt, Sign};

    /// BigInt.asIntN(64): the low 64 bits as a signed pattern, and whether
    /// the conversion kept the exact value.
    pub fn to_int64(x: &BigInt) -> (i64, bool) {
        if let Ok(v) = i64::try_from(x) {
            return (v, true);
        }
        (low_u64(x) as i64, false)
    }

    /// BigInt.asUintN(64)
    pub fn to_uint64(x: &BigInt) -> (u64, bool) {
        if let Ok(v) = u64::try_from(x) {
            return (v, true);
        }
        (low_u64(x), false)
    }

    fn low_u64(x: &BigInt) -> u64 {
        let bytes = x.to_signed_bytes_le();
        let fill = if x.sign() == Sign::Minus { 0xFF } else { 0x00 };
        let mut raw = [fill; 8];
        let n = bytes.len().min(8);
        raw[..n].copy_from_slice(&bytes[..n]);
        u64::from_le_bytes(raw)
    }

    // §7.1.14 StringToBigInt
    pub fn string_to_bigint(s: &str) -> Option<BigInt> {
        let s = super::number_ops::trim_js(s);
        if s.is_empty() {
            return Some(BigInt::from(0));
        }
        let (radix, digits) = match s.get(..2) {
            Some("0x") | Some("0X") => (16, &s[2..]),
            Some("0o") | Some("0O") => (8, &s[2..]),
            Some("0b") | Some("0B") => (2, &s[2..]),
            _ => (10, s),
        };
        // Only radix 10 takes a sign. parse_bytes would also skip '_'.
        let body = if radix == 10 {
            digits.strip_prefix(['+', '-']).unwrap_or(digits)
        } else {
            digits
        };
        if body.is_empty() || !body.chars().all(|c| c.is_digit(radix)) {
            return None;
        }
        BigInt::parse_bytes(digits.as_bytes(), radix)
    }
}

impl fmt::Display for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsValue::Undefined => write!(f, "undefined"),
            JsValue::Null => write!(f, "null"),
            JsValue::Boolean(b) => write!(f, "{b}"),
            JsValue::Number(n) => write!(f, "{}", number_ops::to_string(*n)),
            JsValue::String(s) => write!(f, "{s}"),
            JsValue::BigInt(b) => write!(f, "{}n", b.value),
        }
    }
}
