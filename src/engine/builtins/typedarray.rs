// §23.2.3 Properties of the %TypedArray% Prototype Object

use super::relative_index;
use crate::engine::Engine;
use crate::engine::codec;
use crate::engine::species::ConstructArgs;
use crate::engine::store::{ByteStore, ScopeMode};
use crate::engine::view::{NATIVE_LITTLE_ENDIAN, TypedView};
use crate::error::{Error, Result};
use crate::types::{JsString, JsValue, Numeric, number_ops};
use std::cmp::Ordering;

/// A source of elements for `set` and `view_from` that is not a typed view.
/// Both calls may run arbitrary code.
pub trait ArrayLike {
    fn length(&self) -> Result<JsValue>;
    fn get(&self, index: usize) -> Result<JsValue>;
}

impl ArrayLike for Vec<JsValue> {
    fn length(&self) -> Result<JsValue> {
        Ok(JsValue::Number(self.len() as f64))
    }

    fn get(&self, index: usize) -> Result<JsValue> {
        Ok(self.as_slice().get(index).cloned().unwrap_or(JsValue::Undefined))
    }
}

pub enum SetSource<'a> {
    View(&'a TypedView),
    ArrayLike(&'a dyn ArrayLike),
}

/// Three-way comparison callback for `sort`. Negative, zero and positive
/// results order the pair; NaN counts as zero.
pub type Comparator<'a> = &'a mut dyn FnMut(&JsValue, &JsValue) -> Result<f64>;

/// Per-element mapping callback for `view_from`.
pub type Mapper<'a> = &'a mut dyn FnMut(&JsValue, usize) -> Result<JsValue>;

#[derive(Clone, Copy)]
enum Separator<'a> {
    Empty,
    Unit(u8),
    Multi(&'a JsString),
}

fn compare_numbers(x: f64, y: f64) -> Ordering {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => {
            if x < y {
                Ordering::Less
            } else if x > y {
                Ordering::Greater
            } else {
                // -0 sorts before +0
                match (x.is_sign_negative(), y.is_sign_negative()) {
                    (true, false) => Ordering::Less,
                    (false, true) => Ordering::Greater,
                    _ => Ordering::Equal,
                }
            }
        }
    }
}

/// Natural element order used by `sort` without a comparator.
pub fn default_compare(a: &Numeric, b: &Numeric) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => compare_numbers(x, y),
        _ => match (a, b) {
            (Numeric::BigInt(x), Numeric::BigInt(y)) => x.value.cmp(&y.value),
            _ => unreachable!("mixed content types in one view"),
        },
    }
}

fn strict_equals(element: &Numeric, search: &JsValue) -> bool {
    match (element, search) {
        (Numeric::BigInt(x), JsValue::BigInt(y)) => x == y,
        (Numeric::Int(_) | Numeric::Double(_), JsValue::Number(y)) => element.as_f64() == Some(*y),
        _ => false,
    }
}

fn same_value_zero(element: &Numeric, search: &JsValue) -> bool {
    match (element, search) {
        (Numeric::BigInt(x), JsValue::BigInt(y)) => x == y,
        (_, JsValue::Number(y)) => element
            .as_f64()
            .is_some_and(|x| number_ops::same_value_zero(x, *y)),
        _ => false,
    }
}

/// Stable binary insertion sort over decoded elements.
fn insertion_sort(values: &mut [Numeric]) {
    for i in 1..values.len() {
        let pos = values[..i].partition_point(|probe| default_compare(probe, &values[i]) != Ordering::Greater);
        values[pos..=i].rotate_right(1);
    }
}

impl Engine {
    /// Encode `values` into the view, starting at element 0.
    fn write_all(&self, view: &TypedView, values: &[Numeric]) -> Result<()> {
        let size = view.element_size();
        let mut bytes = vec![0u8; values.len() * size];
        for (value, slot) in values.iter().zip(bytes.chunks_exact_mut(size)) {
            codec::encode(value, view.kind(), NATIVE_LITTLE_ENDIAN, slot);
        }
        view.buffer().write_bytes(view.byte_offset(), &bytes)
    }

    /// Store a value decoded from another view. Conversions between kinds of
    /// one content type follow the modular rules and never fail.
    fn write_converted(&self, view: &TypedView, index: usize, value: &Numeric) -> Result<()> {
        let mut encoded = [0u8; 8];
        codec::encode(value, view.kind(), NATIVE_LITTLE_ENDIAN, &mut encoded);
        view.write_raw_element(index, &encoded[..view.element_size()])
    }

    // Fresh same-type view holding a copy of `view`'s bytes.
    fn copy_into_fresh(&self, view: &TypedView) -> Result<TypedView> {
        let result = self.create_same_type(view, view.length())?;
        let bytes = {
            let _scope = view.buffer().enter_scope(ScopeMode::Read)?;
            view.buffer().read_bytes(view.byte_offset(), view.byte_length())?
        };
        result.buffer().write_bytes(result.byte_offset(), &bytes)?;
        Ok(result)
    }

    /// `%TypedArray%.from` over a typed view or array-like. With a mapper,
    /// every source element goes through it before being stored.
    pub fn view_from(
        &self,
        kind: codec::ElementKind,
        source: SetSource<'_>,
        mapper: Option<Mapper<'_>>,
    ) -> Result<TypedView> {
        match (source, mapper) {
            (SetSource::View(src), None) => {
                if src.is_detached() {
                    return Err(Error::detached());
                }
                if src.content_type() != kind.content_type() {
                    return Err(Error::type_error(format!(
                        "cannot build a {} from a {}",
                        kind.name(),
                        src.kind().name()
                    )));
                }
                let view = self.create_view(kind, src.length() as u64)?;
                self.set_from_view(&view, src, 0)?;
                Ok(view)
            }
            (SetSource::View(src), Some(map)) => {
                if src.is_detached() {
                    return Err(Error::detached());
                }
                let len = src.length();
                let view = self.create_view(kind, len as u64)?;
                for k in 0..len {
                    let value = self.element_value(src, k)?;
                    let mapped = map(&value, k)?;
                    self.store_element(&view, k, &mapped)?;
                }
                Ok(view)
            }
            (SetSource::ArrayLike(src), mut map) => {
                let len = number_ops::to_length(self.to_number_value(&src.length()?)?);
                let view = self.create_view(kind, len)?;
                for k in 0..len as usize {
                    let mut value = src.get(k)?;
                    if let Some(map) = map.as_mut() {
                        value = map(&value, k)?;
                    }
                    self.store_element(&view, k, &value)?;
                }
                Ok(view)
            }
        }
    }

    /// `%TypedArray%.prototype.slice`
    pub fn slice(&self, view: &TypedView, start: f64, end: Option<f64>) -> Result<TypedView> {
        if view.is_detached() {
            return Err(Error::detached());
        }
        let len = view.length();
        let k = relative_index(start, len);
        let fin = end.map_or(len, |e| relative_index(e, len));
        let count = fin.saturating_sub(k);

        let result = self.species_create(view, ConstructArgs::Length(count))?;
        if ByteStore::same_store(result.buffer(), view.buffer()) {
            return Err(Error::type_error(
                "species constructor returned a view over the receiver's buffer",
            ));
        }
        if count == 0 {
            return Ok(result);
        }
        // The species constructor may have detached the source.
        if view.is_detached() {
            return Err(Error::detached());
        }

        {
            let _src = view.buffer().enter_scope(ScopeMode::Read)?;
            let _dst = result.buffer().enter_scope(ScopeMode::Write)?;
            if result.kind() == view.kind() {
                let size = view.element_size();
                ByteStore::copy_bytes(
                    result.buffer(),
                    result.byte_offset(),
                    view.buffer(),
                    view.resolve_pointer(k * size),
                    count * size,
                )?;
            } else {
                for n in 0..count {
                    let value = view.read_element(k + n)?;
                    self.write_converted(&result, n, &value)?;
                }
            }
        }
        Ok(result)
    }

    /// `%TypedArray%.prototype.subarray`: a new view over the same store.
    pub fn subarray(&self, view: &TypedView, begin: f64, end: Option<f64>) -> Result<TypedView> {
        let len = view.array_length();
        let b = relative_index(begin, len);
        let fin = end.map_or(len, |e| relative_index(e, len));
        let count = fin.saturating_sub(b);
        let args = ConstructArgs::Buffer {
            store: view.buffer().clone(),
            byte_offset: view.byte_offset() + b * view.element_size(),
            length: Some(count),
        };
        self.species_create(view, args)
    }

    /// `%TypedArray%.prototype.set`
    pub fn set(&self, target: &TypedView, source: SetSource<'_>, target_offset: f64) -> Result<()> {
        let offset = number_ops::to_integer_or_infinity(target_offset);
        if offset < 0.0 || offset.is_infinite() {
            return Err(Error::range_error("offset is out of bounds"));
        }
        let offset = offset as u64;
        match source {
            SetSource::View(src) => {
                if target.is_detached() || src.is_detached() {
                    return Err(Error::detached());
                }
                if target.content_type() != src.content_type() {
                    return Err(Error::type_error("cannot mix BigInt and other types"));
                }
                if offset.saturating_add(src.length() as u64) > target.length() as u64 {
                    return Err(Error::range_error("offset is out of bounds"));
                }
                self.set_from_view(target, src, offset as usize)
            }
            SetSource::ArrayLike(src) => self.set_from_array_like(target, src, offset),
        }
    }

    fn set_from_view(&self, target: &TypedView, source: &TypedView, offset: usize) -> Result<()> {
        let same = ByteStore::same_store(target.buffer(), source.buffer());
        let _dst = target.buffer().enter_scope(ScopeMode::Write)?;
        let _src = if same {
            None
        } else {
            Some(source.buffer().enter_scope(ScopeMode::Read)?)
        };

        let size = target.element_size();
        let src_len = source.length();
        let dst_byte = target.resolve_pointer(offset * size);

        if target.kind() != source.kind() {
            if same {
                // Writes would clobber source elements not yet read.
                let values = source.snapshot()?;
                for (i, value) in values.iter().enumerate() {
                    self.write_converted(target, offset + i, value)?;
                }
            } else {
                for i in 0..src_len {
                    let value = source.read_element(i)?;
                    self.write_converted(target, offset + i, &value)?;
                }
            }
            return Ok(());
        }

        let byte_count = src_len * size;
        if !same {
            return ByteStore::copy_bytes(
                target.buffer(),
                dst_byte,
                source.buffer(),
                source.byte_offset(),
                byte_count,
            );
        }
        let src_byte = source.byte_offset();
        if src_byte == dst_byte {
            for at in (dst_byte..dst_byte + byte_count).step_by(size) {
                target.buffer().copy_within(at, at, size)?;
            }
            return Ok(());
        }
        target.buffer().copy_within(src_byte, dst_byte, byte_count)
    }

    fn set_from_array_like(&self, target: &TypedView, source: &dyn ArrayLike, offset: u64) -> Result<()> {
        if target.is_detached() {
            return Err(Error::detached());
        }
        let src_len = number_ops::to_length(self.to_number_value(&source.length()?)?);
        if offset.saturating_add(src_len) > target.length() as u64 {
            return Err(Error::range_error("offset is out of bounds"));
        }
        let offset = offset as usize;
        for k in 0..src_len as usize {
            let value = source.get(k)?;
            // The getter may have detached the target.
            if target.is_detached() {
                return Err(Error::detached());
            }
            let numeric = self.coerce_for_kind(target.kind(), &value)?;
            let _scope = target.buffer().enter_scope(ScopeMode::Write)?;
            self.write_numeric(target, offset + k, &numeric)?;
        }
        Ok(())
    }

    /// `%TypedArray%.prototype.sort`
    pub fn sort(&self, view: &TypedView, comparator: Option<Comparator<'_>>) -> Result<()> {
        if view.is_detached() {
            return Err(Error::detached());
        }
        match comparator {
            None => {
                let _scope = view.buffer().enter_scope(ScopeMode::Write)?;
                let mut values = view.snapshot()?;
                insertion_sort(&mut values);
                self.write_all(view, &values)
            }
            Some(cmp) => self.sort_with(view, cmp),
        }
    }

    // Elements are re-read by index around every comparator call; the
    // comparator may rewrite or detach the view. Once detached there is
    // nothing left to order and the sort stops.
    fn sort_with(&self, view: &TypedView, cmp: Comparator<'_>) -> Result<()> {
        let len = view.length();
        for i in 1..len {
            let present = self.element_value(view, i)?;
            let (mut lo, mut hi) = (0, i);
            while lo < hi {
                let mid = lo + (hi - lo) / 2;
                let probe = self.element_value(view, mid)?;
                let order = cmp(&probe, &present)?;
                if order > 0.0 {
                    hi = mid;
                } else {
                    lo = mid + 1;
                }
            }
            if view.is_detached() {
                return Ok(());
            }
            if lo == i {
                continue;
            }
            for j in (lo + 1..=i).rev() {
                let prev = self.element_value(view, j - 1)?;
                self.store_element(view, j, &prev)?;
            }
            self.store_element(view, lo, &present)?;
        }
        Ok(())
    }

    /// `%TypedArray%.prototype.join`
    pub fn join(&self, view: &TypedView, separator: Option<&JsString>) -> Result<JsString> {
        if view.is_detached() {
            return Err(Error::detached());
        }
        let comma = JsString::from_str(",");
        let sep = separator.unwrap_or(&comma);
        let len = view.length();
        if len == 0 {
            return Ok(JsString::empty());
        }

        let parts: Vec<JsString> = {
            let _scope = view.buffer().enter_scope(ScopeMode::Read)?;
            view.snapshot()?.iter().map(Numeric::to_js_string).collect()
        };

        let gap = if sep.is_empty() {
            Separator::Empty
        } else if sep.len() == 1 && sep.is_one_byte() {
            Separator::Unit(sep.code_unit(0).unwrap_or(b',' as u16) as u8)
        } else {
            Separator::Multi(sep)
        };

        let mut total: u64 = parts.iter().map(|p| p.len() as u64).sum();
        if len > 1 {
            total += sep.len() as u64 * (len as u64 - 1);
        }
        if total > self.config().max_string_length as u64 {
            return Err(Error::range_error("invalid string length"));
        }

        // One width for the whole result, decided before allocating.
        let one_byte = parts.iter().all(JsString::is_one_byte) && (len == 1 || sep.is_one_byte());
        if one_byte {
            let mut out = Vec::with_capacity(total as usize);
            for (k, part) in parts.iter().enumerate() {
                if k > 0 {
                    match gap {
                        Separator::Empty => {}
                        Separator::Unit(c) => out.push(c),
                        Separator::Multi(s) => s.write_one_byte(&mut out),
                    }
                }
                part.write_one_byte(&mut out);
            }
            Ok(JsString::from_one_byte(out))
        } else {
            let mut out = Vec::with_capacity(total as usize);
            for (k, part) in parts.iter().enumerate() {
                if k > 0 {
                    match gap {
                        Separator::Empty => {}
                        Separator::Unit(c) => out.push(c as u16),
                        Separator::Multi(s) => s.write_two_byte(&mut out),
                    }
                }
                part.write_two_byte(&mut out);
            }
            Ok(JsString::from_two_byte(out))
        }
    }

    /// `%TypedArray%.prototype.toString`
    pub fn to_string(&self, view: &TypedView) -> Result<JsString> {
        self.join(view, None)
    }

    /// `%TypedArray%.prototype.fill`
    pub fn fill(&self, view: &TypedView, value: &JsValue, start: f64, end: Option<f64>) -> Result<()> {
        if view.is_detached() {
            return Err(Error::detached());
        }
        let numeric = self.coerce_for_kind(view.kind(), value)?;
        let len = view.length();
        let k = relative_index(start, len);
        let fin = end.map_or(len, |e| relative_index(e, len));
        if view.is_detached() {
            return Err(Error::detached());
        }
        if k >= fin {
            return Ok(());
        }

        let kind = view.kind();
        let mut probe = [0u8; 8];
        self.check_lossless(codec::encode(&numeric, kind, NATIVE_LITTLE_ENDIAN, &mut probe), kind)?;

        let size = view.element_size();
        let from = view.resolve_pointer(k * size);
        let to = view.resolve_pointer(fin * size);
        let _scope = view.buffer().enter_scope(ScopeMode::Write)?;
        view.buffer().with_bytes_mut(|bytes| {
            codec::encode_fill(&numeric, kind, NATIVE_LITTLE_ENDIAN, &mut bytes[from..to]);
        })
    }

    /// `%TypedArray%.prototype.copyWithin`
    pub fn copy_within(&self, view: &TypedView, target: f64, start: f64, end: Option<f64>) -> Result<()> {
        if view.is_detached() {
            return Err(Error::detached());
        }
        let len = view.length();
        let to = relative_index(target, len);
        let from = relative_index(start, len);
        let fin = end.map_or(len, |e| relative_index(e, len));
        let count = fin.saturating_sub(from).min(len - to);
        if count == 0 {
            return Ok(());
        }
        let size = view.element_size();
        let _scope = view.buffer().enter_scope(ScopeMode::Write)?;
        view.buffer()
            .copy_within(view.resolve_pointer(from * size), view.resolve_pointer(to * size), count * size)
    }

    /// `%TypedArray%.prototype.reverse`
    pub fn reverse(&self, view: &TypedView) -> Result<()> {
        if view.is_detached() {
            return Err(Error::detached());
        }
        let size = view.element_size();
        let start = view.byte_offset();
        let end = start + view.byte_length();
        let _scope = view.buffer().enter_scope(ScopeMode::Write)?;
        view.buffer().with_bytes_mut(|bytes| {
            let region = &mut bytes[start..end];
            let n = region.len() / size;
            for i in 0..n / 2 {
                let j = n - 1 - i;
                for b in 0..size {
                    region.swap(i * size + b, j * size + b);
                }
            }
        })
    }

    /// `%TypedArray%.prototype.at`: `None` when the index falls outside.
    pub fn at(&self, view: &TypedView, index: f64) -> Result<Option<Numeric>> {
        if view.is_detached() {
            return Err(Error::detached());
        }
        let len = view.length() as f64;
        let rel = number_ops::to_integer_or_infinity(index);
        let k = if rel >= 0.0 { rel } else { len + rel };
        if k < 0.0 || k >= len {
            return Ok(None);
        }
        let _scope = view.buffer().enter_scope(ScopeMode::Read)?;
        Ok(Some(view.read_element(k as usize)?))
    }

    fn search_start(len: usize, from: Option<f64>) -> Option<usize> {
        let n = from.map_or(0.0, number_ops::to_integer_or_infinity);
        if n >= len as f64 {
            return None;
        }
        if n >= 0.0 {
            Some(n as usize)
        } else {
            Some((len as f64 + n).max(0.0) as usize)
        }
    }

    fn read_all(&self, view: &TypedView) -> Result<Vec<Numeric>> {
        let _scope = view.buffer().enter_scope(ScopeMode::Read)?;
        view.snapshot()
    }

    /// `%TypedArray%.prototype.indexOf`
    pub fn index_of(&self, view: &TypedView, search: &JsValue, from: Option<f64>) -> Result<Option<usize>> {
        if view.is_detached() {
            return Err(Error::detached());
        }
        let Some(k) = Self::search_start(view.length(), from) else {
            return Ok(None);
        };
        let values = self.read_all(view)?;
        Ok(values[k..].iter().position(|v| strict_equals(v, search)).map(|p| p + k))
    }

    /// `%TypedArray%.prototype.lastIndexOf`
    pub fn last_index_of(&self, view: &TypedView, search: &JsValue, from: Option<f64>) -> Result<Option<usize>> {
        if view.is_detached() {
            return Err(Error::detached());
        }
        let len = view.length();
        if len == 0 {
            return Ok(None);
        }
        let n = from.map_or(len as f64 - 1.0, number_ops::to_integer_or_infinity);
        let k = if n >= 0.0 { n.min(len as f64 - 1.0) } else { len as f64 + n };
        if k < 0.0 {
            return Ok(None);
        }
        let values = self.read_all(view)?;
        Ok(values[..=k as usize].iter().rposition(|v| strict_equals(v, search)))
    }

    /// `%TypedArray%.prototype.includes`
    pub fn includes(&self, view: &TypedView, search: &JsValue, from: Option<f64>) -> Result<bool> {
        if view.is_detached() {
            return Err(Error::detached());
        }
        let Some(k) = Self::search_start(view.length(), from) else {
            return Ok(false);
        };
        let values = self.read_all(view)?;
        Ok(values[k..].iter().any(|v| same_value_zero(v, search)))
    }

    /// `%TypedArray%.prototype.toReversed`
    pub fn to_reversed(&self, view: &TypedView) -> Result<TypedView> {
        if view.is_detached() {
            return Err(Error::detached());
        }
        let result = self.create_same_type(view, view.length())?;
        let mut values = self.read_all(view)?;
        values.reverse();
        self.write_all(&result, &values)?;
        Ok(result)
    }

    /// `%TypedArray%.prototype.toSorted`
    pub fn to_sorted(&self, view: &TypedView, comparator: Option<Comparator<'_>>) -> Result<TypedView> {
        if view.is_detached() {
            return Err(Error::detached());
        }
        let result = self.copy_into_fresh(view)?;
        self.sort(&result, comparator)?;
        Ok(result)
    }

    /// `%TypedArray%.prototype.with`
    pub fn with(&self, view: &TypedView, index: f64, value: &JsValue) -> Result<TypedView> {
        if view.is_detached() {
            return Err(Error::detached());
        }
        let len = view.length() as f64;
        let rel = number_ops::to_integer_or_infinity(index);
        let actual = if rel >= 0.0 { rel } else { len + rel };
        let numeric = self.coerce_for_kind(view.kind(), value)?;
        if view.is_detached() || actual < 0.0 || actual >= len {
            return Err(Error::range_error("invalid typed array index"));
        }
        let result = self.copy_into_fresh(view)?;
        self.write_numeric(&result, actual as usize, &numeric)?;
        Ok(result)
    }
}
