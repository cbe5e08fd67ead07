use super::Engine;
use super::codec::{self, ContentType, ElementKind};
use super::species::ViewConstructor;
use super::store::{ByteStore, ScopeMode};
use crate::error::{Error, Result};
use crate::types::{JsValue, Numeric};
use std::fmt;
use std::sync::Arc;

/// Element accesses through a view use the platform byte order.
pub(crate) const NATIVE_LITTLE_ENDIAN: bool = cfg!(target_endian = "little");

#[derive(Clone)]
pub struct TypedView {
    kind: ElementKind,
    byte_offset: u32,
    length: u32,
    store: ByteStore,
    species: Option<Arc<dyn ViewConstructor>>,
}

impl fmt::Debug for TypedView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedView")
            .field("kind", &self.kind)
            .field("byte_offset", &self.byte_offset)
            .field("length", &self.length)
            .field("store", &self.store)
            .field("species", &self.species.is_some())
            .finish()
    }
}

impl TypedView {
    fn new(kind: ElementKind, store: ByteStore, byte_offset: u32, length: u32) -> Self {
        Self {
            kind,
            byte_offset,
            length,
            store,
            species: None,
        }
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn content_type(&self) -> ContentType {
        self.kind.content_type()
    }

    pub fn byte_offset(&self) -> usize {
        self.byte_offset as usize
    }

    /// Declared element count.
    pub fn length(&self) -> usize {
        self.length as usize
    }

    /// Element count as observed right now: 0 once the store is detached.
    pub fn array_length(&self) -> usize {
        if self.is_detached() { 0 } else { self.length() }
    }

    pub fn element_size(&self) -> usize {
        self.kind.bytes_per_element()
    }

    pub fn byte_length(&self) -> usize {
        self.length() * self.element_size()
    }

    /// Byte offset into the store of a byte index within this view. The
    /// caller has already checked the store is attached.
    pub fn resolve_pointer(&self, byte_index: usize) -> usize {
        self.byte_offset() + byte_index
    }

    pub fn is_detached(&self) -> bool {
        self.store.is_detached()
    }

    pub fn buffer(&self) -> &ByteStore {
        &self.store
    }

    pub fn species(&self) -> Option<&Arc<dyn ViewConstructor>> {
        self.species.as_ref()
    }

    /// Attach a species constructor used by operations that derive new views.
    pub fn with_species(mut self, ctor: Arc<dyn ViewConstructor>) -> Self {
        self.species = Some(ctor);
        self
    }

    /// Decode element `index`. Bounds are the caller's business.
    pub(crate) fn read_element(&self, index: usize) -> Result<Numeric> {
        let size = self.element_size();
        let start = self.resolve_pointer(index * size);
        self.store
            .with_bytes(|bytes| codec::decode(&bytes[start..start + size], self.kind, NATIVE_LITTLE_ENDIAN))
    }

    /// Store pre-encoded element bytes at `index`.
    pub(crate) fn write_raw_element(&self, index: usize, encoded: &[u8]) -> Result<()> {
        let start = self.resolve_pointer(index * self.element_size());
        self.store.write_bytes(start, encoded)
    }

    /// Decode every element in one pass.
    pub(crate) fn snapshot(&self) -> Result<Vec<Numeric>> {
        let size = self.element_size();
        let start = self.byte_offset();
        let end = start + self.byte_length();
        self.store.with_bytes(|bytes| {
            bytes[start..end]
                .chunks_exact(size)
                .map(|chunk| codec::decode(chunk, self.kind, NATIVE_LITTLE_ENDIAN))
                .collect()
        })
    }
}

impl Engine {
    /// View of `length` zeroed elements over a fresh store.
    pub fn create_view(&self, kind: ElementKind, length: u64) -> Result<TypedView> {
        let byte_length = length
            .checked_mul(kind.bytes_per_element() as u64)
            .filter(|&n| n <= self.config().max_byte_length)
            .ok_or_else(|| Error::range_error(format!("invalid typed array length {length}")))?;
        let store = self.allocate_for_view(byte_length)?;
        Ok(TypedView::new(kind, store, 0, length as u32))
    }

    /// View over an existing store. With `length` omitted, the view covers
    /// the rest of the store, which must then end on an element boundary.
    pub fn view_over(
        &self,
        store: &ByteStore,
        kind: ElementKind,
        byte_offset: u64,
        length: Option<u64>,
    ) -> Result<TypedView> {
        let size = kind.bytes_per_element() as u64;
        if byte_offset % size != 0 {
            return Err(Error::range_error(format!(
                "start offset of {} should be a multiple of {}",
                kind.name(),
                size
            )));
        }
        if store.is_detached() {
            return Err(Error::detached());
        }
        let buffer_length = store.byte_length() as u64;
        let byte_length = match length {
            None => {
                if buffer_length % size != 0 {
                    return Err(Error::range_error(format!(
                        "byte length of {} should be a multiple of {}",
                        kind.name(),
                        size
                    )));
                }
                if byte_offset > buffer_length {
                    return Err(Error::range_error(format!(
                        "start offset {byte_offset} is outside the bounds of the buffer"
                    )));
                }
                buffer_length - byte_offset
            }
            Some(len) => {
                let byte_length = len.checked_mul(size);
                match byte_length.and_then(|b| b.checked_add(byte_offset)) {
                    Some(end) if end <= buffer_length => len * size,
                    _ => {
                        return Err(Error::range_error(format!(
                            "invalid typed array length: {len}"
                        )));
                    }
                }
            }
        };
        Ok(TypedView::new(
            kind,
            store.clone(),
            byte_offset as u32,
            (byte_length / size) as u32,
        ))
    }

    /// `%TypedArray%.of`
    pub fn view_of(&self, kind: ElementKind, values: &[JsValue]) -> Result<TypedView> {
        let view = self.create_view(kind, values.len() as u64)?;
        for (k, value) in values.iter().enumerate() {
            self.set_index(&view, k, value)?;
        }
        Ok(view)
    }

    /// Checked element read.
    pub fn get(&self, view: &TypedView, index: usize) -> Result<Numeric> {
        if view.is_detached() {
            return Err(Error::detached());
        }
        if index >= view.length() {
            return Err(Error::range_error(format!("index {index} is out of bounds")));
        }
        let _scope = view.buffer().enter_scope(ScopeMode::Read)?;
        view.read_element(index)
    }

    /// Checked element write. The value is coerced before the bounds check.
    pub fn set_index(&self, view: &TypedView, index: usize, value: &JsValue) -> Result<()> {
        let numeric = self.coerce_for_kind(view.kind(), value)?;
        if view.is_detached() {
            return Err(Error::detached());
        }
        if index >= view.length() {
            return Err(Error::range_error(format!("index {index} is out of bounds")));
        }
        let _scope = view.buffer().enter_scope(ScopeMode::Write)?;
        self.write_numeric(view, index, &numeric)
    }

    /// Element value for callback-driven loops: `undefined` once detached or
    /// out of range.
    pub(crate) fn element_value(&self, view: &TypedView, index: usize) -> Result<JsValue> {
        if index >= view.array_length() {
            return Ok(JsValue::Undefined);
        }
        let _scope = view.buffer().enter_scope(ScopeMode::Read)?;
        Ok(view.read_element(index)?.into_value())
    }

    /// Integer-indexed element set: coerce, then write only if the index is
    /// still valid. Writes to a detached view are dropped.
    pub(crate) fn store_element(&self, view: &TypedView, index: usize, value: &JsValue) -> Result<()> {
        let numeric = self.coerce_for_kind(view.kind(), value)?;
        if index >= view.array_length() {
            return Ok(());
        }
        let _scope = view.buffer().enter_scope(ScopeMode::Write)?;
        self.write_numeric(view, index, &numeric)
    }

    /// Encode and store one already-coerced value, honoring `strict_bigint`.
    pub(crate) fn write_numeric(&self, view: &TypedView, index: usize, value: &Numeric) -> Result<()> {
        let mut encoded = [0u8; 8];
        let size = view.element_size();
        let lossless = codec::encode(value, view.kind(), NATIVE_LITTLE_ENDIAN, &mut encoded);
        self.check_lossless(lossless, view.kind())?;
        view.write_raw_element(index, &encoded[..size])
    }

    /// RangeError for a wrapped BigInt when `strict_bigint` is set.
    pub fn check_lossless(&self, lossless: bool, kind: ElementKind) -> Result<()> {
        if !lossless && self.config().strict_bigint {
            return Err(Error::range_error(format!(
                "value does not fit in a {} element",
                kind.name()
            )));
        }
        Ok(())
    }

    /// Copy the view's bytes into a fresh native store and return a view
    /// over the copy.
    pub fn promote_view(&self, view: &TypedView) -> Result<TypedView> {
        if view.is_detached() {
            return Err(Error::detached());
        }
        let store = self.promote_store(view.buffer())?;
        let mut promoted = TypedView::new(
            view.kind(),
            store,
            view.byte_offset,
            view.length,
        );
        promoted.species = view.species.clone();
        Ok(promoted)
    }
}
