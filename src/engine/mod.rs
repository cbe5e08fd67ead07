pub mod builtins;
pub mod codec;
pub mod species;
pub mod store;
pub mod view;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::types::{JsBigInt, JsValue, Numeric, bigint_ops, number_ops};
use codec::ElementKind;
use std::sync::Arc;
use store::{ByteStore, NativeBudget, Residency, Sharing};

/// Context threaded through every operation: limits plus the native memory
/// budget shared by all stores it allocates.
pub struct Engine {
    config: EngineConfig,
    budget: Arc<NativeBudget>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let budget = NativeBudget::new(config.native_size_limit);
        Engine { config, budget }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn native_budget(&self) -> &Arc<NativeBudget> {
        &self.budget
    }

    /// Allocate a zeroed native store.
    pub fn allocate_buffer(&self, byte_length: u64) -> Result<ByteStore> {
        ByteStore::allocate(byte_length, Sharing::Unshared, &self.config, &self.budget)
    }

    /// Allocate a zeroed native store that may be viewed from several threads.
    pub fn allocate_shared(&self, byte_length: u64) -> Result<ByteStore> {
        ByteStore::allocate(byte_length, Sharing::Shared, &self.config, &self.budget)
    }

    pub fn allocate_inline(&self, byte_length: u64) -> Result<ByteStore> {
        ByteStore::allocate_inline(byte_length, &self.config)
    }

    // Fresh views get an inline store when they are small enough.
    fn allocate_for_view(&self, byte_length: u64) -> Result<ByteStore> {
        if byte_length <= self.config.on_heap_max_bytes as u64 {
            self.allocate_inline(byte_length)
        } else {
            self.allocate_buffer(byte_length)
        }
    }

    /// Copy an inline store into a fresh native one.
    pub fn promote_store(&self, store: &ByteStore) -> Result<ByteStore> {
        if store.residency() == Residency::Native {
            return Ok(store.clone());
        }
        let bytes = store.read_bytes(0, store.byte_length())?;
        let native = self.allocate_buffer(bytes.len() as u64)?;
        native.write_bytes(0, &bytes)?;
        log::debug!("promoted inline store of {} bytes", bytes.len());
        Ok(native)
    }

    /// Copy a native store into a fresh inline one.
    pub fn demote_store(&self, store: &ByteStore) -> Result<ByteStore> {
        if store.residency() == Residency::Inline {
            return Ok(store.clone());
        }
        let bytes = store.read_bytes(0, store.byte_length())?;
        let inline = self.allocate_inline(bytes.len() as u64)?;
        inline.write_bytes(0, &bytes)?;
        log::debug!("demoted native store of {} bytes", bytes.len());
        Ok(inline)
    }

    // §7.1.4 ToNumber
    pub fn to_number_value(&self, value: &JsValue) -> Result<f64> {
        match value {
            JsValue::Undefined => Ok(f64::NAN),
            JsValue::Null => Ok(0.0),
            JsValue::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            JsValue::Number(n) => Ok(*n),
            JsValue::String(s) => Ok(number_ops::string_to_number(&s.to_rust_string())),
            JsValue::BigInt(_) => Err(Error::type_error("cannot convert a BigInt value to a number")),
        }
    }

    // §7.1.13 ToBigInt
    pub fn to_bigint_value(&self, value: &JsValue) -> Result<JsBigInt> {
        match value {
            JsValue::BigInt(b) => Ok(b.clone()),
            JsValue::Boolean(b) => Ok(JsBigInt::from(*b as i64)),
            JsValue::String(s) => match bigint_ops::string_to_bigint(&s.to_rust_string()) {
                Some(value) => Ok(JsBigInt { value }),
                None => Err(Error::type_error(format!("cannot convert {s} to a BigInt"))),
            },
            JsValue::Number(n) => Err(Error::type_error(format!(
                "cannot convert {} to a BigInt",
                number_ops::to_string(*n)
            ))),
            JsValue::Undefined | JsValue::Null => {
                Err(Error::type_error(format!("cannot convert {value} to a BigInt")))
            }
        }
    }

    /// Coerce by the content type of `kind`.
    pub fn coerce_for_kind(&self, kind: ElementKind, value: &JsValue) -> Result<Numeric> {
        if kind.is_bigint() {
            Ok(Numeric::BigInt(self.to_bigint_value(value)?))
        } else {
            Ok(Numeric::Double(self.to_number_value(value)?))
        }
    }
}
