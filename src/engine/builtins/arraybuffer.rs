use super::relative_index;
use crate::engine::Engine;
use crate::engine::species::Object;
use crate::engine::store::{ByteStore, Sharing};
use crate::error::{Error, Result};

impl Engine {
    /// `ArrayBuffer.prototype.slice` (and its shared counterpart).
    pub fn buffer_slice(&self, store: &ByteStore, start: f64, end: Option<f64>) -> Result<ByteStore> {
        if store.is_detached() {
            return Err(Error::type_error("ArrayBuffer is detached"));
        }
        let len = store.byte_length();
        let first = relative_index(start, len);
        let fin = end.map_or(len, |e| relative_index(e, len));
        let new_len = fin.saturating_sub(first);

        let constructed = match store.species() {
            Some(ctor) => {
                log::trace!("buffer species constructor for {} bytes", new_len);
                ctor.construct(self, new_len)?
            }
            None => Object::Buffer(match store.sharing() {
                Sharing::Unshared => self.allocate_buffer(new_len as u64)?,
                Sharing::Shared => self.allocate_shared(new_len as u64)?,
            }),
        };
        let new = match constructed {
            Object::Buffer(b) => b,
            Object::View(_) | Object::Other(_) => {
                return Err(Error::type_error("species constructor did not return an ArrayBuffer"));
            }
        };
        if new.sharing() != store.sharing() {
            return Err(Error::type_error("species constructor returned a buffer of the wrong kind"));
        }
        if new.is_detached() {
            return Err(Error::type_error("species constructor returned a detached ArrayBuffer"));
        }
        if ByteStore::same_store(&new, store) {
            return Err(Error::type_error("species constructor returned the same ArrayBuffer"));
        }
        if new.byte_length() < new_len {
            return Err(Error::type_error("species constructor returned a too small ArrayBuffer"));
        }
        // The constructor may have detached the receiver.
        if store.is_detached() {
            return Err(Error::type_error("ArrayBuffer is detached"));
        }
        ByteStore::copy_bytes(&new, 0, store, first, new_len)?;
        Ok(new)
    }

    /// Copy `byte_length` bytes at `byte_offset` into a fresh native store.
    /// Runs no user code.
    pub fn clone_buffer(&self, store: &ByteStore, byte_offset: usize, byte_length: usize) -> Result<ByteStore> {
        if store.is_detached() {
            return Err(Error::detached());
        }
        let in_bounds = byte_offset
            .checked_add(byte_length)
            .is_some_and(|end| end <= store.byte_length());
        if !in_bounds {
            return Err(Error::range_error("clone range is outside the buffer"));
        }
        let clone = self.allocate_buffer(byte_length as u64)?;
        ByteStore::copy_bytes(&clone, 0, store, byte_offset, byte_length)?;
        Ok(clone)
    }

    /// `ArrayBuffer.isView`
    pub fn is_view(&self, object: &Object) -> bool {
        matches!(object, Object::View(_))
    }
}
