// Scopes on shared stores never block; a conflicting request fails with a TypeError.

use super::species::BufferConstructor;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Residency {
    /// Small store embedded in managed memory
    Inline,
    /// Off-heap store charged to the native budget
    Native,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sharing {
    Unshared,
    Shared,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeMode {
    Read,
    Write,
}

/// Running total of native store bytes, with a hard ceiling.
pub struct NativeBudget {
    limit: usize,
    used: AtomicUsize,
}

impl NativeBudget {
    pub fn new(limit: usize) -> Arc<Self> {
        Arc::new(Self {
            limit,
            used: AtomicUsize::new(0),
        })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Get current native usage in bytes.
    pub fn used(&self) -> usize {
        self.used.load(Ordering::SeqCst)
    }

    fn try_charge(&self, bytes: usize) -> bool {
        let mut current = self.used.load(Ordering::SeqCst);
        loop {
            let Some(next) = current.checked_add(bytes) else {
                return false;
            };
            if next > self.limit {
                return false;
            }
            match self
                .used
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn release(&self, bytes: usize) {
        self.used.fetch_sub(bytes, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct ScopeState {
    readers: usize,
    writer: Option<ThreadId>,
}

struct StoreInner {
    data: RwLock<Option<Vec<u8>>>,
    byte_length: usize,
    residency: Residency,
    sharing: Sharing,
    budget: Option<Arc<NativeBudget>>,
    charged: AtomicBool,
    scopes: Mutex<ScopeState>,
    species: RwLock<Option<Arc<dyn BufferConstructor>>>,
}

impl StoreInner {
    fn release_charge(&self) {
        if self.charged.swap(false, Ordering::SeqCst)
            && let Some(budget) = &self.budget
        {
            budget.release(self.byte_length);
        }
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        self.release_charge();
    }
}

/// Handle to a byte store. Clones refer to the same allocation.
#[derive(Clone)]
pub struct ByteStore {
    inner: Arc<StoreInner>,
}

impl fmt::Debug for ByteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteStore")
            .field("byte_length", &self.inner.byte_length)
            .field("residency", &self.inner.residency)
            .field("sharing", &self.inner.sharing)
            .field("detached", &self.is_detached())
            .finish()
    }
}

impl ByteStore {
    /// Allocate a zero-filled native store.
    pub fn allocate(
        byte_length: u64,
        sharing: Sharing,
        config: &EngineConfig,
        budget: &Arc<NativeBudget>,
    ) -> Result<Self> {
        if byte_length > config.max_byte_length {
            return Err(Error::range_error(format!(
                "invalid array buffer length {byte_length}"
            )));
        }
        let byte_length = byte_length as usize;
        if !budget.try_charge(byte_length) {
            log::warn!(
                "native allocation of {} bytes refused ({} of {} in use)",
                byte_length,
                budget.used(),
                budget.limit()
            );
            return Err(Error::range_error("array buffer allocation failed"));
        }
        log::debug!("allocated native store of {} bytes ({:?})", byte_length, sharing);
        Ok(Self::from_parts(
            vec![0u8; byte_length],
            Residency::Native,
            sharing,
            Some(budget.clone()),
        ))
    }

    /// Allocate a zero-filled inline store.
    pub fn allocate_inline(byte_length: u64, config: &EngineConfig) -> Result<Self> {
        if byte_length > config.on_heap_max_bytes as u64 {
            return Err(Error::range_error(format!(
                "{byte_length} bytes do not fit an inline store"
            )));
        }
        Ok(Self::from_parts(
            vec![0u8; byte_length as usize],
            Residency::Inline,
            Sharing::Unshared,
            None,
        ))
    }

    fn from_parts(
        data: Vec<u8>,
        residency: Residency,
        sharing: Sharing,
        budget: Option<Arc<NativeBudget>>,
    ) -> Self {
        let charged = budget.is_some();
        Self {
            inner: Arc::new(StoreInner {
                byte_length: data.len(),
                data: RwLock::new(Some(data)),
                residency,
                sharing,
                budget,
                charged: AtomicBool::new(charged),
                scopes: Mutex::new(ScopeState::default()),
                species: RwLock::new(None),
            }),
        }
    }

    /// Byte length; 0 once detached.
    pub fn byte_length(&self) -> usize {
        if self.is_detached() {
            0
        } else {
            self.inner.byte_length
        }
    }

    pub fn residency(&self) -> Residency {
        self.inner.residency
    }

    pub fn sharing(&self) -> Sharing {
        self.inner.sharing
    }

    pub fn is_shared(&self) -> bool {
        self.inner.sharing == Sharing::Shared
    }

    pub fn is_detached(&self) -> bool {
        self.inner.data.read().is_none()
    }

    /// Drop the bytes. Idempotent.
    pub fn detach(&self) {
        let was_attached = self.inner.data.write().take().is_some();
        if was_attached {
            log::debug!("detached store of {} bytes", self.inner.byte_length);
            self.inner.release_charge();
        }
    }

    /// Buffer identity.
    pub fn same_store(a: &ByteStore, b: &ByteStore) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    pub fn species(&self) -> Option<Arc<dyn BufferConstructor>> {
        self.inner.species.read().clone()
    }

    pub fn set_species(&self, ctor: Arc<dyn BufferConstructor>) {
        *self.inner.species.write() = Some(ctor);
    }

    /// Run `f` over the live bytes. The lock is held for the duration of `f`,
    /// which must not call back into user code.
    pub(crate) fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        let guard = self.inner.data.read();
        match guard.as_deref() {
            Some(bytes) => Ok(f(bytes)),
            None => Err(Error::detached()),
        }
    }

    pub(crate) fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> Result<R> {
        let mut guard = self.inner.data.write();
        match guard.as_deref_mut() {
            Some(bytes) => Ok(f(bytes)),
            None => Err(Error::detached()),
        }
    }

    /// Copy of `len` bytes starting at `offset`.
    pub fn read_bytes(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        self.with_bytes(|bytes| bytes[offset..offset + len].to_vec())
    }

    pub fn write_bytes(&self, offset: usize, src: &[u8]) -> Result<()> {
        self.with_bytes_mut(|bytes| bytes[offset..offset + src.len()].copy_from_slice(src))
    }

    /// Raw copy between two distinct stores. The caller guarantees both ranges
    /// are in bounds; overlap within one store is handled by [`Self::copy_within`].
    pub fn copy_bytes(
        dst: &ByteStore,
        dst_offset: usize,
        src: &ByteStore,
        src_offset: usize,
        byte_count: usize,
    ) -> Result<()> {
        assert!(
            !ByteStore::same_store(dst, src),
            "copy_bytes called with a single store"
        );
        if byte_count == 0 {
            return Ok(());
        }
        // Snapshot first so the two locks are never held together.
        let chunk = src.read_bytes(src_offset, byte_count)?;
        dst.write_bytes(dst_offset, &chunk)
    }

    /// memmove within this store.
    pub fn copy_within(&self, src_offset: usize, dst_offset: usize, byte_count: usize) -> Result<()> {
        self.with_bytes_mut(|bytes| {
            bytes.copy_within(src_offset..src_offset + byte_count, dst_offset)
        })
    }

    /// Open an API scope. Unshared stores hand out an inert guard.
    pub fn enter_scope(&self, mode: ScopeMode) -> Result<ApiScope<'_>> {
        if self.inner.sharing == Sharing::Unshared {
            return Ok(ApiScope { store: None, mode });
        }
        let me = thread::current().id();
        let mut state = self.inner.scopes.lock();
        match mode {
            ScopeMode::Read => {
                if state.writer.is_some_and(|w| w != me) {
                    return Err(Error::type_error(
                        "concurrent modification of a shared typed array",
                    ));
                }
                state.readers += 1;
            }
            ScopeMode::Write => {
                if state.writer.is_some() || state.readers > 0 {
                    return Err(Error::type_error(
                        "concurrent modification of a shared typed array",
                    ));
                }
                state.writer = Some(me);
            }
        }
        Ok(ApiScope {
            store: Some(&self.inner),
            mode,
        })
    }
}

/// RAII record of an in-flight operation on a shared store.
pub struct ApiScope<'a> {
    store: Option<&'a StoreInner>,
    mode: ScopeMode,
}

impl fmt::Debug for ApiScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiScope")
            .field("mode", &self.mode)
            .field("active", &self.store.is_some())
            .finish()
    }
}

impl Drop for ApiScope<'_> {
    fn drop(&mut self) {
        if let Some(inner) = self.store {
            let mut state = inner.scopes.lock();
            match self.mode {
                ScopeMode::Read => state.readers -= 1,
                ScopeMode::Write => state.writer = None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget() -> Arc<NativeBudget> {
        NativeBudget::new(1024)
    }

    #[test]
    fn allocation_is_zero_filled() {
        let cfg = EngineConfig::default();
        let store = ByteStore::allocate(16, Sharing::Unshared, &cfg, &budget()).unwrap();
        assert_eq!(store.byte_length(), 16);
        assert_eq!(store.read_bytes(0, 16).unwrap(), vec![0u8; 16]);
        assert_eq!(store.residency(), Residency::Native);
    }

    #[test]
    fn allocation_limits() {
        let cfg = EngineConfig::default().with_max_byte_length(8);
        let err = ByteStore::allocate(9, Sharing::Unshared, &cfg, &budget()).unwrap_err();
        assert!(err.is_range_error());

        let cfg = EngineConfig::default();
        let b = budget();
        let _a = ByteStore::allocate(1000, Sharing::Unshared, &cfg, &b).unwrap();
        let err = ByteStore::allocate(100, Sharing::Unshared, &cfg, &b).unwrap_err();
        assert!(err.is_range_error());
        assert_eq!(b.used(), 1000);
    }

    #[test]
    fn budget_released_on_detach_and_drop() {
        let cfg = EngineConfig::default();
        let b = budget();
        let store = ByteStore::allocate(600, Sharing::Unshared, &cfg, &b).unwrap();
        assert_eq!(b.used(), 600);
        store.detach();
        store.detach();
        assert_eq!(b.used(), 0);

        {
            let _s = ByteStore::allocate(300, Sharing::Unshared, &cfg, &b).unwrap();
            assert_eq!(b.used(), 300);
        }
        assert_eq!(b.used(), 0);
    }

    #[test]
    fn zero_length_store_is_not_detached() {
        let cfg = EngineConfig::default();
        let store = ByteStore::allocate(0, Sharing::Unshared, &cfg, &budget()).unwrap();
        assert!(!store.is_detached());
        store.detach();
        assert!(store.is_detached());
        assert_eq!(store.byte_length(), 0);
        assert!(store.read_bytes(0, 0).unwrap_err().is_type_error());
    }

    #[test]
    fn inline_stores_skip_the_budget() {
        let cfg = EngineConfig::default();
        let store = ByteStore::allocate_inline(64, &cfg).unwrap();
        assert_eq!(store.residency(), Residency::Inline);
        assert!(ByteStore::allocate_inline(129, &cfg).unwrap_err().is_range_error());
    }

    #[test]
    fn copy_between_and_within() {
        let cfg = EngineConfig::default();
        let b = budget();
        let a = ByteStore::allocate(8, Sharing::Unshared, &cfg, &b).unwrap();
        let c = ByteStore::allocate(8, Sharing::Unshared, &cfg, &b).unwrap();
        a.write_bytes(0, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        ByteStore::copy_bytes(&c, 2, &a, 0, 4).unwrap();
        assert_eq!(c.read_bytes(0, 8).unwrap(), vec![0, 0, 1, 2, 3, 4, 0, 0]);

        a.copy_within(0, 2, 4).unwrap();
        assert_eq!(a.read_bytes(0, 8).unwrap(), vec![1, 2, 1, 2, 3, 4, 7, 8]);
    }

    #[test]
    #[should_panic(expected = "single store")]
    fn copy_bytes_rejects_one_store() {
        let cfg = EngineConfig::default();
        let a = ByteStore::allocate(4, Sharing::Unshared, &cfg, &budget()).unwrap();
        let _ = ByteStore::copy_bytes(&a, 0, &a, 1, 2);
    }

    #[test]
    fn shared_scope_rules() {
        let cfg = EngineConfig::default();
        let store = ByteStore::allocate(4, Sharing::Shared, &cfg, &budget()).unwrap();
        {
            let _r1 = store.enter_scope(ScopeMode::Read).unwrap();
            let _r2 = store.enter_scope(ScopeMode::Read).unwrap();
            assert!(store.enter_scope(ScopeMode::Write).unwrap_err().is_type_error());
        }
        {
            let _w = store.enter_scope(ScopeMode::Write).unwrap();
            // same thread may read while writing, but not write again
            let _r = store.enter_scope(ScopeMode::Read).unwrap();
            assert!(store.enter_scope(ScopeMode::Write).is_err());
        }
        assert!(store.enter_scope(ScopeMode::Write).is_ok());
    }

    #[test]
    fn shared_write_scope_excludes_other_threads() {
        let cfg = EngineConfig::default();
        let store = ByteStore::allocate(4, Sharing::Shared, &cfg, &budget()).unwrap();
        let _w = store.enter_scope(ScopeMode::Write).unwrap();
        let other = store.clone();
        let denied = std::thread::spawn(move || other.enter_scope(ScopeMode::Read).is_err())
            .join()
            .unwrap();
        assert!(denied);
    }

    #[test]
    fn readers_run_in_parallel() {
        let cfg = EngineConfig::default();
        let store = ByteStore::allocate(4, Sharing::Shared, &cfg, &budget()).unwrap();
        let _r = store.enter_scope(ScopeMode::Read).unwrap();
        let other = store.clone();
        let granted = std::thread::spawn(move || other.enter_scope(ScopeMode::Read).is_ok())
            .join()
            .unwrap();
        assert!(granted);
    }

    #[test]
    fn unshared_scopes_are_inert() {
        let cfg = EngineConfig::default();
        let store = ByteStore::allocate(4, Sharing::Unshared, &cfg, &budget()).unwrap();
        let _w1 = store.enter_scope(ScopeMode::Write).unwrap();
        let _w2 = store.enter_scope(ScopeMode::Write).unwrap();
    }
}
