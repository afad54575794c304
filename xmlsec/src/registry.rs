//!
//! Central registry for native handles
//!
//! Every resource the wrapper obtains from the native library (keys, keys
//! managers, per-operation contexts) is tracked here under an opaque id.
//! The registry owns the two invariants that matter when raw pointers
//! cross the FFI boundary:
//!
//!   * a resource is released exactly once, and a second release (or any
//!     use after release) is reported as [`XmlSecError::UseAfterRelease`]
//!     instead of corrupting memory;
//!   * access to one handle is serialised through a per-entry lock, since
//!     the native library is not safe for concurrent use of the same
//!     handle. Unrelated handles proceed in parallel.
//!
use std::collections::HashMap;
use std::os::raw::c_void;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;

use crate::error::{XmlSecError, XmlSecResult};

/// Destructor run when an entry is released. Receives the native pointer
/// that was registered.
pub(crate) type NativeDestructor = unsafe fn(*mut c_void);

struct Entry {
    /// Native pointer stored as an address so entries are Send + Sync.
    /// `None` once the resource was released or its ownership moved into
    /// the native library.
    resource: Mutex<Option<usize>>,
    destroy: NativeDestructor,
}

lazy_static! {
    static ref ENTRIES: Mutex<HashMap<u64, Arc<Entry>>> = Mutex::new(HashMap::new());
}

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Owning reference to a registry entry.
///
/// Dropping the handle destroys the resource if it is still live. An
/// explicitly released entry stays behind as a tombstone until the handle
/// is dropped, so late calls through the same handle are detected rather
/// than dereferencing freed memory.
#[derive(Debug)]
pub(crate) struct Handle {
    id: u64,
}

impl Handle {
    /// Track a freshly allocated native resource.
    pub fn register(ptr: *mut c_void, destroy: NativeDestructor) -> Self {
        let id = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(Entry {
            resource: Mutex::new(Some(ptr as usize)),
            destroy,
        });
        ENTRIES
            .lock()
            .expect("Unable to lock the native handle registry")
            .insert(id, entry);

        Handle { id }
    }

    fn entry(&self) -> Option<Arc<Entry>> {
        ENTRIES
            .lock()
            .expect("Unable to lock the native handle registry")
            .get(&self.id)
            .cloned()
    }

    /// Run `f` with the native pointer. The entry lock is held for the
    /// duration of the call, serialising all access to this handle.
    pub fn with<R>(&self, f: impl FnOnce(*mut c_void) -> R) -> XmlSecResult<R> {
        let entry = self.entry().ok_or(XmlSecError::UseAfterRelease)?;
        let guard = entry
            .resource
            .lock()
            .expect("Unable to lock native handle entry");

        match *guard {
            Some(addr) => Ok(f(addr as *mut c_void)),
            None => Err(XmlSecError::UseAfterRelease),
        }
    }

    /// Release the resource. The second release of the same handle reports
    /// [`XmlSecError::UseAfterRelease`].
    pub fn release(&self) -> XmlSecResult<()> {
        let entry = self.entry().ok_or(XmlSecError::UseAfterRelease)?;
        let mut guard = entry
            .resource
            .lock()
            .expect("Unable to lock native handle entry");

        match guard.take() {
            Some(addr) => {
                unsafe { (entry.destroy)(addr as *mut c_void) };
                Ok(())
            }
            None => Err(XmlSecError::UseAfterRelease),
        }
    }

    /// Move ownership of the native pointer out of the registry without
    /// destroying it, e.g. for a key being adopted by a keys manager. The
    /// handle behaves as released afterwards.
    pub fn take(&self) -> XmlSecResult<*mut c_void> {
        let entry = self.entry().ok_or(XmlSecError::UseAfterRelease)?;
        let mut guard = entry
            .resource
            .lock()
            .expect("Unable to lock native handle entry");

        match guard.take() {
            Some(addr) => Ok(addr as *mut c_void),
            None => Err(XmlSecError::UseAfterRelease),
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        let removed = ENTRIES
            .lock()
            .expect("Unable to lock the native handle registry")
            .remove(&self.id);

        if let Some(entry) = removed {
            let still_live = entry
                .resource
                .lock()
                .expect("Unable to lock native handle entry")
                .take();
            if let Some(addr) = still_live {
                unsafe { (entry.destroy)(addr as *mut c_void) };
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    unsafe fn bump(ptr: *mut c_void) {
        (*(ptr as *const AtomicUsize)).fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn second_release_reports_use_after_release() {
        let destroyed = AtomicUsize::new(0);
        let handle = Handle::register(&destroyed as *const _ as *mut c_void, bump);

        handle.release().unwrap();
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);

        match handle.release() {
            Err(XmlSecError::UseAfterRelease) => {}
            other => panic!("expected UseAfterRelease, got {:?}", other),
        }
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn with_after_release_fails() {
        let destroyed = AtomicUsize::new(0);
        let handle = Handle::register(&destroyed as *const _ as *mut c_void, bump);

        handle.release().unwrap();
        assert!(matches!(
            handle.with(|_| ()),
            Err(XmlSecError::UseAfterRelease)
        ));
    }

    #[test]
    fn drop_destroys_exactly_once() {
        let destroyed = AtomicUsize::new(0);
        {
            let _handle = Handle::register(&destroyed as *const _ as *mut c_void, bump);
        }
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_after_release_does_not_destroy_again() {
        let destroyed = AtomicUsize::new(0);
        {
            let handle = Handle::register(&destroyed as *const _ as *mut c_void, bump);
            handle.release().unwrap();
        }
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn take_transfers_ownership_without_destroying() {
        let destroyed = AtomicUsize::new(0);
        let handle = Handle::register(&destroyed as *const _ as *mut c_void, bump);

        let ptr = handle.take().unwrap();
        assert_eq!(ptr as usize, &destroyed as *const _ as usize);
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);

        assert!(matches!(
            handle.with(|_| ()),
            Err(XmlSecError::UseAfterRelease)
        ));
        drop(handle);
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);
    }
}
