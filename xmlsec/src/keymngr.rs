//!
//! Wrapper for the XmlSec Keys Manager
//!
//! The keys manager is the native library's key store and trust store:
//! verification looks signing keys and trusted certificates up here, and
//! decryption uses it to resolve the key wrapped in an `<EncryptedKey>`.
//!
use std::os::raw::c_void;

use crate::error::{take_last_native_error, XmlSecError, XmlSecResult};
use crate::keys::{XmlSecKey, XmlSecKeyFormat};
use crate::registry::Handle;
use crate::xmlsec::guarantee_xmlsec_init;

use xmlsec1_sys as ffi;

unsafe fn destroy_keys_manager(ptr: *mut c_void) {
    ffi::xmlSecKeysMngrDestroy(ptr as ffi::xmlSecKeysMngrPtr);
}

/// A native keys manager holding named keys and the X.509 trust store.
#[derive(Debug)]
pub struct XmlSecKeyManager {
    handle: Handle,
}

impl XmlSecKeyManager {
    /// Create a keys manager backed by the default OpenSSL key store.
    pub fn new() -> XmlSecResult<Self> {
        guarantee_xmlsec_init()?;

        let manager = unsafe { ffi::xmlSecKeysMngrCreate() };
        if manager.is_null() {
            return Err(XmlSecError::AllocationFailure(take_last_native_error()));
        }

        let rc = unsafe { ffi::xmlSecOpenSSLAppDefaultKeysMngrInit(manager) };
        if rc < 0 {
            unsafe { ffi::xmlSecKeysMngrDestroy(manager) };
            return Err(XmlSecError::InitFailure(take_last_native_error()));
        }

        Ok(Self {
            handle: Handle::register(manager as *mut c_void, destroy_keys_manager),
        })
    }

    /// Adopt `key` into the manager.
    ///
    /// Ownership of the native key moves to the manager; the passed-in
    /// handle is consumed either way, so a failed adoption does not leak
    /// the key.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn adopt_key(&self, key: XmlSecKey) -> XmlSecResult<()> {
        let raw = key.take_raw()?;

        let outcome = self.handle.with(|manager| {
            let rc = unsafe {
                ffi::xmlSecOpenSSLAppDefaultKeysMngrAdoptKey(
                    manager as ffi::xmlSecKeysMngrPtr,
                    raw,
                )
            };

            if rc < 0 {
                unsafe { ffi::xmlSecKeyDestroy(raw) };
                Err(XmlSecError::KeyLoadFailure(take_last_native_error()))
            } else {
                Ok(())
            }
        });

        match outcome {
            Ok(inner) => inner,
            Err(err) => {
                // The manager itself was released; the key is ours to free.
                unsafe { ffi::xmlSecKeyDestroy(raw) };
                Err(err)
            }
        }
    }

    /// Load a trusted CA certificate into the trust store.
    pub fn load_trusted_cert_from_memory(
        &self,
        buffer: &[u8],
        format: XmlSecKeyFormat,
    ) -> XmlSecResult<()> {
        self.load_cert_from_memory(buffer, format, ffi::xmlSecKeyDataTypeTrusted)
    }

    /// Load an untrusted (intermediate) certificate for chain building.
    pub fn load_untrusted_cert_from_memory(
        &self,
        buffer: &[u8],
        format: XmlSecKeyFormat,
    ) -> XmlSecResult<()> {
        self.load_cert_from_memory(buffer, format, ffi::xmlSecKeyDataTypeNone)
    }

    fn load_cert_from_memory(
        &self,
        buffer: &[u8],
        format: XmlSecKeyFormat,
        data_type: u32,
    ) -> XmlSecResult<()> {
        let native_format = format.to_native();

        self.handle.with(|manager| {
            let rc = unsafe {
                ffi::xmlSecOpenSSLAppKeysMngrCertLoadMemory(
                    manager as ffi::xmlSecKeysMngrPtr,
                    buffer.as_ptr(),
                    buffer.len() as _,
                    native_format,
                    data_type as _,
                )
            };

            if rc < 0 {
                Err(XmlSecError::KeyLoadFailure(take_last_native_error()))
            } else {
                Ok(())
            }
        })?
    }

    /// Run `f` with the native manager pointer under the handle lock.
    pub(crate) fn with_raw<R>(
        &self,
        f: impl FnOnce(ffi::xmlSecKeysMngrPtr) -> R,
    ) -> XmlSecResult<R> {
        self.handle.with(|ptr| f(ptr as ffi::xmlSecKeysMngrPtr))
    }

    /// Release the native manager now instead of on drop. A second release
    /// reports [`XmlSecError::UseAfterRelease`].
    pub fn release(&mut self) -> XmlSecResult<()> {
        self.handle.release()
    }
}
