//!
//! Wrapper for XmlSec Keys and Key loading
//!
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_void};
use std::path::Path;
use std::ptr::{null, null_mut};

use crate::error::{take_last_native_error, XmlSecError, XmlSecResult};
use crate::registry::Handle;
use crate::xmlsec::guarantee_xmlsec_init;

use xmlsec1_sys as ffi;

/// Supported key material formats, mirroring the native format enumeration.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XmlSecKeyFormat {
    Binary,
    Pem,
    Der,
    Pkcs8Pem,
    Pkcs8Der,
    Pkcs12,
    CertPem,
    CertDer,
}

impl XmlSecKeyFormat {
    pub(crate) fn to_native(self) -> ffi::xmlSecKeyDataFormat {
        match self {
            Self::Binary => ffi::xmlSecKeyDataFormat_xmlSecKeyDataFormatBinary,
            Self::Pem => ffi::xmlSecKeyDataFormat_xmlSecKeyDataFormatPem,
            Self::Der => ffi::xmlSecKeyDataFormat_xmlSecKeyDataFormatDer,
            Self::Pkcs8Pem => ffi::xmlSecKeyDataFormat_xmlSecKeyDataFormatPkcs8Pem,
            Self::Pkcs8Der => ffi::xmlSecKeyDataFormat_xmlSecKeyDataFormatPkcs8Der,
            Self::Pkcs12 => ffi::xmlSecKeyDataFormat_xmlSecKeyDataFormatPkcs12,
            Self::CertPem => ffi::xmlSecKeyDataFormat_xmlSecKeyDataFormatCertPem,
            Self::CertDer => ffi::xmlSecKeyDataFormat_xmlSecKeyDataFormatCertDer,
        }
    }
}

/// Kinds of key data the native library can generate in place.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XmlSecKeyDataKind {
    Aes,
    Des,
    Hmac,
    Rsa,
}

impl XmlSecKeyDataKind {
    fn klass(self) -> ffi::xmlSecKeyDataId {
        unsafe {
            match self {
                Self::Aes => ffi::xmlSecOpenSSLKeyDataAesGetKlass(),
                Self::Des => ffi::xmlSecOpenSSLKeyDataDesGetKlass(),
                Self::Hmac => ffi::xmlSecOpenSSLKeyDataHmacGetKlass(),
                Self::Rsa => ffi::xmlSecOpenSSLKeyDataRsaGetKlass(),
            }
        }
    }
}

unsafe fn destroy_key(ptr: *mut c_void) {
    ffi::xmlSecKeyDestroy(ptr as ffi::xmlSecKeyPtr);
}

/// Key material loaded into the native library.
///
/// The native key is tracked by the handle registry: it is destroyed
/// exactly once, either by an explicit [`release`](Self::release) or on
/// drop, and any use after that reports
/// [`XmlSecError::UseAfterRelease`].
#[derive(Debug)]
pub struct XmlSecKey {
    handle: Handle,
}

impl XmlSecKey {
    /// Load a key from an in-memory buffer.
    #[tracing::instrument(level = "debug", skip(buffer, password))]
    pub fn from_memory(
        buffer: &[u8],
        format: XmlSecKeyFormat,
        password: Option<&str>,
    ) -> XmlSecResult<Self> {
        guarantee_xmlsec_init()?;

        let cpassword = password.map(CString::new).transpose()?;
        let password_ptr = cpassword.as_ref().map_or(null(), |p| p.as_ptr());

        let key = unsafe {
            ffi::xmlSecOpenSSLAppKeyLoadMemory(
                buffer.as_ptr(),
                buffer.len() as _,
                format.to_native(),
                password_ptr,
                null_mut(),
                null_mut(),
            )
        };

        if key.is_null() {
            return Err(XmlSecError::KeyLoadFailure(take_last_native_error()));
        }

        Ok(Self {
            handle: Handle::register(key as *mut c_void, destroy_key),
        })
    }

    /// Read `path` and load the key from its contents.
    ///
    /// The file is read on the Rust side and fed through the memory loader,
    /// which keeps the call surface identical across xmlsec1 1.2 and 1.3.
    pub fn from_file(
        path: impl AsRef<Path>,
        format: XmlSecKeyFormat,
        password: Option<&str>,
    ) -> XmlSecResult<Self> {
        let buffer = std::fs::read(path)?;
        Self::from_memory(&buffer, format, password)
    }

    /// Generate a fresh key of `bits` length inside the native library.
    #[tracing::instrument(level = "debug")]
    pub fn generate(kind: XmlSecKeyDataKind, bits: u32) -> XmlSecResult<Self> {
        guarantee_xmlsec_init()?;

        let key = unsafe {
            ffi::xmlSecKeyGenerate(kind.klass(), bits as _, ffi::xmlSecKeyDataTypeSession as _)
        };

        if key.is_null() {
            return Err(XmlSecError::KeyLoadFailure(take_last_native_error()));
        }

        Ok(Self {
            handle: Handle::register(key as *mut c_void, destroy_key),
        })
    }

    /// Attach an X.509 certificate to the key.
    pub fn load_cert_from_memory(
        &self,
        buffer: &[u8],
        format: XmlSecKeyFormat,
    ) -> XmlSecResult<()> {
        self.handle.with(|ptr| {
            let rc = unsafe {
                ffi::xmlSecOpenSSLAppKeyCertLoadMemory(
                    ptr as ffi::xmlSecKeyPtr,
                    buffer.as_ptr(),
                    buffer.len() as _,
                    format.to_native(),
                )
            };

            if rc < 0 {
                Err(XmlSecError::KeyLoadFailure(take_last_native_error()))
            } else {
                Ok(())
            }
        })?
    }

    /// Set the key name used for `<KeyName>` lookups.
    pub fn set_name(&self, name: &str) -> XmlSecResult<()> {
        let cname = CString::new(name)?;

        self.handle.with(|ptr| {
            let rc = unsafe {
                ffi::xmlSecKeySetName(
                    ptr as ffi::xmlSecKeyPtr,
                    cname.as_ptr() as *const ffi::xmlChar,
                )
            };

            if rc < 0 {
                Err(XmlSecError::KeyLoadFailure(take_last_native_error()))
            } else {
                Ok(())
            }
        })?
    }

    /// The key name, if one has been set.
    pub fn name(&self) -> XmlSecResult<Option<String>> {
        self.handle.with(|ptr| {
            let name = unsafe { ffi::xmlSecKeyGetName(ptr as ffi::xmlSecKeyPtr) };
            if name.is_null() {
                None
            } else {
                let name = unsafe { CStr::from_ptr(name as *const c_char) };
                Some(name.to_string_lossy().into_owned())
            }
        })
    }

    /// Duplicate the native key, e.g. to hand an owned copy to a context.
    pub(crate) fn duplicate_raw(&self) -> XmlSecResult<ffi::xmlSecKeyPtr> {
        let duplicate = self
            .handle
            .with(|ptr| unsafe { ffi::xmlSecKeyDuplicate(ptr as ffi::xmlSecKeyPtr) })?;

        if duplicate.is_null() {
            return Err(XmlSecError::AllocationFailure(take_last_native_error()));
        }
        Ok(duplicate)
    }

    /// Move the native key out of the registry, for adoption by a keys
    /// manager. The handle behaves as released afterwards.
    pub(crate) fn take_raw(&self) -> XmlSecResult<ffi::xmlSecKeyPtr> {
        Ok(self.handle.take()? as ffi::xmlSecKeyPtr)
    }

    /// Release the native key now instead of on drop. A second release
    /// reports [`XmlSecError::UseAfterRelease`].
    pub fn release(&mut self) -> XmlSecResult<()> {
        self.handle.release()
    }
}
