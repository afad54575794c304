//!
//! XmlSec Signature Context
//!
use std::os::raw::c_void;
use std::ptr::null_mut;
use std::sync::Arc;

use crate::document::{find_node_raw, XmlDocument, DSIG_NS, NODE_SIGNATURE};
use crate::error::{take_last_native_error, XmlSecError, XmlSecResult};
use crate::keymngr::XmlSecKeyManager;
use crate::keys::XmlSecKey;
use crate::registry::Handle;
use crate::xmlsec::guarantee_xmlsec_init;

use xmlsec1_sys as ffi;

unsafe fn destroy_dsig_ctx(ptr: *mut c_void) {
    ffi::xmlSecDSigCtxDestroy(ptr as ffi::xmlSecDSigCtxPtr);
}

/// Native DSig context scoped to a single operation. Created inside each
/// sign/verify call and released when the call completes; the native
/// library does not support reusing one across operations.
struct DSigCtx {
    handle: Handle,
}

impl DSigCtx {
    fn create(manager: ffi::xmlSecKeysMngrPtr) -> XmlSecResult<Self> {
        let ptr = unsafe { ffi::xmlSecDSigCtxCreate(manager) };
        if ptr.is_null() {
            return Err(XmlSecError::AllocationFailure(take_last_native_error()));
        }

        Ok(Self {
            handle: Handle::register(ptr as *mut c_void, destroy_dsig_ctx),
        })
    }

    fn with<R>(&self, f: impl FnOnce(ffi::xmlSecDSigCtxPtr) -> R) -> XmlSecResult<R> {
        self.handle.with(|ptr| f(ptr as ffi::xmlSecDSigCtxPtr))
    }
}

/// Signing and verification of XML digital signatures.
///
/// Holds the key to operate with and, optionally, a shared keys manager
/// whose key store and trusted certificates are consulted during
/// verification.
#[derive(Debug)]
pub struct XmlSecSignatureContext {
    key: Option<XmlSecKey>,
    manager: Option<Arc<XmlSecKeyManager>>,
}

impl XmlSecSignatureContext {
    /// Create a context with no keys manager attached.
    pub fn new() -> XmlSecResult<Self> {
        guarantee_xmlsec_init()?;

        Ok(Self {
            key: None,
            manager: None,
        })
    }

    /// Create a context whose operations consult `manager` for keys and
    /// trusted certificates.
    pub fn with_keys_manager(manager: Arc<XmlSecKeyManager>) -> XmlSecResult<Self> {
        guarantee_xmlsec_init()?;

        Ok(Self {
            key: None,
            manager: Some(manager),
        })
    }

    /// Set the key used for signing or verification, returning the
    /// previously inserted key if any.
    pub fn insert_key(&mut self, key: XmlSecKey) -> Option<XmlSecKey> {
        self.key.replace(key)
    }

    /// Remove and return the inserted key.
    pub fn take_key(&mut self) -> Option<XmlSecKey> {
        self.key.take()
    }

    /// Run `f` with the manager's native pointer, holding its handle lock
    /// for the duration so the manager cannot be released mid-operation.
    fn with_manager_ptr<R>(
        &self,
        f: impl FnOnce(ffi::xmlSecKeysMngrPtr) -> XmlSecResult<R>,
    ) -> XmlSecResult<R> {
        match &self.manager {
            Some(manager) => manager.with_raw(f)?,
            None => f(null_mut()),
        }
    }

    /// Sign the document in place.
    ///
    /// The document must already carry a signature template, see
    /// [`XmlSecDocumentTemplating`](crate::XmlSecDocumentTemplating).
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn sign_document(&self, document: &XmlDocument) -> XmlSecResult<()> {
        let key = self.key.as_ref().ok_or(XmlSecError::KeyNotLoaded)?;
        let node = find_node_raw(document, NODE_SIGNATURE, DSIG_NS)?;

        self.with_manager_ptr(|manager| {
            let ctx = DSigCtx::create(manager)?;
            let signing_key = key.duplicate_raw()?;

            // The context owns the duplicate from here on and destroys it
            // together with itself.
            let rc = ctx.with(|ptr| unsafe {
                (*ptr).signKey = signing_key;
                ffi::xmlSecDSigCtxSign(ptr, node)
            })?;

            if rc < 0 {
                return Err(XmlSecError::SignatureFailure(take_last_native_error()));
            }
            Ok(())
        })?;

        tracing::debug!("document signed");
        Ok(())
    }

    /// Verify the signature carried by the document.
    ///
    /// Returns `Ok(())` only when the native library reports the signature
    /// as valid. A document without a signature, an invalid signature and
    /// a failing verification all report
    /// [`XmlSecError::VerificationFailure`]; the operation is never
    /// retried.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn verify_document(&self, document: &XmlDocument) -> XmlSecResult<()> {
        let node = find_node_raw(document, NODE_SIGNATURE, DSIG_NS).map_err(|_| {
            XmlSecError::VerificationFailure("document carries no signature".into())
        })?;

        if self.key.is_none() && self.manager.is_none() {
            return Err(XmlSecError::KeyNotLoaded);
        }

        let status = self.with_manager_ptr(|manager| {
            let ctx = DSigCtx::create(manager)?;

            let verification_key = match &self.key {
                Some(key) => key.duplicate_raw()?,
                None => null_mut(),
            };

            let (rc, status) = ctx.with(|ptr| unsafe {
                if !verification_key.is_null() {
                    (*ptr).signKey = verification_key;
                }
                let rc = ffi::xmlSecDSigCtxVerify(ptr, node);
                (rc, (*ptr).status)
            })?;

            if rc < 0 {
                return Err(XmlSecError::VerificationFailure(take_last_native_error()));
            }
            Ok(status)
        })?;

        match status {
            status if status == ffi::xmlSecDSigStatus_xmlSecDSigStatusSucceeded => {
                tracing::debug!("signature verified");
                Ok(())
            }
            status if status == ffi::xmlSecDSigStatus_xmlSecDSigStatusInvalid => Err(
                XmlSecError::VerificationFailure("signature is invalid".into()),
            ),
            _ => Err(XmlSecError::UnknownDSigStatus),
        }
    }
}
