//!
//! XmlSec Encryption Context
//!
use std::ffi::CString;
use std::os::raw::c_void;
use std::ptr::{null, null_mut};
use std::sync::Arc;

use crate::document::{find_node_raw, XmlDocument, XmlNode, NODE_ENCRYPTED_DATA, XENC_NS};
use crate::error::{take_last_native_error, XmlSecError, XmlSecResult};
use crate::keymngr::XmlSecKeyManager;
use crate::keys::XmlSecKey;
use crate::registry::Handle;
use crate::templates::NodeGuard;
use crate::xmlsec::guarantee_xmlsec_init;

use xmlsec1_sys as ffi;

const XENC_TYPE_ELEMENT: &str = "http://www.w3.org/2001/04/xmlenc#Element";

/// Data-encryption algorithms for `<xenc:EncryptedData>`.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XmlSecEncryptionMethod {
    Aes128Cbc,
    Aes192Cbc,
    Aes256Cbc,
    Aes128Gcm,
    Aes192Gcm,
    Aes256Gcm,
    Des3Cbc,
}

impl XmlSecEncryptionMethod {
    fn to_method(self) -> ffi::xmlSecTransformId {
        unsafe {
            match self {
                Self::Aes128Cbc => ffi::xmlSecOpenSSLTransformAes128CbcGetKlass(),
                Self::Aes192Cbc => ffi::xmlSecOpenSSLTransformAes192CbcGetKlass(),
                Self::Aes256Cbc => ffi::xmlSecOpenSSLTransformAes256CbcGetKlass(),
                Self::Aes128Gcm => ffi::xmlSecOpenSSLTransformAes128GcmGetKlass(),
                Self::Aes192Gcm => ffi::xmlSecOpenSSLTransformAes192GcmGetKlass(),
                Self::Aes256Gcm => ffi::xmlSecOpenSSLTransformAes256GcmGetKlass(),
                Self::Des3Cbc => ffi::xmlSecOpenSSLTransformDes3CbcGetKlass(),
            }
        }
    }
}

/// Key-transport algorithms for `<xenc:EncryptedKey>`.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XmlSecKeyTransportMethod {
    RsaPkcs1,
    RsaOaep,
}

impl XmlSecKeyTransportMethod {
    fn to_method(self) -> ffi::xmlSecTransformId {
        unsafe {
            match self {
                Self::RsaPkcs1 => ffi::xmlSecOpenSSLTransformRsaPkcs1GetKlass(),
                Self::RsaOaep => ffi::xmlSecOpenSSLTransformRsaOaepGetKlass(),
            }
        }
    }
}

/// Describes the `<xenc:EncryptedData>` structure built for an encryption
/// call: the data-encryption method, an optional `<KeyName>` hint, and an
/// optional wrapped session key.
#[derive(Clone, Debug)]
pub struct XmlSecEncryptionTemplate {
    method: XmlSecEncryptionMethod,
    key_name: Option<String>,
    transport: Option<(XmlSecKeyTransportMethod, Option<String>)>,
}

impl XmlSecEncryptionTemplate {
    /// Template encrypting data with `method`.
    pub fn new(method: XmlSecEncryptionMethod) -> Self {
        Self {
            method,
            key_name: None,
            transport: None,
        }
    }

    /// Record the data key's name in the template `<KeyInfo>`.
    pub fn key_name(mut self, name: &str) -> Self {
        self.key_name = Some(name.to_owned());
        self
    }

    /// Embed an `<xenc:EncryptedKey>` wrapping the session key with
    /// `method`. `recipient_key` names the asymmetric key the keys manager
    /// should wrap for.
    pub fn encrypted_key(
        mut self,
        method: XmlSecKeyTransportMethod,
        recipient_key: Option<&str>,
    ) -> Self {
        self.transport = Some((method, recipient_key.map(str::to_owned)));
        self
    }
}

unsafe fn destroy_enc_ctx(ptr: *mut c_void) {
    ffi::xmlSecEncCtxDestroy(ptr as ffi::xmlSecEncCtxPtr);
}

/// Native encryption context scoped to a single operation, mirroring the
/// per-operation lifecycle of the signature context.
struct EncCtx {
    handle: Handle,
}

impl EncCtx {
    fn create(manager: ffi::xmlSecKeysMngrPtr) -> XmlSecResult<Self> {
        let ptr = unsafe { ffi::xmlSecEncCtxCreate(manager) };
        if ptr.is_null() {
            return Err(XmlSecError::AllocationFailure(take_last_native_error()));
        }

        Ok(Self {
            handle: Handle::register(ptr as *mut c_void, destroy_enc_ctx),
        })
    }

    fn with<R>(&self, f: impl FnOnce(ffi::xmlSecEncCtxPtr) -> R) -> XmlSecResult<R> {
        self.handle.with(|ptr| f(ptr as ffi::xmlSecEncCtxPtr))
    }
}

/// Encryption and decryption of XML content.
///
/// Holds the data (or session) key and, optionally, a shared keys manager
/// used to resolve asymmetric keys for `<xenc:EncryptedKey>` processing.
#[derive(Debug)]
pub struct XmlSecEncryptionContext {
    key: Option<XmlSecKey>,
    manager: Option<Arc<XmlSecKeyManager>>,
}

impl XmlSecEncryptionContext {
    /// Create a context with no keys manager attached.
    pub fn new() -> XmlSecResult<Self> {
        guarantee_xmlsec_init()?;

        Ok(Self {
            key: None,
            manager: None,
        })
    }

    /// Create a context whose operations consult `manager` for keys.
    pub fn with_keys_manager(manager: Arc<XmlSecKeyManager>) -> XmlSecResult<Self> {
        guarantee_xmlsec_init()?;

        Ok(Self {
            key: None,
            manager: Some(manager),
        })
    }

    /// Set the data (or session) key, returning the previously inserted
    /// key if any.
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

    /// Encrypt `node` in place, replacing it with `<xenc:EncryptedData>`.
    ///
    /// After a successful call the passed node has been replaced inside
    /// the document and must not be used further.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn encrypt_node(
        &self,
        document: &XmlDocument,
        node: &XmlNode,
        template: &XmlSecEncryptionTemplate,
    ) -> XmlSecResult<()> {
        self.encrypt_raw(document, node.node_ptr() as ffi::xmlNodePtr, template)
    }

    /// Encrypt the document's root element.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn encrypt_document(
        &self,
        document: &XmlDocument,
        template: &XmlSecEncryptionTemplate,
    ) -> XmlSecResult<()> {
        let root =
            unsafe { ffi::xmlDocGetRootElement(document.doc_ptr() as ffi::xmlDocPtr) };
        if root.is_null() {
            return Err(XmlSecError::RootNotFound);
        }

        self.encrypt_raw(document, root, template)
    }

    fn encrypt_raw(
        &self,
        document: &XmlDocument,
        target: ffi::xmlNodePtr,
        template: &XmlSecEncryptionTemplate,
    ) -> XmlSecResult<()> {
        guarantee_xmlsec_init()?;

        if self.key.is_none() && self.manager.is_none() {
            return Err(XmlSecError::KeyNotLoaded);
        }

        let docptr = document.doc_ptr() as ffi::xmlDocPtr;

        let type_uri = CString::new(XENC_TYPE_ELEMENT)?;
        let enc_data = unsafe {
            ffi::xmlSecTmplEncDataCreate(
                docptr,
                template.method.to_method(),
                null(),
                type_uri.as_ptr() as *const ffi::xmlChar,
                null(),
                null(),
            )
        };
        if enc_data.is_null() {
            return Err(XmlSecError::TemplateFailure(take_last_native_error()));
        }

        // Ours to free until the encrypt call consumes it into the document.
        let guard = NodeGuard::new(enc_data);

        if unsafe { ffi::xmlSecTmplEncDataEnsureCipherValue(enc_data) }.is_null() {
            return Err(XmlSecError::TemplateFailure(take_last_native_error()));
        }

        if template.key_name.is_some() || template.transport.is_some() {
            let keyinfo = unsafe { ffi::xmlSecTmplEncDataEnsureKeyInfo(enc_data, null()) };
            if keyinfo.is_null() {
                return Err(XmlSecError::TemplateFailure(take_last_native_error()));
            }

            if let Some(name) = &template.key_name {
                let cname = CString::new(name.as_str())?;
                let added = unsafe {
                    ffi::xmlSecTmplKeyInfoAddKeyName(
                        keyinfo,
                        cname.as_ptr() as *const ffi::xmlChar,
                    )
                };
                if added.is_null() {
                    return Err(XmlSecError::TemplateFailure(take_last_native_error()));
                }
            }

            if let Some((method, recipient)) = &template.transport {
                let enc_key = unsafe {
                    ffi::xmlSecTmplKeyInfoAddEncryptedKey(
                        keyinfo,
                        method.to_method(),
                        null(),
                        null(),
                        null(),
                    )
                };
                if enc_key.is_null() {
                    return Err(XmlSecError::TemplateFailure(take_last_native_error()));
                }

                if unsafe { ffi::xmlSecTmplEncDataEnsureCipherValue(enc_key) }.is_null() {
                    return Err(XmlSecError::TemplateFailure(take_last_native_error()));
                }

                if let Some(name) = recipient {
                    let transport_keyinfo =
                        unsafe { ffi::xmlSecTmplEncDataEnsureKeyInfo(enc_key, null()) };
                    if transport_keyinfo.is_null() {
                        return Err(XmlSecError::TemplateFailure(take_last_native_error()));
                    }

                    let cname = CString::new(name.as_str())?;
                    let added = unsafe {
                        ffi::xmlSecTmplKeyInfoAddKeyName(
                            transport_keyinfo,
                            cname.as_ptr() as *const ffi::xmlChar,
                        )
                    };
                    if added.is_null() {
                        return Err(XmlSecError::TemplateFailure(take_last_native_error()));
                    }
                }
            }
        }

        self.with_manager_ptr(|manager| {
            let ctx = EncCtx::create(manager)?;

            if let Some(key) = &self.key {
                let data_key = key.duplicate_raw()?;
                // The context owns the duplicate and destroys it with itself.
                ctx.with(|ptr| unsafe { (*ptr).encKey = data_key })?;
            }

            let rc =
                ctx.with(|ptr| unsafe { ffi::xmlSecEncCtxXmlEncrypt(ptr, enc_data, target) })?;

            if rc < 0 {
                return Err(XmlSecError::EncryptionFailure(take_last_native_error()));
            }

            // The template node replaced the target inside the document.
            guard.disarm();
            Ok(())
        })?;

        tracing::debug!("node encrypted");
        Ok(())
    }

    /// Find the first `<xenc:EncryptedData>` element and decrypt it in
    /// place, restoring the original content.
    ///
    /// A wrong key or corrupt ciphertext reports
    /// [`XmlSecError::DecryptionFailure`]; decrypted bytes that do not
    /// form XML content are reported the same way rather than spliced into
    /// the document.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn decrypt_document(&self, document: &XmlDocument) -> XmlSecResult<()> {
        let node = find_node_raw(document, NODE_ENCRYPTED_DATA, XENC_NS).map_err(|_| {
            XmlSecError::DecryptionFailure("document carries no encrypted data".into())
        })?;

        if self.key.is_none() && self.manager.is_none() {
            return Err(XmlSecError::KeyNotLoaded);
        }

        self.with_manager_ptr(|manager| {
            let ctx = EncCtx::create(manager)?;

            if let Some(key) = &self.key {
                let data_key = key.duplicate_raw()?;
                ctx.with(|ptr| unsafe { (*ptr).encKey = data_key })?;
            }

            let (rc, replaced) = ctx.with(|ptr| unsafe {
                let rc = ffi::xmlSecEncCtxDecrypt(ptr, node);
                (rc, (*ptr).resultReplaced)
            })?;

            if rc < 0 {
                return Err(XmlSecError::DecryptionFailure(take_last_native_error()));
            }

            if replaced == 0 {
                return Err(XmlSecError::DecryptionFailure(
                    "decrypted content is not XML".into(),
                ));
            }
            Ok(())
        })?;

        tracing::debug!("document decrypted");
        Ok(())
    }
}
