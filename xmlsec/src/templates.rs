//!
//! XmlSec Signature Template Builder
//!
//! Signing requires the document to carry a `<ds:Signature>` template
//! describing the canonicalization, signature and digest methods; the
//! builder here materialises one under the document root with an enveloped
//! signature transform.
//!
use std::cell::Cell;
use std::ffi::CString;
use std::ptr::null;

use crate::document::XmlDocument;
use crate::error::{take_last_native_error, XmlSecError, XmlSecResult};
use crate::xmlsec::guarantee_xmlsec_init;

use xmlsec1_sys as ffi;

/// Canonicalization methods for `<SignedInfo>`.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XmlSecCanonicalizationMethod {
    InclusiveC14N,
    InclusiveC14NWithComments,
    ExclusiveC14N,
    ExclusiveC14NWithComments,
}

impl XmlSecCanonicalizationMethod {
    pub(crate) fn to_method(self) -> ffi::xmlSecTransformId {
        unsafe {
            match self {
                Self::InclusiveC14N => ffi::xmlSecTransformInclC14NGetKlass(),
                Self::InclusiveC14NWithComments => {
                    ffi::xmlSecTransformInclC14NWithCommentsGetKlass()
                }
                Self::ExclusiveC14N => ffi::xmlSecTransformExclC14NGetKlass(),
                Self::ExclusiveC14NWithComments => {
                    ffi::xmlSecTransformExclC14NWithCommentsGetKlass()
                }
            }
        }
    }
}

/// Signature methods supported by the OpenSSL backend.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XmlSecSignatureMethod {
    RsaSha1,
    RsaSha256,
    RsaSha384,
    RsaSha512,
    EcdsaSha256,
    EcdsaSha384,
    EcdsaSha512,
    HmacSha256,
    HmacSha512,
}

impl XmlSecSignatureMethod {
    pub(crate) fn to_method(self) -> ffi::xmlSecTransformId {
        unsafe {
            match self {
                Self::RsaSha1 => ffi::xmlSecOpenSSLTransformRsaSha1GetKlass(),
                Self::RsaSha256 => ffi::xmlSecOpenSSLTransformRsaSha256GetKlass(),
                Self::RsaSha384 => ffi::xmlSecOpenSSLTransformRsaSha384GetKlass(),
                Self::RsaSha512 => ffi::xmlSecOpenSSLTransformRsaSha512GetKlass(),
                Self::EcdsaSha256 => ffi::xmlSecOpenSSLTransformEcdsaSha256GetKlass(),
                Self::EcdsaSha384 => ffi::xmlSecOpenSSLTransformEcdsaSha384GetKlass(),
                Self::EcdsaSha512 => ffi::xmlSecOpenSSLTransformEcdsaSha512GetKlass(),
                Self::HmacSha256 => ffi::xmlSecOpenSSLTransformHmacSha256GetKlass(),
                Self::HmacSha512 => ffi::xmlSecOpenSSLTransformHmacSha512GetKlass(),
            }
        }
    }
}

/// Digest methods for signature references.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XmlSecDigestMethod {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl XmlSecDigestMethod {
    pub(crate) fn to_method(self) -> ffi::xmlSecTransformId {
        unsafe {
            match self {
                Self::Sha1 => ffi::xmlSecOpenSSLTransformSha1GetKlass(),
                Self::Sha256 => ffi::xmlSecOpenSSLTransformSha256GetKlass(),
                Self::Sha384 => ffi::xmlSecOpenSSLTransformSha384GetKlass(),
                Self::Sha512 => ffi::xmlSecOpenSSLTransformSha512GetKlass(),
            }
        }
    }
}

/// Frees an unlinked template node unless disarmed. Once a template has
/// been attached to the document the document owns it.
pub(crate) struct NodeGuard {
    node: ffi::xmlNodePtr,
    armed: Cell<bool>,
}

impl NodeGuard {
    pub(crate) fn new(node: ffi::xmlNodePtr) -> Self {
        Self {
            node,
            armed: Cell::new(true),
        }
    }

    pub(crate) fn disarm(&self) {
        self.armed.set(false);
    }
}

impl Drop for NodeGuard {
    fn drop(&mut self) {
        if self.armed.get() {
            unsafe { ffi::xmlFreeNode(self.node) };
        }
    }
}

/// Builds an enveloped `<ds:Signature>` template on a document.
///
/// Obtained through [`XmlSecDocumentTemplating::template`].
pub struct XmlSecTemplateBuilder<'d> {
    document: &'d XmlDocument,
    canonicalization: XmlSecCanonicalizationMethod,
    signature: XmlSecSignatureMethod,
    digest: XmlSecDigestMethod,
    uri: Option<String>,
    keyname: bool,
    keyvalue: bool,
    x509data: bool,
}

/// Extension trait hanging the template builder off [`XmlDocument`].
pub trait XmlSecDocumentTemplating {
    /// Start building a signature template over this document.
    fn template(&self) -> XmlSecTemplateBuilder;
}

impl XmlSecDocumentTemplating for XmlDocument {
    fn template(&self) -> XmlSecTemplateBuilder {
        XmlSecTemplateBuilder::new(self)
    }
}

impl<'d> XmlSecTemplateBuilder<'d> {
    fn new(document: &'d XmlDocument) -> Self {
        Self {
            document,
            canonicalization: XmlSecCanonicalizationMethod::ExclusiveC14N,
            signature: XmlSecSignatureMethod::RsaSha256,
            digest: XmlSecDigestMethod::Sha256,
            uri: None,
            keyname: false,
            keyvalue: false,
            x509data: false,
        }
    }

    /// Canonicalization method, `ExclusiveC14N` if not called.
    pub fn canonicalization(mut self, method: XmlSecCanonicalizationMethod) -> Self {
        self.canonicalization = method;
        self
    }

    /// Signature method, `RsaSha256` if not called.
    pub fn signature(mut self, method: XmlSecSignatureMethod) -> Self {
        self.signature = method;
        self
    }

    /// Reference digest method, `Sha256` if not called.
    pub fn digest(mut self, method: XmlSecDigestMethod) -> Self {
        self.digest = method;
        self
    }

    /// Reference URI. When not called the reference covers the whole
    /// document.
    pub fn uri(mut self, uri: &str) -> Self {
        self.uri = Some(uri.to_owned());
        self
    }

    /// Include a `<KeyName>` hint in `<KeyInfo>`.
    pub fn keyname(mut self, value: bool) -> Self {
        self.keyname = value;
        self
    }

    /// Include the public `<KeyValue>` in `<KeyInfo>`.
    pub fn keyvalue(mut self, value: bool) -> Self {
        self.keyvalue = value;
        self
    }

    /// Include an `<X509Data>` element in `<KeyInfo>`.
    pub fn x509data(mut self, value: bool) -> Self {
        self.x509data = value;
        self
    }

    /// Materialise the template under the document root.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn done(self) -> XmlSecResult<()> {
        guarantee_xmlsec_init()?;

        let docptr = self.document.doc_ptr() as ffi::xmlDocPtr;

        let root = unsafe { ffi::xmlDocGetRootElement(docptr) };
        if root.is_null() {
            return Err(XmlSecError::RootNotFound);
        }

        let signature = unsafe {
            ffi::xmlSecTmplSignatureCreate(
                docptr,
                self.canonicalization.to_method(),
                self.signature.to_method(),
                null(),
            )
        };
        if signature.is_null() {
            return Err(XmlSecError::TemplateFailure(take_last_native_error()));
        }

        // Until the template is linked under the root it is ours to free.
        let guard = NodeGuard::new(signature);

        let curi = self.uri.map(CString::new).transpose()?;
        let uri_ptr = curi
            .as_ref()
            .map_or(null(), |uri| uri.as_ptr() as *const ffi::xmlChar);

        let reference = unsafe {
            ffi::xmlSecTmplSignatureAddReference(
                signature,
                self.digest.to_method(),
                null(),
                uri_ptr,
                null(),
            )
        };
        if reference.is_null() {
            return Err(XmlSecError::TemplateFailure(take_last_native_error()));
        }

        let transform = unsafe {
            ffi::xmlSecTmplReferenceAddTransform(reference, ffi::xmlSecTransformEnvelopedGetKlass())
        };
        if transform.is_null() {
            return Err(XmlSecError::TemplateFailure(take_last_native_error()));
        }

        if self.keyname || self.keyvalue || self.x509data {
            let keyinfo = unsafe { ffi::xmlSecTmplSignatureEnsureKeyInfo(signature, null()) };
            if keyinfo.is_null() {
                return Err(XmlSecError::TemplateFailure(take_last_native_error()));
            }

            if self.keyname
                && unsafe { ffi::xmlSecTmplKeyInfoAddKeyName(keyinfo, null()) }.is_null()
            {
                return Err(XmlSecError::TemplateFailure(take_last_native_error()));
            }

            if self.keyvalue && unsafe { ffi::xmlSecTmplKeyInfoAddKeyValue(keyinfo) }.is_null() {
                return Err(XmlSecError::TemplateFailure(take_last_native_error()));
            }

            if self.x509data && unsafe { ffi::xmlSecTmplKeyInfoAddX509Data(keyinfo) }.is_null() {
                return Err(XmlSecError::TemplateFailure(take_last_native_error()));
            }
        }

        let linked = unsafe { ffi::xmlAddChild(root, signature) };
        if linked.is_null() {
            return Err(XmlSecError::TemplateFailure(
                "failed to attach signature template to document root".into(),
            ));
        }
        guard.disarm();

        tracing::debug!("signature template attached to document root");
        Ok(())
    }
}
