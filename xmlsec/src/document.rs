//!
//! Wrapper for XML documents
//!
//! Documents themselves are handled by the `libxml` crate; this module adds
//! parsing with the error mapping the rest of the wrapper expects, plus a
//! few extension methods for serialisation and for asking whether a
//! document carries signed or encrypted content.
//!
use std::ffi::CString;
use std::os::raw::c_char;

use libxml::parser::Parser as XmlParser;

pub use libxml::tree::document::Document as XmlDocument;
pub use libxml::tree::node::Node as XmlNode;

use crate::error::{XmlSecError, XmlSecResult};
use crate::xmlsec::guarantee_xmlsec_init;

use xmlsec1_sys as ffi;

pub(crate) const DSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";
pub(crate) const XENC_NS: &str = "http://www.w3.org/2001/04/xmlenc#";

pub(crate) const NODE_SIGNATURE: &str = "Signature";
pub(crate) const NODE_ENCRYPTED_DATA: &str = "EncryptedData";

/// Parse an XML byte buffer into a document.
///
/// Malformed input never yields a partially valid document: any parse
/// error, an input that is not UTF-8, or a document without a root element
/// all fail with [`XmlSecError::ParseFailure`].
pub fn parse_xml(buffer: &[u8]) -> XmlSecResult<XmlDocument> {
    guarantee_xmlsec_init()?;

    let text = std::str::from_utf8(buffer)
        .map_err(|err| XmlSecError::ParseFailure(format!("input is not UTF-8: {}", err)))?;

    let parser = XmlParser::default();
    let document = parser
        .parse_string(text)
        .map_err(|err| XmlSecError::ParseFailure(format!("{:?}", err)))?;

    if document.get_root_element().is_none() {
        return Err(XmlSecError::ParseFailure(
            "document has no root element".into(),
        ));
    }

    Ok(document)
}

/// Find the first descendant with the given name and namespace, starting at
/// the document root. The returned pointer is borrowed from the document.
pub(crate) fn find_node_raw(
    document: &XmlDocument,
    name: &str,
    ns: &str,
) -> XmlSecResult<ffi::xmlNodePtr> {
    let root = unsafe { ffi::xmlDocGetRootElement(document.doc_ptr() as ffi::xmlDocPtr) };
    if root.is_null() {
        return Err(XmlSecError::RootNotFound);
    }

    let cname = CString::new(name)?;
    let cns = CString::new(ns)?;

    let found = unsafe {
        ffi::xmlSecFindNode(
            root,
            cname.as_ptr() as *const ffi::xmlChar,
            cns.as_ptr() as *const ffi::xmlChar,
        )
    };

    if found.is_null() {
        return Err(XmlSecError::NodeNotFound(name.to_owned()));
    }

    Ok(found)
}

/// Extension methods available on every [`XmlDocument`].
pub trait XmlSecDocumentExt {
    /// Serialise the document to UTF-8 XML.
    fn serialize(&self) -> XmlSecResult<String>;

    /// Whether the document carries a `<ds:Signature>` element.
    fn is_signed(&self) -> bool;

    /// Whether the document carries an `<xenc:EncryptedData>` element.
    fn is_encrypted(&self) -> bool;
}

impl XmlSecDocumentExt for XmlDocument {
    fn serialize(&self) -> XmlSecResult<String> {
        let encoding = CString::new("UTF-8")?;

        let buffer = unsafe { ffi::xmlBufferCreate() };
        if buffer.is_null() {
            return Err(XmlSecError::AllocationFailure(
                "failed to allocate serialisation buffer".into(),
            ));
        }

        // The buffer outlives the save context and collects its output.
        let rendered = unsafe {
            let save = ffi::xmlSaveToBuffer(buffer, encoding.as_ptr() as *const c_char, 0);
            if save.is_null() {
                ffi::xmlBufferFree(buffer);
                return Err(XmlSecError::AllocationFailure(
                    "failed to allocate save context".into(),
                ));
            }

            let dumped = ffi::xmlSaveDoc(save, self.doc_ptr() as ffi::xmlDocPtr);
            let closed = ffi::xmlSaveClose(save);
            if dumped < 0 || closed < 0 {
                ffi::xmlBufferFree(buffer);
                return Err(XmlSecError::AllocationFailure(
                    "failed to serialise document".into(),
                ));
            }

            let content = ffi::xmlBufferContent(buffer);
            let length = ffi::xmlBufferLength(buffer);
            if content.is_null() || length < 0 {
                ffi::xmlBufferFree(buffer);
                return Err(XmlSecError::AllocationFailure(
                    "serialisation produced no output".into(),
                ));
            }

            let rendered =
                std::slice::from_raw_parts(content as *const u8, length as usize).to_vec();
            ffi::xmlBufferFree(buffer);
            rendered
        };

        String::from_utf8(rendered).map_err(|err| XmlSecError::InvalidUtf8(err.utf8_error()))
    }

    fn is_signed(&self) -> bool {
        find_node_raw(self, NODE_SIGNATURE, DSIG_NS).is_ok()
    }

    fn is_encrypted(&self) -> bool {
        find_node_raw(self, NODE_ENCRYPTED_DATA, XENC_NS).is_ok()
    }
}
