//!
//! Rust bindings to the xmlsec1 XML security library
//!
//! This crate wraps the native xmlsec1 library (OpenSSL backend) for XML
//! digital signatures and XML encryption per the W3C XML-DSig and XML-Enc
//! standards. The cryptography and canonicalization all happen inside the
//! native library; this crate owns the handle lifecycles, serializes
//! access to each native handle, and maps native failure sentinels into
//! [`XmlSecError`] values carrying the library's diagnostics.
//!
//! Signing a document looks like this:
//!
//! ```no_run
//! use xmlsec::{parse_xml, XmlSecDocumentExt, XmlSecDocumentTemplating};
//! use xmlsec::{XmlSecKey, XmlSecKeyFormat, XmlSecSignatureContext, XmlSecSignatureMethod};
//!
//! # fn main() -> xmlsec::XmlSecResult<()> {
//! let document = parse_xml(&std::fs::read("doc.xml")?)?;
//! document
//!     .template()
//!     .signature(XmlSecSignatureMethod::RsaSha256)
//!     .done()?;
//!
//! let key = XmlSecKey::from_file("key.pem", XmlSecKeyFormat::Pem, None)?;
//!
//! let mut context = XmlSecSignatureContext::new()?;
//! context.insert_key(key);
//! context.sign_document(&document)?;
//!
//! println!("{}", document.serialize()?);
//! # Ok(())
//! # }
//! ```
//!
#![warn(missing_docs)]

mod document;
mod dsig;
mod enc;
mod error;
mod keymngr;
mod keys;
mod registry;
mod templates;
mod xmlsec;

pub use self::document::parse_xml;
pub use self::document::XmlSecDocumentExt;
pub use self::document::{XmlDocument, XmlNode};

pub use self::error::{XmlSecError, XmlSecResult};

pub use self::keys::{XmlSecKey, XmlSecKeyDataKind, XmlSecKeyFormat};

pub use self::keymngr::XmlSecKeyManager;

pub use self::templates::XmlSecDocumentTemplating;
pub use self::templates::XmlSecTemplateBuilder;
pub use self::templates::{
    XmlSecCanonicalizationMethod, XmlSecDigestMethod, XmlSecSignatureMethod,
};

pub use self::dsig::XmlSecSignatureContext;

pub use self::enc::{
    XmlSecEncryptionContext, XmlSecEncryptionMethod, XmlSecEncryptionTemplate,
    XmlSecKeyTransportMethod,
};

pub use self::xmlsec::{guarantee_xmlsec_init, shutdown_xmlsec};

pub use libxml::parser::Parser as XmlParser;
