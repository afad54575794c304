//!
//! Central XmlSec1 Context
//!
use crate::error::{capture_native_error, XmlSecError, XmlSecResult};

use lazy_static::lazy_static;

use std::ptr::null;

use std::sync::Mutex;

use xmlsec1_sys as ffi;

lazy_static! {
    static ref XMLSEC: Mutex<Option<XmlSecContext>> = Mutex::new(None);
}

/// Guarantees the global xmlsec state has been initialized. Safe to call
/// any number of times; only the first call does work.
pub fn guarantee_xmlsec_init() -> XmlSecResult<()> {
    let mut inner = XMLSEC
        .lock()
        .expect("Unable to lock global xmlsec initialization wrapper");

    if inner.is_none() {
        *inner = Some(XmlSecContext::new()?);
    }

    Ok(())
}

/// Tears the global xmlsec state down again. Shutting down without a prior
/// init, or twice in a row, is a no-op.
pub fn shutdown_xmlsec() {
    let mut inner = XMLSEC
        .lock()
        .expect("Unable to lock global xmlsec initialization wrapper");

    // Dropping the context runs the native cleanup in reverse init order.
    inner.take();
}

/// XmlSec Global Context
///
/// This object initializes the underlying xmlsec global state and cleans it
/// up once gone out of scope. It is requested by all objects in the library
/// that require the context to be initialized.
struct XmlSecContext {}

impl XmlSecContext {
    /// Runs xmlsec initialization and returns instance of itself.
    fn new() -> XmlSecResult<Self> {
        init_libxml();
        check_version()?;
        init_xmlsec()?;
        init_crypto_app()?;
        init_crypto()?;
        install_error_callback();

        Ok(Self {})
    }
}

impl Drop for XmlSecContext {
    fn drop(&mut self) {
        cleanup_crypto();
        cleanup_crypto_app();
        cleanup_xmlsec();
    }
}

/// libxml2 must be initialized before the xmlsec core.
fn init_libxml() {
    unsafe { ffi::xmlInitParser() };
}

/// The bindings were generated from a specific set of headers; refuse to
/// run against a loaded library that is not ABI compatible with them.
fn check_version() -> XmlSecResult<()> {
    let rc = unsafe {
        ffi::xmlSecCheckVersionExt(
            ffi::XMLSEC_VERSION_MAJOR as _,
            ffi::XMLSEC_VERSION_MINOR as _,
            ffi::XMLSEC_VERSION_SUBMINOR as _,
            ffi::xmlSecCheckVersionMode_xmlSecCheckVersionABICompatible,
        )
    };

    if rc != 1 {
        return Err(XmlSecError::VersionMismatch);
    }
    Ok(())
}

/// Init xmlsec library
fn init_xmlsec() -> XmlSecResult<()> {
    let rc = unsafe { ffi::xmlSecInit() };

    if rc < 0 {
        return Err(XmlSecError::InitFailure("xmlSecInit failed".into()));
    }
    Ok(())
}

/// Load the OpenSSL crypto engine application layer.
fn init_crypto_app() -> XmlSecResult<()> {
    let rc = unsafe { ffi::xmlSecOpenSSLAppInit(null()) };

    if rc < 0 {
        return Err(XmlSecError::InitFailure(
            "XmlSec failed to init OpenSSL application layer".into(),
        ));
    }

    Ok(())
}

/// Init xmlsec-crypto library
fn init_crypto() -> XmlSecResult<()> {
    let rc = unsafe { ffi::xmlSecOpenSSLInit() };

    if rc < 0 {
        return Err(XmlSecError::InitFailure(
            "XmlSec failed while loading the OpenSSL crypto backend. Make \
             sure that you have it installed and check shared libraries path"
                .into(),
        ));
    }

    Ok(())
}

/// Route native error reports into the thread-local capture slot so call
/// sites can attach them to returned errors.
fn install_error_callback() {
    unsafe { ffi::xmlSecErrorsSetCallback(Some(capture_native_error)) };
}

/// Shutdown xmlsec-crypto library
fn cleanup_crypto() {
    unsafe { ffi::xmlSecOpenSSLShutdown() };
}

/// Shutdown crypto library
fn cleanup_crypto_app() {
    unsafe { ffi::xmlSecOpenSSLAppShutdown() };
}

/// Shutdown xmlsec library
fn cleanup_xmlsec() {
    unsafe { ffi::xmlSecShutdown() };
}
