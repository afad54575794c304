//!
//! XmlSec High Level Error handling
//!
use std::cell::RefCell;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int};

use thiserror::Error;

/// Wrapper project-wide Result typealias.
pub type XmlSecResult<T> = Result<T, XmlSecError>;

/// Wrapper project-wide Errors enumeration.
///
/// Failures originating in the native library carry its diagnostic string
/// verbatim, as captured by the error callback installed at init.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum XmlSecError {
    #[error("xmlsec failed initialization: {0}")]
    InitFailure(String),
    #[error("loaded xmlsec1 library is not ABI compatible with the headers the bindings were generated from")]
    VersionMismatch,

    #[error("native allocation failed: {0}")]
    AllocationFailure(String),
    #[error("failed to parse XML document: {0}")]
    ParseFailure(String),
    #[error("failed to load key material: {0}")]
    KeyLoadFailure(String),
    #[error("failed to sign document: {0}")]
    SignatureFailure(String),
    #[error("signature verification failed: {0}")]
    VerificationFailure(String),
    #[error("encryption failed: {0}")]
    EncryptionFailure(String),
    #[error("decryption failed: {0}")]
    DecryptionFailure(String),
    #[error("native handle used after release")]
    UseAfterRelease,

    #[error("key has not yet been loaded and is required")]
    KeyNotLoaded,
    #[error("failed to find document root")]
    RootNotFound,
    #[error("failed to find node {0}")]
    NodeNotFound(String),
    #[error("failed to build template: {0}")]
    TemplateFailure(String),
    #[error("failed to interpret xmlSecDSigStatus code")]
    UnknownDSigStatus,

    #[error("text is not valid UTF8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("string contains an interior NUL byte: {0}")]
    CString(#[from] std::ffi::NulError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

thread_local! {
    /// Most recent error report from the native library on this thread.
    /// Native calls are synchronous, so the report a failing call leaves
    /// behind is still current when the call site reads the sentinel.
    static LAST_NATIVE_ERROR: RefCell<Option<String>> = RefCell::new(None);
}

/// Error callback handed to `xmlSecErrorsSetCallback` at init. Records the
/// report in a thread-local slot so call sites can attach it to the error
/// they return.
pub(crate) unsafe extern "C" fn capture_native_error(
    file: *const c_char,
    line: c_int,
    _func: *const c_char,
    error_object: *const c_char,
    error_subject: *const c_char,
    reason: c_int,
    msg: *const c_char,
) {
    let text = |ptr: *const c_char| {
        if ptr.is_null() {
            None
        } else {
            Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
        }
    };

    let mut report = String::new();
    if let Some(object) = text(error_object) {
        report.push_str(&object);
    }
    if let Some(subject) = text(error_subject) {
        if !report.is_empty() {
            report.push(':');
        }
        report.push_str(&subject);
    }
    if let Some(msg) = text(msg).filter(|m| !m.is_empty()) {
        if !report.is_empty() {
            report.push_str(": ");
        }
        report.push_str(&msg);
    }
    if report.is_empty() {
        report = format!("error {}", reason);
    }
    if let Some(file) = text(file) {
        report.push_str(&format!(" ({}:{})", file, line));
    }

    tracing::debug!(target: "xmlsec", "native error report: {}", report);

    LAST_NATIVE_ERROR.with(|slot| *slot.borrow_mut() = Some(report));
}

/// Drain the last native error report for this thread. Used by call sites
/// right after a native call returned a failure sentinel.
pub(crate) fn take_last_native_error() -> String {
    LAST_NATIVE_ERROR
        .with(|slot| slot.borrow_mut().take())
        .unwrap_or_else(|| "the native library reported no detail".to_owned())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::ffi::CString;
    use std::ptr::null;

    #[test]
    fn captured_report_is_drained_once() {
        let msg = CString::new("something broke").unwrap();
        let object = CString::new("xmlSecOpenSSLEvpSignatureExecute").unwrap();
        unsafe {
            capture_native_error(null(), 0, null(), object.as_ptr(), null(), 1, msg.as_ptr());
        }

        let report = take_last_native_error();
        assert!(report.contains("something broke"));
        assert!(report.contains("xmlSecOpenSSLEvpSignatureExecute"));

        // A second drain only has the fallback text left.
        assert!(take_last_native_error().contains("no detail"));
    }

    #[test]
    fn empty_report_falls_back_to_reason_code() {
        unsafe {
            capture_native_error(null(), 0, null(), null(), null(), 42, null());
        }
        assert!(take_last_native_error().contains("42"));
    }
}
