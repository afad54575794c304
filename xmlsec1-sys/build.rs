use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=wrapper.h");

    // xmlsec1-openssl pulls in the flags for xmlsec1 core, libxml2 and the
    // OpenSSL backend in one go. 1.2.27 is the oldest release carrying every
    // transform the wrapper exposes (AES-GCM arrived there).
    let library = pkg_config::Config::new()
        .atleast_version("1.2.27")
        .probe("xmlsec1-openssl")
        .expect(
            "pkg-config could not find xmlsec1-openssl. Install the xmlsec1 \
             development package (e.g. libxmlsec1-dev) and make sure \
             pkg-config can see it.",
        );

    let mut clang_args = Vec::new();
    for path in &library.include_paths {
        clang_args.push(format!("-I{}", path.display()));
    }
    for (name, value) in &library.defines {
        match value {
            Some(value) => clang_args.push(format!("-D{}={}", name, value)),
            None => clang_args.push(format!("-D{}", name)),
        }
    }

    let bindings = bindgen::Builder::default()
        .header("wrapper.h")
        .clang_args(&clang_args)
        // The xmlsec API surface proper.
        .allowlist_function("xmlSec.*")
        .allowlist_type("xmlSec.*")
        .allowlist_var("xmlSec.*")
        .allowlist_var("XMLSEC.*")
        // The slice of libxml2 the wrapper needs for tree surgery and
        // serialisation. Document parsing itself goes through the libxml
        // crate.
        .allowlist_function("xmlInitParser")
        .allowlist_function("xmlAddChild")
        .allowlist_function("xmlDocGetRootElement")
        .allowlist_function("xmlFreeNode")
        .allowlist_function("xmlBufferCreate")
        .allowlist_function("xmlBufferFree")
        .allowlist_function("xmlBufferContent")
        .allowlist_function("xmlBufferLength")
        .allowlist_function("xmlSaveToBuffer")
        .allowlist_function("xmlSaveDoc")
        .allowlist_function("xmlSaveClose")
        .parse_callbacks(Box::new(bindgen::CargoCallbacks::new()))
        .generate()
        .expect("failed to generate xmlsec1 bindings");

    let out_path = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set"));
    bindings
        .write_to_file(out_path.join("bindings.rs"))
        .expect("failed to write xmlsec1 bindings");
}
