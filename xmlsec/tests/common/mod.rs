#![allow(dead_code)]

use once_cell::sync::Lazy;
use openssl::rsa::Rsa;

pub const SAMPLE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Envelope xmlns="urn:envelope">
  <Data>Hello, World!</Data>
</Envelope>
"#;

static TRACING: Lazy<()> = Lazy::new(|| {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "xmlsec=debug".to_owned());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
});

/// Install the test tracing subscriber once per test binary.
pub fn setup() {
    Lazy::force(&TRACING);
}

/// Generate a fresh RSA key pair, returning (private PEM, public PEM).
pub fn rsa_keypair_pems() -> (Vec<u8>, Vec<u8>) {
    let rsa = Rsa::generate(2048).expect("failed to generate RSA key");
    let private_pem = rsa
        .private_key_to_pem()
        .expect("failed to encode private key as PEM");
    let public_pem = rsa
        .public_key_to_pem()
        .expect("failed to encode public key as PEM");
    (private_pem, public_pem)
}
