mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;

use xmlsec::{
    parse_xml, XmlSecDocumentExt, XmlSecEncryptionContext, XmlSecEncryptionMethod,
    XmlSecEncryptionTemplate, XmlSecError, XmlSecKey, XmlSecKeyDataKind, XmlSecKeyFormat,
    XmlSecKeyManager, XmlSecKeyTransportMethod,
};

#[test]
fn encrypt_then_decrypt_reproduces_document() {
    common::setup();

    let document = parse_xml(common::SAMPLE_XML.as_bytes()).expect("failed to parse sample");
    let original = document.serialize().expect("failed to serialize original");

    let key =
        XmlSecKey::generate(XmlSecKeyDataKind::Aes, 256).expect("failed to generate AES key");

    let mut context = XmlSecEncryptionContext::new().expect("failed to create context");
    context.insert_key(key);

    let template = XmlSecEncryptionTemplate::new(XmlSecEncryptionMethod::Aes256Gcm);
    context
        .encrypt_document(&document, &template)
        .expect("failed to encrypt document");

    let encrypted = document.serialize().expect("failed to serialize ciphertext");
    assert!(encrypted.contains("EncryptedData"));
    assert!(!encrypted.contains("Hello, World!"));
    assert!(document.is_encrypted());

    context
        .decrypt_document(&document)
        .expect("failed to decrypt document");

    let decrypted = document.serialize().expect("failed to serialize plaintext");
    assert_eq!(original, decrypted);
}

#[test]
fn decrypting_with_wrong_key_fails() {
    common::setup();

    let document = parse_xml(common::SAMPLE_XML.as_bytes()).expect("failed to parse sample");

    let key =
        XmlSecKey::generate(XmlSecKeyDataKind::Aes, 256).expect("failed to generate AES key");
    let mut context = XmlSecEncryptionContext::new().expect("failed to create context");
    context.insert_key(key);

    let template = XmlSecEncryptionTemplate::new(XmlSecEncryptionMethod::Aes256Gcm);
    context
        .encrypt_document(&document, &template)
        .expect("failed to encrypt document");

    let wrong_key =
        XmlSecKey::generate(XmlSecKeyDataKind::Aes, 256).expect("failed to generate AES key");
    let mut wrong_context = XmlSecEncryptionContext::new().expect("failed to create context");
    wrong_context.insert_key(wrong_key);

    match wrong_context.decrypt_document(&document) {
        Err(XmlSecError::DecryptionFailure(_)) => {}
        other => panic!("expected DecryptionFailure, got {:?}", other),
    }
}

#[test]
fn encrypt_with_wrapped_session_key_roundtrips() {
    common::setup();

    let (private_pem, public_pem) = common::rsa_keypair_pems();

    let document = parse_xml(common::SAMPLE_XML.as_bytes()).expect("failed to parse sample");
    let original = document.serialize().expect("failed to serialize original");

    // Encrypting side only holds the recipient's public key.
    let recipient = XmlSecKey::from_memory(&public_pem, XmlSecKeyFormat::Pem, None)
        .expect("failed to load public key");
    recipient
        .set_name("recipient")
        .expect("failed to name public key");

    let encrypt_manager = XmlSecKeyManager::new().expect("failed to create keys manager");
    encrypt_manager
        .adopt_key(recipient)
        .expect("failed to adopt public key");

    let mut encrypt_context =
        XmlSecEncryptionContext::with_keys_manager(Arc::new(encrypt_manager))
            .expect("failed to create context");
    encrypt_context.insert_key(
        XmlSecKey::generate(XmlSecKeyDataKind::Aes, 128).expect("failed to generate session key"),
    );

    let template = XmlSecEncryptionTemplate::new(XmlSecEncryptionMethod::Aes128Cbc)
        .encrypted_key(XmlSecKeyTransportMethod::RsaOaep, Some("recipient"));
    encrypt_context
        .encrypt_document(&document, &template)
        .expect("failed to encrypt document");

    let encrypted = document.serialize().expect("failed to serialize ciphertext");
    assert!(encrypted.contains("EncryptedKey"));
    assert!(!encrypted.contains("Hello, World!"));

    // Decrypting side resolves the session key through its private key.
    let private = XmlSecKey::from_memory(&private_pem, XmlSecKeyFormat::Pem, None)
        .expect("failed to load private key");
    private
        .set_name("recipient")
        .expect("failed to name private key");

    let decrypt_manager = XmlSecKeyManager::new().expect("failed to create keys manager");
    decrypt_manager
        .adopt_key(private)
        .expect("failed to adopt private key");

    let decrypt_context =
        XmlSecEncryptionContext::with_keys_manager(Arc::new(decrypt_manager))
            .expect("failed to create context");
    decrypt_context
        .decrypt_document(&document)
        .expect("failed to decrypt document");

    let decrypted = document.serialize().expect("failed to serialize plaintext");
    assert_eq!(original, decrypted);
}

#[test]
fn encrypting_without_key_or_manager_fails() {
    common::setup();

    let document = parse_xml(common::SAMPLE_XML.as_bytes()).expect("failed to parse sample");
    let context = XmlSecEncryptionContext::new().expect("failed to create context");

    let template = XmlSecEncryptionTemplate::new(XmlSecEncryptionMethod::Aes256Cbc);
    match context.encrypt_document(&document, &template) {
        Err(XmlSecError::KeyNotLoaded) => {}
        other => panic!("expected KeyNotLoaded, got {:?}", other),
    }
}

#[test]
fn decrypting_plain_document_fails() {
    common::setup();

    let document = parse_xml(common::SAMPLE_XML.as_bytes()).expect("failed to parse sample");

    let mut context = XmlSecEncryptionContext::new().expect("failed to create context");
    context.insert_key(
        XmlSecKey::generate(XmlSecKeyDataKind::Aes, 256).expect("failed to generate AES key"),
    );

    match context.decrypt_document(&document) {
        Err(XmlSecError::DecryptionFailure(_)) => {}
        other => panic!("expected DecryptionFailure, got {:?}", other),
    }
}
