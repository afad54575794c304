mod common;

use xmlsec::{
    parse_xml, XmlSecCanonicalizationMethod, XmlSecDocumentExt, XmlSecDocumentTemplating,
    XmlSecError, XmlSecKey, XmlSecKeyFormat, XmlSecResult, XmlSecSignatureContext,
    XmlSecSignatureMethod,
};

fn sign_sample(private_pem: &[u8]) -> String {
    let document = parse_xml(common::SAMPLE_XML.as_bytes()).expect("failed to parse sample");
    document
        .template()
        .canonicalization(XmlSecCanonicalizationMethod::ExclusiveC14N)
        .signature(XmlSecSignatureMethod::RsaSha256)
        .done()
        .expect("failed to build signature template");

    let key = XmlSecKey::from_memory(private_pem, XmlSecKeyFormat::Pem, None)
        .expect("failed to load private key");

    let mut context = XmlSecSignatureContext::new().expect("failed to create signature context");
    context.insert_key(key);
    context
        .sign_document(&document)
        .expect("failed to sign document");

    assert!(document.is_signed());
    document.serialize().expect("failed to serialize document")
}

fn verify_xml(xml: &str, public_pem: &[u8]) -> XmlSecResult<()> {
    let document = parse_xml(xml.as_bytes()).expect("failed to parse document");
    let key = XmlSecKey::from_memory(public_pem, XmlSecKeyFormat::Pem, None)
        .expect("failed to load public key");

    let mut context = XmlSecSignatureContext::new().expect("failed to create signature context");
    context.insert_key(key);
    context.verify_document(&document)
}

#[test]
fn sign_then_verify_with_public_key() {
    common::setup();
    let (private_pem, public_pem) = common::rsa_keypair_pems();

    let signed = sign_sample(&private_pem);
    assert!(signed.contains("SignatureValue"));

    verify_xml(&signed, &public_pem).expect("signature should verify");
}

#[test]
fn tampering_with_signed_content_fails_verification() {
    common::setup();
    let (private_pem, public_pem) = common::rsa_keypair_pems();

    let signed = sign_sample(&private_pem);
    let tampered = signed.replace("Hello, World!", "Goodbye, World!");
    assert_ne!(signed, tampered);

    match verify_xml(&tampered, &public_pem) {
        Err(XmlSecError::VerificationFailure(_)) => {}
        other => panic!("expected VerificationFailure, got {:?}", other),
    }
}

#[test]
fn verification_with_wrong_key_fails() {
    common::setup();
    let (private_pem, _) = common::rsa_keypair_pems();
    let (_, unrelated_public_pem) = common::rsa_keypair_pems();

    let signed = sign_sample(&private_pem);

    match verify_xml(&signed, &unrelated_public_pem) {
        Err(XmlSecError::VerificationFailure(_)) => {}
        other => panic!("expected VerificationFailure, got {:?}", other),
    }
}

#[test]
fn signing_without_key_fails() {
    common::setup();
    let document = parse_xml(common::SAMPLE_XML.as_bytes()).expect("failed to parse sample");

    let context = XmlSecSignatureContext::new().expect("failed to create signature context");
    match context.sign_document(&document) {
        Err(XmlSecError::KeyNotLoaded) => {}
        other => panic!("expected KeyNotLoaded, got {:?}", other),
    }
}

#[test]
fn verifying_unsigned_document_fails() {
    common::setup();
    let (_, public_pem) = common::rsa_keypair_pems();

    match verify_xml(common::SAMPLE_XML, &public_pem) {
        Err(XmlSecError::VerificationFailure(_)) => {}
        other => panic!("expected VerificationFailure, got {:?}", other),
    }
}
