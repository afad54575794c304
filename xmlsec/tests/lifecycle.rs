mod common;

use xmlsec::{
    guarantee_xmlsec_init, XmlSecError, XmlSecKey, XmlSecKeyDataKind, XmlSecKeyManager,
};

#[test]
fn repeated_init_is_a_noop() {
    common::setup();

    guarantee_xmlsec_init().expect("first init should succeed");
    guarantee_xmlsec_init().expect("second init should be a no-op");
    guarantee_xmlsec_init().expect("third init should be a no-op");
}

#[test]
fn key_release_is_single_use() {
    common::setup();

    let mut key =
        XmlSecKey::generate(XmlSecKeyDataKind::Aes, 256).expect("failed to generate key");
    key.release().expect("first release should succeed");

    match key.release() {
        Err(XmlSecError::UseAfterRelease) => {}
        other => panic!("expected UseAfterRelease, got {:?}", other),
    }
}

#[test]
fn released_key_cannot_be_used() {
    common::setup();

    let mut key =
        XmlSecKey::generate(XmlSecKeyDataKind::Aes, 256).expect("failed to generate key");
    key.release().expect("release should succeed");

    match key.set_name("orphan") {
        Err(XmlSecError::UseAfterRelease) => {}
        other => panic!("expected UseAfterRelease, got {:?}", other),
    }
    match key.name() {
        Err(XmlSecError::UseAfterRelease) => {}
        other => panic!("expected UseAfterRelease, got {:?}", other),
    }
}

#[test]
fn released_key_cannot_be_adopted() {
    common::setup();

    let mut key =
        XmlSecKey::generate(XmlSecKeyDataKind::Aes, 256).expect("failed to generate key");
    key.release().expect("release should succeed");

    let manager = XmlSecKeyManager::new().expect("failed to create keys manager");
    match manager.adopt_key(key) {
        Err(XmlSecError::UseAfterRelease) => {}
        other => panic!("expected UseAfterRelease, got {:?}", other),
    }
}

#[test]
fn keys_manager_release_is_single_use() {
    common::setup();

    let mut manager = XmlSecKeyManager::new().expect("failed to create keys manager");
    manager.release().expect("first release should succeed");

    match manager.release() {
        Err(XmlSecError::UseAfterRelease) => {}
        other => panic!("expected UseAfterRelease, got {:?}", other),
    }
}

#[test]
fn key_names_survive_the_native_boundary() {
    common::setup();

    let key = XmlSecKey::generate(XmlSecKeyDataKind::Hmac, 256).expect("failed to generate key");
    assert!(key.name().expect("name lookup should succeed").is_none());

    key.set_name("integrity").expect("failed to set name");
    assert_eq!(
        key.name().expect("name lookup should succeed").as_deref(),
        Some("integrity")
    );
}
