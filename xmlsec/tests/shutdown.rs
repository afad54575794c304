// Runs in its own test binary: shutdown semantics cannot be probed from a
// process whose other tests still rely on the global state being up.
use xmlsec::shutdown_xmlsec;

#[test]
fn shutdown_without_init_is_a_noop() {
    shutdown_xmlsec();
    shutdown_xmlsec();
}
