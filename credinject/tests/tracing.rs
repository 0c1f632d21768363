//! `initialize_tracing` must be safe to call from hosts that may already have
//! installed a subscriber.

use credinject::{tracing_support::initialize_tracing, CredentialBuilder, MemoryLookup};

#[test]
fn initialize_tracing_twice() {
    initialize_tracing();
    initialize_tracing();

    // Exercise the instrumented path with a subscriber installed.
    let builder = CredentialBuilder::new(MemoryLookup::new());
    let mut descriptor = Default::default();
    assert!(builder.inject("default", "default", &mut descriptor).is_err());
}
