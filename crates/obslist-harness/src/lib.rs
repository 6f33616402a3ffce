#![forbid(unsafe_code)]

//! Test harness for obslist.
//!
//! - [`fixtures`]: `Widget`/`Part` reference elements with nested collections,
//!   plus ready-made nested observer factories.
//! - [`recorder`]: [`ChangeRecorder`], a subscriber that captures emissions.
//! - [`init_tracing`]: test-friendly tracing subscriber.

pub mod fixtures;
pub mod recorder;

pub use fixtures::{Part, PartRef, Widget, WidgetRef, forward_parts, forward_tags};
pub use recorder::ChangeRecorder;

use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber writing to the test output.
///
/// Honours `RUST_LOG`; defaults to `obslist=debug`. Safe to call from every
/// test.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("obslist=debug"));
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(filter)
        .try_init();
}
