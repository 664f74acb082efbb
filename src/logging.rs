//! Tracing subscriber setup.
//!
//! Log events go to stderr so stdout stays reserved for command output
//! (run summaries, tables). The filter comes from `RUST_LOG`, falling back
//! to the level passed on the command line.

use tracing_subscriber::EnvFilter;

pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sales_sync={0},salesync={0}", default_level)));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
