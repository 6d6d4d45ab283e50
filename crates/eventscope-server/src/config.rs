/// Re-export `Config` from `eventscope-core` for use within this crate.
///
/// All environment-variable parsing lives in `eventscope-core` so it can be
/// shared with integration tests without depending on the full server.
pub use eventscope_core::config::Config;
