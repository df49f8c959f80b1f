//! `ParserConfig`: the handful of knobs the core exposes. A constructor
//! argument, not global or environment-driven state — argv/env-driven
//! configuration belongs to the CLI binary, which is out of scope for
//! this crate.

/// Tunables for a [`Parser`](super::parser::Parser) instance.
#[derive(Debug, Clone, Copy)]
pub struct ParserConfig {
    /// Maximum number of decoded object streams kept in the
    /// [`ObjectStreamCache`](super::object_stream::ObjectStreamCache).
    pub object_stream_cache_capacity: usize,
    /// Starting size of a stream sub-parser's carry-over buffer.
    pub carry_over_initial: usize,
    /// Hard cap the carry-over buffer may grow to before the dispatcher
    /// fails with `Malformed` instead of continuing to buffer.
    pub carry_over_cap: usize,
    /// When set, a handful of corpus-observed "recoverable" conditions
    /// (e.g. a filter producing zero bytes for a non-empty body) are
    /// treated as errors instead of silently passing through.
    pub strict: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            object_stream_cache_capacity: 64,
            carry_over_initial: 4 * 1024,
            carry_over_cap: 64 * 1024,
            strict: false,
        }
    }
}
