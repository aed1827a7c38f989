//! Script argument codec errors

use thiserror::Error;

/// Result type for argument decoding
pub type ScriptArgsResult<T> = Result<T, ScriptArgsError>;

/// Malformed mutation argument vector.
///
/// Seen only when an engine and a store disagree on the ARGV layout,
/// which means mismatched program versions.
#[derive(Debug, Clone, Error)]
pub enum ScriptArgsError {
    /// Vector ended before the layout was satisfied
    #[error("argument vector truncated at position {at}")]
    Truncated { at: usize },

    /// A count field did not parse as an integer
    #[error("bad count '{value}' at position {at}")]
    BadCount { at: usize, value: String },

    /// Arguments remained after the layout was satisfied
    #[error("trailing arguments: consumed {at} of {len}")]
    Trailing { at: usize, len: usize },
}
