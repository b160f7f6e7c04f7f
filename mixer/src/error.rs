/// Errors surfaced by the mix engine.
///
/// There is no unknown-voice variant: `stop` and `update_settings` on a
/// missing voice are no-ops.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MixError {
    /// The output context could not be created or resumed.
    #[error("audio output unavailable: {0}")]
    DeviceUnavailable(String),
    /// The clip cannot be attached as a source (bad channel count, empty, ...).
    #[error("unsupported clip '{label}': {reason}")]
    UnsupportedClip { label: String, reason: String },
    /// The output context was closed and cannot accept new chains.
    #[error("audio context is closed")]
    ContextClosed,
}
