use thiserror::Error;

/// Errors raised while parsing or resolving a dynamic F&O symbol (§4.6).
///
/// F&O resolution failures are fatal per §7: the caller (`EntryNode`/`ExitNode`)
/// propagates this up as a session-ending error, since an order built against an
/// unresolved symbol cannot be placed.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum FnoError {
    #[error("malformed dynamic symbol `{0}`: expected BASE:<EXP>[:<STRIKE>][:<CE|PE>]")]
    InvalidFormat(String),

    #[error("unrecognised expiry token `{0}`")]
    UnknownExpiryToken(String),

    #[error("unrecognised strike selector `{0}`")]
    UnknownStrikeSelector(String),

    #[error("no expiry calendar entry for base `{base}` kind {kind:?} index {index}")]
    NoExpiry {
        base: String,
        kind: super::symbol::ExpiryKind,
        index: u32,
    },

    #[error("no strike step configured for base `{0}`")]
    NoStrikeStep(String),

    #[error("no spot price available to resolve strike for `{0}`")]
    NoSpot(String),
}
