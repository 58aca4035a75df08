use thiserror::Error;

/// Errors raised by the Global Position Store (§4.1, §7).
///
/// `ConcurrentOpenPosition` is the one GPS error the specification calls out as
/// fatal (a programmer/strategy-graph error, §7's error table): every other GPS
/// operation is either infallible or silently idempotent (`close_position` on an
/// already-closed `position_id` is a no-op, not an error).
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum PositionError {
    #[error("position `{0}` already has an open transaction")]
    ConcurrentOpenPosition(String),
}
