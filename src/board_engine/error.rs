use thiserror::Error;

/// Failure kinds the engine itself can raise, per the error taxonomy in §7.
///
/// `InvalidAddress` is deliberately absent here: it is raised by the
/// facade before the engine is ever touched (see [`crate::board_engine::facade`]).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameError {
    /// Attempted to first-flip a card that has already been matched out.
    #[error("card is gone")]
    CardRemoved,

    /// Attempted to second-flip a card that is controlled or gone.
    #[error("card is controlled by another player or gone")]
    RestrictedAccess,

    /// A blocked `flip_up_as_first` or `watch` was cooperatively cancelled.
    #[error("operation was cancelled")]
    Cancelled,
}
