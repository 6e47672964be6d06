use thiserror::Error;

use super::board::Board;
use super::card::CancellationToken;
use super::error::GameError;

/// The engine's error surface plus the facade-only `InvalidAddress`
/// variant (§6, §7): coordinates out of the grid never reach the engine.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacadeError {
    #[error("row/column out of bounds")]
    InvalidAddress,

    #[error(transparent)]
    Game(#[from] GameError),
}

/// The thin command-level surface described in §6: `look`, `flip`, `map`,
/// `watch`. Bounds-checks before touching the engine; everything else is a
/// direct pass-through to [`Board`].
pub struct GameFacade {
    board: Board,
}

impl GameFacade {
    pub fn new(board: Board) -> GameFacade {
        GameFacade { board }
    }

    pub fn look(&self, player_id: &str) -> String {
        self.board.look(player_id)
    }

    pub fn rows(&self) -> usize {
        self.board.rows()
    }

    pub fn columns(&self) -> usize {
        self.board.columns()
    }

    /// `0 <= row < rows && 0 <= column < columns`, otherwise `InvalidAddress`
    /// is raised here, before the engine is ever called.
    pub fn flip(&self, player_id: &str, row: usize, column: usize, cancel: &CancellationToken) -> Result<(), FacadeError> {
        if row >= self.board.rows() || column >= self.board.columns() {
            return Err(FacadeError::InvalidAddress);
        }
        self.board.flip(player_id, row, column, cancel)?;
        Ok(())
    }

    /// Sugar for `map(v -> if v == from { to } else { v })`.
    pub fn map(&self, from: &str, to: &str) {
        let (from, to) = (from.to_string(), to.to_string());
        self.board.map(move |v| if v == from { to.clone() } else { v });
    }

    pub fn watch(&self, cancel: &CancellationToken) -> Result<(), FacadeError> {
        self.board.watch(cancel)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facade_2x2() -> GameFacade {
        GameFacade::new(Board::new(2, 2, vec!["A".into(), "B".into(), "A".into(), "B".into()]))
    }

    #[test]
    fn out_of_bounds_flip_never_touches_the_engine() {
        let facade = facade_2x2();
        let cancel = CancellationToken::new();
        assert_eq!(facade.flip("p1", 5, 0, &cancel), Err(FacadeError::InvalidAddress));
        assert_eq!(facade.flip("p1", 0, 5, &cancel), Err(FacadeError::InvalidAddress));
    }

    #[test]
    fn map_sugar_only_touches_matching_values() {
        let facade = facade_2x2();
        facade.map("A", "Z");
        assert_eq!(facade.look("p1"), "2x2\ndown\ndown\ndown\ndown");
        // values changed but state/ownership didn't: flipping reveals Z, not A.
        let cancel = CancellationToken::new();
        facade.flip("p1", 0, 0, &cancel).unwrap();
        assert_eq!(facade.look("p1"), "2x2\nmy Z\ndown\ndown\ndown");
    }
}
