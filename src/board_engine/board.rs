use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

use itertools::Itertools;

use super::card::{CancellationToken, Card, ChangeNotifier, CANCEL_POLL_INTERVAL};
use super::error::GameError;
use super::render::render;

/// The board's watch channel (§4.4): one mutex, one condvar, shared by
/// every card as their change-notifier and by `Board::watch` itself.
struct WatchChannel {
    generation: Mutex<u64>,
    cv: Condvar,
}

impl WatchChannel {
    fn new() -> WatchChannel {
        WatchChannel { generation: Mutex::new(0), cv: Condvar::new() }
    }

    fn broadcast(&self) {
        let mut guard = self.generation.lock().unwrap_or_else(|e| e.into_inner());
        *guard = guard.wrapping_add(1);
        drop(guard);
        self.cv.notify_all();
    }

    fn wait(&self, cancel: &CancellationToken) -> Result<(), GameError> {
        let mut guard = self.generation.lock().unwrap_or_else(|e| e.into_inner());
        let seen = *guard;
        loop {
            if *guard != seen {
                return Ok(());
            }
            if cancel.is_cancelled() {
                return Err(GameError::Cancelled);
            }
            guard = self
                .cv
                .wait_timeout(guard, CANCEL_POLL_INTERVAL)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
    }
}

impl ChangeNotifier for WatchChannel {
    fn notify_change(&self) {
        self.broadcast();
    }
}

/// The shared, mutable grid of cards (§3, §4.2–§4.5).
pub struct Board {
    rows: usize,
    columns: usize,
    cards: Vec<Card>,
    watch: Arc<WatchChannel>,
    /// Per-player indices of cards this player last turned `Up` without a
    /// match, to be retired by Step 1 of that player's next `flip`. `Card`
    /// forgets its owner the moment it leaves `Controlled` (by invariant),
    /// so the board, not the card, is the only place this can live. See
    /// DESIGN.md's Board section for why this bookkeeping is needed.
    turn_residue: Mutex<HashMap<String, Vec<usize>>>,
}

impl Board {
    /// Builds a board from `rows * columns` initial card values in
    /// row-major order. Panics if `values.len() != rows * columns` or if
    /// `rows`/`columns` are zero (a caller-side invariant violation, not
    /// a runtime condition, per §7).
    pub fn new(rows: usize, columns: usize, values: Vec<String>) -> Board {
        assert!(rows > 0 && columns > 0, "rows and columns must be positive");
        assert_eq!(values.len(), rows * columns, "wrong number of initial card values");

        let watch = Arc::new(WatchChannel::new());
        let cards = values
            .into_iter()
            .map(|value| Card::new(value, Some(watch.clone() as Arc<dyn ChangeNotifier>)))
            .collect();

        Board { rows, columns, cards, watch, turn_residue: Mutex::new(HashMap::new()) }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    fn index(&self, row: usize, column: usize) -> usize {
        row * self.columns + column
    }

    fn in_bounds(&self, row: usize, column: usize) -> bool {
        row < self.rows && column < self.columns
    }

    /// Indices of the cards currently `Controlled` by `player`. A
    /// lock-free snapshot, sound by the argument in §4.2 "Concurrency
    /// honesty": only `player`'s own thread ever puts a card into or takes
    /// one out of `Controlled(player)` via the normal flip protocol.
    fn controlled_by(&self, player: &str) -> Vec<usize> {
        self.cards
            .iter()
            .enumerate()
            .filter_map(|(i, card)| {
                let (state, _, owner) = card.snapshot();
                (state == super::card::State::Controlled && owner.as_deref() == Some(player)).then_some(i)
            })
            .collect()
    }

    fn record_residue(&self, player: &str, indices: Vec<usize>) {
        self.turn_residue.lock().unwrap_or_else(|e| e.into_inner()).insert(player.to_string(), indices);
    }

    fn take_residue(&self, player: &str) -> Vec<usize> {
        self.turn_residue.lock().unwrap_or_else(|e| e.into_inner()).remove(player).unwrap_or_default()
    }

    /// Executes the flip protocol (§4.2) for `player` at `(row, column)`.
    /// `row`/`column` are assumed already bounds-checked by the caller
    /// (the facade raises `InvalidAddress` itself, before this is ever
    /// reached; see `facade.rs`).
    pub fn flip(&self, player: &str, row: usize, column: usize, cancel: &CancellationToken) -> Result<(), GameError> {
        debug_assert!(self.in_bounds(row, column), "caller must bounds-check before calling flip");
        let index = self.index(row, column);

        // Step 1: retire unmatched prior turn.
        for idx in self.take_residue(player) {
            self.cards[idx].flip_down();
        }

        // Step 2: collect matched pair.
        let controlled = self.controlled_by(player);
        if controlled.len() == 2 {
            for idx in &controlled {
                self.cards[*idx].remove_card();
            }
        }

        // Step 3: classify the new flip.
        match self.controlled_by(player).into_iter().next() {
            None => self.cards[index].flip_up_as_first(player, cancel),
            Some(prev) => match self.cards[index].flip_up_as_second(player) {
                Ok(()) => {
                    if self.cards[index].value() != self.cards[prev].value() {
                        self.cards[index].relinquish_control();
                        self.cards[prev].relinquish_control();
                        self.record_residue(player, vec![index, prev]);
                    }
                    Ok(())
                }
                Err(GameError::RestrictedAccess) => {
                    self.cards[prev].relinquish_control();
                    self.record_residue(player, vec![prev]);
                    Err(GameError::RestrictedAccess)
                }
                Err(other) => Err(other),
            },
        }
    }

    /// Transforms every card's value with `f`, under every card's lock
    /// held simultaneously in the fixed index order (§4.3). State and
    /// owner are untouched.
    pub fn map(&self, f: impl Fn(String) -> String) {
        let mut guards: Vec<_> = self.cards.iter().map(|card| card.lock_for_global_op()).collect();
        for guard in guards.iter_mut() {
            guard.map_value(&f);
        }
        while let Some(guard) = guards.pop() {
            drop(guard);
        }
        self.watch.broadcast();
    }

    /// Returns every card to `(Down, no owner)`, preserving values, under
    /// every card's lock held simultaneously in the fixed index order.
    pub fn reset(&self) {
        let mut guards: Vec<_> = self.cards.iter().map(|card| card.lock_for_global_op()).collect();
        for guard in guards.iter_mut() {
            guard.reset_state();
        }
        for guard in guards.iter() {
            guard.wake();
        }
        self.turn_residue.lock().unwrap_or_else(|e| e.into_inner()).clear();
        while let Some(guard) = guards.pop() {
            drop(guard);
        }
        self.watch.broadcast();
    }

    /// Blocks until any observable change occurs (§4.4). Spurious wakes
    /// are possible; callers must re-read state regardless.
    pub fn watch(&self, cancel: &CancellationToken) -> Result<(), GameError> {
        self.watch.wait(cancel)
    }

    /// Builds the textual snapshot described in §4.5: a header followed by
    /// one rendered line per card in row-major order. Each card is read
    /// under its own lock; no lock is held across the whole snapshot.
    pub fn look(&self, player: &str) -> String {
        let header = format!("{}x{}", self.rows, self.columns);
        let body = self
            .cards
            .iter()
            .map(|card| {
                let (state, value, owner) = card.snapshot();
                render(state, &value, owner.as_deref() == Some(player))
            })
            .join("\n");
        format!("{header}\n{body}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_2x2() -> Board {
        Board::new(2, 2, vec!["A".into(), "B".into(), "A".into(), "B".into()])
    }

    #[test]
    fn s1_successful_match() {
        let board = board_2x2();
        let cancel = CancellationToken::new();

        board.flip("p1", 0, 0, &cancel).unwrap();
        board.flip("p1", 1, 0, &cancel).unwrap();
        assert_eq!(board.look("p1"), "2x2\nmy A\ndown\nmy A\ndown");

        board.flip("p1", 0, 1, &cancel).unwrap();
        assert_eq!(board.look("p1"), "2x2\nnone\nmy B\nnone\ndown");
    }

    #[test]
    fn s2_failed_match() {
        let board = board_2x2();
        let cancel = CancellationToken::new();

        board.flip("p1", 0, 0, &cancel).unwrap();
        board.flip("p1", 0, 1, &cancel).unwrap();
        assert_eq!(board.look("p2"), "2x2\nup A\nup B\ndown\ndown");

        board.flip("p1", 1, 1, &cancel).unwrap();
        assert_eq!(board.look("p2"), "2x2\ndown\ndown\ndown\nup B");
    }

    #[test]
    fn map_preserves_state_and_owner() {
        let board = board_2x2();
        let cancel = CancellationToken::new();
        board.flip("p1", 0, 0, &cancel).unwrap();

        board.map(|v| format!("{v}*"));

        let (state, value, owner) = board.cards[0].snapshot();
        assert_eq!(state, super::super::card::State::Controlled);
        assert_eq!(value, "A*");
        assert_eq!(owner.as_deref(), Some("p1"));

        // S5: a subsequent flip matches because both values picked up the transform.
        board.flip("p1", 1, 0, &cancel).unwrap();
        let (state2, value2, _) = board.cards[2].snapshot();
        assert_eq!(state2, super::super::card::State::Controlled);
        assert_eq!(value2, "A*");
    }

    #[test]
    fn reset_returns_every_card_to_down() {
        let board = board_2x2();
        let cancel = CancellationToken::new();
        board.flip("p1", 0, 0, &cancel).unwrap();

        board.reset();

        for card in &board.cards {
            let (state, _, owner) = card.snapshot();
            assert_eq!(state, super::super::card::State::Down);
            assert_eq!(owner, None);
        }
    }

    #[test]
    fn reset_is_idempotent() {
        let board = board_2x2();
        board.reset();
        let before: Vec<_> = board.cards.iter().map(|c| c.snapshot()).collect();
        board.reset();
        let after: Vec<_> = board.cards.iter().map(|c| c.snapshot()).collect();
        assert!(before.iter().zip(after.iter()).all(|(a, b)| a == b));
    }

    #[test]
    fn map_identity_is_a_no_op_on_values() {
        let board = board_2x2();
        board.map(|v| v);
        board.map(|v| v);
        assert_eq!(board.look("anyone"), "2x2\ndown\ndown\ndown\ndown");
    }
}
