use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use super::error::GameError;

/// How often a blocked wait rechecks its cancellation token between
/// condvar wakes. Cooperative cancellation has no way to interrupt a
/// sleeping thread directly, so waits are bounded and re-polled instead.
pub(crate) const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One of the four states a card can be in, per §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Down,
    Up,
    Controlled,
    Gone,
}

/// A handle a waiting thread can use to cooperatively abandon a blocked
/// `flip_up_as_first` or `Board::watch` call without altering card state.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The capability a [`Card`] uses to tell its owning board that something
/// observable changed. The card knows nothing about `Board` itself, only
/// this trait, which keeps the per-card state machine testable in
/// isolation (per the "change notification as capability" design note).
pub trait ChangeNotifier: Send + Sync {
    fn notify_change(&self);
}

struct Inner {
    value: String,
    state: State,
    owner: Option<String>,
}

/// A single slot on the board: its own mutex, its own condition variable,
/// and an optional notifier wired in at board-construction time.
pub struct Card {
    inner: Mutex<Inner>,
    cv: Condvar,
    notifier: Option<Arc<dyn ChangeNotifier>>,
}

impl Card {
    /// Creates a new, face-down card with the given value.
    ///
    /// `value` must be non-empty (Card invariant 4); callers are expected
    /// to enforce this upstream (e.g. the config parser skips blank lines).
    pub fn new(value: String, notifier: Option<Arc<dyn ChangeNotifier>>) -> Card {
        debug_assert!(!value.is_empty(), "card value must be non-empty");
        Card { inner: Mutex::new(Inner { value, state: State::Down, owner: None }), cv: Condvar::new(), notifier }
    }

    /// Reads the card's current `(state, value, owner)` under its own lock.
    pub fn snapshot(&self) -> (State, String, Option<String>) {
        let guard = self.lock();
        (guard.state, guard.value.clone(), guard.owner.clone())
    }

    /// Reads the card's value under its own lock, for the matching
    /// predicate (§4.1) and `map`'s read-modify-write.
    pub fn value(&self) -> String {
        self.lock().value.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn fire_notify(&self) {
        if let Some(notifier) = &self.notifier {
            notifier.notify_change();
        }
    }

    /// Attempts to flip the card face-up as the first card of a player's
    /// turn. Blocks while the card is controlled by another player;
    /// returns `CardRemoved` if the card is (or becomes) `Gone`.
    pub fn flip_up_as_first(&self, player: &str, cancel: &CancellationToken) -> Result<(), GameError> {
        let mut guard = self.lock();
        loop {
            match guard.state {
                State::Gone => return Err(GameError::CardRemoved),
                State::Controlled if guard.owner.as_deref() == Some(player) => {
                    // already mine: idempotent no-op, no notification (R1).
                    return Ok(());
                }
                State::Controlled => {
                    if cancel.is_cancelled() {
                        return Err(GameError::Cancelled);
                    }
                    let (g, _timeout) = self
                        .cv
                        .wait_timeout(guard, CANCEL_POLL_INTERVAL)
                        .unwrap_or_else(|e| e.into_inner());
                    guard = g;
                    continue;
                }
                State::Down | State::Up => {
                    guard.state = State::Controlled;
                    guard.owner = Some(player.to_string());
                    drop(guard);
                    self.fire_notify();
                    return Ok(());
                }
            }
        }
    }

    /// Attempts to flip the card face-up as the second card of a player's
    /// turn. Never blocks; fails with `RestrictedAccess` if the card is
    /// controlled (by anyone, including the caller; see DESIGN.md open
    /// question 1) or gone.
    pub fn flip_up_as_second(&self, player: &str) -> Result<(), GameError> {
        let mut guard = self.lock();
        match guard.state {
            State::Controlled | State::Gone => Err(GameError::RestrictedAccess),
            State::Down | State::Up => {
                guard.state = State::Controlled;
                guard.owner = Some(player.to_string());
                drop(guard);
                self.fire_notify();
                Ok(())
            }
        }
    }

    /// Releases control of the card back to `Up`, visible to everyone.
    /// No-op (and no notification) if the card isn't currently controlled.
    pub fn relinquish_control(&self) {
        let mut guard = self.lock();
        if guard.state != State::Controlled {
            return;
        }
        guard.state = State::Up;
        guard.owner = None;
        drop(guard);
        self.cv.notify_all();
        self.fire_notify();
    }

    /// Flips an unmatched, unowned card back face-down. No-op on a
    /// controlled or already-gone card: the flip protocol only ever calls
    /// this on a card it has already relinquished to `Up`.
    pub fn flip_down(&self) {
        let mut guard = self.lock();
        if guard.state != State::Up {
            return;
        }
        guard.state = State::Down;
        drop(guard);
        self.cv.notify_all();
        self.fire_notify();
    }

    /// Removes a matched card from play. No-op if already gone.
    pub fn remove_card(&self) {
        let mut guard = self.lock();
        if guard.state == State::Gone {
            return;
        }
        guard.state = State::Gone;
        guard.owner = None;
        drop(guard);
        self.cv.notify_all();
        self.fire_notify();
    }

    /// Returns the card to `Down` with no owner, preserving its value.
    /// Always broadcasts, even if the card was already `Down`, so that any
    /// waiter blocked on a stale predicate rechecks.
    pub fn reset(&self) {
        let mut guard = self.lock();
        let changed = guard.state != State::Down || guard.owner.is_some();
        guard.state = State::Down;
        guard.owner = None;
        drop(guard);
        self.cv.notify_all();
        if changed {
            self.fire_notify();
        }
    }

    /// Locks the card for the duration of a global `map`/`reset` pass and
    /// hands the caller the raw mutex guard plus a way to wake first-flip
    /// waiters once the full ordered set has been mutated. Used only by
    /// [`super::board::Board`]'s global operations; per-card operations
    /// above never need it.
    pub(crate) fn lock_for_global_op(&self) -> GlobalOpGuard<'_> {
        GlobalOpGuard { card: self, guard: Some(self.lock()) }
    }
}

/// RAII guard held by `Board::map`/`Board::reset` while every card's lock
/// is acquired in the globally fixed order (§4.3). Dropping it releases
/// the card's lock; `wake` broadcasts the card's condvar before that,
/// without going through the per-card change-notifier (the board itself
/// broadcasts the watch channel exactly once after the whole pass).
pub(crate) struct GlobalOpGuard<'a> {
    card: &'a Card,
    guard: Option<MutexGuard<'a, Inner>>,
}

impl<'a> GlobalOpGuard<'a> {
    pub fn map_value(&mut self, f: &dyn Fn(String) -> String) {
        let inner = self.guard.as_mut().expect("guard held until drop");
        let taken = std::mem::take(&mut inner.value);
        inner.value = f(taken);
    }

    pub fn reset_state(&mut self) {
        let inner = self.guard.as_mut().expect("guard held until drop");
        inner.state = State::Down;
        inner.owner = None;
    }

    pub fn wake(&self) {
        self.card.cv.notify_all();
    }
}
