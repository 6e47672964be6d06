use super::card::State;

/// Renders a card's display token for a given viewer, per §4.1.
///
/// Pure function of `(state, value, is_owner)`; takes no locks and knows
/// nothing of the board or any particular player identifier.
pub fn render(state: State, value: &str, is_owner: bool) -> String {
    match state {
        State::Down => "down".to_string(),
        State::Gone => "none".to_string(),
        State::Up => format!("up {value}"),
        State::Controlled if is_owner => format!("my {value}"),
        State::Controlled => format!("up {value}"),
    }
}
