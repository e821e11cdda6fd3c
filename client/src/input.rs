//! Client input coalescing
//!
//! Local input arrives as fast as it is produced; the network sees at most one
//! report per client tick. Events are queued without ever blocking the
//! producer and folded into a single state when the tick flushes.

use log::debug;
use shared::{ClientState, MOVE_STEP};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

/// A discrete local input event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// A key press. `w`, `a`, `s` and `d` also shift the position by
    /// [`MOVE_STEP`]. Positions are map offsets, so `w` raises `y` and `d`
    /// lowers `x`.
    Key(u8),
    Delta { dx: i64, dy: i64 },
    MoveTo { x: i64, y: i64 },
}

impl InputEvent {
    pub fn apply(self, state: &mut ClientState) {
        match self {
            InputEvent::Key(code) => {
                match code.to_ascii_lowercase() {
                    b'w' => state.y = state.y.saturating_add(MOVE_STEP),
                    b's' => state.y = state.y.saturating_sub(MOVE_STEP),
                    b'a' => state.x = state.x.saturating_add(MOVE_STEP),
                    b'd' => state.x = state.x.saturating_sub(MOVE_STEP),
                    _ => {}
                }
                state.last_input = code as i64;
            }
            InputEvent::Delta { dx, dy } => {
                state.x = state.x.saturating_add(dx);
                state.y = state.y.saturating_add(dy);
            }
            InputEvent::MoveTo { x, y } => {
                state.x = x;
                state.y = y;
            }
        }
    }
}

/// Applies `events` in order to `state`.
pub fn fold<I>(mut state: ClientState, events: I) -> ClientState
where
    I: IntoIterator<Item = InputEvent>,
{
    for event in events {
        event.apply(&mut state);
    }
    state
}

/// Producer side of the input queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct InputSender {
    events: mpsc::Sender<InputEvent>,
    dropped: Arc<AtomicU64>,
}

impl InputSender {
    /// Queues `event` without waiting.
    ///
    /// Returns `false` if the event was dropped because the queue is full or
    /// the coalescer is gone.
    pub fn push(&self, event: InputEvent) -> bool {
        match self.events.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("Input buffer full, dropping {:?}", event);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Number of events dropped on a full queue so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer side: owns the client's current state and folds queued events
/// into it on every flush.
pub struct InputCoalescer {
    events: mpsc::Receiver<InputEvent>,
    state: ClientState,
}

impl InputCoalescer {
    pub fn new(initial: ClientState, capacity: usize) -> (InputSender, InputCoalescer) {
        let (events, receiver) = mpsc::channel(capacity);
        let sender = InputSender {
            events,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        let coalescer = InputCoalescer {
            events: receiver,
            state: initial,
        };
        (sender, coalescer)
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Drains every queued event into the current state.
    ///
    /// Returns the state to report, or `None` if nothing happened since the
    /// previous flush.
    pub fn flush(&mut self) -> Option<ClientState> {
        let mut pending = 0;
        while let Ok(event) = self.events.try_recv() {
            event.apply(&mut self.state);
            pending += 1;
        }

        if pending == 0 {
            return None;
        }
        Some(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movement_keys() {
        let start = ClientState::new(1, 0, 0, 0);

        assert_eq!(fold(start, [InputEvent::Key(b'w')]).y, MOVE_STEP);
        assert_eq!(fold(start, [InputEvent::Key(b's')]).y, -MOVE_STEP);
        assert_eq!(fold(start, [InputEvent::Key(b'a')]).x, MOVE_STEP);
        assert_eq!(fold(start, [InputEvent::Key(b'D')]).x, -MOVE_STEP);
    }

    #[test]
    fn test_other_keys_only_record_input() {
        let start = ClientState::new(1, 10, 20, b's' as i64);
        let state = fold(start, [InputEvent::Key(b'q')]);
        assert_eq!(state, ClientState::new(1, 10, 20, b'q' as i64));
    }

    #[test]
    fn test_fold_mixed_events() {
        let start = ClientState::spawn(3);
        let state = fold(
            start,
            [
                InputEvent::MoveTo { x: -200, y: -300 },
                InputEvent::Key(b'w'),
                InputEvent::Delta { dx: 10, dy: -6 },
                InputEvent::Key(b'd'),
            ],
        );
        assert_eq!(state, ClientState::new(3, -194, -302, b'd' as i64));
    }

    #[test]
    fn test_flush_coalesces_burst() {
        let start = ClientState::spawn(8);
        let (input, mut coalescer) = InputCoalescer::new(start, 32);

        let burst = [
            InputEvent::Key(b'a'),
            InputEvent::Key(b'a'),
            InputEvent::Key(b'w'),
            InputEvent::Delta { dx: 1, dy: 1 },
        ];
        for event in burst {
            assert!(input.push(event));
        }

        assert_eq!(coalescer.flush(), Some(fold(start, burst)));
        assert_eq!(coalescer.flush(), None);
    }

    #[test]
    fn test_flush_without_events_sends_nothing() {
        let (_input, mut coalescer) = InputCoalescer::new(ClientState::spawn(1), 4);
        assert_eq!(coalescer.flush(), None);
        assert_eq!(coalescer.state(), ClientState::spawn(1));
    }

    #[test]
    fn test_state_carries_across_flushes() {
        let (input, mut coalescer) = InputCoalescer::new(ClientState::new(1, 0, 0, 0), 4);

        input.push(InputEvent::Key(b'd'));
        coalescer.flush();
        input.push(InputEvent::Key(b'd'));

        assert_eq!(
            coalescer.flush(),
            Some(ClientState::new(1, -2 * MOVE_STEP, 0, b'd' as i64))
        );
    }

    #[test]
    fn test_full_buffer_drops_new_events() {
        let start = ClientState::new(1, 0, 0, 0);
        let (input, mut coalescer) = InputCoalescer::new(start, 2);

        assert!(input.push(InputEvent::Key(b'd')));
        assert!(input.push(InputEvent::Key(b'd')));
        assert!(!input.push(InputEvent::Key(b'w')));
        assert_eq!(input.dropped(), 1);

        // The dropped `w` never reaches the report.
        assert_eq!(
            coalescer.flush(),
            Some(ClientState::new(1, -2 * MOVE_STEP, 0, b'd' as i64))
        );
        assert!(input.push(InputEvent::Key(b'w')));
    }

    #[test]
    fn test_movement_saturates_at_bounds() {
        let start = ClientState::new(1, i64::MAX - 1, 0, 0);
        let (input, mut coalescer) = InputCoalescer::new(start, 4);
        input.push(InputEvent::Delta { dx: 10, dy: 0 });
        assert_eq!(coalescer.flush().unwrap().x, i64::MAX);

        let start = ClientState::new(1, 0, i64::MIN + 1, 0);
        let (input, mut coalescer) = InputCoalescer::new(start, 4);
        input.push(InputEvent::Key(b's'));
        input.push(InputEvent::Delta { dx: i64::MIN, dy: -1 });
        let state = coalescer.flush().unwrap();
        assert_eq!(state.x, i64::MIN);
        assert_eq!(state.y, i64::MIN);

        let edge = ClientState::new(1, i64::MIN, i64::MAX, 0);
        let state = fold(edge, [InputEvent::Key(b'w'), InputEvent::Key(b'd')]);
        assert_eq!((state.x, state.y), (i64::MIN, i64::MAX));
    }

    #[test]
    fn test_push_after_coalescer_dropped() {
        let (input, coalescer) = InputCoalescer::new(ClientState::spawn(1), 2);
        drop(coalescer);
        assert!(!input.push(InputEvent::Key(b'w')));
        assert_eq!(input.dropped(), 0);
    }
}
