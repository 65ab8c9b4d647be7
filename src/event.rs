//! The named event bus and one-shot predicate waiters (§4.8).

use crate::model::game::Game;
use crate::protocol::{DisconnectReason, GameDataFrame, MatchMakingFrame};
use std::sync::mpsc;
use std::sync::Mutex;
use std::time::Duration;

/// One of the high level events the session surfaces to the application.
#[derive(Debug, Clone)]
pub enum Event {
    /// The session completed its handshake and is ready for use
    Ready,
    /// Joined a game
    GameJoin {
        /// The joined game's id
        game_id: u32,
        /// The client id assigned to us
        client_id: u32,
    },
    /// The host started the game
    GameStart,
    /// The game ended
    GameEnd,
    /// Settings were replaced
    GameSettings(Game),
    /// A chat message arrived
    Chat {
        /// The sender's player id
        player_id: u8,
        /// The message text
        message: String,
    },
    /// We were murdered
    Death {
        /// Whether the player was an impostor
        impostor: bool,
    },
    /// Another player was murdered
    PlayerKill {
        /// Whether the killer was an impostor
        impostor: bool,
        /// The victim's player id
        victim_id: u8,
    },
    /// A player moved
    PlayerMove {
        /// The moved player's id
        player_id: u8,
    },
    /// A player's cosmetics/status changed
    PlayerUpdate {
        /// The updated player's id
        player_id: u8,
    },
    /// The roster as a whole changed shape
    PlayersUpdate,
    /// A player was removed
    PlayerRemove {
        /// The removed player's id
        player_id: u8,
        /// Why they were removed
        reason: DisconnectReason,
    },
    /// We left the game
    PlayerLeave,
    /// A player's task list changed
    PlayerTasksUpdate {
        /// The updated player's id
        player_id: u8,
    },
    /// A player cast a vote
    PlayerVote {
        /// The voting player's id
        player_id: u8,
    },
    /// Our own cosmetic/identity attribute changed
    AttributeUpdate,
    /// The meeting start counter ticked
    StartCounter {
        /// Seconds remaining
        seconds_left: u8,
    },
    /// A meeting started
    MeetingStart,
    /// The meeting ended
    MeetingStop,
    /// Voting ended
    VotingEnd,
    /// A player entered a vent
    VentEnter {
        /// The vent-user's net-id
        net_id: u32,
    },
    /// A player exited a vent
    VentExit {
        /// The vent-user's net-id
        net_id: u32,
    },
    /// A player moved between vents
    VentMove,
    /// A sabotage-fix button was pressed
    ButtonPress,
    /// A dead body was reported
    BodyReport {
        /// The reported body's player id, if any
        player_id: Option<u8>,
    },
    /// A player's name changed
    NameUpdate {
        /// The new name
        name: String,
    },
    /// A player's color changed
    ColorUpdate {
        /// The new color index
        color: u8,
    },
}

/// A discriminant used to route subscriptions without requiring
/// subscribers to destructure the full [`Event`] payload up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// See [`Event::Ready`]
    Ready,
    /// See [`Event::GameJoin`]
    GameJoin,
    /// See [`Event::GameStart`]
    GameStart,
    /// See [`Event::GameEnd`]
    GameEnd,
    /// See [`Event::GameSettings`]
    GameSettings,
    /// See [`Event::Chat`]
    Chat,
    /// See [`Event::Death`]
    Death,
    /// See [`Event::PlayerKill`]
    PlayerKill,
    /// See [`Event::PlayerMove`]
    PlayerMove,
    /// See [`Event::PlayerUpdate`]
    PlayerUpdate,
    /// See [`Event::PlayersUpdate`]
    PlayersUpdate,
    /// See [`Event::PlayerRemove`]
    PlayerRemove,
    /// See [`Event::PlayerLeave`]
    PlayerLeave,
    /// See [`Event::PlayerTasksUpdate`]
    PlayerTasksUpdate,
    /// See [`Event::PlayerVote`]
    PlayerVote,
    /// See [`Event::AttributeUpdate`]
    AttributeUpdate,
    /// See [`Event::StartCounter`]
    StartCounter,
    /// See [`Event::MeetingStart`]
    MeetingStart,
    /// See [`Event::MeetingStop`]
    MeetingStop,
    /// See [`Event::VotingEnd`]
    VotingEnd,
    /// See [`Event::VentEnter`]
    VentEnter,
    /// See [`Event::VentExit`]
    VentExit,
    /// See [`Event::VentMove`]
    VentMove,
    /// See [`Event::ButtonPress`]
    ButtonPress,
    /// See [`Event::BodyReport`]
    BodyReport,
    /// See [`Event::NameUpdate`]
    NameUpdate,
    /// See [`Event::ColorUpdate`]
    ColorUpdate,
}

impl Event {
    /// This event's subscription discriminant.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Ready => EventKind::Ready,
            Event::GameJoin { .. } => EventKind::GameJoin,
            Event::GameStart => EventKind::GameStart,
            Event::GameEnd => EventKind::GameEnd,
            Event::GameSettings(_) => EventKind::GameSettings,
            Event::Chat { .. } => EventKind::Chat,
            Event::Death { .. } => EventKind::Death,
            Event::PlayerKill { .. } => EventKind::PlayerKill,
            Event::PlayerMove { .. } => EventKind::PlayerMove,
            Event::PlayerUpdate { .. } => EventKind::PlayerUpdate,
            Event::PlayersUpdate => EventKind::PlayersUpdate,
            Event::PlayerRemove { .. } => EventKind::PlayerRemove,
            Event::PlayerLeave => EventKind::PlayerLeave,
            Event::PlayerTasksUpdate { .. } => EventKind::PlayerTasksUpdate,
            Event::PlayerVote { .. } => EventKind::PlayerVote,
            Event::AttributeUpdate => EventKind::AttributeUpdate,
            Event::StartCounter { .. } => EventKind::StartCounter,
            Event::MeetingStart => EventKind::MeetingStart,
            Event::MeetingStop => EventKind::MeetingStop,
            Event::VotingEnd => EventKind::VotingEnd,
            Event::VentEnter { .. } => EventKind::VentEnter,
            Event::VentExit { .. } => EventKind::VentExit,
            Event::VentMove => EventKind::VentMove,
            Event::ButtonPress => EventKind::ButtonPress,
            Event::BodyReport { .. } => EventKind::BodyReport,
            Event::NameUpdate { .. } => EventKind::NameUpdate,
            Event::ColorUpdate { .. } => EventKind::ColorUpdate,
        }
    }
}

/// A subscriber callback. Invoked sequentially, in subscription order,
/// for every emitted event matching its registered kind.
pub type Handler = Box<dyn Fn(&Event) + Send>;

/// Fan-out dispatch of named events to zero or more subscribers each.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<(EventKind, Handler)>>,
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> EventBus {
        EventBus::default()
    }

    /// Registers `handler` to run for every future event of `kind`.
    pub fn subscribe(&self, kind: EventKind, handler: Handler) {
        self.subscribers.lock().unwrap().push((kind, handler));
    }

    /// Dispatches `event` to every subscriber registered for its kind,
    /// sequentially and in subscription order.
    pub fn emit(&self, event: Event) {
        let kind = event.kind();
        let subs = self.subscribers.lock().unwrap();
        for (sub_kind, handler) in subs.iter() {
            if *sub_kind == kind {
                handler(&event);
            }
        }
    }
}

/// A parsed leaf frame, as observed by [`Waiters`]. Only the two
/// layers waiters are ever registered against are represented; an
/// outer-kind leaf like a bare `Ack` has no predicate-worthy payload.
#[derive(Debug, Clone)]
pub enum InboundFrame {
    /// A matchmaking-layer leaf
    MatchMaking(MatchMakingFrame),
    /// A game-data-layer leaf
    GameData(GameDataFrame),
}

enum Outcome {
    Matched(InboundFrame),
    Cancelled,
}

/// The result of a [`Waiters::wait_for`] call.
pub enum WaitResult {
    /// The predicate matched this frame
    Matched(InboundFrame),
    /// The waiter was cancelled by a disconnect before matching
    Cancelled,
    /// No matching frame arrived within the timeout
    TimedOut,
}

struct Registration {
    predicate: Box<dyn Fn(&InboundFrame) -> bool + Send>,
    resolve: mpsc::Sender<Outcome>,
}

/// One-shot predicate waiters over the inbound frame stream (§4.8).
#[derive(Default)]
pub struct Waiters {
    registrations: Mutex<Vec<Registration>>,
}

impl Waiters {
    /// Creates an empty waiter registry.
    pub fn new() -> Waiters {
        Waiters::default()
    }

    /// Registers a one-shot waiter and blocks the calling thread until
    /// `predicate` matches a newly observed frame, the waiter is
    /// cancelled by [`Waiters::cancel_all`], or `timeout` elapses.
    pub fn wait_for<F>(&self, predicate: F, timeout: Duration) -> WaitResult
    where
        F: Fn(&InboundFrame) -> bool + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        self.registrations.lock().unwrap().push(Registration {
            predicate: Box::new(predicate),
            resolve: tx,
        });
        match rx.recv_timeout(timeout) {
            Ok(Outcome::Matched(frame)) => WaitResult::Matched(frame),
            Ok(Outcome::Cancelled) => WaitResult::Cancelled,
            Err(_) => WaitResult::TimedOut,
        }
    }

    /// Notifies every registered waiter of a newly observed frame,
    /// resolving and removing any whose predicate matches.
    pub fn notify(&self, frame: &InboundFrame) {
        let mut regs = self.registrations.lock().unwrap();
        regs.retain(|reg| {
            if (reg.predicate)(frame) {
                let _ = reg.resolve.send(Outcome::Matched(frame.clone()));
                false
            } else {
                true
            }
        });
    }

    /// Wakes every outstanding waiter with a cancellation outcome and
    /// clears the registry; called on disconnect (§4.8).
    pub fn cancel_all(&self) {
        let mut regs = self.registrations.lock().unwrap();
        for reg in regs.drain(..) {
            let _ = reg.resolve.send(Outcome::Cancelled);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_event_bus_fans_out_to_matching_kind_only() {
        let bus = EventBus::new();
        let ready_hits = Arc::new(AtomicUsize::new(0));
        let chat_hits = Arc::new(AtomicUsize::new(0));

        let r = ready_hits.clone();
        bus.subscribe(EventKind::Ready, Box::new(move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        }));
        let c = chat_hits.clone();
        bus.subscribe(EventKind::Chat, Box::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        bus.emit(Event::Ready);
        bus.emit(Event::Chat { player_id: 1, message: "hi".into() });

        assert_eq!(ready_hits.load(Ordering::SeqCst), 1);
        assert_eq!(chat_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_waiter_resolves_on_matching_frame() {
        let waiters = Arc::new(Waiters::new());
        let w = waiters.clone();
        let handle = thread::spawn(move || {
            w.wait_for(
                |f| matches!(f, InboundFrame::MatchMaking(MatchMakingFrame::StartGame { game_id }) if *game_id == 7),
                Duration::from_secs(1),
            )
        });

        // give the waiter thread time to register
        thread::sleep(Duration::from_millis(20));
        waiters.notify(&InboundFrame::MatchMaking(MatchMakingFrame::StartGame { game_id: 1 }));
        waiters.notify(&InboundFrame::MatchMaking(MatchMakingFrame::StartGame { game_id: 7 }));

        match handle.join().unwrap() {
            WaitResult::Matched(InboundFrame::MatchMaking(MatchMakingFrame::StartGame { game_id })) => {
                assert_eq!(game_id, 7);
            }
            _ => panic!("expected a match"),
        }
    }

    #[test]
    fn test_cancel_all_wakes_waiters() {
        let waiters = Arc::new(Waiters::new());
        let w = waiters.clone();
        let handle = thread::spawn(move || w.wait_for(|_| false, Duration::from_secs(5)));
        thread::sleep(Duration::from_millis(20));
        waiters.cancel_all();
        assert!(matches!(handle.join().unwrap(), WaitResult::Cancelled));
    }
}
