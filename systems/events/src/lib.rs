#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Synchronous publish/subscribe bus carrying [`GameEvent`] notifications.
//!
//! The bus is the only channel through which the simulation talks to the
//! outside world. Handlers run on the emitting call stack in registration
//! order; a panicking handler is contained and logged so that dispatch to the
//! remaining handlers continues. Every event is stamped with the
//! simulation clock set by the owning battle.

use std::{
    collections::{HashMap, VecDeque},
    panic::{self, AssertUnwindSafe},
    rc::Rc,
    time::Duration,
};

use crystal_defence_core::{EventKind, GameEvent};
use serde::{Deserialize, Serialize};

/// Event handler shared between the bus and its registrant.
///
/// Registering the same `Rc` twice for one event kind is a no-op, and the
/// same `Rc` is needed to unregister it.
pub type EventHandler = Rc<dyn Fn(&GameEvent, EventStamp)>;

/// Simulation clock handed to handlers alongside each event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventStamp {
    /// Logic frame at emission.
    pub frame: u64,
    /// Simulation time at emission.
    pub time: Duration,
}

/// Event retained in the history ring buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryEntry {
    /// Subscription key.
    pub kind: EventKind,
    /// Event payload.
    pub event: GameEvent,
    /// Logic frame at emission.
    pub frame: u64,
    /// Simulation time at emission.
    pub time: Duration,
}

/// Bus configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventConfig {
    /// Whether emitted events are kept in the history buffer.
    pub record_history: bool,
    /// Capacity of the history buffer; the oldest entries are dropped first.
    pub max_history_size: usize,
    /// Whether emitted events are queued for [`EventManager::drain_outbox`].
    pub buffer_outbox: bool,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            record_history: false,
            max_history_size: 1_000,
            buffer_outbox: false,
        }
    }
}

struct Listener {
    handler: EventHandler,
    once: bool,
}

/// Synchronous, single-threaded event bus.
pub struct EventManager {
    config: EventConfig,
    listeners: HashMap<EventKind, Vec<Listener>>,
    history: VecDeque<HistoryEntry>,
    outbox: Vec<GameEvent>,
    frame: u64,
    time: Duration,
}

impl std::fmt::Debug for EventManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventManager")
            .field("config", &self.config)
            .field("listener_kinds", &self.listeners.len())
            .field("history", &self.history.len())
            .field("outbox", &self.outbox.len())
            .field("frame", &self.frame)
            .field("time", &self.time)
            .finish()
    }
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new(EventConfig::default())
    }
}

impl EventManager {
    /// Creates a bus that queues every event for [`EventManager::drain_outbox`].
    #[must_use]
    pub fn buffered() -> Self {
        Self::new(EventConfig {
            buffer_outbox: true,
            ..EventConfig::default()
        })
    }

    /// Creates a bus with the provided configuration.
    #[must_use]
    pub fn new(config: EventConfig) -> Self {
        Self {
            config,
            listeners: HashMap::new(),
            history: VecDeque::new(),
            outbox: Vec::new(),
            frame: 0,
            time: Duration::ZERO,
        }
    }

    /// Registers a handler. Returns `false` if it was already registered.
    pub fn on(&mut self, kind: EventKind, handler: EventHandler) -> bool {
        self.register(kind, handler, false)
    }

    /// Registers a handler that is removed after its first invocation.
    pub fn once(&mut self, kind: EventKind, handler: EventHandler) -> bool {
        self.register(kind, handler, true)
    }

    /// Unregisters a handler. Returns `false` if it was not registered.
    pub fn off(&mut self, kind: EventKind, handler: &EventHandler) -> bool {
        let Some(listeners) = self.listeners.get_mut(&kind) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|listener| !same_handler(&listener.handler, handler));
        before != listeners.len()
    }

    /// Removes every handler registered for `kind`.
    pub fn off_all(&mut self, kind: EventKind) {
        let _ = self.listeners.remove(&kind);
    }

    /// Number of handlers registered for `kind`.
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    /// Sets the clock stamped onto subsequently emitted events.
    pub fn set_clock(&mut self, frame: u64, time: Duration) {
        self.frame = frame;
        self.time = time;
    }

    /// Logic frame currently stamped onto events.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Simulation time currently stamped onto events.
    #[must_use]
    pub fn time(&self) -> Duration {
        self.time
    }

    /// Dispatches `event` to every handler registered for its kind.
    pub fn emit(&mut self, event: GameEvent) {
        let kind = event.kind();
        tracing::trace!(event = kind.as_str(), frame = self.frame, "emit");

        let handlers = self.take_handlers(kind);
        let stamp = EventStamp {
            frame: self.frame,
            time: self.time,
        };
        for handler in handlers {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(&event, stamp)));
            if outcome.is_err() {
                tracing::error!(event = kind.as_str(), "event handler panicked");
            }
        }

        if self.config.record_history {
            self.history.push_back(HistoryEntry {
                kind,
                event: event.clone(),
                frame: self.frame,
                time: self.time,
            });
            while self.history.len() > self.config.max_history_size {
                let _ = self.history.pop_front();
            }
        }

        if self.config.buffer_outbox {
            self.outbox.push(event);
        }
    }

    /// Retained history, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter()
    }

    /// Enables or disables history recording.
    pub fn set_record_history(&mut self, enabled: bool) {
        self.config.record_history = enabled;
    }

    /// Drops every retained history entry.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Takes every event emitted since the previous drain.
    pub fn drain_outbox(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Clears history, outbox and clock while keeping subscriptions.
    pub fn reset(&mut self) {
        self.history.clear();
        self.outbox.clear();
        self.frame = 0;
        self.time = Duration::ZERO;
    }

    fn register(&mut self, kind: EventKind, handler: EventHandler, once: bool) -> bool {
        let listeners = self.listeners.entry(kind).or_default();
        if listeners
            .iter()
            .any(|listener| same_handler(&listener.handler, &handler))
        {
            return false;
        }
        listeners.push(Listener { handler, once });
        true
    }

    fn take_handlers(&mut self, kind: EventKind) -> Vec<EventHandler> {
        let Some(listeners) = self.listeners.get_mut(&kind) else {
            return Vec::new();
        };
        let handlers = listeners
            .iter()
            .map(|listener| Rc::clone(&listener.handler))
            .collect();
        listeners.retain(|listener| !listener.once);
        handlers
    }
}

fn same_handler(left: &EventHandler, right: &EventHandler) -> bool {
    std::ptr::eq(
        Rc::as_ptr(left).cast::<()>(),
        Rc::as_ptr(right).cast::<()>(),
    )
}
