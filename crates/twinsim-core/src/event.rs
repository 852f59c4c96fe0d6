//! Typed simulation events, buffered per kind.
//!
//! Events are emitted while a tick, spike or reset runs and delivered in
//! batch right after it. Each event kind has its own bounded
//! [`EventBuffer`]; when a burst overflows it the oldest events go first.
//!
//! Subscribers are passive: they observe events read-only, for dashboards,
//! alert feeds and analytics. A listener can watch a whole kind or only the
//! events that concern one node. Nothing a listener does can reach back
//! into the simulation.
//!
//! # Suppression
//!
//! Event kinds can be suppressed via [`EventBus::suppress`], which prevents
//! any allocation or recording for that kind.

use crate::effect::EffectColor;
use crate::fixed::{Fixed64, Ticks};
use crate::id::*;
use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A simulation event. All events carry the tick at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Spikes --
    SpikeTriggered {
        node: NodeId,
        intensity: Fixed64,
        tick: Ticks,
    },
    DemandPropagated {
        node: NodeId,
        depth: u32,
        added: Fixed64,
        tick: Ticks,
    },

    // -- Markers --
    EffectSpawned {
        node: NodeId,
        color: EffectColor,
        depth: u32,
        tick: Ticks,
    },
    EffectExpired {
        count: usize,
        tick: Ticks,
    },

    // -- Physics --
    EdgeSkipped {
        edge: EdgeId,
        tick: Ticks,
    },
    /// Inventory crossed below the critical threshold.
    NodeDepleted {
        node: NodeId,
        inventory: Fixed64,
        tick: Ticks,
    },

    // -- Lifecycle --
    SimulationReset {
        cancelled_spawns: usize,
        tick: Ticks,
    },
}

/// Discriminant tag for event types, used for suppression and subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SpikeTriggered,
    DemandPropagated,
    EffectSpawned,
    EffectExpired,
    EdgeSkipped,
    NodeDepleted,
    SimulationReset,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 7;

impl Event {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::SpikeTriggered { .. } => EventKind::SpikeTriggered,
            Event::DemandPropagated { .. } => EventKind::DemandPropagated,
            Event::EffectSpawned { .. } => EventKind::EffectSpawned,
            Event::EffectExpired { .. } => EventKind::EffectExpired,
            Event::EdgeSkipped { .. } => EventKind::EdgeSkipped,
            Event::NodeDepleted { .. } => EventKind::NodeDepleted,
            Event::SimulationReset { .. } => EventKind::SimulationReset,
        }
    }

    /// The tick this event was recorded at.
    pub fn tick(&self) -> Ticks {
        match *self {
            Event::SpikeTriggered { tick, .. }
            | Event::DemandPropagated { tick, .. }
            | Event::EffectSpawned { tick, .. }
            | Event::EffectExpired { tick, .. }
            | Event::EdgeSkipped { tick, .. }
            | Event::NodeDepleted { tick, .. }
            | Event::SimulationReset { tick, .. } => tick,
        }
    }

    /// The node an event concerns, if it concerns exactly one.
    pub fn node(&self) -> Option<NodeId> {
        match *self {
            Event::SpikeTriggered { node, .. }
            | Event::DemandPropagated { node, .. }
            | Event::EffectSpawned { node, .. }
            | Event::NodeDepleted { node, .. } => Some(node),
            Event::EffectExpired { .. }
            | Event::EdgeSkipped { .. }
            | Event::SimulationReset { .. } => None,
        }
    }
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; EVENT_KIND_COUNT] = [
        EventKind::SpikeTriggered,
        EventKind::DemandPropagated,
        EventKind::EffectSpawned,
        EventKind::EffectExpired,
        EventKind::EdgeSkipped,
        EventKind::NodeDepleted,
        EventKind::SimulationReset,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer
// ---------------------------------------------------------------------------

/// Bounded FIFO of pending events for one kind.
#[derive(Debug)]
pub struct EventBuffer {
    pending: VecDeque<Event>,
    capacity: usize,
    emitted: u64,
    overflowed: u64,
}

impl EventBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            pending: VecDeque::with_capacity(capacity),
            capacity,
            emitted: 0,
            overflowed: 0,
        }
    }

    /// Queue an event, evicting the oldest one when full.
    pub fn push(&mut self, event: Event) {
        if self.pending.len() == self.capacity {
            self.pending.pop_front();
            self.overflowed += 1;
        }
        self.pending.push_back(event);
        self.emitted += 1;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Events ever pushed, evicted ones included.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Events evicted before they could be delivered.
    pub fn overflowed(&self) -> u64 {
        self.overflowed
    }

    /// Pending events, oldest first.
    pub fn iter(&self) -> std::collections::vec_deque::Iter<'_, Event> {
        self.pending.iter()
    }

    fn take(&mut self) -> Vec<Event> {
        self.pending.drain(..).collect()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&Event)>;

struct Subscription {
    /// `None` watches every event of the kind.
    node: Option<NodeId>,
    listener: PassiveListener,
}

impl Subscription {
    fn wants(&self, event: &Event) -> bool {
        match self.node {
            None => true,
            Some(node) => event.node() == Some(node),
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// One buffer and one subscriber list per event kind, plus suppression
/// flags.
#[derive(Debug)]
pub struct EventBus {
    /// Allocated lazily on first emit.
    buffers: [Option<EventBuffer>; EVENT_KIND_COUNT],
    suppressed: [bool; EVENT_KIND_COUNT],
    subscriptions: [Vec<Subscription>; EVENT_KIND_COUNT],
    capacity: usize,
}

impl EventBus {
    /// Create a bus whose per-kind buffers hold `capacity` pending events.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            subscriptions: Default::default(),
            capacity,
        }
    }

    /// Stop recording a kind. Its buffer is dropped and never reallocated.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.buffers[kind.index()] = None;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Record an event unless its kind is suppressed.
    pub fn emit(&mut self, event: Event) {
        let idx = event.kind().index();
        if self.suppressed[idx] {
            return;
        }
        let capacity = self.capacity;
        self.buffers[idx]
            .get_or_insert_with(|| EventBuffer::new(capacity))
            .push(event);
    }

    /// Watch every event of `kind`.
    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.subscriptions[kind.index()].push(Subscription {
            node: None,
            listener,
        });
    }

    /// Watch only the events of `kind` that concern `node`. Kinds that
    /// carry no node never reach such a listener.
    pub fn on_node(&mut self, kind: EventKind, node: NodeId, listener: PassiveListener) {
        self.subscriptions[kind.index()].push(Subscription {
            node: Some(node),
            listener,
        });
    }

    /// Hand every pending event to its subscribers and empty the buffers.
    ///
    /// Kinds are delivered in declaration order, subscribers in
    /// registration order, events oldest first.
    pub fn deliver(&mut self) {
        for kind in EventKind::ALL {
            let idx = kind.index();
            let Some(buffer) = self.buffers[idx].as_mut() else {
                continue;
            };
            if buffer.is_empty() {
                continue;
            }
            let events = buffer.take();
            for subscription in &mut self.subscriptions[idx] {
                for event in &events {
                    if subscription.wants(event) {
                        (subscription.listener)(event);
                    }
                }
            }
        }
    }

    pub fn buffer(&self, kind: EventKind) -> Option<&EventBuffer> {
        self.buffers[kind.index()].as_ref()
    }

    /// Events of a kind waiting for the next delivery.
    pub fn buffered_count(&self, kind: EventKind) -> usize {
        self.buffer(kind).map_or(0, EventBuffer::len)
    }

    /// Events ever emitted for a kind, delivered or not.
    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.buffer(kind).map_or(0, EventBuffer::emitted)
    }

    /// Drop pending events. Subscriptions and suppression stay.
    pub fn clear_all(&mut self) {
        for buffer in self.buffers.iter_mut().flatten() {
            buffer.clear();
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::foreign_node;
    use slotmap::SlotMap;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn spike(tick: Ticks) -> Event {
        Event::SpikeTriggered {
            node: foreign_node(),
            intensity: Fixed64::from_num(50),
            tick,
        }
    }

    #[test]
    fn full_buffer_evicts_oldest() {
        let mut buf = EventBuffer::new(3);
        for t in 0..5 {
            buf.push(spike(t));
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.emitted(), 5);
        assert_eq!(buf.overflowed(), 2);
        let ticks: Vec<Ticks> = buf.iter().map(Event::tick).collect();
        assert_eq!(ticks, vec![2, 3, 4]);
    }

    #[test]
    fn all_kinds_match_their_index() {
        for (i, kind) in EventKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn zero_capacity_clamped() {
        assert_eq!(EventBuffer::new(0).capacity(), 1);
    }

    #[test]
    fn deliver_reaches_listeners_and_clears() {
        let mut bus = EventBus::new(16);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        bus.on_passive(
            EventKind::SpikeTriggered,
            Box::new(move |e| sink.borrow_mut().push(e.tick())),
        );

        bus.emit(spike(1));
        bus.emit(spike(2));
        assert_eq!(bus.buffered_count(EventKind::SpikeTriggered), 2);

        bus.deliver();
        assert_eq!(*seen.borrow(), vec![1, 2]);
        assert_eq!(bus.buffered_count(EventKind::SpikeTriggered), 0);
        assert_eq!(bus.total_emitted(EventKind::SpikeTriggered), 2);
    }

    #[test]
    fn suppressed_kind_never_buffers() {
        let mut bus = EventBus::default();
        bus.suppress(EventKind::SpikeTriggered);
        bus.emit(spike(1));
        assert!(bus.is_suppressed(EventKind::SpikeTriggered));
        assert!(bus.buffer(EventKind::SpikeTriggered).is_none());
        assert_eq!(bus.total_emitted(EventKind::SpikeTriggered), 0);
    }

    #[test]
    fn node_listener_sees_only_its_node() {
        let mut ids: SlotMap<NodeId, ()> = SlotMap::with_key();
        let (watched, other) = (ids.insert(()), ids.insert(()));

        let mut bus = EventBus::default();
        let hits = Rc::new(RefCell::new(Vec::new()));
        let sink = hits.clone();
        bus.on_node(
            EventKind::NodeDepleted,
            watched,
            Box::new(move |e| sink.borrow_mut().push(e.tick())),
        );

        for (tick, node) in [(1, watched), (2, other), (3, watched)] {
            bus.emit(Event::NodeDepleted {
                node,
                inventory: Fixed64::ZERO,
                tick,
            });
        }
        bus.deliver();
        assert_eq!(*hits.borrow(), vec![1, 3]);
    }

    #[test]
    fn node_listener_ignores_nodeless_kinds() {
        let mut bus = EventBus::default();
        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        bus.on_node(
            EventKind::EffectExpired,
            foreign_node(),
            Box::new(move |_| *c.borrow_mut() += 1),
        );
        bus.emit(Event::EffectExpired { count: 2, tick: 0 });
        bus.deliver();
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let mut bus = EventBus::default();
        let order = Rc::new(RefCell::new(Vec::new()));
        for label in ["first", "second", "third"] {
            let order = order.clone();
            bus.on_passive(
                EventKind::EffectExpired,
                Box::new(move |_| order.borrow_mut().push(label)),
            );
        }
        bus.emit(Event::EffectExpired { count: 1, tick: 0 });
        bus.deliver();
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn clear_all_drops_buffered_events() {
        let mut bus = EventBus::default();
        bus.emit(spike(0));
        bus.emit(Event::SimulationReset {
            cancelled_spawns: 0,
            tick: 0,
        });
        bus.clear_all();
        assert_eq!(bus.buffered_count(EventKind::SpikeTriggered), 0);
        assert_eq!(bus.buffered_count(EventKind::SimulationReset), 0);
    }
}
