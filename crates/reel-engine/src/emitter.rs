use std::collections::HashMap;

use reel_core::events::{AdEvent, AdEventKind};
use tokio::sync::broadcast;
use tracing::debug;

pub type Listener = Box<dyn FnMut(&AdEvent) + Send>;

const TAP_CAPACITY: usize = 256;

/// Delivers canonical events to host listeners (one per kind) and to any
/// broadcast subscribers, in emission order.
pub struct EventEmitter {
    listeners: HashMap<AdEventKind, Listener>,
    tap: broadcast::Sender<AdEvent>,
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventEmitter {
    pub fn new() -> Self {
        let (tap, _) = broadcast::channel(TAP_CAPACITY);
        Self {
            listeners: HashMap::new(),
            tap,
        }
    }

    /// Register `listener` for `kind`. Returns true if it replaced one.
    pub fn add(&mut self, kind: AdEventKind, listener: Listener) -> bool {
        self.listeners.insert(kind, listener).is_some()
    }

    pub fn remove(&mut self, kind: AdEventKind) -> bool {
        self.listeners.remove(&kind).is_some()
    }

    pub fn emit(&mut self, event: AdEvent) {
        debug!(event = event.event_type(), "emit");
        if let Some(listener) = self.listeners.get_mut(&event.kind()) {
            listener(&event);
        }
        if self.tap.receiver_count() > 0 {
            let _ = self.tap.send(event);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AdEvent> {
        self.tap.subscribe()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<AdEvent>>>, Listener) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, Box::new(move |e: &AdEvent| sink.lock().push(e.clone())))
    }

    #[test]
    fn routes_by_kind() {
        let mut emitter = EventEmitter::new();
        let (seen, listener) = recorder();
        assert!(!emitter.add(AdEventKind::Started, listener));

        emitter.emit(AdEvent::Started);
        emitter.emit(AdEvent::Stopped);
        assert_eq!(*seen.lock(), vec![AdEvent::Started]);
    }

    #[test]
    fn add_replaces_and_remove_detaches() {
        let mut emitter = EventEmitter::new();
        let (first, l1) = recorder();
        let (second, l2) = recorder();
        emitter.add(AdEventKind::Loaded, l1);
        assert!(emitter.add(AdEventKind::Loaded, l2));

        emitter.emit(AdEvent::Loaded);
        assert!(first.lock().is_empty());
        assert_eq!(second.lock().len(), 1);

        assert!(emitter.remove(AdEventKind::Loaded));
        assert!(!emitter.remove(AdEventKind::Loaded));
        emitter.emit(AdEvent::Loaded);
        assert_eq!(second.lock().len(), 1);
    }

    #[test]
    fn tap_sees_every_event_in_order() {
        let mut emitter = EventEmitter::new();
        let mut rx = emitter.subscribe();
        emitter.emit(AdEvent::SessionReady);
        emitter.emit(AdEvent::Log {
            message: "hi".into(),
        });
        assert_eq!(rx.try_recv().unwrap(), AdEvent::SessionReady);
        assert_eq!(rx.try_recv().unwrap().kind(), AdEventKind::Log);
    }

    #[test]
    fn clear_drops_listeners_but_not_tap() {
        let mut emitter = EventEmitter::new();
        let (seen, listener) = recorder();
        emitter.add(AdEventKind::AllCompleted, listener);
        let mut rx = emitter.subscribe();
        emitter.clear();
        emitter.emit(AdEvent::AllCompleted);
        assert!(seen.lock().is_empty());
        assert_eq!(rx.try_recv().unwrap(), AdEvent::AllCompleted);
    }
}
