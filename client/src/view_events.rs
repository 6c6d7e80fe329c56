use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// View lifecycle notifications emitted by the map view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewEvent {
    ZoomStart,
    Move,
    Zoom,
    MoveEnd,
    ZoomEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Rc<dyn Fn(ViewEvent)>;

struct Entry {
    id: SubscriptionId,
    kind: ViewEvent,
    handler: Handler,
}

/// Single-threaded pub/sub for view events. Cloning shares the same subscriber list.
#[derive(Clone, Default)]
pub struct ViewEventBus {
    inner: Rc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    next_id: Cell<u64>,
    entries: RefCell<Vec<Entry>>,
}

impl ViewEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, kind: ViewEvent, handler: impl Fn(ViewEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        self.inner.entries.borrow_mut().push(Entry {
            id,
            kind,
            handler: Rc::new(handler),
        });
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut entries = self.inner.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        entries.len() != before
    }

    pub fn emit(&self, kind: ViewEvent) {
        // Snapshot first: handlers may subscribe or unsubscribe while running.
        let handlers: Vec<(SubscriptionId, Handler)> = self
            .inner
            .entries
            .borrow()
            .iter()
            .filter(|entry| entry.kind == kind)
            .map(|entry| (entry.id, entry.handler.clone()))
            .collect();
        for (id, handler) in handlers {
            if self.is_subscribed(id) {
                handler(kind);
            }
        }
    }

    fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.inner.entries.borrow().iter().any(|entry| entry.id == id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.entries.borrow().len()
    }
}

/// Every `on` made through this guard is undone with `off` when it is cleared or dropped.
pub struct Subscriptions {
    bus: ViewEventBus,
    ids: Vec<SubscriptionId>,
}

impl Subscriptions {
    pub fn new(bus: &ViewEventBus) -> Self {
        Self {
            bus: bus.clone(),
            ids: Vec::new(),
        }
    }

    pub fn on(&mut self, kind: ViewEvent, handler: impl Fn(ViewEvent) + 'static) {
        let id = self.bus.on(kind, handler);
        self.ids.push(id);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn clear(&mut self) {
        for id in self.ids.drain(..) {
            self.bus.off(id);
        }
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        self.clear();
    }
}
