//! Online/offline tracking
//!
//! The host environment owns the truth about connectivity and announces
//! transitions through [`NetworkEnvironment`] listeners. A
//! [`ConnectivityMonitor`] mirrors that state for its subscribers and keeps
//! exactly one pair of environment listeners registered while at least one
//! [`Subscription`] is alive.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Connectivity transition announced by the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Online,
    Offline,
}

impl ConnectivityEvent {
    fn is_online(self) -> bool {
        matches!(self, ConnectivityEvent::Online)
    }
}

/// Handle for a registered environment listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Callback invoked by the environment on a matching event
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Host-side source of connectivity state and transition events
pub trait NetworkEnvironment: Send + Sync {
    /// Current connectivity as reported by the host
    fn is_online(&self) -> bool;

    /// Register `listener` for `event`
    fn add_listener(&self, event: ConnectivityEvent, listener: Listener) -> ListenerId;

    /// Unregister a listener; returns false if it was not registered
    fn remove_listener(&self, id: ListenerId) -> bool;
}

/// Environment driven explicitly by the host
///
/// Call [`set_online`](Self::set_online) whenever the host learns about a
/// connectivity change. Listeners fire only on actual transitions.
pub struct ManualNetwork {
    online: AtomicBool,
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, ConnectivityEvent, Listener)>>,
}

impl ManualNetwork {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Record the host's connectivity and fire listeners on a change
    pub fn set_online(&self, online: bool) {
        if self.online.swap(online, Ordering::SeqCst) == online {
            return;
        }

        let event = if online {
            ConnectivityEvent::Online
        } else {
            ConnectivityEvent::Offline
        };

        // Listeners may unregister themselves, so call them unlocked.
        let matching: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .filter(|(_, registered, _)| *registered == event)
            .map(|(_, _, listener)| Arc::clone(listener))
            .collect();

        for listener in matching {
            listener();
        }
    }

    pub fn go_online(&self) {
        self.set_online(true);
    }

    pub fn go_offline(&self) {
        self.set_online(false);
    }

    /// Number of listeners currently registered
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl Default for ManualNetwork {
    fn default() -> Self {
        Self::new(true)
    }
}

impl fmt::Debug for ManualNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualNetwork")
            .field("online", &self.online.load(Ordering::SeqCst))
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl NetworkEnvironment for ManualNetwork {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn add_listener(&self, event: ConnectivityEvent, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, event, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        match listeners.iter().position(|(existing, _, _)| *existing == id) {
            Some(index) => {
                listeners.swap_remove(index);
                true
            }
            None => false,
        }
    }
}

type Subscriber = Arc<dyn Fn(bool) + Send + Sync>;

struct SubscriberEntry {
    id: u64,
    live: Arc<AtomicBool>,
    on_change: Subscriber,
}

struct MonitorState {
    online: bool,
    next_subscriber: u64,
    subscribers: Vec<SubscriberEntry>,
    env_listeners: Option<[ListenerId; 2]>,
    registering: bool,
}

struct MonitorInner {
    environment: Arc<dyn NetworkEnvironment>,
    state: Mutex<MonitorState>,
}

impl MonitorInner {
    fn transition(&self, online: bool) {
        let subscribers: Vec<(Arc<AtomicBool>, Subscriber)> = {
            let mut state = self.state.lock();
            state.online = online;
            state
                .subscribers
                .iter()
                .map(|entry| (Arc::clone(&entry.live), Arc::clone(&entry.on_change)))
                .collect()
        };

        tracing::debug!(online, subscribers = subscribers.len(), "connectivity changed");
        // An earlier callback may have cancelled a later subscription.
        for (live, on_change) in subscribers {
            if live.load(Ordering::SeqCst) {
                on_change(online);
            }
        }
    }

    fn unsubscribe(&self, id: u64) {
        let released = {
            let mut state = self.state.lock();
            state.subscribers.retain(|entry| entry.id != id);
            if state.subscribers.is_empty() {
                state.env_listeners.take()
            } else {
                None
            }
        };

        if let Some(listeners) = released {
            for listener in listeners {
                self.environment.remove_listener(listener);
            }
            tracing::debug!("released connectivity listeners");
        }
    }
}

/// Injectable view of the host's connectivity
///
/// Cheap to clone; clones share subscribers.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<MonitorInner>,
}

impl ConnectivityMonitor {
    pub fn new(environment: Arc<dyn NetworkEnvironment>) -> Self {
        let online = environment.is_online();
        Self {
            inner: Arc::new(MonitorInner {
                environment,
                state: Mutex::new(MonitorState {
                    online,
                    next_subscriber: 1,
                    subscribers: Vec::new(),
                    env_listeners: None,
                    registering: false,
                }),
            }),
        }
    }

    /// Current connectivity, read straight from the environment
    pub fn is_online(&self) -> bool {
        self.inner.environment.is_online()
    }

    /// Subscribe to connectivity transitions
    ///
    /// `on_change` runs synchronously for every transition until the
    /// returned [`Subscription`] is dropped or unsubscribed. The first live
    /// subscription registers the environment listeners; the last one to go
    /// releases them.
    pub fn subscribe<F>(&self, on_change: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let online = self.inner.environment.is_online();
        let live = Arc::new(AtomicBool::new(true));

        let (id, needs_listeners) = {
            let mut state = self.inner.state.lock();
            state.online = online;

            let id = state.next_subscriber;
            state.next_subscriber += 1;
            state.subscribers.push(SubscriberEntry {
                id,
                live: Arc::clone(&live),
                on_change: Arc::new(on_change),
            });

            let needs_listeners = state.env_listeners.is_none() && !state.registering;
            state.registering |= needs_listeners;
            (id, needs_listeners)
        };

        // The environment is called unlocked; its listeners lock `state`.
        if needs_listeners {
            let listeners = [
                self.register(ConnectivityEvent::Online),
                self.register(ConnectivityEvent::Offline),
            ];
            let orphaned = {
                let mut state = self.inner.state.lock();
                state.registering = false;
                if state.subscribers.is_empty() {
                    Some(listeners)
                } else {
                    state.env_listeners = Some(listeners);
                    None
                }
            };
            match orphaned {
                Some(listeners) => {
                    for listener in listeners {
                        self.inner.environment.remove_listener(listener);
                    }
                }
                None => tracing::debug!("registered connectivity listeners"),
            }
        }

        Subscription {
            monitor: Arc::downgrade(&self.inner),
            id,
            live,
        }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().subscribers.len()
    }

    fn register(&self, event: ConnectivityEvent) -> ListenerId {
        let monitor: Weak<MonitorInner> = Arc::downgrade(&self.inner);
        let online = event.is_online();
        self.inner.environment.add_listener(
            event,
            Arc::new(move || {
                if let Some(monitor) = monitor.upgrade() {
                    monitor.transition(online);
                }
            }),
        )
    }
}

impl fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("online", &self.is_online())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// A live connectivity subscription
///
/// Dropping it stops notifications.
#[derive(Debug)]
pub struct Subscription {
    monitor: Weak<MonitorInner>,
    id: u64,
    live: Arc<AtomicBool>,
}

impl Subscription {
    /// Mirrored connectivity state
    ///
    /// Reports offline once the monitor itself is gone.
    pub fn is_online(&self) -> bool {
        self.monitor
            .upgrade()
            .is_some_and(|monitor| monitor.state.lock().online)
    }

    /// Stop notifications now
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.live.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(monitor) = self.monitor.upgrade() {
            monitor.unsubscribe(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
