use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

type Callback<T> = Box<dyn FnMut(&T)>;

/// A registered listener.
///
/// Releasing a slot clears `active`, so a delivery round that already holds a
/// snapshot of the slot list skips it. `since` is the last generation queued
/// before the slot was added; the subscribe-time delivery already covers it.
pub(crate) struct ListenerSlot<T> {
    active: Cell<bool>,
    since: u64,
    callback: RefCell<Callback<T>>,
}

impl<T> ListenerSlot<T> {
    pub(crate) fn deliver(&self, value: &T) {
        if !self.active.get() {
            return;
        }
        // Never re-enter a listener that is already running.
        if let Ok(mut callback) = self.callback.try_borrow_mut() {
            callback(value);
        }
    }
}

/// Listener list shared by every store flavour in the crate.
///
/// Values handed to [`Listeners::notify`] while a delivery round is running are
/// queued and delivered afterwards, so every listener observes values in the
/// order they were written.
pub(crate) struct Listeners<T> {
    slots: RefCell<Vec<Rc<ListenerSlot<T>>>>,
    pending: RefCell<VecDeque<(u64, T)>>,
    generation: Cell<u64>,
    delivering: Cell<bool>,
}

impl<T: 'static> Listeners<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: RefCell::new(Vec::new()),
            pending: RefCell::new(VecDeque::new()),
            generation: Cell::new(0),
            delivering: Cell::new(false),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }

    pub(crate) fn add(&self, callback: Callback<T>) -> Rc<ListenerSlot<T>> {
        let slot = Rc::new(ListenerSlot {
            active: Cell::new(true),
            since: self.generation.get(),
            callback: RefCell::new(callback),
        });
        self.slots.borrow_mut().push(Rc::clone(&slot));
        slot
    }

    /// Deactivate and unlink a slot. Returns `false` if it was already gone.
    pub(crate) fn remove(&self, slot: &Rc<ListenerSlot<T>>) -> bool {
        slot.active.set(false);
        let mut slots = self.slots.borrow_mut();
        let before = slots.len();
        slots.retain(|s| !Rc::ptr_eq(s, slot));
        before != slots.len()
    }

    pub(crate) fn notify(&self, value: T) {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        self.pending.borrow_mut().push_back((generation, value));
        if self.delivering.replace(true) {
            return;
        }

        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some((generation, value)) = next else { break };

            // Snapshot so listeners may subscribe or release during delivery.
            let snapshot: Vec<_> = self.slots.borrow().iter().cloned().collect();
            for slot in snapshot.iter().filter(|slot| slot.since < generation) {
                slot.deliver(&value);
            }
        }

        self.delivering.set(false);
    }
}

/// Handle to a registered store listener.
///
/// [`unsubscribe`](Subscription::unsubscribe) is idempotent, and dropping the
/// handle releases the listener, the same way a `WatchGuard` does.
#[must_use = "dropping a Subscription releases the listener immediately"]
pub struct Subscription {
    release: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Subscription {
    pub(crate) fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: RefCell::new(Some(Box::new(release))),
        }
    }

    /// Release the listener. Calling this more than once has no effect.
    pub fn unsubscribe(&self) {
        let release = self.release.borrow_mut().take();
        if let Some(release) = release {
            release();
        }
    }

    /// Whether the listener is still registered through this handle.
    pub fn is_active(&self) -> bool {
        self.release.borrow().is_some()
    }

    /// Keep the listener registered for the rest of the store's life.
    pub fn forget(self) {
        self.release.borrow_mut().take();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_slot_is_skipped_mid_round() {
        let listeners: Rc<Listeners<i32>> = Rc::new(Listeners::new());
        let seen = Rc::new(RefCell::new(Vec::new()));

        let second: Rc<RefCell<Option<Rc<ListenerSlot<i32>>>>> = Rc::new(RefCell::new(None));
        let second_ref = Rc::clone(&second);
        let owner = Rc::clone(&listeners);
        listeners.add(Box::new(move |_| {
            if let Some(slot) = second_ref.borrow().as_ref() {
                owner.remove(slot);
            }
        }));

        let seen_clone = Rc::clone(&seen);
        let slot = listeners.add(Box::new(move |v| seen_clone.borrow_mut().push(*v)));
        *second.borrow_mut() = Some(slot);

        listeners.notify(1);
        assert!(seen.borrow().is_empty());
        assert_eq!(listeners.len(), 1);
    }

    #[test]
    fn nested_notify_is_delivered_in_order() {
        let listeners: Rc<Listeners<i32>> = Rc::new(Listeners::new());
        let first_seen = Rc::new(RefCell::new(Vec::new()));
        let second_seen = Rc::new(RefCell::new(Vec::new()));

        let owner = Rc::clone(&listeners);
        let first_clone = Rc::clone(&first_seen);
        listeners.add(Box::new(move |v| {
            first_clone.borrow_mut().push(*v);
            if *v == 1 {
                owner.notify(2);
            }
        }));
        let second_clone = Rc::clone(&second_seen);
        listeners.add(Box::new(move |v| second_clone.borrow_mut().push(*v)));

        listeners.notify(1);
        assert_eq!(*first_seen.borrow(), vec![1, 2]);
        assert_eq!(*second_seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn slot_added_mid_round_skips_values_queued_before_it() {
        let listeners: Rc<Listeners<i32>> = Rc::new(Listeners::new());
        let late_seen = Rc::new(RefCell::new(Vec::new()));

        let owner = Rc::clone(&listeners);
        let late_clone = Rc::clone(&late_seen);
        listeners.add(Box::new(move |v| {
            if *v == 1 {
                owner.notify(2);
                let seen = Rc::clone(&late_clone);
                owner.add(Box::new(move |v| seen.borrow_mut().push(*v)));
            }
        }));

        listeners.notify(1);
        assert!(late_seen.borrow().is_empty());

        listeners.notify(3);
        assert_eq!(*late_seen.borrow(), vec![3]);
    }

    #[test]
    fn subscription_releases_once() {
        let count = Rc::new(Cell::new(0));
        let count_clone = Rc::clone(&count);
        let sub = Subscription::new(move || count_clone.set(count_clone.get() + 1));

        assert!(sub.is_active());
        sub.unsubscribe();
        sub.unsubscribe();
        drop(sub);
        assert_eq!(count.get(), 1);
    }
}
