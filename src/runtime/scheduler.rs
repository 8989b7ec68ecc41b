use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

/// Identity of a mounted component instance within its host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(pub(crate) usize);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "component#{}", self.0)
    }
}

/// Render queue shared by a host and the invalidators it hands out.
pub(crate) struct Scheduler {
    queue: RefCell<VecDeque<ComponentId>>,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self {
            queue: RefCell::new(VecDeque::new()),
        }
    }

    pub(crate) fn enqueue(&self, id: ComponentId) {
        self.queue.borrow_mut().push_back(id);
    }

    pub(crate) fn requeue_front(&self, id: ComponentId) {
        self.queue.borrow_mut().push_front(id);
    }

    pub(crate) fn pop(&self) -> Option<ComponentId> {
        self.queue.borrow_mut().pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.borrow().len()
    }
}

/// Per-instance render bookkeeping.
pub(crate) struct RenderState {
    pub(crate) id: ComponentId,
    version: Cell<u64>,
    invalidations: Cell<u64>,
    passes: Cell<u64>,
    queued: Cell<bool>,
}

impl RenderState {
    pub(crate) fn new(id: ComponentId) -> Self {
        Self {
            id,
            version: Cell::new(0),
            invalidations: Cell::new(0),
            passes: Cell::new(0),
            queued: Cell::new(false),
        }
    }

    pub(crate) fn version(&self) -> u64 {
        self.version.get()
    }

    pub(crate) fn invalidations(&self) -> u64 {
        self.invalidations.get()
    }

    /// Queue a render unless one is already queued.
    pub(crate) fn request(&self, scheduler: &Weak<Scheduler>) {
        if self.queued.replace(true) {
            return;
        }
        if let Some(scheduler) = scheduler.upgrade() {
            scheduler.enqueue(self.id);
        }
    }

    /// Called when a render pass starts; later invalidations queue a new one.
    /// Both invocations of a strict-mode pass share the returned number.
    pub(crate) fn begin_render(&self) -> u64 {
        self.queued.set(false);
        let pass = self.passes.get() + 1;
        self.passes.set(pass);
        pass
    }
}

/// Typed re-render signal for one component instance.
///
/// Each call to [`invalidate`](Invalidator::invalidate) bumps the instance's
/// render version and queues it for the next [`Host::flush`]. The signal
/// carries no data; bridges keep the value they observed in their own hook.
///
/// [`Host::flush`]: crate::runtime::Host::flush
#[derive(Clone)]
pub struct Invalidator {
    state: Weak<RenderState>,
    scheduler: Weak<Scheduler>,
}

impl Invalidator {
    pub(crate) fn new(state: &Rc<RenderState>, scheduler: &Weak<Scheduler>) -> Self {
        Self {
            state: Rc::downgrade(state),
            scheduler: scheduler.clone(),
        }
    }

    /// Schedule a re-render. No-op once the instance is gone.
    pub fn invalidate(&self) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        state.version.set(state.version.get() + 1);
        state.invalidations.set(state.invalidations.get() + 1);
        state.request(&self.scheduler);
    }

    /// The owning instance's render version, if it still exists.
    pub fn version(&self) -> Option<u64> {
        self.state.upgrade().map(|state| state.version())
    }
}

impl fmt::Debug for Invalidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invalidator")
            .field("component", &self.state.upgrade().map(|state| state.id))
            .field("version", &self.version())
            .finish()
    }
}
