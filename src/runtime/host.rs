use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use super::config::HostConfig;
use super::error::HostError;
use super::scheduler::{ComponentId, Invalidator, RenderState, Scheduler};
use super::scope::{attach_all, detach_all, HookSlot, Scope};

/// Something a [`Host`] can mount and render.
pub trait Component: 'static {
    type Output: 'static;

    fn render(&mut self, scope: &mut Scope<'_>) -> Self::Output;
}

/// A [`Component`] backed by a render closure. See [`Host::mount_fn`].
pub struct RenderFn<F>(F);

impl<F, O> Component for RenderFn<F>
where
    F: FnMut(&mut Scope<'_>) -> O + 'static,
    O: 'static,
{
    type Output = O;

    fn render(&mut self, scope: &mut Scope<'_>) -> O {
        (self.0)(scope)
    }
}

type Registry = RefCell<HashMap<ComponentId, Weak<dyn Renderable>>>;

trait Renderable {
    /// Render once if attached. Returns whether a render happened.
    fn render_pass(&self) -> Result<bool, HostError>;
}

struct Instance<C: Component> {
    state: Rc<RenderState>,
    component: RefCell<C>,
    hooks: RefCell<Vec<HookSlot>>,
    outputs: RefCell<Vec<C::Output>>,
    attached: Cell<bool>,
    config: HostConfig,
    scheduler: Weak<Scheduler>,
    registry: Weak<Registry>,
}

impl<C: Component> Instance<C> {
    fn id(&self) -> ComponentId {
        self.state.id
    }

    fn render_with(&self, component: &mut C, hooks: &mut Vec<HookSlot>, pass: u64) -> C::Output {
        let invalidator = Invalidator::new(&self.state, &self.scheduler);
        let mut scope = Scope::new(hooks, self.id(), pass, invalidator, &self.config);
        component.render(&mut scope)
    }

    fn mount(&self) {
        let mut component = self.component.borrow_mut();
        let mut hooks = self.hooks.borrow_mut();
        let pass = self.state.begin_render();

        if self.config.is_strict() {
            let mut discarded = Vec::new();
            drop(self.render_with(&mut component, &mut discarded, pass));
            detach_all(&discarded);
            debug!(component = %self.id(), hooks = discarded.len(), "discarded strict-mode render attempt");
        }

        let output = self.render_with(&mut component, &mut hooks, pass);
        self.outputs.borrow_mut().push(output);
        self.attached.set(true);
        attach_all(&hooks);

        if self.config.is_strict() {
            detach_all(&hooks);
            attach_all(&hooks);
        }
        debug!(component = %self.id(), hooks = hooks.len(), "mounted");
    }

    fn detach(&self) {
        if !self.attached.replace(false) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.borrow_mut().remove(&self.id());
        }
        let hooks = match self.hooks.try_borrow_mut() {
            Ok(mut hooks) => std::mem::take(&mut *hooks),
            Err(_) => return,
        };
        detach_all(&hooks);
        debug!(component = %self.id(), "unmounted");
    }
}

impl<C: Component> Renderable for Instance<C> {
    fn render_pass(&self) -> Result<bool, HostError> {
        if !self.attached.get() {
            return Ok(false);
        }
        let reentrant = HostError::Reentrant { id: self.id() };
        let mut component = self
            .component
            .try_borrow_mut()
            .map_err(|_| reentrant.clone())?;
        let mut hooks = self.hooks.try_borrow_mut().map_err(|_| reentrant)?;

        let pass = self.state.begin_render();
        if self.config.is_strict() {
            drop(self.render_with(&mut component, &mut hooks, pass));
        }
        let output = self.render_with(&mut component, &mut hooks, pass);
        self.outputs.borrow_mut().push(output);
        Ok(true)
    }
}

/// Single-threaded component host.
///
/// Stores invalidate instances from their listeners; nothing re-renders until
/// [`flush`](Host::flush) drains the queue.
///
/// # Examples
///
/// ```
/// use tincan_bind::runtime::{Host, HostConfig};
/// use tincan_bind::{use_store, Store};
///
/// let host = Host::new(HostConfig::default());
/// let count = Store::new(0);
///
/// let view = host.mount_fn({
///     let count = count.clone();
///     move |scope| use_store(scope, &count)
/// });
///
/// count.set(1);
/// host.flush().unwrap();
/// assert_eq!(view.outputs(), vec![0, 1]);
/// ```
pub struct Host {
    config: HostConfig,
    scheduler: Rc<Scheduler>,
    instances: Rc<Registry>,
    next_id: Cell<usize>,
    flushing: Cell<bool>,
}

impl Host {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            scheduler: Rc::new(Scheduler::new()),
            instances: Rc::new(RefCell::new(HashMap::new())),
            next_id: Cell::new(0),
            flushing: Cell::new(false),
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Render `component` for the first time and attach its hooks.
    pub fn mount<C: Component>(&self, component: C) -> Mounted<C> {
        let id = ComponentId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let instance = Rc::new(Instance {
            state: Rc::new(RenderState::new(id)),
            component: RefCell::new(component),
            hooks: RefCell::new(Vec::new()),
            outputs: RefCell::new(Vec::new()),
            attached: Cell::new(false),
            config: self.config.clone(),
            scheduler: Rc::downgrade(&self.scheduler),
            registry: Rc::downgrade(&self.instances),
        });
        instance.mount();

        let renderable: Rc<dyn Renderable> = instance.clone();
        self.instances
            .borrow_mut()
            .insert(id, Rc::downgrade(&renderable));
        Mounted { instance }
    }

    /// Mount a render closure.
    pub fn mount_fn<F, O>(&self, render: F) -> Mounted<RenderFn<F>>
    where
        F: FnMut(&mut Scope<'_>) -> O + 'static,
        O: 'static,
    {
        self.mount(RenderFn(render))
    }

    /// Number of instances mounted and not yet unmounted.
    pub fn mounted_count(&self) -> usize {
        self.instances.borrow().len()
    }

    /// Number of instances waiting to re-render.
    pub fn pending(&self) -> usize {
        self.scheduler.len()
    }

    /// Re-render every invalidated instance, including ones invalidated by
    /// the renders themselves. Returns the number of renders performed.
    pub fn flush(&self) -> Result<usize, HostError> {
        if self.flushing.replace(true) {
            return Err(HostError::FlushInProgress);
        }
        let result = self.drain();
        self.flushing.set(false);
        result
    }

    fn drain(&self) -> Result<usize, HostError> {
        let limit = self.config.render_limit();
        let mut renders = 0;

        while let Some(id) = self.scheduler.pop() {
            let instance = self.instances.borrow().get(&id).and_then(Weak::upgrade);
            let Some(instance) = instance else {
                self.instances.borrow_mut().remove(&id);
                continue;
            };
            if renders >= limit {
                self.scheduler.requeue_front(id);
                return Err(HostError::RenderLimitExceeded { limit });
            }
            if instance.render_pass()? {
                renders += 1;
            }
        }

        debug!(renders, "flush complete");
        Ok(renders)
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new(HostConfig::default())
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("config", &self.config)
            .field("instances", &self.instances.borrow().len())
            .field("pending", &self.scheduler.len())
            .finish()
    }
}

/// Handle to a mounted component. Dropping it unmounts the component.
pub struct Mounted<C: Component> {
    instance: Rc<Instance<C>>,
}

impl<C: Component> Mounted<C> {
    pub fn id(&self) -> ComponentId {
        self.instance.id()
    }

    /// Change the component's props and queue a re-render.
    pub fn update<F>(&self, f: F) -> Result<(), HostError>
    where
        F: FnOnce(&mut C),
    {
        let mut component = self
            .instance
            .component
            .try_borrow_mut()
            .map_err(|_| HostError::Reentrant { id: self.id() })?;
        f(&mut *component);
        drop(component);
        self.instance.state.request(&self.instance.scheduler);
        Ok(())
    }

    /// Committed renders so far, including the first.
    pub fn render_count(&self) -> usize {
        self.instance.outputs.borrow().len()
    }

    /// Times a bridge (or anyone holding the invalidator) asked for a render.
    pub fn invalidations(&self) -> u64 {
        self.instance.state.invalidations()
    }

    pub fn version(&self) -> u64 {
        self.instance.state.version()
    }

    pub fn is_attached(&self) -> bool {
        self.instance.attached.get()
    }

    /// Run `f` over every committed output, oldest first.
    pub fn with_outputs<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[C::Output]) -> R,
    {
        let outputs = self.instance.outputs.borrow();
        f(&outputs[..])
    }

    /// Release every hook. Same as dropping the handle.
    pub fn unmount(self) {
        drop(self);
    }
}

impl<C: Component> Mounted<C>
where
    C::Output: Clone,
{
    pub fn outputs(&self) -> Vec<C::Output> {
        self.instance.outputs.borrow().clone()
    }

    pub fn last_output(&self) -> Option<C::Output> {
        self.instance.outputs.borrow().last().cloned()
    }
}

impl<C: Component> Drop for Mounted<C> {
    fn drop(&mut self) {
        self.instance.detach();
    }
}

impl<C: Component> fmt::Debug for Mounted<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mounted")
            .field("id", &self.id())
            .field("renders", &self.render_count())
            .field("attached", &self.is_attached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Hook;

    struct Probe {
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Hook for Probe {
        fn on_attach(&self) {
            self.log.borrow_mut().push("attach");
        }

        fn on_detach(&self) {
            self.log.borrow_mut().push("detach");
        }
    }

    fn probe_component(
        log: Rc<RefCell<Vec<&'static str>>>,
    ) -> impl FnMut(&mut Scope<'_>) -> usize + 'static {
        let mut renders = 0;
        move |scope: &mut Scope<'_>| {
            let log = log.clone();
            scope.use_hook(move || Probe { log });
            renders += 1;
            renders
        }
    }

    #[test]
    fn lifecycle_events_in_normal_mode() {
        let host = Host::default();
        let log = Rc::new(RefCell::new(Vec::new()));
        let mounted = host.mount_fn(probe_component(log.clone()));

        assert_eq!(*log.borrow(), vec!["attach"]);
        assert_eq!(mounted.render_count(), 1);

        mounted.update(|_| {}).unwrap();
        assert_eq!(host.flush().unwrap(), 1);
        assert_eq!(mounted.outputs(), vec![1, 2]);

        mounted.unmount();
        assert_eq!(*log.borrow(), vec!["attach", "detach"]);
    }

    #[test]
    fn strict_mode_discards_first_attempt_and_remounts() {
        let host = Host::new(HostConfig::new().strict(true));
        let log = Rc::new(RefCell::new(Vec::new()));
        let mounted = host.mount_fn(probe_component(log.clone()));

        // Discarded attempt, then commit, then the simulated remount.
        assert_eq!(*log.borrow(), vec!["detach", "attach", "detach", "attach"]);
        assert_eq!(mounted.outputs(), vec![2]);

        mounted.update(|_| {}).unwrap();
        host.flush().unwrap();
        assert_eq!(mounted.outputs(), vec![2, 4]);
    }

    #[test]
    fn flush_skips_unmounted_instances() {
        let host = Host::default();
        let log = Rc::new(RefCell::new(Vec::new()));
        let mounted = host.mount_fn(probe_component(log));
        mounted.update(|_| {}).unwrap();
        drop(mounted);

        assert_eq!(host.pending(), 1);
        assert_eq!(host.flush().unwrap(), 0);
        assert_eq!(host.pending(), 0);
    }

    #[test]
    fn unmounted_instances_leave_the_registry() {
        let host = Host::default();
        let log = Rc::new(RefCell::new(Vec::new()));
        let kept = host.mount_fn(probe_component(log.clone()));

        for _ in 0..1000 {
            drop(host.mount_fn(probe_component(log.clone())));
        }
        assert_eq!(host.mounted_count(), 1);
        assert_eq!(host.flush().unwrap(), 0);

        kept.unmount();
        assert_eq!(host.mounted_count(), 0);
    }

    #[test]
    fn self_invalidating_component_hits_render_limit() {
        let host = Host::new(HostConfig::new().max_renders_per_flush(5));
        let mounted = host.mount_fn(|scope| scope.invalidator().invalidate());

        let err = host.flush().unwrap_err();
        assert_eq!(err, HostError::RenderLimitExceeded { limit: 5 });
        assert_eq!(mounted.render_count(), 6);
        assert_eq!(host.pending(), 1);
    }
}
