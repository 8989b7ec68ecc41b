use std::any::Any;
use std::rc::Rc;

use super::config::HostConfig;
use super::scheduler::{ComponentId, Invalidator};

/// Per-instance state created at a fixed call position during render.
///
/// The host calls [`on_attach`](Hook::on_attach) after the instance's first
/// committed render and [`on_detach`](Hook::on_detach) when the instance (or
/// a discarded strict-mode render attempt) goes away. In strict mode an
/// attached instance is also detached and re-attached once right after mount.
pub trait Hook: 'static {
    fn on_attach(&self) {}

    fn on_detach(&self) {}
}

pub(crate) struct HookSlot {
    value: Rc<dyn Any>,
    lifecycle: Rc<dyn Hook>,
}

pub(crate) fn attach_all(hooks: &[HookSlot]) {
    for slot in hooks {
        slot.lifecycle.on_attach();
    }
}

/// Detach in reverse creation order.
pub(crate) fn detach_all(hooks: &[HookSlot]) {
    for slot in hooks.iter().rev() {
        slot.lifecycle.on_detach();
    }
}

/// Render context handed to [`Component::render`](super::Component::render).
pub struct Scope<'a> {
    hooks: &'a mut Vec<HookSlot>,
    cursor: usize,
    component: ComponentId,
    pass: u64,
    invalidator: Invalidator,
    config: &'a HostConfig,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(
        hooks: &'a mut Vec<HookSlot>,
        component: ComponentId,
        pass: u64,
        invalidator: Invalidator,
        config: &'a HostConfig,
    ) -> Self {
        Self {
            hooks,
            cursor: 0,
            component,
            pass,
            invalidator,
            config,
        }
    }

    /// Return the hook at the current call position, creating it with `init`
    /// on the instance's first render.
    ///
    /// # Panics
    ///
    /// Panics if a previous render created a hook of a different type at this
    /// position, which means hooks were called conditionally.
    pub fn use_hook<H, F>(&mut self, init: F) -> Rc<H>
    where
        H: Hook,
        F: FnOnce() -> H,
    {
        let index = self.cursor;
        self.cursor += 1;

        if let Some(slot) = self.hooks.get(index) {
            return match Rc::clone(&slot.value).downcast::<H>() {
                Ok(hook) => hook,
                Err(_) => panic!(
                    "{}: hook #{index} changed type between renders; hooks must be called unconditionally",
                    self.component
                ),
            };
        }

        let hook = Rc::new(init());
        self.hooks.push(HookSlot {
            value: Rc::clone(&hook) as Rc<dyn Any>,
            lifecycle: Rc::clone(&hook) as Rc<dyn Hook>,
        });
        hook
    }

    /// Re-render signal for the instance being rendered.
    pub fn invalidator(&self) -> Invalidator {
        self.invalidator.clone()
    }

    pub fn component_id(&self) -> ComponentId {
        self.component
    }

    /// Number of the render pass in progress. Strict-mode double invocations
    /// of one pass see the same number.
    pub fn render_pass(&self) -> u64 {
        self.pass
    }

    pub fn config(&self) -> &HostConfig {
        self.config
    }
}
