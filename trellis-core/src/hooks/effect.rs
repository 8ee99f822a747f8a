//! Passive effects.
//!
//! An effect hook produces one [`EffectRecord`] per render. Records of the
//! same hook share a destroy slot, so the cleanup returned by the last
//! committed run is always found by the next one.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{Hook, RenderCx};
use crate::error::RenderResult;
use crate::fiber::Flags;

/// Cleanup returned by an effect, run before the effect re-runs and on
/// unmount.
pub type Cleanup = Box<dyn FnOnce()>;

type Create = Box<dyn FnOnce() -> Option<Cleanup>>;

/// Wrap `f` as an effect's cleanup.
pub fn cleanup<F>(f: F) -> Option<Cleanup>
where
    F: FnOnce() + 'static,
{
    Some(Box::new(f))
}

/// One render's instance of an effect hook.
pub(crate) struct EffectRecord {
    has_effect: Cell<bool>,
    create: RefCell<Option<Create>>,
    destroy: Rc<RefCell<Option<Cleanup>>>,
}

impl EffectRecord {
    /// Whether the dependencies changed in the render that produced this
    /// record.
    pub(crate) fn has_effect(&self) -> bool {
        self.has_effect.get()
    }

    pub(crate) fn run_destroy(&self) {
        let destroy = self.destroy.borrow_mut().take();
        if let Some(destroy) = destroy {
            destroy();
        }
    }

    pub(crate) fn run_create(&self) {
        let create = self.create.borrow_mut().take();
        self.has_effect.set(false);
        if let Some(create) = create {
            let destroy = create();
            *self.destroy.borrow_mut() = destroy;
        }
    }
}

pub(crate) struct EffectHook {
    effect: Rc<EffectRecord>,
    deps: Option<Rc<dyn Any>>,
}

/// Whether `next` equals the dependencies stored by the previous render.
/// Missing dependencies never compare equal.
pub(super) fn deps_equal<D: PartialEq + 'static>(next: Option<&D>, prev: Option<&Rc<dyn Any>>) -> bool {
    match (next, prev) {
        (Some(next), Some(prev)) => prev.downcast_ref::<D>() == Some(next),
        _ => false,
    }
}

impl<'a> RenderCx<'a> {
    /// Run `create` after commit whenever `deps` changed since the previous
    /// render, and on mount.
    pub fn use_effect<D, F>(&mut self, create: F, deps: D) -> RenderResult<()>
    where
        D: PartialEq + 'static,
        F: FnOnce() -> Option<Cleanup> + 'static,
    {
        self.push_effect(Box::new(create), Some(deps))
    }

    /// Run `create` after every commit of this component.
    pub fn use_effect_always<F>(&mut self, create: F) -> RenderResult<()>
    where
        F: FnOnce() -> Option<Cleanup> + 'static,
    {
        self.push_effect::<()>(Box::new(create), None)
    }

    fn push_effect<D: PartialEq + 'static>(&mut self, create: Create, deps: Option<D>) -> RenderResult<()> {
        let (destroy, changed) = match self.current_hook()? {
            None => (Rc::new(RefCell::new(None)), true),
            Some(Hook::Effect(previous)) => {
                let unchanged = deps_equal(deps.as_ref(), previous.deps.as_ref());
                (Rc::clone(&previous.effect.destroy), !unchanged)
            }
            Some(other) => return Err(self.mismatch("effect", &other)),
        };

        if changed {
            self.flags |= Flags::PASSIVE_EFFECT;
        }

        let effect = Rc::new(EffectRecord {
            has_effect: Cell::new(changed),
            create: RefCell::new(Some(create)),
            destroy,
        });
        self.effects.push(Rc::clone(&effect));
        self.hooks.push(Hook::Effect(Rc::new(EffectHook {
            effect,
            deps: deps.map(|deps| Rc::new(deps) as Rc<dyn Any>),
        })));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(changed: bool, log: &Rc<RefCell<Vec<&'static str>>>) -> EffectRecord {
        let log = Rc::clone(log);
        let create: Create = Box::new(move || {
            log.borrow_mut().push("create");
            let log = Rc::clone(&log);
            cleanup(move || log.borrow_mut().push("destroy"))
        });
        EffectRecord {
            has_effect: Cell::new(changed),
            create: RefCell::new(Some(create)),
            destroy: Rc::new(RefCell::new(None)),
        }
    }

    #[test]
    fn create_stores_cleanup_for_destroy() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let effect = record(true, &log);
        assert!(effect.has_effect());

        effect.run_destroy();
        effect.run_create();
        effect.run_create();
        effect.run_destroy();
        effect.run_destroy();

        assert_eq!(*log.borrow(), vec!["create", "destroy"]);
        assert!(!effect.has_effect());
    }

    #[test]
    fn deps_compare_by_value_and_type() {
        let prev: Rc<dyn Any> = Rc::new((1, "a"));
        assert!(deps_equal(Some(&(1, "a")), Some(&prev)));
        assert!(!deps_equal(Some(&(2, "a")), Some(&prev)));
        assert!(!deps_equal(Some(&1u32), Some(&prev)));
        assert!(!deps_equal::<()>(None, Some(&prev)));
        assert!(!deps_equal(Some(&()), None));
    }
}
