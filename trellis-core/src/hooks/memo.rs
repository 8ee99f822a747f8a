//! Memoization and ref hooks.

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use super::effect::deps_equal;
use super::{Hook, RenderCx};
use crate::element::Callback;
use crate::error::RenderResult;

pub(crate) struct MemoRecord {
    value: Rc<dyn Any>,
    deps: Option<Rc<dyn Any>>,
}

/// A mutable box that survives re-renders. Writing to it does not schedule
/// a render.
pub struct RefObject<T>(Rc<RefCell<T>>);

impl<T> RefObject<T> {
    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    pub fn set(&self, value: T) {
        *self.0.borrow_mut() = value;
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: Clone> RefObject<T> {
    pub fn get(&self) -> T {
        self.0.borrow().clone()
    }
}

impl<T> Clone for RefObject<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for RefObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RefObject").field(&self.0.borrow()).finish()
    }
}

impl<'a> RenderCx<'a> {
    /// Cache the result of `compute` until `deps` changes.
    pub fn use_memo<T, D, F>(&mut self, compute: F, deps: D) -> RenderResult<T>
    where
        T: Clone + 'static,
        D: PartialEq + 'static,
        F: FnOnce() -> T,
    {
        if let Some(hook) = self.current_hook()? {
            let Hook::Memo(previous) = &hook else {
                return Err(self.mismatch("memo", &hook));
            };
            if deps_equal(Some(&deps), previous.deps.as_ref()) {
                if let Some(value) = previous.value.downcast_ref::<T>() {
                    let value = value.clone();
                    self.hooks.push(hook.clone());
                    return Ok(value);
                }
            }
        }

        let value = compute();
        self.hooks.push(Hook::Memo(Rc::new(MemoRecord {
            value: Rc::new(value.clone()),
            deps: Some(Rc::new(deps)),
        })));
        Ok(value)
    }

    /// A callback whose identity only changes when `deps` does.
    pub fn use_callback<D, F>(&mut self, f: F, deps: D) -> RenderResult<Callback>
    where
        D: PartialEq + 'static,
        F: Fn() + 'static,
    {
        self.use_memo(move || Callback::new(f), deps)
    }

    /// A [`RefObject`] holding `initial` on mount and whatever was last
    /// stored in it afterwards.
    pub fn use_ref<T: 'static>(&mut self, initial: T) -> RenderResult<RefObject<T>> {
        self.use_ref_with(move || initial)
    }

    pub(super) fn use_ref_with<T, F>(&mut self, init: F) -> RenderResult<RefObject<T>>
    where
        T: 'static,
        F: FnOnce() -> T,
    {
        match self.current_hook()? {
            None => {
                let object = RefObject(Rc::new(RefCell::new(init())));
                self.hooks.push(Hook::Ref(Rc::new(object.clone())));
                Ok(object)
            }
            Some(hook) => {
                let found = match &hook {
                    Hook::Ref(any) => any.downcast_ref::<RefObject<T>>().cloned(),
                    _ => None,
                };
                let Some(object) = found else {
                    return Err(self.mismatch("ref", &hook));
                };
                self.hooks.push(hook);
                Ok(object)
            }
        }
    }
}
