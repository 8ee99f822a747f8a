//! Element props.
//!
//! Props are immutable once built and shared behind an `Rc`. Two props
//! values are the *same* only if they are the same allocation; that
//! identity is what the begin step's bail-out check compares.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::Child;

/// Attribute name reserved for a context provider's value.
pub(crate) const PROVIDER_VALUE: &str = "value";

/// An event handler or other callback passed through props.
///
/// Compared by identity.
#[derive(Clone)]
pub struct Callback(Rc<dyn Fn()>);

impl Callback {
    pub fn new<F: Fn() + 'static>(f: F) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self) {
        (self.0)()
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback")
    }
}

/// A single attribute value.
///
/// Primitive values compare by value, callbacks and opaque values by
/// identity.
#[derive(Clone)]
pub enum PropValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Callback(Callback),
    Any(Rc<dyn Any>),
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            (PropValue::Int(a), PropValue::Int(b)) => a == b,
            (PropValue::Float(a), PropValue::Float(b)) => a == b,
            (PropValue::Str(a), PropValue::Str(b)) => a == b,
            (PropValue::Callback(a), PropValue::Callback(b)) => a == b,
            (PropValue::Any(a), PropValue::Any(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Bool(v) => write!(f, "{v}"),
            PropValue::Int(v) => write!(f, "{v}"),
            PropValue::Float(v) => write!(f, "{v}"),
            PropValue::Str(v) => write!(f, "{v:?}"),
            PropValue::Callback(_) => f.write_str("<callback>"),
            PropValue::Any(_) => f.write_str("<any>"),
        }
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Str(v) => f.write_str(v),
            other => write!(f, "{other:?}"),
        }
    }
}

macro_rules! prop_value_from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for PropValue {
            fn from(value: $ty) -> Self {
                PropValue::Int(value as i64)
            }
        })*
    };
}

prop_value_from_int!(i32, i64, u32, usize);

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.into())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value.into())
    }
}

impl From<Rc<str>> for PropValue {
    fn from(value: Rc<str>) -> Self {
        PropValue::Str(value)
    }
}

impl From<Callback> for PropValue {
    fn from(value: Callback) -> Self {
        PropValue::Callback(value)
    }
}

pub(crate) type AttrMap = IndexMap<Rc<str>, PropValue>;

struct PropsInner {
    attrs: AttrMap,
    children: Child,
    fallback: Child,
}

/// Immutable, identity-compared element props.
#[derive(Clone)]
pub struct Props {
    inner: Rc<PropsInner>,
}

impl Props {
    pub(crate) fn from_parts(attrs: AttrMap, children: Child, fallback: Child) -> Self {
        Self {
            inner: Rc::new(PropsInner {
                attrs,
                children,
                fallback,
            }),
        }
    }

    /// Props with no attributes and the given children.
    pub fn with_children(children: Child) -> Self {
        Self::from_parts(AttrMap::new(), children, Child::Empty)
    }

    pub fn empty() -> Self {
        Self::with_children(Child::Empty)
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.inner.attrs.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            PropValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            PropValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn callback(&self, name: &str) -> Option<Callback> {
        match self.get(name)? {
            PropValue::Callback(cb) => Some(cb.clone()),
            _ => None,
        }
    }

    /// Downcast an opaque attribute.
    pub fn get_any<T: 'static>(&self, name: &str) -> Option<Rc<T>> {
        match self.get(name)? {
            PropValue::Any(value) => Rc::clone(value).downcast::<T>().ok(),
            _ => None,
        }
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.inner.attrs.iter().map(|(k, v)| (&**k, v))
    }

    pub fn children(&self) -> &Child {
        &self.inner.children
    }

    /// Fallback content of a suspense boundary.
    pub fn fallback(&self) -> &Child {
        &self.inner.fallback
    }

    pub(crate) fn provider_value(&self) -> Option<&Rc<dyn Any>> {
        match self.get(PROVIDER_VALUE)? {
            PropValue::Any(value) => Some(value),
            _ => None,
        }
    }

    /// Identity comparison.
    pub fn ptr_eq(a: &Props, b: &Props) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    /// Attribute-by-attribute value comparison, ignoring children.
    pub fn attrs_equal(&self, other: &Props) -> bool {
        let (a, b) = (&self.inner.attrs, &other.inner.attrs);
        a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
    }

    /// Shallow comparison used by memo components: attributes by value,
    /// children by identity.
    pub fn shallow_equal(&self, other: &Props) -> bool {
        Props::ptr_eq(self, other)
            || (self.attrs_equal(other)
                && self.inner.children.same(&other.inner.children)
                && self.inner.fallback.same(&other.inner.fallback))
    }
}

impl Default for Props {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.inner.attrs.iter()).finish()
    }
}
