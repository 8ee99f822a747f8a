//! Element Descriptors
//!
//! Elements are the immutable descriptions the embedding layer hands to the
//! reconciler: "a `div` with these props", "this component with these
//! props", "these children grouped without a wrapper". They carry no state
//! and are cheap to clone.
//!
//! # Building Elements
//!
//! ```rust
//! use trellis_core::element::{h, text, Child};
//!
//! let tree: Child = h("ul")
//!     .attr("class", "todo")
//!     .children([
//!         h("li").key("a").child(text("write")),
//!         h("li").key("b").child(text("test")),
//!     ])
//!     .into();
//! # let _ = tree;
//! ```

mod child;
mod props;

pub use child::{text, Child};
pub use props::{Callback, PropValue, Props};

pub(crate) use props::{AttrMap, PROVIDER_VALUE};

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::context::ContextHandle;
use crate::error::RenderResult;
use crate::hooks::RenderCx;
use crate::host::HostNodeId;

/// List-reconciliation identity of an element.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Key(Rc<str>);

impl Key {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key(value.into())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key(value.into())
    }
}

macro_rules! key_from_number {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Key {
            fn from(value: $ty) -> Self {
                Key(value.to_string().into())
            }
        })*
    };
}

key_from_number!(i32, i64, u32, u64, usize);

type RenderFn = dyn Fn(&mut RenderCx<'_>, &Props) -> RenderResult<Child>;

struct ComponentInner {
    name: Rc<str>,
    render: Box<RenderFn>,
}

/// A function component.
///
/// Two components are the same type only if they are clones of the same
/// `Component` value.
#[derive(Clone)]
pub struct Component {
    inner: Rc<ComponentInner>,
}

impl Component {
    pub fn new<F>(name: &str, render: F) -> Self
    where
        F: Fn(&mut RenderCx<'_>, &Props) -> RenderResult<Child> + 'static,
    {
        Self {
            inner: Rc::new(ComponentInner {
                name: name.into(),
                render: Box::new(render),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub(crate) fn render(&self, cx: &mut RenderCx<'_>, props: &Props) -> RenderResult<Child> {
        (self.inner.render)(cx, props)
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.inner.name)
    }
}

type CompareFn = dyn Fn(&Props, &Props) -> bool;

struct MemoInner {
    component: Component,
    compare: Option<Box<CompareFn>>,
}

/// A component that skips re-rendering when its props compare equal.
#[derive(Clone)]
pub struct MemoComponent {
    inner: Rc<MemoInner>,
}

impl MemoComponent {
    pub fn component(&self) -> &Component {
        &self.inner.component
    }

    /// `true` when the component can be skipped.
    pub(crate) fn props_equal(&self, prev: &Props, next: &Props) -> bool {
        match &self.inner.compare {
            Some(compare) => compare(prev, next),
            None => prev.shallow_equal(next),
        }
    }
}

impl PartialEq for MemoComponent {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for MemoComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Memo({})", self.inner.component.name())
    }
}

/// Wrap `component` so it re-renders only when its props shallowly differ.
pub fn memo(component: Component) -> MemoComponent {
    MemoComponent {
        inner: Rc::new(MemoInner {
            component,
            compare: None,
        }),
    }
}

/// Like [`memo`], with a custom "props are equal" predicate.
pub fn memo_with<F>(component: Component, compare: F) -> MemoComponent
where
    F: Fn(&Props, &Props) -> bool + 'static,
{
    MemoComponent {
        inner: Rc::new(MemoInner {
            component,
            compare: Some(Box::new(compare)),
        }),
    }
}

/// What kind of node an element describes.
#[derive(Clone, PartialEq)]
pub enum ElementType {
    Host(Rc<str>),
    Component(Component),
    Fragment,
    Provider(ContextHandle),
    Suspense,
    Memo(MemoComponent),
}

impl fmt::Debug for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Host(tag) => write!(f, "<{tag}>"),
            ElementType::Component(c) => c.fmt(f),
            ElementType::Fragment => f.write_str("Fragment"),
            ElementType::Provider(ctx) => write!(f, "Provider({:?})", ctx.id()),
            ElementType::Suspense => f.write_str("Suspense"),
            ElementType::Memo(m) => m.fmt(f),
        }
    }
}

impl From<Component> for ElementType {
    fn from(value: Component) -> Self {
        ElementType::Component(value)
    }
}

impl From<&Component> for ElementType {
    fn from(value: &Component) -> Self {
        ElementType::Component(value.clone())
    }
}

impl From<MemoComponent> for ElementType {
    fn from(value: MemoComponent) -> Self {
        ElementType::Memo(value)
    }
}

impl From<&MemoComponent> for ElementType {
    fn from(value: &MemoComponent) -> Self {
        ElementType::Memo(value.clone())
    }
}

/// Mutable slot receiving a host instance after commit.
#[derive(Clone, Default)]
pub struct NodeRef(Rc<Cell<Option<HostNodeId>>>);

impl NodeRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<HostNodeId> {
        self.0.get()
    }

    pub(crate) fn set(&self, value: Option<HostNodeId>) {
        self.0.set(value);
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeRef({:?})", self.get())
    }
}

/// Ref attached to a host element.
#[derive(Clone)]
pub enum ElementRef {
    /// Object ref: `current` is set to the instance and back to `None`.
    Object(NodeRef),
    /// Callback ref: called with the instance, then with `None` on detach.
    Callback(Rc<dyn Fn(Option<HostNodeId>)>),
}

impl ElementRef {
    pub fn callback<F: Fn(Option<HostNodeId>) + 'static>(f: F) -> Self {
        ElementRef::Callback(Rc::new(f))
    }

    pub(crate) fn apply(&self, value: Option<HostNodeId>) {
        match self {
            ElementRef::Object(node_ref) => node_ref.set(value),
            ElementRef::Callback(f) => f(value),
        }
    }
}

impl PartialEq for ElementRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ElementRef::Object(a), ElementRef::Object(b)) => a == b,
            (ElementRef::Callback(a), ElementRef::Callback(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementRef::Object(r) => r.fmt(f),
            ElementRef::Callback(_) => f.write_str("RefCallback"),
        }
    }
}

impl From<NodeRef> for ElementRef {
    fn from(value: NodeRef) -> Self {
        ElementRef::Object(value)
    }
}

impl From<&NodeRef> for ElementRef {
    fn from(value: &NodeRef) -> Self {
        ElementRef::Object(value.clone())
    }
}

/// An immutable element description.
#[derive(Clone)]
pub struct Element {
    element_type: ElementType,
    key: Option<Key>,
    node_ref: Option<ElementRef>,
    props: Props,
}

impl Element {
    pub fn new(element_type: ElementType, key: Option<Key>, props: Props) -> Self {
        Self {
            element_type,
            key,
            node_ref: None,
            props,
        }
    }

    pub fn element_type(&self) -> &ElementType {
        &self.element_type
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn node_ref(&self) -> Option<&ElementRef> {
        self.node_ref.as_ref()
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    /// Identity comparison.
    pub fn same(&self, other: &Element) -> bool {
        Props::ptr_eq(&self.props, &other.props) && self.element_type == other.element_type
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Element");
        s.field("type", &self.element_type);
        if let Some(key) = &self.key {
            s.field("key", key);
        }
        s.field("props", &self.props).finish()
    }
}

/// Incremental element constructor.
pub struct ElementBuilder {
    element_type: ElementType,
    key: Option<Key>,
    node_ref: Option<ElementRef>,
    attrs: AttrMap,
    children: Vec<Child>,
    fallback: Child,
}

impl ElementBuilder {
    pub fn new(element_type: ElementType) -> Self {
        Self {
            element_type,
            key: None,
            node_ref: None,
            attrs: AttrMap::new(),
            children: Vec::new(),
            fallback: Child::Empty,
        }
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn attr(mut self, name: &str, value: impl Into<PropValue>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn on(self, name: &str, f: impl Fn() + 'static) -> Self {
        self.attr(name, Callback::new(f))
    }

    pub fn node_ref(mut self, node_ref: impl Into<ElementRef>) -> Self {
        self.node_ref = Some(node_ref.into());
        self
    }

    pub fn child(mut self, child: impl Into<Child>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<I, C>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Child>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    /// Content shown by a suspense boundary while its children are pending.
    pub fn fallback(mut self, fallback: impl Into<Child>) -> Self {
        self.fallback = fallback.into();
        self
    }

    pub fn build(self) -> Element {
        let mut children = self.children;
        let children = match children.len() {
            0 => Child::Empty,
            1 => children.pop().unwrap_or_default(),
            _ => Child::List(children.into()),
        };

        Element {
            element_type: self.element_type,
            key: self.key,
            node_ref: self.node_ref,
            props: Props::from_parts(self.attrs, children, self.fallback),
        }
    }
}

/// A host element.
pub fn h(tag: &str) -> ElementBuilder {
    ElementBuilder::new(ElementType::Host(tag.into()))
}

/// An element of any type: a component, a memo component or a marker.
pub fn el(element_type: impl Into<ElementType>) -> ElementBuilder {
    ElementBuilder::new(element_type.into())
}

/// A grouping element without a host node of its own.
pub fn fragment() -> ElementBuilder {
    ElementBuilder::new(ElementType::Fragment)
}

/// A suspense boundary showing `fallback` while its children are pending.
pub fn suspense(fallback: impl Into<Child>) -> ElementBuilder {
    ElementBuilder::new(ElementType::Suspense).fallback(fallback)
}
