//! Child descriptions.

use std::rc::Rc;

use super::{Element, ElementBuilder};

/// What a component (or element) renders as its children.
#[derive(Clone, Default, Debug)]
pub enum Child {
    /// Nothing. Removes any existing children.
    #[default]
    Empty,
    /// A text node.
    Text(Rc<str>),
    /// A single element.
    Element(Element),
    /// An ordered group of children, reconciled by key or position.
    List(Rc<[Child]>),
}

impl Child {
    /// Build a list child.
    pub fn list<I, C>(children: I) -> Child
    where
        I: IntoIterator<Item = C>,
        C: Into<Child>,
    {
        Child::List(children.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Child::Empty)
    }

    /// Identity comparison: text by value, elements by props identity and
    /// type, lists by allocation.
    pub fn same(&self, other: &Child) -> bool {
        match (self, other) {
            (Child::Empty, Child::Empty) => true,
            (Child::Text(a), Child::Text(b)) => a == b,
            (Child::Element(a), Child::Element(b)) => a.same(b),
            (Child::List(a), Child::List(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Shorthand for a text child.
pub fn text(content: impl AsRef<str>) -> Child {
    Child::Text(content.as_ref().into())
}

impl From<&str> for Child {
    fn from(value: &str) -> Self {
        Child::Text(value.into())
    }
}

impl From<String> for Child {
    fn from(value: String) -> Self {
        Child::Text(value.into())
    }
}

impl From<Rc<str>> for Child {
    fn from(value: Rc<str>) -> Self {
        Child::Text(value)
    }
}

macro_rules! child_from_number {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Child {
            fn from(value: $ty) -> Self {
                Child::Text(value.to_string().into())
            }
        })*
    };
}

child_from_number!(i32, i64, u32, u64, usize);

impl From<Element> for Child {
    fn from(value: Element) -> Self {
        Child::Element(value)
    }
}

impl From<ElementBuilder> for Child {
    fn from(value: ElementBuilder) -> Self {
        Child::Element(value.build())
    }
}

impl From<Vec<Child>> for Child {
    fn from(value: Vec<Child>) -> Self {
        Child::List(value.into())
    }
}

impl<C: Into<Child>> From<Option<C>> for Child {
    fn from(value: Option<C>) -> Self {
        value.map_or(Child::Empty, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::h;

    #[test]
    fn text_compares_by_value() {
        assert!(text("a").same(&Child::from("a")));
        assert!(!text("a").same(&text("b")));
        assert!(Child::from(5).same(&text("5")));
    }

    #[test]
    fn elements_compare_by_identity() {
        let a: Child = h("div").into();
        let b: Child = h("div").into();
        assert!(a.same(&a.clone()));
        assert!(!a.same(&b));
    }

    #[test]
    fn lists_compare_by_allocation() {
        let list = Child::list(["a", "b"]);
        assert!(list.same(&list.clone()));
        assert!(!list.same(&Child::list(["a", "b"])));
    }

    #[test]
    fn option_maps_to_empty() {
        assert!(Child::from(None::<&str>).is_empty());
        assert!(!Child::from(Some("x")).is_empty());
    }
}
