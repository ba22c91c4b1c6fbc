//! Element descriptors and their runtime kinds.
//!
//! Elements are rebuilt every frame and carry no identity of their own. The render
//! engine keys dispatch off an [`ElementKind`], which is the element's `TypeId` plus
//! an optional link to an open element family.
//!
//! ## Families
//!
//! Rust has no runtime notion of an "unparametrized" generic type, so open generic
//! kinds are modelled explicitly. A family is a marker type implementing
//! [`ElementFamily`]; its `View` is an object-safe trait every member exposes. A
//! generic element such as `Field<T>` implements [`Member<FieldFamily>`] and reports
//! a [`FamilyLink`] from [`Element::family`]. The link carries a cast function
//! monomorphized for the concrete member, so a family renderer can reach the view
//! without knowing `T`.
//!
//! ```ignore
//! pub struct FieldFamily;
//! impl ElementFamily for FieldFamily {
//!     type View = dyn FieldView;
//! }
//!
//! #[derive(Element)]
//! #[element(family = FieldFamily)]
//! pub struct Field<T> { value: T }
//!
//! impl<T: Display + 'static> Member<FieldFamily> for Field<T> {
//!     fn view(&self) -> &(dyn FieldView + 'static) { self }
//! }
//! ```

use std::any::{Any, TypeId};
use std::fmt;

use crate::style::StyleDescriptor;

/// A per-frame UI node descriptor.
///
/// Usually implemented through `#[derive(Element)]`.
pub trait Element: Any {
    fn as_any(&self) -> &dyn Any;

    /// Optional style descriptor resolved against the renderer's base style.
    fn style(&self) -> Option<&StyleDescriptor> {
        None
    }

    /// Ordered children for container elements.
    fn children(&self) -> &[AnyElement] {
        &[]
    }

    /// Link to an open element family, for generic element kinds.
    fn family(&self) -> Option<FamilyLink> {
        None
    }

    /// Runtime kind of the concrete type. Not meant to be overridden.
    fn kind(&self) -> ElementKind {
        ElementKind {
            id: TypeId::of::<Self>(),
            name: short_type_name(std::any::type_name::<Self>()),
        }
    }
}

impl dyn Element {
    pub fn downcast_ref<E: Element>(&self) -> Option<&E> {
        self.as_any().downcast_ref::<E>()
    }
}

/// Owned, type-erased element. Containers store their children as these.
pub struct AnyElement(Box<dyn Element>);

impl AnyElement {
    pub fn new<E: Element>(element: E) -> Self {
        Self(Box::new(element))
    }

    pub fn as_element(&self) -> &dyn Element {
        &*self.0
    }

    pub fn kind(&self) -> ElementKind {
        self.0.kind()
    }
}

impl<E: Element> From<E> for AnyElement {
    fn from(element: E) -> Self {
        AnyElement::new(element)
    }
}

impl std::ops::Deref for AnyElement {
    type Target = dyn Element;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl fmt::Debug for AnyElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AnyElement").field(&self.kind().name).finish()
    }
}

/// Type-erased discriminant used for dispatch.
#[derive(Clone, Copy, Debug)]
pub struct ElementKind {
    pub id: TypeId,
    /// Type name without module paths, for logs and error boxes.
    pub name: &'static str,
}

impl ElementKind {
    pub fn of<E: Element>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: short_type_name(std::any::type_name::<E>()),
        }
    }
}

impl PartialEq for ElementKind {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ElementKind {}

impl std::hash::Hash for ElementKind {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Marker for an open generic element kind.
pub trait ElementFamily: 'static {
    /// Object-safe view every member of the family exposes.
    type View: ?Sized + 'static;

    fn name() -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }
}

/// Implemented by every parametrization of a generic element.
///
/// `View` is `'static`, so implementations spell the bound out in the return type:
/// `fn view(&self) -> &(dyn FieldView + 'static)`. The elided `&dyn FieldView`
/// borrows the object lifetime from `&self` and does not match.
pub trait Member<F: ElementFamily>: Element {
    fn view(&self) -> &F::View;
}

pub(crate) type CastFn<F> = for<'a> fn(&'a dyn Any) -> Option<&'a <F as ElementFamily>::View>;

/// Connects a concrete element type to its family.
pub struct FamilyLink {
    pub(crate) family: TypeId,
    pub(crate) family_name: &'static str,
    /// A boxed `CastFn<F>`, downcast by the family renderer adapter.
    cast: Box<dyn Any>,
}

impl FamilyLink {
    pub fn of<F: ElementFamily, E: Member<F>>() -> Self {
        let cast: CastFn<F> = cast_member::<F, E>;
        Self {
            family: TypeId::of::<F>(),
            family_name: F::name(),
            cast: Box::new(cast),
        }
    }

    pub(crate) fn view<'a, F: ElementFamily>(
        &self,
        element: &'a dyn Element,
    ) -> Option<&'a F::View> {
        let cast = self.cast.downcast_ref::<CastFn<F>>()?;
        cast(element.as_any())
    }
}

fn cast_member<F: ElementFamily, E: Member<F>>(any: &dyn Any) -> Option<&F::View> {
    any.downcast_ref::<E>().map(<E as Member<F>>::view)
}

/// Strip module paths, keeping generic arguments readable:
/// `my_app::widgets::Field<alloc::string::String>` becomes `Field<String>`.
pub fn short_type_name(full: &'static str) -> &'static str {
    if !full.contains("::") {
        return full;
    }
    if !full.contains('<') {
        return full.rsplit("::").next().unwrap_or(full);
    }
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    for c in full.chars() {
        match c {
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' => {
                out.push_str(segment.rsplit("::").next().unwrap_or(&segment));
                segment.clear();
                out.push(c);
            }
            _ => segment.push(c),
        }
    }
    out.push_str(segment.rsplit("::").next().unwrap_or(&segment));
    intern(out)
}

fn intern(name: String) -> &'static str {
    use std::collections::HashSet;
    use std::sync::{Mutex, OnceLock};

    static NAMES: OnceLock<Mutex<HashSet<&'static str>>> = OnceLock::new();
    let mut names = NAMES
        .get_or_init(|| Mutex::new(HashSet::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(existing) = names.get(name.as_str()) {
        return existing;
    }
    let leaked: &'static str = Box::leak(name.into_boxed_str());
    names.insert(leaked);
    leaked
}
