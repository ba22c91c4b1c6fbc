//! Renderer lookup by element kind.
//!
//! Concrete kinds are registered with [`RendererRegistry::register`]. Open generic
//! kinds (`Field<T>` for any `T`) are registered once per family with
//! [`RendererRegistry::register_family`]; the renderer receives the family's view
//! trait object instead of the concrete element.
//!
//! Resolution order: exact kind, then family, then [`Error::NoRenderer`].

use std::any::TypeId;
use std::collections::HashMap;
use std::marker::PhantomData;

use crate::element::{Element, ElementFamily};
use crate::error::{Error, Result};
use crate::geometry::Size;
use crate::manager::{DrawCx, MeasureCx};
use crate::style::ResolvedStyle;

/// Draws one kind of element through the host canvas.
///
/// `E` is the concrete element type for exact registrations, or the family view
/// (`dyn FieldView`) for family registrations.
pub trait Renderer<E: ?Sized>: 'static {
    /// Size the element would occupy. Must not mutate persistent state.
    fn measure(
        &self,
        element: &E,
        style: Option<&ResolvedStyle>,
        cx: &mut MeasureCx<'_>,
    ) -> Result<Size>;

    fn draw(&self, element: &E, style: Option<&ResolvedStyle>, cx: &mut DrawCx<'_>) -> Result<()>;

    /// Name of the registered base style descriptors fall back to.
    ///
    /// Elements without a descriptor are drawn with this base; `None` means they get
    /// no resolved style at all.
    fn base_style(&self) -> Option<&'static str> {
        None
    }
}

/// Object-safe renderer working on type-erased elements.
pub trait ErasedRenderer {
    fn measure(
        &self,
        element: &dyn Element,
        style: Option<&ResolvedStyle>,
        cx: &mut MeasureCx<'_>,
    ) -> Result<Size>;

    fn draw(
        &self,
        element: &dyn Element,
        style: Option<&ResolvedStyle>,
        cx: &mut DrawCx<'_>,
    ) -> Result<()>;

    fn base_style(&self) -> Option<&'static str>;
}

struct Exact<E, R> {
    renderer: R,
    _element: PhantomData<fn(&E)>,
}

impl<E: Element, R: Renderer<E>> Exact<E, R> {
    fn element<'a>(&self, element: &'a dyn Element) -> Result<&'a E> {
        element
            .downcast_ref::<E>()
            .ok_or(Error::NoRenderer(element.kind().name))
    }
}

impl<E: Element, R: Renderer<E>> ErasedRenderer for Exact<E, R> {
    fn measure(
        &self,
        element: &dyn Element,
        style: Option<&ResolvedStyle>,
        cx: &mut MeasureCx<'_>,
    ) -> Result<Size> {
        self.renderer.measure(self.element(element)?, style, cx)
    }

    fn draw(
        &self,
        element: &dyn Element,
        style: Option<&ResolvedStyle>,
        cx: &mut DrawCx<'_>,
    ) -> Result<()> {
        self.renderer.draw(self.element(element)?, style, cx)
    }

    fn base_style(&self) -> Option<&'static str> {
        self.renderer.base_style()
    }
}

struct Family<F, R> {
    renderer: R,
    _family: PhantomData<fn(&F)>,
}

impl<F: ElementFamily, R: Renderer<F::View>> Family<F, R> {
    fn view<'a>(&self, element: &'a dyn Element) -> Result<&'a F::View> {
        element
            .family()
            .and_then(|link| link.view::<F>(element))
            .ok_or(Error::NoRenderer(element.kind().name))
    }
}

impl<F: ElementFamily, R: Renderer<F::View>> ErasedRenderer for Family<F, R> {
    fn measure(
        &self,
        element: &dyn Element,
        style: Option<&ResolvedStyle>,
        cx: &mut MeasureCx<'_>,
    ) -> Result<Size> {
        self.renderer.measure(self.view(element)?, style, cx)
    }

    fn draw(
        &self,
        element: &dyn Element,
        style: Option<&ResolvedStyle>,
        cx: &mut DrawCx<'_>,
    ) -> Result<()> {
        self.renderer.draw(self.view(element)?, style, cx)
    }

    fn base_style(&self) -> Option<&'static str> {
        self.renderer.base_style()
    }
}

struct Registered {
    name: &'static str,
    renderer: Box<dyn ErasedRenderer>,
}

#[derive(Default)]
pub struct RendererRegistry {
    exact: HashMap<TypeId, Registered>,
    families: HashMap<TypeId, Registered>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with renderers for the built-in structural elements.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::elements::register_builtins(&mut registry);
        registry
    }

    /// Register `renderer` for the concrete element type `E`, replacing any earlier
    /// registration.
    pub fn register<E: Element>(&mut self, renderer: impl Renderer<E>) -> &mut Self {
        let name = crate::element::ElementKind::of::<E>().name;
        let previous = self.exact.insert(
            TypeId::of::<E>(),
            Registered {
                name,
                renderer: Box::new(Exact {
                    renderer,
                    _element: PhantomData,
                }),
            },
        );
        if previous.is_some() {
            log::debug!("replaced renderer for `{name}`");
        }
        self
    }

    /// Register `renderer` for every member of the family `F`.
    pub fn register_family<F: ElementFamily>(
        &mut self,
        renderer: impl Renderer<F::View>,
    ) -> &mut Self {
        let name = F::name();
        let previous = self.families.insert(
            TypeId::of::<F>(),
            Registered {
                name,
                renderer: Box::new(Family::<F, _> {
                    renderer,
                    _family: PhantomData,
                }),
            },
        );
        if previous.is_some() {
            log::debug!("replaced renderer for family `{name}`");
        }
        self
    }

    /// Renderer for `element`: exact kind first, then its family.
    pub fn resolve(&self, element: &dyn Element) -> Result<&dyn ErasedRenderer> {
        let kind = element.kind();
        if let Some(registered) = self.exact.get(&kind.id) {
            return Ok(&*registered.renderer);
        }
        if let Some(link) = element.family() {
            if let Some(registered) = self.families.get(&link.family) {
                log::trace!("`{}` dispatched through family `{}`", kind.name, registered.name);
                return Ok(&*registered.renderer);
            }
        }
        Err(Error::NoRenderer(kind.name))
    }

    pub fn contains<E: Element>(&self) -> bool {
        self.exact.contains_key(&TypeId::of::<E>())
    }

    pub fn contains_family<F: ElementFamily>(&self) -> bool {
        self.families.contains_key(&TypeId::of::<F>())
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::fmt::Display;

    use crate::element::{FamilyLink, Member};

    struct Label(&'static str);

    impl Element for Label {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    trait FieldView {
        fn text(&self) -> String;
    }

    struct FieldFamily;

    impl ElementFamily for FieldFamily {
        type View = dyn FieldView;
    }

    struct Field<T>(T);

    impl<T: Display + 'static> Element for Field<T> {
        fn as_any(&self) -> &dyn Any {
            self
        }

        fn family(&self) -> Option<FamilyLink> {
            Some(FamilyLink::of::<FieldFamily, Self>())
        }
    }

    impl<T: Display + 'static> FieldView for Field<T> {
        fn text(&self) -> String {
            self.0.to_string()
        }
    }

    impl<T: Display + 'static> Member<FieldFamily> for Field<T> {
        fn view(&self) -> &(dyn FieldView + 'static) {
            self
        }
    }

    struct FixedSize(f32);

    impl Renderer<Label> for FixedSize {
        fn measure(&self, _: &Label, _: Option<&ResolvedStyle>, _: &mut MeasureCx<'_>) -> Result<Size> {
            Ok(Size::new(self.0, self.0))
        }

        fn draw(&self, _: &Label, _: Option<&ResolvedStyle>, _: &mut DrawCx<'_>) -> Result<()> {
            Ok(())
        }

        fn base_style(&self) -> Option<&'static str> {
            Some("label")
        }
    }

    struct FieldRenderer;

    impl Renderer<dyn FieldView> for FieldRenderer {
        fn measure(
            &self,
            field: &dyn FieldView,
            _: Option<&ResolvedStyle>,
            _: &mut MeasureCx<'_>,
        ) -> Result<Size> {
            Ok(Size::new(field.text().len() as f32, 1.0))
        }

        fn draw(&self, _: &dyn FieldView, _: Option<&ResolvedStyle>, _: &mut DrawCx<'_>) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_resolve_exact() {
        let mut registry = RendererRegistry::new();
        registry.register::<Label>(FixedSize(3.0));
        let renderer = registry.resolve(&Label("hi")).unwrap();
        assert_eq!(renderer.base_style(), Some("label"));
        assert!(registry.contains::<Label>());
    }

    #[test]
    fn test_resolve_miss() {
        let registry = RendererRegistry::new();
        let err = registry.resolve(&Label("hi")).err().unwrap();
        assert!(matches!(err, Error::NoRenderer("Label")));
    }

    #[test]
    fn test_family_matches_every_parametrization() {
        let mut registry = RendererRegistry::new();
        registry.register_family::<FieldFamily>(FieldRenderer);
        assert!(registry.resolve(&Field(1u32)).is_ok());
        assert!(registry.resolve(&Field("text")).is_ok());
        assert!(registry.resolve(&Label("x")).is_err());
        assert!(registry.contains_family::<FieldFamily>());
    }

    #[test]
    fn test_exact_beats_family() {
        struct Special;

        impl Renderer<Field<bool>> for Special {
            fn measure(
                &self,
                _: &Field<bool>,
                _: Option<&ResolvedStyle>,
                _: &mut MeasureCx<'_>,
            ) -> Result<Size> {
                Ok(Size::ZERO)
            }

            fn draw(&self, _: &Field<bool>, _: Option<&ResolvedStyle>, _: &mut DrawCx<'_>) -> Result<()> {
                Ok(())
            }

            fn base_style(&self) -> Option<&'static str> {
                Some("toggle")
            }
        }

        let mut registry = RendererRegistry::new();
        registry.register_family::<FieldFamily>(FieldRenderer);
        registry.register::<Field<bool>>(Special);
        assert_eq!(registry.resolve(&Field(true)).unwrap().base_style(), Some("toggle"));
        assert_eq!(registry.resolve(&Field(1u8)).unwrap().base_style(), None);
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = RendererRegistry::new();
        registry.register::<Label>(FixedSize(1.0));
        registry.register::<Label>(FixedSize(2.0));
        assert_eq!(registry.len(), 1);
    }
}
