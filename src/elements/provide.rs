//! Context providers and consumers.
//!
//! `Provide<T>` and `Consume<T>` are open generic kinds: one family renderer handles
//! every `T`.

use crate::context::{ContextBatch, ContextStack};
use crate::element::{AnyElement, ElementFamily, Member};
use crate::error::Result;
use crate::geometry::Size;
use crate::manager::{DrawCx, MeasureCx};
use crate::registry::Renderer;
use crate::style::ResolvedStyle;
use crate::Element;

/// Makes `value` visible to its child subtree.
#[derive(Element)]
#[element(family = ProvideFamily)]
pub struct Provide<T: Clone + 'static> {
    value: T,
    #[element(children)]
    child: [AnyElement; 1],
}

/// Makes every value of a batch visible to its child subtree.
#[derive(Element)]
pub struct ProvideMany {
    batch: ContextBatch,
    #[element(children)]
    child: [AnyElement; 1],
}

pub fn provide<T: Clone + 'static>(value: T, child: impl Into<AnyElement>) -> Provide<T> {
    Provide {
        value,
        child: [child.into()],
    }
}

pub fn provide_many(batch: ContextBatch, child: impl Into<AnyElement>) -> ProvideMany {
    ProvideMany {
        batch,
        child: [child.into()],
    }
}

/// Object-safe view over any `Provide<T>`.
pub trait Provider: Element {
    fn context_batch(&self) -> ContextBatch;
    fn child(&self) -> &AnyElement;
}

pub struct ProvideFamily;

impl ElementFamily for ProvideFamily {
    type View = dyn Provider;
}

impl<T: Clone + 'static> Provider for Provide<T> {
    fn context_batch(&self) -> ContextBatch {
        ContextBatch::new().with(self.value.clone())
    }

    fn child(&self) -> &AnyElement {
        &self.child[0]
    }
}

impl<T: Clone + 'static> Member<ProvideFamily> for Provide<T> {
    fn view(&self) -> &(dyn Provider + 'static) {
        self
    }
}

pub struct ProvideRenderer;

impl Renderer<dyn Provider> for ProvideRenderer {
    fn measure(
        &self,
        provider: &dyn Provider,
        _style: Option<&ResolvedStyle>,
        cx: &mut MeasureCx<'_>,
    ) -> Result<Size> {
        let batch = provider.context_batch();
        cx.provide_batch(&batch, |cx| Ok(cx.measure_child(provider.child().as_element())))
    }

    fn draw(
        &self,
        provider: &dyn Provider,
        _style: Option<&ResolvedStyle>,
        cx: &mut DrawCx<'_>,
    ) -> Result<()> {
        let batch = provider.context_batch();
        cx.provide_batch(&batch, |cx| cx.draw_child(provider.child().as_element()))
    }
}

impl Renderer<ProvideMany> for ProvideRenderer {
    fn measure(
        &self,
        provider: &ProvideMany,
        _style: Option<&ResolvedStyle>,
        cx: &mut MeasureCx<'_>,
    ) -> Result<Size> {
        cx.provide_batch(&provider.batch, |cx| Ok(cx.measure_child(provider.child[0].as_element())))
    }

    fn draw(
        &self,
        provider: &ProvideMany,
        _style: Option<&ResolvedStyle>,
        cx: &mut DrawCx<'_>,
    ) -> Result<()> {
        cx.provide_batch(&provider.batch, |cx| cx.draw_child(provider.child[0].as_element()))
    }
}

type BuildFn<T> = Box<dyn Fn(Option<&T>) -> AnyElement>;

/// Builds its child from the nearest enclosing `T`, or `None` outside any provider.
#[derive(Element)]
#[element(family = ConsumeFamily)]
pub struct Consume<T: 'static> {
    build: BuildFn<T>,
}

pub fn consume<T: 'static, C: Into<AnyElement>>(
    build: impl Fn(Option<&T>) -> C + 'static,
) -> Consume<T> {
    Consume {
        build: Box::new(move |value: Option<&T>| build(value).into()),
    }
}

/// Object-safe view over any `Consume<T>`.
pub trait Consumer: Element {
    fn build(&self, contexts: &ContextStack) -> AnyElement;
}

pub struct ConsumeFamily;

impl ElementFamily for ConsumeFamily {
    type View = dyn Consumer;
}

impl<T: 'static> Consumer for Consume<T> {
    fn build(&self, contexts: &ContextStack) -> AnyElement {
        (self.build)(contexts.try_get::<T>())
    }
}

impl<T: 'static> Member<ConsumeFamily> for Consume<T> {
    fn view(&self) -> &(dyn Consumer + 'static) {
        self
    }
}

pub struct ConsumeRenderer;

impl Renderer<dyn Consumer> for ConsumeRenderer {
    fn measure(
        &self,
        consumer: &dyn Consumer,
        _style: Option<&ResolvedStyle>,
        cx: &mut MeasureCx<'_>,
    ) -> Result<Size> {
        let child = consumer.build(cx.contexts());
        Ok(cx.measure_child(child.as_element()))
    }

    fn draw(
        &self,
        consumer: &dyn Consumer,
        _style: Option<&ResolvedStyle>,
        cx: &mut DrawCx<'_>,
    ) -> Result<()> {
        let child = consumer.build(cx.contexts());
        cx.draw_child(child.as_element())
    }
}
