//! Keyed persistent state and state namespaces.

use std::borrow::Cow;

use crate::element::{AnyElement, ElementFamily, Member};
use crate::error::Result;
use crate::geometry::Size;
use crate::manager::{DrawCx, MeasureCx};
use crate::registry::Renderer;
use crate::state::StateKey;
use crate::style::ResolvedStyle;
use crate::Element;

type InitFn<S> = Box<dyn Fn() -> S>;
type ViewFn<S> = Box<dyn Fn(&mut S) -> AnyElement>;

/// Builds its child from a persistent `S` stored under an explicit key.
///
/// The state is created with `init` the first frame the key is declared and kept for
/// as long as the element keeps being rendered. Measurement builds the child from a
/// scratch copy, so mutations made by `view` while measuring are discarded.
#[derive(Element)]
#[element(family = StatefulFamily)]
pub struct Stateful<S: Clone + 'static> {
    key: StateKey,
    init: InitFn<S>,
    view: ViewFn<S>,
}

pub fn stateful<S, C>(
    key: impl Into<StateKey>,
    init: impl Fn() -> S + 'static,
    view: impl Fn(&mut S) -> C + 'static,
) -> Stateful<S>
where
    S: Clone + 'static,
    C: Into<AnyElement>,
{
    Stateful {
        key: key.into(),
        init: Box::new(init),
        view: Box::new(move |state: &mut S| view(state).into()),
    }
}

/// Object-safe view over any `Stateful<S>`.
pub trait StatefulView: Element {
    fn key(&self) -> &StateKey;
    fn build_child(&self, cx: &mut DrawCx<'_>) -> Result<AnyElement>;
    fn preview_child(&self, cx: &MeasureCx<'_>) -> Result<AnyElement>;
}

pub struct StatefulFamily;

impl ElementFamily for StatefulFamily {
    type View = dyn StatefulView;
}

impl<S: Clone + 'static> StatefulView for Stateful<S> {
    fn key(&self) -> &StateKey {
        &self.key
    }

    fn build_child(&self, cx: &mut DrawCx<'_>) -> Result<AnyElement> {
        let state = cx.state(self.key.clone(), || (self.init)())?;
        Ok((self.view)(state))
    }

    fn preview_child(&self, cx: &MeasureCx<'_>) -> Result<AnyElement> {
        let mut scratch = match cx.peek_state::<S>(self.key.clone())? {
            Some(state) => state.clone(),
            None => (self.init)(),
        };
        Ok((self.view)(&mut scratch))
    }
}

impl<S: Clone + 'static> Member<StatefulFamily> for Stateful<S> {
    fn view(&self) -> &(dyn StatefulView + 'static) {
        self
    }
}

pub struct StatefulRenderer;

impl Renderer<dyn StatefulView> for StatefulRenderer {
    fn measure(
        &self,
        element: &dyn StatefulView,
        _style: Option<&ResolvedStyle>,
        cx: &mut MeasureCx<'_>,
    ) -> Result<Size> {
        let child = element.preview_child(cx)?;
        Ok(cx.measure_child(child.as_element()))
    }

    fn draw(
        &self,
        element: &dyn StatefulView,
        _style: Option<&ResolvedStyle>,
        cx: &mut DrawCx<'_>,
    ) -> Result<()> {
        let child = element.build_child(cx)?;
        cx.draw_child(child.as_element())
    }
}

/// Gives its subtree a nested state namespace, so keys inside never collide with
/// keys outside.
#[derive(Element)]
pub struct StateScope {
    name: Cow<'static, str>,
    reset: bool,
    #[element(children)]
    child: [AnyElement; 1],
}

impl StateScope {
    /// Drop every record in this namespace before drawing it (e.g. reopening a
    /// dialog with fresh state).
    pub fn reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }
}

pub fn state_scope(
    name: impl Into<Cow<'static, str>>,
    child: impl Into<AnyElement>,
) -> StateScope {
    StateScope {
        name: name.into(),
        reset: false,
        child: [child.into()],
    }
}

pub struct StateScopeRenderer;

impl Renderer<StateScope> for StateScopeRenderer {
    fn measure(
        &self,
        scope: &StateScope,
        _style: Option<&ResolvedStyle>,
        cx: &mut MeasureCx<'_>,
    ) -> Result<Size> {
        cx.with_state_scope(scope.name.clone(), |cx| {
            Ok(cx.measure_child(scope.child[0].as_element()))
        })
    }

    fn draw(&self, scope: &StateScope, _style: Option<&ResolvedStyle>, cx: &mut DrawCx<'_>) -> Result<()> {
        cx.with_state_scope(scope.name.clone(), |cx| {
            if scope.reset {
                let path = cx.current_scope().to_string();
                let cleared = cx.clear_state_scope(&path);
                log::debug!("reset state scope `{path}` ({cleared} records)");
            }
            cx.draw_child(scope.child[0].as_element())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::RecordingCanvas;
    use crate::elements::{column, spacer};
    use crate::registry::RendererRegistry;
    use crate::RenderManager;

    fn counter(key: &'static str) -> Stateful<u32> {
        stateful(
            key,
            || 0u32,
            |count: &mut u32| {
                *count += 1;
                spacer(*count as f32, 1.0)
            },
        )
    }

    #[test]
    fn test_state_survives_frames() {
        let mut manager = RenderManager::new(RendererRegistry::with_builtins());
        for frame in 1..=3 {
            let mut canvas = RecordingCanvas::new();
            manager.render_dom(&counter("clicks"), &mut canvas).unwrap();
            assert_eq!(canvas.content_size().width, frame as f32);
        }
        assert_eq!(manager.states().len(), 1);
    }

    #[test]
    fn test_measure_uses_scratch_copy() {
        let mut manager = RenderManager::new(RendererRegistry::with_builtins());
        let tree = counter("clicks");
        assert_eq!(manager.calculate_element_size(&tree), Size::new(1.0, 1.0));
        assert!(manager.states().is_empty());

        manager
            .render_dom(&tree, &mut RecordingCanvas::new())
            .unwrap();
        assert_eq!(manager.calculate_element_size(&tree), Size::new(2.0, 1.0));
        assert_eq!(manager.calculate_element_size(&tree), Size::new(2.0, 1.0));
    }

    #[test]
    fn test_scopes_isolate_equal_keys() {
        let mut manager = RenderManager::new(RendererRegistry::with_builtins());
        let tree = column()
            .child(state_scope("left", counter("n")))
            .child(state_scope("right", counter("n")));
        let mut canvas = RecordingCanvas::new();
        manager.render_dom(&tree, &mut canvas).unwrap();
        assert!(canvas.error_boxes().is_empty());
        assert_eq!(manager.states().len(), 2);
    }

    #[test]
    fn test_reset_scope_starts_fresh() {
        let mut manager = RenderManager::new(RendererRegistry::with_builtins());
        let tree = |reset| state_scope("dialog", counter("n")).reset(reset);
        for _ in 0..3 {
            manager
                .render_dom(&tree(false), &mut RecordingCanvas::new())
                .unwrap();
        }
        let mut canvas = RecordingCanvas::new();
        manager.render_dom(&tree(true), &mut canvas).unwrap();
        assert_eq!(canvas.content_size().width, 1.0);
    }
}
