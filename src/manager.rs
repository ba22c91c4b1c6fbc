//! Render pass orchestration.
//!
//! [`RenderManager`] owns the renderer registry, the context stack, the state store
//! and the style cache. Each call to [`RenderManager::render_dom`] walks the element
//! tree depth-first in declared order, resolving a renderer and a style for every
//! element and handing the renderer a [`DrawCx`] to reach the rest of the engine.
//!
//! ## Failure boundary
//!
//! Every element dispatch records the context, state-scope and canvas group depths
//! before its style is resolved and restores them afterwards, whatever the outcome. A renderer that
//! returns a non-fatal `Err` or panics is replaced by an error box; its siblings and
//! ancestors keep rendering. Orchestration errors ([`Error::is_fatal`]) abort the pass
//! and are returned from `render_dom`.
//!
//! Measurement uses the same dispatch table through [`MeasureCx`], which has no way
//! to create or mutate persistent state.

use std::any::{Any, TypeId};
use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::canvas::Canvas;
use crate::config::RenderConfig;
use crate::context::{ContextBatch, ContextStack};
use crate::element::{AnyElement, Element, ElementKind};
use crate::error::{self, Error, FailureReport, Result};
use crate::geometry::Size;
use crate::registry::RendererRegistry;
use crate::state::{Claim, StateKey, StateStore};
use crate::stats::{RenderStats, StatsSnapshot};
use crate::style::{AssetKey, AssetPool, CachedAsset, ResolvedStyle, StyleCache, StyleDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Rendering,
}

/// Everything a dispatch can touch besides the registry and the canvas.
pub(crate) struct Session {
    config: RenderConfig,
    contexts: ContextStack,
    states: StateStore,
    styles: StyleCache,
    stats: RenderStats,
    /// Kinds already reported as having no renderer.
    missed: HashSet<TypeId>,
    next_dispatch: u64,
}

impl Session {
    fn note_miss(&mut self, kind: ElementKind, err: &Error) {
        self.stats.misses += 1;
        if self.missed.insert(kind.id) {
            log::warn!("{err}; skipping");
        }
    }

    fn claim(&mut self, kind: ElementKind) -> Claim {
        self.next_dispatch += 1;
        Claim {
            kind: kind.id,
            dispatch: self.next_dispatch,
        }
    }
}

pub struct RenderManager {
    registry: RendererRegistry,
    session: Session,
    phase: Phase,
}

impl RenderManager {
    pub fn new(registry: RendererRegistry) -> Self {
        Self::with_config(registry, RenderConfig::default())
    }

    pub fn with_config(registry: RendererRegistry, config: RenderConfig) -> Self {
        Self::with_shared_assets(registry, config, Arc::new(AssetPool::new()))
    }

    /// A manager that generates assets into `assets`, which other managers may share.
    pub fn with_shared_assets(
        registry: RendererRegistry,
        config: RenderConfig,
        assets: Arc<AssetPool>,
    ) -> Self {
        if config.catch_panics && config.capture_backtraces {
            error::install_panic_hook();
        }
        Self {
            registry,
            session: Session {
                config,
                contexts: ContextStack::new(),
                states: StateStore::new(),
                styles: StyleCache::new(assets),
                stats: RenderStats::default(),
                missed: HashSet::new(),
                next_dispatch: 0,
            },
            phase: Phase::Idle,
        }
    }

    pub fn registry(&self) -> &RendererRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut RendererRegistry {
        &mut self.registry
    }

    pub fn config(&self) -> &RenderConfig {
        &self.session.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn contexts(&self) -> &ContextStack {
        &self.session.contexts
    }

    pub fn states(&self) -> &StateStore {
        &self.session.states
    }

    /// Direct access to the store between passes, e.g. to reset a scope.
    pub fn states_mut(&mut self) -> &mut StateStore {
        &mut self.session.states
    }

    pub fn styles(&self) -> &StyleCache {
        &self.session.styles
    }

    pub fn styles_mut(&mut self) -> &mut StyleCache {
        &mut self.session.styles
    }

    pub fn assets(&self) -> &Arc<AssetPool> {
        self.session.styles.assets()
    }

    /// Draw `root` and everything below it through `canvas`.
    ///
    /// Renderer failures are contained and drawn as error boxes; only orchestration
    /// errors are returned. State records not re-declared during a pass that had no
    /// failures are evicted according to the configured policy.
    pub fn render_dom(&mut self, root: &dyn Element, canvas: &mut dyn Canvas) -> Result<()> {
        if self.phase == Phase::Rendering {
            return Err(Error::AlreadyRendering);
        }
        self.phase = Phase::Rendering;

        let session = &mut self.session;
        session.states.begin_pass();
        session.stats.passes += 1;
        log::trace!("render pass {} started", session.states.pass());

        let failures_before = session.stats.failures;
        let result = draw_element(&self.registry, session, canvas, root);
        match &result {
            // A failed subtree was not visited; sweeping now would drop its state.
            Ok(()) if session.stats.failures > failures_before => {
                log::debug!("pass contained failures, skipping state eviction");
            }
            Ok(()) => {
                let evicted = session.states.end_pass(session.config.eviction);
                if evicted > 0 {
                    log::debug!("evicted {evicted} stale state records");
                }
            }
            Err(err) => {
                log::error!("render pass aborted: {err}");
            }
        }

        self.phase = Phase::Idle;
        let snapshot = self.stats();
        self.session.stats.log_summary(&snapshot);
        result
    }

    /// Size `element` would occupy, without touching persistent state.
    pub fn calculate_element_size(&mut self, element: &dyn Element) -> Size {
        measure_element(&self.registry, &mut self.session, element)
    }

    /// Recover from a pass that unwound out of `render_dom` (only possible with
    /// panic containment disabled).
    pub fn abort_pass(&mut self) {
        if self.phase == Phase::Idle {
            return;
        }
        log::warn!("aborting unfinished render pass");
        self.session.contexts = ContextStack::new();
        self.session.states.restore_scopes(0);
        self.phase = Phase::Idle;
    }

    /// Drop every resolved style. Generated assets are kept.
    pub fn clear_style_cache(&mut self) {
        self.session.styles.clear();
    }

    /// Release every generated asset through `canvas` and drop the styles using them.
    pub fn dispose_assets(&mut self, canvas: &mut dyn Canvas) -> usize {
        let disposed = self.session.styles.assets().dispose(canvas);
        self.session.styles.reattach_bases();
        disposed
    }

    pub fn stats(&self) -> StatsSnapshot {
        let session = &self.session;
        let assets = session.styles.assets();
        StatsSnapshot {
            passes: session.stats.passes,
            draws: session.stats.draws,
            measures: session.stats.measures,
            failures: session.stats.failures,
            misses: session.stats.misses,
            style_hits: session.styles.hits(),
            style_misses: session.styles.misses(),
            state_created: session.states.created_total(),
            state_evicted: session.states.evicted_total(),
            asset_hits: assets.hits(),
            asset_misses: assets.misses(),
        }
    }

    /// Reset the dispatch counters. Cache counters are cumulative.
    pub fn reset_stats(&mut self) {
        self.session.stats.reset();
    }
}

enum Outcome<T> {
    Returned(Result<T>),
    Panicked(Box<dyn Any + Send>),
}

fn guarded<T>(catch_panics: bool, f: impl FnOnce() -> Result<T>) -> Outcome<T> {
    if !catch_panics {
        return Outcome::Returned(f());
    }
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => Outcome::Returned(result),
        Err(payload) => Outcome::Panicked(payload),
    }
}

fn log_failure(kind: ElementKind, phase: &str, message: &str, trace: Option<&Backtrace>) {
    match trace {
        Some(trace) => log::error!("`{}` failed to {phase}: {message}\n{trace}", kind.name),
        None => log::error!("`{}` failed to {phase}: {message}", kind.name),
    }
}

/// End every group opened above `depth`. Returns how many were closed.
fn close_groups(canvas: &mut dyn Canvas, depth: usize) -> usize {
    let open = canvas.group_depth().saturating_sub(depth);
    for _ in 0..open {
        canvas.end_group();
    }
    open
}

/// Dispatch one element for drawing. Returns `Err` only for fatal errors.
fn draw_element(
    registry: &RendererRegistry,
    session: &mut Session,
    canvas: &mut dyn Canvas,
    element: &dyn Element,
) -> Result<()> {
    let kind = element.kind();
    let renderer = match registry.resolve(element) {
        Ok(renderer) => renderer,
        Err(err) => {
            session.note_miss(kind, &err);
            return Ok(());
        }
    };
    session.stats.draws += 1;
    let claim = session.claim(kind);
    let context_mark = session.contexts.mark();
    let scope_depth = session.states.scope_depth();
    let group_depth = canvas.group_depth();
    let catch_panics = session.config.catch_panics;

    let outcome = guarded(catch_panics, || {
        let style = session
            .styles
            .resolve_for(element.style(), renderer.base_style());
        let mut cx = DrawCx {
            registry,
            session: &mut *session,
            canvas: &mut *canvas,
            claim,
            kind,
        };
        renderer.draw(element, style.as_deref(), &mut cx)
    });

    let contexts_found = session.contexts.len();
    let scopes_found = session.states.scope_depth();
    let contexts_balanced = session.contexts.restore(context_mark);
    let scopes_balanced = session.states.restore_scopes(scope_depth);
    let open_groups = close_groups(canvas, group_depth);

    let report = match outcome {
        Outcome::Returned(Ok(())) => {
            if open_groups > 0 {
                log::warn!("`{}` left {open_groups} canvas group(s) open", kind.name);
            }
            if !contexts_balanced {
                return Err(Error::ContextImbalance {
                    kind: kind.name,
                    expected: context_mark.depth(),
                    found: contexts_found,
                });
            }
            if !scopes_balanced {
                return Err(Error::ScopeImbalance {
                    kind: kind.name,
                    expected: scope_depth,
                    found: scopes_found,
                });
            }
            return Ok(());
        }
        Outcome::Returned(Err(err)) if err.is_fatal() => return Err(err),
        Outcome::Returned(Err(err)) => {
            log_failure(kind, "draw", &err.to_string(), err.captured_trace());
            FailureReport::from_error(kind.name, &err)
        }
        Outcome::Panicked(payload) => {
            let trace = error::take_panic_trace();
            let report = FailureReport::from_panic(kind.name, payload.as_ref(), trace.as_ref());
            log_failure(kind, "draw", &report.message, trace.as_ref());
            report
        }
    };

    session.stats.failures += 1;
    let rect = canvas.allocate(session.config.error_box_size);
    canvas.draw_error(rect, &report);
    Ok(())
}

/// Dispatch one element for measurement. Failures measure as zero.
fn measure_element(
    registry: &RendererRegistry,
    session: &mut Session,
    element: &dyn Element,
) -> Size {
    let kind = element.kind();
    let renderer = match registry.resolve(element) {
        Ok(renderer) => renderer,
        Err(err) => {
            session.note_miss(kind, &err);
            return Size::ZERO;
        }
    };
    session.stats.measures += 1;
    let context_mark = session.contexts.mark();
    let scope_depth = session.states.scope_depth();
    let catch_panics = session.config.catch_panics;

    let outcome = guarded(catch_panics, || {
        let style = session
            .styles
            .resolve_for(element.style(), renderer.base_style());
        let mut cx = MeasureCx {
            registry,
            session: &mut *session,
            kind,
        };
        renderer.measure(element, style.as_deref(), &mut cx)
    });

    let balanced = session.contexts.restore(context_mark) & session.states.restore_scopes(scope_depth);

    match outcome {
        Outcome::Returned(Ok(size)) => {
            if !balanced {
                log::warn!("`{}` left the stacks unbalanced while measuring", kind.name);
            }
            size
        }
        Outcome::Returned(Err(err)) => {
            session.stats.failures += 1;
            log::warn!("`{}` failed to measure: {err}", kind.name);
            Size::ZERO
        }
        Outcome::Panicked(payload) => {
            session.stats.failures += 1;
            let trace = error::take_panic_trace();
            let report = FailureReport::from_panic(kind.name, payload.as_ref(), trace.as_ref());
            log_failure(kind, "measure", &report.message, trace.as_ref());
            Size::ZERO
        }
    }
}

/// Handle a renderer gets while drawing one element.
pub struct DrawCx<'a> {
    registry: &'a RendererRegistry,
    session: &'a mut Session,
    canvas: &'a mut dyn Canvas,
    claim: Claim,
    kind: ElementKind,
}

impl<'a> DrawCx<'a> {
    /// Kind of the element being drawn.
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn canvas(&mut self) -> &mut dyn Canvas {
        &mut *self.canvas
    }

    /// Draw a child through its own failure boundary.
    ///
    /// A failing child is replaced by an error box and this still returns `Ok`; an
    /// `Err` means the whole pass must stop and should be propagated with `?`.
    pub fn draw_child(&mut self, child: &dyn Element) -> Result<()> {
        draw_element(self.registry, &mut *self.session, &mut *self.canvas, child)
    }

    /// Draw `children` in order.
    pub fn draw_children(&mut self, children: &[AnyElement]) -> Result<()> {
        for child in children {
            self.draw_child(child.as_element())?;
        }
        Ok(())
    }

    /// Measure a child mid-draw. The draw pass's stacks are left as they were.
    pub fn measure_child(&mut self, child: &dyn Element) -> Size {
        measure_element(self.registry, &mut *self.session, child)
    }

    /// Nearest enclosing context value of type `T`.
    pub fn context<T: 'static>(&self) -> Option<&T> {
        self.session.contexts.try_get::<T>()
    }

    pub fn contexts(&self) -> &ContextStack {
        &self.session.contexts
    }

    /// Run `f` with `value` visible to everything it draws.
    pub fn provide<T: 'static, R>(
        &mut self,
        value: T,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        self.session.contexts.push(value);
        let result = f(self);
        let popped = self.session.contexts.pop::<T>();
        let value = result?;
        popped?;
        Ok(value)
    }

    /// Run `f` with every value in `batch` visible to everything it draws.
    pub fn provide_batch<R>(
        &mut self,
        batch: &ContextBatch,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        self.session.contexts.push_batch(batch);
        let result = f(self);
        let popped = self.session.contexts.pop_batch(batch);
        let value = result?;
        popped?;
        Ok(value)
    }

    /// Persistent state for `key`, created with `init` the first time it is declared.
    pub fn state<S: 'static>(
        &mut self,
        key: impl Into<StateKey>,
        init: impl FnOnce() -> S,
    ) -> Result<&mut S> {
        self.session
            .states
            .get_or_create(self.claim, &key.into(), init)
    }

    pub fn update_state<S: 'static>(&mut self, key: impl Into<StateKey>, value: S) -> Result<()> {
        self.session.states.update(self.claim, &key.into(), value)
    }

    /// Drop this element kind's record for `key` in the current scope.
    pub fn evict_state(&mut self, key: impl Into<StateKey>) -> bool {
        self.session.states.evict(self.kind.id, &key.into())
    }

    /// Run `f` inside the nested state namespace `name`.
    pub fn with_state_scope<R>(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        self.session.states.push_scope(name);
        let result = f(self);
        self.session.states.pop_scope()?;
        result
    }

    pub fn current_scope(&self) -> &str {
        self.session.states.current_scope()
    }

    /// Drop every record under the namespace `path`.
    pub fn clear_state_scope(&mut self, path: &str) -> usize {
        self.session.states.clear_scope(path)
    }

    pub fn resolve_style(
        &mut self,
        descriptor: &StyleDescriptor,
        base: Option<&str>,
    ) -> Option<Arc<ResolvedStyle>> {
        self.session.styles.resolve_for(Some(descriptor), base)
    }

    pub fn asset(&self, key: AssetKey) -> Arc<CachedAsset> {
        self.session.styles.assets().resolve_asset(key)
    }
}

/// Handle a renderer gets while measuring. Persistent state is read-only.
pub struct MeasureCx<'a> {
    registry: &'a RendererRegistry,
    session: &'a mut Session,
    kind: ElementKind,
}

impl<'a> MeasureCx<'a> {
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn measure_child(&mut self, child: &dyn Element) -> Size {
        measure_element(self.registry, &mut *self.session, child)
    }

    pub fn context<T: 'static>(&self) -> Option<&T> {
        self.session.contexts.try_get::<T>()
    }

    pub fn contexts(&self) -> &ContextStack {
        &self.session.contexts
    }

    pub fn provide<T: 'static, R>(
        &mut self,
        value: T,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        self.session.contexts.push(value);
        let result = f(self);
        let popped = self.session.contexts.pop::<T>();
        let value = result?;
        popped?;
        Ok(value)
    }

    pub fn provide_batch<R>(
        &mut self,
        batch: &ContextBatch,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        self.session.contexts.push_batch(batch);
        let result = f(self);
        let popped = self.session.contexts.pop_batch(batch);
        let value = result?;
        popped?;
        Ok(value)
    }

    /// Existing state for `key`, without creating or claiming it.
    pub fn peek_state<S: 'static>(&self, key: impl Into<StateKey>) -> Result<Option<&S>> {
        self.session.states.peek::<S>(self.kind.id, &key.into())
    }

    pub fn with_state_scope<R>(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        self.session.states.push_scope(name);
        let result = f(self);
        self.session.states.pop_scope()?;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{DrawCommand, RecordingCanvas};
    use crate::registry::Renderer;

    struct Leaf(&'static str);

    impl Element for Leaf {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct LeafRenderer;

    impl Renderer<Leaf> for LeafRenderer {
        fn measure(&self, leaf: &Leaf, _: Option<&ResolvedStyle>, _: &mut MeasureCx<'_>) -> Result<Size> {
            Ok(Size::new(leaf.0.len() as f32 * 8.0, 16.0))
        }

        fn draw(&self, leaf: &Leaf, style: Option<&ResolvedStyle>, cx: &mut DrawCx<'_>) -> Result<()> {
            let rect = cx.canvas().allocate(Size::new(leaf.0.len() as f32 * 8.0, 16.0));
            let style = style.cloned().unwrap_or_default();
            cx.canvas().draw_text(rect, leaf.0, &style);
            Ok(())
        }
    }

    struct Leaky;

    impl Element for Leaky {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct LeakyRenderer;

    impl Renderer<Leaky> for LeakyRenderer {
        fn measure(&self, _: &Leaky, _: Option<&ResolvedStyle>, cx: &mut MeasureCx<'_>) -> Result<Size> {
            cx.session.contexts.push(1u8);
            Ok(Size::ZERO)
        }

        fn draw(&self, _: &Leaky, _: Option<&ResolvedStyle>, cx: &mut DrawCx<'_>) -> Result<()> {
            cx.session.contexts.push(1u8);
            Ok(())
        }
    }

    fn manager() -> RenderManager {
        let mut registry = RendererRegistry::new();
        registry.register::<Leaf>(LeafRenderer);
        registry.register::<Leaky>(LeakyRenderer);
        RenderManager::new(registry)
    }

    #[test]
    fn test_render_leaf() {
        let mut manager = manager();
        let mut canvas = RecordingCanvas::new();
        manager.render_dom(&Leaf("hello"), &mut canvas).unwrap();
        assert_eq!(canvas.texts(), vec!["hello"]);
        assert_eq!(manager.phase(), Phase::Idle);
        assert_eq!(manager.stats().draws, 1);
    }

    #[test]
    fn test_miss_draws_nothing_and_counts() {
        let mut manager = RenderManager::new(RendererRegistry::new());
        let mut canvas = RecordingCanvas::new();
        manager.render_dom(&Leaf("x"), &mut canvas).unwrap();
        manager.render_dom(&Leaf("x"), &mut canvas).unwrap();
        assert!(canvas.commands().is_empty());
        assert_eq!(manager.stats().misses, 2);
        assert_eq!(manager.calculate_element_size(&Leaf("x")), Size::ZERO);
    }

    #[test]
    fn test_unbalanced_renderer_is_fatal() {
        let mut manager = manager();
        let mut canvas = RecordingCanvas::new();
        let err = manager.render_dom(&Leaky, &mut canvas).unwrap_err();
        assert!(matches!(
            err,
            Error::ContextImbalance {
                expected: 0,
                found: 1,
                ..
            }
        ));
        assert!(manager.contexts().is_empty());
        assert_eq!(manager.phase(), Phase::Idle);
    }

    #[test]
    fn test_unbalanced_measure_is_repaired() {
        let mut manager = manager();
        assert_eq!(manager.calculate_element_size(&Leaky), Size::ZERO);
        assert!(manager.contexts().is_empty());
    }

    #[test]
    fn test_measure_matches_renderer() {
        let mut manager = manager();
        assert_eq!(
            manager.calculate_element_size(&Leaf("abc")),
            Size::new(24.0, 16.0)
        );
        assert_eq!(manager.stats().measures, 1);
    }

    #[test]
    fn test_escaped_panic_requires_abort() {
        struct Boom;

        impl Element for Boom {
            fn as_any(&self) -> &dyn Any {
                self
            }
        }

        struct BoomRenderer;

        impl Renderer<Boom> for BoomRenderer {
            fn measure(&self, _: &Boom, _: Option<&ResolvedStyle>, _: &mut MeasureCx<'_>) -> Result<Size> {
                Ok(Size::ZERO)
            }

            fn draw(&self, _: &Boom, _: Option<&ResolvedStyle>, cx: &mut DrawCx<'_>) -> Result<()> {
                cx.provide(5u32, |_| -> Result<()> { panic!("unwinds") })
            }
        }

        let mut registry = RendererRegistry::new();
        registry.register::<Boom>(BoomRenderer);
        registry.register::<Leaf>(LeafRenderer);
        let mut manager =
            RenderManager::with_config(registry, RenderConfig::new().catch_panics(false));
        let mut canvas = RecordingCanvas::new();

        let unwound = panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = manager.render_dom(&Boom, &mut canvas);
        }));
        assert!(unwound.is_err());
        assert_eq!(manager.phase(), Phase::Rendering);
        assert!(matches!(
            manager.render_dom(&Leaf("x"), &mut canvas),
            Err(Error::AlreadyRendering)
        ));

        manager.abort_pass();
        assert!(manager.contexts().is_empty());
        manager.render_dom(&Leaf("x"), &mut canvas).unwrap();
        assert!(canvas
            .commands()
            .iter()
            .any(|c| matches!(c, DrawCommand::Text { text, .. } if text == "x")));
    }
}
