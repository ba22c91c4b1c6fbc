//! Built-in structural elements.
//!
//! Concrete controls (labels, buttons, sliders) are supplied by the host
//! application; these are the pieces the engine itself needs to compose a tree:
//! layout stacks, context providers and consumers, keyed state, and state namespaces.

mod provide;
mod spacer;
mod stack;
mod stateful;

pub use provide::{
    consume, provide, provide_many, Consume, ConsumeFamily, ConsumeRenderer, Consumer, Provide,
    ProvideFamily, ProvideMany, ProvideRenderer, Provider,
};
pub use spacer::{spacer, Spacer, SpacerRenderer};
pub use stack::{column, row, Column, Row, StackRenderer};
pub use stateful::{
    state_scope, stateful, StateScope, StateScopeRenderer, Stateful, StatefulFamily,
    StatefulRenderer, StatefulView,
};

use crate::registry::RendererRegistry;

pub(crate) fn register_builtins(registry: &mut RendererRegistry) {
    registry
        .register::<Column>(StackRenderer)
        .register::<Row>(StackRenderer)
        .register::<Spacer>(SpacerRenderer)
        .register::<ProvideMany>(ProvideRenderer)
        .register::<StateScope>(StateScopeRenderer)
        .register_family::<ProvideFamily>(ProvideRenderer)
        .register_family::<ConsumeFamily>(ConsumeRenderer)
        .register_family::<StatefulFamily>(StatefulRenderer);
}
