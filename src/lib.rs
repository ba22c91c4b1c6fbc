//! Render dispatch and persistence engine for declarative UI trees drawn through an
//! immediate-mode host API.
//!
//! Applications rebuild a tree of lightweight [`Element`]s every frame. A
//! [`RenderManager`] walks the tree, dispatches each element to the renderer
//! registered for its kind, and keeps what must survive between frames: keyed
//! persistent state, resolved styles and generated assets.
//!
//! ```ignore
//! use strata::prelude::*;
//!
//! let mut manager = RenderManager::new(RendererRegistry::with_builtins());
//! let tree = column()
//!     .spacing(4.0)
//!     .child(provide(Theme::dark(), toolbar()))
//!     .child(stateful("clicks", || 0u32, |n| counter_label(*n)));
//! manager.render_dom(&tree, &mut host_canvas)?;
//! ```

// Lets `#[derive(Element)]` refer to `::strata` inside this crate too.
extern crate self as strata;

pub mod canvas;
pub mod config;
pub mod context;
pub mod element;
pub mod elements;
pub mod error;
pub mod geometry;
pub mod manager;
pub mod registry;
pub mod state;
pub mod stats;
pub mod style;

pub use canvas::{Canvas, DrawCommand, RecordingCanvas};
pub use config::RenderConfig;
pub use element::{AnyElement, Element, ElementFamily, ElementKind, FamilyLink, Member};
pub use error::{Error, FailureReport, Result};
pub use manager::{DrawCx, MeasureCx, Phase, RenderManager};
pub use registry::{Renderer, RendererRegistry};
pub use stats::StatsSnapshot;
pub use strata_macros::Element;

pub mod prelude {
    pub use crate::canvas::{Canvas, RecordingCanvas};
    pub use crate::context::{ContextBatch, ContextStack};
    pub use crate::element::{AnyElement, Element, ElementFamily, FamilyLink, Member};
    pub use crate::elements::{
        column, consume, provide, provide_many, row, spacer, state_scope, stateful, Column,
        Consume, Provide, ProvideMany, Row, Spacer, StateScope, Stateful,
    };
    pub use crate::error::{Error, Result};
    pub use crate::geometry::{Alignment, Axis, Color, Padding, Rect, Size};
    pub use crate::manager::{DrawCx, MeasureCx, RenderManager};
    pub use crate::registry::{Renderer, RendererRegistry};
    pub use crate::state::{EvictionPolicy, StateKey};
    pub use crate::style::{ResolvedStyle, StyleDescriptor};
    pub use crate::RenderConfig;
    pub use strata_macros::Element;
}
