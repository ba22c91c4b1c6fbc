use crate::error::Result;
use crate::geometry::Size;
use crate::manager::{DrawCx, MeasureCx};
use crate::registry::Renderer;
use crate::style::{ResolvedStyle, StyleDescriptor};
use crate::Element;

/// Fixed-size leaf. Paints its style's background, if any.
#[derive(Element)]
pub struct Spacer {
    size: Size,
    #[element(style)]
    style: Option<StyleDescriptor>,
}

impl Spacer {
    pub fn new(size: Size) -> Self {
        Self { size, style: None }
    }

    pub fn style(mut self, style: StyleDescriptor) -> Self {
        self.style = Some(style);
        self
    }
}

pub fn spacer(width: f32, height: f32) -> Spacer {
    Spacer::new(Size::new(width, height))
}

pub struct SpacerRenderer;

impl SpacerRenderer {
    fn size(spacer: &Spacer, style: Option<&ResolvedStyle>) -> Size {
        match style {
            Some(style) => Size::new(
                style.width.unwrap_or(spacer.size.width),
                style.height.unwrap_or(spacer.size.height),
            ),
            None => spacer.size,
        }
    }
}

impl Renderer<Spacer> for SpacerRenderer {
    fn measure(
        &self,
        spacer: &Spacer,
        style: Option<&ResolvedStyle>,
        _cx: &mut MeasureCx<'_>,
    ) -> Result<Size> {
        Ok(Self::size(spacer, style))
    }

    fn draw(&self, spacer: &Spacer, style: Option<&ResolvedStyle>, cx: &mut DrawCx<'_>) -> Result<()> {
        let rect = cx.canvas().allocate(Self::size(spacer, style));
        if let Some(style) = style.filter(|s| s.background.is_some()) {
            cx.canvas().fill_rect(rect, style);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{DrawCommand, RecordingCanvas};
    use crate::geometry::{Color, Rect};
    use crate::registry::RendererRegistry;
    use crate::RenderManager;

    #[test]
    fn test_plain_spacer_only_allocates() {
        let mut manager = RenderManager::new(RendererRegistry::with_builtins());
        let mut canvas = RecordingCanvas::new();
        manager.render_dom(&spacer(4.0, 6.0), &mut canvas).unwrap();
        assert!(canvas.commands().is_empty());
        assert_eq!(canvas.content_size(), Size::new(4.0, 6.0));
    }

    #[test]
    fn test_styled_spacer_fills_with_assets() {
        let mut manager = RenderManager::new(RendererRegistry::with_builtins());
        let mut canvas = RecordingCanvas::new();
        let swatch = spacer(10.0, 10.0).style(
            StyleDescriptor::new()
                .background(Color::from_hex(0x3366cc))
                .border_radius(3.0)
                .width(20.0),
        );
        manager.render_dom(&swatch, &mut canvas).unwrap();
        match &canvas.commands()[0] {
            DrawCommand::Fill {
                rect,
                radius,
                fill,
                corner_mask,
                ..
            } => {
                assert_eq!(*rect, Rect::new(0.0, 0.0, 20.0, 10.0));
                assert_eq!(*radius, 3.0);
                assert!(fill.is_some());
                assert!(corner_mask.is_some());
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(manager.assets().len(), 2);
    }
}
