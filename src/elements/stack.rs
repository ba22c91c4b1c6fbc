use crate::element::AnyElement;
use crate::error::Result;
use crate::geometry::{Axis, Size};
use crate::manager::{DrawCx, MeasureCx};
use crate::registry::Renderer;
use crate::style::{ResolvedStyle, StyleDescriptor};
use crate::Element;

/// Children laid out top to bottom.
#[derive(Element, Default)]
pub struct Column {
    #[element(children)]
    children: Vec<AnyElement>,
    spacing: f32,
    #[element(style)]
    style: Option<StyleDescriptor>,
}

/// Children laid out left to right.
#[derive(Element, Default)]
pub struct Row {
    #[element(children)]
    children: Vec<AnyElement>,
    spacing: f32,
    #[element(style)]
    style: Option<StyleDescriptor>,
}

macro_rules! stack_builders {
    ($ty:ident) => {
        impl $ty {
            pub fn new() -> Self {
                Self::default()
            }

            pub fn child(mut self, child: impl Into<AnyElement>) -> Self {
                self.children.push(child.into());
                self
            }

            pub fn with_children<I, C>(mut self, children: I) -> Self
            where
                I: IntoIterator<Item = C>,
                C: Into<AnyElement>,
            {
                self.children.extend(children.into_iter().map(Into::into));
                self
            }

            /// Gap inserted between consecutive children. Negative values count as zero.
            pub fn spacing(mut self, spacing: f32) -> Self {
                self.spacing = spacing;
                self
            }

            pub fn style(mut self, style: StyleDescriptor) -> Self {
                self.style = Some(style);
                self
            }
        }
    };
}

stack_builders!(Column);
stack_builders!(Row);

pub fn column() -> Column {
    Column::new()
}

pub fn row() -> Row {
    Row::new()
}

/// Renders [`Column`] and [`Row`] as host layout groups.
pub struct StackRenderer;

impl StackRenderer {
    fn measure_stack(
        axis: Axis,
        children: &[AnyElement],
        spacing: f32,
        style: Option<&ResolvedStyle>,
        cx: &mut MeasureCx<'_>,
    ) -> Size {
        let spacing = spacing.max(0.0);
        let mut main = 0.0_f32;
        let mut cross = 0.0_f32;
        for (i, child) in children.iter().enumerate() {
            let size = cx.measure_child(child.as_element());
            let (along, across) = match axis {
                Axis::Vertical => (size.height, size.width),
                Axis::Horizontal => (size.width, size.height),
            };
            if i > 0 {
                main += spacing;
            }
            main += along;
            cross = cross.max(across);
        }
        let content = match axis {
            Axis::Vertical => Size::new(cross, main),
            Axis::Horizontal => Size::new(main, cross),
        };
        let Some(style) = style else {
            return content;
        };
        let padded = content.padded(style.padding);
        Size::new(
            style.width.unwrap_or(padded.width),
            style.height.unwrap_or(padded.height),
        )
    }

    fn draw_stack(
        axis: Axis,
        children: &[AnyElement],
        spacing: f32,
        style: Option<&ResolvedStyle>,
        cx: &mut DrawCx<'_>,
    ) -> Result<()> {
        let spacing = spacing.max(0.0);
        cx.canvas().begin_group(axis, style);
        let gap = match axis {
            Axis::Vertical => Size::new(0.0, spacing),
            Axis::Horizontal => Size::new(spacing, 0.0),
        };
        let result = children.iter().enumerate().try_for_each(|(i, child)| {
            if i > 0 && spacing > 0.0 {
                cx.canvas().allocate(gap);
            }
            cx.draw_child(child.as_element())
        });
        cx.canvas().end_group();
        result
    }
}

impl Renderer<Column> for StackRenderer {
    fn measure(
        &self,
        column: &Column,
        style: Option<&ResolvedStyle>,
        cx: &mut MeasureCx<'_>,
    ) -> Result<Size> {
        Ok(Self::measure_stack(
            Axis::Vertical,
            &column.children,
            column.spacing,
            style,
            cx,
        ))
    }

    fn draw(&self, column: &Column, style: Option<&ResolvedStyle>, cx: &mut DrawCx<'_>) -> Result<()> {
        Self::draw_stack(Axis::Vertical, &column.children, column.spacing, style, cx)
    }
}

impl Renderer<Row> for StackRenderer {
    fn measure(&self, row: &Row, style: Option<&ResolvedStyle>, cx: &mut MeasureCx<'_>) -> Result<Size> {
        Ok(Self::measure_stack(
            Axis::Horizontal,
            &row.children,
            row.spacing,
            style,
            cx,
        ))
    }

    fn draw(&self, row: &Row, style: Option<&ResolvedStyle>, cx: &mut DrawCx<'_>) -> Result<()> {
        Self::draw_stack(Axis::Horizontal, &row.children, row.spacing, style, cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::RecordingCanvas;
    use crate::elements::spacer;
    use crate::registry::RendererRegistry;
    use crate::RenderManager;

    #[test]
    fn test_column_measure_sums_heights() {
        let mut manager = RenderManager::new(RendererRegistry::with_builtins());
        let tree = column()
            .spacing(4.0)
            .child(spacer(10.0, 20.0))
            .child(spacer(30.0, 5.0));
        assert_eq!(
            manager.calculate_element_size(&tree),
            Size::new(30.0, 29.0)
        );
    }

    #[test]
    fn test_row_measure_with_padding_and_fixed_height() {
        let mut manager = RenderManager::new(RendererRegistry::with_builtins());
        let tree = row()
            .style(StyleDescriptor::new().padding(2.0).height(50.0))
            .child(spacer(10.0, 20.0))
            .child(spacer(30.0, 5.0));
        assert_eq!(
            manager.calculate_element_size(&tree),
            Size::new(44.0, 50.0)
        );
    }

    #[test]
    fn test_measure_predicts_drawn_size() {
        let mut manager = RenderManager::new(RendererRegistry::with_builtins());
        let trees = [
            row()
                .style(StyleDescriptor::new().padding(2.0).height(50.0))
                .child(spacer(10.0, 20.0)),
            row()
                .style(StyleDescriptor::new().width(8.0))
                .child(spacer(10.0, 20.0))
                .child(spacer(4.0, 4.0)),
            row()
                .spacing(-3.0)
                .child(spacer(10.0, 20.0))
                .child(spacer(4.0, 4.0)),
        ];
        for tree in &trees {
            let mut canvas = RecordingCanvas::new();
            manager.render_dom(tree, &mut canvas).unwrap();
            assert_eq!(manager.calculate_element_size(tree), canvas.content_size());
        }
    }

    #[test]
    fn test_nested_stacks_draw_in_order() {
        let mut manager = RenderManager::new(RendererRegistry::with_builtins());
        let mut canvas = RecordingCanvas::new();
        let tree = column()
            .child(row().child(spacer(10.0, 10.0)).child(spacer(5.0, 5.0)))
            .child(spacer(8.0, 8.0));
        manager.render_dom(&tree, &mut canvas).unwrap();
        assert_eq!(canvas.group_depth(), 0);
        assert_eq!(canvas.content_size(), Size::new(15.0, 18.0));
    }
}
