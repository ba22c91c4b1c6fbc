//! The host drawing boundary.
//!
//! Renderers issue immediate-mode calls through [`Canvas`]. Like most immediate-mode
//! APIs the host owns an implicit layout cursor: `allocate` hands out the next slot and
//! advances it along the current group's axis, which is why children must be drawn in
//! declared order.

use crate::error::FailureReport;
use crate::geometry::{Axis, Color, Padding, Rect, Size};
use crate::style::{AssetId, ResolvedStyle};

pub trait Canvas {
    /// Reserve `size` at the layout cursor and advance it.
    fn allocate(&mut self, size: Size) -> Rect;

    /// Open a nested layout group. `style` padding insets the group's content; its
    /// width and height, when set, fix the group's outer size.
    fn begin_group(&mut self, axis: Axis, style: Option<&ResolvedStyle>);

    fn end_group(&mut self);

    /// Number of groups currently open.
    fn group_depth(&self) -> usize;

    /// Paint a background using the style's fill and corner mask assets.
    fn fill_rect(&mut self, rect: Rect, style: &ResolvedStyle);

    fn draw_text(&mut self, rect: Rect, text: &str, style: &ResolvedStyle);

    /// Visible stand-in for an element whose renderer failed.
    fn draw_error(&mut self, rect: Rect, report: &FailureReport);

    /// Free the host copy of a generated asset.
    fn release_asset(&mut self, id: AssetId) {
        let _ = id;
    }
}

pub const ERROR_BACKGROUND: Color = Color::rgba(0.55, 0.05, 0.05, 0.9);
pub const ERROR_TEXT: Color = Color::rgb(1.0, 0.85, 0.85);

/// Paint a failure report with primitive calls, for hosts without a native error
/// widget.
pub fn paint_error_box(canvas: &mut dyn Canvas, rect: Rect, report: &FailureReport) {
    let background = ResolvedStyle {
        background: Some(ERROR_BACKGROUND),
        ..ResolvedStyle::default()
    };
    canvas.fill_rect(rect, &background);

    let text_style = ResolvedStyle {
        color: ERROR_TEXT,
        font_size: 11.0,
        ..ResolvedStyle::default()
    };
    let line = text_style.font_size * 1.3;
    let inner = rect.inset(Padding::all(4.0));
    let mut lines = vec![
        format!("{} failed", report.kind),
        report.message.clone(),
    ];
    if let Some(frame) = &report.first_frame {
        lines.push(format!("at {frame}"));
    }
    let bottom = inner.y + inner.height;
    for (i, text) in lines.iter().enumerate() {
        let y = inner.y + line * i as f32;
        // The kind line is always drawn, clipped to the box.
        if i > 0 && y + line > bottom {
            break;
        }
        let height = line.min(bottom - y).max(0.0);
        canvas.draw_text(Rect::new(inner.x, y, inner.width, height), text, &text_style);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    BeginGroup {
        axis: Axis,
        origin: (f32, f32),
    },
    EndGroup {
        rect: Rect,
    },
    Fill {
        rect: Rect,
        color: Color,
        radius: f32,
        fill: Option<AssetId>,
        corner_mask: Option<AssetId>,
    },
    Text {
        rect: Rect,
        text: String,
        color: Color,
        font_size: f32,
    },
    ErrorBox {
        rect: Rect,
        report: FailureReport,
    },
    ReleaseAsset(AssetId),
}

struct Group {
    axis: Axis,
    origin: (f32, f32),
    padding: Padding,
    width: Option<f32>,
    height: Option<f32>,
    /// Extent of the content along and across the axis.
    main: f32,
    cross: f32,
}

impl Group {
    fn cursor(&self) -> (f32, f32) {
        let x = self.origin.0 + self.padding.left;
        let y = self.origin.1 + self.padding.top;
        match self.axis {
            Axis::Vertical => (x, y + self.main),
            Axis::Horizontal => (x + self.main, y),
        }
    }

    fn advance(&mut self, size: Size) {
        let (along, across) = match self.axis {
            Axis::Vertical => (size.height, size.width),
            Axis::Horizontal => (size.width, size.height),
        };
        self.main += along;
        self.cross = self.cross.max(across);
    }

    fn outer_size(&self) -> Size {
        let content = match self.axis {
            Axis::Vertical => Size::new(self.cross, self.main),
            Axis::Horizontal => Size::new(self.main, self.cross),
        };
        let padded = content.padded(self.padding);
        Size::new(
            self.width.unwrap_or(padded.width),
            self.height.unwrap_or(padded.height),
        )
    }
}

/// In-memory host that records every call, for tests and headless hosts.
pub struct RecordingCanvas {
    commands: Vec<DrawCommand>,
    groups: Vec<Group>,
}

impl Default for RecordingCanvas {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            groups: vec![Group {
                axis: Axis::Vertical,
                origin: (0.0, 0.0),
                padding: Padding::default(),
                width: None,
                height: None,
                main: 0.0,
                cross: 0.0,
            }],
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Text of every `Text` command, in draw order.
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn error_boxes(&self) -> Vec<&FailureReport> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::ErrorBox { report, .. } => Some(report),
                _ => None,
            })
            .collect()
    }

    /// Size of everything allocated at the top level so far.
    pub fn content_size(&self) -> Size {
        self.groups[0].outer_size()
    }

    pub fn group_depth(&self) -> usize {
        self.groups.len() - 1
    }

    /// Start a new frame: drop recorded commands and reset the cursor.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn current(&mut self) -> &mut Group {
        self.groups
            .last_mut()
            .expect("root group is never popped")
    }
}

impl Canvas for RecordingCanvas {
    fn allocate(&mut self, size: Size) -> Rect {
        let group = self.current();
        let (x, y) = group.cursor();
        group.advance(size);
        Rect::new(x, y, size.width, size.height)
    }

    fn begin_group(&mut self, axis: Axis, style: Option<&ResolvedStyle>) {
        let origin = self.current().cursor();
        self.commands.push(DrawCommand::BeginGroup { axis, origin });
        self.groups.push(Group {
            axis,
            origin,
            padding: style.map(|s| s.padding).unwrap_or_default(),
            width: style.and_then(|s| s.width),
            height: style.and_then(|s| s.height),
            main: 0.0,
            cross: 0.0,
        });
    }

    fn group_depth(&self) -> usize {
        RecordingCanvas::group_depth(self)
    }

    fn end_group(&mut self) {
        if self.groups.len() == 1 {
            log::warn!("end_group without matching begin_group");
            return;
        }
        let group = self.groups.pop().expect("checked above");
        let size = group.outer_size();
        let rect = self.allocate(size);
        self.commands.push(DrawCommand::EndGroup { rect });
    }

    fn fill_rect(&mut self, rect: Rect, style: &ResolvedStyle) {
        self.commands.push(DrawCommand::Fill {
            rect,
            color: style.background.unwrap_or_default(),
            radius: style.border_radius,
            fill: style.fill.as_ref().map(|a| a.id()),
            corner_mask: style.corner_mask.as_ref().map(|a| a.id()),
        });
    }

    fn draw_text(&mut self, rect: Rect, text: &str, style: &ResolvedStyle) {
        self.commands.push(DrawCommand::Text {
            rect,
            text: text.to_string(),
            color: style.color,
            font_size: style.font_size,
        });
    }

    fn draw_error(&mut self, rect: Rect, report: &FailureReport) {
        self.commands.push(DrawCommand::ErrorBox {
            rect,
            report: report.clone(),
        });
    }

    fn release_asset(&mut self, id: AssetId) {
        self.commands.push(DrawCommand::ReleaseAsset(id));
    }
}
