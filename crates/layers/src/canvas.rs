//! Retained 2D drawing surface.
//!
//! Surfaces record draw commands instead of rasterizing, so a host can replay
//! them onto whatever backend it presents with.

use std::cell::RefCell;
use std::rc::Rc;

use foundation::math::Vec2;

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Polyline {
        points: Vec<Vec2>,
        stroke_width: f64,
        color: [f32; 4],
    },
    Icon {
        image: String,
        /// Top-left corner.
        position: Vec2,
        size: Vec2,
    },
    Text {
        text: String,
        /// Top-left corner of the text box.
        position: Vec2,
        font_size: f64,
        background: bool,
    },
}

/// Presentation transform for a cached surface: scale, then translate, then rotate.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CssTransform {
    pub scale: f64,
    /// Already divided by `scale`.
    pub translate: Vec2,
    pub rotate: f64,
}

impl Default for CssTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            translate: Vec2::ZERO,
            rotate: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanvasSurface {
    width: f64,
    height: f64,
    commands: Vec<DrawCommand>,
    css_transform: CssTransform,
}

pub type SharedSurface = Rc<RefCell<CanvasSurface>>;

impl CanvasSurface {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn shared(width: f64, height: f64) -> SharedSurface {
        Rc::new(RefCell::new(Self::new(width, height)))
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Resizing discards the contents.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
        self.commands.clear();
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn draw(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Replace this surface's contents with `other`'s.
    pub fn copy_from(&mut self, other: &CanvasSurface) {
        self.commands.clone_from(&other.commands);
    }

    pub fn css_transform(&self) -> CssTransform {
        self.css_transform
    }

    pub fn set_css_transform(&mut self, transform: CssTransform) {
        self.css_transform = transform;
    }
}
