//! Pointer geometry and the drag state machine.

use std::ops::{Add, AddAssign, Sub};

/// Integer pixel position in image space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Cumulative 2D translation of a mask since the last reset.
///
/// Point and offset arithmetic saturates at the `i32` range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Offset {
    pub x: i32,
    pub y: i32,
}

impl Offset {
    pub const ZERO: Self = Self::new(0, 0);

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn is_zero(&self) -> bool {
        self.x == 0 && self.y == 0
    }
}

impl Sub for Point {
    type Output = Offset;

    fn sub(self, rhs: Self) -> Offset {
        Offset::new(self.x.saturating_sub(rhs.x), self.y.saturating_sub(rhs.y))
    }
}

impl Sub<Offset> for Point {
    type Output = Point;

    fn sub(self, rhs: Offset) -> Point {
        Point::new(self.x.saturating_sub(rhs.x), self.y.saturating_sub(rhs.y))
    }
}

impl Add<Offset> for Point {
    type Output = Point;

    fn add(self, rhs: Offset) -> Point {
        Point::new(self.x.saturating_add(rhs.x), self.y.saturating_add(rhs.y))
    }
}

impl AddAssign for Offset {
    fn add_assign(&mut self, rhs: Self) {
        self.x = self.x.saturating_add(rhs.x);
        self.y = self.y.saturating_add(rhs.y);
    }
}

/// Where the rendering surface is displayed, in client coordinates.
///
/// The surface may be shown scaled; client positions are mapped back onto
/// natural image pixels before any hit test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl SurfaceRect {
    /// Surface displayed at its natural size at the client origin.
    pub fn identity(width: u32, height: u32) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width: width as f64,
            height: height as f64,
        }
    }

    /// Map a client position to the image pixel under it.
    pub fn to_image(&self, client_x: f64, client_y: f64, natural: (u32, u32)) -> Point {
        let scale = |extent: f64, natural: u32| {
            if extent > 0.0 {
                natural as f64 / extent
            } else {
                1.0
            }
        };
        let x = ((client_x - self.left) * scale(self.width, natural.0)).round();
        let y = ((client_y - self.top) * scale(self.height, natural.1)).round();
        Point::new(x as i32, y as i32)
    }
}

/// A single touch contact in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Touch {
    pub client_x: f64,
    pub client_y: f64,
}

/// Input delivered to the viewer, in client coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerDown { client_x: f64, client_y: f64 },
    PointerMove { client_x: f64, client_y: f64 },
    PointerUp,
    TouchStart { touches: Vec<Touch> },
    TouchMove { touches: Vec<Touch> },
    TouchEnd,
    Key(char),
}

/// Keyboard command that puts every piece back where it was cut out.
pub const RESET_KEY: char = 'r';

/// Drag gesture state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        /// Indices of every mask under the press point.
        selection: Vec<usize>,
        /// Pointer position after the last applied move.
        last: Point,
    },
}

impl DragState {
    pub const fn is_dragging(&self) -> bool {
        matches!(self, Self::Dragging { .. })
    }

    pub fn selection(&self) -> &[usize] {
        match self {
            Self::Idle => &[],
            Self::Dragging { selection, .. } => selection,
        }
    }

    /// Enter `Dragging` unless nothing was hit.
    pub fn press(&mut self, selection: Vec<usize>, at: Point) -> bool {
        if selection.is_empty() {
            *self = Self::Idle;
            return false;
        }
        *self = Self::Dragging {
            selection,
            last: at,
        };
        true
    }

    /// Incremental delta since the previous move, or `None` while idle.
    pub fn advance(&mut self, to: Point) -> Option<Offset> {
        match self {
            Self::Idle => None,
            Self::Dragging { last, .. } => {
                let delta = to - *last;
                *last = to;
                Some(delta)
            }
        }
    }

    /// Leave `Dragging`, handing back the selection that was active.
    pub fn release(&mut self) -> Vec<usize> {
        match std::mem::take(self) {
            Self::Idle => Vec::new(),
            Self::Dragging { selection, .. } => selection,
        }
    }
}
