//! Integer screen geometry.
//!
//! All rectangles use exclusive right/bottom edges: a `Rect` at `(0, 0)`
//! with width 10 covers columns `0..10`.

use std::fmt;
use std::ops::{Add, Sub};

/// A point in screen or window-relative coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub const fn translated(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Chebyshev distance, used to decide whether a drag has really started.
    pub fn pixels_moved(self, other: Self) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    pub const fn squared_distance(self, other: Self) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// A width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub const fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// True when neither dimension is set (used for "no size increment").
    pub const fn is_null(self) -> bool {
        self.width == 0 && self.height == 0
    }

    pub const fn area(self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Geometry of a rectangular region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn from_location_and_size(location: Point, size: Size) -> Self {
        Self::new(location.x, location.y, size.width, size.height)
    }

    pub const fn location(self) -> Point {
        Point::new(self.x, self.y)
    }

    pub const fn size(self) -> Size {
        Size::new(self.width, self.height)
    }

    pub const fn left(self) -> i32 {
        self.x
    }

    pub const fn top(self) -> i32 {
        self.y
    }

    /// Exclusive right edge.
    pub const fn right(self) -> i32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub const fn bottom(self) -> i32 {
        self.y + self.height
    }

    pub const fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub const fn area(self) -> i64 {
        self.size().area()
    }

    pub const fn center(self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    pub const fn contains(self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    pub const fn contains_rect(self, other: Self) -> bool {
        if other.is_empty() {
            return true;
        }
        other.x >= self.x
            && other.right() <= self.right()
            && other.y >= self.y
            && other.bottom() <= self.bottom()
    }

    pub const fn intersects(self, other: Self) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// The overlapping area of both rects; empty (at the origin) if none.
    #[must_use]
    pub fn intersected(self, other: Self) -> Self {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if left >= right || top >= bottom {
            return Self::default();
        }
        Self::new(left, top, right - left, bottom - top)
    }

    /// Smallest rect covering both. Empty rects are ignored.
    #[must_use]
    pub fn united(self, other: Self) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        let left = self.x.min(other.x);
        let top = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Self::new(left, top, right - left, bottom - top)
    }

    #[must_use]
    pub const fn translated(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    #[must_use]
    pub const fn translated_by(self, delta: Point) -> Self {
        self.translated(delta.x, delta.y)
    }

    /// Grow (or shrink, for negative values) by `dw`/`dh` keeping the center.
    #[must_use]
    pub const fn inflated(self, dw: i32, dh: i32) -> Self {
        Self::new(
            self.x - dw / 2,
            self.y - dh / 2,
            self.width + dw,
            self.height + dh,
        )
    }

    pub fn set_location(&mut self, location: Point) {
        self.x = location.x;
        self.y = location.y;
    }

    pub fn set_size(&mut self, size: Size) {
        self.width = size.width;
        self.height = size.height;
    }

    /// Keep the size, move so the exclusive bottom-right corner lands on `point`.
    pub fn set_right_bottom(&mut self, point: Point) {
        self.x = point.x - self.width;
        self.y = point.y - self.height;
    }

    /// Keep the size, move so the left edge is `point.x` and the exclusive
    /// bottom edge is `point.y`.
    pub fn set_bottom_left(&mut self, point: Point) {
        self.x = point.x;
        self.y = point.y - self.height;
    }

    /// Keep the size, move so the exclusive right edge is `point.x` and the
    /// top edge is `point.y`.
    pub fn set_top_right(&mut self, point: Point) {
        self.x = point.x - self.width;
        self.y = point.y;
    }

    /// Resize to `size` so that `fixed_point` keeps its proportional
    /// position inside the rect.
    pub fn set_size_around(&mut self, size: Size, fixed_point: Point) {
        let fx = if self.width > 0 {
            (fixed_point.x - self.x) as f32 / self.width as f32
        } else {
            0.0
        };
        let fy = if self.height > 0 {
            (fixed_point.y - self.y) as f32 / self.height as f32
        } else {
            0.0
        };
        self.x = fixed_point.x - (size.width as f32 * fx) as i32;
        self.y = fixed_point.y - (size.height as f32 * fy) as i32;
        self.set_size(size);
    }

    pub fn center_within(&mut self, other: Self) {
        self.center_horizontally_within(other);
        self.center_vertically_within(other);
    }

    pub fn center_horizontally_within(&mut self, other: Self) {
        self.x = other.x + (other.width - self.width) / 2;
    }

    pub fn center_vertically_within(&mut self, other: Self) {
        self.y = other.y + (other.height - self.height) / 2;
    }

    /// Split `self` into at most four non-overlapping pieces that together
    /// cover exactly the part of `self` outside `hammer`.
    pub fn shatter(self, hammer: Self) -> Vec<Self> {
        if self.is_empty() {
            return Vec::new();
        }
        if !self.intersects(hammer) {
            return vec![self];
        }
        let cut = self.intersected(hammer);
        let mut pieces = Vec::with_capacity(4);

        let top = Self::new(self.x, self.y, self.width, cut.y - self.y);
        let bottom = Self::new(self.x, cut.bottom(), self.width, self.bottom() - cut.bottom());
        let left = Self::new(self.x, cut.y, cut.x - self.x, cut.height);
        let right = Self::new(cut.right(), cut.y, self.right() - cut.right(), cut.height);

        for piece in [top, bottom, left, right] {
            if !piece.is_empty() {
                pieces.push(piece);
            }
        }
        pieces
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{} {}x{}]", self.x, self.y, self.width, self.height)
    }
}
