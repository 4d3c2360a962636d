//! Sets of pairwise non-overlapping rectangles.
//!
//! Every region the compositor tracks (dirty areas, per-window opaque and
//! transparent areas, the exposed wallpaper) is a [`DisjointRects`].

use crate::geometry::{Point, Rect};

/// An ordered set of rectangles that never overlap each other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisjointRects {
    rects: Vec<Rect>,
}

impl DisjointRects {
    pub const fn new() -> Self {
        Self { rects: Vec::new() }
    }

    pub fn from_rect(rect: Rect) -> Self {
        let mut set = Self::new();
        set.add(rect);
        set
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn clear(&mut self) {
        self.rects.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = Rect> + '_ {
        self.rects.iter().copied()
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Add the parts of `rect` not already covered. Returns whether
    /// anything was added.
    pub fn add(&mut self, rect: Rect) -> bool {
        if rect.is_empty() {
            return false;
        }
        let mut pieces = vec![rect];
        for existing in &self.rects {
            if !existing.intersects(rect) {
                continue;
            }
            pieces = pieces
                .into_iter()
                .flat_map(|piece| piece.shatter(*existing))
                .collect();
            if pieces.is_empty() {
                return false;
            }
        }
        self.rects.extend(pieces);
        true
    }

    pub fn add_many(&mut self, rects: impl IntoIterator<Item = Rect>) {
        for rect in rects {
            self.add(rect);
        }
    }

    pub fn add_set(&mut self, other: &Self) {
        self.add_many(other.iter());
    }

    /// Everything in `self` that is not covered by `hammer`.
    #[must_use]
    pub fn shatter(&self, hammer: Rect) -> Self {
        if !self.intersects_rect(hammer) {
            return self.clone();
        }
        // Pieces of disjoint rects stay disjoint, no re-normalizing needed.
        Self {
            rects: self
                .rects
                .iter()
                .flat_map(|r| r.shatter(hammer))
                .collect(),
        }
    }

    #[must_use]
    pub fn shatter_set(&self, hammers: &Self) -> Self {
        let mut result = self.clone();
        for hammer in hammers.iter() {
            if result.is_empty() {
                break;
            }
            result = result.shatter(hammer);
        }
        result
    }

    #[must_use]
    pub fn intersected(&self, rect: Rect) -> Self {
        Self {
            rects: self
                .rects
                .iter()
                .map(|r| r.intersected(rect))
                .filter(|r| !r.is_empty())
                .collect(),
        }
    }

    #[must_use]
    pub fn intersected_set(&self, other: &Self) -> Self {
        let mut rects = Vec::new();
        for a in &self.rects {
            for b in &other.rects {
                let cut = a.intersected(*b);
                if !cut.is_empty() {
                    rects.push(cut);
                }
            }
        }
        Self { rects }
    }

    pub fn intersects_rect(&self, rect: Rect) -> bool {
        self.rects.iter().any(|r| r.intersects(rect))
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.rects.iter().any(|r| other.intersects_rect(*r))
    }

    pub fn contains_point(&self, point: Point) -> bool {
        self.rects.iter().any(|r| r.contains(point))
    }

    /// True when `rect` is completely covered by the set.
    pub fn contains(&self, rect: Rect) -> bool {
        if rect.is_empty() {
            return true;
        }
        let mut remaining = vec![rect];
        for existing in &self.rects {
            remaining = remaining
                .into_iter()
                .flat_map(|piece| piece.shatter(*existing))
                .collect();
            if remaining.is_empty() {
                return true;
            }
        }
        false
    }

    pub fn translate_by(&mut self, dx: i32, dy: i32) {
        for rect in &mut self.rects {
            *rect = rect.translated(dx, dy);
        }
    }

    #[must_use]
    pub fn translated(&self, dx: i32, dy: i32) -> Self {
        let mut copy = self.clone();
        copy.translate_by(dx, dy);
        copy
    }

    pub fn area(&self) -> i64 {
        self.rects.iter().map(|r| r.area()).sum()
    }

    pub fn bounding_rect(&self) -> Rect {
        self.rects
            .iter()
            .fold(Rect::default(), |acc, r| acc.united(*r))
    }
}

impl From<Rect> for DisjointRects {
    fn from(rect: Rect) -> Self {
        Self::from_rect(rect)
    }
}

impl FromIterator<Rect> for DisjointRects {
    fn from_iter<I: IntoIterator<Item = Rect>>(iter: I) -> Self {
        let mut set = Self::new();
        set.add_many(iter);
        set
    }
}

impl<'a> IntoIterator for &'a DisjointRects {
    type Item = &'a Rect;
    type IntoIter = std::slice::Iter<'a, Rect>;

    fn into_iter(self) -> Self::IntoIter {
        self.rects.iter()
    }
}
