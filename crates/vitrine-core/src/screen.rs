//! The physical framebuffer.
//!
//! A pure state holder: size, pages, pointer position and button mask. The
//! compositor is the only writer of the pixel pages.

use tracing::debug;

use crate::bitmap::{Bitmap, BitmapError};
use crate::event::MouseButtons;
use crate::geometry::{Point, Rect, Size};

#[derive(Debug)]
pub struct Screen {
    size: Size,
    /// One page, or two when the hardware can flip.
    pages: Vec<Bitmap>,
    buffer_index: usize,
    cursor_location: Point,
    buttons: MouseButtons,
}

impl Screen {
    pub fn new(size: Size, double_buffered: bool) -> Result<Self, BitmapError> {
        let pages = Self::allocate_pages(size, double_buffered)?;
        Ok(Self {
            size,
            pages,
            buffer_index: 0,
            cursor_location: Point::new(size.width / 2, size.height / 2),
            buttons: MouseButtons::empty(),
        })
    }

    fn allocate_pages(size: Size, double_buffered: bool) -> Result<Vec<Bitmap>, BitmapError> {
        let count = if double_buffered { 2 } else { 1 };
        (0..count).map(|_| Bitmap::try_new(size)).collect()
    }

    pub const fn size(&self) -> Size {
        self.size
    }

    pub const fn width(&self) -> i32 {
        self.size.width
    }

    pub const fn height(&self) -> i32 {
        self.size.height
    }

    pub const fn rect(&self) -> Rect {
        Rect::new(0, 0, self.size.width, self.size.height)
    }

    /// Bytes per scanline.
    pub const fn pitch(&self) -> usize {
        self.size.width as usize * std::mem::size_of::<u32>()
    }

    pub fn can_set_buffer(&self) -> bool {
        self.pages.len() > 1
    }

    pub const fn buffer_index(&self) -> usize {
        self.buffer_index
    }

    /// Show page `index`. Ignored when the screen has a single page.
    pub fn set_buffer(&mut self, index: usize) {
        if index < self.pages.len() {
            self.buffer_index = index;
        }
    }

    /// The page currently being scanned out.
    pub fn front(&self) -> &Bitmap {
        &self.pages[self.buffer_index]
    }

    pub fn front_mut(&mut self) -> &mut Bitmap {
        &mut self.pages[self.buffer_index]
    }

    /// The page not being scanned out, if the screen can flip.
    pub fn back_mut(&mut self) -> Option<&mut Bitmap> {
        if !self.can_set_buffer() {
            return None;
        }
        let index = 1 - self.buffer_index;
        Some(&mut self.pages[index])
    }

    /// Both pages as (front, back) when the screen can flip.
    pub fn pages_mut(&mut self) -> Option<(&mut Bitmap, &mut Bitmap)> {
        if !self.can_set_buffer() {
            return None;
        }
        let (first, second) = self.pages.split_at_mut(1);
        if self.buffer_index == 0 {
            Some((&mut first[0], &mut second[0]))
        } else {
            Some((&mut second[0], &mut first[0]))
        }
    }

    pub fn scanline(&self, y: i32) -> &[u32] {
        self.front().scanline(y)
    }

    pub fn set_resolution(&mut self, width: i32, height: i32) -> Result<(), BitmapError> {
        let size = Size::new(width, height);
        let double_buffered = self.can_set_buffer();
        self.pages = Self::allocate_pages(size, double_buffered)?;
        self.size = size;
        self.buffer_index = 0;
        self.cursor_location = self.clamp_to_screen(self.cursor_location);
        debug!("Screen resolution set to {size}");
        Ok(())
    }

    pub const fn cursor_location(&self) -> Point {
        self.cursor_location
    }

    pub const fn buttons(&self) -> MouseButtons {
        self.buttons
    }

    pub fn set_buttons(&mut self, buttons: MouseButtons) {
        self.buttons = buttons;
    }

    /// Move the hardware pointer, clamped to the screen. Returns the new location.
    pub fn on_mouse_move(&mut self, location: Point) -> Point {
        self.cursor_location = self.clamp_to_screen(location);
        self.cursor_location
    }

    fn clamp_to_screen(&self, point: Point) -> Point {
        Point::new(
            point.x.clamp(0, (self.size.width - 1).max(0)),
            point.y.clamp(0, (self.size.height - 1).max(0)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flip_swaps_pages() {
        let mut screen = Screen::new(Size::new(8, 8), true).unwrap();
        assert!(screen.can_set_buffer());
        assert_eq!(screen.buffer_index(), 0);
        screen.set_buffer(1);
        assert_eq!(screen.buffer_index(), 1);
        let (front, back) = screen.pages_mut().unwrap();
        front.fill(crate::bitmap::Color::WHITE);
        back.fill(crate::bitmap::Color::BLACK);
        assert_eq!(screen.scanline(0)[0], crate::bitmap::Color::WHITE.0);
    }

    #[test]
    fn test_single_page_ignores_flip() {
        let mut screen = Screen::new(Size::new(8, 8), false).unwrap();
        assert!(!screen.can_set_buffer());
        screen.set_buffer(1);
        assert_eq!(screen.buffer_index(), 0);
        assert!(screen.back_mut().is_none());
    }

    #[test]
    fn test_pointer_is_clamped() {
        let mut screen = Screen::new(Size::new(100, 50), false).unwrap();
        assert_eq!(screen.on_mouse_move(Point::new(-4, 80)), Point::new(0, 49));
        screen.set_resolution(40, 40).unwrap();
        assert_eq!(screen.cursor_location(), Point::new(0, 39));
        assert_eq!(screen.pitch(), 160);
    }
}
