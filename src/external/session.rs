//! Game session handle and the screen data it produces.

use thiserror::Error;

/// Axis-aligned rectangle in screen coordinates (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a region from two corners, normalising their order.
    pub fn from_corners(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        let (left, right) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
        let (top, bottom) = if y1 <= y2 { (y1, y2) } else { (y2, y1) };
        Self::new(left, top, (right - left) as u32, (bottom - top) as u32)
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn center(&self) -> (i32, i32) {
        (
            self.x + (self.width / 2) as i32,
            self.y + (self.height / 2) as i32,
        )
    }

    pub fn intersection(&self, other: &Region) -> Option<Region> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= left || bottom <= top {
            return None;
        }
        Some(Region::from_corners(left, top, right, bottom))
    }

    /// Intersection over union, in `[0, 1]`.
    pub fn iou(&self, other: &Region) -> f32 {
        let Some(shared) = self.intersection(other) else {
            return 0.0;
        };
        let shared = shared.area() as f64;
        let union = self.area() as f64 + other.area() as f64 - shared;
        if union <= 0.0 {
            return 0.0;
        }
        (shared / union) as f32
    }
}

/// Captured pixels, packed RGB rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, SessionError> {
        let expected = width as usize * height as usize * 3;
        if pixels.len() != expected {
            return Err(SessionError::MalformedFrame {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Single-colour frame, mostly useful for stubs.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 3;
        Some([
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
        ])
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("game window is not available: {0}")]
    Unavailable(String),
    #[error("screen capture failed: {0}")]
    Capture(String),
    #[error("frame has {actual} bytes, expected {expected}")]
    MalformedFrame { expected: usize, actual: usize },
}

/// Handle to the running game window.
///
/// Implementations are shared between the round task, the monitor, and
/// composite sub-tasks, so every method takes `&self`.
pub trait GameSession: Send + Sync {
    /// Human readable identifier used in logs.
    fn title(&self) -> &str;

    /// Capture `region`, or the whole window when `None`.
    fn capture(&self, region: Option<Region>) -> Result<Frame, SessionError>;

    /// Whether the window still exists and accepts input.
    fn is_active(&self) -> bool;

    /// Release every movement/modifier key the game may still consider held.
    fn release_all_keys(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_overlapping_regions() {
        let a = Region::new(0, 0, 10, 10);
        let b = Region::new(5, 0, 10, 10);
        let iou = a.iou(&b);
        assert!((iou - 50.0 / 150.0).abs() < 1e-6);
        assert_eq!(a.iou(&Region::new(20, 20, 5, 5)), 0.0);
    }

    #[test]
    fn frame_rejects_wrong_buffer_size() {
        assert!(matches!(
            Frame::new(2, 2, vec![0; 11]),
            Err(SessionError::MalformedFrame { expected: 12, actual: 11 })
        ));
        let frame = Frame::filled(2, 1, [1, 2, 3]);
        assert_eq!(frame.pixel(1, 0), Some([1, 2, 3]));
        assert_eq!(frame.pixel(2, 0), None);
    }
}
