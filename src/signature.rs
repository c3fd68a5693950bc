//! Freehand signature capture.
//!
//! A session owns a fixed-dimension grayscale raster and a pen position.
//! Strokes are committed as they are drawn; there is no undo short of
//! `clear`. Finalizing encodes the raster as binary PGM and wraps it in the
//! submission payload for the Signature collaborator. The conformity and
//! receipt sessions are fully independent: finalizing one kind never touches
//! the other's slot.

use crate::schema::SignatureKind;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

pub const DEFAULT_WIDTH: usize = 600;
pub const DEFAULT_HEIGHT: usize = 200;

const BACKGROUND: u8 = 0xFF;
const INK: u8 = 0x20;

/// One input point in raster coordinates. Points outside the raster are
/// clamped to the border when drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Order-side context stamped onto a finalized signature.
#[derive(Debug, Clone, Copy)]
pub struct SignatureContext<'a> {
    pub order_id: &'a str,
    pub order_number: &'a str,
    pub client_name: &'a str,
    pub equipment: &'a str,
    pub procedure: &'a str,
}

/// What the Signature collaborator receives for one finalized session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturePayload {
    pub order_id: String,
    pub order_number: String,
    pub client_name: String,
    pub equipment: String,
    pub procedure: String,
    pub kind: SignatureKind,
    /// Base64 of the binary PGM raster.
    pub image_pgm_base64: String,
    /// Unix seconds at finalize time.
    pub captured_at: u64,
}

/// In-progress capture surface for a single evidence kind.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
    pen: Option<(usize, usize)>,
}

impl CaptureSession {
    pub fn new(width: usize, height: usize) -> CaptureSession {
        CaptureSession {
            width: width.max(1),
            height: height.max(1),
            pixels: vec![BACKGROUND; width.max(1) * height.max(1)],
            pen: None,
        }
    }

    /// Reset the pen origin to `point` without drawing.
    pub fn begin_stroke(&mut self, point: Point) {
        self.pen = Some(self.clamp(point));
    }

    /// Draw a committed segment from the last pen position to `point`. With
    /// no prior position this behaves like `begin_stroke`.
    pub fn extend_stroke(&mut self, point: Point) {
        let to = self.clamp(point);
        match self.pen {
            Some(from) => self.draw_segment(from, to),
            None => self.plot(to.0, to.1),
        }
        self.pen = Some(to);
    }

    /// Erase the whole raster and lift the pen.
    pub fn clear(&mut self) {
        self.pixels.fill(BACKGROUND);
        self.pen = None;
    }

    /// True when nothing has been drawn since creation or the last clear.
    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|px| *px == BACKGROUND)
    }

    /// Serialize the raster and wrap it for submission. A blank session
    /// still produces a well-formed raster of the fixed dimensions.
    pub fn finalize(
        &self,
        kind: SignatureKind,
        context: &SignatureContext<'_>,
        captured_at: u64,
    ) -> SignaturePayload {
        SignaturePayload {
            order_id: context.order_id.to_string(),
            order_number: context.order_number.to_string(),
            client_name: context.client_name.to_string(),
            equipment: context.equipment.to_string(),
            procedure: context.procedure.to_string(),
            kind,
            image_pgm_base64: BASE64.encode(self.encode_pgm()),
            captured_at,
        }
    }

    /// Binary PGM (P5), one byte per pixel, row-major.
    pub fn encode_pgm(&self) -> Vec<u8> {
        let header = format!("P5\n{} {}\n255\n", self.width, self.height);
        let mut out = Vec::with_capacity(header.len() + self.pixels.len());
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(&self.pixels);
        out
    }

    fn clamp(&self, point: Point) -> (usize, usize) {
        let x = point.x.clamp(0, (self.width - 1) as i32) as usize;
        let y = point.y.clamp(0, (self.height - 1) as i32) as usize;
        (x, y)
    }

    fn plot(&mut self, x: usize, y: usize) {
        self.pixels[y * self.width + x] = INK;
    }

    // Bresenham over the clamped endpoints.
    fn draw_segment(&mut self, from: (usize, usize), to: (usize, usize)) {
        let (mut x0, mut y0) = (from.0 as i64, from.1 as i64);
        let (x1, y1) = (to.0 as i64, to.1 as i64);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.plot(x0 as usize, y0 as usize);
            if x0 == x1 && y0 == y1 {
                return;
            }
            let doubled = 2 * err;
            if doubled >= dy {
                err += dy;
                x0 += sx;
            }
            if doubled <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }
}

/// Replay a strokes file (a list of polylines) into a session. An empty
/// polyline is the restart marker capture widgets emit: it erases everything
/// drawn so far and lifts the pen.
pub fn replay_strokes(session: &mut CaptureSession, strokes: &[Vec<Point>]) {
    for stroke in strokes {
        let mut points = stroke.iter();
        match points.next() {
            None => session.clear(),
            Some(first) => {
                session.begin_stroke(*first);
                for point in points {
                    session.extend_stroke(*point);
                }
            }
        }
    }
}
