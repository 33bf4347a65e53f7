//! Per-frame rasterization into an indexed-palette image, plus the
//! parallel worker pool that renders every frame and an in-order
//! collector that reassembles the sequence.

use std::sync::mpsc;
use std::thread;

use analysis::frames::{PlaybackFrame, UnitClass};
use decoder::CancellationToken;
use image::RgbImage;

use crate::collaborators::PalettedFrame;

/// Background glyph color, a fixed "dark" palette index.
pub const DARK_INDEX: u8 = 0x55;

const MAX_COORD: f32 = 131_072.0;

/// A simple, deterministic 256-entry RGB palette. The game's real
/// palette is itself an external collaborator asset; this is a concrete
/// stand-in so the CLI produces a real animation end to end. Index 0 is
/// transparent black.
pub fn default_palette() -> [[u8; 3]; 256] {
    let mut palette = [[0u8; 3]; 256];
    for (i, entry) in palette.iter_mut().enumerate().skip(1) {
        let hue = (i as f32 / 255.0) * 360.0;
        *entry = hsv_to_rgb(hue, 0.65, 0.85);
    }
    palette[DARK_INDEX as usize] = [40, 40, 40];
    palette
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [u8; 3] {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;
    let (r, g, b) = match h as u32 {
        0..=59 => (c, x, 0.0),
        60..=119 => (x, c, 0.0),
        120..=179 => (0.0, c, x),
        180..=239 => (0.0, x, c),
        240..=299 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    [
        (((r + m) * 255.0) as u8),
        (((g + m) * 255.0) as u8),
        (((b + m) * 255.0) as u8),
    ]
}

struct Canvas {
    width: u32,
    height: u32,
    indices: Vec<u8>,
}

impl Canvas {
    fn new(width: u32, height: u32) -> Self {
        Canvas {
            width,
            height,
            indices: vec![0u8; (width * height) as usize],
        }
    }

    fn set(&mut self, x: i32, y: i32, index: u8) {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return;
        }
        self.indices[(y as u32 * self.width + x as u32) as usize] = index;
    }

    fn fill_square(&mut self, cx: f32, cy: f32, half_extent: f32, index: u8) {
        let (x0, x1) = (cx - half_extent, cx + half_extent);
        let (y0, y1) = (cy - half_extent, cy + half_extent);
        for y in y0.floor() as i32..=y1.ceil() as i32 {
            for x in x0.floor() as i32..=x1.ceil() as i32 {
                self.set(x, y, index);
            }
        }
    }

    fn fill_rounded_square(&mut self, cx: f32, cy: f32, half_extent: f32, corner_radius: f32, index: u8) {
        let inner = half_extent - corner_radius;
        let (x0, x1) = (cx - half_extent, cx + half_extent);
        let (y0, y1) = (cy - half_extent, cy + half_extent);
        for y in y0.floor() as i32..=y1.ceil() as i32 {
            for x in x0.floor() as i32..=x1.ceil() as i32 {
                let dx = (x as f32 - cx).abs();
                let dy = (y as f32 - cy).abs();
                if dx > half_extent || dy > half_extent {
                    continue;
                }
                let inside = if dx <= inner || dy <= inner {
                    true
                } else {
                    let cdx = dx - inner;
                    let cdy = dy - inner;
                    cdx * cdx + cdy * cdy <= corner_radius * corner_radius
                };
                if inside {
                    self.set(x, y, index);
                }
            }
        }
    }

    fn fill_disc(&mut self, cx: f32, cy: f32, radius: f32, index: u8) {
        for y in (cy - radius).floor() as i32..=(cy + radius).ceil() as i32 {
            for x in (cx - radius).floor() as i32..=(cx + radius).ceil() as i32 {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                if dx * dx + dy * dy <= radius * radius {
                    self.set(x, y, index);
                }
            }
        }
    }

    /// Fills a regular `sides`-gon, circumradius `radius`, point-up.
    fn fill_regular_polygon(&mut self, cx: f32, cy: f32, radius: f32, sides: u32, index: u8) {
        let verts: Vec<(f32, f32)> = (0..sides)
            .map(|i| {
                let angle = std::f32::consts::FRAC_PI_2
                    + (i as f32) * std::f32::consts::TAU / sides as f32;
                (cx + radius * angle.cos(), cy - radius * angle.sin())
            })
            .collect();

        for y in (cy - radius).floor() as i32..=(cy + radius).ceil() as i32 {
            for x in (cx - radius).floor() as i32..=(cx + radius).ceil() as i32 {
                if point_in_polygon(x as f32 + 0.5, y as f32 + 0.5, &verts) {
                    self.set(x, y, index);
                }
            }
        }
    }
}

fn point_in_polygon(px: f32, py: f32, verts: &[(f32, f32)]) -> bool {
    let mut inside = false;
    let n = verts.len();
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = verts[i];
        let (xj, yj) = verts[j];
        if (yi > py) != (yj > py) {
            let x_intersect = xj + (py - yj) / (yi - yj) * (xi - xj);
            if px < x_intersect {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn draw_unit(canvas: &mut Canvas, cx: f32, cy: f32, class: UnitClass, color_index: u8) {
    match class {
        UnitClass::Building => {
            canvas.fill_square(cx, cy, 4.0, DARK_INDEX);
            canvas.fill_square(cx, cy, 3.0, color_index);
        }
        UnitClass::Mobile => {
            canvas.fill_disc(cx, cy, 3.8, DARK_INDEX);
            canvas.fill_disc(cx, cy, 3.0, color_index);
        }
        UnitClass::Factory => {
            canvas.fill_rounded_square(cx, cy, 6.0, 2.0, DARK_INDEX);
            canvas.fill_rounded_square(cx, cy, 5.0, 2.0, color_index);
        }
        UnitClass::Commander => {
            canvas.fill_regular_polygon(cx, cy, 5.0, 5, DARK_INDEX);
            canvas.fill_regular_polygon(cx, cy, 4.0, 5, color_index);
        }
        UnitClass::Air => {
            canvas.fill_regular_polygon(cx, cy, 5.0, 3, DARK_INDEX);
            canvas.fill_regular_polygon(cx, cy, 4.0, 3, color_index);
        }
    }
}

/// Draws one frame into a paletted image. `scale` is
/// `max(map_w, map_h) / max(target_w, target_h)`.
pub fn render_frame(
    frame: &PlaybackFrame,
    background: &RgbImage,
    target_w: u32,
    target_h: u32,
    color_map: &std::collections::HashMap<u8, u8>,
) -> PalettedFrame {
    let scale = (background.width().max(background.height())) as f32
        / (target_w.max(target_h)) as f32;
    let mut canvas = Canvas::new(target_w, target_h);

    let mut units: Vec<_> = frame.units.values().filter(|u| u.finished).collect();
    units.sort_by_key(|u| u.stable_id);

    for unit in units {
        if unit.pos.x < 0.0
            || unit.pos.x > MAX_COORD
            || unit.pos.y < 0.0
            || unit.pos.y > MAX_COORD
        {
            continue;
        }
        let cx = unit.pos.x / scale;
        let cy = unit.pos.y / scale;
        let color_index = color_map.get(&unit.owner).copied().unwrap_or(DARK_INDEX);
        draw_unit(&mut canvas, cx, cy, unit.class, color_index);
    }

    PalettedFrame {
        width: target_w,
        height: target_h,
        indices: canvas.indices,
    }
}

/// Renders every frame using a worker pool sized to the available
/// parallelism, collecting results back into frame-number order.
pub fn render_all(
    frames: &[PlaybackFrame],
    background: &RgbImage,
    target_w: u32,
    target_h: u32,
    color_map: std::collections::HashMap<u8, u8>,
    cancel: CancellationToken,
) -> Vec<PalettedFrame> {
    let worker_count = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(frames.len().max(1));

    let (work_tx, work_rx) = mpsc::channel::<(usize, &PlaybackFrame)>();
    for (i, frame) in frames.iter().enumerate() {
        work_tx.send((i, frame)).expect("work channel open");
    }
    drop(work_tx);

    let work_rx = std::sync::Mutex::new(work_rx);
    let (result_tx, result_rx) = mpsc::channel::<(usize, PalettedFrame)>();

    thread::scope(|scope| {
        for _ in 0..worker_count {
            let result_tx = result_tx.clone();
            let color_map = &color_map;
            let cancel = cancel.clone();
            let work_rx = &work_rx;
            scope.spawn(move || {
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let next = work_rx.lock().expect("work channel lock").recv();
                    let Ok((index, frame)) = next else { break };
                    let rendered = render_frame(frame, background, target_w, target_h, color_map);
                    if result_tx.send((index, rendered)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        let mut collected: Vec<Option<PalettedFrame>> = (0..frames.len()).map(|_| None).collect();
        let mut remaining = frames.len();
        while remaining > 0 {
            match result_rx.recv() {
                Ok((index, frame)) => {
                    collected[index] = Some(frame);
                    remaining -= 1;
                }
                Err(_) => break,
            }
        }
        collected.into_iter().flatten().collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_index_zero_is_reserved() {
        let palette = default_palette();
        assert_eq!(palette[0], [0, 0, 0]);
    }

    #[test]
    fn point_in_polygon_detects_triangle_center() {
        let verts = vec![(0.0, -5.0), (-4.33, 2.5), (4.33, 2.5)];
        assert!(point_in_polygon(0.0, 0.0, &verts));
        assert!(!point_in_polygon(100.0, 100.0, &verts));
    }

    #[test]
    fn fill_square_sets_expected_region() {
        let mut canvas = Canvas::new(10, 10);
        canvas.fill_square(5.0, 5.0, 2.0, 9);
        assert_eq!(canvas.indices[5 * 10 + 5], 9);
        assert_eq!(canvas.indices[0], 0);
    }
}
