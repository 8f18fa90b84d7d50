use crate::braille::BrailleCanvas;
use ratatui::style::Color;

/// Draw a line using Bresenham's algorithm
pub fn draw_line(canvas: &mut BrailleCanvas, from: (i32, i32), to: (i32, i32), color: Color) {
    let (mut x, mut y) = from;
    let (x1, y1) = to;
    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        canvas.set_pixel_signed(x, y, color);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Small cross, used for the selected event
pub fn draw_marker(canvas: &mut BrailleCanvas, x: i32, y: i32, size: i32, color: Color) {
    for i in -size..=size {
        canvas.set_pixel_signed(x + i, y, color);
        canvas.set_pixel_signed(x, y + i, color);
    }
}

/// Filled disk; radius 0 sets a single pixel
pub fn draw_disk(canvas: &mut BrailleCanvas, cx: i32, cy: i32, radius: i32, color: Color) {
    let r2 = radius * radius;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= r2 {
                canvas.set_pixel_signed(cx + dx, cy + dy, color);
            }
        }
    }
}

/// Scanline fill of a pixel-space polygon (even-odd rule, sampled at pixel
/// centers). With `sparse` only every other pixel is set, so outlines drawn
/// on top stay readable.
pub fn fill_polygon(canvas: &mut BrailleCanvas, points: &[(i32, i32)], color: Color, sparse: bool) {
    if points.len() < 3 {
        return;
    }
    let (width, height) = canvas.pixel_size();
    let y_min = points.iter().map(|p| p.1).min().unwrap_or(0).max(0);
    let y_max = points
        .iter()
        .map(|p| p.1)
        .max()
        .unwrap_or(0)
        .min(height as i32 - 1);

    let mut crossings: Vec<f64> = Vec::new();
    for y in y_min..=y_max {
        let yc = y as f64 + 0.5;
        crossings.clear();
        for (a, b) in points.iter().zip(points.iter().cycle().skip(1)) {
            let (ay, by) = (a.1 as f64, b.1 as f64);
            if (ay > yc) != (by > yc) {
                let t = (yc - ay) / (by - ay);
                crossings.push(a.0 as f64 + t * (b.0 - a.0) as f64);
            }
        }
        crossings.sort_by(f64::total_cmp);

        for span in crossings.chunks_exact(2) {
            let x_start = ((span[0] - 0.5).ceil() as i32).max(0);
            let x_end = ((span[1] - 0.5).floor() as i32).min(width as i32 - 1);
            for x in x_start..=x_end {
                if !sparse || (x + y) % 2 == 0 {
                    canvas.set_pixel_signed(x, y, color);
                }
            }
        }
    }
}
