use std::f64::consts::PI;

const MIN_ZOOM: f64 = 0.5;
const MAX_ZOOM: f64 = 400.0;
const ZOOM_STEP: f64 = 1.5;

/// Web Mercator x in [0, 1] for a longitude
fn mercator_x(lon: f64) -> f64 {
    (lon + 180.0) / 360.0
}

/// Web Mercator y in [0, 1] (north at 0) for a latitude
fn mercator_y(lat: f64) -> f64 {
    let lat_rad = lat.clamp(-85.0, 85.0).to_radians();
    (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0
}

fn inverse_mercator_y(y: f64) -> f64 {
    (PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees()
}

/// Visible map area in braille pixels
#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    /// Center longitude (-180 to 180)
    pub center_lon: f64,
    /// Center latitude (-85 to 85)
    pub center_lat: f64,
    /// Zoom level (1.0 = whole world across the canvas width)
    pub zoom: f64,
    pub width: usize,
    pub height: usize,
}

impl Viewport {
    pub fn new(center_lon: f64, center_lat: f64, zoom: f64, width: usize, height: usize) -> Self {
        Self {
            center_lon,
            center_lat,
            zoom,
            width,
            height,
        }
    }

    /// Center on a (min_lon, min_lat, max_lon, max_lat) box and zoom so it fits
    pub fn fit_bounds(bounds: (f64, f64, f64, f64), width: usize, height: usize) -> Self {
        let (x0, y0, x1, y1) = bounds;
        let span_x = (mercator_x(x1) - mercator_x(x0)).abs().max(1e-6);
        let span_y = (mercator_y(y0) - mercator_y(y1)).abs().max(1e-6);
        let w = width.max(1) as f64;
        let h = height.max(1) as f64;

        // scale = zoom * width pixels per mercator unit
        let zoom = (1.0 / span_x).min(h / (span_y * w)) * 0.9;
        let center_y = (mercator_y(y0) + mercator_y(y1)) / 2.0;

        Self::new(
            (x0 + x1) / 2.0,
            inverse_mercator_y(center_y),
            zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            width,
            height,
        )
    }

    /// Whole-world view, used when there is nothing to fit
    pub fn world(width: usize, height: usize) -> Self {
        Self::new(0.0, 20.0, 1.0, width, height)
    }

    fn scale(&self) -> f64 {
        self.zoom * self.width as f64
    }

    /// Pan the viewport by pixel delta
    pub fn pan(&mut self, dx: i32, dy: i32) {
        let scale = self.scale().max(1.0);
        let x = mercator_x(self.center_lon) + dx as f64 / scale;
        let y = (mercator_y(self.center_lat) + dy as f64 / scale).clamp(0.0, 1.0);

        self.center_lon = (x * 360.0).rem_euclid(360.0) - 180.0;
        self.center_lat = inverse_mercator_y(y).clamp(-85.0, 85.0);
    }

    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom * ZOOM_STEP).min(MAX_ZOOM);
    }

    pub fn zoom_out(&mut self) {
        self.zoom = (self.zoom / ZOOM_STEP).max(MIN_ZOOM);
    }

    pub fn zoom_in_at(&mut self, px: i32, py: i32) {
        self.zoom_at(px, py, ZOOM_STEP);
    }

    pub fn zoom_out_at(&mut self, px: i32, py: i32) {
        self.zoom_at(px, py, 1.0 / ZOOM_STEP);
    }

    /// Zoom keeping the geographic point under (px, py) in place
    fn zoom_at(&mut self, px: i32, py: i32, factor: f64) {
        let (lon, lat) = self.unproject(px, py);
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        let (new_px, new_py) = self.project(lon, lat);
        self.pan(new_px - px, new_py - py);
    }

    /// Pixel coordinates back to (lon, lat)
    pub fn unproject(&self, px: i32, py: i32) -> (f64, f64) {
        let scale = self.scale().max(1.0);
        let x = (px as f64 - self.width as f64 / 2.0) / scale + mercator_x(self.center_lon);
        let y = (py as f64 - self.height as f64 / 2.0) / scale + mercator_y(self.center_lat);
        (x * 360.0 - 180.0, inverse_mercator_y(y))
    }

    /// (lon, lat) to pixel coordinates
    pub fn project(&self, lon: f64, lat: f64) -> (i32, i32) {
        let scale = self.scale();
        let px = (mercator_x(lon) - mercator_x(self.center_lon)) * scale + self.width as f64 / 2.0;
        let py = (mercator_y(lat) - mercator_y(self.center_lat)) * scale + self.height as f64 / 2.0;
        (px as i32, py as i32)
    }

    /// Point inside the canvas plus a small margin for markers
    pub fn is_visible(&self, px: i32, py: i32) -> bool {
        px >= -10 && px < self.width as i32 + 10 && py >= -10 && py < self.height as i32 + 10
    }

    /// Rough bounding-box test for a segment
    pub fn line_might_be_visible(&self, p1: (i32, i32), p2: (i32, i32)) -> bool {
        p1.0.max(p2.0) >= 0
            && p1.0.min(p2.0) < self.width as i32
            && p1.1.max(p2.1) >= 0
            && p1.1.min(p2.1) < self.height as i32
    }

    /// Degrees of longitude covered by `pixels` at the current zoom
    pub fn pixels_to_degrees(&self, pixels: f64) -> f64 {
        pixels * 360.0 / self.scale().max(1.0)
    }
}
