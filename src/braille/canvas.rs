use ratatui::style::Color;

/// Dot bit for pixel (x % 2, y % 4) within a braille cell.
/// Unicode orders dots column-major for rows 0-2, then the bottom row.
const DOT_BITS: [[u8; 4]; 2] = [[0x01, 0x02, 0x04, 0x40], [0x08, 0x10, 0x20, 0x80]];

const BLANK: u32 = 0x2800;

/// Braille canvas where each character cell holds a 2x4 dot grid and one
/// foreground color. The last color written to a cell wins.
pub struct BrailleCanvas {
    width: usize,
    height: usize,
    dots: Vec<u8>,
    colors: Vec<Color>,
}

impl BrailleCanvas {
    /// Canvas of `width` x `height` characters (`2*width` x `4*height` pixels)
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            dots: vec![0; width * height],
            colors: vec![Color::Reset; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Size in pixels
    pub fn pixel_size(&self) -> (usize, usize) {
        (self.width * 2, self.height * 4)
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, color: Color) {
        let (cx, cy) = (x / 2, y / 4);
        if cx >= self.width || cy >= self.height {
            return;
        }
        let idx = cy * self.width + cx;
        self.dots[idx] |= DOT_BITS[x % 2][y % 4];
        self.colors[idx] = color;
    }

    /// Signed variant for projected coordinates; negatives are clipped
    pub fn set_pixel_signed(&mut self, x: i32, y: i32, color: Color) {
        if x >= 0 && y >= 0 {
            self.set_pixel(x as usize, y as usize, color);
        }
    }

    /// Glyph and color of a character cell, `None` if no dot is set
    pub fn cell(&self, col: usize, row: usize) -> Option<(char, Color)> {
        if col >= self.width || row >= self.height {
            return None;
        }
        let idx = row * self.width + col;
        let bits = self.dots[idx];
        if bits == 0 {
            return None;
        }
        let ch = char::from_u32(BLANK + bits as u32)?;
        Some((ch, self.colors[idx]))
    }

    /// Rows as plain strings, ignoring color
    #[cfg(test)]
    pub fn to_string(&self) -> String {
        self.dots
            .chunks(self.width.max(1))
            .map(|row| {
                row.iter()
                    .map(|&b| char::from_u32(BLANK + b as u32).unwrap_or(' '))
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_pixel() {
        let mut canvas = BrailleCanvas::new(1, 1);
        canvas.set_pixel(0, 0, Color::Red);
        assert_eq!(canvas.to_string(), "⠁");
        assert_eq!(canvas.cell(0, 0), Some(('⠁', Color::Red)));
    }

    #[test]
    fn test_all_dots() {
        let mut canvas = BrailleCanvas::new(1, 1);
        for x in 0..2 {
            for y in 0..4 {
                canvas.set_pixel(x, y, Color::White);
            }
        }
        assert_eq!(canvas.to_string(), "⣿");
    }

    #[test]
    fn test_last_color_wins_and_clipping() {
        let mut canvas = BrailleCanvas::new(2, 1);
        canvas.set_pixel(0, 0, Color::Red);
        canvas.set_pixel(1, 1, Color::Blue);
        canvas.set_pixel(9, 0, Color::Green);
        canvas.set_pixel_signed(-1, 0, Color::Green);

        assert_eq!(canvas.cell(0, 0), Some(('⠑', Color::Blue)));
        assert_eq!(canvas.cell(1, 0), None);
        assert_eq!(canvas.cell(5, 5), None);
        assert_eq!(canvas.pixel_size(), (4, 4));
    }
}
