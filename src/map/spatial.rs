use std::collections::HashMap;

/// Spatial hash over (lon, lat) points for nearest-item lookups
pub struct SpatialGrid<T> {
    /// Item indices per (cell_x, cell_y)
    cells: HashMap<(i32, i32), Vec<usize>>,
    items: Vec<(f64, f64, T)>,
    /// Cell size in degrees
    cell_size: f64,
}

impl<T> SpatialGrid<T> {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cells: HashMap::new(),
            items: Vec::new(),
            cell_size,
        }
    }

    #[inline(always)]
    fn to_cell(&self, lon: f64, lat: f64) -> (i32, i32) {
        (
            (lon / self.cell_size).floor() as i32,
            (lat / self.cell_size).floor() as i32,
        )
    }

    pub fn insert(&mut self, lon: f64, lat: f64, item: T) {
        let idx = self.items.len();
        self.items.push((lon, lat, item));
        let cell = self.to_cell(lon, lat);
        self.cells.entry(cell).or_default().push(idx);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Closest item within `radius` degrees (planar distance), if any.
    /// Ties go to the item inserted first.
    pub fn nearest(&self, lon: f64, lat: f64, radius: f64) -> Option<&T> {
        let (cx, cy) = self.to_cell(lon, lat);
        let reach = (radius / self.cell_size).ceil() as i32;
        let r2 = radius * radius;

        let mut best: Option<(f64, usize)> = None;
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let Some(indices) = self.cells.get(&(cx + dx, cy + dy)) else {
                    continue;
                };
                for &idx in indices {
                    let (x, y, _) = &self.items[idx];
                    let d2 = (x - lon).powi(2) + (y - lat).powi(2);
                    if d2 > r2 {
                        continue;
                    }
                    let better = match best {
                        None => true,
                        Some((bd, bi)) => d2 < bd || (d2 == bd && idx < bi),
                    };
                    if better {
                        best = Some((d2, idx));
                    }
                }
            }
        }

        best.map(|(_, idx)| &self.items[idx].2)
    }
}

impl<T> FromIterator<(f64, f64, T)> for SpatialGrid<T> {
    /// Builds a grid with half-degree cells
    fn from_iter<I: IntoIterator<Item = (f64, f64, T)>>(iter: I) -> Self {
        let mut grid = SpatialGrid::new(0.5);
        for (lon, lat, item) in iter {
            grid.insert(lon, lat, item);
        }
        grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_within_radius() {
        let mut grid = SpatialGrid::new(1.0);
        grid.insert(30.0, 50.0, "kyiv");
        grid.insert(36.2, 49.9, "kharkiv");
        grid.insert(30.2, 50.1, "brovary");

        assert_eq!(grid.nearest(30.05, 50.0, 0.5), Some(&"kyiv"));
        assert_eq!(grid.nearest(36.0, 50.0, 0.5), Some(&"kharkiv"));
        assert_eq!(grid.nearest(33.0, 50.0, 0.5), None);
        assert!(!grid.is_empty());
    }

    #[test]
    fn test_nearest_crosses_cell_edges() {
        let grid: SpatialGrid<u32> = [(0.99, 0.99, 1), (1.6, 1.6, 2)].into_iter().collect();
        assert_eq!(grid.nearest(1.01, 1.01, 0.1), Some(&1));
    }

    #[test]
    fn test_tie_prefers_first_inserted() {
        let grid: SpatialGrid<&str> = [(1.0, 1.0, "first"), (1.0, 1.0, "second")].into_iter().collect();
        assert_eq!(grid.nearest(1.0, 1.0, 0.1), Some(&"first"));
        assert!(SpatialGrid::<u8>::new(1.0).nearest(0.0, 0.0, 1.0).is_none());
    }
}
