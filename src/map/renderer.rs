use crate::analysis::RegionPivot;
use crate::braille::BrailleCanvas;
use crate::color::{point_style, region_shade, ColorMode, Legend};
use crate::data::{EventRecord, EventTable, RegionCollection};
use crate::map::geometry::{draw_disk, draw_line, draw_marker, fill_polygon};
use crate::map::projection::Viewport;
use ratatui::style::Color;

const OUTLINE: Color = Color::DarkGray;
const SELECTED: Color = Color::White;

/// Zoom from which choropleth counts are labelled at region centroids
const LABEL_ZOOM: f64 = 8.0;

/// Display settings for map layers
#[derive(Clone)]
pub struct DisplaySettings {
    pub show_regions: bool,
    pub show_labels: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_regions: true,
            show_labels: true,
        }
    }
}

/// Choropleth input: the pivot and which category column shades regions
pub struct Choropleth<'a> {
    pub pivot: &'a RegionPivot,
    pub category: usize,
}

/// Everything that changes with the filter state
pub struct MapScene<'a> {
    pub view: &'a EventTable,
    pub mode: ColorMode,
    pub legend: &'a Legend,
    pub choropleth: Option<Choropleth<'a>>,
    pub selected: Option<&'a EventRecord>,
}

/// A text overlay anchored at a character cell
#[derive(Debug, Clone, PartialEq)]
pub struct MapLabel {
    pub col: u16,
    pub row: u16,
    pub text: String,
}

/// Rendered map: one colored braille canvas plus text labels
pub struct MapLayers {
    pub canvas: BrailleCanvas,
    pub labels: Vec<MapLabel>,
}

/// Draws region boundaries and event markers
pub struct MapRenderer {
    pub regions: RegionCollection,
    pub settings: DisplaySettings,
}

impl MapRenderer {
    pub fn new(regions: RegionCollection) -> Self {
        Self {
            regions,
            settings: DisplaySettings::default(),
        }
    }

    pub fn has_regions(&self) -> bool {
        !self.regions.is_empty()
    }

    pub fn toggle_regions(&mut self) {
        self.settings.show_regions = !self.settings.show_regions;
    }

    pub fn toggle_labels(&mut self) {
        self.settings.show_labels = !self.settings.show_labels;
    }

    /// Render a `width` x `height` character map
    pub fn render(&self, width: usize, height: usize, viewport: &Viewport, scene: &MapScene) -> MapLayers {
        let mut canvas = BrailleCanvas::new(width, height);
        let mut labels = Vec::new();

        if scene.mode == ColorMode::Choropleth {
            if let Some(choropleth) = &scene.choropleth {
                self.shade_regions(&mut canvas, viewport, choropleth, &mut labels);
            }
        }

        if self.settings.show_regions {
            for region in self.regions.iter() {
                for ring in &region.rings {
                    draw_ring(&mut canvas, ring, viewport, OUTLINE);
                }
            }
        }

        for event in scene.view.iter() {
            let Some(style) = point_style(scene.mode, scene.legend, event) else {
                break;
            };
            let (px, py) = viewport.project(event.longitude, event.latitude);
            if viewport.is_visible(px, py) {
                draw_disk(&mut canvas, px, py, style.radius, style.color);
            }
        }

        if let Some(event) = scene.selected {
            let (px, py) = viewport.project(event.longitude, event.latitude);
            if viewport.is_visible(px, py) {
                draw_marker(&mut canvas, px, py, 3, SELECTED);
            }
        }

        MapLayers { canvas, labels }
    }

    fn shade_regions(
        &self,
        canvas: &mut BrailleCanvas,
        viewport: &Viewport,
        choropleth: &Choropleth,
        labels: &mut Vec<MapLabel>,
    ) {
        let (min, max) = choropleth
            .pivot
            .column(choropleth.category)
            .fold((u64::MAX, 0), |(lo, hi), (_, c)| (lo.min(c), hi.max(c)));

        let category = choropleth.pivot.categories.get(choropleth.category);
        for region in self.regions.iter() {
            let count = category
                .map(|c| choropleth.pivot.count(&region.name, c))
                .unwrap_or(0);
            let color = region_shade(count, min, max);

            for ring in &region.rings {
                let points: Vec<(i32, i32)> = ring.iter().map(|&(lon, lat)| viewport.project(lon, lat)).collect();
                fill_polygon(canvas, &points, color, true);
            }

            if self.settings.show_labels && viewport.zoom >= LABEL_ZOOM {
                let (px, py) = viewport.project(region.centroid.0, region.centroid.1);
                if px >= 0 && py >= 0 && viewport.is_visible(px, py) {
                    labels.push(MapLabel {
                        col: (px / 2) as u16,
                        row: (py / 4) as u16,
                        text: format!("{} {}", region.name, count),
                    });
                }
            }
        }
    }
}

/// Draw a ring with viewport culling; skips segments that wrap the map
fn draw_ring(canvas: &mut BrailleCanvas, ring: &[(f64, f64)], viewport: &Viewport, color: Color) {
    let mut prev: Option<(i32, i32)> = None;
    for &(lon, lat) in ring {
        let p = viewport.project(lon, lat);
        if let Some(q) = prev {
            let dist = ((p.0 - q.0).abs() + (p.1 - q.1).abs()) as usize;
            if dist < viewport.width.max(1) * 2 && viewport.line_might_be_visible(q, p) {
                draw_line(canvas, q, p, color);
            }
        }
        prev = Some(p);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{region_event_counts, Column};
    use crate::data::events::tests::record;

    fn square_region(name: &str) -> RegionCollection {
        RegionCollection::from_parts(vec![(
            name.to_string(),
            vec![vec![(36.0, 47.0), (39.0, 47.0), (39.0, 49.0), (36.0, 49.0), (36.0, 47.0)]],
        )])
    }

    fn lit_cells(canvas: &BrailleCanvas) -> Vec<(usize, usize, Color)> {
        let mut out = Vec::new();
        for row in 0..canvas.height() {
            for col in 0..canvas.width() {
                if let Some((_, color)) = canvas.cell(col, row) {
                    out.push((col, row, color));
                }
            }
        }
        out
    }

    #[test]
    fn test_points_drawn_in_category_color() {
        let view = EventTable::new(vec![record("A", "2023-01-01", 1)]);
        let legend = Legend::from_view(&view);
        let renderer = MapRenderer::new(RegionCollection::default());
        let viewport = Viewport::new(37.8, 48.0, 40.0, 40, 40);
        let scene = MapScene {
            view: &view,
            mode: ColorMode::EventType,
            legend: &legend,
            choropleth: None,
            selected: None,
        };

        let layers = renderer.render(20, 10, &viewport, &scene);
        let cells = lit_cells(&layers.canvas);
        assert!(!cells.is_empty());
        assert!(cells.iter().all(|(_, _, c)| *c == crate::color::category_color(0)));
    }

    #[test]
    fn test_choropleth_hides_points_and_labels_regions() {
        let view = EventTable::new(vec![record("A", "2023-01-01", 1), record("B", "2023-01-02", 0)]);
        let legend = Legend::from_view(&view);
        let pivot = region_event_counts(&view, Column::Admin1, Column::EventType);
        let renderer = MapRenderer::new(square_region("Donetsk"));
        let viewport = Viewport::fit_bounds((36.0, 47.0, 39.0, 49.0), 40, 40);
        let scene = MapScene {
            view: &view,
            mode: ColorMode::Choropleth,
            legend: &legend,
            choropleth: Some(Choropleth { pivot: &pivot, category: 0 }),
            selected: None,
        };

        let layers = renderer.render(20, 10, &viewport, &scene);
        let cells = lit_cells(&layers.canvas);
        assert!(cells.iter().any(|(_, _, c)| *c == region_shade(2, 2, 2)));
        assert_eq!(layers.labels.len(), 1);
        assert_eq!(layers.labels[0].text, "Donetsk 2");
    }

    #[test]
    fn test_empty_view_renders_outlines_only() {
        let view = EventTable::default();
        let legend = Legend::from_view(&view);
        let renderer = MapRenderer::new(square_region("Donetsk"));
        let viewport = Viewport::fit_bounds((36.0, 47.0, 39.0, 49.0), 40, 40);
        let scene = MapScene {
            view: &view,
            mode: ColorMode::Timeline,
            legend: &legend,
            choropleth: None,
            selected: None,
        };

        let layers = renderer.render(20, 10, &viewport, &scene);
        let cells = lit_cells(&layers.canvas);
        assert!(!cells.is_empty());
        assert!(cells.iter().all(|(_, _, c)| *c == OUTLINE));
        assert!(layers.labels.is_empty());
    }

    #[test]
    fn test_toggled_layers_are_skipped() {
        let view = EventTable::new(vec![record("A", "2023-01-01", 1)]);
        let legend = Legend::from_view(&view);
        let pivot = region_event_counts(&view, Column::Admin1, Column::EventType);
        let mut renderer = MapRenderer::new(square_region("Donetsk"));
        let viewport = Viewport::fit_bounds((36.0, 47.0, 39.0, 49.0), 40, 40);
        let scene = MapScene {
            view: &view,
            mode: ColorMode::Choropleth,
            legend: &legend,
            choropleth: Some(Choropleth { pivot: &pivot, category: 0 }),
            selected: None,
        };

        renderer.toggle_labels();
        assert!(renderer.render(20, 10, &viewport, &scene).labels.is_empty());

        let empty = EventTable::default();
        let outlines_only = MapScene {
            view: &empty,
            mode: ColorMode::EventType,
            legend: &legend,
            choropleth: None,
            selected: None,
        };
        renderer.toggle_regions();
        assert!(lit_cells(&renderer.render(20, 10, &viewport, &outlines_only).canvas).is_empty());

        renderer.toggle_regions();
        renderer.toggle_labels();
        assert!(renderer.settings.show_regions && renderer.settings.show_labels);
    }
}
