use crate::analysis::{
    cumulative_over_time, region_event_counts, small_slice_bucketing, top_n_by_source, totals_by, Column,
    CumulativeSeries, Measure, RegionPivot, SourceCount,
};
use crate::color::{ColorMode, Legend};
use crate::config::AppConfig;
use crate::data::{year_marks, DatasetSource, EventRecord, EventTable, RegionCollection};
use crate::error::{DashboardError, Result};
use crate::map::{Choropleth, MapRenderer, MapScene, SpatialGrid, Viewport};
use crate::state::DashboardState;
use crate::ui;
use chrono::NaiveDate;
use ratatui::layout::Rect;
use std::sync::Arc;

/// Click radius for selecting an event, in braille pixels
const PICK_RADIUS_PX: f64 = 6.0;

/// Whether keys drive the dashboard or edit the actor pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    EditingPattern(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub is_error: bool,
}

/// Aggregates feeding the chart panels, rebuilt after every filter change
#[derive(Debug, Clone, Default)]
pub struct ChartData {
    pub top_sources: Vec<SourceCount>,
    pub source_order: Vec<String>,
    pub cumulative: CumulativeSeries,
    pub fatality_shares: Vec<(String, u64)>,
    pub region_pivot: RegionPivot,
    pub legend: Legend,
}

impl ChartData {
    pub fn compute(view: &EventTable, regions: &RegionCollection, config: &AppConfig) -> Self {
        let (top_sources, source_order) = top_n_by_source(view, config.charts.top_sources);
        let fatalities = totals_by(view, Column::EventType, Measure::Fatalities);
        let region_pivot = if view.is_empty() {
            RegionPivot::default()
        } else {
            region_event_counts(view, Column::Admin1, Column::EventType).with_regions(regions.names())
        };

        Self {
            top_sources,
            source_order,
            cumulative: cumulative_over_time(view, Column::EventType, Measure::Events),
            fatality_shares: small_slice_bucketing(&fatalities, config.charts.other_threshold),
            region_pivot,
            legend: Legend::from_view(view),
        }
    }
}

/// Application state
pub struct App {
    pub config: AppConfig,
    dataset_index: usize,
    pub state: DashboardState,
    pub map_renderer: MapRenderer,
    pub viewport: Viewport,
    /// Terminal area the braille map is drawn into
    pub map_rect: Rect,
    pub should_quit: bool,
    /// Last mouse position for drag tracking
    pub last_mouse: Option<(u16, u16)>,
    /// Current mouse position for cursor marker
    pub mouse_pos: Option<(u16, u16)>,
    /// Where the left button went down; a release there is a click
    press_at: Option<(u16, u16)>,
    pub color_mode: ColorMode,
    /// Index into the choropleth pivot's categories
    pub choropleth_category: usize,
    pub input: InputMode,
    pub message: Option<StatusMessage>,
    pub selected: Option<Arc<EventRecord>>,
    pub charts: ChartData,
    pub year_marks: Vec<NaiveDate>,
    index: SpatialGrid<Arc<EventRecord>>,
}

impl App {
    pub fn new(config: AppConfig, state: DashboardState, regions: RegionCollection, width: u16, height: u16) -> Self {
        let map_rect = ui::map_inner(Rect::new(0, 0, width, height));
        let viewport = initial_viewport(state.table(), map_rect);
        let year_marks = year_marks(state.table());

        let mut app = Self {
            config,
            dataset_index: 0,
            state,
            map_renderer: MapRenderer::new(regions),
            viewport,
            map_rect,
            should_quit: false,
            last_mouse: None,
            mouse_pos: None,
            press_at: None,
            color_mode: ColorMode::default(),
            choropleth_category: 0,
            input: InputMode::Normal,
            message: None,
            selected: None,
            charts: ChartData::default(),
            year_marks,
            index: SpatialGrid::new(0.5),
        };
        app.refresh();
        app
    }

    /// Rebuild everything derived from the current view
    fn refresh(&mut self) {
        let view = self.state.view();
        self.charts = ChartData::compute(view, &self.map_renderer.regions, &self.config);
        self.index = view
            .iter()
            .map(|e| (e.longitude, e.latitude, Arc::clone(e)))
            .collect();

        if let Some(selected) = &self.selected {
            if !view.iter().any(|e| e.id == selected.id) {
                self.selected = None;
            }
        }

        let categories = self.charts.region_pivot.categories.len();
        if self.choropleth_category >= categories {
            self.choropleth_category = 0;
        }
    }

    pub fn dataset(&self) -> &DatasetSource {
        &self.config.datasets[self.dataset_index]
    }

    /// Scene handed to the map renderer
    pub fn map_scene(&self) -> MapScene<'_> {
        let choropleth = (!self.charts.region_pivot.is_empty()).then_some(Choropleth {
            pivot: &self.charts.region_pivot,
            category: self.choropleth_category,
        });
        MapScene {
            view: self.state.view(),
            mode: self.color_mode,
            legend: &self.charts.legend,
            choropleth,
            selected: self.selected.as_deref(),
        }
    }

    /// Event type currently shading the choropleth
    pub fn choropleth_label(&self) -> Option<&str> {
        self.charts
            .region_pivot
            .categories
            .get(self.choropleth_category)
            .map(String::as_str)
    }

    fn info(&mut self, text: impl Into<String>) {
        self.message = Some(StatusMessage {
            text: text.into(),
            is_error: false,
        });
    }

    /// Show an error in the message line. Rejected user input logs at
    /// info, data source failures at warn.
    fn report(&mut self, err: &DashboardError, text: String) {
        if err.is_user_input() {
            log::info!("rejected input: {}", err);
        } else {
            log::warn!("{}", text);
        }
        self.message = Some(StatusMessage { text, is_error: true });
    }

    /// Update map geometry when the terminal resizes
    pub fn resize(&mut self, width: u16, height: u16) {
        self.map_rect = ui::map_inner(Rect::new(0, 0, width, height));
        self.viewport.width = self.map_rect.width as usize * 2;
        self.viewport.height = self.map_rect.height as usize * 4;
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    // --- filter controls -------------------------------------------------

    pub fn shift_start(&mut self, steps: i64) {
        self.state.shift_start(steps * self.config.charts.date_step_days);
        self.refresh();
    }

    pub fn shift_end(&mut self, steps: i64) {
        self.state.shift_end(steps * self.config.charts.date_step_days);
        self.refresh();
    }

    pub fn toggle_zero_fatalities(&mut self) {
        self.state.toggle_zero_fatalities();
        self.refresh();
        let shown = if self.state.filter().include_zero_fatalities {
            "included"
        } else {
            "hidden"
        };
        self.info(format!("zero-fatality events {}", shown));
    }

    pub fn cycle_color_mode(&mut self) {
        self.color_mode = self.color_mode.next();
    }

    pub fn cycle_choropleth_category(&mut self) {
        let n = self.charts.region_pivot.categories.len();
        if n > 0 {
            self.choropleth_category = (self.choropleth_category + 1) % n;
        }
    }

    pub fn begin_pattern_edit(&mut self) {
        let current = self
            .state
            .filter()
            .actor
            .as_ref()
            .map(|p| p.as_str().to_string())
            .unwrap_or_default();
        self.input = InputMode::EditingPattern(current);
    }

    pub fn push_pattern_char(&mut self, ch: char) {
        if let InputMode::EditingPattern(text) = &mut self.input {
            text.push(ch);
        }
    }

    pub fn pop_pattern_char(&mut self) {
        if let InputMode::EditingPattern(text) = &mut self.input {
            text.pop();
        }
    }

    pub fn cancel_pattern_edit(&mut self) {
        self.input = InputMode::Normal;
    }

    /// Apply the edited pattern. On a bad regex the editor stays open and
    /// the previous filter remains active.
    pub fn submit_pattern(&mut self) {
        let InputMode::EditingPattern(text) = &self.input else {
            return;
        };
        let text = text.clone();

        match self.state.set_actor_pattern(&text) {
            Ok(()) => {
                self.input = InputMode::Normal;
                self.refresh();
                let text = match self.state.filter().actor.as_ref() {
                    Some(p) => format!("actor filter /{}/", p.as_str()),
                    None => "actor filter cleared".to_string(),
                };
                self.info(text);
            }
            Err(e) => self.report(&e, e.to_string()),
        }
    }

    /// Load the next configured dataset. Failures are reported and the
    /// current dataset stays loaded.
    pub fn next_dataset<F>(&mut self, load: F)
    where
        F: FnOnce(&DatasetSource) -> Result<EventTable>,
    {
        if self.config.datasets.len() < 2 {
            self.info("only one dataset configured");
            return;
        }
        let next = (self.dataset_index + 1) % self.config.datasets.len();
        let source = self.config.datasets[next].clone();

        let loaded = load(&source).and_then(|table| self.state.replace_dataset(&source.name, table));
        match loaded {
            Ok(()) => {
                self.dataset_index = next;
                self.year_marks = year_marks(self.state.table());
                self.selected = None;
                self.refresh();
                self.reset_view();
                log::info!("switched to dataset `{}`", source.name);
                self.info(format!("loaded `{}` ({} events)", source.name, self.state.table().len()));
            }
            Err(e) => {
                let text = format!("could not load `{}`: {}", source.name, e);
                self.report(&e, text);
            }
        }
    }

    // --- map navigation --------------------------------------------------

    pub fn pan(&mut self, dx: i32, dy: i32) {
        self.viewport.pan(dx, dy);
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
    }

    pub fn reset_view(&mut self) {
        self.viewport = initial_viewport(self.state.table(), self.map_rect);
    }

    /// Terminal cell to braille pixel inside the map, if it is on the map
    fn to_map_pixel(&self, col: u16, row: u16) -> Option<(i32, i32)> {
        let r = self.map_rect;
        let inside = col >= r.x && col < r.x + r.width && row >= r.y && row < r.y + r.height;
        inside.then(|| (((col - r.x) as i32) * 2, ((row - r.y) as i32) * 4))
    }

    pub fn zoom_in_at(&mut self, col: u16, row: u16) {
        if let Some((px, py)) = self.to_map_pixel(col, row) {
            self.viewport.zoom_in_at(px, py);
        }
    }

    pub fn zoom_out_at(&mut self, col: u16, row: u16) {
        if let Some((px, py)) = self.to_map_pixel(col, row) {
            self.viewport.zoom_out_at(px, py);
        }
    }

    pub fn handle_drag(&mut self, x: u16, y: u16) {
        if let Some((last_x, last_y)) = self.last_mouse {
            let dx = last_x as i32 - x as i32;
            let dy = last_y as i32 - y as i32;
            self.pan(dx * 2, dy * 4);
        }
        self.last_mouse = Some((x, y));
    }

    pub fn press(&mut self, col: u16, row: u16) {
        self.last_mouse = Some((col, row));
        self.press_at = Some((col, row));
    }

    /// End a drag; releasing where the press started selects instead
    pub fn release(&mut self, col: u16, row: u16) {
        if self.press_at.take() == Some((col, row)) {
            self.select_at(col, row);
        }
        self.last_mouse = None;
    }

    pub fn set_mouse_pos(&mut self, col: u16, row: u16) {
        self.mouse_pos = Some((col, row));
    }

    /// Mouse position as a character cell relative to the map area
    pub fn mouse_map_cell(&self) -> Option<(u16, u16)> {
        let (col, row) = self.mouse_pos?;
        self.to_map_pixel(col, row)
            .map(|(px, py)| ((px / 2) as u16, (py / 4) as u16))
    }

    /// Select the event nearest to a clicked cell
    pub fn select_at(&mut self, col: u16, row: u16) {
        let Some((px, py)) = self.to_map_pixel(col, row) else {
            return;
        };
        if self.index.is_empty() {
            self.selected = None;
            return;
        }
        let (lon, lat) = self.viewport.unproject(px + 1, py + 2);
        let radius = self.viewport.pixels_to_degrees(PICK_RADIUS_PX);
        self.selected = self.index.nearest(lon, lat, radius).cloned();
    }

    pub fn zoom_level(&self) -> String {
        format!("{:.1}x", self.viewport.zoom)
    }

    pub fn center_coords(&self) -> String {
        format!(
            "{:.1}°{}, {:.1}°{}",
            self.viewport.center_lat.abs(),
            if self.viewport.center_lat >= 0.0 { "N" } else { "S" },
            self.viewport.center_lon.abs(),
            if self.viewport.center_lon >= 0.0 { "E" } else { "W" }
        )
    }
}

fn initial_viewport(table: &EventTable, map_rect: Rect) -> Viewport {
    let width = map_rect.width as usize * 2;
    let height = map_rect.height as usize * 4;
    match table.bounds() {
        Some(bounds) => Viewport::fit_bounds(bounds, width, height),
        None => Viewport::world(width, height),
    }
}
