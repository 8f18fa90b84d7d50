use crate::data::{EventRecord, EventTable};
use ratatui::style::Color;
use std::collections::BTreeSet;

/// How events (or regions) are colored on the map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    #[default]
    EventType,
    SubEventType,
    Fatalities,
    Timeline,
    /// Regions shaded by event count; points hidden
    Choropleth,
}

impl ColorMode {
    pub const ALL: [ColorMode; 5] = [
        ColorMode::EventType,
        ColorMode::SubEventType,
        ColorMode::Fatalities,
        ColorMode::Timeline,
        ColorMode::Choropleth,
    ];

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|m| *m == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn label(self) -> &'static str {
        match self {
            ColorMode::EventType => "event type",
            ColorMode::SubEventType => "sub-event type",
            ColorMode::Fatalities => "fatalities",
            ColorMode::Timeline => "date",
            ColorMode::Choropleth => "choropleth",
        }
    }
}

/// Marker color and disk radius in braille pixels (0 = single dot)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointStyle {
    pub color: Color,
    pub radius: i32,
}

/// Qualitative palette for categories
const PALETTE: [Color; 10] = [
    Color::Rgb(99, 110, 250),
    Color::Rgb(239, 85, 59),
    Color::Rgb(0, 204, 150),
    Color::Rgb(171, 99, 250),
    Color::Rgb(255, 161, 90),
    Color::Rgb(25, 211, 243),
    Color::Rgb(255, 102, 146),
    Color::Rgb(182, 232, 128),
    Color::Rgb(255, 151, 255),
    Color::Rgb(254, 203, 82),
];

/// Sequential ramp stops (dark purple → teal → yellow)
const RAMP: [(u8, u8, u8); 3] = [(68, 1, 84), (33, 145, 140), (253, 231, 37)];

pub fn category_color(index: usize) -> Color {
    PALETTE[index % PALETTE.len()]
}

/// Sequential color for `t` in [0, 1]
pub fn ramp(t: f64) -> Color {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let scaled = t * (RAMP.len() - 1) as f64;
    let i = (scaled.floor() as usize).min(RAMP.len() - 2);
    let f = scaled - i as f64;
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * f).round() as u8;
    let (a, b) = (RAMP[i], RAMP[i + 1]);
    Color::Rgb(lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2))
}

/// Value ranges of the current view that the color modes scale against
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Legend {
    pub event_types: Vec<String>,
    pub sub_event_types: Vec<String>,
    pub time_span: (i64, i64),
    pub max_fatalities: u32,
}

impl Legend {
    pub fn from_view(view: &EventTable) -> Self {
        let mut event_types = BTreeSet::new();
        let mut sub_event_types = BTreeSet::new();
        let mut lo = i64::MAX;
        let mut hi = i64::MIN;
        let mut max_fatalities = 0;

        for e in view.iter() {
            event_types.insert(e.event_type.clone());
            sub_event_types.insert(e.sub_event_type.clone());
            lo = lo.min(e.timestamp);
            hi = hi.max(e.timestamp);
            max_fatalities = max_fatalities.max(e.fatalities);
        }

        Self {
            event_types: event_types.into_iter().collect(),
            sub_event_types: sub_event_types.into_iter().collect(),
            time_span: if view.is_empty() { (0, 0) } else { (lo, hi) },
            max_fatalities,
        }
    }

    /// Categories with a discrete color in `mode`, if it is categorical
    pub fn categories(&self, mode: ColorMode) -> &[String] {
        match mode {
            ColorMode::EventType => &self.event_types,
            ColorMode::SubEventType => &self.sub_event_types,
            _ => &[],
        }
    }

    fn category_index(list: &[String], value: &str) -> usize {
        list.binary_search_by(|c| c.as_str().cmp(value)).unwrap_or(0)
    }
}

/// Marker for `event` in `mode`; `None` when the mode draws no points
pub fn point_style(mode: ColorMode, legend: &Legend, event: &EventRecord) -> Option<PointStyle> {
    let style = match mode {
        ColorMode::EventType => PointStyle {
            color: category_color(Legend::category_index(&legend.event_types, &event.event_type)),
            radius: 1,
        },
        ColorMode::SubEventType => PointStyle {
            color: category_color(Legend::category_index(&legend.sub_event_types, &event.sub_event_type)),
            radius: 1,
        },
        ColorMode::Fatalities => {
            let max = f64::from(legend.max_fatalities.max(1));
            let t = f64::from(event.fatalities).ln_1p() / max.ln_1p();
            let radius = match event.fatalities {
                0 => 0,
                1..=9 => 1,
                10..=99 => 2,
                _ => 3,
            };
            PointStyle { color: ramp(t), radius }
        }
        ColorMode::Timeline => {
            let (lo, hi) = legend.time_span;
            let t = if hi > lo {
                (event.timestamp - lo) as f64 / (hi - lo) as f64
            } else {
                1.0
            };
            PointStyle { color: ramp(t), radius: 1 }
        }
        ColorMode::Choropleth => return None,
    };
    Some(style)
}

/// Fill color for a region holding `count` events, ramped across the
/// `min..=max` counts of all regions. Regions without events stay gray.
pub fn region_shade(count: u64, min: u64, max: u64) -> Color {
    if count == 0 || max == 0 {
        return Color::DarkGray;
    }
    if max <= min {
        return ramp(1.0);
    }
    ramp(count.saturating_sub(min) as f64 / (max - min) as f64)
}
