use crate::analysis::{Column, DateRange, SourceCount};
use crate::app::{App, InputMode};
use crate::color::{category_color, ramp, ColorMode};
use crate::data::EventRecord;
use crate::map::MapLayers;
use chrono::NaiveDate;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph, Widget},
    Frame,
};
use std::collections::BTreeSet;

const SOURCE_LABEL_WIDTH: usize = 16;

/// Screen regions of the dashboard
struct Panes {
    header: Rect,
    map: Rect,
    sources: Rect,
    timeline: Rect,
    shares: Rect,
    footer: Rect,
}

fn panes(area: Rect) -> Panes {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Status
            Constraint::Min(6),    // Map and charts
            Constraint::Length(3), // Controls, message, selection
        ])
        .split(area);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(rows[1]);

    let charts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Percentage(40),
            Constraint::Percentage(30),
        ])
        .split(body[1]);

    Panes {
        header: rows[0],
        map: body[0],
        sources: charts[0],
        timeline: charts[1],
        shares: charts[2],
        footer: rows[2],
    }
}

fn panel(title: impl Into<String>) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            format!(" {} ", title.into()),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
}

/// Character area the braille map occupies inside a terminal of `area`
pub fn map_inner(area: Rect) -> Rect {
    Block::default().borders(Borders::ALL).inner(panes(area).map)
}

/// Render the UI
pub fn render(frame: &mut Frame, app: &App) {
    let panes = panes(frame.area());

    render_header(frame, app, panes.header);
    render_map(frame, app, panes.map);
    render_sources(frame, app, panes.sources);
    render_timeline(frame, app, panes.timeline);
    render_shares(frame, app, panes.shares);
    render_footer(frame, app, panes.footer);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let header = Line::from(vec![
        Span::styled(
            format!(" {} ", app.dataset().name),
            Style::default().fg(Color::Black).bg(Color::Cyan),
        ),
        Span::raw(" "),
        Span::styled(app.state.status_line(), Style::default().fg(Color::White)),
        Span::styled(
            format!(" · {} days", app.state.filter().range.days()),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    frame.render_widget(Paragraph::new(header), area);
}

fn render_map(frame: &mut Frame, app: &App, area: Rect) {
    let block = panel(format!("Map · {}", app.color_mode.label())).title_bottom(legend_line(app));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Braille gives 2x4 resolution per character
    let mut viewport = app.viewport.clone();
    viewport.width = inner.width as usize * 2;
    viewport.height = inner.height as usize * 4;

    let layers = app
        .map_renderer
        .render(inner.width as usize, inner.height as usize, &viewport, &app.map_scene());

    let map_widget = MapWidget {
        layers,
        cursor_pos: app.mouse_map_cell(),
    };
    frame.render_widget(map_widget, inner);
}

fn legend_line(app: &App) -> Line<'static> {
    let legend = &app.charts.legend;
    let dim = Style::default().fg(Color::DarkGray);

    let mut spans = vec![Span::raw(" ")];
    match app.color_mode {
        ColorMode::EventType | ColorMode::SubEventType => {
            for (i, name) in legend.categories(app.color_mode).iter().enumerate() {
                spans.push(Span::styled("● ", Style::default().fg(category_color(i))));
                spans.push(Span::styled(format!("{}  ", name), dim));
            }
        }
        ColorMode::Fatalities => {
            spans.push(Span::styled("0 ", dim));
            spans.extend(ramp_spans());
            spans.push(Span::styled(format!(" {} (log) ", legend.max_fatalities), dim));
        }
        ColorMode::Timeline => {
            // The ramp spans the dates actually present in the view
            let (lo, hi) = legend.time_span;
            match DateRange::from_timestamps(lo, hi) {
                Ok(span) if !app.state.view().is_empty() => {
                    spans.push(Span::styled(format!("{} ", span.start()), dim));
                    spans.extend(ramp_spans());
                    spans.push(Span::styled(format!(" {} ", span.end()), dim));
                }
                _ => spans.push(Span::styled("no events ", dim)),
            }
        }
        ColorMode::Choropleth => match app.choropleth_label() {
            Some(label) => spans.push(Span::styled(
                format!(
                    "{} × {}: {} (c: next) ",
                    Column::Admin1.name(),
                    Column::EventType.name(),
                    label
                ),
                dim,
            )),
            None => spans.push(Span::styled("no events ", dim)),
        },
    }
    if !app.map_renderer.has_regions() && app.color_mode == ColorMode::Choropleth {
        spans.push(Span::styled("(no boundaries loaded) ", Style::default().fg(Color::Yellow)));
    }
    Line::from(spans)
}

fn ramp_spans() -> Vec<Span<'static>> {
    (0..8)
        .map(|i| Span::styled("█", Style::default().fg(ramp(i as f64 / 7.0))))
        .collect()
}

/// Colored braille map with text labels and the mouse cursor overlaid
struct MapWidget {
    layers: MapLayers,
    cursor_pos: Option<(u16, u16)>,
}

impl Widget for MapWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let canvas = &self.layers.canvas;
        for row in 0..canvas.height().min(area.height as usize) {
            for col in 0..canvas.width().min(area.width as usize) {
                if let Some((ch, color)) = canvas.cell(col, row) {
                    let (x, y) = (area.x + col as u16, area.y + row as u16);
                    buf[(x, y)].set_char(ch).set_fg(color);
                }
            }
        }

        let label_style = Style::default().fg(Color::White);
        for label in &self.layers.labels {
            if label.row >= area.height || label.col >= area.width {
                continue;
            }
            let max_len = area.width.saturating_sub(label.col) as usize;
            let y = area.y + label.row;
            for (i, ch) in label.text.chars().take(max_len.min(24)).enumerate() {
                buf[(area.x + label.col + i as u16, y)].set_char(ch).set_style(label_style);
            }
        }

        if let Some((cx, cy)) = self.cursor_pos {
            if cx < area.width && cy < area.height {
                buf[(area.x + cx, area.y + cy)].set_char('╋').set_fg(Color::Red);
            }
        }
    }
}

fn render_empty(frame: &mut Frame, block: Block, area: Rect) {
    let text = Paragraph::new(Line::styled(
        "No events in the current selection",
        Style::default().fg(Color::DarkGray),
    ))
    .alignment(Alignment::Center)
    .block(block);
    frame.render_widget(text, area);
}

fn render_sources(frame: &mut Frame, app: &App, area: Rect) {
    let block = panel("Top sources");
    if app.charts.top_sources.is_empty() {
        render_empty(frame, block, area);
        return;
    }

    let bar_width = block.inner(area).width.saturating_sub(SOURCE_LABEL_WIDTH as u16 + 7) as usize;
    let lines = source_bars(&app.charts.top_sources, &app.charts.source_order, bar_width);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// One stacked bar per ranked source, segments colored by sub-event type,
/// followed by a legend line
fn source_bars(rows: &[SourceCount], order: &[String], width: usize) -> Vec<Line<'static>> {
    let subs: Vec<&str> = rows
        .iter()
        .map(|r| r.sub_event_type.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let totals: Vec<u64> = order
        .iter()
        .map(|s| rows.iter().filter(|r| &r.source == s).map(|r| r.count).sum())
        .collect();
    let max = totals.iter().copied().max().unwrap_or(0).max(1);

    let mut lines = Vec::with_capacity(order.len() + 1);
    for (source, total) in order.iter().zip(&totals) {
        let label: String = source.chars().take(SOURCE_LABEL_WIDTH).collect();
        let mut spans = vec![Span::styled(
            format!("{:<w$} ", label, w = SOURCE_LABEL_WIDTH),
            Style::default().fg(Color::White),
        )];

        // Round cumulative ends so segment widths always sum to the bar
        let mut running = 0u64;
        let mut drawn = 0usize;
        for row in rows.iter().filter(|r| &r.source == source) {
            running += row.count;
            let end = ((running as f64 / max as f64) * width as f64).round() as usize;
            let len = end.saturating_sub(drawn);
            drawn = end.max(drawn);
            let idx = subs.binary_search(&row.sub_event_type.as_str()).unwrap_or(0);
            spans.push(Span::styled("█".repeat(len), Style::default().fg(category_color(idx))));
        }
        spans.push(Span::styled(format!(" {}", total), Style::default().fg(Color::DarkGray)));
        lines.push(Line::from(spans));
    }

    let mut legend = Vec::with_capacity(subs.len() * 2);
    for (i, sub) in subs.iter().enumerate() {
        legend.push(Span::styled("■ ", Style::default().fg(category_color(i))));
        legend.push(Span::styled(format!("{}  ", sub), Style::default().fg(Color::DarkGray)));
    }
    lines.push(Line::from(legend));
    lines
}

fn render_timeline(frame: &mut Frame, app: &App, area: Rect) {
    let block = panel("Cumulative events");
    let series = &app.charts.cumulative;
    let (Some(first), Some(last)) = (series.dates.first(), series.dates.last()) else {
        render_empty(frame, block, area);
        return;
    };

    let day = |d: &NaiveDate| (*d - *first).num_days() as f64;
    let x_max = day(last).max(1.0);
    let y_max = series.max_total().max(1) as f64;

    let lines: Vec<Vec<(f64, f64)>> = (0..series.categories.len())
        .map(|c| {
            series
                .dates
                .iter()
                .zip(series.series(c))
                .map(|(d, v)| (day(d), v as f64))
                .collect()
        })
        .collect();
    // Vertical guides at the first event of each year
    let guides: Vec<[(f64, f64); 2]> = app
        .year_marks
        .iter()
        .filter(|d| *d > first && *d <= last)
        .map(|d| [(day(d), 0.0), (day(d), y_max)])
        .collect();

    let mut datasets: Vec<Dataset> = guides
        .iter()
        .map(|g| {
            Dataset::default()
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::DarkGray))
                .data(g)
        })
        .collect();
    datasets.extend(series.categories.iter().zip(&lines).enumerate().map(|(i, (name, data))| {
        Dataset::default()
            .name(name.clone())
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(category_color(i)))
            .data(data)
    }));

    let mid = *first + chrono::Duration::days((x_max / 2.0) as i64);
    let axis_style = Style::default().fg(Color::DarkGray);
    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(axis_style)
                .bounds([0.0, x_max])
                .labels(vec![first.to_string(), mid.to_string(), last.to_string()]),
        )
        .y_axis(
            Axis::default()
                .style(axis_style)
                .bounds([0.0, y_max])
                .labels(vec!["0".to_string(), format!("{}", (y_max / 2.0).round()), format!("{}", y_max)]),
        );
    frame.render_widget(chart, area);
}

fn render_shares(frame: &mut Frame, app: &App, area: Rect) {
    let block = panel("Fatalities by event type");
    let shares = &app.charts.fatality_shares;
    if shares.is_empty() {
        render_empty(frame, block, area);
        return;
    }

    let grand: u64 = shares.iter().map(|(_, v)| v).sum();
    let bar_width = block.inner(area).width.saturating_sub(34) as usize;
    let lines: Vec<Line> = shares
        .iter()
        .enumerate()
        .map(|(i, (name, value))| {
            let share = *value as f64 / grand as f64;
            let color = category_color(i);
            Line::from(vec![
                Span::styled(format!("{:<22.22} ", name), Style::default().fg(Color::White)),
                Span::styled(format!("{:>5.1}% ", share * 100.0), Style::default().fg(color)),
                Span::styled(
                    "█".repeat((share * bar_width as f64).round() as usize),
                    Style::default().fg(color),
                ),
                Span::styled(format!(" {}", value), Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn toggle_span(on: bool, on_text: &'static str, off_text: &'static str) -> Span<'static> {
    Span::styled(
        if on { on_text } else { off_text },
        Style::default().fg(if on { Color::Green } else { Color::DarkGray }),
    )
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let dim = Style::default().fg(Color::DarkGray);
    let filter = app.state.filter();
    let settings = &app.map_renderer.settings;

    let controls = match &app.input {
        InputMode::EditingPattern(text) => Line::from(vec![
            Span::styled(" actor /", Style::default().fg(Color::Yellow)),
            Span::styled(format!("{}█", text), Style::default().fg(Color::White)),
            Span::styled("/  Enter:apply Esc:cancel", dim),
        ]),
        InputMode::Normal => Line::from(vec![
            Span::styled(" actor: ", dim),
            Span::styled(
                filter
                    .actor
                    .as_ref()
                    .map(|p| format!("/{}/", p.as_str()))
                    .unwrap_or_else(|| "any".to_string()),
                Style::default().fg(Color::Yellow),
            ),
            Span::styled(" zero-fatality: ", dim),
            Span::styled(
                if filter.include_zero_fatalities { "shown" } else { "hidden" },
                Style::default().fg(if filter.include_zero_fatalities {
                    Color::Green
                } else {
                    Color::DarkGray
                }),
            ),
            Span::styled(" | ", dim),
            toggle_span(settings.show_regions, "[B]ounds ", "[b]ounds "),
            toggle_span(settings.show_labels, "[L]abels ", "[l]abels "),
            Span::styled("| ", dim),
            Span::styled(app.zoom_level(), Style::default().fg(Color::Yellow)),
            Span::styled(" ", dim),
            Span::styled(app.center_coords(), Style::default().fg(Color::Cyan)),
            Span::styled(
                " | [/]:start {/}:end /:actor z:zero m:mode c:category d:dataset hjkl:pan +/-:zoom r:reset q:quit",
                dim,
            ),
        ]),
    };

    let message = match &app.message {
        Some(m) => Line::styled(
            format!(" {}", m.text),
            Style::default().fg(if m.is_error { Color::Red } else { Color::Green }),
        ),
        None => Line::default(),
    };

    let selected = match &app.selected {
        Some(event) => selected_line(event),
        None => Line::styled(" click an event on the map for details", dim),
    };

    frame.render_widget(Paragraph::new(vec![controls, message, selected]), area);
}

fn selected_line(event: &EventRecord) -> Line<'static> {
    let dim = Style::default().fg(Color::DarkGray);
    let mut spans = vec![
        Span::styled(format!(" {} ", event.event_date), Style::default().fg(Color::Cyan)),
        Span::styled(
            format!("{} / {} ", event.event_type, event.sub_event_type),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("{}, {} ", event.admin1, event.country), dim),
        Span::styled(event.actor1.clone(), Style::default().fg(Color::Yellow)),
    ];
    if !event.actor2.is_empty() {
        spans.push(Span::styled(" vs ", dim));
        spans.push(Span::styled(event.actor2.clone(), Style::default().fg(Color::Yellow)));
    }
    spans.push(Span::styled(
        format!(" fatalities: {}", event.fatalities),
        Style::default().fg(Color::Red),
    ));
    spans.push(Span::styled(format!(" [{}] ", event.source), dim));
    if !event.notes.is_empty() {
        spans.push(Span::styled(event.notes.chars().take(160).collect::<String>(), dim));
    }
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(source: &str, sub: &str, count: u64) -> SourceCount {
        SourceCount {
            source: source.to_string(),
            sub_event_type: sub.to_string(),
            count,
        }
    }

    fn bar_len(line: &Line) -> usize {
        line.spans
            .iter()
            .filter(|s| s.content.starts_with('█'))
            .map(|s| s.content.chars().count())
            .sum()
    }

    #[test]
    fn test_map_inner_leaves_room_for_panels() {
        let area = Rect::new(0, 0, 120, 40);
        let inner = map_inner(area);
        assert_eq!(inner.x, 1);
        assert_eq!(inner.y, 2);
        assert_eq!(inner.width, 70);
        assert_eq!(inner.height, 40 - 1 - 3 - 2);
    }

    #[test]
    fn test_source_bars_scale_to_busiest() {
        let rows = vec![
            count("A", "Armed clash", 6),
            count("A", "Shelling", 4),
            count("B", "Shelling", 5),
        ];
        let order = vec!["A".to_string(), "B".to_string()];
        let lines = source_bars(&rows, &order, 20);

        assert_eq!(lines.len(), 3);
        assert_eq!(bar_len(&lines[0]), 20);
        assert_eq!(bar_len(&lines[1]), 10);
    }

    #[test]
    fn test_source_bar_segments_share_colors_by_sub_type() {
        let rows = vec![count("A", "Shelling", 1), count("B", "Shelling", 1)];
        let order = vec!["A".to_string(), "B".to_string()];
        let lines = source_bars(&rows, &order, 10);

        let color = |line: &Line| line.spans.iter().find(|s| s.content.starts_with('█')).and_then(|s| s.style.fg);
        assert_eq!(color(&lines[0]), Some(category_color(0)));
        assert_eq!(color(&lines[0]), color(&lines[1]));
    }
}
