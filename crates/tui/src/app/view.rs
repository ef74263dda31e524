use std::cmp;

use crystalball_core::{
    billing::Plan,
    models::{ForecastPoint, ForecastStats},
    prediction::Forecast,
    PreviewTable,
};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        Axis, Block, BorderType, Borders, Cell, Chart, Clear, Dataset, GraphType, Paragraph, Row,
        Table, Tabs, Wrap,
    },
    Frame,
};

use super::{initials, CrystalBallApp, LoginField, Screen, Theme};
use crate::orb::{weather_glyph, Orb, OrbPalette, OrbReading};

struct Tier {
    title: &'static str,
    price: &'static str,
    description: &'static str,
    popular: bool,
    cta: &'static str,
    features: &'static [(&'static str, bool)],
}

const TIERS: [Tier; 3] = [
    Tier {
        title: "Free",
        price: "€0",
        description: "Best for starting out and testing the waters.",
        popular: false,
        cta: "Sign up",
        features: &[
            ("1 upload / month", true),
            ("7-day forecast", true),
            ("Smart Insights", false),
            ("Email digest", false),
            ("Export data", false),
        ],
    },
    Tier {
        title: "Pro",
        price: "€19",
        description: "Most popular for growing restaurants.",
        popular: true,
        cta: "Start",
        features: &[
            ("Unlimited uploads", true),
            ("Confidence insights", true),
            ("Email digest", true),
            ("Export data", true),
            ("Priority support", false),
        ],
    },
    Tier {
        title: "Enterprise",
        price: "Custom",
        description: "Full power for restaurant chains.",
        popular: false,
        cta: "Contact",
        features: &[
            ("All Pro features", true),
            ("Multi-location", true),
            ("Priority support", true),
            ("API Access", true),
            ("Custom integration", true),
        ],
    },
];

const DATA_RETENTION: &str = "12 months";

pub(super) fn trend_label(stats: Option<&ForecastStats>) -> String {
    match stats {
        Some(stats) if stats.trend_per_day != 0.0 => format!("{:+.1} / day", stats.trend_per_day),
        _ => "Analyzing...".to_string(),
    }
}

pub(super) fn confidence_label(point: Option<&ForecastPoint>) -> String {
    match point {
        Some(point) => format!("{:.0}%", point.confidence),
        None => "--".to_string(),
    }
}

pub(super) fn seasonality_label(stats: Option<&ForecastStats>) -> &'static str {
    match stats {
        Some(stats) if stats.seasonality_detected => "Pattern Locked",
        _ => "Searching...",
    }
}

/// Upper bound for the covers axis, rounded up to a multiple of ten.
pub(super) fn covers_ceiling(series: &[ForecastPoint]) -> f64 {
    let peak = series
        .iter()
        .flat_map(|point| std::iter::once(point.predicted_covers).chain(point.actual))
        .fold(0.0_f64, f64::max);
    ((peak * 1.2) / 10.0).ceil().max(1.0) * 10.0
}

fn panel<'a>(title: impl Into<Line<'a>>, theme: &Theme) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.muted))
        .title(title)
}

impl CrystalBallApp {
    pub(super) fn draw(&mut self, frame: &mut Frame) {
        let area = frame.size();
        let with_header = !matches!(
            self.screen,
            Screen::Landing | Screen::Login | Screen::NotFound
        );
        let mut constraints = Vec::new();
        if with_header {
            constraints.push(Constraint::Length(3));
        }
        constraints.push(Constraint::Min(8));
        constraints.push(Constraint::Length(4));
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        let mut chunk_iter = chunks.iter().copied();
        if with_header {
            if let Some(header) = chunk_iter.next() {
                self.render_header(frame, header);
            }
        }
        let body = chunk_iter.next().unwrap_or(area);
        let status = chunk_iter.next().unwrap_or(area);

        match self.screen {
            Screen::Landing => self.draw_landing(frame, body),
            Screen::Dashboard => self.draw_dashboard(frame, body),
            Screen::Pricing => self.draw_pricing(frame, body),
            Screen::Settings => self.draw_settings(frame, body),
            Screen::Upload => self.draw_upload(frame, body),
            Screen::Login => self.draw_login(frame, body),
            Screen::NotFound => self.draw_not_found(frame, body),
        }
        self.render_status(frame, status);

        if self.goto.is_some() {
            self.render_goto_prompt(frame);
        }
    }

    fn orb_palette(&self) -> OrbPalette {
        OrbPalette {
            glow: self.theme.accent,
            rainy_glow: self.theme.rain,
            outer_ring: self.theme.accent,
            inner_ring: self.theme.accent_alt,
            text: self.theme.primary_fg,
            muted: self.theme.muted,
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(20), Constraint::Length(28)])
            .split(area);

        let titles: Vec<Line> = Screen::NAV
            .iter()
            .enumerate()
            .map(|(idx, screen)| Line::from(format!("{} {}", idx + 1, screen.title())))
            .collect();
        let highlight = match self.screen.nav_index() {
            Some(_) => Style::default()
                .fg(self.theme.accent)
                .add_modifier(Modifier::BOLD),
            // Off-nav screens leave every tab unlit.
            None => Style::default().fg(self.theme.muted),
        };
        let tabs = Tabs::new(titles)
            .block(panel(
                Span::styled(
                    " CRYSTAL BALL ",
                    Style::default()
                        .fg(self.theme.accent)
                        .add_modifier(Modifier::BOLD),
                ),
                &self.theme,
            ))
            .style(Style::default().fg(self.theme.muted))
            .highlight_style(highlight)
            .select(self.screen.nav_index().unwrap_or_default());
        frame.render_widget(tabs, columns[0]);

        let identity = self.session.current().identity;
        let (name, restaurant) = match &identity {
            Some(identity) => (
                identity.display_name.clone(),
                identity
                    .restaurant_name
                    .clone()
                    .unwrap_or_else(|| "Il tuo ristorante".to_string()),
            ),
            None => ("Guest".to_string(), "Il tuo ristorante".to_string()),
        };
        let badge = Line::from(vec![
            Span::styled(
                format!(" {} ", initials(&name)),
                Style::default()
                    .fg(self.theme.on_accent)
                    .bg(self.theme.accent_alt)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            Span::styled(restaurant, Style::default().fg(self.theme.primary_fg)),
        ]);
        let user = Paragraph::new(badge)
            .block(panel("", &self.theme))
            .alignment(Alignment::Right);
        frame.render_widget(user, columns[1]);
    }

    fn draw_landing(&self, frame: &mut Frame, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(area);

        let accent = Style::default().fg(self.theme.accent);
        let lines = vec![
            Line::from(""),
            Line::from(Span::styled(
                "Predici il futuro",
                Style::default()
                    .fg(self.theme.primary_fg)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "dei tuoi tavoli",
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Analizza gli ultimi 12 mesi della tua cassa,"),
            Line::from("scopri i pattern nascosti, pianifica con certezza."),
            Line::from("La bolla di cristallo per ristoranti gourmet."),
            Line::from(""),
            Line::from(vec![
                Span::styled(
                    " Inizia gratis per 30 giorni ",
                    Style::default()
                        .fg(self.theme.on_accent)
                        .bg(self.theme.accent)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled("  ⏎ Enter", accent),
            ]),
        ];
        let hero = Paragraph::new(lines)
            .block(Block::default().borders(Borders::NONE))
            .wrap(Wrap { trim: false });
        let hero_area = centered_rect(columns[0].width.saturating_sub(4), 12, columns[0]);
        frame.render_widget(hero, hero_area);

        let side = cmp::min(columns[1].width, columns[1].height.saturating_mul(2));
        let orb_area = centered_rect(side, side / 2, columns[1]);
        frame.render_widget(
            Orb::new(OrbReading::default(), self.state.tick, self.orb_palette()),
            orb_area,
        );
    }

    fn draw_dashboard(&self, frame: &mut Frame, area: Rect) {
        let forecast = self.predictions.forecast();
        let stats = forecast.as_ref().map(|forecast| &forecast.stats);
        let next = forecast
            .as_ref()
            .and_then(|forecast| forecast.series.first());

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(8)])
            .split(area);

        let cards = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
            ])
            .split(rows[0]);
        self.render_stat_card(frame, cards[0], "TREND DETECTED", trend_label(stats), self.theme.accent);
        self.render_stat_card(
            frame,
            cards[1],
            "CYCLE CONFIDENCE",
            confidence_label(next),
            self.theme.highlight,
        );
        self.render_stat_card(
            frame,
            cards[2],
            "SEASONALITY",
            seasonality_label(stats).to_string(),
            self.theme.primary_fg,
        );

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(34), Constraint::Percentage(66)])
            .split(rows[1]);

        let orb_block = panel(" Crystal Ball ", &self.theme);
        let orb_inner = orb_block.inner(body[0]);
        frame.render_widget(orb_block, body[0]);
        let reading = OrbReading {
            covers: next.map(|point| point.predicted_covers),
            weather: next.and_then(|point| point.weather),
        };
        frame.render_widget(Orb::new(reading, self.state.tick, self.orb_palette()), orb_inner);

        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(8), Constraint::Length(10)])
            .split(body[1]);
        match &forecast {
            Some(forecast) if !forecast.series.is_empty() => {
                self.render_forecast_chart(frame, right[0], forecast);
                self.render_forecast_table(frame, right[1], forecast);
            }
            _ => {
                let message = if self.predictions.is_loading() {
                    "Consulting the crystal ball..."
                } else {
                    "No forecast yet. Press r to refresh or u to upload history."
                };
                let waiting = Paragraph::new(message)
                    .style(Style::default().fg(self.theme.muted))
                    .alignment(Alignment::Center)
                    .block(panel(" 7-Day Forecast Horizon ", &self.theme));
                frame.render_widget(waiting, body[1]);
            }
        }
    }

    fn render_stat_card(
        &self,
        frame: &mut Frame,
        area: Rect,
        title: &str,
        value: String,
        color: Color,
    ) {
        let lines = vec![
            Line::from(Span::styled(title.to_string(), Style::default().fg(self.theme.muted))),
            Line::from(Span::styled(
                value,
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )),
        ];
        let card = Paragraph::new(lines).block(panel("", &self.theme));
        frame.render_widget(card, area);
    }

    fn render_forecast_chart(&self, frame: &mut Frame, area: Rect, forecast: &Forecast) {
        let series = &forecast.series;
        let predicted: Vec<(f64, f64)> = series
            .iter()
            .enumerate()
            .map(|(idx, point)| (idx as f64, point.predicted_covers))
            .collect();
        let actual: Vec<(f64, f64)> = series
            .iter()
            .enumerate()
            .filter_map(|(idx, point)| point.actual.map(|covers| (idx as f64, covers)))
            .collect();

        let x_max = (series.len().saturating_sub(1)).max(1) as f64;
        let y_max = covers_ceiling(series);
        let date_label = |point: Option<&ForecastPoint>| {
            Span::raw(
                point
                    .map(|point| point.date.format("%d %b").to_string())
                    .unwrap_or_default(),
            )
        };
        let x_labels = vec![
            date_label(series.first()),
            date_label(series.get(series.len() / 2)),
            date_label(series.last()),
        ];

        let datasets = vec![
            Dataset::default()
                .name("Predicted")
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(self.theme.accent))
                .data(&predicted),
            Dataset::default()
                .name("Actual")
                .marker(Marker::Dot)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(self.theme.accent_alt))
                .data(&actual),
        ];

        let chart = Chart::new(datasets)
            .block(panel(" 7-Day Forecast Horizon ", &self.theme))
            .x_axis(
                Axis::default()
                    .style(Style::default().fg(self.theme.muted))
                    .bounds([0.0, x_max])
                    .labels(x_labels),
            )
            .y_axis(
                Axis::default()
                    .title("Covers")
                    .style(Style::default().fg(self.theme.muted))
                    .bounds([0.0, y_max])
                    .labels(vec![
                        Span::raw("0"),
                        Span::raw(format!("{:.0}", y_max / 2.0)),
                        Span::raw(format!("{y_max:.0}")),
                    ]),
            );
        frame.render_widget(chart, area);
    }

    fn render_forecast_table(&self, frame: &mut Frame, area: Rect, forecast: &Forecast) {
        let header = Row::new(["Date", "Covers", "Confidence", "Weather", "Actual"])
            .style(
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            );
        let rows: Vec<Row> = forecast
            .series
            .iter()
            .map(|point| {
                let weather = point
                    .weather
                    .map(|weather| format!("{} {weather}", weather_glyph(weather)))
                    .unwrap_or_else(|| "-".to_string());
                let actual = point
                    .actual
                    .map(|covers| format!("{covers:.0}"))
                    .unwrap_or_else(|| "-".to_string());
                Row::new(vec![
                    Cell::from(point.date.format("%a %d %b").to_string()),
                    Cell::from(format!("{:.0}", point.predicted_covers)),
                    Cell::from(format!("{:.0}%", point.confidence)),
                    Cell::from(weather),
                    Cell::from(actual),
                ])
            })
            .collect();
        let title = format!(
            " Forecast · {} · updated {} ",
            forecast.source.label(),
            forecast.updated_at.format("%H:%M")
        );
        let table = Table::new(
            rows,
            [
                Constraint::Length(12),
                Constraint::Length(7),
                Constraint::Length(11),
                Constraint::Length(10),
                Constraint::Length(7),
            ],
        )
        .header(header)
        .block(panel(title, &self.theme));
        frame.render_widget(table, area);
    }

    fn draw_pricing(&self, frame: &mut Frame, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(10)])
            .split(area);
        let intro = Paragraph::new(vec![
            Line::from(Span::styled(
                "Scegli il tuo piano",
                Style::default()
                    .fg(self.theme.primary_fg)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "Inizia gratuitamente e passa al piano Pro quando sei pronto per scalare.",
                Style::default().fg(self.theme.muted),
            )),
        ])
        .alignment(Alignment::Center);
        frame.render_widget(intro, rows[0]);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
            ])
            .split(rows[1]);
        for (tier, column) in TIERS.iter().zip(columns.iter()) {
            self.render_tier(frame, *column, tier);
        }
    }

    fn render_tier(&self, frame: &mut Frame, area: Rect, tier: &Tier) {
        let border = if tier.popular {
            self.theme.accent
        } else {
            self.theme.muted
        };
        let mut title = vec![Span::styled(
            format!(" {} ", tier.title),
            Style::default().add_modifier(Modifier::BOLD),
        )];
        if tier.popular {
            title.push(Span::styled(
                " MOST POPULAR ",
                Style::default()
                    .fg(self.theme.on_accent)
                    .bg(self.theme.accent),
            ));
        }
        let mut lines = vec![
            Line::from(Span::styled(
                tier.description,
                Style::default().fg(self.theme.muted),
            )),
            Line::from(""),
            Line::from(vec![
                Span::styled(
                    tier.price,
                    Style::default()
                        .fg(self.theme.primary_fg)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    if tier.price == "Custom" { "" } else { " /month" },
                    Style::default().fg(self.theme.muted),
                ),
            ]),
            Line::from(""),
        ];
        lines.extend(tier.features.iter().map(|(feature, included)| {
            if *included {
                Line::from(vec![
                    Span::styled("✓ ", Style::default().fg(self.theme.accent)),
                    Span::raw(*feature),
                ])
            } else {
                Line::from(Span::styled(
                    format!("✗ {feature}"),
                    Style::default().fg(self.theme.muted),
                ))
            }
        }));
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("[ {} ]", tier.cta),
            Style::default().fg(border).add_modifier(Modifier::BOLD),
        )));

        let card = Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(border))
                    .title(Line::from(title)),
            )
            .wrap(Wrap { trim: true });
        frame.render_widget(card, area);
    }

    fn draw_settings(&self, frame: &mut Frame, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(12), Constraint::Length(8)])
            .split(area);
        let plans = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[0]);
        let selected = self.selected_plan();
        for (plan, column) in Plan::ALL.iter().zip(plans.iter()) {
            self.render_plan(frame, *column, *plan, *plan == selected);
        }

        let identity = self.session.current().identity;
        let email = identity
            .as_ref()
            .map(|identity| identity.email.clone())
            .unwrap_or_else(|| "-".to_string());
        let restaurant = identity
            .as_ref()
            .and_then(|identity| identity.restaurant_name.clone())
            .unwrap_or_else(|| "-".to_string());
        let label = Style::default().fg(self.theme.muted);
        let account = Paragraph::new(vec![
            Line::from(vec![Span::styled("Data retention: ", label), Span::raw(DATA_RETENTION)]),
            Line::from(vec![Span::styled("Email: ", label), Span::raw(email)]),
            Line::from(vec![Span::styled("Restaurant: ", label), Span::raw(restaurant)]),
            Line::from(vec![
                Span::styled("Backend: ", label),
                Span::raw(self.client.base_url().to_string()),
            ]),
            Line::from(vec![
                Span::styled("State: ", label),
                Span::raw(self.config.state_dir.display().to_string()),
            ]),
        ])
        .block(panel(" Account Settings ", &self.theme))
        .wrap(Wrap { trim: true });
        frame.render_widget(account, rows[1]);
    }

    fn render_plan(&self, frame: &mut Frame, area: Rect, plan: Plan, selected: bool) {
        let color = match plan {
            Plan::Monthly => self.theme.accent,
            Plan::Yearly => self.theme.accent_alt,
        };
        let mut lines = vec![Line::from(Span::styled(
            plan.price_label(),
            Style::default()
                .fg(self.theme.primary_fg)
                .add_modifier(Modifier::BOLD),
        ))];
        if let Some(tagline) = plan.tagline() {
            lines.push(Line::from(Span::styled(tagline, Style::default().fg(color))));
        }
        lines.push(Line::from(""));
        lines.extend(plan.features().iter().map(|feature| {
            Line::from(vec![
                Span::styled("✓ ", Style::default().fg(color)),
                Span::raw(*feature),
            ])
        }));
        lines.push(Line::from(""));
        let action_style = if selected {
            Style::default()
                .fg(self.theme.on_accent)
                .bg(color)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(color)
        };
        let action = if self.checkout_pending && selected {
            " Opening checkout... ".to_string()
        } else {
            format!(" {} ", plan.action_label())
        };
        lines.push(Line::from(Span::styled(action, action_style)));

        let border = if selected { color } else { self.theme.muted };
        let card = Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(border))
                    .title(format!(" Subscription Plan · {} ", plan.name())),
            )
            .wrap(Wrap { trim: true });
        frame.render_widget(card, area);
    }

    fn draw_upload(&self, frame: &mut Frame, area: Rect) {
        let limit_mb = self.config.upload.max_bytes as f64 / (1024.0 * 1024.0);
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4),
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(6),
            ])
            .split(area);

        let intro = Paragraph::new(vec![
            Line::from(Span::styled(
                "Carica i tuoi dati storici",
                Style::default()
                    .fg(self.theme.primary_fg)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "Carica il file CSV esportato dal tuo software di cassa. Crystal Ball analizzerà i pattern per generare previsioni accurate sui coperti.",
                Style::default().fg(self.theme.muted),
            )),
        ])
        .wrap(Wrap { trim: true });
        frame.render_widget(intro, rows[0]);

        let border = if self.upload.error.is_some() {
            self.theme.danger
        } else {
            self.theme.accent
        };
        let input = Paragraph::new(self.upload.path.display()).block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(border))
                .title(format!(" CSV file path · CSV (MAX. {limit_mb:.0}MB) ")),
        );
        frame.render_widget(input, rows[1]);
        if self.goto.is_none() {
            let cursor_x = (rows[1].x + 1 + self.upload.path.cursor() as u16)
                .min(rows[1].x + rows[1].width.saturating_sub(2));
            frame.set_cursor(cursor_x, rows[1].y + 1);
        }

        let file_line = if let Some(error) = &self.upload.error {
            Line::from(Span::styled(
                format!("⚠ {error}"),
                Style::default().fg(self.theme.danger),
            ))
        } else if self.upload.loading {
            Line::from(Span::styled("Reading file...", Style::default().fg(self.theme.muted)))
        } else if let Some(file) = self.previewer.accepted() {
            Line::from(vec![
                Span::styled("▣ ", Style::default().fg(self.theme.success)),
                Span::raw(file.to_string()),
                Span::styled("   Esc remove file", Style::default().fg(self.theme.muted)),
            ])
        } else {
            Line::from(Span::styled(
                "Type a path and press Enter to preview",
                Style::default().fg(self.theme.muted),
            ))
        };
        frame.render_widget(Paragraph::new(file_line), rows[2]);

        if let Some(table) = self.previewer.table() {
            self.render_preview(frame, rows[3], table);
        }
    }

    fn render_preview(&self, frame: &mut Frame, area: Rect, table: &PreviewTable) {
        let columns = table.column_count().max(1);
        let header = Row::new(
            table
                .header()
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(Cell::from),
        )
        .style(
            Style::default()
                .fg(self.theme.accent)
                .add_modifier(Modifier::BOLD),
        );
        let rows: Vec<Row> = table
            .data_rows()
            .iter()
            .map(|row| Row::new(row.iter().cloned().map(Cell::from)))
            .collect();
        let widths = vec![Constraint::Ratio(1, columns as u32); columns];
        let action = if self.upload.submitting {
            Span::styled(" Analysing... ", Style::default().fg(self.theme.warning))
        } else {
            Span::styled(
                " Enter: Analizza Dati ",
                Style::default()
                    .fg(self.theme.on_accent)
                    .bg(self.theme.accent),
            )
        };
        let block = panel(
            Line::from(vec![
                Span::raw(" Anteprima Dati "),
                Span::styled("· Showing first 5 rows ", Style::default().fg(self.theme.muted)),
                action,
            ]),
            &self.theme,
        );
        let preview = Table::new(rows, widths).header(header).block(block);
        frame.render_widget(preview, area);
    }

    fn draw_login(&self, frame: &mut Frame, area: Rect) {
        let width = cmp::min(56, area.width.saturating_sub(2)).max(24);
        let form_area = centered_rect(width, 16, area);
        frame.render_widget(Clear, form_area);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(self.theme.accent));
        let inner = block.inner(form_area);
        frame.render_widget(block, form_area);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(1),
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(0),
            ])
            .split(inner);

        let title = Paragraph::new(vec![
            Line::from(Span::styled(
                "CRYSTAL BALL",
                Style::default()
                    .fg(self.theme.primary_fg)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "Predictive Analytics // Auth",
                Style::default().fg(self.theme.accent),
            )),
        ])
        .alignment(Alignment::Center);
        frame.render_widget(title, rows[0]);

        if let Some(error) = &self.login.error {
            let error = Paragraph::new(Span::styled(
                error.clone(),
                Style::default().fg(self.theme.danger),
            ))
            .alignment(Alignment::Center);
            frame.render_widget(error, rows[1]);
        }

        let fields = [
            (LoginField::Identifier, "Identifier", &self.login.identifier, rows[2], "Ex: chef@restaurant.com"),
            (LoginField::Secret, "Access Key", &self.login.secret, rows[3], "••••••••"),
        ];
        for (field, label, input, row, placeholder) in fields {
            let focused = self.login.focus == field;
            let border = if focused {
                self.theme.accent
            } else {
                self.theme.muted
            };
            let text = if input.value().is_empty() {
                Span::styled(placeholder, Style::default().fg(self.theme.muted))
            } else {
                Span::raw(input.display())
            };
            let widget = Paragraph::new(text).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(border))
                    .title(format!(" {label} ")),
            );
            frame.render_widget(widget, row);
            if focused && self.goto.is_none() {
                let cursor_x =
                    (row.x + 1 + input.cursor() as u16).min(row.x + row.width.saturating_sub(2));
                frame.set_cursor(cursor_x, row.y + 1);
            }
        }

        let submit = if self.login.pending {
            "Authenticating..."
        } else {
            "Initiate Sequence"
        };
        let button = Paragraph::new(Span::styled(
            format!(" {submit} "),
            Style::default()
                .fg(self.theme.on_accent)
                .bg(self.theme.accent)
                .add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center);
        frame.render_widget(button, rows[4]);

        let demo = Paragraph::new(Span::styled(
            "Ctrl+D Initialize Demo Mode",
            Style::default().fg(self.theme.muted),
        ))
        .alignment(Alignment::Center);
        frame.render_widget(demo, rows[5]);
    }

    fn draw_not_found(&self, frame: &mut Frame, area: Rect) {
        let mut lines = vec![
            Line::from(Span::styled(
                "404",
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "Signal Lost",
                Style::default()
                    .fg(self.theme.primary_fg)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "We cannot predict where this page is.",
                Style::default().fg(self.theme.muted),
            )),
        ];
        if let Some(route) = &self.state.last_route {
            lines.push(Line::from(Span::styled(
                route.clone(),
                Style::default().fg(self.theme.warning),
            )));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "[ Return to Mission Control ]",
            Style::default().fg(self.theme.accent),
        )));
        let height = lines.len() as u16;
        let paragraph = Paragraph::new(lines).alignment(Alignment::Center);
        frame.render_widget(paragraph, centered_rect(area.width, height, area));
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let hints = match self.screen {
            Screen::Landing => "Enter start  : go to  1-4 screens  q quit",
            Screen::Dashboard => "r refresh  u upload  Tab next  : go to  L sign out  q quit",
            Screen::Pricing => "Enter manage subscription  Tab next  : go to  q quit",
            Screen::Settings => "←/→ choose plan  Enter checkout  L sign out  q quit",
            Screen::Upload => "Enter preview / analyse  Esc remove file  Ctrl+G go to  Ctrl+C quit",
            Screen::Login => "Tab switch field  Enter sign in  Ctrl+D demo  Esc back  Ctrl+C quit",
            Screen::NotFound => "Enter return to dashboard  : go to  q quit",
        };
        let source = self
            .predictions
            .source()
            .map(|source| format!("data: {}", source.label()))
            .unwrap_or_else(|| "data: none".to_string());
        let paragraph = Paragraph::new(vec![
            Line::from(self.state.status.clone()),
            Line::from(vec![
                Span::styled(hints, Style::default().fg(self.theme.muted)),
                Span::raw("  "),
                Span::styled(source, Style::default().fg(self.theme.accent_alt)),
            ]),
        ])
        .block(panel(" Status ", &self.theme))
        .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn render_goto_prompt(&self, frame: &mut Frame) {
        let Some(prompt) = &self.goto else {
            return;
        };
        let frame_area = frame.size();
        let width = cmp::max(cmp::min(48_u16, frame_area.width.saturating_sub(4)), 24_u16);
        let area = centered_rect(width, 5, frame_area);
        frame.render_widget(Clear, area);

        let input_line = Line::from(vec![
            Span::styled("> ", Style::default().fg(self.theme.accent)),
            Span::raw(prompt.value().to_string()),
        ]);
        let helper = Line::from(vec![
            Span::styled("Enter", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" go  "),
            Span::styled("Esc", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" cancel"),
        ]);
        let paragraph = Paragraph::new(vec![input_line, Line::from(""), helper])
            .block(panel(" Go to ", &self.theme));
        frame.render_widget(paragraph, area);

        let cursor_x = (area.x + 3 + prompt.cursor() as u16).min(area.x + area.width.saturating_sub(2));
        frame.set_cursor(cursor_x, area.y + 1);
    }
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crystalball_core::prediction::{demo_series, demo_stats};

    #[test]
    fn stat_cards_read_the_forecast() {
        let stats = demo_stats();
        let series = demo_series();
        assert_eq!(trend_label(Some(&stats)), "+1.2 / day");
        assert_eq!(confidence_label(series.first()), "85%");
        assert_eq!(seasonality_label(Some(&stats)), "Pattern Locked");
    }

    #[test]
    fn stat_cards_without_data() {
        assert_eq!(trend_label(None), "Analyzing...");
        assert_eq!(trend_label(Some(&ForecastStats::default())), "Analyzing...");
        assert_eq!(confidence_label(None), "--");
        assert_eq!(seasonality_label(None), "Searching...");

        let falling = ForecastStats {
            trend_per_day: -0.46,
            ..ForecastStats::default()
        };
        assert_eq!(trend_label(Some(&falling)), "-0.5 / day");
    }

    #[test]
    fn covers_axis_leaves_headroom() {
        // Peak of the demo week is 70 predicted covers.
        assert_eq!(covers_ceiling(&demo_series()), 90.0);
        assert_eq!(covers_ceiling(&[]), 10.0);
    }

    #[test]
    fn centered_rect_stays_inside() {
        let area = Rect::new(2, 3, 20, 10);
        let rect = centered_rect(30, 4, area);
        assert_eq!(rect, Rect::new(2, 6, 20, 4));
    }
}
