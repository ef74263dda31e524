//! The crystal ball: a pulsing sphere with two counter-rotating rings
//! and the next day's forecast in the middle.

use std::f64::consts::{PI, TAU};

use crystalball_core::Weather;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Circle, Points},
        Paragraph, Widget,
    },
};

/// Ticks per glow pulse (4s at the UI tick rate).
const PULSE_TICKS: f64 = 16.0;
/// Ticks per turn of the outer ring.
const OUTER_RING_TICKS: f64 = 40.0;
/// Ticks per turn of the inner ring, which spins the other way.
const INNER_RING_TICKS: f64 = 60.0;
const RING_STEPS: usize = 48;

#[derive(Debug, Clone, Copy)]
pub struct OrbPalette {
    pub glow: Color,
    pub rainy_glow: Color,
    pub outer_ring: Color,
    pub inner_ring: Color,
    pub text: Color,
    pub muted: Color,
}

/// Forecast shown inside the ball.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrbReading {
    pub covers: Option<f64>,
    pub weather: Option<Weather>,
}

pub struct Orb {
    reading: OrbReading,
    tick: u64,
    palette: OrbPalette,
}

impl Orb {
    pub fn new(reading: OrbReading, tick: u64, palette: OrbPalette) -> Self {
        Self {
            reading,
            tick,
            palette,
        }
    }

    fn label_lines(&self) -> Vec<Line<'static>> {
        let Some(covers) = self.reading.covers else {
            return vec![Line::from(Span::styled(
                "#",
                Style::default()
                    .fg(self.palette.glow)
                    .add_modifier(Modifier::BOLD),
            ))];
        };
        let weather = match self.reading.weather {
            Some(weather) => format!("{} {}", weather_glyph(weather), weather.to_string().to_uppercase()),
            None => "FORECAST".to_string(),
        };
        vec![
            Line::from(Span::styled(
                format!("{covers:.0}"),
                Style::default()
                    .fg(self.palette.text)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(weather, Style::default().fg(self.palette.muted))),
        ]
    }
}

impl Widget for Orb {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width < 4 || area.height < 3 {
            return;
        }

        // Cells are roughly twice as tall as they are wide.
        let half_width = f64::from(area.width) / (f64::from(area.height) * 2.0);
        let scale = pulse_scale(self.tick);
        let glow = match self.reading.weather {
            Some(Weather::Rainy) => self.palette.rainy_glow,
            _ => self.palette.glow,
        };
        let outer = ring_points(0.78, ring_phase(self.tick, OUTER_RING_TICKS), PI);
        let inner = ring_points(0.55, -ring_phase(self.tick, INNER_RING_TICKS), PI);
        let palette = self.palette;

        Canvas::default()
            .marker(Marker::Braille)
            .x_bounds([-half_width, half_width])
            .y_bounds([-1.0, 1.0])
            .paint(|ctx| {
                ctx.draw(&Circle {
                    x: 0.0,
                    y: 0.0,
                    radius: 0.92 * scale,
                    color: glow,
                });
                ctx.draw(&Points {
                    coords: &outer,
                    color: palette.outer_ring,
                });
                ctx.draw(&Points {
                    coords: &inner,
                    color: palette.inner_ring,
                });
            })
            .render(area, buf);

        let lines = self.label_lines();
        let height = lines.len() as u16;
        let label_area = Rect::new(
            area.x,
            area.y + area.height.saturating_sub(height) / 2,
            area.width,
            height.min(area.height),
        );
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .render(label_area, buf);
    }
}

/// Radius multiplier easing between 1.0 and 1.05.
pub fn pulse_scale(tick: u64) -> f64 {
    let phase = (tick as f64 % PULSE_TICKS) / PULSE_TICKS;
    1.0 + 0.025 * (1.0 - (phase * TAU).cos())
}

fn ring_phase(tick: u64, period: f64) -> f64 {
    (tick as f64 % period) / period * TAU
}

/// Points along an arc of `span` radians starting at `start`.
pub fn ring_points(radius: f64, start: f64, span: f64) -> Vec<(f64, f64)> {
    (0..=RING_STEPS)
        .map(|step| {
            let angle = start + span * step as f64 / RING_STEPS as f64;
            (radius * angle.cos(), radius * angle.sin())
        })
        .collect()
}

pub fn weather_glyph(weather: Weather) -> &'static str {
    match weather {
        Weather::Sunny => "☀",
        Weather::Cloudy => "☁",
        Weather::Rainy => "☂",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_stays_in_range() {
        assert!((pulse_scale(0) - 1.0).abs() < 1e-9);
        assert!((pulse_scale(8) - 1.05).abs() < 1e-9);
        for tick in 0..64 {
            let scale = pulse_scale(tick);
            assert!((1.0..=1.05 + 1e-9).contains(&scale));
        }
    }

    #[test]
    fn ring_points_lie_on_the_circle() {
        let points = ring_points(0.5, 0.3, PI);
        assert_eq!(points.len(), RING_STEPS + 1);
        for (x, y) in points {
            assert!(((x * x + y * y).sqrt() - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn empty_reading_renders_placeholder() {
        let palette = OrbPalette {
            glow: Color::Cyan,
            rainy_glow: Color::Blue,
            outer_ring: Color::Cyan,
            inner_ring: Color::Magenta,
            text: Color::White,
            muted: Color::Gray,
        };
        let orb = Orb::new(OrbReading::default(), 0, palette);
        let lines = orb.label_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].spans[0].content, "#");

        let reading = OrbReading {
            covers: Some(45.0),
            weather: Some(Weather::Rainy),
        };
        let lines = Orb::new(reading, 0, palette).label_lines();
        assert_eq!(lines[0].spans[0].content, "45");
        assert_eq!(lines[1].spans[0].content, "☂ RAINY");
    }
}
