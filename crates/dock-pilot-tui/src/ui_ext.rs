//! ratatui colors for core status types

use dock_pilot_core::{HasHealth, HealthIndicator};
use ratatui::style::Color;

/// Extension trait for HealthIndicator to provide ratatui colors
pub trait HealthIndicatorExt {
    fn color(&self) -> Color;

    /// Get symbol and color together (common pattern)
    fn symbol_and_color(&self) -> (&'static str, Color);
}

impl HealthIndicatorExt for HealthIndicator {
    fn color(&self) -> Color {
        match self {
            HealthIndicator::Healthy => Color::Green,
            HealthIndicator::Warning => Color::Yellow,
            HealthIndicator::Error => Color::Red,
            HealthIndicator::Stopped => Color::Gray,
            HealthIndicator::Pending => Color::Cyan,
            HealthIndicator::Unknown => Color::DarkGray,
        }
    }

    fn symbol_and_color(&self) -> (&'static str, Color) {
        (self.symbol(), self.color())
    }
}

/// Symbol and color of anything that reports its health
pub fn health_span_parts(item: &impl HasHealth) -> (&'static str, Color) {
    item.health().symbol_and_color()
}
