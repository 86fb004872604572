//! Console UI state
//!
//! Labels the flight window used to show, kept in one place and rendered
//! as a status line.

use ocufly_link::{BatteryReading, ControlTranslator, SessionState, TelemetryEvent};

#[derive(Debug, Clone)]
pub struct UiState {
    pub incoming: String,
    pub battery: String,
    pub speed: u8,
    pub rotation: u16,
    pub session: SessionState,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            incoming: "Click Connect".to_string(),
            battery: "N/A".to_string(),
            speed: 0,
            rotation: 0,
            session: SessionState::Disconnected,
        }
    }
}

impl UiState {
    pub fn sync_controls(&mut self, translator: &ControlTranslator) {
        self.speed = translator.speed().value();
        self.rotation = translator.rotation().degrees();
    }

    pub fn apply_battery(&mut self, reading: &BatteryReading) {
        self.battery = reading.to_string();
    }

    pub fn apply_event(&mut self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::Reply { text, .. } => self.incoming = format!("Received message: {}", text),
            TelemetryEvent::Battery { .. } | TelemetryEvent::Discarded { .. } => {}
        }
    }

    pub fn status_line(&self) -> String {
        format!(
            "[{:?}] speed {} | rotation {}° | {} | {}",
            self.session, self.speed, self.rotation, self.battery, self.incoming
        )
    }
}
