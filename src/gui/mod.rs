//! The monitor window: one large status readout and the relay button.

pub mod relay_button;

use std::time::Duration;

use eframe::egui::{self, Color32, RichText};
use tokio::sync::mpsc;
use tracing::debug;

use crate::monitor::{GaugeController, GaugeStatus, MonitorEvent};

pub use relay_button::RelayButton;

/// How often the window re-checks the event queue when idle.
pub const UI_TICK: Duration = Duration::from_millis(100);

const STATUS_TEXT_SIZE: f32 = 36.0;
const BUTTON_TEXT_SIZE: f32 = 18.0;
const BUTTON_HEIGHT: f32 = 40.0;

/// Ion gauge monitor window.
pub struct GaugeApp {
    controller: GaugeController,
    events: mpsc::Receiver<MonitorEvent>,
    status: Option<GaugeStatus>,
    relay: RelayButton,
}

impl GaugeApp {
    /// Create the window state and apply the dark theme.
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        controller: GaugeController,
        events: mpsc::Receiver<MonitorEvent>,
    ) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());
        Self {
            controller,
            events,
            status: None,
            relay: RelayButton::new(),
        }
    }

    fn poll_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match &event {
                MonitorEvent::Status(status) => self.status = Some(status.clone()),
                MonitorEvent::RelayState { .. }
                | MonitorEvent::Toggled { .. }
                | MonitorEvent::ToggleFailed { .. } => {
                    self.relay.apply(&event);
                }
            }
        }
    }

    fn status_ui(&self, ui: &mut egui::Ui) {
        let (text, color) = match &self.status {
            Some(status) if status.is_alarm() => (status.to_string(), Color32::from_rgb(230, 80, 80)),
            Some(status) => (status.to_string(), ui.visuals().strong_text_color()),
            None => ("--".to_string(), Color32::GRAY),
        };
        ui.label(RichText::new(text).size(STATUS_TEXT_SIZE).monospace().color(color));

        if let Some(detail) = self.status.as_ref().and_then(GaugeStatus::detail) {
            ui.label(RichText::new(detail).size(11.0).color(Color32::LIGHT_RED));
        }
    }

    fn relay_ui(&mut self, ui: &mut egui::Ui) {
        let mut caption = RichText::new(self.relay.label()).size(BUTTON_TEXT_SIZE);
        if self.relay.is_on() {
            caption = caption.color(Color32::RED);
        }
        let button = egui::Button::new(caption)
            .min_size(egui::vec2(ui.available_width(), BUTTON_HEIGHT));

        if ui.add_enabled(!self.relay.is_pending(), button).clicked() && self.relay.begin_toggle() {
            debug!(relay = %self.controller.relay(), "Toggle requested");
            self.controller.request_toggle();
        }

        if let Some(error) = self.relay.error() {
            ui.label(RichText::new(error).size(11.0).color(Color32::LIGHT_RED));
        }
    }
}

impl eframe::App for GaugeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_events();

        egui::TopBottomPanel::bottom("relay_panel")
            .show_separator_line(false)
            .show(ctx, |ui| {
                ui.add_space(8.0);
                self.relay_ui(ui);
                ui.add_space(8.0);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space((ui.available_height() - STATUS_TEXT_SIZE * 1.5).max(0.0) / 2.0);
                self.status_ui(ui);
            });
        });

        ctx.request_repaint_after(UI_TICK);
    }
}
