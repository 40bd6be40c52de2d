//! Main application state and logic

use eframe::egui;
use proxy_log_core::{
    FeedEvent, LiveLogs, LogFilter, LogLevel, LogStore, SubscriptionState, ViewerConfig,
    WsConnector,
};
use std::sync::mpsc::{channel, Receiver};

use crate::views::{LogsView, SettingsView, View};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl StatusLevel {
    pub fn color(&self) -> egui::Color32 {
        match self {
            StatusLevel::Info => egui::Color32::from_rgb(100, 149, 237),
            StatusLevel::Success => egui::Color32::from_rgb(34, 139, 34),
            StatusLevel::Warning => egui::Color32::from_rgb(255, 165, 0),
            StatusLevel::Error => egui::Color32::from_rgb(220, 20, 60),
        }
    }
}

/// Logs view state
#[derive(Default)]
pub struct LogsViewState {
    pub level: LogLevel,
    pub filter: LogFilter,
}

/// Settings view state
#[derive(Default)]
pub struct SettingsViewState {
    pub server: String,
    pub secret: String,
    pub max_entries: String,
    pub show_secret: bool,
    pub error: Option<String>,
    pub saved: bool,
}

impl SettingsViewState {
    fn from_config(config: &ViewerConfig) -> Self {
        Self {
            server: config.core.server.clone(),
            secret: config.core.secret.clone(),
            max_entries: config.logs.max_entries.to_string(),
            ..Default::default()
        }
    }
}

/// Main application state
pub struct LogViewerApp {
    // Configuration
    pub config: ViewerConfig,

    // Log data
    pub store: LogStore,
    pub live: LiveLogs<WsConnector>,
    pub feed_rx: Receiver<FeedEvent>,

    // Navigation
    pub current_view: View,

    // View state
    pub logs_view: LogsViewState,
    pub settings_view: SettingsViewState,

    // Status
    pub status_message: Option<(String, StatusLevel)>,
}

impl LogViewerApp {
    pub fn new(cc: &eframe::CreationContext<'_>, runtime: tokio::runtime::Handle) -> Self {
        let mut status_message = None;
        let config = match ViewerConfig::load_or_default() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Using default settings: {}", e);
                status_message = Some((format!("Failed to load settings: {}", e), StatusLevel::Error));
                ViewerConfig::default()
            }
        };

        let store = LogStore::with_capacity(config.logs.max_entries);

        // Repaint whenever the store changes instead of polling it
        let ctx = cc.egui_ctx.clone();
        let mut changes = store.subscribe();
        runtime.spawn(async move {
            while changes.changed().await.is_ok() {
                ctx.request_repaint();
            }
        });

        let (feed_tx, feed_rx) = channel();
        let live = LiveLogs::new(WsConnector::new(runtime), store.clone()).with_events(feed_tx);

        let mut app = Self {
            logs_view: LogsViewState {
                level: config.logs.level,
                ..Default::default()
            },
            settings_view: SettingsViewState::from_config(&config),
            config,
            store,
            live,
            feed_rx,
            current_view: View::default(),
            status_message,
        };
        app.sync_subscription();
        app
    }

    pub fn set_status(&mut self, level: StatusLevel, message: impl Into<String>) {
        self.status_message = Some((message.into(), level));
    }

    pub fn clear_status(&mut self) {
        self.status_message = None;
    }

    /// Open, replace or close the live feed to match current settings
    pub fn sync_subscription(&mut self) {
        let info = self.config.connection_info();
        self.live
            .sync(self.config.logs.enabled, info.as_ref(), self.logs_view.level);
    }

    pub fn set_log_level(&mut self, level: LogLevel) {
        if self.logs_view.level == level {
            return;
        }
        self.logs_view.level = level;
        self.config.logs.level = level;
        self.persist_config();
        self.sync_subscription();
    }

    pub fn set_logging_enabled(&mut self, enabled: bool) {
        self.config.logs.enabled = enabled;
        self.persist_config();
        self.sync_subscription();
    }

    pub fn clear_logs(&mut self, level: Option<LogLevel>) {
        self.store.clear(level);
    }

    pub fn subscription_state(&self) -> SubscriptionState {
        self.live.state()
    }

    pub fn save_settings(&mut self) {
        self.settings_view.error = None;

        let max_entries = match self.settings_view.max_entries.trim().parse::<usize>() {
            Ok(n) => n,
            Err(_) => {
                self.settings_view.error = Some("Max entries must be a number".to_string());
                return;
            }
        };

        let mut config = self.config.clone();
        config.core.server = self.settings_view.server.trim().to_string();
        config.core.secret = self.settings_view.secret.clone();
        config.logs.max_entries = max_entries;

        if let Err(e) = config.validate() {
            self.settings_view.error = Some(e.to_string());
            return;
        }

        match config.save() {
            Ok(()) => {
                if config.logs.max_entries != self.store.capacity() {
                    self.set_status(
                        StatusLevel::Info,
                        "Max entries takes effect after restart",
                    );
                } else {
                    self.set_status(StatusLevel::Success, "Settings saved");
                }
                self.config = config;
                self.settings_view.saved = true;
                self.sync_subscription();
            }
            Err(e) => {
                self.settings_view.error = Some(format!("Failed to save settings: {}", e));
            }
        }
    }

    fn persist_config(&mut self) {
        if let Err(e) = self.config.save() {
            log::warn!("Failed to save settings: {}", e);
            self.set_status(StatusLevel::Warning, format!("Failed to save settings: {}", e));
        }
    }

    fn handle_feed_events(&mut self) {
        while let Ok(event) = self.feed_rx.try_recv() {
            match event {
                FeedEvent::Connected { .. } => {
                    self.set_status(StatusLevel::Success, "Connected to core log stream");
                }
                FeedEvent::Failed { reason, .. } => {
                    self.set_status(StatusLevel::Error, format!("Log stream error: {}", reason));
                }
                FeedEvent::Closed { .. } => {
                    self.set_status(StatusLevel::Warning, "Log stream closed by core");
                }
                FeedEvent::HistoryFailed { reason } => {
                    self.set_status(StatusLevel::Warning, format!("Could not load log history: {}", reason));
                }
            }
        }
    }
}

impl eframe::App for LogViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_feed_events();

        // Top panel with navigation
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("🛰 Proxy Log Viewer");
                ui.separator();

                ui.selectable_value(&mut self.current_view, View::Logs, "📝 Logs");
                ui.selectable_value(&mut self.current_view, View::Settings, "⚙ Settings");
            });
        });

        // Status bar
        if let Some((ref msg, level)) = self.status_message.clone() {
            egui::TopBottomPanel::bottom("status_panel").show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.colored_label(level.color(), msg);
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.small_button("✕").clicked() {
                            self.clear_status();
                        }
                    });
                });
            });
        }

        // Main content
        egui::CentralPanel::default().show(ctx, |ui| match self.current_view {
            View::Logs => LogsView::show(self, ui),
            View::Settings => SettingsView::show(self, ui),
        });

        // Feed events do not touch the store, so poll them at a slow pace
        ctx.request_repaint_after(std::time::Duration::from_secs(1));
    }
}
