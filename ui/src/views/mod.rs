//! View modules for the Proxy Log Viewer GUI

mod logs;
mod settings;

pub use logs::LogsView;
pub use settings::SettingsView;

/// Navigation views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Logs,
    Settings,
}
