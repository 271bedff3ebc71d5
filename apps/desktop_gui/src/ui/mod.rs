//! UI layer for the dashboard: app shell, forms, and live collection panels.

pub mod app;

pub use app::DashboardApp;
