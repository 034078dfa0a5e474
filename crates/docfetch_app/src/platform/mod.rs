mod app;
mod config;
mod effects;
mod logging;
mod messenger;

pub use app::run_app;
