pub mod agent;
pub mod coords;
pub mod error;
pub mod input;
pub mod logging;
pub mod overlay;
pub mod platform;
pub mod screen;
pub mod settings;
