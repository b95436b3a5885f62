pub mod analyze;
pub mod draw;
pub mod gallery;
pub mod logging;
pub mod settings;
