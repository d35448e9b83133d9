pub mod settings;
pub mod settings_io;

pub use settings::{Settings, ViolationPolicy};
