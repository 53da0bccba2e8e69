//! Configuration: data directory layout and the service settings record

mod paths;
mod settings;

pub use paths::DataPaths;
pub use settings::Settings;
