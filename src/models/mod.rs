//! Data models

pub mod mixtape;
pub mod progress;
pub mod track;

pub use mixtape::{Mixtape, MixtapeTrack};
pub use progress::{ProgressEvent, ProgressStatus};
pub use track::Track;
