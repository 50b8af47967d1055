pub mod assets;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod geom;
pub mod map;
pub mod model;
pub mod palette;
pub mod parser;
pub mod render;
pub mod text_metrics;

pub use config::{MapSettings, load_settings};
pub use map::{MapModel, compute_map};
pub use model::GameState;
pub use render::{MapOutput, render_svg};

#[cfg(feature = "cli")]
pub use cli::run;
