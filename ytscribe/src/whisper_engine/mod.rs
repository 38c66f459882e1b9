pub mod models;
pub mod whisper_engine;

pub use models::*;
pub use whisper_engine::*;
