pub mod composer;
pub mod prompt;

pub use composer::{generate_id_photo, GenerationError};
