//! AI inference layer: Ollama client for generative tasks and the publication classifier.

pub mod classifier;
pub mod ollama;
pub mod prompt;

pub use classifier::Classifier;
pub use ollama::{InferenceError, OllamaClient, TextGenerator};
