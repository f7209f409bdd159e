pub mod gemini;
pub mod wire;

pub use gemini::GeminiBackend;
