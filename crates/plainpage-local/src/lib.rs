pub mod chunk;
pub mod engine;
pub mod gemini;
pub mod orchestrate;
pub mod page;
pub mod prompt;
pub mod replace;
pub mod select;
pub mod session;
pub mod substitute;
