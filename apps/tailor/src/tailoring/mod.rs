pub mod corrector;
pub mod extractor;
pub mod handlers;
pub mod pipeline;
pub mod prompts;
pub mod session;
