// src/store/mod.rs

pub mod attempts;
pub mod curriculum;
pub mod progress;
pub mod retry;

pub use attempts::AttemptStore;
pub use curriculum::CurriculumStore;
pub use progress::ProgressStore;
pub use retry::RetryPolicy;
