pub mod data_loader;
pub mod frame_ops;
pub mod merger;
pub mod models;
pub mod preprocessor;

pub use data_loader::DataLoader;
pub use frame_ops::FrameOps;
pub use merger::Merger;
pub use models::{PipelineConfig, TimestampStrictness};
pub use preprocessor::Preprocessor;
