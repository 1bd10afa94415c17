pub mod api;
pub mod controller;
pub mod error;
pub mod events;
pub mod models;
pub mod pipeline;
pub mod storage;
pub mod utils;

pub use controller::SearchController;
pub use error::{FetchError, PipelineError, StoreError};
pub use events::{ChannelSink, Event, EventSink, LogSink, TeeSink};
