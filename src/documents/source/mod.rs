pub mod api;
pub mod fan_out;
pub mod file;
pub mod mock;

#[cfg(test)]
mod tests;

pub use api::{DocumentSource, SingleDocumentSource, SourceError};
pub use fan_out::FanOutSource;
pub use file::FileDocumentSource;
pub use mock::{MockDocumentSource, MockProfile};
