pub mod file;
pub mod log;

pub use file::FileSink;
pub use log::LogSink;
