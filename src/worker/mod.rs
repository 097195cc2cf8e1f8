//! Import Worker and upload streaming (§4.8).

mod import_worker;
mod upload;

pub use import_worker::ImportWorker;
pub use upload::stream_to_temp_file;
