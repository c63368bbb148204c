pub mod results;

pub use results::{ResultSink, ResultStore, StoredResult, IMAGES_DIR, RESULTS_FILE};
