pub mod normalizer;
pub mod reader;
pub mod types;
pub mod utils;

pub use normalizer::build_request;
pub use reader::read_workbook;
