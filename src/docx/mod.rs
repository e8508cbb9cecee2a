pub mod package;
pub mod source;

pub use source::{read_document, read_package};
