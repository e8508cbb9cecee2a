pub mod batch;
pub mod config;
pub mod convert;
pub mod diag;
pub mod docx;
pub mod error;
pub mod model;
pub mod progress;
pub mod styles;
pub mod tei;
pub mod tree;
pub mod xml;
