pub mod pages;
pub mod serialize;
pub mod template;
