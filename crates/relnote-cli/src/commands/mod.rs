pub mod diff;
pub mod digest;
pub mod mutate;
pub mod parse;
pub mod pipeline;
pub mod render;
pub mod schemas;
