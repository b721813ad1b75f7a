pub mod output;
pub mod root;
