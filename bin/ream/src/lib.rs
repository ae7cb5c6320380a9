pub mod cli;
pub mod node;
