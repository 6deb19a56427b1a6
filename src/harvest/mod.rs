mod lister;
mod name;
mod pipeline;
mod remover;
mod runner;
mod transfer;

pub use runner::Runner;
