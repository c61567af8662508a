pub(crate) mod bootstrap;
mod demo;
pub(crate) mod loop_runner;
