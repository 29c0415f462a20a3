pub mod autosave;
pub mod block;
pub mod bootstrap;
pub mod config;
pub mod persistence;
pub mod rules;
pub mod terrain;
