pub mod app;
pub mod commands;
pub mod effects;
pub mod render;
pub mod settings;
