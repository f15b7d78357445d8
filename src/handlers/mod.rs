// src/handlers/mod.rs

pub mod sessions;
pub mod tracks;
