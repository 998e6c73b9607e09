// src/handlers/mod.rs

pub mod auth;
pub mod class;
pub mod quiz;
pub mod ws;
