// src/handlers/mod.rs

pub mod admin;
pub mod catalog;
pub mod practice;
pub mod stats;
