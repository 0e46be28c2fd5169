// src/models/mod.rs

pub mod answer;
pub mod question;
pub mod session;
pub mod subject;
