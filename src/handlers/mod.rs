// src/handlers/mod.rs

pub mod attempt;
