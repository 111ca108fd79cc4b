// src/services/mod.rs

pub mod exam_client;
pub mod result_publisher;

pub use exam_client::ExamClient;
