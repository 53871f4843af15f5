pub mod api;
pub mod calendar;
pub mod exporter;
pub mod flatten;
pub mod models;
pub mod pipelines;
pub mod runner;
