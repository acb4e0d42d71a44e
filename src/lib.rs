//! Asynchronous ad moderation pipeline.
//!
//! Intake publishes moderation tasks to a durable Redis-backed bus; a worker
//! pool consumes them, scores each ad with an in-process model behind a
//! read-through prediction cache, and records the outcome in an idempotent
//! PostgreSQL result store. Failed tasks are retried with exponential
//! backoff or routed to a dead-letter topic.

pub mod app_state;
pub mod config;
pub mod db;
pub mod ml;
pub mod models;
pub mod routes;
pub mod services;
pub mod worker;
