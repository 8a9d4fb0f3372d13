//! A small task tracker: an axum REST backend over SQLite and a ratatui
//! terminal client that talks to it.

pub mod api;
pub mod app;
pub mod config;
pub mod form;
pub mod models;
pub mod repository;
pub mod server;
pub mod service;
pub mod task_store;
pub mod ui;
pub mod validation;
