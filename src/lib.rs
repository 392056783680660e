#[macro_use]
extern crate diesel;

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
mod query;
pub mod routes;
mod schema;
pub mod service;
pub mod storage;
