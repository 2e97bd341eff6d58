//! Library exports for the hotel booking service
//!
//! This module exposes internal components for testing and potential library usage.

pub mod auth;
pub mod availability;
pub mod booking;
pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod model;
pub mod pricing;
pub mod projection;
pub mod route;
