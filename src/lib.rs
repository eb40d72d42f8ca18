//! Prediction Bot Library
//!
//! The quota and content-rotation core of a prediction bot.
//!
//! This crate provides:
//! - Loading the static content pool
//! - Durable per-user daily quotas with UTC rollover
//! - Non-repeating random draws per user
//! - A transport-agnostic command layer over the quota service

pub mod commands;
pub mod config;
pub mod health;
pub mod service;
pub mod storage;
