//! Adaptive plan-recalculation engine for AI Coach.
//!
//! Detects when a runner's training plan has drifted from what they actually
//! do, proposes a revision through an external AI planner, holds it as a
//! preview until the runner confirms or declines, and regenerates near-term
//! sessions when menstrual-cycle data changes.

pub mod config;
pub mod models;
pub mod services;
pub mod store;
