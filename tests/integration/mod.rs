//! Integration tests for the syscore scheduler and its resource managers

mod config_loading;
mod memory_requests;
mod scheduler_scenarios;
