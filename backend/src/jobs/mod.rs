// Background Jobs
//
// Scheduled producers for the automation engine, driven by tokio-cron-scheduler.

pub mod scheduler;

pub use scheduler::{JobError, JobResult, MaintenanceScheduler};
