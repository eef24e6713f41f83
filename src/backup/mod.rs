pub mod archive;
pub mod job;
pub mod scheduler;
pub mod stats;
#[cfg(test)]
mod testing;

pub use archive::Archiver;
pub use job::JobRunner;
pub use scheduler::Scheduler;
pub use stats::BackupStats;
