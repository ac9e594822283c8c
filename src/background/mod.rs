pub mod init_task;

pub use init_task::{InitTask, TaskId, TaskPhase};
