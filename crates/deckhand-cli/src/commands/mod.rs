pub mod branch;
pub mod commit;
pub mod common;
pub mod compare;
pub mod completions;
pub mod diff;
pub mod init;
pub mod log;
pub mod merge;
pub mod merge_branch;
pub mod show;
pub mod watch;
