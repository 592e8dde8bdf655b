pub mod attendance;
pub mod config;
pub mod db;
pub mod ipc;
pub mod logging;
