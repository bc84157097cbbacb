pub mod button;
pub mod chord;
pub mod config;
pub mod emulation;
pub mod ipc;
pub mod timer;
