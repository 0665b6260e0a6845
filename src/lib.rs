//! Desktop operator for a GUI agent: parses the model's action calls and
//! carries them out on the local machine with real mouse, keyboard,
//! clipboard and screen capture.

pub mod action;
pub mod capture;
pub mod chat;
pub mod command;
pub mod config;
pub mod device;
pub mod error;
pub mod keys;
pub mod logging;
pub mod manifest;
pub mod operator;
pub mod runner;
pub mod store;
pub mod window;

pub use error::{Error, Result};
