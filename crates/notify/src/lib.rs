//! Action delivery for fired alerts.
//!
//! This crate provides:
//! - [`ActionRequest`]: typed actions decoded from decision procedure output
//! - [`Connector`] trait for pluggable delivery channels
//! - Log, HTTP, Slack and DingTalk connector implementations
//! - [`Dispatcher`] that decodes a whole action list, then executes it in order

pub mod action;
pub mod dingding;
pub mod dispatcher;
pub mod log;
pub mod slack;
pub mod traits;
pub mod webhook;

pub use action::{ActionKind, ActionRequest};
pub use dispatcher::{DecodeError, DispatchError, Dispatcher};
pub use traits::{Connector, NotifyError};
