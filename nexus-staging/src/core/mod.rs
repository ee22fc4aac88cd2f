//! Core domain model types.
//!
//! This module contains the value types shared by the client:
//! - Staging repository identity
//! - Supported transitions and their endpoints
//! - Server capability derived from the reported version

mod action;
mod capability;
mod stage;

pub use action::StageAction;
pub(crate) use action::append_segments;
pub use capability::{is_async_version, ServerCapability};
pub use stage::Stage;
