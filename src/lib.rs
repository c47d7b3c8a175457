#![crate_name = "rust_ofp_monitor"]
#![crate_type = "lib"]

#[macro_use]
pub mod vlog;

mod bits;
pub mod flow_monitor;
pub mod flow_removed;
pub mod flow_update;
pub mod ofp_actions;
pub mod ofp_buf;
pub mod ofp_error;
pub mod ofp_group;
pub mod ofp_header;
pub mod ofp_message;
pub mod ofp_meter;
pub mod ofp_port;
pub mod ofp_protocol;
pub mod ofp_raw;
pub mod ox_stat;
pub mod pattern;
pub mod requestforward;

pub use crate::ofp_error::{OfpError, Result};
pub use crate::ofp_message::OfpMessage;
pub use crate::ofp_protocol::{Protocol, Protocols};
