//! Journal chat panel host.
//!
//! [`controller`] owns the panel state and every transition; [`jobs`] holds
//! the network and database work those transitions hand off.

pub mod controller;
pub mod jobs;

pub use controller::{
    ChatPanelController, FetchRequest, LoadPlan, LoadState, PanelProps, PanelView, SendJob,
    SendState, Visibility,
};
pub use jobs::{execute_send, fetch_history};
