//! Per-node-type tick logic (§4.5). Each module implements one node kind's
//! `on_tick`, called by [`crate::graph::StrategyGraph::run_tick`]'s traversal
//! driver once the epoch-based visited guard has cleared.

mod entry;
mod entry_signal;
mod exit;
mod exit_signal;
mod re_entry_signal;
mod square_off;
mod start;
pub(crate) mod support;

pub use entry::on_tick as entry_on_tick;
pub use entry_signal::on_tick as entry_signal_on_tick;
pub use exit::on_tick as exit_on_tick;
pub use exit_signal::on_tick as exit_signal_on_tick;
pub use re_entry_signal::on_tick as re_entry_signal_on_tick;
pub use square_off::on_tick as square_off_on_tick;
pub use start::on_tick as start_on_tick;
