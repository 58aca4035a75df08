use crate::events::EvaluationData;
use kite_execution::{OrderType, ProductType};
use kite_instrument::{Exchange, Side};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use smol_str::SmolStr;

/// A node's lifecycle state (§4.5 "Node state machine").
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub enum NodeStatus {
    #[default]
    Inactive,
    Active,
    Pending,
}

/// Staged order details an Entry/Exit node needs to remember between placing an
/// order and its eventual `Complete`/`Rejected` postback (§4.5 EntryNode/ExitNode
/// lifecycle): everything required to either write a GPS entry/exit or to log a
/// rejection, without re-deriving it from the (possibly now-stale) node config.
#[derive(Debug, Clone)]
pub struct PendingOrderState {
    pub order_id: String,
    pub execution_id: String,
    pub position_id: String,
    pub symbol: SmolStr,
    pub exchange: Exchange,
    pub side: Side,
    pub quantity: Decimal,
    pub multiplier: Decimal,
    pub actual_quantity: Decimal,
    pub order_type: OrderType,
    pub product_type: ProductType,
    pub underlying_symbol: Option<SmolStr>,
    pub underlying_price_on_entry: Option<Decimal>,
    pub node_variables_snapshot: JsonValue,
}

/// Per-node, per-session execution state (§3 "Node Execution State"). Wrapped in
/// a `RefCell` by [`crate::graph::NodeInstance`] so cross-node reads (e.g.
/// ReEntrySignalNode inspecting its target EntryNode) don't require holding a
/// mutable borrow of the whole node map.
#[derive(Debug, Clone, Default)]
pub struct NodeRuntime {
    pub status: NodeStatus,
    pub last_visited_epoch: u64,
    pub re_entry_num: u32,
    pub execution_id: Option<String>,
    pub parent_execution_id: Option<String>,
    pub last_evaluation: Option<EvaluationData>,
    /// EntryNode: one staged order per VPI, supporting multi-leg entries.
    pub pending_entries: indexmap::IndexMap<String, PendingOrderState>,
    /// ExitNode: at most one order in flight at a time.
    pub pending_exit: Option<PendingOrderState>,
    /// ReEntrySignalNode: set permanently once `maxEntries` is reached.
    pub permanently_inactive: bool,
    /// EntryNode: legs whose order came back `Rejected`/`Cancelled` (§4.5,
    /// §8 Scenario D "subsequent ticks do not retry"). Checked ahead of
    /// `pending_entries` so a later tick re-entering this node (e.g. the
    /// gating EntrySignalNode firing again because the position still isn't
    /// open) skips straight over the leg instead of placing a second order.
    pub rejected_legs: indexmap::IndexSet<String>,
}
