use crate::context::TraversalContext;
use crate::error::GraphError;
use crate::events::{EventKind, ExecutionEvent, NodeOutcome};
use crate::model::{NodeConfig, StrategySpec};
use crate::nodes;
use crate::runtime::NodeRuntime;
use crate::variables::topo_sort_variables;
use chrono::{DateTime, Utc};
use futures::future::LocalBoxFuture;
use indexmap::IndexMap;
use kite_conditions::{Condition, Expr};
use kite_instrument::FnoResolver;
use kite_market_data::{IndicatorKind, IndicatorSpec, MarketDataPipeline};
use smol_str::SmolStr;
use std::cell::{Cell, RefCell, RefMut};

/// One node of the graph: its parsed config plus everything derived from it
/// once, at construction time, so the per-tick traversal never re-parses JSON
/// or re-sorts variables (§4.5 "Cached dependency graph is built once").
#[derive(Debug)]
pub struct NodeInstance {
    pub id: String,
    pub config: NodeConfig,
    pub children: Vec<String>,
    /// EntrySignalNode/ReEntrySignalNode/ExitSignalNode's main condition tree.
    pub conditions: Option<Condition>,
    /// EntrySignalNode's optional distinct re-entry condition tree (§4.5).
    pub re_entry_conditions: Option<Condition>,
    pub variables: Vec<(String, Expr)>,
    pub runtime: RefCell<NodeRuntime>,
}

/// The strategy execution graph (C5, §4.5): the parsed, validated node
/// catalogue plus the per-session mutable state the traversal driver needs.
/// Node-level state lives in each [`NodeInstance::runtime`]; graph-level state
/// (tick epoch, execution-id counter, the same-tick entry/exit deferral guard,
/// the F&O resolver cache) lives here, all behind `Cell`/`RefCell` so the
/// entire traversal can run through shared `&self` references — required
/// because ReEntrySignalNode's logic reads and resets a *different* node's
/// runtime state (Design Notes §9).
#[derive(Debug)]
pub struct StrategyGraph {
    nodes: IndexMap<String, NodeInstance>,
    start_id: String,
    underlying_symbol: String,
    strategy_name: String,
    tick_epoch: Cell<u64>,
    exec_counter: Cell<u64>,
    just_opened_this_tick: RefCell<IndexMap<String, DateTime<Utc>>>,
    fno_resolver: RefCell<FnoResolver>,
    ended: Cell<bool>,
    square_off_done: Cell<bool>,
}

impl StrategyGraph {
    /// Validates and compiles a [`StrategySpec`] into a ready-to-run graph.
    /// `strategyOverview` nodes are dropped silently (§6); any other unknown
    /// node type, or an edge referencing a node id that doesn't exist after
    /// that drop, is a fatal [`GraphError`].
    pub fn from_spec(spec: &StrategySpec) -> Result<Self, GraphError> {
        let mut skipped = std::collections::HashSet::new();
        let mut configs: IndexMap<String, NodeConfig> = IndexMap::new();

        for node in &spec.nodes {
            match NodeConfig::parse(&node.node_type, &node.data)? {
                Some(config) => {
                    configs.insert(node.id.clone(), config);
                }
                None => {
                    skipped.insert(node.id.clone());
                }
            }
        }

        let mut children: IndexMap<String, Vec<String>> = configs.keys().map(|id| (id.clone(), Vec::new())).collect();
        for edge in &spec.edges {
            if skipped.contains(&edge.source) || skipped.contains(&edge.target) {
                continue;
            }
            if !configs.contains_key(&edge.target) {
                return Err(GraphError::UnknownNodeReference(edge.target.clone()));
            }
            let Some(bucket) = children.get_mut(&edge.source) else {
                return Err(GraphError::UnknownNodeReference(edge.source.clone()));
            };
            bucket.push(edge.target.clone());
        }

        let start_id = configs
            .iter()
            .find(|(_, config)| matches!(config, NodeConfig::Start(_)))
            .map(|(id, _)| id.clone())
            .ok_or_else(|| GraphError::MalformedSpec("strategy has no startNode".to_string()))?;

        let NodeConfig::Start(start_data) = configs.get(&start_id).expect("just found") else {
            unreachable!("start_id was matched against NodeConfig::Start above");
        };
        let underlying_symbol = start_data.trading_instrument_config.symbol.clone();
        let strategy_name = start_data
            .strategy_name
            .clone()
            .unwrap_or_else(|| underlying_symbol.clone());

        let mut nodes = IndexMap::new();
        for (id, config) in configs {
            let (conditions, re_entry_conditions, variables) = match &config {
                NodeConfig::EntrySignal(data) | NodeConfig::ReEntrySignal(data) | NodeConfig::ExitSignal(data) => {
                    let conditions = Some(Condition::try_from(&data.conditions)?);
                    let re_entry_conditions = data
                        .re_entry_conditions
                        .as_ref()
                        .map(Condition::try_from)
                        .transpose()?;
                    let vars = data
                        .variables
                        .iter()
                        .map(|v| Ok::<_, GraphError>((v.name.clone(), Expr::try_from(&v.expression)?)))
                        .collect::<Result<Vec<_>, _>>()?;
                    let variables = topo_sort_variables(&id, vars)?;
                    (conditions, re_entry_conditions, variables)
                }
                _ => (None, None, Vec::new()),
            };

            let instance = NodeInstance {
                id: id.clone(),
                config,
                children: children.remove(&id).unwrap_or_default(),
                conditions,
                re_entry_conditions,
                variables,
                runtime: RefCell::new(NodeRuntime::default()),
            };
            nodes.insert(id, instance);
        }

        Ok(Self {
            nodes,
            start_id,
            underlying_symbol,
            strategy_name,
            tick_epoch: Cell::new(0),
            exec_counter: Cell::new(0),
            just_opened_this_tick: RefCell::new(IndexMap::new()),
            fno_resolver: RefCell::new(FnoResolver::new()),
            ended: Cell::new(false),
            square_off_done: Cell::new(false),
        })
    }

    pub fn node(&self, id: &str) -> Option<&NodeInstance> {
        self.nodes.get(id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn children_of(&self, id: &str) -> &[String] {
        self.nodes.get(id).map(|n| n.children.as_slice()).unwrap_or_default()
    }

    pub fn underlying_symbol(&self) -> &str {
        &self.underlying_symbol
    }

    pub fn strategy_name(&self) -> &str {
        &self.strategy_name
    }

    pub fn tick_epoch(&self) -> u64 {
        self.tick_epoch.get()
    }

    pub fn next_execution_id(&self) -> String {
        let n = self.exec_counter.get();
        self.exec_counter.set(n + 1);
        format!("exec-{n}")
    }

    pub fn fno_resolver(&self) -> RefMut<'_, FnoResolver> {
        self.fno_resolver.borrow_mut()
    }

    pub fn has_ended(&self) -> bool {
        self.ended.get()
    }

    pub fn mark_ended(&self) {
        self.ended.set(true);
    }

    /// Idempotence guard for SquareOffNode (§4.5): the node may be visited more
    /// than once (multiple EntrySignalNode branches converging on it, or the
    /// strategy's own end-of-day path), but must only liquidate once.
    pub fn square_off_done(&self) -> bool {
        self.square_off_done.get()
    }

    pub fn mark_square_off_done(&self) {
        self.square_off_done.set(true);
    }

    /// Records that `position_id` was opened at `at` (§4.5 ExitNode: "defers if
    /// the position was opened on this very tick").
    pub fn mark_just_opened(&self, position_id: &str, at: DateTime<Utc>) {
        self.just_opened_this_tick.borrow_mut().insert(position_id.to_string(), at);
    }

    pub fn was_just_opened_this_tick(&self, position_id: &str, tick_time: DateTime<Utc>) -> bool {
        self.just_opened_this_tick
            .borrow()
            .get(position_id)
            .is_some_and(|opened_at| *opened_at == tick_time)
    }

    /// One-time symbol/timeframe/indicator registration (§4.3, §4.5 StartNode)
    /// against the shared market-data pipeline, invoked by the scheduler before
    /// the tick loop starts rather than on every tick.
    pub fn register_market_data(&self, pipeline: &mut MarketDataPipeline) {
        let Some(NodeConfig::Start(start)) = self.node(&self.start_id).map(|n| &n.config) else {
            return;
        };
        let symbol = start.trading_instrument_config.symbol.as_str();
        for timeframe in &start.trading_instrument_config.timeframes {
            pipeline.candles.register(symbol, timeframe.timeframe);
            for (key, indicator) in &timeframe.indicators {
                let Some(period) = indicator.period() else { continue };
                let kind = match indicator.indicator_name.to_lowercase().as_str() {
                    "sma" => IndicatorKind::Sma,
                    "ema" => IndicatorKind::Ema,
                    "rsi" => IndicatorKind::Rsi,
                    _ => continue,
                };
                pipeline.indicators.register(IndicatorSpec {
                    symbol: SmolStr::new(symbol),
                    timeframe_minutes: timeframe.timeframe,
                    key: key.clone(),
                    kind,
                    period,
                });
            }
        }
    }

    /// Runs one tick through the whole graph (§4.5 traversal algorithm): bumps
    /// the epoch guard, clears the same-tick deferral markers, and visits from
    /// `startNode`, descending into every child regardless of the node's own
    /// outcome this tick.
    pub async fn run_tick(&self, ctx: &mut TraversalContext<'_>) -> Result<Vec<ExecutionEvent>, GraphError> {
        self.tick_epoch.set(self.tick_epoch.get() + 1);
        self.just_opened_this_tick.borrow_mut().clear();

        let mut events = Vec::new();
        self.visit(&self.start_id, ctx, None, &mut events).await?;
        Ok(events)
    }

    /// Boxed because it recurses into its own children (§4.5 traversal
    /// algorithm step 4) and `place_order`/`get_order_status` along that path
    /// are `async fn`s — an unboxed `async fn` cannot call itself.
    fn visit<'a>(
        &'a self,
        node_id: &'a str,
        ctx: &'a mut TraversalContext<'_>,
        parent_execution_id: Option<&'a str>,
        events: &'a mut Vec<ExecutionEvent>,
    ) -> LocalBoxFuture<'a, Result<(), GraphError>> {
        Box::pin(async move {
            let node = self.node(node_id).expect("visit only called with known node ids");

            if node.runtime.borrow().last_visited_epoch == self.tick_epoch.get() {
                return Ok(());
            }
            node.runtime.borrow_mut().last_visited_epoch = self.tick_epoch.get();

            let outcome = dispatch(node, self, ctx, parent_execution_id).await?;

            // The execution id children should cite as their parent: only a
            // `LogicCompleted` outcome mints a new one for them to chain off
            // of. Otherwise children keep seeing whatever parent execution
            // they were already wired to — the node itself did nothing new
            // this tick, so it has nothing new to hand down.
            let child_parent_execution_id = match outcome {
                NodeOutcome::NotCompleted(data) => {
                    node.runtime.borrow_mut().last_evaluation = Some(data);
                    parent_execution_id.map(str::to_string)
                }
                NodeOutcome::Pending(data) => {
                    let (exec_id, parent) = {
                        let rt = node.runtime.borrow();
                        (rt.execution_id.clone().unwrap_or_else(|| self.next_execution_id()), rt.parent_execution_id.clone())
                    };
                    node.runtime.borrow_mut().last_evaluation = Some(data.clone());
                    events.push(ExecutionEvent {
                        execution_id: exec_id,
                        parent_execution_id: parent,
                        node_id: node_id.to_string(),
                        node_type: node.config.type_name(),
                        kind: EventKind::Pending,
                        diagnostic: data,
                        timestamp: ctx.tick_time,
                    });
                    parent_execution_id.map(str::to_string)
                }
                NodeOutcome::LogicCompleted(data) => {
                    let (exec_id, parent) = {
                        let rt = node.runtime.borrow();
                        (rt.execution_id.clone().unwrap_or_else(|| self.next_execution_id()), rt.parent_execution_id.clone())
                    };
                    node.runtime.borrow_mut().last_evaluation = Some(data.clone());
                    events.push(ExecutionEvent {
                        execution_id: exec_id.clone(),
                        parent_execution_id: parent,
                        node_id: node_id.to_string(),
                        node_type: node.config.type_name(),
                        kind: EventKind::LogicCompleted,
                        diagnostic: data,
                        timestamp: ctx.tick_time,
                    });
                    Some(exec_id)
                }
            };

            // Execute children regardless of this node's own outcome: an
            // inactive or still-pending node still sits in the middle of the
            // tree and must not block traversal from reaching what's below
            // it (e.g. an exit signal waiting behind an already-open entry).
            for child_id in self.children_of(node_id) {
                self.visit(child_id, ctx, child_parent_execution_id.as_deref(), events).await?;
            }
            Ok(())
        })
    }
}

async fn dispatch(
    node: &NodeInstance,
    graph: &StrategyGraph,
    ctx: &mut TraversalContext<'_>,
    parent_execution_id: Option<&str>,
) -> Result<NodeOutcome, GraphError> {
    match &node.config {
        NodeConfig::Start(_) => nodes::start_on_tick(node, graph, ctx, parent_execution_id).await,
        NodeConfig::EntrySignal(_) => nodes::entry_signal_on_tick(node, graph, ctx, parent_execution_id).await,
        NodeConfig::ReEntrySignal(_) => nodes::re_entry_signal_on_tick(node, graph, ctx, parent_execution_id).await,
        NodeConfig::Entry(_) => nodes::entry_on_tick(node, graph, ctx, parent_execution_id).await,
        NodeConfig::ExitSignal(_) => nodes::exit_signal_on_tick(node, graph, ctx, parent_execution_id).await,
        NodeConfig::Exit(_) => nodes::exit_on_tick(node, graph, ctx, parent_execution_id).await,
        NodeConfig::SquareOff(_) => nodes::square_off_on_tick(node, graph, ctx, parent_execution_id).await,
    }
}
