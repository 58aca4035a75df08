use kite_conditions::{ArithOp, CompareOp, Condition, Expr, Logical};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::GraphError;

/// The strategy JSON document (§6): nodes plus directed edges.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategySpec {
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<EdgeSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EdgeSpec {
    pub source: String,
    pub target: String,
}

// --- expression / condition JSON shapes -----------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExprSpec {
    Number {
        value: f64,
    },
    Text {
        value: String,
    },
    Ltp {
        symbol: String,
    },
    UnderlyingLtp,
    CandleField {
        symbol: String,
        timeframe: u32,
        field: String,
        #[serde(default)]
        offset: i64,
    },
    Indicator {
        symbol: String,
        timeframe: u32,
        key: String,
        #[serde(default)]
        offset: i64,
    },
    NodeVariable {
        node_id: String,
        name: String,
    },
    BinaryOp {
        left: Box<ExprSpec>,
        op: String,
        right: Box<ExprSpec>,
    },
}

impl TryFrom<&ExprSpec> for Expr {
    type Error = GraphError;

    fn try_from(spec: &ExprSpec) -> Result<Self, Self::Error> {
        Ok(match spec {
            ExprSpec::Number { value } => Expr::Number(*value),
            ExprSpec::Text { value } => Expr::Text(value.clone()),
            ExprSpec::Ltp { symbol } => Expr::Ltp { symbol: symbol.clone() },
            ExprSpec::UnderlyingLtp => Expr::UnderlyingLtp,
            ExprSpec::CandleField {
                symbol,
                timeframe,
                field,
                offset,
            } => Expr::CandleField {
                symbol: symbol.clone(),
                timeframe_minutes: *timeframe,
                field: parse_candle_field(field)?,
                offset: *offset,
            },
            ExprSpec::Indicator {
                symbol,
                timeframe,
                key,
                offset,
            } => Expr::Indicator {
                symbol: symbol.clone(),
                timeframe_minutes: *timeframe,
                key: key.clone(),
                offset: *offset,
            },
            ExprSpec::NodeVariable { node_id, name } => Expr::NodeVariable {
                node_id: node_id.clone(),
                name: name.clone(),
            },
            ExprSpec::BinaryOp { left, op, right } => Expr::binary(
                Expr::try_from(left.as_ref())?,
                parse_arith_op(op)?,
                Expr::try_from(right.as_ref())?,
            ),
        })
    }
}

fn parse_candle_field(field: &str) -> Result<kite_conditions::CandleField, GraphError> {
    use kite_conditions::CandleField::*;
    Ok(match field {
        "open" => Open,
        "high" => High,
        "low" => Low,
        "close" => Close,
        "volume" => Volume,
        other => return Err(GraphError::MalformedSpec(format!("unknown candle field `{other}`"))),
    })
}

fn parse_arith_op(op: &str) -> Result<ArithOp, GraphError> {
    Ok(match op {
        "+" => ArithOp::Add,
        "-" => ArithOp::Sub,
        "*" => ArithOp::Mul,
        "/" => ArithOp::Div,
        "%" => ArithOp::Mod,
        other => return Err(GraphError::MalformedSpec(format!("unknown arithmetic operator `{other}`"))),
    })
}

fn parse_compare_op(op: &str) -> Result<CompareOp, GraphError> {
    Ok(match op {
        ">" => CompareOp::Gt,
        "<" => CompareOp::Lt,
        ">=" => CompareOp::Ge,
        "<=" => CompareOp::Le,
        "==" => CompareOp::Eq,
        "!=" => CompareOp::Ne,
        "crosses_above" => CompareOp::CrossesAbove,
        "crosses_below" => CompareOp::CrossesBelow,
        other => return Err(GraphError::MalformedSpec(format!("unknown comparison operator `{other}`"))),
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionSpec {
    Leaf {
        lhs: ExprSpec,
        op: String,
        rhs: ExprSpec,
    },
    Group {
        logical: String,
        children: Vec<ConditionSpec>,
    },
}

impl TryFrom<&ConditionSpec> for Condition {
    type Error = GraphError;

    fn try_from(spec: &ConditionSpec) -> Result<Self, Self::Error> {
        Ok(match spec {
            ConditionSpec::Leaf { lhs, op, rhs } => {
                Condition::leaf(Expr::try_from(lhs)?, parse_compare_op(op)?, Expr::try_from(rhs)?)
            }
            ConditionSpec::Group { logical, children } => {
                let logical = match logical.to_uppercase().as_str() {
                    "AND" => Logical::And,
                    "OR" => Logical::Or,
                    other => return Err(GraphError::MalformedSpec(format!("unknown logical combinator `{other}`"))),
                };
                let children = children
                    .iter()
                    .map(Condition::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                Condition::group(logical, children)
            }
        })
    }
}

// --- per-node data shapes (§6) ---------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorConfigSpec {
    pub indicator_name: String,
    #[serde(default)]
    pub length: Option<usize>,
    #[serde(default)]
    pub period: Option<usize>,
    #[serde(default)]
    pub price_field: Option<String>,
}

impl IndicatorConfigSpec {
    pub fn period(&self) -> Option<usize> {
        self.period.or(self.length)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeframeConfigSpec {
    pub timeframe: u32,
    #[serde(default)]
    pub indicators: indexmap::IndexMap<String, IndicatorConfigSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingInstrumentConfigSpec {
    pub symbol: String,
    #[serde(default)]
    pub timeframes: Vec<TimeframeConfigSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingInstrumentRefSpec {
    #[serde(rename = "type")]
    pub instrument_type: String,
    #[serde(default)]
    pub underlying_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBasedExitSpec {
    pub enabled: bool,
    pub exit_time: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceBasedExitSpec {
    pub enabled: bool,
    #[serde(default)]
    pub target_pnl: Option<f64>,
    #[serde(default)]
    pub stop_loss_pnl: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndConditionsSpec {
    #[serde(default)]
    pub immediate_exit: Option<bool>,
    #[serde(default)]
    pub time_based_exit: Option<TimeBasedExitSpec>,
    #[serde(default)]
    pub performance_based_exit: Option<PerformanceBasedExitSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartNodeData {
    #[serde(default)]
    pub label: Option<String>,
    pub trading_instrument_config: TradingInstrumentConfigSpec,
    pub trading_instrument: TradingInstrumentRefSpec,
    #[serde(default)]
    pub end_conditions: EndConditionsSpec,
    #[serde(default)]
    pub strategy_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableSpec {
    pub name: String,
    pub expression: ExprSpec,
    #[serde(default)]
    pub expression_preview: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalNodeData {
    #[serde(default)]
    pub label: Option<String>,
    pub conditions: ConditionSpec,
    #[serde(default)]
    pub re_entry_conditions: Option<ConditionSpec>,
    #[serde(default)]
    pub variables: Vec<VariableSpec>,
    /// Generalization (SPEC_FULL): explicit binding to the position this signal
    /// gates, rather than inferring it by walking the subtree to the nearest
    /// Entry/Exit node. Falls back to that subtree walk when absent.
    #[serde(default)]
    pub target_position_vpi: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionDetailsSpec {
    pub expiry: String,
    pub strike_type: String,
    pub option_type: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPositionSpec {
    pub id: String,
    pub vpi: String,
    pub quantity: Decimal,
    pub multiplier: Decimal,
    pub position_type: String,
    #[serde(default)]
    pub order_type: Option<String>,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub option_details: Option<OptionDetailsSpec>,
    #[serde(default)]
    pub max_entries: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryNodeData {
    #[serde(default)]
    pub label: Option<String>,
    pub positions: Vec<EntryPositionSpec>,
    pub instrument: String,
    #[serde(default)]
    pub action_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitConfigSpec {
    pub target_position_vpi: String,
    #[serde(default)]
    pub order_type: Option<String>,
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub specific_quantity: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitNodeData {
    #[serde(default)]
    pub label: Option<String>,
    pub exit_config: ExitConfigSpec,
    #[serde(default)]
    pub re_entry_config: Option<serde_json::Value>,
    #[serde(default)]
    pub post_execution_config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SquareOffNodeData {
    #[serde(default)]
    pub label: Option<String>,
}

/// Parsed, type-specific configuration for one node (Design Notes §9: a tagged
/// variant rather than class inheritance). `StrategyOverview` is recognised but
/// carries no behaviour — it is UI-only and skipped during graph construction.
#[derive(Debug, Clone)]
pub enum NodeConfig {
    Start(StartNodeData),
    EntrySignal(SignalNodeData),
    ReEntrySignal(SignalNodeData),
    Entry(EntryNodeData),
    ExitSignal(SignalNodeData),
    Exit(ExitNodeData),
    SquareOff(SquareOffNodeData),
}

impl NodeConfig {
    pub fn parse(node_type: &str, data: &serde_json::Value) -> Result<Option<Self>, GraphError> {
        let parse_err = |e: serde_json::Error| GraphError::MalformedSpec(e.to_string());
        Ok(Some(match node_type {
            "startNode" => NodeConfig::Start(serde_json::from_value(data.clone()).map_err(parse_err)?),
            "entrySignalNode" => NodeConfig::EntrySignal(serde_json::from_value(data.clone()).map_err(parse_err)?),
            "reEntrySignalNode" => {
                NodeConfig::ReEntrySignal(serde_json::from_value(data.clone()).map_err(parse_err)?)
            }
            "entryNode" => NodeConfig::Entry(serde_json::from_value(data.clone()).map_err(parse_err)?),
            "exitSignalNode" => NodeConfig::ExitSignal(serde_json::from_value(data.clone()).map_err(parse_err)?),
            "exitNode" => NodeConfig::Exit(serde_json::from_value(data.clone()).map_err(parse_err)?),
            "squareOffNode" => NodeConfig::SquareOff(serde_json::from_value(data.clone()).map_err(parse_err)?),
            "strategyOverview" => return Ok(None),
            other => return Err(GraphError::UnknownNodeType(other.to_string())),
        }))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            NodeConfig::Start(_) => "startNode",
            NodeConfig::EntrySignal(_) => "entrySignalNode",
            NodeConfig::ReEntrySignal(_) => "reEntrySignalNode",
            NodeConfig::Entry(_) => "entryNode",
            NodeConfig::ExitSignal(_) => "exitSignalNode",
            NodeConfig::Exit(_) => "exitNode",
            NodeConfig::SquareOff(_) => "squareOffNode",
        }
    }
}
