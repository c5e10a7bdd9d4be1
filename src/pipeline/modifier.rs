// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 flowspec contributors

//! Execution modifiers
//!
//! A step runs once, runs only when a condition holds, or runs once per loop
//! item. Conditions and loop sources that reference another step's outputs
//! make the step depend on that producer.

use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::ops::Range;
use std::sync::OnceLock;

use crate::errors::{FlowspecError, FlowspecResult};
use crate::pipeline::variable::{
    IoDirection, Origin, Owner, VariableCategory, VariableHandle, VariableRef,
};

/// Loop parallelism when none is given
pub const DEFAULT_PARALLELISM: usize = 5;

/// Comparison operator in a condition expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Ge,
    Le,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Le => "<=",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            "<" => Some(Self::Lt),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            "<=" => Some(Self::Le),
            _ => None,
        }
    }
}

/// One side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Variable {
        reference: VariableRef,
        origin: Origin,
    },
    Literal(Value),
}

impl Operand {
    fn render(&self) -> String {
        match self {
            Self::Variable { reference, .. } => reference.enclosed(),
            Self::Literal(Value::String(s)) => s.clone(),
            Self::Literal(other) => other.to_string(),
        }
    }

    fn parse(text: &str) -> Self {
        if let Some(reference) = VariableRef::parse(text) {
            return Self::Variable {
                reference,
                origin: Origin::default(),
            };
        }
        match serde_json::from_str::<Value>(text) {
            Ok(value) if !value.is_string() => Self::Literal(value),
            _ => Self::Literal(Value::String(text.to_string())),
        }
    }

    fn producer(&self) -> Option<(&str, Origin)> {
        match self {
            Self::Variable { reference, origin } => reference.step_name().map(|s| (s, *origin)),
            Self::Literal(_) => None,
        }
    }
}

impl From<&VariableHandle> for Operand {
    fn from(handle: &VariableHandle) -> Self {
        Self::Variable {
            reference: handle.reference().clone(),
            origin: handle.origin(),
        }
    }
}

impl From<VariableHandle> for Operand {
    fn from(handle: VariableHandle) -> Self {
        Self::from(&handle)
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<&str> for Operand {
    fn from(value: &str) -> Self {
        Self::Literal(Value::String(value.to_string()))
    }
}

impl From<String> for Operand {
    fn from(value: String) -> Self {
        Self::Literal(Value::String(value))
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Self::Literal(Value::from(value))
    }
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Self::Literal(Value::from(value))
    }
}

impl From<bool> for Operand {
    fn from(value: bool) -> Self {
        Self::Literal(Value::Bool(value))
    }
}

/// `left <op> right`
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionExpr {
    pub left: Operand,
    pub op: CompareOp,
    pub right: Operand,
}

impl ConditionExpr {
    pub fn new(left: impl Into<Operand>, op: CompareOp, right: impl Into<Operand>) -> Self {
        Self {
            left: left.into(),
            op,
            right: right.into(),
        }
    }

    /// Rendering used in a step's `when` field
    pub fn to_expr(&self) -> String {
        format!("{} {} {}", self.left.render(), self.op.as_str(), self.right.render())
    }

    /// Steps whose outputs the expression reads
    pub fn depends_steps(&self) -> Vec<(&str, Origin)> {
        let mut steps = Vec::new();
        for operand in [&self.left, &self.right] {
            if let Some(producer) = operand.producer() {
                if !steps.iter().any(|(name, _)| *name == producer.0) {
                    steps.push(producer);
                }
            }
        }
        steps
    }

    /// Variable references on either side, with where each handle came from
    pub fn references(&self) -> Vec<(&VariableRef, Origin)> {
        [&self.left, &self.right]
            .into_iter()
            .filter_map(|operand| match operand {
                Operand::Variable { reference, origin } => Some((reference, *origin)),
                Operand::Literal(_) => None,
            })
            .collect()
    }
}

#[allow(clippy::should_implement_trait)]
impl VariableHandle {
    pub fn eq(&self, rhs: impl Into<Operand>) -> ConditionExpr {
        ConditionExpr::new(self, CompareOp::Eq, rhs)
    }

    pub fn ne(&self, rhs: impl Into<Operand>) -> ConditionExpr {
        ConditionExpr::new(self, CompareOp::Ne, rhs)
    }

    pub fn lt(&self, rhs: impl Into<Operand>) -> ConditionExpr {
        ConditionExpr::new(self, CompareOp::Lt, rhs)
    }

    pub fn gt(&self, rhs: impl Into<Operand>) -> ConditionExpr {
        ConditionExpr::new(self, CompareOp::Gt, rhs)
    }

    pub fn ge(&self, rhs: impl Into<Operand>) -> ConditionExpr {
        ConditionExpr::new(self, CompareOp::Ge, rhs)
    }

    pub fn le(&self, rhs: impl Into<Operand>) -> ConditionExpr {
        ConditionExpr::new(self, CompareOp::Le, rhs)
    }
}

fn condition_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?P<left>\{\{[^{}]+\}\})\s*(?P<op>==|!=|>=|<=|<|>)\s*(?P<right>.+?)\s*$")
            .expect("condition pattern is valid")
    })
}

/// Guard on a conditional step
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Expr(ConditionExpr),
    /// Passed through verbatim; derives no dependencies
    Raw(String),
}

impl Condition {
    pub fn to_expr(&self) -> String {
        match self {
            Self::Expr(expr) => expr.to_expr(),
            Self::Raw(text) => text.clone(),
        }
    }

    /// Recover a structured expression when the text renders back identically
    pub fn parse(text: &str) -> Self {
        let Some(caps) = condition_re().captures(text) else {
            return Self::Raw(text.to_string());
        };
        let (Some(op), Some(left)) = (
            CompareOp::parse(&caps["op"]),
            VariableRef::parse(&caps["left"]),
        ) else {
            return Self::Raw(text.to_string());
        };

        let expr = ConditionExpr {
            left: Operand::Variable {
                reference: left,
                origin: Origin::default(),
            },
            op,
            right: Operand::parse(&caps["right"]),
        };
        if expr.to_expr() == text {
            Self::Expr(expr)
        } else {
            Self::Raw(text.to_string())
        }
    }

    pub fn depends_steps(&self) -> Vec<(&str, Origin)> {
        match self {
            Self::Expr(expr) => expr.depends_steps(),
            Self::Raw(_) => Vec::new(),
        }
    }

    pub fn references(&self) -> Vec<(&VariableRef, Origin)> {
        match self {
            Self::Expr(expr) => expr.references(),
            Self::Raw(_) => Vec::new(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_expr())
    }
}

impl From<ConditionExpr> for Condition {
    fn from(expr: ConditionExpr) -> Self {
        Self::Expr(expr)
    }
}

impl From<&str> for Condition {
    fn from(text: &str) -> Self {
        Self::Raw(text.to_string())
    }
}

impl From<String> for Condition {
    fn from(text: String) -> Self {
        Self::Raw(text)
    }
}

/// What a loop step iterates over
#[derive(Debug, Clone, PartialEq)]
pub enum LoopItems {
    /// Half-open integer range
    Sequence { start: i64, end: i64 },
    /// Literal items, scalars or records
    Items(Vec<Value>),
    /// Parameter resolved at run time
    Param {
        reference: VariableRef,
        origin: Origin,
    },
}

impl LoopItems {
    /// Iterate over a parameter produced upstream or given to the pipeline
    pub fn param(handle: &VariableHandle) -> FlowspecResult<Self> {
        let reference = handle.reference();
        let readable = match reference.owner {
            Owner::Step(_) => reference.direction == IoDirection::Outputs,
            Owner::Pipeline => reference.direction == IoDirection::Inputs,
        };
        if reference.category != VariableCategory::Parameters || !readable {
            return Err(FlowspecError::invalid_assignment(
                "withParam",
                reference.fullname(),
                "loop items must come from a step output or pipeline input parameter",
            ));
        }
        Ok(Self::Param {
            reference: reference.clone(),
            origin: handle.origin(),
        })
    }

    pub fn producer(&self) -> Option<(&str, Origin)> {
        match self {
            Self::Param { reference, origin } => reference.step_name().map(|s| (s, *origin)),
            _ => None,
        }
    }
}

impl From<Range<i64>> for LoopItems {
    fn from(range: Range<i64>) -> Self {
        Self::Sequence {
            start: range.start,
            end: range.end,
        }
    }
}

impl From<Vec<Value>> for LoopItems {
    fn from(items: Vec<Value>) -> Self {
        Self::Items(items)
    }
}

/// How a step executes
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ExecutionModifier {
    #[default]
    None,
    Condition(Condition),
    Loop { items: LoopItems, parallelism: usize },
}

impl ExecutionModifier {
    pub fn condition(condition: impl Into<Condition>) -> Self {
        Self::Condition(condition.into())
    }

    pub fn for_each(items: impl Into<LoopItems>, parallelism: Option<usize>) -> FlowspecResult<Self> {
        let parallelism = parallelism.unwrap_or(DEFAULT_PARALLELISM);
        if parallelism == 0 {
            return Err(FlowspecError::invalid_value(
                "parallelism",
                "loop parallelism must be at least 1",
            ));
        }
        Ok(Self::Loop {
            items: items.into(),
            parallelism,
        })
    }

    /// Steps the modifier reads from
    pub fn depends_steps(&self) -> Vec<(&str, Origin)> {
        match self {
            Self::None => Vec::new(),
            Self::Condition(condition) => condition.depends_steps(),
            Self::Loop { items, .. } => items.producer().into_iter().collect(),
        }
    }

    /// Variable references the modifier reads, with where each handle came from
    pub fn references(&self) -> Vec<(&VariableRef, Origin)> {
        match self {
            Self::None => Vec::new(),
            Self::Condition(condition) => condition.references(),
            Self::Loop {
                items: LoopItems::Param { reference, origin },
                ..
            } => vec![(reference, *origin)],
            Self::Loop { .. } => Vec::new(),
        }
    }
}
