//! Rule/Condition/Action domain model and the pure condition evaluator.

pub mod condition;
pub mod model;
pub mod registry;

pub use condition::{ConditionEvaluator, ConditionLogEntry, EvaluationResult, StreamFacts};
pub use model::{
    Action, Condition, ConditionType, Connector, FindChannelBy, GroupIfExists, IfExists,
    OrphanAction, Rule, SetVariableMode, SortOrder,
};
pub use registry::TagRegistry;
