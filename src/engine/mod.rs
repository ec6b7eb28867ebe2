// ==========================================
// 藏书编目系统 - 引擎层
// ==========================================
// 职责: 实现尺寸解析、分配与校验的业务规则
// 红线: 业务失败必须输出可展示的原因,不吞错
// ==========================================

pub mod allocation;
pub mod code_parser;
pub mod fallback;
pub mod size_rule;
pub mod size_rule_core;
pub mod validation;

// 重导出核心引擎
pub use allocation::{
    AllocationEngine, AllocationError, AllocationResult, AssignmentOutcome, PreviewOutcome,
};
pub use code_parser::{parse_code, ParsedCode};
pub use fallback::alternate_series;
pub use size_rule::{ResolvedSeries, SizeRuleResolver};
pub use size_rule_core::SizeRuleCore;
pub use validation::{ValidationGate, ValidationOutcome};
