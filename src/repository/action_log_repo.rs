// ==========================================
// 专家评审阶段管理系统 - 操作日志数据仓储
// ==========================================
// 对齐: action_log 表
// 红线: 每一次成功的写操作都应留痕
// ==========================================

mod core;
mod queries;

#[cfg(test)]
mod tests;

pub use self::core::ActionLogRepository;
pub use self::queries::LogTarget;
