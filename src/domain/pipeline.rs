// ==========================================
// 销售管道 CRM - 管道与阶段模型
// ==========================================
// 对齐: pipelines / stages 表
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 阶段默认颜色
pub const DEFAULT_STAGE_COLOR: &str = "#6b7280";

// ==========================================
// Pipeline - 销售管道
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

// ==========================================
// Stage - 管道阶段（看板列）
// ==========================================
// 线索任一时刻只属于一个阶段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub id: String,
    pub pipeline_id: String,
    pub name: String,
    pub color: String,
    pub order_index: i64, // 阶段在管道内的顺序
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStage {
    pub pipeline_id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub order_index: Option<i64>,
}
