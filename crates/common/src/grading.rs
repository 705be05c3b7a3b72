//! 课程成绩判定

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// 课程的成绩分档：等级名 → 最低分数（0..1）
pub type GradeCutoffs = BTreeMap<String, f64>;

/// 默认分档，课程未配置时使用
pub fn default_cutoffs() -> GradeCutoffs {
    BTreeMap::from([("Pass".to_string(), 0.5)])
}

/// 从课程的 JSON 配置解析分档，忽略非数字条目
pub fn cutoffs_from_json(value: &JsonValue) -> GradeCutoffs {
    let parsed: GradeCutoffs = value
        .as_object()
        .map(|map| {
            map.iter()
                .filter_map(|(label, cutoff)| cutoff.as_f64().map(|c| (label.clone(), c)))
                .collect()
        })
        .unwrap_or_default();
    if parsed.is_empty() {
        default_cutoffs()
    } else {
        parsed
    }
}

/// 返回不高于 `percent` 的最高分档名称
pub fn letter_grade(cutoffs: &GradeCutoffs, percent: f64) -> Option<String> {
    cutoffs
        .iter()
        .filter(|(_, cutoff)| percent >= **cutoff)
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(label, _)| label.clone())
}

/// 最低的正分数线；`0.0` 分档（如 `F`）不算通过线
pub fn passing_cutoff(cutoffs: &GradeCutoffs) -> Option<f64> {
    cutoffs
        .values()
        .copied()
        .filter(|cutoff| *cutoff > 0.0)
        .min_by(f64::total_cmp)
}

/// 是否通过课程；没有成绩记录或没有正分数线视为未通过
pub fn is_passing(cutoffs: &GradeCutoffs, percent: Option<f64>) -> bool {
    match (percent, passing_cutoff(cutoffs)) {
        (Some(p), Some(cutoff)) => p >= cutoff,
        _ => false,
    }
}
