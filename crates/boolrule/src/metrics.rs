//! 规则引擎指标
//!
//! 通过 `metrics` 门面记录，导出器由宿主应用安装；未安装时记录为空操作。

/// 注册指标描述
pub fn describe_metrics() {
    metrics::describe_counter!("rule_compilations_total", "Total number of rule compilations");
    metrics::describe_counter!("rule_evaluations_total", "Total number of rule evaluations");
    metrics::describe_histogram!(
        "rule_evaluation_duration_seconds",
        "Rule evaluation duration in seconds"
    );
}

/// 记录规则编译
#[inline]
pub fn record_compilation(success: bool) {
    metrics::counter!(
        "rule_compilations_total",
        "status" => if success { "ok" } else { "error" }
    )
    .increment(1);
}

/// 记录规则评估
///
/// `result` 取值：`matched` / `not_matched` / `error`
#[inline]
pub fn record_evaluation(result: &'static str, duration_secs: f64) {
    metrics::counter!("rule_evaluations_total", "result" => result).increment(1);
    metrics::histogram!("rule_evaluation_duration_seconds", "result" => result)
        .record(duration_secs);
}
