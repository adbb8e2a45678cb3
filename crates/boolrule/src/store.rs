//! 规则存储管理
//!
//! 使用 DashMap 提供线程安全的命名规则缓存，支持规则的加载、删除、批量操作和批量评估。

use crate::config::EngineConfig;
use crate::error::{Result, RuleError};
use crate::models::EvaluationContext;
use crate::rule::BoolRule;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// 规则存储
#[derive(Clone)]
pub struct RuleStore {
    /// 编译后的规则缓存
    rules: Arc<DashMap<String, Arc<BoolRule>>>,
    /// 新规则使用的引擎配置
    config: EngineConfig,
}

impl RuleStore {
    /// 创建新的规则存储
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// 使用指定配置创建规则存储
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            rules: Arc::new(DashMap::new()),
            config,
        }
    }

    /// 获取当前存储的规则数量
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 检查存储是否为空
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 加载规则，同名规则会被替换
    #[instrument(skip(self, query))]
    pub fn load(&self, name: &str, query: &str) -> Result<()> {
        let rule = BoolRule::with_config(query, &self.config)?;

        if self.rules.insert(name.to_string(), Arc::new(rule)).is_some() {
            info!("规则已替换: {}", name);
        } else {
            info!("规则已加载: {}", name);
        }
        Ok(())
    }

    /// 删除规则
    #[instrument(skip(self))]
    pub fn delete(&self, name: &str) -> Result<()> {
        if self.rules.remove(name).is_some() {
            info!("规则已删除: {}", name);
            Ok(())
        } else {
            warn!("删除不存在的规则: {}", name);
            Err(RuleError::RuleNotFound(name.to_string()))
        }
    }

    /// 获取规则
    pub fn get(&self, name: &str) -> Option<Arc<BoolRule>> {
        self.rules.get(name).map(|r| Arc::clone(r.value()))
    }

    /// 检查规则是否存在
    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// 获取所有规则名称（按字典序）
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rules.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    /// 批量加载规则，返回加载成功的规则名称
    #[instrument(skip(self, rules))]
    pub fn load_batch<I, N, Q>(&self, rules: I) -> Vec<String>
    where
        I: IntoIterator<Item = (N, Q)>,
        N: AsRef<str>,
        Q: AsRef<str>,
    {
        let mut loaded = Vec::new();
        let mut errors = Vec::new();

        for (name, query) in rules {
            let name = name.as_ref();
            match self.load(name, query.as_ref()) {
                Ok(()) => loaded.push(name.to_string()),
                Err(e) => errors.push((name.to_string(), e)),
            }
        }

        if !errors.is_empty() {
            warn!("批量加载部分失败: {:?}", errors);
        }

        info!("批量加载完成: {} 成功, {} 失败", loaded.len(), errors.len());
        loaded
    }

    /// 使用指定规则评估上下文
    pub fn evaluate(&self, name: &str, context: Option<&EvaluationContext>) -> Result<bool> {
        let rule = self
            .get(name)
            .ok_or_else(|| RuleError::RuleNotFound(name.to_string()))?;
        rule.test(context)
    }

    /// 评估所有规则，返回匹配的规则名称（按字典序）
    ///
    /// 缺少变量的规则视为不匹配；其他错误直接返回。
    #[instrument(skip(self, context))]
    pub fn evaluate_all(&self, context: Option<&EvaluationContext>) -> Result<Vec<String>> {
        let mut matched = Vec::new();

        for name in self.list_names() {
            let Some(rule) = self.get(&name) else {
                continue;
            };

            match rule.test(context) {
                Ok(true) => matched.push(name),
                Ok(false) => {}
                Err(e) if e.is_missing_variable() => {
                    debug!(rule = %name, error = %e, "规则缺少变量，视为不匹配");
                }
                Err(e) => {
                    warn!(rule = %name, error = %e, "规则评估失败");
                    return Err(e);
                }
            }
        }

        Ok(matched)
    }

    /// 清空所有规则
    #[instrument(skip(self))]
    pub fn clear(&self) {
        let count = self.rules.len();
        self.rules.clear();
        info!("已清空 {} 条规则", count);
    }

    /// 获取规则统计信息
    pub fn stats(&self) -> RuleStoreStats {
        let rules_count = self.rules.len();
        let mut compiled_count = 0;
        let mut total_fields = 0;

        for entry in self.rules.iter() {
            if let Some(compiled) = entry.value().compiled() {
                compiled_count += 1;
                total_fields += compiled.required_fields.len();
            }
        }

        RuleStoreStats {
            rules_count,
            compiled_count,
            total_fields,
            avg_fields_per_rule: if compiled_count > 0 {
                total_fields as f64 / compiled_count as f64
            } else {
                0.0
            },
        }
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new()
    }
}

/// 规则存储统计信息
#[derive(Debug, Clone)]
pub struct RuleStoreStats {
    /// 规则总数
    pub rules_count: usize,
    /// 已编译的规则数
    pub compiled_count: usize,
    /// 已编译规则引用的属性路径总数
    pub total_fields: usize,
    /// 平均每条已编译规则引用的属性路径数
    pub avg_fields_per_rule: f64,
}
