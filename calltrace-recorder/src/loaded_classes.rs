//! ロード済みクラスログ

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
struct LogInner {
    seen: HashSet<String>,
    order: Vec<String>,
}

/// 計装された外側クラス名の重複なしリスト（初出順）
#[derive(Debug, Default)]
pub struct LoadedClassLog {
    inner: Mutex<LogInner>,
}

impl LoadedClassLog {
    /// 空のログを作成する
    pub fn new() -> Self {
        Self::default()
    }

    /// 外側クラス名を記録する
    ///
    /// 初めて記録された場合はtrue
    pub fn record(&self, outer_class: &str) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.seen.contains(outer_class) {
            return false;
        }
        inner.seen.insert(outer_class.to_string());
        inner.order.push(outer_class.to_string());
        true
    }

    /// 記録されたクラス名を初出順に取得する
    pub fn entries(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_seen_order() {
        let log = LoadedClassLog::new();
        assert!(log.record("com.example.B"));
        assert!(log.record("com.example.A"));
        assert!(!log.record("com.example.B"));
        assert_eq!(log.entries(), vec!["com.example.B", "com.example.A"]);
        assert_eq!(log.len(), 2);
    }
}
