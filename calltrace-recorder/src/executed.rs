//! 実行済みメソッド集合（縮退モード）

use calltrace_ir::MethodId;
use std::collections::HashSet;

/// 少なくとも一度実行されたメソッドの集合
#[derive(Debug, Clone, Default)]
pub struct ExecutedSet {
    methods: HashSet<MethodId>,
}

impl ExecutedSet {
    /// 空の集合を作成する
    pub fn new() -> Self {
        Self::default()
    }

    /// メソッドを追加する
    ///
    /// 新しく追加された場合はtrue
    pub fn insert(&mut self, id: &MethodId) -> bool {
        if self.methods.contains(id) {
            return false;
        }
        self.methods.insert(id.clone())
    }

    pub fn contains(&self, id: &MethodId) -> bool {
        self.methods.contains(id)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// 集合を整列済みのリストとして取得する
    pub fn to_sorted_vec(&self) -> Vec<MethodId> {
        let mut methods: Vec<MethodId> = self.methods.iter().cloned().collect();
        methods.sort();
        methods
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_deduplicates() {
        let mut set = ExecutedSet::new();
        assert!(set.insert(&MethodId::from("x")));
        assert!(set.insert(&MethodId::from("y")));
        assert!(!set.insert(&MethodId::from("x")));
        assert_eq!(set.len(), 2);
        assert_eq!(set.to_sorted_vec(), vec![MethodId::from("x"), MethodId::from("y")]);
    }
}
