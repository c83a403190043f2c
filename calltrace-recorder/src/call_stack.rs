//! 呼び出しスタック

use calltrace_ir::MethodId;

/// 1スレッド分の呼び出しスタック（底から頂上の順）
#[derive(Debug, Clone, Default)]
pub struct CallStack {
    frames: Vec<MethodId>,
}

impl CallStack {
    /// 新しい呼び出しスタックを作成する
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// フレームを追加する
    pub fn push(&mut self, id: MethodId) {
        self.frames.push(id);
    }

    /// フレームを削除する
    pub fn pop(&mut self) -> Option<MethodId> {
        self.frames.pop()
    }

    /// スタックの最上位のフレームを取得する
    pub fn top(&self) -> Option<&MethodId> {
        self.frames.last()
    }

    /// 全てのフレームを取得する
    pub fn frames(&self) -> &[MethodId] {
        &self.frames
    }

    /// スタックが空かどうか
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// スタックの深さ
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}
