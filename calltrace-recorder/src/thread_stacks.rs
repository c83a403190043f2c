//! スレッドごとの呼び出しスタック管理
//!
//! スタックはスレッドローカル領域に置かれ、所有するレコーダーのIDで区別されます。
//! 各スタックはそのスレッドからしか触れないため、同期は不要です。

use crate::CallStack;
use calltrace_ir::MethodId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static STACKS: RefCell<HashMap<u64, CallStack>> = RefCell::new(HashMap::new());
}

/// スレッドごとの呼び出しスタックへのハンドル
///
/// ハンドルごとに独立したスタック群を持つため、
/// 同じスレッドで複数のレコーダーを同時に使っても干渉しません。
#[derive(Debug)]
pub struct ThreadStacks {
    owner: u64,
}

impl ThreadStacks {
    /// 新しいスタック群を作成する
    pub fn new() -> Self {
        Self {
            owner: NEXT_OWNER.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// 呼び出し元スレッドのスタックに対して処理を行う（なければ作成）
    ///
    /// スレッド終了処理中でスレッドローカル領域が使えない場合は `None` を返します。
    pub fn with_current<R>(&self, f: impl FnOnce(&mut CallStack) -> R) -> Option<R> {
        STACKS
            .try_with(|stacks| {
                let mut stacks = stacks.borrow_mut();
                f(stacks.entry(self.owner).or_default())
            })
            .ok()
    }

    /// 呼び出し元スレッドのスタックからポップする
    ///
    /// スタックが空になったら破棄します。空のスタックに対しては何もしません。
    pub fn pop_current(&self) -> Option<MethodId> {
        STACKS
            .try_with(|stacks| {
                let mut stacks = stacks.borrow_mut();
                let stack = stacks.get_mut(&self.owner)?;
                let top = stack.pop();
                if stack.is_empty() {
                    stacks.remove(&self.owner);
                }
                top
            })
            .ok()
            .flatten()
    }

    /// 呼び出し元スレッドのスタックの内容を取得する（底から頂上の順）
    pub fn current_frames(&self) -> Vec<MethodId> {
        STACKS
            .try_with(|stacks| {
                stacks
                    .borrow()
                    .get(&self.owner)
                    .map(|s| s.frames().to_vec())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// 呼び出し元スレッドのスタックを破棄する
    pub fn discard_current(&self) {
        let _ = STACKS.try_with(|stacks| {
            stacks.borrow_mut().remove(&self.owner);
        });
    }
}

impl Default for ThreadStacks {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ThreadStacks {
    fn drop(&mut self) {
        self.discard_current();
    }
}
