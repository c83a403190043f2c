//! フック挿入
//!
//! メンバ本体にトレースフックを挿入する機能を提供します。
//! 記録モードごとに挿入方法が異なります。

use crate::exits::{find_exit_points, validate};
use crate::TransformError;
use calltrace_ir::{Body, Handler, Hook, Instr, MethodId};
use calltrace_recorder::RecordMode;

/// メンバ本体へのフック挿入
pub trait HookInjector: Send + Sync {
    /// 本体にフックを挿入し、挿入したフック数を返す
    ///
    /// エラー時は本体を変更しません。
    fn inject(&self, body: &mut Body, id: &MethodId) -> Result<usize, TransformError>;
}

/// 進入フックと脱出フックを挿入する（グラフモード）
///
/// 進入フックを先頭に置き、各リターンの直前に脱出フックを置きます。
/// 元の本体全体を覆う全捕捉ハンドラを末尾に追加し、
/// 例外による巻き戻しでも脱出フックを実行してから再送出します。
#[derive(Debug, Default, Clone, Copy)]
pub struct EntryExitInjector;

impl HookInjector for EntryExitInjector {
    fn inject(&self, body: &mut Body, id: &MethodId) -> Result<usize, TransformError> {
        validate(body, id.as_str())?;

        let exits = find_exit_points(body);
        for &pc in exits.iter().rev() {
            body.insert(pc, Instr::Hook(Hook::Exit));
        }
        body.prepend(Instr::Hook(Hook::Enter(id.clone())));

        // 既存のハンドラより後ろに置き、内側の捕捉を優先させる
        let end = body.len();
        body.handlers.push(Handler {
            start: 1,
            end,
            target: end,
            catch: None,
        });
        body.code.push(Instr::Hook(Hook::Exit));
        body.code.push(Instr::Rethrow);

        Ok(exits.len() + 2)
    }
}

/// 進入時の実行点フックだけを挿入する（縮退モード）
#[derive(Debug, Default, Clone, Copy)]
pub struct EntryPointInjector;

impl HookInjector for EntryPointInjector {
    fn inject(&self, body: &mut Body, id: &MethodId) -> Result<usize, TransformError> {
        validate(body, id.as_str())?;
        body.prepend(Instr::Hook(Hook::Point(id.clone())));
        Ok(1)
    }
}

/// 記録モードに対応するインジェクタを取得する
pub fn injector_for(mode: RecordMode) -> Box<dyn HookInjector> {
    match mode {
        RecordMode::Graph => Box::new(EntryExitInjector),
        RecordMode::Points => Box::new(EntryPointInjector),
    }
}
