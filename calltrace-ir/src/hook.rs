//! トレースフック

use crate::MethodId;

/// メンバ本体に挿入されるフック呼び出し
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hook {
    /// メンバへの進入
    Enter(MethodId),
    /// メンバからの脱出（正常リターン・例外巻き戻しの両方）
    Exit,
    /// 実行されたことだけを記録する
    Point(MethodId),
}

/// フック命令の受け取り手
///
/// ランタイムはフック命令を実行するたびに、インストールされたシンクへ通知します。
/// 実装はアプリケーションの全スレッドから同時に呼ばれ、失敗してはいけません。
pub trait HookSink: Send + Sync {
    /// メンバ進入を記録する
    fn enter(&self, id: &MethodId);

    /// メンバ脱出を記録する
    fn exit(&self);

    /// 実行点を記録する
    fn point(&self, id: &MethodId);

    /// フック命令を対応するメソッドへ振り分ける
    fn dispatch(&self, hook: &Hook) {
        match hook {
            Hook::Enter(id) => self.enter(id),
            Hook::Exit => self.exit(),
            Hook::Point(id) => self.point(id),
        }
    }
}
