//! クラスロード時の変換フック

use calltrace_ir::ClassFile;
use std::path::Path;

/// クラスロード通知を受け取り、クラスを書き換えるトランスフォーマ
///
/// ランタイムはクラスを初めてロードするとき、登録順に全てのトランスフォーマを呼び出します。
/// 前のトランスフォーマが書き換えた結果が次のトランスフォーマに渡されます。
pub trait ClassFileTransformer: Send + Sync {
    /// クラスを変換する
    ///
    /// # Arguments
    /// * `class_name` - クラスのバイナリ名（`/` 区切り）
    /// * `origin` - クラスを定義したコード位置（クラスパスのエントリ）
    /// * `class` - 現在のクラス定義
    ///
    /// # Returns
    /// 書き換えたクラス。変更しない場合は `None`
    fn transform(&self, class_name: &str, origin: &Path, class: &ClassFile) -> Option<ClassFile>;
}
