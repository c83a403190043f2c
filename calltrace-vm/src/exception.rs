//! ランタイム例外

use std::fmt;

/// クラスが見つからない
pub const NO_CLASS_DEF_FOUND: &str = "NoClassDefFoundError";

/// メンバが見つからない
pub const NO_SUCH_METHOD: &str = "NoSuchMethodError";

/// 本体を持たないメンバを呼び出した
pub const ABSTRACT_METHOD: &str = "AbstractMethodError";

/// 呼び出しが深すぎる
pub const STACK_OVERFLOW: &str = "StackOverflowError";

/// 捕捉中の例外が無いのに再送出した
pub const ILLEGAL_STATE: &str = "IllegalStateException";

/// 送出された例外
///
/// プログラムが `throw` した例外と、ランタイムが検出した異常の両方を表します。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exception {
    /// 例外型の名前
    pub type_name: String,
    /// 補足メッセージ（空でもよい）
    pub message: String,
}

impl Exception {
    /// 例外を作成する
    pub fn new(type_name: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.to_string(),
        }
    }

    /// メッセージなしの例外を作成する
    pub fn thrown(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: String::new(),
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.type_name)
        } else {
            write!(f, "{}: {}", self.type_name, self.message)
        }
    }
}

impl std::error::Error for Exception {}
