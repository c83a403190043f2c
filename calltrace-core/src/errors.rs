//! 計装エラー

use thiserror::Error;

/// クラス変換中のエラー
///
/// いずれもクラス単位で回復され、そのクラスは変更されずにロードされます。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("member {member} has an empty body")]
    EmptyBody { member: String },

    #[error("member {member} can run past the end of its body")]
    FallsOffEnd { member: String },

    #[error("member {member} has a handler outside its body ({start}..{end} -> {target}, length {len})")]
    HandlerOutOfRange {
        member: String,
        start: usize,
        end: usize,
        target: usize,
        len: usize,
    },

    #[error("member {member} is already instrumented")]
    AlreadyInstrumented { member: String },
}
