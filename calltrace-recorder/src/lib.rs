//! calltrace 呼び出しトレース記録
//!
//! このクレートは、計装されたメンバから届く entry/exit イベントを記録します。
//! スレッドごとの呼び出しスタック、共有の重み付き呼び出しグラフ、
//! 縮退モード用の実行済みメソッド集合、ロード済みクラスログを管理します。

pub mod call_stack;
pub mod thread_stacks;
pub mod graph;
pub mod executed;
pub mod loaded_classes;
pub mod recorder;

pub use call_stack::CallStack;
pub use thread_stacks::ThreadStacks;
pub use graph::{CallGraph, Edge};
pub use executed::ExecutedSet;
pub use loaded_classes::LoadedClassLog;
pub use recorder::{ModeParseError, RecordMode, Recorder, Snapshot, ThreadScope};

/// 記録機能の結果型
pub type Result<T> = anyhow::Result<T>;
