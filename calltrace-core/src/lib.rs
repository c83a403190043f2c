//! calltrace 計装エージェントのコア機能
//!
//! このクレートは、ランタイムにアタッチして呼び出しトレースを収集するエージェントを提供します。
//! アタッチオプションの解析、クラスロード時の計装、フック挿入、
//! 終了時の呼び出しグラフ・実行ログのエクスポートを統合します。

pub mod agent;
pub mod config;
pub mod errors;
pub mod exits;
pub mod injector;
pub mod interceptor;
pub mod gml;
pub mod export;

pub use agent::{attach, attach_with_config, AgentHandle, AttachError};
pub use config::{AgentConfig, ConfigError};
pub use errors::TransformError;
pub use injector::{injector_for, EntryExitInjector, EntryPointInjector, HookInjector};
pub use interceptor::{InstrumentationScope, Interceptor, TransformStats};

// 他のクレートから使用するために再エクスポート
pub use calltrace_ir::MethodId;
pub use calltrace_recorder::{CallGraph, RecordMode, Recorder, Snapshot, ThreadScope};
pub use calltrace_vm::{ClassPath, Runtime};

/// エージェントの結果型
pub type Result<T> = anyhow::Result<T>;
