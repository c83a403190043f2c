//! calltrace ホストランタイム
//!
//! このクレートは、クラスIRを実行する小さなマネージドランタイムを提供します。
//! クラスパスからの遅延ロード、ロード時のトランスフォーマ通知、
//! 例外ハンドラ付きのインタプリタ、フック命令のシンクへの転送を行います。

pub mod exception;
pub mod class_path;
pub mod transformer;
pub mod runtime;

pub use exception::Exception;
pub use class_path::{ClassPath, ClassSource};
pub use transformer::ClassFileTransformer;
pub use runtime::{LoadedClass, Runtime};

/// ランタイム操作の結果型
pub type Result<T> = anyhow::Result<T>;
