//! エージェントのアタッチと終了処理
//!
//! オプション文字列を解析し、レコーダーをフックシンクとして、
//! インターセプタをトランスフォーマとしてランタイムへ登録します。
//! 返されるハンドルが解放されたときに記録結果を一度だけ書き出します。

use crate::config::{AgentConfig, ConfigError};
use crate::export::write_artifacts;
use crate::interceptor::Interceptor;
use calltrace_recorder::{LoadedClassLog, Recorder};
use calltrace_vm::Runtime;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

/// アタッチの失敗
#[derive(Debug, Error)]
pub enum AttachError {
    #[error("invalid agent options: {0}")]
    Config(#[from] ConfigError),

    #[error("an agent is already attached to this runtime")]
    AlreadyAttached,
}

/// オプション文字列を解析してランタイムにアタッチする
///
/// 失敗した場合は診断を出力し、ランタイムには何も登録しません。
pub fn attach(options: &str, runtime: &Runtime) -> Result<AgentHandle, AttachError> {
    let config = AgentConfig::parse(options).map_err(|e| {
        error!("Failed to attach agent: invalid options {:?}: {}", options, e);
        AttachError::from(e)
    })?;
    attach_with_config(config, runtime)
}

/// 解析済みの設定でランタイムにアタッチする
pub fn attach_with_config(config: AgentConfig, runtime: &Runtime) -> Result<AgentHandle, AttachError> {
    let recorder = Arc::new(Recorder::new(config.mode, config.thread_scope));
    if !runtime.install_hook_sink(recorder.clone()) {
        error!("Failed to attach agent: {}", AttachError::AlreadyAttached);
        return Err(AttachError::AlreadyAttached);
    }

    let loaded_classes = Arc::new(LoadedClassLog::new());
    let interceptor = Interceptor::from_config(&config, loaded_classes.clone());
    runtime.add_transformer(Arc::new(interceptor));

    info!(
        "Agent attached (mode: {}, threads: {}, src: {:?}, test: {:?}, output: {:?})",
        config.mode, config.thread_scope, config.src_class_path, config.test_class_path, config.output_dir
    );

    Ok(AgentHandle {
        config,
        recorder,
        loaded_classes,
        flushed: AtomicBool::new(false),
    })
}

/// アタッチ中のエージェント
///
/// 解放時（または `shutdown` 呼び出し時）に記録結果を書き出します。
/// 書き出しは一度だけ行われます。
pub struct AgentHandle {
    config: AgentConfig,
    recorder: Arc<Recorder>,
    loaded_classes: Arc<LoadedClassLog>,
    flushed: AtomicBool,
}

impl AgentHandle {
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// レコーダーを取得する
    pub fn recorder(&self) -> &Arc<Recorder> {
        &self.recorder
    }

    /// ロード済みクラスログを取得する
    pub fn loaded_classes(&self) -> &Arc<LoadedClassLog> {
        &self.loaded_classes
    }

    /// 記録結果を書き出してエージェントを終了する
    ///
    /// 書き出したファイルのパスを返します。
    pub fn shutdown(self) -> Vec<PathBuf> {
        self.flush()
    }

    fn flush(&self) -> Vec<PathBuf> {
        if self.flushed.swap(true, Ordering::SeqCst) {
            return Vec::new();
        }
        let snapshot = self.recorder.snapshot();
        let loaded = self.loaded_classes.entries();
        write_artifacts(&self.config.output_dir, &snapshot, &loaded)
    }
}

impl Drop for AgentHandle {
    fn drop(&mut self) {
        self.flush();
    }
}
