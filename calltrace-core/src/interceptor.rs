//! クラスロードインターセプタ
//!
//! ランタイムがクラスをロードするたびに呼び出され、
//! 計装対象のクラスであればメンバ本体にトレースフックを挿入します。

use crate::config::AgentConfig;
use crate::injector::{injector_for, HookInjector};
use crate::TransformError;
use calltrace_ir::{ClassFile, LineRange, Member, MemberKind, MethodId};
use calltrace_recorder::{LoadedClassLog, RecordMode};
use calltrace_vm::ClassFileTransformer;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace, warn};

/// エージェント自身のランタイムパッケージ（計装しない）
pub const AGENT_RUNTIME_PACKAGE: &str = "calltrace/agent/";

/// 計装対象とする定義元の範囲
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentationScope {
    pub src_class_path: String,
    pub test_class_path: String,
}

impl InstrumentationScope {
    pub fn new(src_class_path: impl Into<String>, test_class_path: impl Into<String>) -> Self {
        Self {
            src_class_path: src_class_path.into(),
            test_class_path: test_class_path.into(),
        }
    }

    /// 定義元のパスがいずれかの部分文字列を含むかどうか
    pub fn contains(&self, origin: &Path) -> bool {
        let origin = origin.to_string_lossy();
        origin.contains(self.src_class_path.as_str()) || origin.contains(self.test_class_path.as_str())
    }
}

/// 1クラス分の変換結果の集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformStats {
    /// フックを挿入したメンバ数
    pub members: usize,
    /// 本体を持たない、またはクラス初期化子のため飛ばしたメンバ数
    pub skipped: usize,
    /// 挿入したフック命令数
    pub hooks: usize,
}

/// メンバの識別子を計算する
///
/// コンストラクタのメンバ名には単純クラス名を使います。
/// 行番号表が無いメンバの行範囲は `0-0` です。
pub fn method_id(class: &ClassFile, member: &Member) -> MethodId {
    let name = match member.kind {
        MemberKind::Constructor => class.simple_name(),
        _ => member.name.as_str(),
    };
    let lines = member
        .body
        .as_ref()
        .and_then(|body| body.lines.as_ref().map(|lines| lines.range(body.len())))
        .unwrap_or(LineRange::UNKNOWN);
    MethodId::new(&class.package(), class.simple_name(), name, lines)
}

/// クラスロードインターセプタ
pub struct Interceptor {
    scope: InstrumentationScope,
    injector: Box<dyn HookInjector>,
    loaded_classes: Arc<LoadedClassLog>,
    /// 変換を試みたクラス名
    visited: Mutex<HashSet<String>>,
}

impl Interceptor {
    /// 新しいインターセプタを作成する
    pub fn new(
        scope: InstrumentationScope,
        mode: RecordMode,
        loaded_classes: Arc<LoadedClassLog>,
    ) -> Self {
        Self {
            scope,
            injector: injector_for(mode),
            loaded_classes,
            visited: Mutex::new(HashSet::new()),
        }
    }

    /// 設定からインターセプタを作成する
    pub fn from_config(config: &AgentConfig, loaded_classes: Arc<LoadedClassLog>) -> Self {
        Self::new(
            InstrumentationScope::new(&config.src_class_path, &config.test_class_path),
            config.mode,
            loaded_classes,
        )
    }

    /// 計装範囲を取得する
    pub fn scope(&self) -> &InstrumentationScope {
        &self.scope
    }

    /// クラスの全メンバにフックを挿入した複製を作る
    ///
    /// 本体を持たないメンバとクラス初期化子は飛ばします。
    /// どれか1つのメンバでも失敗すればクラス全体をエラーにします。
    pub fn instrument(&self, class: &ClassFile) -> Result<(ClassFile, TransformStats), TransformError> {
        let mut rewritten = class.clone();
        let mut stats = TransformStats::default();

        for member in &mut rewritten.members {
            if member.kind == MemberKind::ClassInit {
                stats.skipped += 1;
                continue;
            }
            let id = method_id(class, member);
            let Some(body) = member.body.as_mut() else {
                stats.skipped += 1;
                continue;
            };
            stats.hooks += self.injector.inject(body, &id)?;
            stats.members += 1;
            trace!("Instrumented {}", id);
        }

        Ok((rewritten, stats))
    }
}

impl ClassFileTransformer for Interceptor {
    fn transform(&self, class_name: &str, origin: &Path, class: &ClassFile) -> Option<ClassFile> {
        if !self.scope.contains(origin) {
            return None;
        }
        if class_name.starts_with(AGENT_RUNTIME_PACKAGE) {
            return None;
        }
        {
            let mut visited = self.visited.lock().unwrap_or_else(PoisonError::into_inner);
            if !visited.insert(class_name.to_string()) {
                return None;
            }
        }

        self.loaded_classes.record(&class.outer_name());

        match self.instrument(class) {
            Ok((_, stats)) if stats.hooks == 0 => {
                debug!("No executable members in {}", class_name);
                None
            }
            Ok((rewritten, stats)) => {
                debug!(
                    "Instrumented {} ({} members, {} skipped, {} hooks)",
                    class_name, stats.members, stats.skipped, stats.hooks
                );
                Some(rewritten)
            }
            Err(e) => {
                warn!("Failed to instrument {}: {}", class_name, e);
                None
            }
        }
    }
}
