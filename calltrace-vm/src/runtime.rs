//! ランタイム本体
//!
//! クラスの遅延ロードとメンバ本体の解釈実行を行う。

use crate::exception::{
    ABSTRACT_METHOD, ILLEGAL_STATE, NO_CLASS_DEF_FOUND, NO_SUCH_METHOD, STACK_OVERFLOW,
};
use crate::{ClassFileTransformer, ClassPath, Exception};
use calltrace_ir::{Body, ClassFile, HookSink, Instr, MethodRef};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::{debug, trace};

/// 呼び出しの最大ネスト数
const DEFAULT_MAX_DEPTH: usize = 256;

/// ロード済みクラス
#[derive(Debug)]
pub struct LoadedClass {
    pub origin: PathBuf,
    pub class: ClassFile,
    /// いずれかのトランスフォーマが書き換えたかどうか
    pub transformed: bool,
}

/// クラスIRを実行するランタイム
///
/// 複数スレッドから同時にメンバを呼び出せます。
pub struct Runtime {
    class_path: ClassPath,
    transformers: RwLock<Vec<Arc<dyn ClassFileTransformer>>>,
    loaded: RwLock<HashMap<String, Arc<LoadedClass>>>,
    /// フック命令の転送先（アタッチ時に一度だけ設定される）
    hook_sink: OnceLock<Arc<dyn HookSink>>,
    max_depth: usize,
}

impl Runtime {
    /// 新しいランタイムを作成する
    pub fn new(class_path: ClassPath) -> Self {
        Self {
            class_path,
            transformers: RwLock::new(Vec::new()),
            loaded: RwLock::new(HashMap::new()),
            hook_sink: OnceLock::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// 呼び出しの最大ネスト数を設定する
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// クラスパスを取得する
    pub fn class_path(&self) -> &ClassPath {
        &self.class_path
    }

    /// トランスフォーマを登録する
    ///
    /// 登録後にロードされるクラスだけが変換対象になります。
    pub fn add_transformer(&self, transformer: Arc<dyn ClassFileTransformer>) {
        self.transformers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(transformer);
    }

    /// フックシンクを設定する
    ///
    /// 既に設定済みの場合はfalseを返し、何もしません。
    pub fn install_hook_sink(&self, sink: Arc<dyn HookSink>) -> bool {
        self.hook_sink.set(sink).is_ok()
    }

    /// ロード済みクラスを取得する
    pub fn loaded_class(&self, name: &str) -> Option<Arc<LoadedClass>> {
        self.loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// クラスをロードする（ロード済みならそれを返す）
    ///
    /// 初回ロード時に登録済みのトランスフォーマを順に呼び出します。
    /// 1つのクラスのロードと変換は一度だけ行われます。
    pub fn load_class(&self, name: &str) -> Result<Arc<LoadedClass>, Exception> {
        if let Some(class) = self.loaded_class(name) {
            return Ok(class);
        }

        let mut loaded = self.loaded.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(class) = loaded.get(name) {
            return Ok(Arc::clone(class));
        }

        let source = self
            .class_path
            .find(name)
            .ok_or_else(|| Exception::new(NO_CLASS_DEF_FOUND, name))?;

        let transformers = self
            .transformers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut class = source.class.clone();
        let mut transformed = false;
        for transformer in transformers {
            if let Some(rewritten) = transformer.transform(name, &source.origin, &class) {
                class = rewritten;
                transformed = true;
            }
        }

        debug!(
            "Loaded class {} from {:?} (transformed: {})",
            name, source.origin, transformed
        );
        let class = Arc::new(LoadedClass {
            origin: source.origin.clone(),
            class,
            transformed,
        });
        loaded.insert(name.to_string(), Arc::clone(&class));
        Ok(class)
    }

    /// クラスの `main` を実行する
    pub fn run_main(&self, class: &str) -> Result<(), Exception> {
        self.invoke(&MethodRef::new(class, "main"))
    }

    /// メンバを呼び出す
    pub fn invoke(&self, target: &MethodRef) -> Result<(), Exception> {
        self.invoke_at(target, 0)
    }

    fn invoke_at(&self, target: &MethodRef, depth: usize) -> Result<(), Exception> {
        if depth >= self.max_depth {
            return Err(Exception::new(STACK_OVERFLOW, target));
        }

        let class = self.load_class(&target.class)?;
        let member = class
            .class
            .find_member(&target.member)
            .ok_or_else(|| Exception::new(NO_SUCH_METHOD, target))?;
        let body = member
            .body
            .as_ref()
            .ok_or_else(|| Exception::new(ABSTRACT_METHOD, target))?;

        trace!("invoke {} (depth {})", target, depth);
        self.execute(body, depth)
    }

    /// メンバ本体を解釈実行する
    ///
    /// 例外が送出されたら、送出位置をカバーし型が一致する最初のハンドラへ制御を移します。
    /// 該当するハンドラが無ければ呼び出し元へ例外を伝播します。
    /// 本体の末尾を越えた場合は正常リターンとして扱います。
    fn execute(&self, body: &Body, depth: usize) -> Result<(), Exception> {
        let mut pc = 0;
        let mut caught: Option<Exception> = None;

        while let Some(instr) = body.code.get(pc) {
            let outcome = match instr {
                Instr::Nop => Ok(()),
                Instr::Invoke(target) => self.invoke_at(target, depth + 1),
                Instr::Throw(type_name) => Err(Exception::thrown(type_name.as_str())),
                Instr::Rethrow => Err(caught.take().unwrap_or_else(|| {
                    Exception::new(ILLEGAL_STATE, "rethrow without a caught exception")
                })),
                Instr::Return => return Ok(()),
                Instr::Hook(hook) => {
                    if let Some(sink) = self.hook_sink.get() {
                        sink.dispatch(hook);
                    }
                    Ok(())
                }
            };

            match outcome {
                Ok(()) => pc += 1,
                Err(exception) => {
                    let handler = body
                        .handlers
                        .iter()
                        .find(|h| h.covers(pc) && h.catches(&exception.type_name));
                    match handler {
                        Some(handler) => {
                            pc = handler.target;
                            caught = Some(exception);
                        }
                        None => return Err(exception),
                    }
                }
            }
        }

        Ok(())
    }
}
