//! 呼び出しトレースレコーダー
//!
//! 計装されたメンバの entry/exit/point イベントを処理し、
//! 呼び出しグラフまたは実行済みメソッド集合を構築する

use crate::{CallGraph, ExecutedSet, ThreadStacks};
use calltrace_ir::{HookSink, MethodId};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, ThreadId};
use thiserror::Error;
use tracing::debug;

/// 記録モード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordMode {
    /// entry/exit を追跡して重み付き呼び出しグラフを構築する
    #[default]
    Graph,
    /// entry だけを追跡して実行済みメソッド集合を構築する（縮退モード）
    Points,
}

/// 記録対象とするスレッドの範囲
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadScope {
    /// 全てのスレッドを記録する
    #[default]
    All,
    /// 最初にイベントを発行したスレッドだけを記録し、他は無視する
    FirstObserved,
}

/// モード文字列の解析エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value '{value}' (expected one of: {expected})")]
pub struct ModeParseError {
    pub value: String,
    pub expected: &'static str,
}

impl FromStr for RecordMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "graph" => Ok(RecordMode::Graph),
            "points" => Ok(RecordMode::Points),
            other => Err(ModeParseError {
                value: other.to_string(),
                expected: "graph, points",
            }),
        }
    }
}

impl FromStr for ThreadScope {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(ThreadScope::All),
            "first" => Ok(ThreadScope::FirstObserved),
            other => Err(ModeParseError {
                value: other.to_string(),
                expected: "all, first",
            }),
        }
    }
}

impl fmt::Display for RecordMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordMode::Graph => write!(f, "graph"),
            RecordMode::Points => write!(f, "points"),
        }
    }
}

impl fmt::Display for ThreadScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadScope::All => write!(f, "all"),
            ThreadScope::FirstObserved => write!(f, "first"),
        }
    }
}

/// 記録中の共有状態
enum State {
    Graph(Mutex<CallGraph>),
    Points(Mutex<ExecutedSet>),
}

/// 記録結果の複製
#[derive(Debug, Clone)]
pub enum Snapshot {
    Graph(CallGraph),
    Points(Vec<MethodId>),
}

/// 呼び出しトレースレコーダー
///
/// アタッチ時に1つ作成され、ランタイムのフックシンクとして全スレッドから共有されます。
/// 共有グラフ（または集合）は1つのミューテックスで保護し、
/// 呼び出しスタックはスレッドローカルに持ちます。
pub struct Recorder {
    mode: RecordMode,
    thread_scope: ThreadScope,
    /// 最初にイベントを発行したスレッド（`ThreadScope::FirstObserved` 用）
    first_thread: OnceLock<ThreadId>,
    stacks: ThreadStacks,
    state: State,
}

/// ロックを取得する（ポイズン状態でも記録を続ける）
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Recorder {
    /// 新しいレコーダーを作成する
    pub fn new(mode: RecordMode, thread_scope: ThreadScope) -> Self {
        debug!("Creating recorder: mode={}, threads={}", mode, thread_scope);
        let state = match mode {
            RecordMode::Graph => State::Graph(Mutex::new(CallGraph::new())),
            RecordMode::Points => State::Points(Mutex::new(ExecutedSet::new())),
        };
        Self {
            mode,
            thread_scope,
            first_thread: OnceLock::new(),
            stacks: ThreadStacks::new(),
            state,
        }
    }

    /// 記録モードを取得する
    pub fn mode(&self) -> RecordMode {
        self.mode
    }

    /// スレッド範囲を取得する
    pub fn thread_scope(&self) -> ThreadScope {
        self.thread_scope
    }

    /// 呼び出し元スレッドのイベントを記録するかどうか
    fn accepts_current_thread(&self) -> bool {
        match self.thread_scope {
            ThreadScope::All => true,
            ThreadScope::FirstObserved => {
                let current = thread::current().id();
                *self.first_thread.get_or_init(|| current) == current
            }
        }
    }

    /// メンバ進入を記録する
    ///
    /// 頂点を登録し、スタックが空でなければ最上位から `id` へのエッジの重みを1増やしてから
    /// `id` をプッシュします。縮退モードでは実行点として記録します。
    pub fn enter(&self, id: &MethodId) {
        if !self.accepts_current_thread() {
            return;
        }
        match &self.state {
            State::Graph(graph) => {
                self.stacks.with_current(|stack| {
                    {
                        let mut graph = lock(graph);
                        match stack.top() {
                            Some(caller) => {
                                graph.add_call(caller, id);
                            }
                            None => {
                                graph.add_vertex(id);
                            }
                        }
                    }
                    stack.push(id.clone());
                });
            }
            State::Points(executed) => {
                lock(executed).insert(id);
            }
        }
    }

    /// メンバ脱出を記録する
    ///
    /// 呼び出し元スレッドのスタックをポップします。空なら何もしません。
    pub fn exit(&self) {
        if !self.accepts_current_thread() {
            return;
        }
        if let State::Graph(_) = self.state {
            self.stacks.pop_current();
        }
    }

    /// 実行点を記録する
    ///
    /// グラフモードではスタックに触れずに頂点だけを登録します。
    pub fn point(&self, id: &MethodId) {
        if !self.accepts_current_thread() {
            return;
        }
        match &self.state {
            State::Graph(graph) => {
                lock(graph).add_vertex(id);
            }
            State::Points(executed) => {
                lock(executed).insert(id);
            }
        }
    }

    /// 呼び出し元スレッドの呼び出しスタック（底から頂上の順）
    pub fn current_stack(&self) -> Vec<MethodId> {
        self.stacks.current_frames()
    }

    /// 記録結果を複製する
    pub fn snapshot(&self) -> Snapshot {
        match &self.state {
            State::Graph(graph) => Snapshot::Graph(lock(graph).clone()),
            State::Points(executed) => Snapshot::Points(lock(executed).to_sorted_vec()),
        }
    }
}

impl HookSink for Recorder {
    fn enter(&self, id: &MethodId) {
        Recorder::enter(self, id);
    }

    fn exit(&self) {
        Recorder::exit(self);
    }

    fn point(&self, id: &MethodId) {
        Recorder::point(self, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn id(s: &str) -> MethodId {
        MethodId::from(s)
    }

    fn graph_of(recorder: &Recorder) -> CallGraph {
        match recorder.snapshot() {
            Snapshot::Graph(g) => g,
            Snapshot::Points(_) => panic!("expected graph snapshot"),
        }
    }

    #[test]
    fn test_stack_is_lifo() {
        let r = Recorder::new(RecordMode::Graph, ThreadScope::All);
        r.enter(&id("a"));
        r.enter(&id("b"));
        assert_eq!(r.current_stack(), vec![id("a"), id("b")]);
        r.exit();
        r.enter(&id("c"));
        assert_eq!(r.current_stack(), vec![id("a"), id("c")]);
        r.exit();
        r.exit();
        assert!(r.current_stack().is_empty());
    }

    #[test]
    fn test_exit_on_empty_stack_is_noop() {
        let r = Recorder::new(RecordMode::Graph, ThreadScope::All);
        r.exit();
        r.exit();
        r.enter(&id("a"));
        assert_eq!(r.current_stack(), vec![id("a")]);
        assert_eq!(graph_of(&r).vertex_count(), 1);
    }

    #[test]
    fn test_repeated_call_weight() {
        let r = Recorder::new(RecordMode::Graph, ThreadScope::All);
        r.enter(&id("a"));
        for _ in 0..5 {
            r.enter(&id("b"));
            r.exit();
        }
        r.exit();
        let g = graph_of(&r);
        assert_eq!(g.edge_weight(&id("a"), &id("b")), Some(5));
        assert_eq!(g.vertex_count(), 2);
    }

    #[test]
    fn test_root_call_has_no_incoming_edge() {
        let r = Recorder::new(RecordMode::Graph, ThreadScope::All);
        r.enter(&id("main"));
        r.exit();
        r.enter(&id("main"));
        r.exit();
        let g = graph_of(&r);
        assert_eq!(g.vertex_count(), 1);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn test_scenario_main_foo_bar() {
        let r = Recorder::new(RecordMode::Graph, ThreadScope::All);
        r.enter(&id("main"));
        r.enter(&id("foo"));
        r.enter(&id("bar"));
        r.exit();
        r.enter(&id("bar"));
        r.exit();
        r.exit();
        r.exit();

        let g = graph_of(&r);
        assert_eq!(g.vertices(), &[id("main"), id("foo"), id("bar")]);
        assert_eq!(g.edge_weight(&id("main"), &id("foo")), Some(1));
        assert_eq!(g.edge_weight(&id("foo"), &id("bar")), Some(2));
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn test_points_mode() {
        let r = Recorder::new(RecordMode::Points, ThreadScope::All);
        for name in ["X", "Y", "X", "Z"] {
            r.point(&id(name));
        }
        match r.snapshot() {
            Snapshot::Points(methods) => assert_eq!(methods, vec![id("X"), id("Y"), id("Z")]),
            Snapshot::Graph(_) => panic!("expected points snapshot"),
        }
    }

    #[test]
    fn test_enter_in_points_mode_records_point() {
        let r = Recorder::new(RecordMode::Points, ThreadScope::All);
        r.enter(&id("a"));
        r.exit();
        assert!(r.current_stack().is_empty());
        assert!(matches!(r.snapshot(), Snapshot::Points(m) if m == vec![id("a")]));
    }

    #[test]
    fn test_point_in_graph_mode_registers_vertex_only() {
        let r = Recorder::new(RecordMode::Graph, ThreadScope::All);
        r.enter(&id("a"));
        r.point(&id("p"));
        assert_eq!(r.current_stack(), vec![id("a")]);
        let g = graph_of(&r);
        assert!(g.contains_vertex(&id("p")));
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn test_threads_keep_separate_stacks() {
        let r = Arc::new(Recorder::new(RecordMode::Graph, ThreadScope::All));
        r.enter(&id("main"));
        let worker = Arc::clone(&r);
        std::thread::spawn(move || {
            worker.enter(&id("run"));
            worker.enter(&id("task"));
            worker.exit();
            worker.exit();
        })
        .join()
        .unwrap();
        r.exit();

        let g = graph_of(&r);
        assert_eq!(g.edge_weight(&id("main"), &id("run")), None);
        assert_eq!(g.edge_weight(&id("run"), &id("task")), Some(1));
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        const THREADS: u64 = 8;
        const CALLS: u64 = 1000;

        let r = Recorder::new(RecordMode::Graph, ThreadScope::All);
        std::thread::scope(|scope| {
            for _ in 0..THREADS {
                scope.spawn(|| {
                    r.enter(&id("caller"));
                    for _ in 0..CALLS {
                        r.enter(&id("callee"));
                        r.exit();
                    }
                    r.exit();
                });
            }
        });

        let g = graph_of(&r);
        assert_eq!(g.edge_weight(&id("caller"), &id("callee")), Some(THREADS * CALLS));
        assert_eq!(g.vertex_count(), 2);
    }

    #[test]
    fn test_first_observed_thread_only() {
        let r = Arc::new(Recorder::new(RecordMode::Graph, ThreadScope::FirstObserved));
        r.enter(&id("main"));
        let other = Arc::clone(&r);
        std::thread::spawn(move || {
            other.enter(&id("ignored"));
            assert!(other.current_stack().is_empty());
            other.exit();
        })
        .join()
        .unwrap();
        r.enter(&id("foo"));
        r.exit();
        r.exit();

        let g = graph_of(&r);
        assert!(!g.contains_vertex(&id("ignored")));
        assert_eq!(g.edge_weight(&id("main"), &id("foo")), Some(1));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("graph".parse::<RecordMode>(), Ok(RecordMode::Graph));
        assert_eq!("points".parse::<RecordMode>(), Ok(RecordMode::Points));
        assert_eq!("first".parse::<ThreadScope>(), Ok(ThreadScope::FirstObserved));
        assert!("sometimes".parse::<ThreadScope>().is_err());
    }
}
