//! 記録結果の書き出し

use crate::gml::write_gml;
use crate::Result;
use anyhow::Context;
use calltrace_recorder::{CallGraph, Snapshot};
use std::fmt::Display;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// 呼び出しグラフの出力ファイル名（下流ツールとの互換のため拡張子は `.graphml`）
pub const CALL_GRAPH_FILE: &str = "callgraph.graphml";
/// 実行済みメソッドログの出力ファイル名
pub const RUN_LOG_FILE: &str = "run.log";
/// ロード済みクラスログの出力ファイル名
pub const LOADED_CLASSES_FILE: &str = "loaded_classes.txt";

/// 呼び出しグラフを GML ファイルに書き出す
pub fn write_call_graph(path: &Path, graph: &CallGraph) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut out = BufWriter::new(file);
    write_gml(graph, &mut out).with_context(|| format!("Failed to write call graph to {:?}", path))?;
    out.flush().with_context(|| format!("Failed to flush {:?}", path))?;
    Ok(())
}

/// 1行に1要素ずつ書き出す
pub fn write_lines<T: Display>(path: &Path, items: &[T]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut out = BufWriter::new(file);
    for item in items {
        writeln!(out, "{}", item).with_context(|| format!("Failed to write {:?}", path))?;
    }
    out.flush().with_context(|| format!("Failed to flush {:?}", path))?;
    Ok(())
}

/// 記録結果とロード済みクラスログを出力ディレクトリへ書き出す
///
/// グラフモードでは `callgraph.graphml`、縮退モードでは `run.log` を書き、
/// 常に `loaded_classes.txt` を書きます。
/// 書き出しに失敗した成果物はログに記録して飛ばし、書けたファイルのパスを返します。
pub fn write_artifacts(output_dir: &Path, snapshot: &Snapshot, loaded_classes: &[String]) -> Vec<PathBuf> {
    if let Err(e) = fs::create_dir_all(output_dir) {
        error!("Failed to create output directory {:?}: {}", output_dir, e);
        return Vec::new();
    }

    let trace = match snapshot {
        Snapshot::Graph(graph) => {
            let path = output_dir.join(CALL_GRAPH_FILE);
            (path.clone(), write_call_graph(&path, graph))
        }
        Snapshot::Points(executed) => {
            let path = output_dir.join(RUN_LOG_FILE);
            (path.clone(), write_lines(&path, executed))
        }
    };
    let classes_path = output_dir.join(LOADED_CLASSES_FILE);
    let classes = (classes_path.clone(), write_lines(&classes_path, loaded_classes));

    let mut written = Vec::new();
    for (path, result) in [trace, classes] {
        match result {
            Ok(()) => {
                info!("Wrote {:?}", path);
                written.push(path);
            }
            Err(e) => error!("{:#}", e),
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use calltrace_ir::MethodId;

    #[test]
    fn test_write_graph_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/out");
        let mut graph = CallGraph::new();
        graph.add_call(&MethodId::from("@A:a(1-2)"), &MethodId::from("@A:b(3-4)"));

        let written = write_artifacts(&out, &Snapshot::Graph(graph), &["A".to_string()]);
        assert_eq!(written, vec![out.join(CALL_GRAPH_FILE), out.join(LOADED_CLASSES_FILE)]);
        let gml = fs::read_to_string(out.join(CALL_GRAPH_FILE)).unwrap();
        assert!(gml.contains("label \"@A:b(3-4)\""));
        assert_eq!(fs::read_to_string(out.join(LOADED_CLASSES_FILE)).unwrap(), "A\n");
        assert!(!out.join(RUN_LOG_FILE).exists());
    }

    #[test]
    fn test_write_points_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let executed = vec![MethodId::from("@A:a(1-2)"), MethodId::from("@A:b(3-4)")];
        let written = write_artifacts(dir.path(), &Snapshot::Points(executed), &[]);
        assert_eq!(written.len(), 2);
        assert_eq!(
            fs::read_to_string(dir.path().join(RUN_LOG_FILE)).unwrap(),
            "@A:a(1-2)\n@A:b(3-4)\n"
        );
        assert_eq!(fs::read_to_string(dir.path().join(LOADED_CLASSES_FILE)).unwrap(), "");
    }

    #[test]
    fn test_failures_are_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "not a directory").unwrap();
        let written = write_artifacts(&blocker, &Snapshot::Points(Vec::new()), &[]);
        assert!(written.is_empty());
    }
}
