//! 重み付き有向呼び出しグラフ

use calltrace_ir::MethodId;
use std::collections::HashMap;

/// 呼び出しエッジ（頂点番号で呼び出し元と呼び出し先を指す）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub source: usize,
    pub target: usize,
    /// 呼び出し元が呼び出し先を直接呼び出した回数
    pub weight: u64,
}

/// 呼び出しグラフ
///
/// 頂点・エッジとも最初に追加された順序を保持します。
#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    vertex_index: HashMap<MethodId, usize>,
    vertices: Vec<MethodId>,
    edge_index: HashMap<(usize, usize), usize>,
    edges: Vec<Edge>,
}

impl CallGraph {
    /// 空のグラフを作成する
    pub fn new() -> Self {
        Self::default()
    }

    /// 頂点を登録する（登録済みなら何もしない）
    ///
    /// 頂点番号を返します。
    pub fn add_vertex(&mut self, id: &MethodId) -> usize {
        if let Some(&index) = self.vertex_index.get(id) {
            return index;
        }
        let index = self.vertices.len();
        self.vertices.push(id.clone());
        self.vertex_index.insert(id.clone(), index);
        index
    }

    /// 直接呼び出しを1回記録する
    ///
    /// エッジが無ければ重み1で作成し、あれば重みを1増やします。
    /// 更新後の重みを返します。
    pub fn add_call(&mut self, caller: &MethodId, callee: &MethodId) -> u64 {
        self.add_weight(caller, callee, 1)
    }

    /// エッジの重みを加算する（エッジが無ければ作成する）
    pub fn add_weight(&mut self, caller: &MethodId, callee: &MethodId, weight: u64) -> u64 {
        let source = self.add_vertex(caller);
        let target = self.add_vertex(callee);
        match self.edge_index.get(&(source, target)) {
            Some(&index) => {
                let edge = &mut self.edges[index];
                edge.weight += weight;
                edge.weight
            }
            None => {
                self.edge_index.insert((source, target), self.edges.len());
                self.edges.push(Edge {
                    source,
                    target,
                    weight,
                });
                weight
            }
        }
    }

    /// 頂点が登録されているかどうか
    pub fn contains_vertex(&self, id: &MethodId) -> bool {
        self.vertex_index.contains_key(id)
    }

    /// エッジの重みを取得する
    pub fn edge_weight(&self, caller: &MethodId, callee: &MethodId) -> Option<u64> {
        let source = *self.vertex_index.get(caller)?;
        let target = *self.vertex_index.get(callee)?;
        self.edge_index
            .get(&(source, target))
            .map(|&index| self.edges[index].weight)
    }

    /// 全ての頂点を取得する（頂点番号順）
    pub fn vertices(&self) -> &[MethodId] {
        &self.vertices
    }

    /// 全てのエッジを取得する
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// エッジを `(呼び出し元, 呼び出し先, 重み)` の形で列挙する
    pub fn weighted_edges(&self) -> impl Iterator<Item = (&MethodId, &MethodId, u64)> {
        self.edges
            .iter()
            .map(|e| (&self.vertices[e.source], &self.vertices[e.target], e.weight))
    }

    /// 指定した頂点から出るエッジを列挙する
    pub fn callees_of<'a>(&'a self, caller: &MethodId) -> impl Iterator<Item = (&'a MethodId, u64)> + 'a {
        let source = self.vertex_index.get(caller).copied();
        self.edges
            .iter()
            .filter(move |e| Some(e.source) == source)
            .map(|e| (&self.vertices[e.target], e.weight))
    }

    /// 頂点数
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// エッジ数
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
