//! ソース行情報

use std::fmt;

/// 行番号表のエントリ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineEntry {
    /// このエントリが始まる命令オフセット
    pub start_pc: usize,
    /// ソース行番号
    pub line: u32,
}

/// 行番号表（メンバに埋め込まれたデバッグ情報）
///
/// エントリは `start_pc` の昇順に並びます。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineTable {
    entries: Vec<LineEntry>,
}

impl LineTable {
    /// 空の行番号表を作成する
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// エントリを追加する
    ///
    /// 直前のエントリと同じオフセットであれば行番号を上書きします。
    pub fn push(&mut self, start_pc: usize, line: u32) {
        match self.entries.last_mut() {
            Some(last) if last.start_pc == start_pc => last.line = line,
            _ => self.entries.push(LineEntry { start_pc, line }),
        }
    }

    /// 全てのエントリを取得する
    pub fn entries(&self) -> &[LineEntry] {
        &self.entries
    }

    /// エントリが空かどうか
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 命令オフセットに対応する行番号を取得する
    ///
    /// オフセット以前で最後に始まるエントリの行番号を返します。
    /// 最初のエントリより前のオフセットには最初のエントリの行番号を返します。
    pub fn line_at(&self, pc: usize) -> Option<u32> {
        let first = self.entries.first()?;
        let line = self
            .entries
            .iter()
            .take_while(|e| e.start_pc <= pc)
            .last()
            .map_or(first.line, |e| e.line);
        Some(line)
    }

    /// `pc` に命令が挿入されたとき、後続のエントリをずらす
    pub fn shift_after(&mut self, pc: usize) {
        for entry in &mut self.entries {
            if entry.start_pc > pc {
                entry.start_pc += 1;
            }
        }
    }

    /// 長さ `code_len` の命令列がカバーする行範囲を計算する
    pub fn range(&self, code_len: usize) -> LineRange {
        match (self.line_at(0), self.line_at(code_len)) {
            (Some(start), Some(end)) => LineRange { start, end },
            _ => LineRange::UNKNOWN,
        }
    }
}

/// メンバの開始行と終了行
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    /// 行番号表が無いメンバに使うプレースホルダ
    pub const UNKNOWN: LineRange = LineRange { start: 0, end: 0 };

    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
