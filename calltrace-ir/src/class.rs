//! クラスとメンバの中間表現

use crate::{Hook, LineTable};
use std::fmt;

/// コンストラクタのランタイム内部名
pub const CONSTRUCTOR_NAME: &str = "<init>";

/// クラス初期化子のランタイム内部名
pub const CLASS_INIT_NAME: &str = "<clinit>";

/// メソッド参照（呼び出し先）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    /// 呼び出し先クラスのバイナリ名（`/` 区切り）
    pub class: String,
    /// 呼び出し先メンバ名
    pub member: String,
}

impl MethodRef {
    /// メソッド参照を作成する
    pub fn new(class: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            member: member.into(),
        }
    }

    /// クラスのコンストラクタへの参照を作成する
    pub fn constructor(class: impl Into<String>) -> Self {
        Self::new(class, CONSTRUCTOR_NAME)
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.member)
    }
}

/// 命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr {
    /// 何もしない
    Nop,
    /// メンバを呼び出す
    Invoke(MethodRef),
    /// 指定した型の例外を送出する
    Throw(String),
    /// ハンドラが捕捉中の例外を再送出する
    Rethrow,
    /// 呼び出し元へ戻る
    Return,
    /// トレースフックを呼び出す
    Hook(Hook),
}

impl Instr {
    /// 正常リターン命令かどうか
    pub fn is_return(&self) -> bool {
        matches!(self, Instr::Return)
    }

    /// 制御が次の命令へ流れない命令かどうか
    pub fn is_terminal(&self) -> bool {
        matches!(self, Instr::Return | Instr::Throw(_) | Instr::Rethrow)
    }
}

/// 例外ハンドラ
///
/// `[start, end)` の範囲で送出された例外のうち `catch` に一致するものを
/// `target` へ転送します。`catch` が `None` なら全ての例外を捕捉します。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handler {
    pub start: usize,
    pub end: usize,
    pub target: usize,
    pub catch: Option<String>,
}

impl Handler {
    /// 命令オフセットがハンドラの範囲内かどうか
    pub fn covers(&self, pc: usize) -> bool {
        self.start <= pc && pc < self.end
    }

    /// 例外型を捕捉するかどうか
    pub fn catches(&self, type_name: &str) -> bool {
        self.catch.as_deref().map_or(true, |c| c == type_name)
    }
}

/// メンバ本体
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Body {
    pub code: Vec<Instr>,
    pub handlers: Vec<Handler>,
    /// 行番号表（デバッグ情報が無ければ `None`）
    pub lines: Option<LineTable>,
}

impl Body {
    /// 命令列から本体を作成する
    pub fn new(code: Vec<Instr>) -> Self {
        Self {
            code,
            handlers: Vec::new(),
            lines: None,
        }
    }

    /// 命令数
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// 命令が無いかどうか
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// フック命令を含むかどうか
    pub fn contains_hooks(&self) -> bool {
        self.code.iter().any(|i| matches!(i, Instr::Hook(_)))
    }

    /// `pc` に命令を挿入する
    ///
    /// 挿入位置より後ろを指すハンドラ範囲・ハンドラ先・行番号表を付け替えます。
    /// `pc` ちょうどを指すハンドラ先と行番号エントリは挿入した命令を指すようになります。
    pub fn insert(&mut self, pc: usize, instr: Instr) {
        self.code.insert(pc, instr);
        for handler in &mut self.handlers {
            if handler.start > pc {
                handler.start += 1;
            }
            if handler.end > pc {
                handler.end += 1;
            }
            if handler.target > pc {
                handler.target += 1;
            }
        }
        if let Some(lines) = &mut self.lines {
            lines.shift_after(pc);
        }
    }

    /// 本体の先頭に命令を追加する
    ///
    /// 追加した命令はどのハンドラ範囲にも含まれず、どのハンドラ先にもなりません。
    /// 先頭の行番号エントリは追加した命令も含むように残します。
    pub fn prepend(&mut self, instr: Instr) {
        self.code.insert(0, instr);
        for handler in &mut self.handlers {
            handler.start += 1;
            handler.end += 1;
            handler.target += 1;
        }
        if let Some(lines) = &mut self.lines {
            lines.shift_after(0);
        }
    }
}

/// メンバの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Method,
    Constructor,
    ClassInit,
}

/// メンバ修飾子
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_native: bool,
}

/// クラスのメンバ（メソッド・コンストラクタ・クラス初期化子）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// ランタイム内部名（コンストラクタは `<init>`）
    pub name: String,
    pub kind: MemberKind,
    pub modifiers: Modifiers,
    /// 実行可能な本体（abstract / native なら `None`）
    pub body: Option<Body>,
}

impl Member {
    /// 本体を持つメソッドを作成する
    pub fn method(name: impl Into<String>, body: Body) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Method,
            modifiers: Modifiers::default(),
            body: Some(body),
        }
    }

    /// コンストラクタを作成する
    pub fn constructor(body: Body) -> Self {
        Self {
            name: CONSTRUCTOR_NAME.to_string(),
            kind: MemberKind::Constructor,
            modifiers: Modifiers::default(),
            body: Some(body),
        }
    }

    /// 本体を持たないメソッドを作成する
    pub fn bodiless(name: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Method,
            modifiers,
            body: None,
        }
    }

    /// 実行可能な本体を持つかどうか
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }
}

/// クラス
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFile {
    /// バイナリ名（例: `com/example/Outer$Inner`）
    pub name: String,
    pub is_interface: bool,
    pub members: Vec<Member>,
}

impl ClassFile {
    /// 空のクラスを作成する
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_interface: false,
            members: Vec::new(),
        }
    }

    /// パッケージ名（`.` 区切り、デフォルトパッケージなら空文字列）
    pub fn package(&self) -> String {
        match self.name.rsplit_once('/') {
            Some((pkg, _)) => pkg.replace('/', "."),
            None => String::new(),
        }
    }

    /// 単純クラス名（ネストクラスの `$` は保持する）
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// 外側クラスの完全修飾名（`.` 区切り）
    pub fn outer_name(&self) -> String {
        let outer = self.name.split('$').next().unwrap_or(&self.name);
        outer.replace('/', ".")
    }

    /// 名前でメンバを探す
    pub fn find_member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_names() {
        let class = ClassFile::new("com/example/Outer$Inner");
        assert_eq!(class.package(), "com.example");
        assert_eq!(class.simple_name(), "Outer$Inner");
        assert_eq!(class.outer_name(), "com.example.Outer");

        let root = ClassFile::new("Main");
        assert_eq!(root.package(), "");
        assert_eq!(root.simple_name(), "Main");
        assert_eq!(root.outer_name(), "Main");
    }

    #[test]
    fn test_handler_match() {
        let h = Handler { start: 1, end: 3, target: 5, catch: Some("E".into()) };
        assert!(h.covers(1));
        assert!(h.covers(2));
        assert!(!h.covers(3));
        assert!(h.catches("E"));
        assert!(!h.catches("F"));

        let any = Handler { catch: None, ..h };
        assert!(any.catches("F"));
    }

    #[test]
    fn test_insert_remaps_handlers_and_lines() {
        let mut body = Body::new(vec![
            Instr::Invoke(MethodRef::new("A", "f")),
            Instr::Return,
            Instr::Nop,
            Instr::Return,
        ]);
        body.handlers.push(Handler { start: 0, end: 1, target: 2, catch: None });
        let mut lines = LineTable::new();
        lines.push(0, 10);
        lines.push(2, 12);
        body.lines = Some(lines);

        body.insert(1, Instr::Hook(Hook::Exit));

        assert_eq!(body.code[1], Instr::Hook(Hook::Exit));
        assert_eq!(body.handlers[0], Handler { start: 0, end: 1, target: 3, catch: None });
        assert_eq!(body.lines.as_ref().unwrap().line_at(3), Some(12));
        assert_eq!(body.lines.as_ref().unwrap().line_at(2), Some(10));
    }

    #[test]
    fn test_prepend_stays_outside_handlers() {
        let mut body = Body::new(vec![Instr::Nop, Instr::Return]);
        body.handlers.push(Handler { start: 0, end: 1, target: 0, catch: None });
        let mut lines = LineTable::new();
        lines.push(0, 5);
        lines.push(1, 6);
        body.lines = Some(lines);

        body.prepend(Instr::Hook(Hook::Exit));

        assert_eq!(body.handlers[0], Handler { start: 1, end: 2, target: 1, catch: None });
        assert_eq!(body.lines.as_ref().unwrap().line_at(0), Some(5));
        assert_eq!(body.lines.as_ref().unwrap().line_at(2), Some(6));
    }
}
