//! calltrace クラスIR
//!
//! このクレートは、計装対象となるクラスの中間表現を提供します。
//! クラス・メンバ・命令列・例外ハンドラ表・行番号表（デバッグ情報）のモデル、
//! メソッド識別子、フック命令、テキスト形式（`.cls`）の読み書きを行います。

pub mod class;
pub mod lines;
pub mod method_id;
pub mod hook;
pub mod asm;

pub use class::{
    Body, ClassFile, Handler, Instr, Member, MemberKind, MethodRef, Modifiers,
    CLASS_INIT_NAME, CONSTRUCTOR_NAME,
};
pub use lines::{LineEntry, LineRange, LineTable};
pub use method_id::{MethodId, MethodIdParts};
pub use hook::{Hook, HookSink};
pub use asm::{ClassAssembler, ParseError};

/// IR操作の結果型
pub type Result<T> = anyhow::Result<T>;
