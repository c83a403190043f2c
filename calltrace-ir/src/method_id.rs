//! メソッド識別子

use crate::LineRange;
use std::fmt;
use std::sync::Arc;

/// 実行時メンバを一意に指すキー
///
/// 形式は `package@SimpleClassName:memberName(startLine-endLine)` です。
/// フック命令や呼び出しスタックで頻繁に複製されるため、中身は `Arc<str>` で共有します。
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(Arc<str>);

/// 分解されたメソッド識別子
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodIdParts {
    pub package: String,
    pub class_name: String,
    pub member: String,
    pub lines: LineRange,
}

impl MethodId {
    /// 構成要素からメソッド識別子を作成する
    pub fn new(package: &str, class_name: &str, member: &str, lines: LineRange) -> Self {
        Self(format!("{}@{}:{}({})", package, class_name, member, lines).into())
    }

    /// 文字列表現を取得する
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 識別子を構成要素に分解する
    ///
    /// 形式に合わない場合は `None` を返します。
    pub fn parts(&self) -> Option<MethodIdParts> {
        let (package, rest) = self.0.split_once('@')?;
        let (class_name, rest) = rest.split_once(':')?;
        let (member, range) = rest.strip_suffix(')')?.rsplit_once('(')?;
        let (start, end) = range.split_once('-')?;
        Some(MethodIdParts {
            package: package.to_string(),
            class_name: class_name.to_string(),
            member: member.to_string(),
            lines: LineRange::new(start.parse().ok()?, end.parse().ok()?),
        })
    }
}

impl From<&str> for MethodId {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

impl From<String> for MethodId {
    fn from(s: String) -> Self {
        Self(s.into())
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        let id = MethodId::new("com.example", "App$Inner", "run", LineRange::new(12, 20));
        assert_eq!(id.as_str(), "com.example@App$Inner:run(12-20)");
    }

    #[test]
    fn test_parts() {
        let id = MethodId::from("com.google.javascript.jscomp@PrepareAst:PrepareAst(43-46)");
        let parts = id.parts().unwrap();
        assert_eq!(parts.package, "com.google.javascript.jscomp");
        assert_eq!(parts.class_name, "PrepareAst");
        assert_eq!(parts.member, "PrepareAst");
        assert_eq!(parts.lines, LineRange::new(43, 46));
    }

    #[test]
    fn test_parts_default_package() {
        let id = MethodId::new("", "Main", "main", LineRange::UNKNOWN);
        let parts = id.parts().unwrap();
        assert_eq!(parts.package, "");
        assert_eq!(parts.lines, LineRange::UNKNOWN);
    }

    #[test]
    fn test_parts_invalid() {
        assert!(MethodId::from("not an identifier").parts().is_none());
        assert!(MethodId::from("p@C:m(a-b)").parts().is_none());
    }
}
