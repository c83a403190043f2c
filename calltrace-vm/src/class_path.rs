//! クラスパス

use crate::Result;
use calltrace_ir::{ClassAssembler, ClassFile};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// クラスとその定義元
#[derive(Debug, Clone)]
pub struct ClassSource {
    /// クラスを定義したコード位置
    pub origin: PathBuf,
    pub class: ClassFile,
}

/// ロード可能なクラスの集合
///
/// 同じ名前のクラスが複数あれば、先に追加されたものが優先されます。
#[derive(Debug, Default)]
pub struct ClassPath {
    classes: HashMap<String, ClassSource>,
}

impl ClassPath {
    /// 空のクラスパスを作成する
    pub fn new() -> Self {
        Self::default()
    }

    /// クラスを追加する
    ///
    /// 追加された場合はtrue
    pub fn add(&mut self, origin: impl Into<PathBuf>, class: ClassFile) -> bool {
        let origin = origin.into();
        if let Some(existing) = self.classes.get(&class.name) {
            warn!(
                "Class {} from {:?} is shadowed by {:?}",
                class.name, origin, existing.origin
            );
            return false;
        }
        self.classes
            .insert(class.name.clone(), ClassSource { origin, class });
        true
    }

    /// ディレクトリ以下の `.cls` ファイルを全て読み込む
    ///
    /// 読み込んだクラスの定義元はディレクトリ自身になります。
    /// 追加したクラス数を返します。
    pub fn add_directory<P: AsRef<Path>>(&mut self, dir: P) -> Result<usize> {
        let dir = dir.as_ref();
        let assembler = ClassAssembler::new()?;

        let mut files = Vec::new();
        collect_class_files(dir, &mut files)?;
        files.sort();

        let mut added = 0;
        for file in files {
            let src = fs::read_to_string(&file)
                .map_err(|e| anyhow::anyhow!("Failed to read class file {:?}: {}", file, e))?;
            let classes = assembler
                .parse(&src)
                .map_err(|e| anyhow::anyhow!("Failed to parse class file {:?}: {}", file, e))?;
            for class in classes {
                if self.add(dir, class) {
                    added += 1;
                }
            }
        }

        debug!("Loaded {} classes from {:?}", added, dir);
        Ok(added)
    }

    /// クラスを探す
    pub fn find(&self, name: &str) -> Option<&ClassSource> {
        self.classes.get(name)
    }

    /// クラス数
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// 全てのクラス名を整列して取得する
    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// ディレクトリを再帰的にたどって `.cls` ファイルを集める
fn collect_class_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir)
        .map_err(|e| anyhow::anyhow!("Failed to read class path entry {:?}: {}", dir, e))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect_class_files(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext == "cls") {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("com/example");
        fs::create_dir_all(&nested).unwrap();
        fs::write(
            nested.join("App.cls"),
            "class com/example/App\nstatic method main\n  return\nend\n",
        )
        .unwrap();
        fs::write(nested.join("notes.txt"), "not a class").unwrap();

        let mut cp = ClassPath::new();
        assert_eq!(cp.add_directory(dir.path()).unwrap(), 1);
        let source = cp.find("com/example/App").unwrap();
        assert_eq!(source.origin, dir.path());
        assert_eq!(cp.class_names(), vec!["com/example/App"]);
    }

    #[test]
    fn test_first_definition_wins() {
        let mut cp = ClassPath::new();
        assert!(cp.add("/first", ClassFile::new("A")));
        assert!(!cp.add("/second", ClassFile::new("A")));
        assert_eq!(cp.find("A").unwrap().origin, PathBuf::from("/first"));
    }

    #[test]
    fn test_add_directory_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Bad.cls"), "class Bad\nmethod f\n  bogus\nend\n").unwrap();
        let mut cp = ClassPath::new();
        let err = cp.add_directory(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse class file"));
    }
}
