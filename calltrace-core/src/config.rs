//! アタッチオプションの解析

use calltrace_recorder::{ModeParseError, RecordMode, ThreadScope};
use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// 出力ディレクトリのキー
pub const OUTPUT_DIR: &str = "outputDir";
/// 本体側クラスの定義元を識別する部分文字列のキー
pub const SRC_CLASS_PATH: &str = "srcClassPath";
/// テスト側クラスの定義元を識別する部分文字列のキー
pub const TEST_CLASS_PATH: &str = "testClassPath";
/// 記録モードのキー
pub const MODE: &str = "mode";
/// スレッド範囲のキー
pub const THREADS: &str = "threads";

/// 設定エラー
///
/// いずれもアタッチを中止させます。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown option '{0}'")]
    UnknownKey(String),

    #[error("malformed option '{0}' (expected key=value)")]
    Malformed(String),

    #[error("option '{0}' given more than once")]
    Duplicate(String),

    #[error("missing required option '{0}'")]
    MissingKey(&'static str),

    #[error("option '{key}': {source}")]
    InvalidValue {
        key: &'static str,
        #[source]
        source: ModeParseError,
    },
}

/// エージェント設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub src_class_path: String,
    pub test_class_path: String,
    /// 成果物の出力先
    pub output_dir: PathBuf,
    pub mode: RecordMode,
    pub thread_scope: ThreadScope,
}

impl AgentConfig {
    /// `key=value,key=value` 形式のオプション文字列を解析する
    ///
    /// `outputDir` はグラフモードでは省略可能（カレントディレクトリ）、
    /// 縮退モードでは必須です。
    pub fn parse(options: &str) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut src_class_path = None;
        let mut test_class_path = None;
        let mut output_dir = None;
        let mut mode = RecordMode::default();
        let mut thread_scope = ThreadScope::default();

        for pair in options.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .map(|(k, v)| (k.trim(), v.trim()))
                .filter(|(k, v)| !k.is_empty() && !v.is_empty())
                .ok_or_else(|| ConfigError::Malformed(pair.to_string()))?;

            let key: &'static str = match key {
                SRC_CLASS_PATH => SRC_CLASS_PATH,
                TEST_CLASS_PATH => TEST_CLASS_PATH,
                OUTPUT_DIR => OUTPUT_DIR,
                MODE => MODE,
                THREADS => THREADS,
                other => return Err(ConfigError::UnknownKey(other.to_string())),
            };
            if !seen.insert(key) {
                return Err(ConfigError::Duplicate(key.to_string()));
            }

            match key {
                SRC_CLASS_PATH => src_class_path = Some(value.to_string()),
                TEST_CLASS_PATH => test_class_path = Some(value.to_string()),
                OUTPUT_DIR => output_dir = Some(PathBuf::from(value)),
                MODE => {
                    mode = value
                        .parse()
                        .map_err(|source| ConfigError::InvalidValue { key, source })?
                }
                _ => {
                    thread_scope = value
                        .parse()
                        .map_err(|source| ConfigError::InvalidValue { key, source })?
                }
            }
        }

        let src_class_path = src_class_path.ok_or(ConfigError::MissingKey(SRC_CLASS_PATH))?;
        let test_class_path = test_class_path.ok_or(ConfigError::MissingKey(TEST_CLASS_PATH))?;
        let output_dir = match (output_dir, mode) {
            (Some(dir), _) => dir,
            (None, RecordMode::Graph) => PathBuf::from("."),
            (None, RecordMode::Points) => return Err(ConfigError::MissingKey(OUTPUT_DIR)),
        };

        Ok(Self {
            src_class_path,
            test_class_path,
            output_dir,
            mode,
            thread_scope,
        })
    }
}

impl FromStr for AgentConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
