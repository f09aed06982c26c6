//! 存档文件名展开：字面文件名直接保留，glob 模式在两侧存储中分别列出并合并

use crate::core::file_state::Side;
use crate::storage::{Storage, StoreError};
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, info};

/// 判断是否为 glob 模式
pub fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// 编译后的 glob 模式
///
/// `*` 和 `?` 不跨越 `/`，`**` 匹配任意层级目录。
#[derive(Debug, Clone)]
pub struct GlobPattern {
    raw: String,
    regex: Regex,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let raw = pattern.replace('\\', "/");
        let regex = Regex::new(&format!("^{}$", glob_to_regex(&raw)))?;
        Ok(Self { raw, regex })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    /// 模式是否可能匹配子目录中的文件
    pub fn is_recursive(&self) -> bool {
        self.raw.contains('/') || self.raw.contains("**")
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn glob_to_regex(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    // "**/" 匹配零或多层目录
                    out.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => match chars[i + 1..].iter().position(|&c| c == ']') {
                Some(len) if len > 0 => {
                    let class: String = chars[i + 1..i + 1 + len].iter().collect();
                    out.push('[');
                    let body = match class.strip_prefix('!') {
                        Some(rest) => {
                            out.push('^');
                            rest.to_string()
                        }
                        None => class,
                    };
                    for c in body.chars() {
                        if matches!(c, '\\' | '[' | ']' | '^' | '&' | '~') {
                            out.push('\\');
                        }
                        out.push(c);
                    }
                    out.push(']');
                    i += len + 2;
                    continue;
                }
                _ => out.push_str(&regex::escape("[")),
            },
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }

    out
}

/// 本次同步跟踪的文件名集合（按首次发现顺序，去重）
#[derive(Debug, Default, Clone)]
pub struct TrackedNames {
    names: Vec<String>,
    seen: HashSet<String>,
}

impl TrackedNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入文件名，已存在时返回 false
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.seen.contains(&name) {
            return false;
        }
        self.seen.insert(name.clone());
        self.names.push(name);
        true
    }

    /// 按发现顺序迭代
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// 排序后的文件名，用于稳定的处理与报告顺序
    pub fn sorted(&self) -> Vec<String> {
        let mut names: Vec<String> = self.iter().map(str::to_string).collect();
        names.sort();
        names
    }
}

/// 模式展开失败
#[derive(Debug)]
pub struct ScanError {
    pub side: Side,
    pub pattern: String,
    pub source: StoreError,
}

/// 存档文件扫描器
#[derive(Debug, Clone)]
pub struct FileScanner {
    patterns: Vec<Pattern>,
}

#[derive(Debug, Clone)]
enum Pattern {
    Literal(String),
    Glob(GlobPattern),
}

impl FileScanner {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| p.as_ref().trim())
            .filter(|p| !p.is_empty())
            .map(|p| {
                if is_glob(p) {
                    GlobPattern::new(p).map(Pattern::Glob)
                } else {
                    Ok(Pattern::Literal(crate::storage::normalize_name(p)))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// 展开所有模式：本地优先，其次远程
    pub async fn expand(
        &self,
        local: &dyn Storage,
        remote: &dyn Storage,
    ) -> Result<TrackedNames, ScanError> {
        let mut tracked = TrackedNames::new();

        for (side, storage) in [(Side::Local, local), (Side::Remote, remote)] {
            for pattern in &self.patterns {
                match pattern {
                    Pattern::Literal(name) => {
                        tracked.insert(name.as_str());
                    }
                    Pattern::Glob(glob) => {
                        let names = storage.list(glob).await.map_err(|source| ScanError {
                            side,
                            pattern: glob.as_str().to_string(),
                            source,
                        })?;
                        debug!(
                            "{} 中模式 {} 匹配 {} 个文件",
                            storage.name(),
                            glob.as_str(),
                            names.len()
                        );
                        for name in names {
                            tracked.insert(name);
                        }
                    }
                }
            }
        }

        info!("跟踪 {} 个存档文件", tracked.len());
        Ok(tracked)
    }
}
