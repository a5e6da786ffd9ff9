use crate::error::{RelayError, Result};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 片源目录中的一条记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(default)]
    pub name: String,
    pub locator: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// 片源目录
///
/// 引擎只从目录批量取出地址入队，不关心目录如何存储。
pub trait SourceCatalog: Send + Sync {
    /// 返回打乱顺序后的全部条目
    fn shuffled_entries(&self) -> Result<Vec<CatalogEntry>>;
}

/// 内存目录
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: Vec<CatalogEntry>,
}

impl StaticCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// 从 JSON 对象解析：`{ "名称": { "locator": "...", "title": "..." } }`
    pub fn from_json(json: &str) -> Result<Self> {
        let map: HashMap<String, CatalogEntry> =
            serde_json::from_str(json).map_err(|e| RelayError::Catalog(e.to_string()))?;

        let entries = map
            .into_iter()
            .map(|(name, mut entry)| {
                entry.name = name;
                entry
            })
            .collect();

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SourceCatalog for StaticCatalog {
    fn shuffled_entries(&self) -> Result<Vec<CatalogEntry>> {
        let mut entries = self.entries.clone();
        entries.shuffle(&mut rand::thread_rng());
        Ok(entries)
    }
}
