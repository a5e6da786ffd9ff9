use crate::source::{Source, SourceKind};
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{info, warn};

/// 一次入队操作的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AddSummary {
    pub added: usize,
    pub files: usize,
    pub urls: usize,
    pub streams: usize,
    pub duplicates: usize,
    pub invalid: usize,
}

impl AddSummary {
    fn record(&mut self, kind: SourceKind) {
        self.added += 1;
        match kind {
            SourceKind::File => self.files += 1,
            SourceKind::Url => self.urls += 1,
            SourceKind::StreamProtocol => self.streams += 1,
        }
    }
}

/// 播放队列
///
/// `persistent` 是对外可见、随时可修改的队列；`active` 是当前播放周期的快照，
/// 按顺序消费，循环模式下耗尽后从 `persistent` 的最新内容重新填充。
#[derive(Debug, Clone)]
pub struct SourceQueue {
    persistent: Vec<Source>,
    active: VecDeque<Source>,
    played: u64,
    looping: bool,
    placeholder: Source,
}

impl SourceQueue {
    pub fn new(placeholder: impl Into<String>, looping: bool) -> Self {
        Self {
            persistent: Vec::new(),
            active: VecDeque::new(),
            played: 0,
            looping,
            placeholder: Source::placeholder(placeholder),
        }
    }

    /// 添加视频源（去重、过滤无效源）
    pub fn add<I, S>(&mut self, locators: I) -> AddSummary
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut summary = AddSummary::default();

        for locator in locators {
            let locator = locator.as_ref().trim();
            if locator.is_empty() {
                continue;
            }

            if self.contains(locator) {
                summary.duplicates += 1;
                continue;
            }

            let source = Source::classify(locator);
            if !source.valid {
                summary.invalid += 1;
                continue;
            }

            summary.record(source.kind);
            self.persistent.push(source);
        }

        if summary.added == 0 {
            warn!(
                duplicates = summary.duplicates,
                invalid = summary.invalid,
                "No valid sources added to queue"
            );
        } else {
            info!(
                added = summary.added,
                files = summary.files,
                urls = summary.urls,
                streams = summary.streams,
                duplicates = summary.duplicates,
                invalid = summary.invalid,
                queue_size = self.persistent.len(),
                "Sources added to queue"
            );
        }

        summary
    }

    /// 按下标移除（只影响持久队列）
    pub fn remove(&mut self, index: usize) -> Option<Source> {
        if index >= self.persistent.len() {
            warn!(
                index,
                queue_size = self.persistent.len(),
                "Queue index out of range"
            );
            return None;
        }

        let removed = self.persistent.remove(index);
        info!(index, source = %removed.locator, "Source removed from queue");
        Some(removed)
    }

    /// 清空持久队列和当前播放列表
    pub fn clear(&mut self) {
        let cleared = self.persistent.len();
        self.persistent.clear();
        self.active.clear();
        info!(cleared, "Queue cleared");
    }

    /// 用持久队列初始化播放列表
    pub fn seed(&mut self) {
        self.active = self.persistent.iter().cloned().collect();
        self.played = 0;
    }

    /// 取出下一个要播放的源
    ///
    /// 返回入队时分类好的源，不再重新检查；没有可播放的源时返回占位视频。
    pub fn next(&mut self) -> Source {
        let mut refilled = false;

        loop {
            if let Some(source) = self.active.pop_front() {
                self.played += 1;
                return source;
            }

            if refilled || !self.looping || self.persistent.is_empty() {
                return self.placeholder.clone();
            }

            info!(queue_size = self.persistent.len(), "Playlist exhausted, looping");
            self.seed();
            refilled = true;
        }
    }

    pub fn contains(&self, locator: &str) -> bool {
        self.persistent.iter().any(|s| s.locator == locator)
    }

    pub fn len(&self) -> usize {
        self.persistent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.persistent.is_empty()
    }

    /// 当前播放周期剩余数量
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// 当前播放周期已播放数量
    pub fn played(&self) -> u64 {
        self.played
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn placeholder(&self) -> &Source {
        &self.placeholder
    }

    /// 持久队列快照
    pub fn snapshot(&self) -> Vec<Source> {
        self.persistent.clone()
    }
}
