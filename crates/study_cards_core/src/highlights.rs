//! crates/study_cards_core/src/highlights.rs
//!
//! The highlight store: a persisted mapping from `PageKey` to the chronological list
//! of highlights saved on that page.
//!
//! Every mutating operation is a read-modify-write against the key-value store. Those
//! operations are funnelled through a single async queue so that two near-simultaneous
//! saves from different tabs cannot interleave and drop one another's update.

use chrono::{DateTime, TimeZone, Utc};
use futures::lock::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::{AddOutcome, Highlight, HighlightDraft, HighlightListing, RemoveOutcome};
use crate::page_key::{KeyGranularity, PageKey, PageKeyResolver};
use crate::ports::{KeyValueStore, PortError, PortResult};

pub const HIGHLIGHTS_KEY: &str = "savedHighlights";
pub const LAYOUT_KEY: &str = "savedHighlightsLayout";

/// Version 1 was a flat array, version 2 a hostname-keyed mapping without a layout
/// marker. Version 3 records the granularity it was keyed with.
pub const LAYOUT_VERSION: u32 = 3;

type PageMap = BTreeMap<String, Vec<Highlight>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct StoreLayout {
    version: u32,
    granularity: KeyGranularity,
}

/// What `HighlightStore::open` found and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    Initialized,
    UpToDate,
    MigratedFromList(MigrationReport),
    Rekeyed(MigrationReport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub highlights: usize,
    pub pages: usize,
    pub skipped: usize,
}

/// The answer to `list`: one page's highlights, or everything.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum HighlightQuery {
    Page(Vec<Highlight>),
    All(HighlightListing),
}

/// A highlight as found in older layouts, where some fields may be missing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyHighlight {
    #[serde(default)]
    id: Option<i64>,
    content: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, alias = "timestamp")]
    created_at: Option<DateTime<Utc>>,
}

pub struct HighlightStore {
    storage: Arc<dyn KeyValueStore>,
    resolver: PageKeyResolver,
    clock: fn() -> DateTime<Utc>,
    write_queue: Mutex<()>,
}

impl HighlightStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, resolver: PageKeyResolver) -> Self {
        Self {
            storage,
            resolver,
            clock: Utc::now,
            write_queue: Mutex::new(()),
        }
    }

    /// Replaces the time source used for ids and `createdAt`.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn resolver(&self) -> PageKeyResolver {
        self.resolver
    }

    pub fn key_for(&self, url: Option<&str>) -> PageKey {
        self.resolver.resolve(url)
    }

    /// Prepares the persisted value for use: initializes an empty mapping on first run
    /// and migrates older layouts exactly once.
    pub async fn open(&self) -> PortResult<OpenOutcome> {
        let _guard = self.write_queue.lock().await;

        let current = StoreLayout {
            version: LAYOUT_VERSION,
            granularity: self.resolver.granularity(),
        };

        match self.storage.get(HIGHLIGHTS_KEY).await? {
            None | Some(Value::Null) => {
                self.persist(&PageMap::new()).await?;
                self.storage.set(LAYOUT_KEY, to_value(&current)?).await?;
                info!("Initialized empty highlight store ({} keys)", current.granularity);
                Ok(OpenOutcome::Initialized)
            }
            Some(Value::Array(legacy)) => {
                info!("Migrating {} highlights from the flat-list layout", legacy.len());
                let report = self.regroup(legacy).await?;
                Ok(OpenOutcome::MigratedFromList(report))
            }
            Some(Value::Object(pages)) => {
                let layout = match self.storage.get(LAYOUT_KEY).await? {
                    Some(v) => serde_json::from_value::<StoreLayout>(v).ok(),
                    None => None,
                };
                if layout == Some(current) {
                    return Ok(OpenOutcome::UpToDate);
                }
                info!(
                    "Re-keying highlights from {:?} to {:?}",
                    layout, current
                );
                let records = pages
                    .into_iter()
                    .flat_map(|(_, list)| match list {
                        Value::Array(items) => items,
                        _ => Vec::new(),
                    })
                    .collect();
                let report = self.regroup(records).await?;
                Ok(OpenOutcome::Rekeyed(report))
            }
            Some(other) => Err(PortError::Storage(format!(
                "unexpected value under '{}': {}",
                HIGHLIGHTS_KEY, other
            ))),
        }
    }

    /// Re-keys a legacy flat list of highlights by their stored `url` and writes the
    /// mapping layout, replacing whatever is stored.
    pub async fn migrate(&self, legacy: Vec<Value>) -> PortResult<MigrationReport> {
        let _guard = self.write_queue.lock().await;
        self.regroup(legacy).await
    }

    /// Saves a new highlight and returns it with the updated count for its page.
    pub async fn add(&self, draft: HighlightDraft) -> PortResult<AddOutcome> {
        let content = draft.content.trim();
        if content.is_empty() {
            return Err(PortError::InvalidInput(
                "Cannot save an empty selection".to_string(),
            ));
        }

        let _guard = self.write_queue.lock().await;
        let mut pages = self.load().await?;

        let now = (self.clock)();
        let next_free = pages
            .values()
            .flatten()
            .map(|h| h.id)
            .max()
            .map_or(i64::MIN, |max| max.saturating_add(1));
        let id = now.timestamp_millis().max(next_free);

        let saved = Highlight {
            id,
            content: content.to_string(),
            title: draft.title,
            url: draft.url,
            created_at: now,
        };
        let key = self.resolver.resolve(saved.url.as_deref()).into_string();
        let list = pages.entry(key).or_default();
        list.push(saved.clone());
        let page_count = list.len();

        self.persist(&pages).await?;
        Ok(AddOutcome { saved, page_count })
    }

    /// With a URL, that page's highlights; without, the whole mapping plus a flat list.
    pub async fn list(&self, url: Option<&str>) -> PortResult<HighlightQuery> {
        match url {
            Some(url) => Ok(HighlightQuery::Page(self.list_page(url).await?)),
            None => Ok(HighlightQuery::All(self.list_all().await?)),
        }
    }

    pub async fn list_page(&self, url: &str) -> PortResult<Vec<Highlight>> {
        let key = self.resolver.resolve(Some(url));
        let mut pages = self.load().await?;
        Ok(pages.remove(key.as_str()).unwrap_or_default())
    }

    pub async fn list_all(&self) -> PortResult<HighlightListing> {
        let by_page = self.load().await?;
        let all = by_page.values().flatten().cloned().collect();
        Ok(HighlightListing { by_page, all })
    }

    /// Number of highlights stored under the key for `url`.
    pub async fn count(&self, url: Option<&str>) -> PortResult<usize> {
        let key = self.resolver.resolve(url);
        let pages = self.load().await?;
        Ok(pages.get(key.as_str()).map_or(0, Vec::len))
    }

    /// Removes the highlight with the given id from whichever page holds it.
    ///
    /// A page whose last highlight is removed keeps an empty list; only `clear`
    /// deletes keys.
    pub async fn remove(&self, id: i64) -> PortResult<RemoveOutcome> {
        let _guard = self.write_queue.lock().await;
        let mut pages = self.load().await?;

        let mut removed = false;
        for list in pages.values_mut() {
            if let Some(pos) = list.iter().position(|h| h.id == id) {
                list.remove(pos);
                removed = true;
                break;
            }
        }

        if removed {
            self.persist(&pages).await?;
        }
        Ok(RemoveOutcome {
            removed,
            by_page: pages,
        })
    }

    /// With a URL, deletes that page's entry entirely; without, empties the store.
    /// Returns whether anything was deleted.
    pub async fn clear(&self, url: Option<&str>) -> PortResult<bool> {
        let _guard = self.write_queue.lock().await;

        let Some(url) = url else {
            let had_any = !self.load().await?.is_empty();
            self.persist(&PageMap::new()).await?;
            return Ok(had_any);
        };

        let key = self.resolver.resolve(Some(url));
        let mut pages = self.load().await?;
        if pages.remove(key.as_str()).is_none() {
            return Ok(false);
        }
        self.persist(&pages).await?;
        Ok(true)
    }

    async fn load(&self) -> PortResult<PageMap> {
        match self.storage.get(HIGHLIGHTS_KEY).await? {
            None | Some(Value::Null) => Ok(PageMap::new()),
            Some(value @ Value::Object(_)) => serde_json::from_value(value)
                .map_err(|e| PortError::Storage(format!("corrupt highlight store: {}", e))),
            Some(_) => Err(PortError::Storage(
                "highlight store has not been migrated to the mapping layout".to_string(),
            )),
        }
    }

    async fn persist(&self, pages: &PageMap) -> PortResult<()> {
        self.storage.set(HIGHLIGHTS_KEY, to_value(pages)?).await
    }

    /// Must be called with the write queue held.
    async fn regroup(&self, records: Vec<Value>) -> PortResult<MigrationReport> {
        let mut pages = PageMap::new();
        let mut seen_ids = std::collections::HashSet::new();
        let mut skipped = 0;
        let mut highlights = 0;

        for record in records {
            let legacy: LegacyHighlight = match serde_json::from_value(record) {
                Ok(h) => h,
                Err(e) => {
                    warn!("Skipping unreadable legacy highlight: {}", e);
                    skipped += 1;
                    continue;
                }
            };

            let created_at = legacy
                .created_at
                .or_else(|| legacy.id.and_then(|ms| Utc.timestamp_millis_opt(ms).single()))
                .unwrap_or_else(self.clock);
            let mut id = legacy.id.unwrap_or_else(|| created_at.timestamp_millis());
            while !seen_ids.insert(id) {
                id += 1;
            }

            let key = self.resolver.resolve(legacy.url.as_deref()).into_string();
            pages.entry(key).or_default().push(Highlight {
                id,
                content: legacy.content,
                title: legacy.title.unwrap_or_default(),
                url: legacy.url,
                created_at,
            });
            highlights += 1;
        }

        self.persist(&pages).await?;
        let layout = StoreLayout {
            version: LAYOUT_VERSION,
            granularity: self.resolver.granularity(),
        };
        self.storage.set(LAYOUT_KEY, to_value(&layout)?).await?;

        let report = MigrationReport {
            highlights,
            pages: pages.len(),
            skipped,
        };
        info!(
            "Migration complete: {} highlights across {} pages ({} skipped)",
            report.highlights, report.pages, report.skipped
        );
        Ok(report)
    }
}

fn to_value<T: Serialize>(value: &T) -> PortResult<Value> {
    serde_json::to_value(value).map_err(|e| PortError::Storage(e.to_string()))
}
