//! Sled-backed store
//!
//! Layout, per generation `g`:
//! - `{g}/documents`: file path → JSON record
//! - `{g}/index/{collection}/{index}`: `{key}\x1D{filepath}` → JSON object of
//!   the coerced index components
//!
//! The live generation number is kept under `generation` in the default
//! tree. Rebuilds seed a new generation and only replace the live one on
//! commit, so a failed rebuild leaves the previous data untouched.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{Map, Value};
use std::ops::Bound;
use tokio::sync::RwLock;

use super::filter::{self, Filter, FilterSuffixes};
use super::{PageInfo, PutOptions, Store, StoreEdge, StoreQueryOptions, StoreQueryResponse, FILEPATH_INDEX};
use crate::bridge::Glob;
use crate::error::{Error, Result};
use crate::schema::{FieldType, IndexDefinition, IndexField, COLLECTION_KEY};

/// Separates the index key from the file path in stored index keys
const KEY_PATH_SEPARATOR: u8 = 0x1D;
const GENERATION_KEY: &str = "generation";

#[derive(Debug, Default)]
struct Generations {
    live: u64,
    building: Option<u64>,
}

pub struct LevelStore {
    db: sled::Db,
    generations: RwLock<Generations>,
}

impl LevelStore {
    /// Open (or create) an on-disk store
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A store that lives in memory and disappears on drop
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        let live = match db.get(GENERATION_KEY)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_ref().try_into().map_err(|_| Error::StoreError {
                    message: "corrupt generation marker".to_string(),
                })?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };
        let store = Self {
            db,
            generations: RwLock::new(Generations { live, building: None }),
        };
        // Leftovers from an interrupted rebuild
        store.drop_generations_except(live)?;
        Ok(store)
    }

    fn documents(&self, generation: u64) -> Result<sled::Tree> {
        Ok(self.db.open_tree(format!("{}/documents", generation))?)
    }

    fn index_tree(&self, generation: u64, collection: &str, index: &str) -> Result<sled::Tree> {
        Ok(self.db.open_tree(format!("{}/index/{}/{}", generation, collection, index))?)
    }

    fn drop_generations_except(&self, keep: u64) -> Result<()> {
        let keep_prefix = format!("{}/", keep);
        for name in self.db.tree_names() {
            let name = String::from_utf8_lossy(&name).to_string();
            let is_generation = name.split('/').next().map(|g| g.parse::<u64>().is_ok()).unwrap_or(false);
            if is_generation && !name.starts_with(&keep_prefix) {
                self.db.drop_tree(name.as_bytes())?;
            }
        }
        Ok(())
    }

    /// Generations a live write must reach
    async fn write_targets(&self) -> Vec<u64> {
        let generations = self.generations.read().await;
        let mut targets = vec![generations.live];
        if let Some(building) = generations.building {
            targets.push(building);
        }
        targets
    }

    fn write_record(&self, generation: u64, filepath: &str, data: &Value, options: &PutOptions) -> Result<()> {
        let record = data.as_object().ok_or_else(|| Error::StoreError {
            message: format!("record for {} is not an object", filepath),
        })?;
        self.remove_record(generation, filepath, options)?;

        self.documents(generation)?
            .insert(filepath.as_bytes(), serde_json::to_vec(data)?)?;

        let collection = match options.collection.as_deref().or_else(|| record_collection(record)) {
            Some(collection) => collection,
            None => return Ok(()),
        };
        for index in indexes_with_filepath(&options.index_definitions) {
            let components = match index_entry(&index, filepath, record) {
                Some(components) => components,
                None => continue,
            };
            let key = make_stored_key(&index, filepath, record);
            if let Some(key) = key {
                self.index_tree(generation, collection, &index.name)?
                    .insert(key, serde_json::to_vec(&Value::Object(components))?)?;
            }
        }
        Ok(())
    }

    fn remove_record(&self, generation: u64, filepath: &str, options: &PutOptions) -> Result<bool> {
        let documents = self.documents(generation)?;
        let previous = match documents.remove(filepath.as_bytes())? {
            Some(bytes) => bytes,
            None => return Ok(false),
        };
        let previous: Value = serde_json::from_slice(&previous)?;
        let record = match previous.as_object() {
            Some(record) => record,
            None => return Ok(true),
        };
        let collection = match record_collection(record).or(options.collection.as_deref()) {
            Some(collection) => collection,
            None => return Ok(true),
        };
        for index in indexes_with_filepath(&options.index_definitions) {
            if let Some(key) = make_stored_key(&index, filepath, record) {
                self.index_tree(generation, collection, &index.name)?.remove(key)?;
            }
        }
        Ok(true)
    }

    fn run_query(&self, generation: u64, options: &StoreQueryOptions) -> Result<StoreQueryResponse> {
        let plan = plan_query(options)?;
        let tree = self.index_tree(generation, &options.collection, &plan.index.name)?;
        let documents = self.documents(generation)?;

        let (mut lower, mut upper) = plan.bounds();
        if let Some(cursor) = &options.gte {
            lower = tighten_lower(lower, Bound::Included(decode_cursor(cursor)?));
        }
        if let Some(cursor) = &options.gt {
            lower = tighten_lower(lower, Bound::Excluded(decode_cursor(cursor)?));
        }
        if let Some(cursor) = &options.lte {
            upper = tighten_upper(upper, Bound::Included(decode_cursor(cursor)?));
        }
        if let Some(cursor) = &options.lt {
            upper = tighten_upper(upper, Bound::Excluded(decode_cursor(cursor)?));
        }

        let predicate = filter::make_filter(options.filter_chain.clone());
        let limit = options.limit.unwrap_or(usize::MAX);

        let range = tree.range((lower, upper));
        let entries: Box<dyn Iterator<Item = sled::Result<(sled::IVec, sled::IVec)>>> = if options.reverse {
            Box::new(range.rev())
        } else {
            Box::new(range)
        };

        let mut edges = Vec::new();
        let mut has_next_page = false;
        for entry in entries {
            let (key, value) = entry?;
            let path = match key.iter().rposition(|b| *b == KEY_PATH_SEPARATOR) {
                Some(at) => String::from_utf8_lossy(&key[at + 1..]).to_string(),
                None => continue,
            };

            if !options.filter_chain.is_empty() {
                let candidate: Value = if plan.full_scan {
                    match documents.get(path.as_bytes())? {
                        Some(bytes) => serde_json::from_slice(&bytes)?,
                        None => continue,
                    }
                } else {
                    serde_json::from_slice(&value)?
                };
                if !predicate(&candidate) {
                    continue;
                }
            }

            if edges.len() == limit {
                has_next_page = true;
                break;
            }
            edges.push(StoreEdge {
                cursor: STANDARD.encode(&key),
                path,
            });
        }

        let has_previous_page = if options.reverse {
            options.lt.is_some() || options.lte.is_some()
        } else {
            options.gt.is_some() || options.gte.is_some()
        };
        let page_info = PageInfo {
            has_previous_page,
            has_next_page,
            start_cursor: edges.first().map(|e| e.cursor.clone()).unwrap_or_default(),
            end_cursor: edges.last().map(|e| e.cursor.clone()).unwrap_or_default(),
        };
        Ok(StoreQueryResponse { edges, page_info })
    }
}

#[async_trait]
impl Store for LevelStore {
    async fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        let glob = Glob::new(pattern)?;
        let live = self.generations.read().await.live;
        let mut paths = Vec::new();
        for entry in self.documents(live)?.iter() {
            let (key, _) = entry?;
            let path = String::from_utf8_lossy(&key).to_string();
            if glob.is_match(&path) {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    async fn get(&self, filepath: &str) -> Result<Value> {
        let live = self.generations.read().await.live;
        match self.documents(live)?.get(filepath.as_bytes())? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Err(Error::not_found(filepath)),
        }
    }

    async fn put(&self, filepath: &str, data: Value, options: &PutOptions) -> Result<()> {
        for generation in self.write_targets().await {
            self.write_record(generation, filepath, &data, options)?;
        }
        Ok(())
    }

    async fn seed(&self, filepath: &str, data: Value, options: &PutOptions) -> Result<()> {
        let generation = {
            let generations = self.generations.read().await;
            generations.building.unwrap_or(generations.live)
        };
        self.write_record(generation, filepath, &data, options)
    }

    async fn delete(&self, filepath: &str, options: &PutOptions) -> Result<()> {
        for generation in self.write_targets().await {
            self.remove_record(generation, filepath, options)?;
        }
        Ok(())
    }

    async fn query(&self, options: StoreQueryOptions) -> Result<StoreQueryResponse> {
        let live = self.generations.read().await.live;
        self.run_query(live, &options)
    }

    fn supports_seeding(&self) -> bool {
        true
    }

    fn supports_indexing(&self) -> bool {
        true
    }

    async fn begin_generation(&self) -> Result<()> {
        let mut generations = self.generations.write().await;
        let next = generations.live + 1;
        generations.building = Some(next);
        self.drop_generations_except(generations.live)?;
        Ok(())
    }

    async fn commit_generation(&self) -> Result<()> {
        let mut generations = self.generations.write().await;
        let building = match generations.building.take() {
            Some(building) => building,
            None => return Ok(()),
        };
        self.db.insert(GENERATION_KEY, building.to_be_bytes().to_vec())?;
        self.db.flush_async().await?;
        generations.live = building;
        self.drop_generations_except(building)?;
        tracing::debug!(generation = building, "promoted store generation");
        Ok(())
    }

    async fn abort_generation(&self) -> Result<()> {
        let mut generations = self.generations.write().await;
        if generations.building.take().is_some() {
            self.drop_generations_except(generations.live)?;
        }
        Ok(())
    }
}

// ============================================================================
// Query planning
// ============================================================================

struct QueryPlan {
    index: IndexDefinition,
    suffixes: FilterSuffixes,
    full_scan: bool,
}

impl QueryPlan {
    /// Key range implied by the filter suffixes
    fn bounds(&self) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
        if self.full_scan {
            return (Bound::Unbounded, Bound::Unbounded);
        }
        // Only textual trailing values sort the same as their keys
        let textual = matches!(
            self.suffixes.trailing_type,
            Some(FieldType::String | FieldType::Reference | FieldType::Image)
        );
        if textual {
            let lower = self
                .suffixes
                .left
                .as_ref()
                .map(|l| Bound::Included(l.as_bytes().to_vec()))
                .unwrap_or_else(|| prefix_lower(&self.suffixes));
            let upper = self
                .suffixes
                .right
                .as_ref()
                .map(|r| {
                    let mut bytes = r.as_bytes().to_vec();
                    bytes.push(0xFF);
                    Bound::Excluded(bytes)
                })
                .unwrap_or_else(|| prefix_upper(&self.suffixes));
            (lower, upper)
        } else {
            (prefix_lower(&self.suffixes), prefix_upper(&self.suffixes))
        }
    }
}

fn prefix_lower(suffixes: &FilterSuffixes) -> Bound<Vec<u8>> {
    match &suffixes.prefix {
        Some(prefix) => Bound::Included(format!("{}{}", prefix, filter::INDEX_KEY_FIELD_SEPARATOR).into_bytes()),
        None => Bound::Unbounded,
    }
}

fn prefix_upper(suffixes: &FilterSuffixes) -> Bound<Vec<u8>> {
    match &suffixes.prefix {
        Some(prefix) => {
            let mut bytes = format!("{}{}", prefix, filter::INDEX_KEY_FIELD_SEPARATOR).into_bytes();
            bytes.push(0xFF);
            Bound::Excluded(bytes)
        }
        None => Bound::Unbounded,
    }
}

fn plan_query(options: &StoreQueryOptions) -> Result<QueryPlan> {
    let chain: &[Filter] = &options.filter_chain;

    let sort = options.sort.as_deref().filter(|s| *s != FILEPATH_INDEX);
    if let Some(sort) = sort {
        let index = options
            .index_definitions
            .iter()
            .find(|i| i.name == sort)
            .ok_or_else(|| Error::query(format!("No index '{}' on collection '{}'", sort, options.collection)))?;
        if let Some(suffixes) = filter::make_filter_suffixes(chain, index) {
            return Ok(QueryPlan {
                index: index.clone(),
                suffixes,
                full_scan: false,
            });
        }
        // Ordered by the index, filtered record by record
        return Ok(QueryPlan {
            index: index.clone(),
            suffixes: FilterSuffixes::default(),
            full_scan: true,
        });
    }

    if !chain.is_empty() {
        for index in &options.index_definitions {
            if let Some(suffixes) = filter::make_filter_suffixes(chain, index) {
                return Ok(QueryPlan {
                    index: index.clone(),
                    suffixes,
                    full_scan: false,
                });
            }
        }
        tracing::debug!(
            collection = %options.collection,
            filters = chain.len(),
            "no index covers the filter chain, scanning the whole collection"
        );
    }

    Ok(QueryPlan {
        index: filepath_index(),
        suffixes: FilterSuffixes::default(),
        full_scan: true,
    })
}

fn filepath_index() -> IndexDefinition {
    IndexDefinition {
        name: FILEPATH_INDEX.to_string(),
        fields: vec![IndexField {
            name: FILEPATH_INDEX.to_string(),
            kind: FieldType::String,
        }],
    }
}

fn indexes_with_filepath(definitions: &[IndexDefinition]) -> Vec<IndexDefinition> {
    let mut indexes = vec![filepath_index()];
    indexes.extend(definitions.iter().filter(|d| d.name != FILEPATH_INDEX).cloned());
    indexes
}

fn record_collection(record: &Map<String, Value>) -> Option<&str> {
    record.get(COLLECTION_KEY).and_then(Value::as_str)
}

/// Index components of a record; the file path index uses the path itself
fn index_entry(index: &IndexDefinition, filepath: &str, record: &Map<String, Value>) -> Option<Map<String, Value>> {
    if index.name == FILEPATH_INDEX {
        let mut components = Map::new();
        components.insert(FILEPATH_INDEX.to_string(), Value::String(filepath.to_string()));
        return Some(components);
    }
    filter::index_components(index, record)
}

fn make_stored_key(index: &IndexDefinition, filepath: &str, record: &Map<String, Value>) -> Option<Vec<u8>> {
    let key = if index.name == FILEPATH_INDEX {
        filepath.to_string()
    } else {
        filter::make_key_for_field(index, record)?
    };
    let mut bytes = key.into_bytes();
    bytes.push(KEY_PATH_SEPARATOR);
    bytes.extend_from_slice(filepath.as_bytes());
    Some(bytes)
}

fn decode_cursor(cursor: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(cursor)
        .map_err(|e| Error::query(format!("Invalid cursor '{}': {}", cursor, e)))
}

fn tighten_lower(current: Bound<Vec<u8>>, candidate: Bound<Vec<u8>>) -> Bound<Vec<u8>> {
    match (&current, &candidate) {
        (Bound::Unbounded, _) => candidate,
        (_, Bound::Unbounded) => current,
        (Bound::Included(a) | Bound::Excluded(a), Bound::Included(b) | Bound::Excluded(b)) => {
            if b > a || (b == a && matches!(candidate, Bound::Excluded(_))) {
                candidate
            } else {
                current
            }
        }
    }
}

fn tighten_upper(current: Bound<Vec<u8>>, candidate: Bound<Vec<u8>>) -> Bound<Vec<u8>> {
    match (&current, &candidate) {
        (Bound::Unbounded, _) => candidate,
        (_, Bound::Unbounded) => current,
        (Bound::Included(a) | Bound::Excluded(a), Bound::Included(b) | Bound::Excluded(b)) => {
            if b < a || (b == a && matches!(candidate, Bound::Excluded(_))) {
                candidate
            } else {
                current
            }
        }
    }
}
