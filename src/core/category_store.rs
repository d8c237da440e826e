//! Category rules and party mapping tables with merge-on-save persistence
//!
//! The store loads three human-editable YAML files:
//!
//! ```text
//! categories.yaml   categories: [{ name, keywords: [...] }]
//! creditors.yaml    "party name": Category
//! debtors.yaml      "party name": Category
//! ```
//!
//! Mapping keys are matched after trimming and lowercasing, but the spelling
//! and order of on-disk entries survive a load/save round-trip.
//!
//! # Persistence
//!
//! [`CategoryStore::save`] never truncates a mapping file with a stale
//! in-memory copy. It re-reads the file, overlays only the entries learned
//! in this process, and replaces the file atomically. The only destructive
//! path is [`CategoryStore::overwrite_with_backup`], which first copies every
//! mapping file to a timestamped `.bak`.
//!
//! # Thread Safety
//!
//! All tables live behind one `RwLock`. Lookups take the read lock; learning
//! and saving take the write lock, so a learned entry is visible to every
//! subsequent lookup as soon as `learn_*` returns.

use crate::types::{Category, StatementError};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

pub const CATEGORIES_FILE: &str = "categories.yaml";
pub const CREDITORS_FILE: &str = "creditors.yaml";
pub const DEBTORS_FILE: &str = "debtors.yaml";

/// Locations of the three persistent tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub categories: PathBuf,
    pub creditors: PathBuf,
    pub debtors: PathBuf,
}

impl StorePaths {
    /// Default file names inside a configuration directory
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            categories: dir.join(CATEGORIES_FILE),
            creditors: dir.join(CREDITORS_FILE),
            debtors: dir.join(DEBTORS_FILE),
        }
    }
}

fn normalize_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Order-preserving party → category table
#[derive(Debug, Clone, Default, PartialEq)]
struct MappingTable {
    /// (key as written, category) in file order
    entries: Vec<(String, String)>,
    /// normalized key → position in `entries`
    index: HashMap<String, usize>,
    /// normalized keys learned since the last save
    learned: HashSet<String>,
}

impl MappingTable {
    fn get(&self, name: &str) -> Option<&str> {
        self.index
            .get(&normalize_key(name))
            .map(|&i| self.entries[i].1.as_str())
    }

    fn upsert(&mut self, key: &str, category: &str) -> String {
        let normalized = normalize_key(key);
        match self.index.get(&normalized) {
            Some(&i) => self.entries[i].1 = category.to_string(),
            None => {
                self.index.insert(normalized.clone(), self.entries.len());
                self.entries
                    .push((key.trim().to_string(), category.to_string()));
            }
        }
        normalized
    }

    fn learn(&mut self, key: &str, category: &str) {
        let normalized = self.upsert(key, category);
        self.learned.insert(normalized);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    /// Disk state with this table's learned entries laid over it
    fn merged_onto(&self, mut disk: MappingTable) -> MappingTable {
        for (key, category) in &self.entries {
            if self.learned.contains(&normalize_key(key)) {
                disk.upsert(key, category);
            }
        }
        disk.learned.clear();
        disk
    }

    fn from_yaml(content: &str, path: &Path) -> Result<Self, StatementError> {
        let mut table = MappingTable::default();
        if content.trim().is_empty() {
            return Ok(table);
        }

        let value: Value = serde_yaml::from_str(content)
            .map_err(|e| StatementError::from(e).in_file(path))?;

        let mapping = match value {
            Value::Null => return Ok(table),
            Value::Mapping(mapping) => mapping,
            _ => {
                return Err(StatementError::parse(
                    path.display().to_string(),
                    None,
                    "expected a mapping of party names to categories",
                ))
            }
        };

        for (key, category) in mapping {
            let (Some(key), Some(category)) = (yaml_scalar(&key), yaml_scalar(&category)) else {
                warn!(path = %path.display(), "skipping non-scalar mapping entry");
                continue;
            };
            if normalize_key(&key).is_empty() {
                continue;
            }
            table.upsert(&key, &category);
        }

        Ok(table)
    }

    fn to_yaml(&self) -> Result<String, StatementError> {
        let mut mapping = Mapping::new();
        for (key, category) in &self.entries {
            mapping.insert(Value::String(key.clone()), Value::String(category.clone()));
        }
        serde_yaml::to_string(&mapping).map_err(StatementError::from)
    }

    fn load(path: &Path) -> Result<Self, StatementError> {
        match fs::read_to_string(path) {
            Ok(content) => Self::from_yaml(&content, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "mapping file not found, starting empty");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn yaml_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[derive(Debug, Default, Deserialize)]
struct CategoryFile {
    #[serde(default)]
    categories: Vec<Category>,
}

fn load_categories(path: &Path) -> Result<Vec<Category>, StatementError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "category rules not found, keyword tier disabled");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let file: CategoryFile = serde_yaml::from_str(&content)
        .map_err(|e| StatementError::from(e).in_file(path))?;

    Ok(dedup_categories(file.categories))
}

fn dedup_categories(categories: Vec<Category>) -> Vec<Category> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(categories.len());
    for category in categories {
        let name = category.name.trim().to_string();
        if name.is_empty() {
            warn!("skipping category without a name");
            continue;
        }
        if !seen.insert(name.to_lowercase()) {
            warn!(category = %name, "duplicate category name, keeping the first definition");
            continue;
        }
        unique.push(Category {
            name,
            keywords: category.keywords,
        });
    }
    unique
}

/// Write `content` to `path` via a sibling temp file and rename
fn write_atomic(path: &Path, content: &str) -> Result<(), StatementError> {
    let to_persistence = |e: std::io::Error| StatementError::persistence(path.display().to_string(), e.to_string());

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(to_persistence)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    fs::write(&tmp, content).map_err(to_persistence)?;
    fs::rename(&tmp, path).map_err(to_persistence)
}

#[derive(Debug, Default)]
struct Tables {
    categories: Vec<Category>,
    creditors: MappingTable,
    debtors: MappingTable,
}

/// Loaded category rules and learned party mappings
#[derive(Debug)]
pub struct CategoryStore {
    paths: StorePaths,
    tables: RwLock<Tables>,
}

impl CategoryStore {
    /// Load all three tables; missing files start empty
    ///
    /// # Errors
    ///
    /// Returns an error if a file exists but cannot be read or parsed.
    pub fn load(paths: StorePaths) -> Result<Self, StatementError> {
        let categories = load_categories(&paths.categories)?;
        let creditors = MappingTable::load(&paths.creditors)?;
        let debtors = MappingTable::load(&paths.debtors)?;

        info!(
            categories = categories.len(),
            creditors = creditors.len(),
            debtors = debtors.len(),
            "loaded category store"
        );

        Ok(Self {
            paths,
            tables: RwLock::new(Tables {
                categories,
                creditors,
                debtors,
            }),
        })
    }

    /// Build a store from in-memory tables; `paths` is where `save` writes
    pub fn with_tables(
        paths: StorePaths,
        categories: Vec<Category>,
        creditors: &[(&str, &str)],
        debtors: &[(&str, &str)],
    ) -> Self {
        let mut tables = Tables {
            categories: dedup_categories(categories),
            ..Tables::default()
        };
        for (key, category) in creditors {
            tables.creditors.upsert(key, category);
        }
        for (key, category) in debtors {
            tables.debtors.upsert(key, category);
        }
        Self {
            paths,
            tables: RwLock::new(tables),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    pub fn lookup_creditor(&self, name: &str) -> Option<String> {
        self.read().creditors.get(name).map(str::to_string)
    }

    pub fn lookup_debtor(&self, name: &str) -> Option<String> {
        self.read().debtors.get(name).map(str::to_string)
    }

    /// Look up the table matching the booking direction
    pub fn lookup(&self, name: &str, is_debtor: bool) -> Option<String> {
        if is_debtor {
            self.lookup_debtor(name)
        } else {
            self.lookup_creditor(name)
        }
    }

    /// Category rules in load order
    pub fn keywords(&self) -> Vec<Category> {
        self.read().categories.clone()
    }

    pub fn category_names(&self) -> Vec<String> {
        self.read()
            .categories
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn learn_creditor(&self, name: &str, category: &str) {
        self.learn(name, false, category);
    }

    pub fn learn_debtor(&self, name: &str, category: &str) {
        self.learn(name, true, category);
    }

    /// Record a mapping in the table matching the booking direction
    ///
    /// Blank names or categories are ignored.
    pub fn learn(&self, name: &str, is_debtor: bool, category: &str) {
        let category = category.trim();
        if normalize_key(name).is_empty() || category.is_empty() {
            return;
        }

        let mut tables = self.write();
        let table = if is_debtor {
            &mut tables.debtors
        } else {
            &mut tables.creditors
        };
        table.learn(name, category);
        debug!(party = %name.trim(), category, is_debtor, "learned mapping");
    }

    /// Number of learned entries not yet flushed
    pub fn pending_changes(&self) -> usize {
        let tables = self.read();
        tables.creditors.learned.len() + tables.debtors.learned.len()
    }

    /// Merge learned entries into the mapping files on disk
    ///
    /// Tables without learned entries are left untouched. Both tables are
    /// attempted even if the first one fails; the first error is returned.
    pub fn save(&self) -> Result<(), StatementError> {
        let mut tables = self.write();
        let Tables {
            creditors, debtors, ..
        } = &mut *tables;

        let creditor_result = Self::merge_table(creditors, &self.paths.creditors);
        let debtor_result = Self::merge_table(debtors, &self.paths.debtors);
        creditor_result.and(debtor_result)
    }

    fn merge_table(table: &mut MappingTable, path: &Path) -> Result<(), StatementError> {
        if table.learned.is_empty() {
            return Ok(());
        }

        let disk = MappingTable::load(path).map_err(|e| {
            StatementError::persistence(
                path.display().to_string(),
                format!("cannot merge with existing file: {}", e),
            )
        })?;
        let merged = table.merged_onto(disk);
        write_atomic(path, &merged.to_yaml()?)?;

        info!(
            path = %path.display(),
            learned = table.learned.len(),
            total = merged.len(),
            "saved mapping table"
        );
        *table = merged;
        Ok(())
    }

    /// Back up each mapping file, then write the in-memory tables verbatim
    ///
    /// Returns the backup files created.
    pub fn overwrite_with_backup(&self) -> Result<Vec<PathBuf>, StatementError> {
        let mut tables = self.write();
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        let mut backups = Vec::new();

        let Tables {
            creditors, debtors, ..
        } = &mut *tables;

        for (table, path) in [
            (creditors, &self.paths.creditors),
            (debtors, &self.paths.debtors),
        ] {
            if path.exists() {
                let mut backup_name = path.file_name().unwrap_or_default().to_os_string();
                backup_name.push(format!(".{}.bak", stamp));
                let backup = path.with_file_name(backup_name);
                fs::copy(path, &backup).map_err(|e| {
                    StatementError::persistence(backup.display().to_string(), e.to_string())
                })?;
                info!(backup = %backup.display(), "backed up mapping table");
                backups.push(backup);
            }

            write_atomic(path, &table.to_yaml()?)?;
            table.learned.clear();
        }

        Ok(backups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    fn seeded_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            CATEGORIES_FILE,
            "categories:\n  - name: Food\n    keywords: [coop, migros]\n  - name: Transport\n    keywords: [sbb]\n",
        );
        write(dir.path(), CREDITORS_FILE, "Employer AG: Salary\nLandlord: Refunds\n");
        write(dir.path(), DEBTORS_FILE, "Coop Pronto: Food\n");
        dir
    }

    #[test]
    fn test_load_reads_all_tables() {
        let dir = seeded_dir();
        let store = CategoryStore::load(StorePaths::in_dir(dir.path())).unwrap();

        assert_eq!(store.category_names(), vec!["Food", "Transport"]);
        assert_eq!(store.keywords()[0].keywords, vec!["coop", "migros"]);
        assert_eq!(store.lookup_creditor("employer ag"), Some("Salary".to_string()));
        assert_eq!(store.lookup_debtor("  COOP PRONTO "), Some("Food".to_string()));
        assert_eq!(store.lookup_debtor("Employer AG"), None);
    }

    #[test]
    fn test_missing_files_load_empty() {
        let dir = TempDir::new().unwrap();
        let store = CategoryStore::load(StorePaths::in_dir(dir.path())).unwrap();
        assert!(store.keywords().is_empty());
        assert_eq!(store.lookup_creditor("anyone"), None);
    }

    #[test]
    fn test_malformed_mapping_is_an_error() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), CREDITORS_FILE, "- just\n- a list\n");
        let result = CategoryStore::load(StorePaths::in_dir(dir.path()));
        assert!(matches!(result, Err(StatementError::Parse { .. })));
    }

    #[test]
    fn test_duplicate_category_names_keep_first() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            CATEGORIES_FILE,
            "categories:\n  - name: Food\n    keywords: [coop]\n  - name: food\n    keywords: [lidl]\n",
        );
        let store = CategoryStore::load(StorePaths::in_dir(dir.path())).unwrap();
        let categories = store.keywords();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].keywords, vec!["coop"]);
    }

    #[test]
    fn test_round_trip_keeps_originals_and_adds_learned() {
        let dir = seeded_dir();
        let paths = StorePaths::in_dir(dir.path());
        let store = CategoryStore::load(paths.clone()).unwrap();

        store.learn_creditor("Insurance Co", "Insurance");
        store.learn_creditor("Tax Office", "Taxes");
        store.learn_debtor("Migros Online", "Food");
        assert_eq!(store.pending_changes(), 3);
        store.save().unwrap();
        assert_eq!(store.pending_changes(), 0);

        let reloaded = CategoryStore::load(paths.clone()).unwrap();
        assert_eq!(reloaded.lookup_creditor("Employer AG"), Some("Salary".to_string()));
        assert_eq!(reloaded.lookup_creditor("Landlord"), Some("Refunds".to_string()));
        assert_eq!(reloaded.lookup_creditor("insurance co"), Some("Insurance".to_string()));
        assert_eq!(reloaded.lookup_creditor("Tax Office"), Some("Taxes".to_string()));
        assert_eq!(reloaded.lookup_debtor("Coop Pronto"), Some("Food".to_string()));
        assert_eq!(reloaded.lookup_debtor("Migros Online"), Some("Food".to_string()));

        let creditors = fs::read_to_string(&paths.creditors).unwrap();
        let employer = creditors.find("Employer AG").unwrap();
        let landlord = creditors.find("Landlord").unwrap();
        let insurance = creditors.find("Insurance Co").unwrap();
        assert!(employer < landlord && landlord < insurance, "order changed:\n{}", creditors);
    }

    #[test]
    fn test_save_preserves_external_edits() {
        let dir = seeded_dir();
        let paths = StorePaths::in_dir(dir.path());
        let store = CategoryStore::load(paths.clone()).unwrap();

        // Someone edits the file while the store is loaded
        write(
            dir.path(),
            CREDITORS_FILE,
            "Employer AG: Salary\nLandlord: Refunds\nManual Entry: Gifts\n",
        );

        store.learn_creditor("Insurance Co", "Insurance");
        store.save().unwrap();

        let reloaded = CategoryStore::load(paths).unwrap();
        assert_eq!(reloaded.lookup_creditor("Manual Entry"), Some("Gifts".to_string()));
        assert_eq!(reloaded.lookup_creditor("Insurance Co"), Some("Insurance".to_string()));
    }

    #[test]
    fn test_save_without_learning_leaves_files_untouched() {
        let dir = seeded_dir();
        let paths = StorePaths::in_dir(dir.path());
        let before = fs::read_to_string(&paths.creditors).unwrap();

        let store = CategoryStore::load(paths.clone()).unwrap();
        store.save().unwrap();

        assert_eq!(fs::read_to_string(&paths.creditors).unwrap(), before);
    }

    #[test]
    fn test_save_refuses_to_clobber_corrupt_file() {
        let dir = seeded_dir();
        let paths = StorePaths::in_dir(dir.path());
        let store = CategoryStore::load(paths.clone()).unwrap();

        write(dir.path(), CREDITORS_FILE, "- corrupted\n");
        store.learn_creditor("Insurance Co", "Insurance");

        let result = store.save();
        assert!(matches!(result, Err(StatementError::Persistence { .. })));
        assert_eq!(fs::read_to_string(&paths.creditors).unwrap(), "- corrupted\n");
        assert_eq!(store.pending_changes(), 1);
    }

    #[test]
    fn test_overwrite_with_backup_creates_backup() {
        let dir = seeded_dir();
        let paths = StorePaths::in_dir(dir.path());
        let store = CategoryStore::load(paths.clone()).unwrap();
        store.learn_creditor("Insurance Co", "Insurance");

        let backups = store.overwrite_with_backup().unwrap();
        assert_eq!(backups.len(), 2);
        for backup in &backups {
            assert!(backup.exists());
            assert!(backup.to_string_lossy().ends_with(".bak"));
        }

        let reloaded = CategoryStore::load(paths).unwrap();
        assert_eq!(reloaded.lookup_creditor("Insurance Co"), Some("Insurance".to_string()));
    }

    #[test]
    fn test_learning_blank_values_is_ignored() {
        let dir = TempDir::new().unwrap();
        let store = CategoryStore::load(StorePaths::in_dir(dir.path())).unwrap();
        store.learn_creditor("   ", "Food");
        store.learn_creditor("Coop", "  ");
        assert_eq!(store.pending_changes(), 0);
    }

    #[test]
    fn test_concurrent_learning_loses_nothing() {
        let dir = TempDir::new().unwrap();
        let paths = StorePaths::in_dir(dir.path());
        let store = Arc::new(CategoryStore::load(paths.clone()).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..50 {
                        store.learn(&format!("party-{}-{}", t, i), i % 2 == 0, "Misc");
                        if i % 10 == 0 {
                            let _ = store.save();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        store.save().unwrap();

        let reloaded = CategoryStore::load(paths).unwrap();
        for t in 0..8 {
            for i in 0..50 {
                let name = format!("party-{}-{}", t, i);
                assert_eq!(reloaded.lookup(&name, i % 2 == 0), Some("Misc".to_string()), "{}", name);
            }
        }
    }
}
