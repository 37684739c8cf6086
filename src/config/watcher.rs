//! Rule source watcher for hot reload.

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::rules::source::rule_sources;
use crate::rules::RuleStore;

/// Watches every rule source of a project and reloads the store on change.
pub struct RulesWatcher {
    store: Arc<RuleStore>,
    files: Vec<PathBuf>,
}

impl RulesWatcher {
    pub fn new(store: Arc<RuleStore>) -> Self {
        let files = rule_sources(store.project())
            .into_iter()
            .map(|(path, _)| absolute(&path))
            .collect();
        Self { store, files }
    }

    /// Files whose changes trigger a reload.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let files = self.files.clone();
        let store = self.store;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if is_relevant(&event, &files) {
                        tracing::info!(paths = ?event.paths, "Redirect rules changed, reloading...");
                        // Failures are logged by the store and the current rules stay.
                        let _ = store.reload();
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        for dir in watch_dirs(&self.files) {
            // Missing directories have nothing to reload from.
            if dir.is_dir() {
                watcher.watch(dir, RecursiveMode::NonRecursive)?;
            }
        }

        tracing::info!(files = ?self.files, "Rule watcher started");
        Ok(watcher)
    }
}

/// Distinct parent directories of the rule files.
pub fn watch_dirs(files: &[PathBuf]) -> BTreeSet<&Path> {
    files.iter().filter_map(|f| f.parent()).collect()
}

/// Whether a file system event touches one of the rule files.
pub fn is_relevant(event: &Event, files: &[PathBuf]) -> bool {
    match event.kind {
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_) => {
            event.paths.iter().any(|p| files.contains(&absolute(p)))
        }
        _ => false,
    }
}

// Canonical directory + file name, so the file itself need not exist.
fn absolute(path: &Path) -> PathBuf {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    match (parent.canonicalize(), path.file_name()) {
        (Ok(dir), Some(name)) => dir.join(name),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ProjectConfig;
    use crate::rules::RuleSet;
    use notify::event::{CreateKind, DataChange, ModifyKind};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_each_directory_watched_once() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("public")).unwrap();
        let project = ProjectConfig {
            project_dir: dir.path().to_path_buf(),
            dist_dir: Some("public".into()),
            ..Default::default()
        };
        let store = Arc::new(RuleStore::with_rules(project, RuleSet::default()));
        let watcher = RulesWatcher::new(store);

        assert_eq!(watcher.files().len(), 3);
        let dirs = watch_dirs(watcher.files());
        assert_eq!(dirs.len(), 2);
        let root = dir.path().canonicalize().unwrap();
        assert!(dirs.contains(root.as_path()));
        assert!(dirs.contains(root.join("public").as_path()));
    }

    fn store(dir: &TempDir) -> Arc<RuleStore> {
        let project = ProjectConfig {
            project_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        Arc::new(RuleStore::with_rules(project, RuleSet::default()))
    }

    fn event(kind: EventKind, path: PathBuf) -> Event {
        Event {
            kind,
            paths: vec![path],
            attrs: Default::default(),
        }
    }

    #[test]
    fn test_is_relevant() {
        let dir = TempDir::new().unwrap();
        let watcher = RulesWatcher::new(store(&dir));
        let files = watcher.files().to_vec();

        let modify = || EventKind::Modify(ModifyKind::Data(DataChange::Any));
        assert!(is_relevant(&event(modify(), dir.path().join("_redirects")), &files));
        assert!(is_relevant(
            &event(EventKind::Create(CreateKind::File), dir.path().join("netlify.toml")),
            &files
        ));
        assert!(!is_relevant(&event(modify(), dir.path().join("other.txt")), &files));
        assert!(!is_relevant(
            &event(EventKind::Access(notify::event::AccessKind::Any), dir.path().join("_redirects")),
            &files
        ));
    }

    #[test]
    fn test_watcher_starts_without_rule_files() {
        let dir = TempDir::new().unwrap();
        let watcher = RulesWatcher::new(store(&dir));
        assert!(watcher.run().is_ok());
    }

    #[test]
    fn test_watcher_reloads_on_change() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("_redirects"), "/a /b\n").unwrap();
        let store = store(&dir);
        let _watcher = RulesWatcher::new(store.clone()).run().unwrap();

        fs::write(dir.path().join("_redirects"), "/a /b\n/c /d\n").unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while store.current().len() != 2 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(50));
        }
        assert_eq!(store.current().len(), 2);
    }
}
