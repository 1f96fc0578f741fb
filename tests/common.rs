#![allow(dead_code)]

use component_loader::packaging::Context;
use component_loader::{Loader, PackagingHook};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

/// Unit tree on disk, removed when dropped
pub struct UnitTree {
    pub temp_dir: TempDir,
}

impl UnitTree {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("create temp dir"),
        }
    }

    /// Absolute path of a directory relative to the tree (`app/db`)
    pub fn path(&self, relative: &str) -> PathBuf {
        self.temp_dir.path().join(relative)
    }

    /// Create a unit directory with the given `unit.toml` content
    pub fn unit(&self, relative: &str, marker: &str) -> &Self {
        self.unit_with_marker(relative, "unit.toml", marker)
    }

    pub fn unit_with_marker(&self, relative: &str, marker_file: &str, marker: &str) -> &Self {
        let dir = self.path(relative);
        fs::create_dir_all(&dir).expect("create unit dir");
        fs::write(dir.join(marker_file), marker).expect("write marker");
        self
    }

    /// Create a module file (`<name>.toml`) inside a unit
    pub fn module(&self, unit: &str, name: &str) -> &Self {
        self.file(unit, &format!("{}.toml", name))
    }

    pub fn file(&self, dir: &str, file_name: &str) -> &Self {
        let dir = self.path(dir);
        fs::create_dir_all(&dir).expect("create dir");
        fs::write(dir.join(file_name), "").expect("write file");
        self
    }

    /// Create a plain directory (no marker)
    pub fn dir(&self, relative: &str) -> &Self {
        fs::create_dir_all(self.path(relative)).expect("create dir");
        self
    }

    /// Create a symlink `link` pointing at `target`, both relative to the tree
    #[cfg(unix)]
    pub fn symlink(&self, target: &str, link: &str) -> &Self {
        std::os::unix::fs::symlink(self.path(target), self.path(link)).expect("create symlink");
        self
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }
}

/// Loader recording every name it was asked to load
#[derive(Default)]
pub struct RecordingLoader {
    calls: Mutex<Vec<String>>,
    fail_on: Option<String>,
}

impl RecordingLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail when asked to load `name`
    pub fn failing_on(name: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: Some(name.to_string()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == name).count()
    }
}

impl Loader for RecordingLoader {
    type Handle = String;

    fn load(&self, name: &str) -> anyhow::Result<String> {
        if self.fail_on.as_deref() == Some(name) {
            anyhow::bail!("refusing to load {}", name);
        }
        self.calls.lock().unwrap().push(name.to_string());
        Ok(format!("handle:{}", name))
    }
}

/// Hook recording lifecycle events as strings
#[derive(Default)]
pub struct RecordingHook {
    pub events: Mutex<Vec<String>>,
}

impl RecordingHook {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl PackagingHook for RecordingHook {
    fn on_unit_loaded(&self, unit: &str, _context: &Context) {
        self.events.lock().unwrap().push(format!("unit:{}", unit));
    }

    fn on_all_units_loaded(&self, _context: &Context) {
        self.events.lock().unwrap().push("all".to_string());
    }
}

/// Position of `name` in `order`
pub fn position(order: &[String], name: &str) -> usize {
    order
        .iter()
        .position(|n| n == name)
        .unwrap_or_else(|| panic!("{} not in {:?}", name, order))
}
