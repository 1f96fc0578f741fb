//! Unit discovery
//!
//! Walks the configured root directories and finds loadable units (directories
//! holding a marker file) and their modules (every other file with the module
//! extension), applying include/exclude scoping and ignore/disable rules.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::packaging::naming;
use crate::packaging::registry::manifest::{DescriptorRegistry, UnitDescriptor};
use crate::packaging::traits::{Context, IgnoreDetector, PackagingError, Result};

/// Default marker file identifying a unit directory
pub const DEFAULT_MARKER_FILE: &str = "unit.toml";

/// Default extension of module files
pub const DEFAULT_MODULE_EXTENSION: &str = "toml";

/// A unit and its modules, in discovery order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitComponents {
    /// Fully qualified unit name
    pub name: String,
    /// Fully qualified module names
    pub modules: Vec<String>,
}

/// Ordered mapping from unit name to its modules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentTable {
    units: Vec<UnitComponents>,
}

impl ComponentTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a unit with no modules yet
    pub fn insert_unit(&mut self, name: impl Into<String>) {
        self.units.push(UnitComponents {
            name: name.into(),
            modules: Vec::new(),
        });
    }

    /// Append a unit with its modules
    pub fn insert(&mut self, name: impl Into<String>, modules: Vec<String>) {
        self.units.push(UnitComponents {
            name: name.into(),
            modules,
        });
    }

    /// Modules of a unit
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.units
            .iter()
            .find(|u| u.name == name)
            .map(|u| u.modules.as_slice())
    }

    /// Whether a unit is present
    pub fn contains(&self, name: &str) -> bool {
        self.units.iter().any(|u| u.name == name)
    }

    /// Units in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &UnitComponents> {
        self.units.iter()
    }

    /// Unit names in discovery order
    pub fn unit_names(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.name.as_str()).collect()
    }

    /// Number of units
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the table holds no unit
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    fn last_mut(&mut self) -> Option<&mut UnitComponents> {
        self.units.last_mut()
    }
}

/// Component table of one root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootComponents {
    /// Configured root path
    pub root: PathBuf,
    /// Units found under it
    pub table: ComponentTable,
}

/// Everything a discovery pass found
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    /// Per-root component tables, in configured root order
    pub roots: Vec<RootComponents>,
    /// Units eligible for loading
    pub all_units: HashSet<String>,
    /// Units that declared themselves disabled
    pub disabled_units: Vec<String>,
    /// Units skipped by ignore rules or the ignore detector
    pub ignored_units: Vec<String>,
    /// Directories confirmed not to be units
    pub not_unit_paths: Vec<PathBuf>,
    /// Effective descriptor of every eligible unit
    pub descriptors: HashMap<String, UnitDescriptor>,
}

impl DiscoveryReport {
    /// All roots merged into one table, root order then discovery order
    pub fn combined(&self) -> ComponentTable {
        let mut combined = ComponentTable::new();
        for root in &self.roots {
            for unit in root.table.iter() {
                combined.insert(unit.name.clone(), unit.modules.clone());
            }
        }
        combined
    }

    /// Whether `name` falls inside a disabled unit's subtree
    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled_units
            .iter()
            .any(|disabled| naming::matches_pattern(disabled, name))
    }

    /// Whether a unit is, or lies inside, a unit skipped as ignored
    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignored_units
            .iter()
            .any(|ignored| naming::matches_pattern(ignored, name))
    }
}

/// Filesystem layout and ignore rules used during discovery
#[derive(Debug, Clone)]
pub struct ScanRules {
    /// File whose presence marks a unit directory
    pub marker_file: String,
    /// Extension of module files, without the dot
    pub module_extension: String,
    /// Unit name patterns to ignore
    pub ignored_units: Vec<String>,
    /// Module names (or trailing parts of them) to ignore
    pub ignored_modules: Vec<String>,
}

impl Default for ScanRules {
    fn default() -> Self {
        Self {
            marker_file: DEFAULT_MARKER_FILE.to_string(),
            module_extension: DEFAULT_MODULE_EXTENSION.to_string(),
            ignored_units: Vec::new(),
            ignored_modules: Vec::new(),
        }
    }
}

impl ScanRules {
    /// Whether a unit name matches an ignore pattern
    pub fn is_ignored_unit(&self, name: &str) -> bool {
        self.ignored_units
            .iter()
            .any(|pattern| naming::matches_pattern(pattern, name))
    }

    /// Whether a module name matches an ignored-module entry
    pub fn is_ignored_module(&self, name: &str) -> bool {
        self.ignored_modules
            .iter()
            .any(|ignored| naming::matches_module_suffix(ignored, name))
    }

    /// Whether the marker file's content is read as the unit descriptor
    pub fn marker_is_descriptor(&self) -> bool {
        Path::new(&self.marker_file)
            .extension()
            .is_some_and(|ext| ext == "toml")
    }

    /// Module stem of a file name, or `None` if the file is not a module
    fn module_stem<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        if file_name == self.marker_file {
            return None;
        }
        file_name
            .strip_suffix(self.module_extension.as_str())
            .and_then(|head| head.strip_suffix('.'))
            .filter(|stem| !stem.is_empty() && !stem.contains(naming::SEPARATOR))
    }
}

/// Discovery scanner
pub struct DiscoveryScanner<'a> {
    rules: &'a ScanRules,
    descriptors: &'a DescriptorRegistry,
    ignore_detector: Option<&'a IgnoreDetector>,
    context: &'a Context,
}

impl<'a> DiscoveryScanner<'a> {
    /// Create a scanner over the given rules and explicit descriptors
    pub fn new(
        rules: &'a ScanRules,
        descriptors: &'a DescriptorRegistry,
        context: &'a Context,
    ) -> Self {
        Self {
            rules,
            descriptors,
            ignore_detector: None,
            context,
        }
    }

    /// Consult a custom ignore detector for every unit and module
    pub fn with_ignore_detector(mut self, detector: Option<&'a IgnoreDetector>) -> Self {
        self.ignore_detector = detector;
        self
    }

    /// Discover units under every root
    ///
    /// Each root is walked from its parent directory; directories under any
    /// other configured root are pruned so roots never overlap.
    pub fn scan(&self, roots: &[PathBuf]) -> Result<DiscoveryReport> {
        let mut report = DiscoveryReport::default();

        for root in roots {
            let exclude: Vec<&Path> = roots
                .iter()
                .filter(|other| *other != root)
                .map(PathBuf::as_path)
                .collect();

            let table = self.scan_root(root, &exclude, &mut report)?;
            info!(root = %root.display(), units = table.len(), "discovered units");
            report.roots.push(RootComponents {
                root: root.clone(),
                table,
            });
        }

        Ok(report)
    }

    fn scan_root(
        &self,
        root: &Path,
        exclude: &[&Path],
        report: &mut DiscoveryReport,
    ) -> Result<ComponentTable> {
        let walk_root = root
            .parent()
            .ok_or_else(|| PackagingError::InvalidRootPath(root.to_path_buf()))?;
        let mut table = ComponentTable::new();

        let mut walker = WalkDir::new(walk_root)
            .follow_links(true)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable path during discovery: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            let path = entry.path();
            if !Self::should_visit(root, exclude, path) {
                walker.skip_current_dir();
                continue;
            }

            if !self.is_unit(path, report) {
                walker.skip_current_dir();
                continue;
            }

            let name = Self::unit_name(path, walk_root)?;
            if self.should_skip_unit(&name, path, report)? {
                walker.skip_current_dir();
                continue;
            }

            if !report.all_units.insert(name.clone()) {
                return Err(PackagingError::Discovery(format!(
                    "Unit [{}] discovered under more than one root",
                    name
                )));
            }

            table.insert_unit(name.clone());
            let modules = self.find_modules(&name, path)?;
            debug!(unit = %name, modules = modules.len(), "unit discovered");
            if let Some(unit) = table.last_mut() {
                unit.modules = modules;
            }
        }

        Ok(table)
    }

    fn should_visit(root: &Path, exclude: &[&Path], path: &Path) -> bool {
        path.starts_with(root) && !exclude.iter().any(|excluded| path.starts_with(excluded))
    }

    /// A directory is a unit iff it holds the marker file and no ancestor was
    /// confirmed not to be a unit.
    fn is_unit(&self, path: &Path, report: &mut DiscoveryReport) -> bool {
        if report
            .not_unit_paths
            .iter()
            .any(|not_unit| path.starts_with(not_unit))
        {
            return false;
        }

        let name_ok = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| !n.is_empty() && !n.contains(naming::SEPARATOR));

        if !name_ok || !path.join(&self.rules.marker_file).is_file() {
            report.not_unit_paths.push(path.to_path_buf());
            return false;
        }

        true
    }

    fn unit_name(path: &Path, walk_root: &Path) -> Result<String> {
        let relative = path
            .strip_prefix(walk_root)
            .map_err(|_| PackagingError::InvalidUnitName(path.display().to_string()))?;

        let segments = relative
            .components()
            .map(|c| {
                c.as_os_str()
                    .to_str()
                    .ok_or_else(|| PackagingError::InvalidUnitName(path.display().to_string()))
            })
            .collect::<Result<Vec<&str>>>()?;

        Ok(naming::join_segments(&segments))
    }

    /// Apply ignore and disable rules to a confirmed unit
    ///
    /// A skipped unit's subtree is never entered.
    fn should_skip_unit(
        &self,
        name: &str,
        path: &Path,
        report: &mut DiscoveryReport,
    ) -> Result<bool> {
        if self.rules.is_ignored_unit(name) || self.detected_ignored(name, false) {
            debug!(unit = %name, "unit ignored");
            report.ignored_units.push(name.to_string());
            return Ok(true);
        }

        if report.is_disabled(name) {
            debug!(unit = %name, "unit inside a disabled unit, skipped");
            return Ok(true);
        }

        let descriptor = match self.descriptors.get(name) {
            Some(registered) => registered.clone(),
            None if self.rules.marker_is_descriptor() => {
                UnitDescriptor::from_marker_file(path.join(&self.rules.marker_file), name)?
            }
            None => UnitDescriptor::new(name),
        };

        if !descriptor.enabled {
            info!(unit = %name, "unit disabled");
            report.disabled_units.push(name.to_string());
            return Ok(true);
        }

        report.descriptors.insert(name.to_string(), descriptor);
        Ok(false)
    }

    fn find_modules(&self, unit: &str, path: &Path) -> Result<Vec<String>> {
        let mut entries = std::fs::read_dir(path)?.collect::<std::io::Result<Vec<_>>>()?;
        entries.sort_by_key(|e| e.file_name());

        let mut modules = Vec::new();
        for entry in entries {
            if !entry.path().is_file() {
                continue;
            }

            let file_name = entry.file_name();
            let Some(stem) = file_name.to_str().and_then(|f| self.rules.module_stem(f)) else {
                continue;
            };

            let module = naming::module_name(unit, stem);
            if self.rules.is_ignored_module(&module) || self.detected_ignored(&module, true) {
                debug!(module = %module, "module ignored");
                continue;
            }

            modules.push(module);
        }

        Ok(modules)
    }

    fn detected_ignored(&self, name: &str, is_module: bool) -> bool {
        self.ignore_detector
            .map(|detector| detector(name, is_module, self.context))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn unit(dir: &Path, marker: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(DEFAULT_MARKER_FILE), marker).unwrap();
    }

    fn module(dir: &Path, name: &str) {
        fs::write(dir.join(format!("{}.toml", name)), "").unwrap();
    }

    fn scan(roots: &[PathBuf], rules: &ScanRules) -> Result<DiscoveryReport> {
        let descriptors = DescriptorRegistry::new();
        let context = Context::new();
        DiscoveryScanner::new(rules, &descriptors, &context).scan(roots)
    }

    #[test]
    fn test_discovers_units_and_modules_in_order() {
        let temp = TempDir::new().unwrap();
        let app = temp.path().join("app");
        unit(&app, "");
        unit(&app.join("db"), "");
        unit(&app.join("api"), "");
        module(&app.join("db"), "pool");
        module(&app.join("db"), "models");
        fs::write(app.join("db").join("README.md"), "").unwrap();

        let report = scan(&[app.clone()], &ScanRules::default()).unwrap();
        let table = &report.roots[0].table;

        assert_eq!(table.unit_names(), vec!["app", "app.api", "app.db"]);
        assert_eq!(
            table.get("app.db").unwrap(),
            &["app.db.models".to_string(), "app.db.pool".to_string()]
        );
    }

    #[test]
    fn test_directory_without_marker_prunes_subtree() {
        let temp = TempDir::new().unwrap();
        let app = temp.path().join("app");
        unit(&app, "");
        fs::create_dir_all(app.join("static")).unwrap();
        unit(&app.join("static").join("nested"), "");

        let report = scan(&[app.clone()], &ScanRules::default()).unwrap();

        assert_eq!(report.roots[0].table.unit_names(), vec!["app"]);
        assert!(report.not_unit_paths.contains(&app.join("static")));
    }

    #[test]
    fn test_sibling_roots_do_not_overlap() {
        let temp = TempDir::new().unwrap();
        let app = temp.path().join("app");
        let app2 = temp.path().join("app2");
        unit(&app, "");
        unit(&app2, "");
        unit(&app2.join("extra"), "");

        let report = scan(&[app.clone(), app2.clone()], &ScanRules::default()).unwrap();

        assert_eq!(report.roots[0].table.unit_names(), vec!["app"]);
        assert_eq!(report.roots[1].table.unit_names(), vec!["app2", "app2.extra"]);
    }

    #[test]
    fn test_ignore_patterns_cover_subtree() {
        let temp = TempDir::new().unwrap();
        let app = temp.path().join("app");
        unit(&app, "");
        unit(&app.join("legacy").join("v1"), "");
        unit(&app.join("legacy"), "");
        unit(&app.join("core"), "");

        let rules = ScanRules {
            ignored_units: vec!["app.legacy.*".to_string()],
            ..ScanRules::default()
        };
        let report = scan(&[app], &rules).unwrap();

        assert_eq!(
            report.roots[0].table.unit_names(),
            vec!["app", "app.core", "app.legacy"]
        );
        assert_eq!(report.ignored_units, vec!["app.legacy.v1"]);
    }

    #[test]
    fn test_disabled_unit_excludes_subtree() {
        let temp = TempDir::new().unwrap();
        let app = temp.path().join("app");
        unit(&app, "");
        unit(&app.join("beta"), "enabled = false");
        unit(&app.join("beta").join("inner"), "");

        let report = scan(&[app], &ScanRules::default()).unwrap();

        assert_eq!(report.roots[0].table.unit_names(), vec!["app"]);
        assert_eq!(report.disabled_units, vec!["app.beta"]);
        assert!(report.is_disabled("app.beta.inner"));
        assert!(!report.all_units.contains("app.beta.inner"));
    }

    #[test]
    fn test_ignored_modules_by_suffix() {
        let temp = TempDir::new().unwrap();
        let app = temp.path().join("app");
        unit(&app, "");
        module(&app, "enumerations");
        module(&app, "my_enumerations");

        let rules = ScanRules {
            ignored_modules: vec!["enumerations".to_string()],
            ..ScanRules::default()
        };
        let report = scan(&[app], &rules).unwrap();

        assert_eq!(
            report.roots[0].table.get("app").unwrap(),
            &["app.my_enumerations".to_string()]
        );
    }

    #[test]
    fn test_ignore_detector_sees_units_and_modules() {
        let temp = TempDir::new().unwrap();
        let app = temp.path().join("app");
        unit(&app, "");
        unit(&app.join("tests"), "");
        unit(&app.join("tests").join("integration"), "");
        module(&app, "fixtures");
        module(&app, "routes");

        let rules = ScanRules::default();
        let descriptors = DescriptorRegistry::new();
        let context = Context::new();
        let detector = |name: &str, is_module: bool, _: &Context| {
            (!is_module && name == "app.tests") || (is_module && name.ends_with("fixtures"))
        };
        let report = DiscoveryScanner::new(&rules, &descriptors, &context)
            .with_ignore_detector(Some(&detector))
            .scan(&[app])
            .unwrap();

        let table = &report.roots[0].table;
        assert_eq!(table.unit_names(), vec!["app"]);
        assert_eq!(table.get("app").unwrap(), &["app.routes".to_string()]);
        assert_eq!(report.ignored_units, vec!["app.tests"]);
        assert!(!report.all_units.contains("app.tests.integration"));
        assert!(report.is_ignored("app.tests.integration"));
    }

    #[test]
    fn test_registered_descriptor_overrides_marker() {
        let temp = TempDir::new().unwrap();
        let app = temp.path().join("app");
        unit(&app, "");
        unit(&app.join("jobs"), "enabled = false");

        let rules = ScanRules::default();
        let mut descriptors = DescriptorRegistry::new();
        descriptors.register(UnitDescriptor::new("app.jobs"));
        let context = Context::new();
        let report = DiscoveryScanner::new(&rules, &descriptors, &context)
            .scan(&[app])
            .unwrap();

        assert!(report.all_units.contains("app.jobs"));
        assert!(report.disabled_units.is_empty());
    }
}
