//! Unit dependency resolution
//!
//! Validates declared dependencies and determines load order by repeated
//! sweeps: every sweep loads each unit whose dependencies and parent unit are
//! already loaded, and defers the rest to the next sweep.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::packaging::loader::ComponentLoader;
use crate::packaging::naming;
use crate::packaging::registry::discovery::{
    ComponentTable, DiscoveryReport, ScanRules, UnitComponents,
};
use crate::packaging::traits::{
    Context, IgnoreDetector, Loader, PackagingError, Result, StalledUnit,
};

/// Dependency resolver for one load pass
pub struct DependencyResolver<'a> {
    report: &'a DiscoveryReport,
    rules: &'a ScanRules,
    ignore_detector: Option<&'a IgnoreDetector>,
    context: &'a Context,
    /// Unit name -> validated dependencies. Written once per unit.
    dependency_map: HashMap<String, Vec<String>>,
}

impl<'a> DependencyResolver<'a> {
    /// Create a resolver over a discovery report
    pub fn new(report: &'a DiscoveryReport, rules: &'a ScanRules, context: &'a Context) -> Self {
        Self {
            report,
            rules,
            ignore_detector: None,
            context,
            dependency_map: HashMap::new(),
        }
    }

    /// Use the same ignore detector discovery used, to classify missing dependencies
    pub fn with_ignore_detector(mut self, detector: Option<&'a IgnoreDetector>) -> Self {
        self.ignore_detector = detector;
        self
    }

    /// Validated dependency map
    pub fn dependency_map(&self) -> &HashMap<String, Vec<String>> {
        &self.dependency_map
    }

    /// Validate every unit of the table, in discovery order
    pub fn validate(&mut self, table: &ComponentTable) -> Result<()> {
        for unit in table.iter() {
            let depends = self
                .report
                .descriptors
                .get(&unit.name)
                .map(|d| d.normalized_depends())
                .unwrap_or_default();

            self.validate_unit(&unit.name, depends)?;
        }

        debug!(units = table.len(), "dependencies validated");
        Ok(())
    }

    /// Validate one unit's dependencies and record them
    ///
    /// Checks run in this order: existence (ignored, disabled, missing), self
    /// dependency, then per dependency the sub-unit and two-party circular checks.
    pub fn validate_unit(&mut self, unit: &str, depends: Vec<String>) -> Result<()> {
        if self.dependency_map.contains_key(unit) {
            return Ok(());
        }

        self.check_dependencies_exist(unit, &depends)?;
        self.dependency_map.insert(unit.to_string(), depends);
        let depends = &self.dependency_map[unit];

        if depends.iter().any(|dep| dep == unit) {
            return Err(PackagingError::SelfDependency(unit.to_string()));
        }

        for dep in depends {
            if naming::is_descendant(unit, dep) {
                return Err(PackagingError::SubUnitDependency {
                    unit: unit.to_string(),
                    child: dep.clone(),
                });
            }

            let reverse = self.dependency_map.get(dep);
            if reverse.is_some_and(|r| r.iter().any(|d| d == unit)) {
                return Err(PackagingError::CircularDependency {
                    unit: unit.to_string(),
                    other: dep.clone(),
                });
            }
        }

        Ok(())
    }

    fn check_dependencies_exist(&self, unit: &str, depends: &[String]) -> Result<()> {
        for dep in depends {
            if self.report.all_units.contains(dep) {
                continue;
            }

            let dependency = dep.clone();
            let unit = unit.to_string();

            if self.rules.is_ignored_unit(dep)
                || self.report.is_ignored(dep)
                || self.detected_ignored(dep)
            {
                return Err(PackagingError::DependencyIgnored { dependency, unit });
            }
            if self.report.is_disabled(dep) {
                return Err(PackagingError::DependencyDisabled { dependency, unit });
            }
            return Err(PackagingError::DependencyNotFound { dependency, unit });
        }

        Ok(())
    }

    fn detected_ignored(&self, name: &str) -> bool {
        self.ignore_detector
            .map(|detector| detector(name, false, self.context))
            .unwrap_or(false)
    }

    /// Compute the load order without loading anything
    pub fn plan(&self, table: &ComponentTable) -> Result<Vec<String>> {
        self.sweep(table, |_| Ok(()))
    }

    /// Load every unit of the table in dependency order
    pub fn resolve_and_load<L: Loader>(
        &self,
        table: &ComponentTable,
        loader: &ComponentLoader<'_, L>,
    ) -> Result<Vec<String>> {
        self.sweep(table, |unit| loader.load_unit(unit))
    }

    /// Run sweeps until every unit is loaded
    ///
    /// `load` is called once per unit, in load order. Within a sweep units are
    /// visited in discovery order and readiness is evaluated live, so a unit
    /// loaded earlier in the sweep can make a later one ready. A sweep that
    /// loads nothing fails with [`PackagingError::UnresolvedDependencies`].
    pub fn sweep<F>(&self, table: &ComponentTable, mut load: F) -> Result<Vec<String>>
    where
        F: FnMut(&UnitComponents) -> Result<()>,
    {
        let mut loaded: HashSet<&str> = HashSet::new();
        let mut order = Vec::with_capacity(table.len());
        let mut pending: Vec<&UnitComponents> = table.iter().collect();
        let mut sweep = 0usize;

        while !pending.is_empty() {
            sweep += 1;
            let before = order.len();
            let mut deferred = Vec::new();

            for unit in pending {
                if self.is_ready(&unit.name, &loaded)? {
                    load(unit)?;
                    loaded.insert(unit.name.as_str());
                    order.push(unit.name.clone());
                } else {
                    deferred.push(unit);
                }
            }

            debug!(
                sweep,
                loaded = order.len() - before,
                deferred = deferred.len(),
                "sweep finished"
            );

            if order.len() == before {
                return Err(PackagingError::UnresolvedDependencies(
                    self.stalled(&deferred, &loaded)?,
                ));
            }

            pending = deferred;
        }

        Ok(order)
    }

    fn is_ready(&self, unit: &str, loaded: &HashSet<&str>) -> Result<bool> {
        let parent_loaded = match naming::parent_name(unit)? {
            Some(parent) => loaded.contains(parent),
            None => true,
        };

        Ok(parent_loaded && self.dependencies_of(unit).iter().all(|d| loaded.contains(d.as_str())))
    }

    fn stalled(
        &self,
        deferred: &[&UnitComponents],
        loaded: &HashSet<&str>,
    ) -> Result<Vec<StalledUnit>> {
        deferred
            .iter()
            .map(|unit| -> Result<StalledUnit> {
                let mut waiting_on: Vec<String> = self
                    .dependencies_of(&unit.name)
                    .iter()
                    .filter(|d| !loaded.contains(d.as_str()))
                    .cloned()
                    .collect();

                if let Some(parent) = naming::parent_name(&unit.name)? {
                    if !loaded.contains(parent) && !waiting_on.iter().any(|w| w == parent) {
                        waiting_on.push(parent.to_string());
                    }
                }

                Ok(StalledUnit {
                    unit: unit.name.clone(),
                    waiting_on,
                })
            })
            .collect()
    }

    fn dependencies_of(&self, unit: &str) -> &[String] {
        self.dependency_map
            .get(unit)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packaging::registry::manifest::UnitDescriptor;

    /// Build a report and table from (unit, depends) pairs in discovery order
    fn fixture(units: &[(&str, &[&str])]) -> (DiscoveryReport, ComponentTable) {
        let mut report = DiscoveryReport::default();
        let mut table = ComponentTable::new();
        for (name, depends) in units {
            report.all_units.insert(name.to_string());
            report.descriptors.insert(
                name.to_string(),
                UnitDescriptor::new(*name).with_depends(depends.iter().copied()),
            );
            table.insert_unit(*name);
        }
        (report, table)
    }

    fn order(units: &[(&str, &[&str])]) -> Result<Vec<String>> {
        let (report, table) = fixture(units);
        let rules = ScanRules::default();
        let context = Context::new();
        let mut resolver = DependencyResolver::new(&report, &rules, &context);
        resolver.validate(&table)?;
        resolver.plan(&table)
    }

    #[test]
    fn test_dependency_loads_first() {
        let order = order(&[("app", &[]), ("app.api", &["app.db"]), ("app.db", &[])]).unwrap();
        assert_eq!(order, vec!["app", "app.db", "app.api"]);
    }

    #[test]
    fn test_parent_loads_before_child() {
        let order = order(&[("app.db.pool", &[]), ("app.db", &[]), ("app", &[])]).unwrap();
        assert_eq!(order, vec!["app", "app.db", "app.db.pool"]);
    }

    #[test]
    fn test_self_dependency() {
        let err = order(&[("app", &[]), ("app.db", &["app.db"])]).unwrap_err();
        assert!(matches!(err, PackagingError::SelfDependency(ref u) if u == "app.db"));
    }

    #[test]
    fn test_sub_unit_dependency() {
        let err = order(&[("app", &["app.db"]), ("app.db", &[])]).unwrap_err();
        assert!(matches!(
            err,
            PackagingError::SubUnitDependency { ref unit, ref child }
                if unit == "app" && child == "app.db"
        ));
    }

    #[test]
    fn test_two_party_cycle_detected_at_validation() {
        let err = order(&[("app", &[]), ("app.a", &["app.b"]), ("app.b", &["app.a"])]).unwrap_err();
        assert!(matches!(
            err,
            PackagingError::CircularDependency { ref unit, ref other }
                if unit == "app.b" && other == "app.a"
        ));
    }

    #[test]
    fn test_longer_cycle_reported_as_unresolved() {
        let err = order(&[
            ("app", &[]),
            ("app.a", &["app.b"]),
            ("app.b", &["app.c"]),
            ("app.c", &["app.a"]),
        ])
        .unwrap_err();

        match err {
            PackagingError::UnresolvedDependencies(stalled) => {
                let units: Vec<&str> = stalled.iter().map(|s| s.unit.as_str()).collect();
                assert_eq!(units, vec!["app.a", "app.b", "app.c"]);
                assert_eq!(stalled[0].waiting_on, vec!["app.b"]);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_dependency_classified() {
        let (mut report, table) = fixture(&[("app", &[]), ("app.api", &["app.legacy.v1"])]);
        report.disabled_units.push("app.beta".to_string());
        let rules = ScanRules {
            ignored_units: vec!["app.legacy.*".to_string()],
            ..ScanRules::default()
        };
        let context = Context::new();

        let mut resolver = DependencyResolver::new(&report, &rules, &context);
        let err = resolver.validate(&table).unwrap_err();
        assert!(matches!(err, PackagingError::DependencyIgnored { .. }));

        let mut resolver = DependencyResolver::new(&report, &rules, &context);
        let err = resolver
            .validate_unit("app.api", vec!["app.beta.inner".to_string()])
            .unwrap_err();
        assert!(matches!(err, PackagingError::DependencyDisabled { .. }));

        let mut resolver = DependencyResolver::new(&report, &rules, &context);
        let err = resolver
            .validate_unit("app.api", vec!["app.nowhere".to_string()])
            .unwrap_err();
        assert!(matches!(err, PackagingError::DependencyNotFound { .. }));
    }

    #[test]
    fn test_dependency_map_written_once() {
        let (report, _table) = fixture(&[("app", &[]), ("app.db", &[])]);
        let rules = ScanRules::default();
        let context = Context::new();
        let mut resolver = DependencyResolver::new(&report, &rules, &context);

        resolver.validate_unit("app.db", vec!["app".to_string()]).unwrap();
        resolver.validate_unit("app.db", Vec::new()).unwrap();
        assert_eq!(resolver.dependency_map()["app.db"], vec!["app"]);
    }

    #[test]
    fn test_sweep_stops_on_load_failure() {
        let (report, table) = fixture(&[("app", &[]), ("app.db", &[])]);
        let rules = ScanRules::default();
        let context = Context::new();
        let mut resolver = DependencyResolver::new(&report, &rules, &context);
        resolver.validate(&table).unwrap();

        let mut seen = Vec::new();
        let result = resolver.sweep(&table, |unit| {
            seen.push(unit.name.clone());
            Err(PackagingError::Discovery("boom".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(seen, vec!["app"]);
    }
}
