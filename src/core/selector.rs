//! Dependency selection and build ordering
//!
//! Given the loaded package graph, a bundle kind, and an optional explicit
//! top-level subset, computes the closed set of packages to build and a
//! valid build order. Packages are held in a flat indexed table with edges
//! as index lists; closure runs over an explicit worklist rather than
//! recursion.
//!
//! Unresolved dependency identifiers and cycles are fatal and surface here,
//! before any filesystem side effect.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::predicate::EvalContext;
use crate::core::spec::{BundleKind, DependencyParameters, PackageSpec};
use crate::error::ConfigError;

/// Scope tag marking toolchain-only packages
pub const TOOLCHAIN_SCOPE: &str = "toolchain";

/// Arena of predicate-resolved packages admitted for this session
struct Arena {
    packages: Vec<PackageSpec>,
    /// identifier -> index into `packages`
    index: BTreeMap<String, usize>,
    /// dependency edges as indices, parallel to `packages`
    edges: Vec<Vec<usize>>,
}

impl Arena {
    fn build(params: &DependencyParameters, ctx: EvalContext<'_>) -> Result<Self, ConfigError> {
        let packages: Vec<PackageSpec> = params
            .packages
            .values()
            .filter(|pkg| pkg.can_include(ctx))
            .map(|pkg| pkg.resolve(ctx))
            .collect();

        let index: BTreeMap<String, usize> = packages
            .iter()
            .enumerate()
            .map(|(i, pkg)| (pkg.identifier.clone(), i))
            .collect();

        let edges = packages
            .iter()
            .map(|pkg| {
                pkg.dependencies
                    .iter()
                    .map(|dep| {
                        index.get(&dep.identifier).copied().ok_or_else(|| {
                            ConfigError::UnknownDependency {
                                package: pkg.identifier.clone(),
                                dependency: dep.identifier.clone(),
                            }
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            packages,
            index,
            edges,
        })
    }
}

/// Select the packages for a session and order them for building
///
/// `only` overrides the top-level choice; otherwise a toolchain session
/// starts from packages tagged with the toolchain scope and any other
/// session starts from unscoped packages. Exclusion applies after closure
/// computation: an excluded package is dropped from the build set, but its
/// presence in the closure never removes anything else.
pub fn select_packages(
    params: &DependencyParameters,
    ctx: EvalContext<'_>,
    only: Option<&BTreeSet<String>>,
    excluded: &BTreeSet<String>,
) -> Result<Vec<PackageSpec>, ConfigError> {
    let arena = Arena::build(params, ctx)?;

    let toplevel: Vec<usize> = match only {
        Some(identifiers) => identifiers
            .iter()
            .map(|id| {
                arena
                    .index
                    .get(id)
                    .copied()
                    .ok_or_else(|| ConfigError::UnknownPackage {
                        package: id.clone(),
                    })
            })
            .collect::<Result<_, _>>()?,
        None => {
            let wanted = |pkg: &PackageSpec| match ctx.bundle {
                BundleKind::Toolchain => pkg.scope.as_deref() == Some(TOOLCHAIN_SCOPE),
                BundleKind::Sdk => pkg.scope.is_none(),
            };
            arena
                .packages
                .iter()
                .enumerate()
                .filter(|(_, pkg)| wanted(pkg))
                .map(|(i, _)| i)
                .collect()
        }
    };

    // Transitive closure over effective dependency edges, worklist style.
    let mut in_closure = vec![false; arena.packages.len()];
    let mut worklist = toplevel;
    while let Some(i) = worklist.pop() {
        if std::mem::replace(&mut in_closure[i], true) {
            continue;
        }
        for &dep in &arena.edges[i] {
            if !in_closure[dep] {
                worklist.push(dep);
            }
        }
    }

    // Exclusion is applied to the closure, never to closure computation.
    let selected: Vec<usize> = (0..arena.packages.len())
        .filter(|&i| in_closure[i] && !excluded.contains(&arena.packages[i].identifier))
        .collect();

    topological_order(&arena, &selected)
}

/// Kahn's algorithm restricted to the selected set
///
/// The ready queue is ordered by identifier so the order among mutually
/// independent packages is stable across runs.
fn topological_order(arena: &Arena, selected: &[usize]) -> Result<Vec<PackageSpec>, ConfigError> {
    let selected_set: BTreeSet<usize> = selected.iter().copied().collect();

    let mut indegree: BTreeMap<usize, usize> = selected
        .iter()
        .map(|&i| {
            let degree = arena.edges[i]
                .iter()
                .filter(|dep| selected_set.contains(dep))
                .count();
            (i, degree)
        })
        .collect();

    // dependency -> dependents, within the selected set
    let mut dependents: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for &i in selected {
        for &dep in &arena.edges[i] {
            if selected_set.contains(&dep) {
                dependents.entry(dep).or_default().push(i);
            }
        }
    }

    let mut ready: BTreeSet<(&str, usize)> = indegree
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(&i, _)| (arena.packages[i].identifier.as_str(), i))
        .collect();

    let mut order = Vec::with_capacity(selected.len());
    while let Some(&(_, i)) = ready.iter().next() {
        ready.remove(&(arena.packages[i].identifier.as_str(), i));
        order.push(arena.packages[i].clone());
        for &dependent in dependents.get(&i).into_iter().flatten() {
            if let Some(degree) = indegree.get_mut(&dependent) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert((arena.packages[dependent].identifier.as_str(), dependent));
                }
            }
        }
    }

    if order.len() != selected.len() {
        let ordered: BTreeSet<&str> = order.iter().map(|pkg| pkg.identifier.as_str()).collect();
        let members = selected
            .iter()
            .map(|&i| arena.packages[i].identifier.clone())
            .filter(|id| !ordered.contains(id.as_str()))
            .collect();
        return Err(ConfigError::CircularDependency { members });
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::machine::MachineSpec;
    use crate::core::spec::DependencyParameters;

    fn params(toml: &str) -> DependencyParameters {
        DependencyParameters::from_toml(toml).unwrap()
    }

    fn pkg(identifier: &str, deps: &[&str]) -> String {
        let dep_list = deps
            .iter()
            .map(|d| format!("\"{d}\""))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "[{identifier}]\nname = \"{identifier}\"\nversion = \"v\"\nurl = \"u\"\ndependencies = [{dep_list}]\n\n"
        )
    }

    fn graph(packages: &[(&str, &[&str])]) -> DependencyParameters {
        let mut toml = String::from(
            "[dependencies]\nversion = \"1\"\nbootstrap_version = \"1\"\n\n",
        );
        for (id, deps) in packages {
            toml.push_str(&pkg(id, deps));
        }
        params(&toml)
    }

    fn select(
        params: &DependencyParameters,
        only: Option<&[&str]>,
        excluded: &[&str],
    ) -> Result<Vec<String>, ConfigError> {
        let machine = MachineSpec::new("linux", "x86_64");
        let ctx = EvalContext {
            bundle: BundleKind::Sdk,
            machine: &machine,
        };
        let only_set = only.map(|ids| ids.iter().map(|s| s.to_string()).collect());
        let excluded_set = excluded.iter().map(|s| s.to_string()).collect();
        select_packages(params, ctx, only_set.as_ref(), &excluded_set)
            .map(|pkgs| pkgs.into_iter().map(|p| p.identifier).collect())
    }

    #[test]
    fn test_two_package_scenario() {
        let g = graph(&[("a", &[]), ("b", &["a"])]);
        let order = select(&g, Some(&["b"]), &[]).unwrap();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn test_exclusion_after_closure() {
        let g = graph(&[("a", &[]), ("b", &["a"])]);
        let order = select(&g, Some(&["b"]), &["a"]).unwrap();
        assert_eq!(order, vec!["b"]);
    }

    #[test]
    fn test_exclusion_keeps_shared_dependencies() {
        // Excluding c drops only c; a stays because b still needs it.
        let g = graph(&[("a", &[]), ("b", &["a"]), ("c", &["a"])]);
        let order = select(&g, Some(&["b", "c"]), &["c"]).unwrap();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn test_dependencies_precede_dependents() {
        let g = graph(&[
            ("app", &["mid1", "mid2"]),
            ("mid1", &["base"]),
            ("mid2", &["base"]),
            ("base", &[]),
        ]);
        let order = select(&g, Some(&["app"]), &[]).unwrap();
        let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
        assert!(pos("base") < pos("mid1"));
        assert!(pos("base") < pos("mid2"));
        assert!(pos("mid1") < pos("app"));
        assert!(pos("mid2") < pos("app"));
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn test_order_is_stable_across_runs() {
        let g = graph(&[("zeta", &[]), ("alpha", &[]), ("mu", &[])]);
        let first = select(&g, None, &[]).unwrap();
        for _ in 0..5 {
            assert_eq!(select(&g, None, &[]).unwrap(), first);
        }
        // Independent packages come out identifier-sorted.
        assert_eq!(first, vec!["alpha", "mu", "zeta"]);
    }

    #[test]
    fn test_cycle_is_fatal() {
        let g = graph(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"])]);
        let err = select(&g, None, &[]).unwrap_err();
        match err {
            ConfigError::CircularDependency { members } => {
                assert_eq!(members.len(), 3);
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_self_cycle_is_fatal() {
        let g = graph(&[("a", &["a"])]);
        assert!(select(&g, None, &[]).is_err());
    }

    #[test]
    fn test_unknown_dependency_is_fatal() {
        let g = graph(&[("a", &["ghost"])]);
        let err = select(&g, None, &[]).unwrap_err();
        match err {
            ConfigError::UnknownDependency {
                package,
                dependency,
            } => {
                assert_eq!(package, "a");
                assert_eq!(dependency, "ghost");
            }
            other => panic!("expected unknown dependency error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_toplevel_is_fatal() {
        let g = graph(&[("a", &[])]);
        assert!(matches!(
            select(&g, Some(&["nope"]), &[]),
            Err(ConfigError::UnknownPackage { .. })
        ));
    }

    #[test]
    fn test_toolchain_scope_selection() {
        let toml = r#"
[dependencies]
version = "1"
bootstrap_version = "1"

[valac]
name = "valac"
version = "v"
url = "u"
scope = "toolchain"
dependencies = ["glib"]

[glib]
name = "glib"
version = "v"
url = "u"

[sdkonly]
name = "sdkonly"
version = "v"
url = "u"
"#;
        let g = params(toml);
        let machine = MachineSpec::new("linux", "x86_64");
        let ctx = EvalContext {
            bundle: BundleKind::Toolchain,
            machine: &machine,
        };
        let order: Vec<String> = select_packages(&g, ctx, None, &BTreeSet::new())
            .unwrap()
            .into_iter()
            .map(|p| p.identifier)
            .collect();
        // Toolchain session: scoped roots plus their closure, nothing else.
        assert_eq!(order, vec!["glib", "valac"]);
    }

    #[test]
    fn test_predicate_filtered_package_is_invisible() {
        let toml = r#"
[dependencies]
version = "1"
bootstrap_version = "1"

[a]
name = "a"
version = "v"
url = "u"
dependencies = [{ id = "winonly", when = "machine.os == windows" }]

[winonly]
name = "winonly"
version = "v"
url = "u"
when = "machine.os == windows"
"#;
        let g = params(toml);
        let order = select(&g, None, &[]).unwrap();
        assert_eq!(order, vec!["a"]);
    }

    #[test]
    fn test_closure_adds_each_package_once() {
        let g = graph(&[
            ("a", &["base"]),
            ("b", &["base"]),
            ("c", &["a", "b", "base"]),
            ("base", &[]),
        ]);
        let order = select(&g, Some(&["c"]), &[]).unwrap();
        assert_eq!(order.len(), 4);
        let unique: BTreeSet<&String> = order.iter().collect();
        assert_eq!(unique.len(), 4);
    }
}
