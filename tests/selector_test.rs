//! Integration tests for package selection over a realistic deps.toml

mod common;

use std::collections::BTreeSet;

use common::{TestProject, SAMPLE_DEPS};
use depforge::core::machine::MachineSpec;
use depforge::core::predicate::EvalContext;
use depforge::core::selector::select_packages;
use depforge::core::spec::{BundleKind, DependencyParameters};
use depforge::error::ConfigError;

fn load_sample() -> DependencyParameters {
    let project = TestProject::new();
    project.create_file("deps.toml", SAMPLE_DEPS);
    DependencyParameters::load(&project.path().join("deps.toml")).unwrap()
}

fn identifiers(packages: &[depforge::core::spec::PackageSpec]) -> Vec<&str> {
    packages.iter().map(|p| p.identifier.as_str()).collect()
}

#[test]
fn sdk_selection_orders_dependencies_first() {
    let params = load_sample();
    let machine = MachineSpec::new("linux", "x86_64");
    let ctx = EvalContext {
        bundle: BundleKind::Sdk,
        machine: &machine,
    };

    let packages = select_packages(&params, ctx, None, &BTreeSet::new()).unwrap();
    let order = identifiers(&packages);

    // Toolchain-scoped vala is not part of an SDK session.
    assert!(!order.contains(&"vala"));

    let position = |id: &str| order.iter().position(|p| *p == id).unwrap();
    assert!(position("zlib") < position("glib"));
    assert!(position("libffi") < position("glib"));
    assert!(position("glib") < position("v8"));
}

#[test]
fn toolchain_selection_starts_from_scoped_packages() {
    let params = load_sample();
    let machine = MachineSpec::new("linux", "x86_64");
    let ctx = EvalContext {
        bundle: BundleKind::Toolchain,
        machine: &machine,
    };

    let packages = select_packages(&params, ctx, None, &BTreeSet::new()).unwrap();
    let order = identifiers(&packages);

    // vala plus its transitive closure, nothing else. Packages with no
    // ordering constraint between them come out identifier-sorted.
    assert_eq!(order, vec!["libffi", "zlib", "glib", "vala"]);
}

#[test]
fn predicate_gated_package_disappears_on_excluded_arch() {
    let params = load_sample();
    let machine = MachineSpec::new("linux", "armbe8");
    let ctx = EvalContext {
        bundle: BundleKind::Sdk,
        machine: &machine,
    };

    let packages = select_packages(&params, ctx, None, &BTreeSet::new()).unwrap();
    assert!(!identifiers(&packages).contains(&"v8"));
}

#[test]
fn exclusion_drops_only_the_named_package() {
    let params = load_sample();
    let machine = MachineSpec::new("linux", "x86_64");
    let ctx = EvalContext {
        bundle: BundleKind::Sdk,
        machine: &machine,
    };

    let excluded: BTreeSet<String> = ["glib".to_string()].into_iter().collect();
    let packages = select_packages(&params, ctx, None, &excluded).unwrap();
    let order = identifiers(&packages);

    assert!(!order.contains(&"glib"));
    // Dependents and dependencies of the excluded package still build.
    assert!(order.contains(&"v8"));
    assert!(order.contains(&"zlib"));
}

#[test]
fn only_narrows_to_a_closure() {
    let params = load_sample();
    let machine = MachineSpec::new("linux", "x86_64");
    let ctx = EvalContext {
        bundle: BundleKind::Sdk,
        machine: &machine,
    };

    let only: BTreeSet<String> = ["glib".to_string()].into_iter().collect();
    let packages = select_packages(&params, ctx, Some(&only), &BTreeSet::new()).unwrap();
    assert_eq!(identifiers(&packages), vec!["libffi", "zlib", "glib"]);
}

#[test]
fn unknown_only_package_is_rejected() {
    let params = load_sample();
    let machine = MachineSpec::new("linux", "x86_64");
    let ctx = EvalContext {
        bundle: BundleKind::Sdk,
        machine: &machine,
    };

    let only: BTreeSet<String> = ["nope".to_string()].into_iter().collect();
    let err = select_packages(&params, ctx, Some(&only), &BTreeSet::new()).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownPackage { .. }));
}

#[test]
fn selection_is_deterministic() {
    let params = load_sample();
    let machine = MachineSpec::new("linux", "x86_64");
    let ctx = EvalContext {
        bundle: BundleKind::Sdk,
        machine: &machine,
    };

    let first = select_packages(&params, ctx, None, &BTreeSet::new()).unwrap();
    for _ in 0..10 {
        let again = select_packages(&params, ctx, None, &BTreeSet::new()).unwrap();
        assert_eq!(identifiers(&first), identifiers(&again));
    }
}
