//! Property-Based Tests for wheelboot
//!
//! Uses proptest for invariants that must hold for every input:
//! - Distribution dispatch is total: unknown labels always fail, known ones always resolve
//! - A single package name installs exactly like a one-element list
//! - PATH prepending always puts the venv first and keeps the rest in order

use proptest::prelude::*;
use std::path::{Path, PathBuf};

use wheelboot::command::DryRunRunner;
use wheelboot::{BootstrapError, Distro, Environment, PackageSet, package_install};

/// Labels that cannot name a recognized family
fn unknown_label_strategy() -> impl Strategy<Value = String> {
    "[ -~]{0,40}".prop_filter("must not name a known family", |s| {
        !s.contains("Ubuntu") && !s.contains("CentOS")
    })
}

fn package_name_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9+.-]{0,30}"
}

fn distro_strategy() -> impl Strategy<Value = Distro> {
    prop_oneof![Just(Distro::Ubuntu), Just(Distro::CentOs)]
}

proptest! {
    /// Any label without "Ubuntu" or "CentOS" is unsupported
    #[test]
    fn unknown_labels_are_unsupported(label in unknown_label_strategy()) {
        let result = Distro::from_label(&label);
        prop_assert!(matches!(result, Err(BootstrapError::UnsupportedDistribution(_))));
    }

    /// Known family names embedded anywhere in a label resolve
    #[test]
    fn known_labels_resolve(prefix in "[a-z ]{0,10}", suffix in "[a-z0-9 .]{0,10}", distro in distro_strategy()) {
        let label = format!("{}{}{}", prefix, distro, suffix);
        prop_assert_eq!(Distro::from_label(&label).unwrap(), distro);
    }

    /// package_install("x") == package_install(["x"])
    #[test]
    fn single_name_equals_one_element_list(name in package_name_strategy(), distro in distro_strategy()) {
        let env = Environment::new();
        let mut single = DryRunRunner::default();
        let mut list = DryRunRunner::default();

        package_install(&mut single, distro, name.as_str(), &env).unwrap();
        package_install(&mut list, distro, vec![name.clone()], &env).unwrap();

        prop_assert_eq!(&single.planned, &list.planned);
        prop_assert_eq!(single.planned.len(), 1);
        prop_assert_eq!(single.planned[0].args.last(), Some(&name));
    }

    /// Package order is preserved and every name appears once per call
    #[test]
    fn package_order_is_preserved(names in prop::collection::vec(package_name_strategy(), 1..8), distro in distro_strategy()) {
        let mut runner = DryRunRunner::default();
        package_install(&mut runner, distro, PackageSet::from(names.clone()), &Environment::new()).unwrap();

        let args = &runner.planned[0].args;
        let flags = distro.install_flags().len();
        prop_assert_eq!(&args[flags..], names.as_slice());
    }

    /// Prepending a dir keeps the original PATH entries behind it, in order
    #[test]
    fn prepend_path_keeps_existing_order(dirs in prop::collection::vec("/[a-z]{1,8}(/[a-z]{1,8}){0,2}", 0..5)) {
        let mut env = Environment::new();
        if !dirs.is_empty() {
            env.set("PATH", dirs.join(":"));
        }
        env.prepend_path(Path::new("/srv/.venv/bin")).unwrap();

        let entries = env.path_entries();
        prop_assert_eq!(&entries[0], &PathBuf::from("/srv/.venv/bin"));
        let rest: Vec<PathBuf> = dirs.iter().map(PathBuf::from).collect();
        prop_assert_eq!(&entries[1..], rest.as_slice());
    }
}

#[test]
fn empty_package_list_is_silent_for_every_distro() {
    for distro in [Distro::Ubuntu, Distro::CentOs] {
        let mut runner = DryRunRunner::default();
        package_install(&mut runner, distro, PackageSet::new(), &Environment::new()).unwrap();
        assert!(runner.planned.is_empty());
    }
}
