//! End-to-end scenarios over small inline Kconfig trees, one per documented
//! behavior: plain default, config-file load/overwrite, dependency-gated
//! assignability, choice mode switching, range-clamped defaults, and
//! `source` inclusion across files.

use std::fs;

use kconfig::{Item, Kconfig, Options, Tristate};

fn write_tree(dir: &std::path::Path, files: &[(&str, &str)]) {
    fs::create_dir_all(dir).unwrap();
    for (name, contents) in files {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }
}

fn scratch_dir(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("kconfig-rs-scenarios-{name}"))
}

#[test]
fn plain_bool_defaults_to_declared_value() {
    let kc = Kconfig::from_str("config FOO\n\tbool\n\tdefault y\n", "Kconfig").unwrap();
    let foo = kc.lookup("FOO").unwrap();
    assert_eq!(kc.value(foo), "y");
}

#[test]
fn dependent_default_tracks_config_file_reload() {
    let dir = scratch_dir("dependent-default");
    write_tree(&dir, &[("Kconfig", "config A\n\tbool\nconfig B\n\tbool\n\tdefault A\n")]);
    let mut kc = Kconfig::from_file(dir.join("Kconfig"), Options { srctree: Some(dir.clone()), ..Options::default() }).unwrap();
    let b = kc.lookup("B").unwrap();

    let cfg = dir.join("defconfig");
    fs::write(&cfg, "CONFIG_A=y\n").unwrap();
    kc.load_config(&cfg, true).unwrap();
    assert_eq!(kc.value(b), "y");

    fs::write(&cfg, "# CONFIG_A is not set\n").unwrap();
    kc.load_config(&cfg, true).unwrap();
    assert_eq!(kc.value(b), "n");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn dependency_gates_assignability_and_modules_widen_it() {
    let kc = Kconfig::from_str(
        "config M\n\tbool\nconfig S\n\ttristate\n\tdepends on M\n",
        "Kconfig",
    )
    .unwrap();
    let m = kc.lookup("M").unwrap();
    let s = kc.lookup("S").unwrap();

    assert!(kc.assignable(s).is_empty());

    kc.set_user_value(m, Some("y"));
    assert_eq!(kc.assignable(s), vec![Tristate::N, Tristate::Y]);
}

#[test]
fn modules_on_widens_tristate_assignability_to_nmy() {
    let kc = Kconfig::from_str(
        "config MODULES\n\tbool\n\tdefault y\n\toption modules\nconfig M\n\tbool\n\tdefault y\nconfig S\n\ttristate\n\tdepends on M\n",
        "Kconfig",
    )
    .unwrap();
    let s = kc.lookup("S").unwrap();
    assert_eq!(kc.assignable(s), vec![Tristate::N, Tristate::M, Tristate::Y]);
}

#[test]
fn choice_mode_switch_forces_other_member_off() {
    let kc = Kconfig::from_str(
        "config MODULES\n\tbool\n\tdefault y\nchoice\n\ttristate\n\tconfig X\n\ttristate\n\tconfig Y\n\ttristate\nendchoice\n",
        "Kconfig",
    )
    .unwrap();
    let x = kc.lookup("X").unwrap();
    let y = kc.lookup("Y").unwrap();

    kc.select_choice_member(x);
    assert_eq!(kc.value(x), "y");
    assert_eq!(kc.value(y), "n");
}

#[test]
fn int_range_clamps_default_and_honors_in_range_user_value() {
    let kc = Kconfig::from_str("config N\n\tint\n\trange 10 20\n\tdefault 5\n", "Kconfig").unwrap();
    let n = kc.lookup("N").unwrap();
    assert_eq!(kc.value(n), "10");

    kc.set_user_value(n, Some("25"));
    assert_eq!(kc.value(n), "10");

    kc.set_user_value(n, Some("15"));
    assert_eq!(kc.value(n), "15");
}

#[test]
fn menu_depends_on_propagates_into_contained_symbol() {
    let kc = Kconfig::from_str(
        "config GATE\n\tbool\nmenu \"Stuff\"\n\tdepends on GATE\nconfig INNER\n\tbool\n\tdefault y\nendmenu\n",
        "Kconfig",
    )
    .unwrap();
    let gate = kc.lookup("GATE").unwrap();
    let inner = kc.lookup("INNER").unwrap();

    assert_eq!(kc.value(inner), "n");

    kc.set_user_value(gate, Some("y"));
    assert_eq!(kc.value(inner), "y");
}

#[test]
fn warnings_enabled_false_still_collects_but_does_not_abort() {
    let dir = scratch_dir("warnings-disabled");
    write_tree(&dir, &[("Kconfig", "config FOO\n\tbool\n\tdefault y\n")]);
    let mut kc = Kconfig::from_file(
        dir.join("Kconfig"),
        Options { srctree: Some(dir.clone()), warnings_enabled: false, ..Options::default() },
    )
    .unwrap();

    let cfg = dir.join("defconfig");
    fs::write(&cfg, "CONFIG_FOO=bogus\n").unwrap();
    kc.load_config(&cfg, true).unwrap();

    assert!(kc.warnings().iter().any(|w| matches!(w, kconfig::Warning::InvalidAssignedValue { .. })));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn source_pulls_in_sub_kconfig_with_correct_filename() {
    let dir = scratch_dir("source-include");
    write_tree(
        &dir,
        &[
            ("Kconfig", "source \"sub/Kconfig\"\n"),
            ("sub/Kconfig", "config Z\n\tbool\n"),
        ],
    );
    let kc = Kconfig::from_file(dir.join("Kconfig"), Options { srctree: Some(dir.clone()), ..Options::default() }).unwrap();
    let z = kc.lookup("Z").unwrap();

    let mut found = None;
    let mut stack = vec![kc.top_menu()];
    while let Some(n) = stack.pop() {
        for child in kc.children(n) {
            if matches!(kc.node(child).item, Item::Symbol(id) if id == z) {
                found = Some(child);
            }
            stack.push(child);
        }
    }
    let node = found.expect("Z should appear in the menu tree");
    assert!(kc.node(node).file.ends_with("sub/Kconfig"));

    let _ = fs::remove_dir_all(&dir);
}
