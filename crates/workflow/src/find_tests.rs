// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

const ALPHA_HCL: &str = r#"
workflow "alpha" {
    step "a" {
        agent = "coder"
    }
}
"#;

const BETA_TOML: &str = r#"
[workflow.beta]

[[workflow.beta.step]]
name = "b"
agent = "tester"
"#;

#[test]
fn load_dir_reads_both_formats_in_file_order() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("10-alpha.hcl"), ALPHA_HCL).unwrap();
    std::fs::write(dir.path().join("20-beta.toml"), BETA_TOML).unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let workflows = load_dir(dir.path()).unwrap();
    assert_eq!(workflows.len(), 2);
    assert_eq!(workflows[0].name, "alpha");
    assert_eq!(workflows[1].name, "beta");
}

#[test]
fn load_dir_missing_directory_is_empty() {
    let dir = tempdir().unwrap();
    let workflows = load_dir(&dir.path().join("nope")).unwrap();
    assert!(workflows.is_empty());
}

#[test]
fn load_dir_skips_bad_files() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("good.hcl"), ALPHA_HCL).unwrap();
    std::fs::write(dir.path().join("bad.hcl"), "workflow \"x\" {").unwrap();

    let workflows = load_dir(dir.path()).unwrap();
    assert_eq!(workflows.len(), 1);
    assert_eq!(workflows[0].name, "alpha");
}

#[test]
fn find_workflow_by_name() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("alpha.hcl"), ALPHA_HCL).unwrap();

    assert!(find_workflow(dir.path(), "alpha").unwrap().is_some());
    assert!(find_workflow(dir.path(), "ghost").unwrap().is_none());
}
