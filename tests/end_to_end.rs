//! Integration test that drives full runs through the real subprocess path.
//!
//! A shell script stands in for `java`. It is called exactly like the JVM
//! would be (`-jar <jar> -o <target> <source>`), logs each source it sees,
//! copies the source to the target, and fails on files containing `SYNTAX`.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use yuic::cache::Cache;
use yuic::config::load_config;
use yuic::process::{ProcessError, RunOptions, run};

const FAKE_JAVA: &str = r#"#!/bin/sh
[ "$1" = "-jar" ] || exit 64
[ "$3" = "-o" ] || exit 64
echo "$5" >> "$(dirname "$0")/calls.log"
if grep -q SYNTAX "$5"; then
    echo "[ERROR] 1:1:syntax error" >&2
    exit 2
fi
cp "$5" "$4"
"#;

struct Project {
    tmp: TempDir,
}

impl Project {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();

        let tool = root.join("tools/fake-java");
        fs::create_dir_all(tool.parent().unwrap()).unwrap();
        fs::write(&tool, FAKE_JAVA).unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

        fs::create_dir_all(root.join("vendor/bin")).unwrap();
        fs::write(root.join("vendor/bin/yuicompressor.jar"), "").unwrap();

        Self { tmp }
    }

    fn root(&self) -> &Path {
        self.tmp.path()
    }

    fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.root().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn write_config(&self, body: &str) -> PathBuf {
        let java = self.root().join("tools/fake-java");
        let toml = format!("java = {:?}\n{body}", java.to_str().unwrap());
        self.write("yuic.toml", &toml)
    }

    /// Sources the fake minifier was called with, in order.
    fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.root().join("tools/calls.log"))
            .unwrap_or_default()
            .lines()
            .map(|l| {
                Path::new(l)
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }

    fn reset_calls(&self) {
        let _ = fs::remove_file(self.root().join("tools/calls.log"));
    }
}

const CONFIG: &str = r#"
[[filelist]]
dir = "web/js"
files = ["a.js", "b.js", "c.js"]

[[fileset]]
dir = "web/css"
includes = ["*.css"]
"#;

#[test]
fn full_run_then_idempotent_rerun() {
    let project = Project::new();
    project.write("web/js/a.js", "var a;");
    project.write("web/js/b.js", "var b;");
    project.write("web/js/c.js", "var c;");
    project.write("web/css/site.css", "body{}");
    project.write("web/css/notes.txt", "ignored");
    let config = load_config(&project.write_config(CONFIG)).unwrap();

    let report = run(&config, &RunOptions::default()).unwrap();
    assert_eq!(report.minified.len(), 4);
    assert_eq!(project.calls(), vec!["a.js", "b.js", "c.js", "site.css"]);
    assert_eq!(
        fs::read_to_string(project.root().join("web/css/site.min.css")).unwrap(),
        "body{}"
    );

    let cache_file = project.root().join("yuic.cache");
    let first = fs::read(&cache_file).unwrap();
    assert_eq!(Cache::load(&cache_file).len(), 4);

    project.reset_calls();
    let report = run(&config, &RunOptions::default()).unwrap();
    assert_eq!(report.unchanged, 4);
    assert!(project.calls().is_empty());
    assert_eq!(fs::read(&cache_file).unwrap(), first);
}

#[test]
fn syntax_error_is_isolated_and_retried() {
    let project = Project::new();
    project.write("web/js/a.js", "var a;");
    project.write("web/js/b.js", "SYNTAX");
    project.write("web/js/c.js", "var c;");
    fs::create_dir_all(project.root().join("web/css")).unwrap();
    let config = load_config(&project.write_config(CONFIG)).unwrap();

    let report = run(&config, &RunOptions::default()).unwrap();
    assert_eq!(project.calls(), vec!["a.js", "b.js", "c.js"]);
    assert_eq!(report.minified.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(
        report.failures[0].output.as_deref(),
        Some("[ERROR] 1:1:syntax error")
    );
    assert!(!project.root().join("web/js/b.min.js").exists());

    project.write("web/js/b.js", "var b;");
    project.reset_calls();
    let report = run(&config, &RunOptions::default()).unwrap();
    assert_eq!(project.calls(), vec!["b.js"]);
    assert!(!report.has_failures());
}

#[test]
fn missing_jar_aborts_without_writing_cache() {
    let project = Project::new();
    project.write("web/js/a.js", "var a;");
    let config = load_config(&project.write_config(
        "jar = \"vendor/bin/nope.jar\"\n[[filelist]]\ndir = \"web/js\"\nfiles = [\"a.js\"]\n",
    ))
    .unwrap();

    let err = run(&config, &RunOptions::default()).unwrap_err();
    assert!(matches!(err, ProcessError::Precondition(_)));
    assert!(err.to_string().contains("nope.jar"));
    assert!(project.calls().is_empty());
    assert!(!project.root().join("yuic.cache").exists());
}

#[test]
fn target_dir_and_filters_apply() {
    let project = Project::new();
    project.write("src/app.js", "var v = '@VERSION@';\n// dev only\nrun();\n");
    let config = load_config(&project.write_config(
        r#"
target_dir = "public"

[[filelist]]
dir = "src"
files = ["app.js"]

[[filterchain]]
filters = [
    { type = "replace-tokens", tokens = { VERSION = "3.1" } },
    { type = "strip-line-comments", prefixes = ["//"] },
]
"#,
    ))
    .unwrap();

    run(&config, &RunOptions::default()).unwrap();
    assert_eq!(
        fs::read_to_string(project.root().join("public/app.min.js")).unwrap(),
        "var v = '3.1';\nrun();\n"
    );
    // Source is untouched
    assert!(
        fs::read_to_string(project.root().join("src/app.js"))
            .unwrap()
            .contains("@VERSION@")
    );
}
