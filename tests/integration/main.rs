//! Integration tests for the closure CLI
//!
//! Each test writes a small C project to a temp directory and drives the
//! built binary against it.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

struct Project {
    dir: TempDir,
}

impl Project {
    fn new(files: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().unwrap();
        for (path, content) in files {
            let full_path = dir.path().join(path);
            fs::create_dir_all(full_path.parent().unwrap()).unwrap();
            fs::write(full_path, content).unwrap();
        }
        Project { dir }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    /// Run the binary from the project root with `sys/` as the only extra
    /// system include directory.
    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_closure"))
            .arg("--isystem")
            .arg(self.path("sys"))
            .args(args)
            .current_dir(self.root())
            .env_remove("RUST_LOG")
            .output()
            .unwrap()
    }

    fn stdout(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "closure {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).unwrap()
    }
}

fn scenario_a() -> Project {
    Project::new(&[
        ("a.c", "#include \"b.h\"\n#include <stdio.h>\nint main(void) { printf(\"%d\", helper()); return 0; }\n"),
        ("b.h", "#include \"c.h\"\n"),
        ("c.h", "static int helper(void) { return 42; }\n"),
        ("sys/stdio.h", "int printf(const char *fmt, ...);\n"),
    ])
}

#[test]
fn test_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_closure")).arg("--help").output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("closure"));
    assert!(stdout.contains("list"));
    assert!(stdout.contains("select"));
    assert!(stdout.contains("tree"));
}

#[test]
fn test_list_and_select() {
    let project = Project::new(&[(
        "simple.c",
        "int inc(int x) { return x + 1; }\nstruct MyStruct { int value; };\n",
    )]);

    assert_eq!(project.stdout(&["list", "simple.c"]), "0 function _Z3inci\n1 record _ZTS8MyStruct\n");
    assert_eq!(project.stdout(&["select", "--file", "simple.c", "--symbol", "0"]), "_Z3inci\n");
    assert_eq!(project.stdout(&["select", "--file", "simple.c", "--symbol", "1"]), "_ZTS8MyStruct\n");

    let output = project.run(&["select", "--file", "simple.c", "--symbol", "2"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("out of range"));
}

#[test]
fn test_list_json() {
    let project = Project::new(&[("d.c", "typedef struct MyStruct { int value; } MyStructT;\n")]);

    let listing: serde_json::Value = serde_json::from_str(&project.stdout(&["list", "d.c", "--format", "json"])).unwrap();
    let entries = listing.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["signature"], "_ZTS8MyStruct");
    assert_eq!(entries[0]["kind"], "record");
}

#[test]
fn test_list_several_files() {
    let project = Project::new(&[
        ("one.c", "int one(void) { return 1; }\n"),
        ("two.c", "struct Pair { int a, b; };\nint sum(struct Pair p);\n"),
    ]);

    assert_eq!(
        project.stdout(&["list", "one.c", "two.c"]),
        "one.c:\n0 function _Z3onev\n\ntwo.c:\n0 record _ZTS4Pair\n1 function _Z3sum4Pair\n"
    );

    let listings: serde_json::Value =
        serde_json::from_str(&project.stdout(&["list", "one.c", "two.c", "--format", "json"])).unwrap();
    let listings = listings.as_array().unwrap();
    assert_eq!(listings.len(), 2);
    assert_eq!(listings[1]["file"], "two.c");
    assert_eq!(listings[1]["symbols"][1]["signature"], "_Z3sum4Pair");
}

#[test]
fn test_tree_omits_system_headers() {
    let project = scenario_a();
    let stdout = project.stdout(&["tree", "a.c"]);

    assert!(stdout.contains("a.c"));
    assert!(stdout.contains("b.h"));
    assert!(stdout.contains("c.h"));
    assert!(!stdout.contains("stdio.h"));
}

#[test]
fn test_closure_of_main() {
    let project = scenario_a();
    let stdout = project.stdout(&["closure", "--file", "a.c", "--symbol", "0", "a.c"]);

    let (files, symbols) = stdout.split_once("symbols:\n").unwrap();
    assert!(files.starts_with("files:\n"));
    assert!(files.contains("a.c") && files.contains("b.h") && files.contains("c.h"));
    assert!(!files.contains("stdio.h"));
    assert!(symbols.starts_with("main main\n"));
    assert!(symbols.contains("_Z6helperv helper\n"));
    assert!(symbols.contains("_Z6printfPKcz printf (external)\n"));
}

#[test]
fn test_closure_across_units() {
    let project = Project::new(&[
        ("src/chain.h", "int g(int x);\nint h(int x);\n"),
        ("src/f.c", "#include \"chain.h\"\nint f(void) { return g(1); }\n"),
        ("src/g.c", "#include \"chain.h\"\nint g(int x) { if (x) { return h(x); } return 0; }\n"),
        ("src/h.c", "int h(int x) { return x * 2; }\n"),
        ("src/unused.c", "int unused(void) { return 0; }\n"),
    ]);
    let output = project.stdout(&["closure", "--file", "src/f.c", "--symbol", "0", "--format", "json", "src"]);
    let report: serde_json::Value = serde_json::from_str(&output).unwrap();

    let signatures: Vec<&str> = report["symbols"]
        .as_array()
        .unwrap()
        .iter()
        .map(|symbol| symbol["signature"].as_str().unwrap())
        .collect();
    assert_eq!(signatures, vec!["_Z1fv", "_Z1gi", "_Z1hi"]);

    let files: Vec<String> = report["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|file| {
            let path = PathBuf::from(file["path"].as_str().unwrap());
            path.file_name().unwrap().to_string_lossy().into_owned()
        })
        .collect();
    assert_eq!(files[0], "f.c");
    for expected in ["g.c", "h.c", "chain.h"] {
        assert!(files.iter().any(|file| file == expected), "{expected} missing from {files:?}");
    }
    assert!(!files.iter().any(|file| file == "unused.c"));
}

#[test]
fn test_exclude_glob_skips_sources() {
    let project = Project::new(&[
        ("src/main.c", "int run(void);\nint main(void) { return run(); }\n"),
        ("src/run.c", "int run(void) { return 0; }\n"),
        ("src/gen/run.c", "int run(void) { return 1; }\n"),
    ]);
    let output = project.stdout(&[
        "--exclude",
        "gen/**",
        "closure",
        "--file",
        "src/main.c",
        "--symbol",
        "1",
        "--format",
        "json",
        "src",
    ]);
    let report: serde_json::Value = serde_json::from_str(&output).unwrap();

    let paths: Vec<&str> = report["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|file| file["path"].as_str().unwrap())
        .collect();
    assert!(paths.iter().any(|path| path.ends_with("src/run.c")));
    assert!(!paths.iter().any(|path| path.contains("gen")));
}

#[test]
fn test_type_references_flag() {
    let project = Project::new(&[
        ("shape.h", "struct Point { int x, y; };\n"),
        ("shape.c", "#include \"shape.h\"\nint norm(struct Point *p) { return p->x; }\n"),
    ]);
    let base = ["closure", "--file", "shape.c", "--symbol", "0", "shape.c"];

    let without = project.stdout(&base);
    assert!(!without.contains("_ZTS5Point"));

    let mut args = vec!["--include-type-refs"];
    args.extend(base);
    let with = project.stdout(&args);
    assert!(with.contains("_ZTS5Point Point\n"));
}

#[test]
fn test_config_file() {
    let project = Project::new(&[
        ("closure.toml", "[frontend]\ninclude_dirs = [\"include\"]\n\n[relations]\ninclude_type_references = true\n"),
        ("include/point.h", "struct Point { int x, y; };\n"),
        ("main.c", "#include \"point.h\"\nint norm(struct Point *p) { return p->y; }\n"),
    ]);
    let stdout = project.stdout(&["closure", "--file", "main.c", "--symbol", "0", "main.c"]);

    assert!(stdout.contains("point.h"));
    assert!(stdout.contains("_ZTS5Point Point\n"));
}

#[test]
fn test_missing_source_fails() {
    let project = scenario_a();
    let output = project.run(&["tree", "nope.c"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("nope.c"));
}
