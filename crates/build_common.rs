// README-to-rustdoc helper shared by the workspace build scripts.
// Pull it in with: include!("../build_common.rs");
//
// The including build.rs must import:
//   use std::env;
//   use std::fs;
//   use std::path::Path;

/// Copy a crate's README.md into `OUT_DIR/README_GENERATED.md` with links
/// rewritten so rustdoc can resolve them.
///
/// - `](src/engine/mod.rs)` becomes `](engine/mod)` (module links)
/// - `](../../README.md` becomes the workspace repository URL
fn process_readme_for_rustdoc(crate_dir: &str) {
    println!("cargo:rerun-if-changed=README.md");
    println!("cargo:rerun-if-changed=../../Cargo.toml");

    let out_dir = env::var("OUT_DIR").unwrap();
    let dest = Path::new(&out_dir).join("README_GENERATED.md");

    // A missing README still has to produce the file the crate includes.
    let content = fs::read_to_string(Path::new(crate_dir).join("README.md")).unwrap_or_default();

    let mut doc = content.replace("](src/", "](").replace(".rs)", ")");
    if let Some(url) = workspace_repository(crate_dir) {
        doc = doc.replace("](../../README.md", &format!("]({url}"));
    }

    fs::write(dest, doc).unwrap();
}

/// Read `repository = "..."` from the workspace Cargo.toml.
fn workspace_repository(crate_dir: &str) -> Option<String> {
    let manifest = Path::new(crate_dir).parent()?.parent()?.join("Cargo.toml");
    let content = fs::read_to_string(manifest).ok()?;

    content.lines().map(str::trim).find_map(|line| {
        let value = line.strip_prefix("repository")?.trim_start().strip_prefix('=')?;
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}
