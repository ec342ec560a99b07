//! Integration tests for `--build-static`.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;
use tern_cli::commands::build_static;
use tern_config::ServerConfig;

fn project() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::create_dir_all(root.join("vendor")).unwrap();
    fs::write(
        root.join("index.html"),
        "<html><head></head><body><script src=\"/src/main.js\"></script></body></html>",
    )
    .unwrap();
    fs::write(
        root.join("src/main.ts"),
        "import { greet } from './greet';\nexport const message: string = greet('tern');\n",
    )
    .unwrap();
    fs::write(
        root.join("src/greet.ts"),
        "export function greet(name: string): string { return 'hi ' + name; }\n",
    )
    .unwrap();
    fs::write(root.join("vendor/raw.ts"), "const untouched: number = 1;\n").unwrap();
    fs::write(root.join("logo.svg"), "<svg/>").unwrap();
    temp
}

#[tokio::test]
async fn test_build_static_renders_and_copies() {
    let temp = project();
    let root = temp.path().canonicalize().unwrap();
    let config = ServerConfig {
        watch: true,
        exclude_dirs: vec![PathBuf::from("vendor")],
        ..ServerConfig::with_root(&root)
    };

    let summary = build_static::execute(config).await.unwrap();
    let dist = root.join("dist");

    assert_eq!(summary.output, dist);
    assert_eq!(summary.rendered, 3);
    assert!(summary.failed.is_empty());

    let index = fs::read_to_string(dist.join("index.html")).unwrap();
    assert!(!index.contains("WebSocket"));

    let main = fs::read_to_string(dist.join("src/main.js")).unwrap();
    assert!(main.contains("System.register"));
    assert!(!main.contains(": string"));

    // excluded sources are copied but never rendered
    assert!(dist.join("vendor/raw.ts").exists());
    assert!(!dist.join("vendor/raw.js").exists());
    assert!(dist.join("logo.svg").exists());
    assert!(dist.join("src/main.ts").exists());
    assert!(!root.join(".tern-staging").exists());
}

#[tokio::test]
async fn test_build_static_replaces_previous_output() {
    let temp = project();
    let root = temp.path().canonicalize().unwrap();
    fs::create_dir_all(root.join("dist")).unwrap();
    fs::write(root.join("dist/stale.js"), "old").unwrap();

    build_static::execute(ServerConfig::with_root(&root)).await.unwrap();

    assert!(!root.join("dist/stale.js").exists());
    assert!(!root.join("dist/dist").exists());
    assert!(root.join("dist/src/greet.js").exists());
}
