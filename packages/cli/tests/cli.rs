use layerfs_cli::commands::Context;
use layerfs_cli::{execute, load_options, open_storage, Command};
use layerfs_registry::Registry;

fn run(ctx: &Context<'_>, command: Command) -> String {
    let mut out = Vec::new();
    execute(ctx, command, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn options_file_drives_the_storage() {
    let dir = tempfile::tempdir().unwrap();
    let media = dir.path().join("media");
    let config = dir.path().join("storage.json");
    std::fs::write(
        &config,
        serde_json::json!({
            "storage_config": {
                "fs_class": "local",
                "kwargs": {"root": media, "create_root": true}
            },
            "base_url": "https://media.example.com/",
            "allow_overwrite": false
        })
        .to_string(),
    )
    .unwrap();
    let upload = dir.path().join("upload.txt");
    std::fs::write(&upload, b"contents").unwrap();

    let registry = Registry::with_builtins();
    let options = load_options(Some(config.as_path())).unwrap();
    let storage = open_storage(&registry, options).unwrap();
    let ctx = Context {
        storage: &storage,
        registry: &registry,
        color: false,
    };

    let first = run(
        &ctx,
        Command::Save {
            name: "reports/my report.txt".into(),
            source: Some(upload.clone()),
            max_length: None,
        },
    );
    assert_eq!(first, "reports/my_report.txt\n");
    assert_eq!(
        std::fs::read(media.join("reports/my_report.txt")).unwrap(),
        b"contents"
    );

    let second = run(
        &ctx,
        Command::Save {
            name: "reports/my report.txt".into(),
            source: Some(upload),
            max_length: None,
        },
    );
    assert_ne!(second, first);

    assert_eq!(
        run(&ctx, Command::Url { name: "reports/my_report.txt".into() }),
        "https://media.example.com/reports/my_report.txt\n"
    );
    assert_eq!(
        run(&ctx, Command::Ls { name: String::new(), long: false }),
        "reports/\n"
    );
}

#[test]
fn missing_source_file_is_reported() {
    let registry = Registry::with_builtins();
    let dir = tempfile::tempdir().unwrap();
    let storage = layerfs_storage::Storage::new(std::sync::Arc::new(
        layerfs_core::LocalFs::new(dir.path()).unwrap(),
    ));
    let ctx = Context {
        storage: &storage,
        registry: &registry,
        color: false,
    };

    let err = execute(
        &ctx,
        Command::Put {
            name: "a".into(),
            source: Some(dir.path().join("does-not-exist")),
            append: false,
        },
        &mut Vec::new(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("does-not-exist"));
}
