//! CLI subcommands and their execution.
//!
//! Names are relative to the storage location. Commands that only read
//! (`ls`, `cat`, `info`, `exists`, `find`, `url`) never modify the storage.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use clap::Subcommand;
use nu_ansi_term::{Color, Style};
use serde_json::json;

use layerfs_core::{FileInfo, FileSystem, WriteMode};
use layerfs_registry::Registry;
use layerfs_storage::Storage;

use crate::CliError;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List a directory
    Ls {
        #[arg(default_value = "")]
        name: String,
        /// Show type, size and modification time
        #[arg(short, long)]
        long: bool,
    },
    /// Print a file
    Cat { name: String },
    /// Write a file from SOURCE (stdin when omitted)
    Put {
        name: String,
        source: Option<PathBuf>,
        /// Append instead of replacing
        #[arg(short, long)]
        append: bool,
    },
    /// Save a file under an available name and print the name used
    Save {
        name: String,
        source: Option<PathBuf>,
        /// Maximum length of the stored name
        #[arg(long)]
        max_length: Option<usize>,
    },
    /// Remove a file or directory
    Rm {
        name: String,
        #[arg(short, long)]
        recursive: bool,
    },
    /// Create a directory
    Mkdir {
        name: String,
        /// Create missing parents; an existing directory is not an error
        #[arg(short, long)]
        parents: bool,
    },
    /// Move a file or directory
    Mv { from: String, to: String },
    /// Copy a file
    Cp { from: String, to: String },
    /// Print metadata as JSON
    Info { name: String },
    /// Print whether a name exists
    Exists { name: String },
    /// List every file below a directory
    Find {
        #[arg(default_value = "")]
        name: String,
    },
    /// Print the public URL of a file
    Url { name: String },
    /// List the registered backend identifiers
    Backends,
}

/// What commands run against.
pub struct Context<'a> {
    pub storage: &'a Storage,
    pub registry: &'a Registry,
    /// Style listings with ANSI colors.
    pub color: bool,
}

/// Run `command`, writing its output to `out`.
pub fn execute(ctx: &Context<'_>, command: Command, out: &mut dyn Write) -> Result<(), CliError> {
    let storage = ctx.storage;
    let fs = storage.filesystem();
    tracing::debug!(?command, "Executing");

    match command {
        Command::Ls { name, long } => {
            for entry in storage.ls(&name)? {
                writeln!(out, "{}", format_entry(&entry, long, ctx.color))?;
            }
        }
        Command::Cat { name } => {
            let mut reader = storage.open(&name)?;
            io::copy(&mut reader, out)?;
        }
        Command::Put {
            name,
            source,
            append,
        } => {
            let mode = if append {
                WriteMode::Append
            } else {
                WriteMode::Truncate
            };
            let path = storage.fs_path(&name)?;
            let mut input = open_input(source)?;
            let mut writer = fs.open_write(&path, mode)?;
            io::copy(&mut input, &mut writer)?;
            writer.commit()?;
        }
        Command::Save {
            name,
            source,
            max_length,
        } => {
            let name = storage.generate_filename(&name)?;
            let mut input = open_input(source)?;
            let saved = storage.save(&name, &mut input, max_length)?;
            writeln!(out, "{}", saved)?;
        }
        Command::Rm { name, recursive } => {
            fs.rm(&storage.fs_path(&name)?, recursive)?;
        }
        Command::Mkdir { name, parents } => {
            let path = storage.fs_path(&name)?;
            if parents {
                fs.makedirs(&path, true)?;
            } else {
                fs.mkdir(&path, false)?;
            }
        }
        Command::Mv { from, to } => {
            fs.mv(&storage.fs_path(&from)?, &storage.fs_path(&to)?)?;
        }
        Command::Cp { from, to } => {
            fs.copy(&storage.fs_path(&from)?, &storage.fs_path(&to)?)?;
        }
        Command::Info { name } => {
            let info = fs.info(&storage.fs_path(&name)?)?;
            writeln!(out, "{}", serde_json::to_string_pretty(&info_json(&info))?)?;
        }
        Command::Exists { name } => {
            writeln!(out, "{}", storage.exists(&name)?)?;
        }
        Command::Find { name } => {
            let base = storage.fs_path("")?;
            for path in fs.find(&storage.fs_path(&name)?)? {
                let relative = path.strip_prefix(&base).unwrap_or(path);
                writeln!(out, "{}", relative)?;
            }
        }
        Command::Url { name } => {
            writeln!(out, "{}", storage.url(&name)?)?;
        }
        Command::Backends => {
            for identifier in ctx.registry.identifiers() {
                writeln!(out, "{}", identifier)?;
            }
        }
    }
    Ok(())
}

fn open_input(source: Option<PathBuf>) -> Result<Box<dyn Read>, CliError> {
    match source {
        Some(path) => match File::open(&path) {
            Ok(file) => Ok(Box::new(file)),
            Err(source) => Err(CliError::Input { path, source }),
        },
        None => Ok(Box::new(io::stdin().lock())),
    }
}

fn info_json(info: &FileInfo) -> serde_json::Value {
    let seconds = |t: Option<std::time::SystemTime>| {
        t.and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
    };
    json!({
        "name": info.name,
        "type": if info.is_dir() { "directory" } else { "file" },
        "size": info.size,
        "created": seconds(info.created),
        "modified": seconds(info.modified),
    })
}

/// Format a listing entry. Directories get a trailing `/`.
pub fn format_entry(entry: &FileInfo, long: bool, color: bool) -> String {
    let name = if entry.is_dir() {
        let name = format!("{}/", entry.name);
        if color {
            Style::new().bold().fg(Color::Blue).paint(name).to_string()
        } else {
            name
        }
    } else {
        entry.name.clone()
    };

    if !long {
        return name;
    }
    let kind = if entry.is_dir() { "d" } else { "-" };
    format!("{} {:>10} {}", kind, entry.size, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use layerfs_core::{fspath, MemoryFs};

    fn run(storage: &Storage, command: Command) -> String {
        let registry = Registry::with_builtins();
        let ctx = Context {
            storage,
            registry: &registry,
            color: false,
        };
        let mut out = Vec::new();
        execute(&ctx, command, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn memory_storage() -> (Storage, MemoryFs) {
        let fs = MemoryFs::with_files([("docs/a.txt", "alpha"), ("docs/sub/b.txt", "beta")])
            .unwrap();
        (Storage::new(Arc::new(fs.clone())), fs)
    }

    #[test]
    fn ls_marks_directories() {
        let (storage, _) = memory_storage();
        let out = run(&storage, Command::Ls { name: "docs".into(), long: false });
        assert_eq!(out, "a.txt\nsub/\n");
    }

    #[test]
    fn long_listing() {
        let entry = FileInfo::file("a.txt", 5);
        assert_eq!(format_entry(&entry, true, false), "-          5 a.txt");
    }

    #[test]
    fn colored_directories() {
        let entry = FileInfo::directory("sub");
        let styled = format_entry(&entry, false, true);
        assert!(styled.contains("sub/"));
        assert_ne!(styled, "sub/");
    }

    #[test]
    fn cat_and_find() {
        let (storage, _) = memory_storage();
        assert_eq!(run(&storage, Command::Cat { name: "docs/a.txt".into() }), "alpha");
        assert_eq!(
            run(&storage, Command::Find { name: "docs".into() }),
            "docs/a.txt\ndocs/sub/b.txt\n"
        );
    }

    #[test]
    fn find_is_relative_to_location() {
        let (storage, _) = memory_storage();
        let storage = storage.with_location("docs").unwrap();
        assert_eq!(
            run(&storage, Command::Find { name: String::new() }),
            "a.txt\nsub/b.txt\n"
        );
    }

    #[test]
    fn mkdir_mv_rm() {
        let (storage, fs) = memory_storage();
        run(&storage, Command::Mkdir { name: "x/y".into(), parents: true });
        assert!(fs.is_dir(&fspath!("x/y")).unwrap());

        run(&storage, Command::Mv { from: "docs/a.txt".into(), to: "x/y/a.txt".into() });
        assert_eq!(fs.cat(&fspath!("x/y/a.txt")).unwrap(), "alpha");

        run(&storage, Command::Rm { name: "x".into(), recursive: true });
        assert!(!fs.exists(&fspath!("x")).unwrap());
        assert_eq!(run(&storage, Command::Exists { name: "x".into() }), "false\n");
    }

    #[test]
    fn info_is_json() {
        let (storage, _) = memory_storage();
        let out = run(&storage, Command::Info { name: "docs/a.txt".into() });
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["type"], "file");
        assert_eq!(value["size"], 5);
    }

    #[test]
    fn missing_file_is_an_error() {
        let (storage, _) = memory_storage();
        let registry = Registry::with_builtins();
        let ctx = Context {
            storage: &storage,
            registry: &registry,
            color: false,
        };
        let err = execute(&ctx, Command::Cat { name: "nope".into() }, &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn backends_are_listed() {
        let (storage, _) = memory_storage();
        let out = run(&storage, Command::Backends);
        assert!(out.lines().any(|l| l == "memory"));
        assert!(out.lines().any(|l| l == "transparent"));
    }
}
