//! Maze-file loading. Definitions are plain text files; an invalid file is
//! reported and skipped, never fatal.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::maze::Maze;

/// Load every `*.txt` maze under `dir`, sorted by file name so the operator
/// always sees the same listing order. A maze is named after its lower-cased
/// file stem.
pub fn load_mazes(dir: &Path) -> Vec<Maze> {
    let mut mazes = Vec::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) => {
            warn!(dir = %dir.display(), %error, "cannot read the maze directory");
            return mazes;
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|extension| extension == "txt"))
        .collect();
    paths.sort();

    for path in paths {
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(error) => {
                warn!(path = %path.display(), %error, "cannot read maze file");
                continue;
            }
        };
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let content = normalize(&content);
        match Maze::parse(&name, &content) {
            Ok(maze) => {
                info!(
                    maze = maze.name(),
                    width = maze.width(),
                    height = maze.height(),
                    max_occupancy = maze.max_occupancy(),
                    "maze loaded"
                );
                mazes.push(maze);
            }
            Err(error) => warn!(maze = %name, %error, "invalid maze skipped"),
        }
    }
    mazes
}

/// Editors add line endings the grid format does not know about: fold CRLF
/// into plain newlines and drop the final end-of-file newline.
fn normalize(content: &str) -> String {
    let content = content.replace("\r\n", "\n");
    content
        .strip_suffix('\n')
        .map(|stripped| stripped.to_string())
        .unwrap_or(content)
}
