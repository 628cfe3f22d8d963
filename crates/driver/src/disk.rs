//! The `disk` module manages the per-game data directories under the challenger's datadir.

use crate::scheduler::DiskManager;
use anyhow::{anyhow, Context, Result};
use ethers::types::Address;
use std::{fs, io, path::PathBuf};

/// Prefix of every game's directory name. The rest of the name is the game address in hex.
const GAME_DIR_PREFIX: &str = "game-";

/// A [DiskManager] storing each game's data in `<datadir>/game-<address>`.
#[derive(Debug, Clone)]
pub struct GameDirectories {
    datadir: PathBuf,
}

impl GameDirectories {
    /// Creates a new [GameDirectories] rooted at `datadir`.
    pub fn new(datadir: PathBuf) -> Self {
        Self { datadir }
    }

    fn path_for(&self, game: Address) -> PathBuf {
        self.datadir.join(format!("{}{:x}", GAME_DIR_PREFIX, game))
    }
}

impl DiskManager for GameDirectories {
    fn dir_for_game(&self, game: Address) -> Result<PathBuf> {
        let path = self.path_for(game);
        fs::create_dir_all(&path)
            .with_context(|| format!("failed to create game directory {}", path.display()))?;
        Ok(path)
    }

    fn remove_all_except(&self, keep: &[Address]) -> Result<()> {
        let entries = match fs::read_dir(&self.datadir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to list datadir {}", self.datadir.display())
                })
            }
        };

        let failures = remove_entries(entries, keep);
        if !failures.is_empty() {
            return Err(anyhow!(
                "failed to remove game directories: {}",
                failures.join(", ")
            ));
        }
        Ok(())
    }
}

/// Removes every game directory among `entries` that is not in `keep`, returning a description
/// of each entry that could not be read or removed.
fn remove_entries(
    entries: impl Iterator<Item = io::Result<fs::DirEntry>>,
    keep: &[Address],
) -> Vec<String> {
    let mut failures = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                failures.push(format!("unreadable entry: {}", e));
                continue;
            }
        };
        match entry.file_type() {
            Ok(file_type) if file_type.is_dir() => {}
            Ok(_) => continue,
            Err(e) => {
                failures.push(format!("{}: {}", entry.path().display(), e));
                continue;
            }
        }
        let name = entry.file_name();
        // Directories that don't belong to a game are left alone.
        let Some(game) = name
            .to_str()
            .and_then(|name| name.strip_prefix(GAME_DIR_PREFIX))
            .and_then(|hex| hex.parse::<Address>().ok())
        else {
            continue;
        };
        if keep.contains(&game) {
            continue;
        }

        tracing::debug!(target: "disk-manager", "Removing data of game {:?}", game);
        if let Err(e) = fs::remove_dir_all(entry.path()) {
            failures.push(format!("{}: {}", entry.path().display(), e));
        }
    }
    failures
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn creates_one_directory_per_game() {
        let datadir = tempfile::tempdir().unwrap();
        let disk = GameDirectories::new(datadir.path().to_path_buf());
        let game = Address::repeat_byte(0xab);

        let dir = disk.dir_for_game(game).unwrap();
        assert!(dir.is_dir());
        assert_eq!(
            dir.file_name().unwrap().to_str().unwrap(),
            format!("game-{}", "ab".repeat(20))
        );
        // Requesting it again returns the same directory.
        assert_eq!(disk.dir_for_game(game).unwrap(), dir);
    }

    #[test]
    fn removes_only_unkept_game_directories() {
        let datadir = tempfile::tempdir().unwrap();
        let disk = GameDirectories::new(datadir.path().to_path_buf());
        let keep = Address::repeat_byte(1);
        let remove = Address::repeat_byte(2);
        let kept_dir = disk.dir_for_game(keep).unwrap();
        let removed_dir = disk.dir_for_game(remove).unwrap();
        fs::write(removed_dir.join("trace.json"), b"{}").unwrap();
        let other = datadir.path().join("not-a-game");
        fs::create_dir(&other).unwrap();
        let file = datadir.path().join(format!("game-{:x}", Address::repeat_byte(3)));
        fs::write(&file, b"").unwrap();

        disk.remove_all_except(&[keep]).unwrap();
        assert!(kept_dir.is_dir());
        assert!(!removed_dir.exists());
        assert!(other.is_dir());
        assert!(file.is_file());
    }

    #[test]
    fn unreadable_entries_do_not_stop_cleanup() {
        let datadir = tempfile::tempdir().unwrap();
        let disk = GameDirectories::new(datadir.path().to_path_buf());
        let removed_dir = disk.dir_for_game(Address::repeat_byte(2)).unwrap();

        let entries = std::iter::once(Err(io::Error::new(io::ErrorKind::Other, "bad entry")))
            .chain(fs::read_dir(datadir.path()).unwrap());
        let failures = remove_entries(entries, &[]);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("bad entry"));
        assert!(!removed_dir.exists());
    }

    #[test]
    fn missing_datadir_is_not_an_error() {
        let datadir = tempfile::tempdir().unwrap();
        let disk = GameDirectories::new(datadir.path().join("missing"));
        disk.remove_all_except(&[]).unwrap();
    }
}
