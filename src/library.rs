//! Library scanning: recursive walk of the configured folders collecting video files.

use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Recognized media extensions, compared case-insensitively.
pub const MEDIA_EXTENSIONS: [&str; 19] = [
  "mp4", "m4v", "mkv", "avi", "mov", "mpg", "mpeg", "webm", "flv", "ogv", "vob", "wmv", "3gp", "3g2", "f4v", "ts", "m2ts",
  "mts", "divx",
];

pub fn is_supported_media(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .is_some_and(|ext| MEDIA_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
}

/// Candidate files for random selection. Rebuilt by a full rescan, never updated incrementally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Library {
  files: Vec<PathBuf>,
}

impl Library {
  pub fn from_paths(files: Vec<PathBuf>) -> Self {
    Self { files }
  }

  /// Walk every folder recursively. Unreadable folders and entries are logged and skipped.
  pub fn scan(folders: &[PathBuf]) -> Self {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for folder in folders {
      if !folder.is_dir() {
        warn!(folder = %folder.display(), "library: folder missing or not a directory");
        continue;
      }
      for entry in WalkDir::new(folder) {
        let entry = match entry {
          Ok(entry) => entry,
          Err(e) => {
            debug!(err = %e, "library: skipping unreadable entry");
            continue;
          }
        };
        if entry.file_type().is_file() && is_supported_media(entry.path()) && seen.insert(entry.path().to_path_buf()) {
          files.push(entry.into_path());
        }
      }
    }

    info!(folders = folders.len(), files = files.len(), "library: scan complete");
    Self::from_paths(files)
  }

  pub fn len(&self) -> usize {
    self.files.len()
  }

  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }

  #[cfg(test)]
  pub fn files(&self) -> &[PathBuf] {
    &self.files
  }

  /// Pick a file uniformly at random.
  pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Path> {
    self.files.choose(rng).map(PathBuf::as_path)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::SeedableRng;
  use rand::rngs::StdRng;
  use std::fs;

  fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"").unwrap();
  }

  #[test]
  fn extension_match_is_case_insensitive() {
    assert!(is_supported_media(Path::new("/x/clip.MP4")));
    assert!(is_supported_media(Path::new("/x/clip.Mkv")));
    assert!(is_supported_media(Path::new("/x/clip.m2ts")));
    assert!(is_supported_media(Path::new("/x/clip.3g2")));
  }

  #[test]
  fn non_media_files_are_rejected() {
    assert!(!is_supported_media(Path::new("/x/notes.txt")));
    assert!(!is_supported_media(Path::new("/x/song.mp3")));
    assert!(!is_supported_media(Path::new("/x/mp4")));
    assert!(!is_supported_media(Path::new("/x/.hidden")));
  }

  #[test]
  fn scan_walks_subdirectories() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("a.mp4"));
    touch(&dir.path().join("nested/deeper/b.MKV"));
    touch(&dir.path().join("nested/readme.md"));

    let lib = Library::scan(&[dir.path().to_path_buf()]);
    let mut names: Vec<_> = lib.files().iter().map(|p| p.file_name().unwrap().to_string_lossy().into_owned()).collect();
    names.sort();
    assert_eq!(names, vec!["a.mp4", "b.MKV"]);
  }

  #[test]
  fn missing_folder_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("a.webm"));

    let lib = Library::scan(&[dir.path().join("gone"), dir.path().to_path_buf()]);
    assert_eq!(lib.len(), 1);
  }

  #[test]
  fn overlapping_folders_do_not_duplicate_files() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("sub/a.avi"));

    let lib = Library::scan(&[dir.path().to_path_buf(), dir.path().join("sub")]);
    assert_eq!(lib.len(), 1);
  }

  #[test]
  fn rescan_of_unchanged_folders_yields_same_set() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["x.mp4", "y/z.mov", "y/w.ts", "q.flv"] {
      touch(&dir.path().join(name));
    }
    let folders = vec![dir.path().to_path_buf()];

    let first: HashSet<_> = Library::scan(&folders).files().iter().cloned().collect();
    let second: HashSet<_> = Library::scan(&folders).files().iter().cloned().collect();
    assert_eq!(first.len(), 4);
    assert_eq!(first, second);
  }

  #[test]
  fn empty_folder_list_gives_empty_library() {
    assert!(Library::scan(&[]).is_empty());
  }

  #[test]
  fn choose_returns_member_or_none() {
    let mut rng = StdRng::seed_from_u64(7);
    assert!(Library::default().choose(&mut rng).is_none());

    let lib = Library::from_paths(vec![PathBuf::from("/a.mp4"), PathBuf::from("/b.mp4")]);
    for _ in 0..20 {
      let pick = lib.choose(&mut rng).unwrap();
      assert!(lib.files().iter().any(|f| f == pick));
    }
  }
}
