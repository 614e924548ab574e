//! Expansion of command-line inputs into source files.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// Expands `inputs` into the list of files to convert.
///
/// Files are taken as given. Directories contribute their direct children
/// whose extension matches `extension` (case-insensitive), sorted by path.
/// Order of the inputs is preserved.
pub fn expand_inputs(inputs: &[PathBuf], extension: &str) -> Result<Vec<PathBuf>> {
    let extension = extension.trim_start_matches('.');
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            files.extend(
                list_directory(input, extension)
                    .with_context(|| format!("Failed to read directory {:?}", input))?,
            );
        } else if input.is_file() {
            files.push(input.clone());
        } else {
            bail!("Input not found: {:?}", input);
        }
    }

    Ok(files)
}

fn list_directory(dir: &Path, extension: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_extension(&path, extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_directory_is_flat_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        for name in ["b.m4a", "a.M4A", "c.mp3", "notes.txt"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("d.m4a"), b"x").unwrap();

        let files = expand_inputs(&[dir.path().to_path_buf()], "m4a").unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("a.M4A"), dir.path().join("b.m4a")]
        );
    }

    #[test]
    fn test_files_kept_in_order_regardless_of_extension() {
        let dir = TempDir::new().unwrap();
        let second = dir.path().join("z.wav");
        let first = dir.path().join("y.m4a");
        fs::write(&second, b"x").unwrap();
        fs::write(&first, b"x").unwrap();

        let files = expand_inputs(&[second.clone(), first.clone()], "m4a").unwrap();
        assert_eq!(files, vec![second, first]);
    }

    #[test]
    fn test_leading_dot_in_extension() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.flac"), b"x").unwrap();

        let files = expand_inputs(&[dir.path().to_path_buf()], ".flac").unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = expand_inputs(&[dir.path().join("missing.m4a")], "m4a");
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_directory() {
        let dir = TempDir::new().unwrap();
        let files = expand_inputs(&[dir.path().to_path_buf()], "m4a").unwrap();
        assert!(files.is_empty());
    }
}
