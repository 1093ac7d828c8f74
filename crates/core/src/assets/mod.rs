//! Input discovery and the on-disk layout of intermediate artifacts.

use std::{
    collections::HashMap,
    ffi::OsStr,
    path::{Path, PathBuf},
};

use crate::{Result, SonifyError};

pub const DOCUMENT_DIR: &str = "1_json_data";
pub const WAV_DIR: &str = "2_wav_individual_sounds";
pub const MIDI_DIR: &str = "2_midi_files";

/// Kind of per-image artifact produced by the synthesis phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Wav,
    Midi,
}

impl SegmentKind {
    pub fn extension(self) -> &'static str {
        match self {
            SegmentKind::Wav => "wav",
            SegmentKind::Midi => "mid",
        }
    }

    fn dir_name(self) -> &'static str {
        match self {
            SegmentKind::Wav => WAV_DIR,
            SegmentKind::Midi => MIDI_DIR,
        }
    }
}

/// Directory tree holding scan documents and rendered segments. Artifact
/// names derive only from the stem of the source file, so re-running a batch
/// overwrites the previous artifacts in place.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    kind: SegmentKind,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>, kind: SegmentKind) -> Self {
        Self {
            root: root.into(),
            kind,
        }
    }

    /// Store placed next to `output`, named `<stem>_intermediate_files`.
    pub fn for_output(output: &Path, kind: SegmentKind) -> Self {
        let stem = output
            .file_stem()
            .unwrap_or_else(|| OsStr::new("composition"))
            .to_string_lossy();
        let parent = output.parent().unwrap_or_else(|| Path::new(""));
        Self::new(parent.join(format!("{stem}_intermediate_files")), kind)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kind(&self) -> SegmentKind {
        self.kind
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.root.join(DOCUMENT_DIR)
    }

    pub fn segments_dir(&self) -> PathBuf {
        self.root.join(self.kind.dir_name())
    }

    /// Creates the directory tree. Safe to call on an existing store.
    pub fn prepare(&self) -> Result<()> {
        std::fs::create_dir_all(self.documents_dir())?;
        std::fs::create_dir_all(self.segments_dir())?;
        Ok(())
    }

    pub fn document_path(&self, source: &Path) -> PathBuf {
        artifact_path(&self.documents_dir(), source, "json")
    }

    pub fn segment_path(&self, source: &Path) -> PathBuf {
        artifact_path(&self.segments_dir(), source, self.kind.extension())
    }

    pub fn documents(&self) -> Result<Vec<PathBuf>> {
        sorted_files_with_extension(&self.documents_dir(), "json")
    }

    pub fn segments(&self) -> Result<Vec<PathBuf>> {
        sorted_files_with_extension(&self.segments_dir(), self.kind.extension())
    }
}

/// `dir/<stem of source>.<extension>`.
pub fn artifact_path(dir: &Path, source: &Path, extension: &str) -> PathBuf {
    let mut name = source
        .file_stem()
        .unwrap_or_else(|| source.as_os_str())
        .to_os_string();
    name.push(".");
    name.push(extension);
    dir.join(name)
}

fn sort_by_file_name(files: &mut [PathBuf]) {
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(OsStr::to_str)
        .is_some_and(|name| name.starts_with('.'))
}

/// Regular files of `dir` with the given extension, sorted by file name.
pub fn sorted_files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if matches && path.is_file() && !is_hidden(&path) {
            files.push(path);
        }
    }
    sort_by_file_name(&mut files);
    Ok(files)
}

/// Lists the input images of `dir` in time order (file-name order).
///
/// Inputs whose stems collide would overwrite each other's artifacts and
/// leave the sequence ambiguous, so such a batch is rejected up front.
pub fn list_inputs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(SonifyError::msg(format!(
            "input folder {} does not exist",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && !is_hidden(&path) {
            files.push(path);
        }
    }
    sort_by_file_name(&mut files);

    if files.is_empty() {
        return Err(SonifyError::EmptyInput(format!(
            "no images in {}",
            dir.display()
        )));
    }

    let mut stems: HashMap<&OsStr, &Path> = HashMap::new();
    for file in &files {
        let stem = file.file_stem().unwrap_or_else(|| file.as_os_str());
        if let Some(previous) = stems.insert(stem, file) {
            return Err(SonifyError::InputOrder(format!(
                "{} and {} share the name `{}`",
                previous.display(),
                file.display(),
                stem.to_string_lossy()
            )));
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"").unwrap();
        path
    }

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn store_layout_follows_output_name() {
        let store = ArtifactStore::for_output(Path::new("renders/forest.wav"), SegmentKind::Wav);
        assert_eq!(
            store.root(),
            Path::new("renders/forest_intermediate_files")
        );
        assert_eq!(
            store.document_path(Path::new("in/frame_001.png")),
            Path::new("renders/forest_intermediate_files/1_json_data/frame_001.json")
        );
        assert_eq!(
            store.segment_path(Path::new("x/frame_001.json")),
            Path::new("renders/forest_intermediate_files/2_wav_individual_sounds/frame_001.wav")
        );

        let midi = ArtifactStore::for_output(Path::new("forest.mid"), SegmentKind::Midi);
        assert_eq!(
            midi.segment_path(Path::new("frame.png")),
            Path::new("forest_intermediate_files/2_midi_files/frame.mid")
        );
    }

    #[test]
    fn prepare_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("store"), SegmentKind::Midi);
        store.prepare().unwrap();
        store.prepare().unwrap();
        assert!(store.documents_dir().is_dir());
        assert!(store.segments_dir().ends_with(MIDI_DIR));
        assert!(store.documents().unwrap().is_empty());
    }

    #[test]
    fn inputs_are_sorted_by_file_name() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.png");
        touch(dir.path(), "a.jpg");
        touch(dir.path(), "c.png");
        touch(dir.path(), ".DS_Store");
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let inputs = list_inputs(dir.path()).unwrap();
        assert_eq!(names(&inputs), vec!["a.jpg", "b.png", "c.png"]);
    }

    #[test]
    fn colliding_stems_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "frame.png");
        touch(dir.path(), "frame.jpg");

        let err = list_inputs(dir.path()).unwrap_err();
        assert!(matches!(err, SonifyError::InputOrder(_)));
    }

    #[test]
    fn empty_and_missing_folders_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            list_inputs(dir.path()),
            Err(SonifyError::EmptyInput(_))
        ));
        assert!(list_inputs(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "2.WAV");
        touch(dir.path(), "1.wav");
        touch(dir.path(), "1.json");

        let wavs = sorted_files_with_extension(dir.path(), "wav").unwrap();
        assert_eq!(names(&wavs), vec!["1.wav", "2.WAV"]);
    }
}
