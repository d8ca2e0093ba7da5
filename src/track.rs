//! Track metadata and the saved track library

use crate::judge::SessionSummary;
use crate::{Result, RizumuError};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Entries shown around the selection in [`TrackLibrary::window`]
pub const LIBRARY_WINDOW: usize = 7;

/// A playable track and its best result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Audio file handed to the decoder
    pub audio_path: PathBuf,
    /// Beat map generated for the audio file
    pub map_path: Option<PathBuf>,
    /// Title tag
    pub title: Option<String>,
    /// Artist tag
    pub artist: Option<String>,
    /// Album tag
    pub album: Option<String>,
    /// Length in seconds, 0 if unknown
    pub duration: f64,
    /// Best score so far
    pub high_score: u64,
    /// Accuracy of the best score
    pub high_score_accuracy: f64,
    /// Lanes played for the best score, as sorted letters
    pub high_score_layers: Option<String>,
}

impl Track {
    /// New track with no metadata and no score
    pub fn new<P: Into<PathBuf>>(audio_path: P) -> Self {
        Track {
            audio_path: audio_path.into(),
            map_path: None,
            title: None,
            artist: None,
            album: None,
            duration: 0.0,
            high_score: 0,
            high_score_accuracy: 0.0,
            high_score_layers: None,
        }
    }

    /// Attach a beat map
    pub fn with_map<P: Into<PathBuf>>(mut self, map_path: P) -> Self {
        self.map_path = Some(map_path.into());
        self
    }

    /// Title, falling back to the file name
    pub fn display_name(&self) -> String {
        match &self.title {
            Some(title) => title.clone(),
            None => self
                .audio_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.audio_path.display().to_string()),
        }
    }

    /// Keep `summary` if it beats the stored high score.
    /// Returns `true` when the high score changed.
    pub fn record_result(&mut self, summary: &SessionSummary) -> bool {
        if summary.score <= self.high_score {
            return false;
        }
        info!(
            "New high score for {}: {} (was {})",
            self.display_name(),
            summary.score,
            self.high_score
        );
        self.high_score = summary.score;
        self.high_score_accuracy = summary.accuracy;
        self.high_score_layers = Some(summary.layers.clone());
        true
    }
}

/// Saved tracks, sorted by audio path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackLibrary {
    tracks: Vec<Track>,
}

impl TrackLibrary {
    /// Empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a library file. A missing file gives an empty library.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No library at {}, starting empty", path.display());
            return Ok(Self::new());
        }
        let text = fs::read_to_string(path)?;
        let mut library: TrackLibrary = serde_json::from_str(&text).map_err(|e| {
            RizumuError::Library(format!("Failed to parse '{}': {}", path.display(), e))
        })?;
        library.tracks.sort_by(|a, b| a.audio_path.cmp(&b.audio_path));
        Ok(library)
    }

    /// Write the library, creating parent directories as needed
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!("Saved {} tracks to {}", self.tracks.len(), path.display());
        Ok(())
    }

    /// Insert a track in sorted position, replacing one with the same
    /// audio path. Returns its index.
    pub fn add_track(&mut self, track: Track) -> usize {
        match self
            .tracks
            .binary_search_by(|t| t.audio_path.cmp(&track.audio_path))
        {
            Ok(index) => {
                self.tracks[index] = track;
                index
            }
            Err(index) => {
                self.tracks.insert(index, track);
                index
            }
        }
    }

    /// Track by audio path
    pub fn find(&self, audio_path: &Path) -> Option<&Track> {
        self.index_of(audio_path).map(|i| &self.tracks[i])
    }

    /// Mutable track by audio path
    pub fn find_mut(&mut self, audio_path: &Path) -> Option<&mut Track> {
        self.index_of(audio_path).map(move |i| &mut self.tracks[i])
    }

    fn index_of(&self, audio_path: &Path) -> Option<usize> {
        self.tracks
            .binary_search_by(|t| t.audio_path.as_path().cmp(audio_path))
            .ok()
    }

    /// Track at `index`
    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// All tracks in order
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Number of tracks
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// True if the library is empty
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// The [`LIBRARY_WINDOW`] slots centred on `center`; slots past
    /// either end are `None`.
    pub fn window(&self, center: usize) -> [Option<&Track>; LIBRARY_WINDOW] {
        let half = LIBRARY_WINDOW / 2;
        std::array::from_fn(|slot| {
            (center + slot)
                .checked_sub(half)
                .and_then(|index| self.tracks.get(index))
        })
    }

    /// Record a session result for the track at `audio_path`, adding the
    /// track first if needed. Returns `true` when the high score changed.
    pub fn record_result(&mut self, audio_path: &Path, summary: &SessionSummary) -> bool {
        let index = match self.index_of(audio_path) {
            Some(index) => index,
            None => self.add_track(Track::new(audio_path)),
        };
        self.tracks[index].record_result(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::TierCounts;

    fn summary(score: u64, accuracy: f64) -> SessionSummary {
        SessionSummary {
            score,
            accuracy,
            counts: TierCounts::default(),
            total_beats: 10,
            max_combo: 0,
            layers: "ABD".to_string(),
        }
    }

    #[test]
    fn test_high_score_write_back() {
        let mut track = Track::new("music/song.flac");
        assert!(track.record_result(&summary(120, 80.0)));
        assert_eq!(track.high_score, 120);
        assert_eq!(track.high_score_accuracy, 80.0);
        assert_eq!(track.high_score_layers.as_deref(), Some("ABD"));

        // Equal or lower scores leave it alone
        assert!(!track.record_result(&summary(120, 99.0)));
        assert!(!track.record_result(&summary(50, 100.0)));
        assert_eq!(track.high_score_accuracy, 80.0);
    }

    #[test]
    fn test_library_stays_sorted() {
        let mut library = TrackLibrary::new();
        library.add_track(Track::new("c.mp3"));
        library.add_track(Track::new("a.mp3"));
        library.add_track(Track::new("b.mp3"));
        assert_eq!(library.add_track(Track::new("b.mp3").with_map("b.track")), 1);

        let names: Vec<String> = library.tracks().iter().map(Track::display_name).collect();
        assert_eq!(names, ["a.mp3", "b.mp3", "c.mp3"]);
        assert_eq!(library.len(), 3);
        assert!(library.find(Path::new("b.mp3")).unwrap().map_path.is_some());
    }

    #[test]
    fn test_window() {
        let mut library = TrackLibrary::new();
        for name in ["1.ogg", "2.ogg", "3.ogg", "4.ogg"] {
            library.add_track(Track::new(name));
        }
        let window = library.window(0);
        assert!(window[..3].iter().all(Option::is_none));
        assert_eq!(window[3].map(Track::display_name).as_deref(), Some("1.ogg"));
        assert_eq!(window[6].map(Track::display_name).as_deref(), Some("4.ogg"));

        let window = library.window(3);
        assert_eq!(window[0].map(Track::display_name).as_deref(), Some("1.ogg"));
        assert!(window[4].is_none());
    }

    #[test]
    fn test_record_result_adds_track() {
        let mut library = TrackLibrary::new();
        assert!(library.record_result(Path::new("new.wav"), &summary(10, 50.0)));
        assert_eq!(library.find(Path::new("new.wav")).unwrap().high_score, 10);
        assert!(!library.record_result(Path::new("new.wav"), &summary(5, 50.0)));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library").join("saved.library.json");
        assert!(TrackLibrary::load(&path).unwrap().is_empty());

        let mut library = TrackLibrary::new();
        let mut track = Track::new("x.mp3");
        track.title = Some("Song X".to_string());
        track.record_result(&summary(300, 91.5));
        library.add_track(track);
        library.save(&path).unwrap();

        let loaded = TrackLibrary::load(&path).unwrap();
        assert_eq!(loaded, library);
        assert_eq!(loaded.get(0).unwrap().display_name(), "Song X");
    }

    #[test]
    fn test_load_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(TrackLibrary::load(&path), Err(RizumuError::Library(_))));
    }
}
