//! Asset collaborators: where sprite frames, sounds and fonts come from.

use std::cell::Cell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::{imageops, RgbaImage};

use crate::api::error::AssetError;
use crate::api::types::{FontHandle, SoundHandle};

/// Loading primitives the engine calls into. Every method fails with
/// `AssetError::NotFound` when nothing matches `name`.
pub trait AssetLoader {
    fn load_sprite_frames(&self, name: &str) -> Result<Vec<RgbaImage>, AssetError>;
    fn load_sound(&self, name: &str) -> Result<SoundHandle, AssetError>;
    fn load_font(&self, name: &str) -> Result<FontHandle, AssetError>;
}

const SOUND_EXTENSIONS: &[&str] = &["ogg", "wav", "flac", "mp3"];
const FONT_EXTENSIONS: &[&str] = &["ttf", "otf"];

/// Loads PNG frames from a directory.
///
/// For a sprite `name` it tries, in order: `name.png` (one frame),
/// `name-0.png`, `name-1.png`, ... (one frame per file), and
/// `name-stripN.png` (a horizontal strip cut into N equal frames).
pub struct DirectoryLoader {
    root: PathBuf,
    next_handle: Cell<u32>,
}

impl DirectoryLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            next_handle: Cell::new(1),
        }
    }

    fn open(path: &Path) -> Result<RgbaImage, AssetError> {
        image::open(path)
            .map(|img| img.to_rgba8())
            .map_err(|source| AssetError::Decode {
                path: path.to_path_buf(),
                source,
            })
    }

    fn find_strip(&self, name: &str) -> Option<(PathBuf, u32)> {
        let prefix = format!("{name}-strip");
        let entries = std::fs::read_dir(&self.root).ok()?;
        entries.flatten().find_map(|entry| {
            let file_name = entry.file_name();
            let count = file_name
                .to_str()?
                .strip_prefix(&prefix)?
                .strip_suffix(".png")?
                .parse::<u32>()
                .ok()?;
            Some((entry.path(), count))
        })
    }

    fn find_with_extension(&self, name: &str, extensions: &[&str]) -> Option<PathBuf> {
        extensions
            .iter()
            .map(|ext| self.root.join(format!("{name}.{ext}")))
            .find(|path| path.is_file())
    }

    fn issue_handle(&self) -> u32 {
        let handle = self.next_handle.get();
        self.next_handle.set(handle + 1);
        handle
    }
}

impl AssetLoader for DirectoryLoader {
    fn load_sprite_frames(&self, name: &str) -> Result<Vec<RgbaImage>, AssetError> {
        let single = self.root.join(format!("{name}.png"));
        if single.is_file() {
            return Ok(vec![Self::open(&single)?]);
        }

        let mut frames = Vec::new();
        loop {
            let path = self.root.join(format!("{name}-{}.png", frames.len()));
            if !path.is_file() {
                break;
            }
            frames.push(Self::open(&path)?);
        }
        if !frames.is_empty() {
            return Ok(frames);
        }

        if let Some((path, count)) = self.find_strip(name) {
            if count == 0 {
                return Err(AssetError::EmptyStrip { name: name.to_string() });
            }
            let sheet = Self::open(&path)?;
            let width = sheet.width() / count;
            return Ok((0..count)
                .map(|i| imageops::crop_imm(&sheet, i * width, 0, width, sheet.height()).to_image())
                .collect());
        }

        Err(AssetError::NotFound { name: name.to_string() })
    }

    fn load_sound(&self, name: &str) -> Result<SoundHandle, AssetError> {
        self.find_with_extension(name, SOUND_EXTENSIONS)
            .map(|_| SoundHandle(self.issue_handle()))
            .ok_or_else(|| AssetError::NotFound { name: name.to_string() })
    }

    fn load_font(&self, name: &str) -> Result<FontHandle, AssetError> {
        self.find_with_extension(name, FONT_EXTENSIONS)
            .map(|_| FontHandle(self.issue_handle()))
            .ok_or_else(|| AssetError::NotFound { name: name.to_string() })
    }
}

/// In-memory assets, for hosts that decode elsewhere and for tests.
#[derive(Default)]
pub struct MemoryLoader {
    sprites: HashMap<String, Vec<RgbaImage>>,
    sounds: HashMap<String, SoundHandle>,
    fonts: HashMap<String, FontHandle>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sprite(&mut self, name: impl Into<String>, frames: Vec<RgbaImage>) {
        self.sprites.insert(name.into(), frames);
    }

    pub fn add_sound(&mut self, name: impl Into<String>, handle: SoundHandle) {
        self.sounds.insert(name.into(), handle);
    }

    pub fn add_font(&mut self, name: impl Into<String>, handle: FontHandle) {
        self.fonts.insert(name.into(), handle);
    }
}

impl AssetLoader for MemoryLoader {
    fn load_sprite_frames(&self, name: &str) -> Result<Vec<RgbaImage>, AssetError> {
        self.sprites
            .get(name)
            .filter(|frames| !frames.is_empty())
            .cloned()
            .ok_or_else(|| AssetError::NotFound { name: name.to_string() })
    }

    fn load_sound(&self, name: &str) -> Result<SoundHandle, AssetError> {
        self.sounds
            .get(name)
            .copied()
            .ok_or_else(|| AssetError::NotFound { name: name.to_string() })
    }

    fn load_font(&self, name: &str) -> Result<FontHandle, AssetError> {
        self.fonts
            .get(name)
            .copied()
            .ok_or_else(|| AssetError::NotFound { name: name.to_string() })
    }
}
