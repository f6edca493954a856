//! Artifact serialization using `MessagePack`.
//!
//! Libraries (`.sprigl`) and images (`.sprigc`) are written inside a small
//! envelope so a reader can reject foreign or stale files before decoding
//! the payload.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sprig_foundation::{Error, ErrorKind, Result};
use sprig_language::{Image, Library, render, render_library, resolve};

/// Tag every artifact starts with.
pub const MAGIC: &str = "sprig";

/// Current envelope version. Readers reject any other.
pub const FORMAT_VERSION: u32 = 1;

/// What an artifact holds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    /// A relocatable unit, ready for linking.
    Library(Library),
    /// A resolved program, ready to run.
    Image(Image),
}

/// A serialized compilation result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Always [`MAGIC`].
    pub magic: String,
    /// Envelope version.
    pub version: u32,
    /// The compiled unit.
    pub payload: Payload,
}

impl Artifact {
    /// Wraps a library.
    #[must_use]
    pub fn library(library: Library) -> Self {
        Self::new(Payload::Library(library))
    }

    /// Wraps an image.
    #[must_use]
    pub fn image(image: Image) -> Self {
        Self::new(Payload::Image(image))
    }

    fn new(payload: Payload) -> Self {
        Self {
            magic: MAGIC.to_string(),
            version: FORMAT_VERSION,
            payload,
        }
    }

    /// Returns `"library"` or `"image"`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self.payload {
            Payload::Library(_) => "library",
            Payload::Image(_) => "image",
        }
    }

    /// Returns a runnable image, resolving a library on the way.
    ///
    /// # Errors
    /// Returns resolution failures.
    pub fn into_image(self) -> Result<Image> {
        match self.payload {
            Payload::Image(image) => Ok(image),
            Payload::Library(library) => resolve(&library),
        }
    }

    /// Renders the artifact as a disassembly listing.
    ///
    /// # Errors
    /// Returns the first decoding failure.
    pub fn render(&self) -> Result<String> {
        match &self.payload {
            Payload::Library(library) => render_library(library),
            Payload::Image(image) => {
                let mut out = String::from("; globals:\n");
                for (id, name) in image.globals.iter().enumerate() {
                    out.push_str(&format!(";   {id:>4}  {name}\n"));
                }
                out.push_str("code:\n");
                out.push_str(&render(&image.code)?);
                Ok(out)
            }
        }
    }

    /// Serializes the artifact using named fields.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        rmp_serde::to_vec_named(self).map_err(|e| Error::new(ErrorKind::SerializationError(e.to_string())))
    }

    /// Deserializes an artifact, checking its envelope.
    ///
    /// # Errors
    /// Returns an error if decoding fails, or if the magic tag or version
    /// does not match.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let artifact: Self =
            rmp_serde::from_slice(bytes).map_err(|e| Error::new(ErrorKind::SerializationError(e.to_string())))?;
        if artifact.magic != MAGIC {
            return Err(Error::new(ErrorKind::SerializationError(format!(
                "not a sprig artifact (tag {:?})",
                artifact.magic
            ))));
        }
        if artifact.version != FORMAT_VERSION {
            return Err(Error::new(ErrorKind::SerializationError(format!(
                "unsupported artifact version {} (expected {FORMAT_VERSION})",
                artifact.version
            ))));
        }
        Ok(artifact)
    }
}

/// Saves an artifact to a file.
///
/// Creates the file if it doesn't exist, or overwrites it if it does.
///
/// # Errors
/// Returns an error if the file cannot be created or written to, or if
/// serialization fails.
pub fn save_to_file<P: AsRef<Path>>(artifact: &Artifact, path: P) -> Result<()> {
    let path = path.as_ref();
    let bytes = artifact.to_bytes()?;

    let file = File::create(path).map_err(|e| io_error("create", path, &e))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&bytes).map_err(|e| io_error("write to", path, &e))?;
    writer.flush().map_err(|e| io_error("flush", path, &e))?;
    Ok(())
}

/// Loads an artifact from a file.
///
/// # Errors
/// Returns an error if the file cannot be read or is not a valid artifact.
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Artifact> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| io_error("open", path, &e))?;

    let mut reader = BufReader::new(file);
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).map_err(|e| io_error("read", path, &e))?;

    Artifact::from_bytes(&bytes)
}

fn io_error(action: &str, path: &Path, e: &std::io::Error) -> Error {
    Error::new(ErrorKind::IoError(format!("failed to {action} file '{}': {e}", path.display())))
}
