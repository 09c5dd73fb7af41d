//! Textures with deferred upload
//!
//! Image decoding happens outside the frame loop. A loader holds a
//! [`TextureLoader`] and calls [`TextureLoader::complete`] whenever the pixels
//! are ready, from any thread. The texture only notices on its next
//! [`Texture::prepare`], which runs at a fixed point in the frame, so GPU uploads
//! never interleave with a render pass.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use image::RgbaImage;

use super::device::{GraphicsDevice, Sampler, TextureHandle, TextureKind};
use super::{RenderError, RenderResult};

/// Index of a texture within its owning asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub usize);

/// Decoded pixels: one image for 2D textures, six for cube maps
pub type TextureData = Vec<RgbaImage>;

type LoadResult = Result<TextureData, String>;

/// Where a texture is in its lifecycle
#[derive(Debug)]
pub enum TextureState {
    /// Waiting for the loader
    Pending,
    /// Pixels arrived, upload happens on the next prepare
    Decoded(TextureData),
    /// Resident on the device
    Uploaded(TextureHandle),
    /// Loading or uploading failed; the texture stays unbound
    Failed(String),
}

/// Completion side of a pending texture.
///
/// Dropping it without completing leaves the texture pending forever.
#[derive(Debug)]
pub struct TextureLoader {
    uri: String,
    sender: Sender<LoadResult>,
}

impl TextureLoader {
    /// URI the texture was declared with
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Deliver decoded pixels
    pub fn complete(self, data: TextureData) {
        // The receiver disappears when its asset was destroyed first; nothing to do then.
        if self.sender.send(Ok(data)).is_err() {
            log::debug!("Texture {} completed after its owner was dropped", self.uri);
        }
    }

    /// Report a load failure
    pub fn fail(self, reason: impl Into<String>) {
        if self.sender.send(Err(reason.into())).is_err() {
            log::debug!("Texture {} failed after its owner was dropped", self.uri);
        }
    }
}

/// A sampled image owned by an asset or skybox
#[derive(Debug)]
pub struct Texture {
    uri: String,
    kind: TextureKind,
    sampler: Sampler,
    state: TextureState,
    receiver: Option<Receiver<LoadResult>>,
}

impl Texture {
    /// Declare a texture whose pixels will arrive later
    pub fn pending(uri: impl Into<String>, kind: TextureKind, sampler: Sampler) -> (Self, TextureLoader) {
        let uri = uri.into();
        let (sender, receiver) = mpsc::channel();
        let texture = Self {
            uri: uri.clone(),
            kind,
            sampler,
            state: TextureState::Pending,
            receiver: Some(receiver),
        };
        (texture, TextureLoader { uri, sender })
    }

    /// Texture whose pixels are already decoded
    pub fn from_data(uri: impl Into<String>, kind: TextureKind, sampler: Sampler, data: TextureData) -> Self {
        Self {
            uri: uri.into(),
            kind,
            sampler,
            state: TextureState::Decoded(data),
            receiver: None,
        }
    }

    /// Pull a finished load out of the channel, if any.
    ///
    /// Returns true when the state changed.
    pub fn poll(&mut self) -> bool {
        let Some(receiver) = &self.receiver else {
            return false;
        };
        let result = match receiver.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Disconnected) => {
                log::warn!("Loader for texture {} dropped without completing", self.uri);
                self.receiver = None;
                return false;
            }
        };
        self.receiver = None;
        self.state = match result {
            Ok(data) => TextureState::Decoded(data),
            Err(reason) => {
                log::error!("Texture {} failed to load: {}", self.uri, reason);
                TextureState::Failed(reason)
            }
        };
        true
    }

    /// Upload decoded pixels.
    ///
    /// Power-of-two images get a mip chain. Other sizes cannot be mipmapped on
    /// every device, so their minification filter drops mip sampling. Returns
    /// true if this call made the texture resident.
    pub fn prepare(&mut self, device: &mut dyn GraphicsDevice) -> RenderResult<bool> {
        self.poll();
        if !matches!(self.state, TextureState::Decoded(_)) {
            return Ok(false);
        }
        let TextureState::Decoded(data) = std::mem::replace(&mut self.state, TextureState::Pending) else {
            return Ok(false);
        };

        match self.upload(device, &data) {
            Ok(handle) => {
                log::debug!("Uploaded texture {} as {:?}", self.uri, handle);
                self.state = TextureState::Uploaded(handle);
                Ok(true)
            }
            Err(err) => {
                log::error!("Texture {} upload failed: {}", self.uri, err);
                self.state = TextureState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    fn upload(&self, device: &mut dyn GraphicsDevice, data: &TextureData) -> RenderResult<TextureHandle> {
        if data.len() != self.kind.face_count() {
            return Err(RenderError::InvalidResource(format!(
                "texture {} expects {} images, got {}",
                self.uri,
                self.kind.face_count(),
                data.len()
            )));
        }

        let handle = device.create_texture(self.kind)?;
        for (face, image) in data.iter().enumerate() {
            if let Err(err) = device.upload_texture_image(handle, face, image) {
                device.delete_texture(handle);
                return Err(err);
            }
        }

        if data.iter().all(is_power_of_two) {
            device.set_sampler(handle, &self.sampler);
            device.generate_mipmaps(handle);
        } else {
            let sampler = Sampler {
                min_filter: self.sampler.min_filter.without_mipmaps(),
                ..self.sampler
            };
            device.set_sampler(handle, &sampler);
        }
        Ok(handle)
    }

    /// Bind at `unit` if resident; returns whether anything was bound
    pub fn bind(&self, device: &mut dyn GraphicsDevice, unit: u32) -> bool {
        match self.state {
            TextureState::Uploaded(handle) => {
                device.bind_texture(unit, handle);
                true
            }
            _ => false,
        }
    }

    /// Whether the texture is resident
    pub fn is_ready(&self) -> bool {
        matches!(self.state, TextureState::Uploaded(_))
    }

    /// Current state
    pub fn state(&self) -> &TextureState {
        &self.state
    }

    /// Declared URI
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Texture kind
    pub fn kind(&self) -> TextureKind {
        self.kind
    }

    /// Sampler parameters
    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }
}

fn is_power_of_two(image: &RgbaImage) -> bool {
    image.width().is_power_of_two() && image.height().is_power_of_two()
}
