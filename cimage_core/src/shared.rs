use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

use crate::channel::Channel;
use crate::dtype::{Element, ElementType};
use crate::error::Result;

/// A reference-counted handle to channel storage.
///
/// Cloning the handle shares the storage, it does not copy it. An [`Image`]
/// holds one handle per channel and hands out clones, so a channel obtained
/// from an image stays valid after the image is dropped, and edits through
/// any handle are visible through all of them.
///
/// Handles only edit chunk contents, never the channel's geometry, so a
/// channel shared with an image always keeps the image's width, height and
/// chunking.
///
/// [`Image`]: crate::Image
#[derive(Clone)]
pub struct SharedChannel(Arc<RwLock<Channel>>);

impl SharedChannel {
    pub fn new(channel: Channel) -> Self {
        Self(Arc::new(RwLock::new(channel)))
    }

    /// Shared read access to the channel.
    pub fn read(&self) -> RwLockReadGuard<'_, Channel> {
        self.0.read().unwrap_or_else(|poisoned| {
            warn!("channel lock poisoned by a panicked writer, recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    /// Exclusive write access to the channel.
    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Channel> {
        self.0.write().unwrap_or_else(|poisoned| {
            warn!("channel lock poisoned by a panicked writer, recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    /// Whether both handles refer to the same storage.
    pub fn ptr_eq(&self, other: &SharedChannel) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Number of live handles to this storage, the image's own included.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// An independent deep copy of the channel.
    pub fn to_owned_channel(&self) -> Channel {
        self.read().clone()
    }

    /// Take the channel out if this is the last handle, else give the handle back.
    pub fn into_inner(self) -> std::result::Result<Channel, SharedChannel> {
        match Arc::try_unwrap(self.0) {
            Ok(lock) => Ok(lock.into_inner().unwrap_or_else(PoisonError::into_inner)),
            Err(shared) => Err(SharedChannel(shared)),
        }
    }

    pub fn dtype(&self) -> ElementType {
        self.read().dtype()
    }

    pub fn width(&self) -> usize {
        self.read().width()
    }

    pub fn height(&self) -> usize {
        self.read().height()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.read().shape()
    }

    pub fn num_chunks(&self) -> usize {
        self.read().num_chunks()
    }

    pub fn get_chunk<T: Element>(&self, index: usize) -> Result<Vec<T>> {
        self.read().get_chunk(index)
    }

    pub fn get_chunk_bytes(&self, index: usize) -> Result<Vec<u8>> {
        self.read().get_chunk_bytes(index)
    }

    pub fn set_chunk<T: Element>(&self, index: usize, data: &[T]) -> Result<()> {
        self.write().set_chunk(index, data)
    }

    pub fn set_chunk_shaped<T: Element>(&self, index: usize, data: &[T], shape: &[usize]) -> Result<()> {
        self.write().set_chunk_shaped(index, data, shape)
    }

    pub fn set_chunk_bytes(&self, index: usize, bytes: &[u8]) -> Result<()> {
        self.write().set_chunk_bytes(index, bytes)
    }

    /// Edit chunk `index` in place; the write lock is held for the whole edit.
    pub fn update_chunk<T, F>(&self, index: usize, f: F) -> Result<()>
    where
        T: Element,
        F: FnOnce(&mut [T]) -> Result<()>,
    {
        self.write().update_chunk(index, f)
    }

    pub fn get_decompressed<T: Element>(&self) -> Result<Vec<T>> {
        self.read().get_decompressed()
    }
}

impl From<Channel> for SharedChannel {
    fn from(channel: Channel) -> Self {
        SharedChannel::new(channel)
    }
}

impl fmt::Debug for SharedChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channel = self.read();
        f.debug_struct("SharedChannel")
            .field("dtype", &channel.dtype())
            .field("shape", &channel.shape())
            .field("chunks", &channel.num_chunks())
            .field("handles", &self.handle_count())
            .finish()
    }
}
