//! Staged photo ordering. Position 0 is the main photo.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GalleryError {
    #[error("Photo position {index} is out of range for {len} photos")]
    OutOfRange { index: usize, len: usize },
}

/// Build the display list from a record's gallery and its legacy single
/// image, keeping the first occurrence of each URL.
///
/// A legacy image that is not already in the gallery goes first, since it
/// was the listing's main photo before galleries existed.
pub fn derive_gallery(
    image_gallery: &[String],
    image_path: Option<&str>,
) -> Vec<String> {
    let legacy = image_path
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .filter(|path| !image_gallery.iter().any(|url| url.trim() == *path));

    let mut photos: Vec<String> = Vec::with_capacity(image_gallery.len() + 1);
    for url in legacy.into_iter().chain(image_gallery.iter().map(|u| u.trim()))
    {
        if !url.is_empty() && !photos.iter().any(|seen| seen == url) {
            photos.push(url.to_string());
        }
    }
    photos
}

/// The drag gesture's result: the full new ordering plus where the dragged
/// photo came from and went to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragEnd {
    pub data: Vec<String>,
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderOutcome {
    /// Set when a photo was moved into the main slot. Advisory only.
    pub new_main_photo: Option<String>,
}

impl ReorderOutcome {
    pub fn advisory(&self) -> Option<&'static str> {
        self.new_main_photo
            .as_ref()
            .map(|_| "This photo will become the main photo for your listing.")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gallery {
    photos: Vec<String>,
}

impl Gallery {
    pub fn new(photos: Vec<String>) -> Self {
        Self { photos }
    }

    pub fn photos(&self) -> &[String] {
        &self.photos
    }

    pub fn main_photo(&self) -> Option<&str> {
        self.photos.first().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    /// Replace the staged order with the gesture's result.
    pub fn apply_drag(&mut self, drag: DragEnd) -> ReorderOutcome {
        let new_main_photo = if drag.to == 0 && drag.from != 0 {
            drag.data.first().cloned()
        } else {
            None
        };
        self.photos = drag.data;
        ReorderOutcome { new_main_photo }
    }

    /// Move one photo, for callers without a gesture library's ordering.
    pub fn move_photo(
        &mut self,
        from: usize,
        to: usize,
    ) -> Result<ReorderOutcome, GalleryError> {
        let len = self.photos.len();
        for index in [from, to] {
            if index >= len {
                return Err(GalleryError::OutOfRange { index, len });
            }
        }
        let mut data = self.photos.clone();
        let photo = data.remove(from);
        data.insert(to, photo);
        Ok(self.apply_drag(DragEnd { data, from, to }))
    }
}
