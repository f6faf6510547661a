#![warn(clippy::pedantic)]
#![allow(
    clippy::cast_lossless,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_possible_truncation,
    clippy::struct_excessive_bools,
    clippy::too_many_lines,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::verbose_bit_mask,
    clippy::wildcard_imports,
    clippy::must_use_candidate,
    clippy::unused_self,
    clippy::inline_always,
    clippy::similar_names
)]

pub mod utils;

pub mod audio;
pub mod cpu;
pub mod ds_slot;
pub mod emu;
pub mod gpu;
pub mod ipc;
pub mod rtc;
pub mod spi;

/// Save memory handed to the core: either an existing image whose length
/// selects the backup device, or a request to create one of `len` bytes.
#[derive(Clone)]
pub enum SaveContents {
    Existing(utils::BoxedByteSlice),
    New(usize),
}

impl From<utils::BoxedByteSlice> for SaveContents {
    #[inline]
    fn from(data: utils::BoxedByteSlice) -> Self {
        Self::Existing(data)
    }
}

impl SaveContents {
    pub(crate) fn get_or_create(
        self,
        f: impl FnOnce(usize) -> utils::BoxedByteSlice,
    ) -> utils::BoxedByteSlice {
        match self {
            Self::Existing(data) => data,
            Self::New(len) => f(len),
        }
    }

    #[inline]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        match self {
            Self::Existing(data) => data.len(),
            Self::New(len) => *len,
        }
    }
}
