//! Media storage for user-uploaded assets
//!
//! Provides the [`MediaStore`] trait plus a Cloudinary-backed implementation
//! and an in-memory mock for tests. Uploaded assets are addressed by a
//! provider-side `public_id` and served from a CDN URL.

pub mod cloudinary;
pub mod error;
pub mod mock;
pub mod store;

pub use cloudinary::{CloudinaryConfig, CloudinaryStore};
pub use error::{MediaError, MediaResult};
pub use mock::MockMediaStore;
pub use store::{MediaStore, UploadedAsset};
