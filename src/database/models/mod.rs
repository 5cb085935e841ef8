pub mod media;
pub mod user;

pub use media::{sort_by_name, Directory, DirectoryListing, MediaFile, Named};
pub use user::{Picture, Profile, User, UserView};
