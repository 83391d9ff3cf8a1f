pub mod admin;
pub mod articles;
pub mod auth;
pub mod bookmarks;
pub mod comments;
