pub mod admin;
pub mod article;
pub mod bookmark;
pub mod comment;
pub mod keyword;
pub mod user;
