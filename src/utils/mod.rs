pub mod extract;
pub mod middleware;
pub mod slug;
pub mod text;
