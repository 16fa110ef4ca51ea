pub mod retry;
pub mod text;
pub mod threads;
pub mod urls;
