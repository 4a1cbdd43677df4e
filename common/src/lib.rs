pub mod buffer2;
pub mod cancel_token;
pub mod log_setup;
pub mod test_utils;

pub use buffer2::Buffer2;
pub use cancel_token::CancelToken;
