use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Account data too short: expected at least {expected} bytes, got {got}")]
    AccountDataTooShort { expected: usize, got: usize },

    #[error("Unexpected account discriminator")]
    UnexpectedDiscriminator,

    #[error("Claim index {index} out of range (max {max})")]
    ClaimIndexOutOfRange { index: u64, max: u64 },

    #[error("Bitmap length mismatch: {expected} bytes declared, {got} present")]
    BitmapLengthMismatch { expected: usize, got: usize },

    #[error("Invalid optional-pubkey tag {0}")]
    InvalidOptionTag(u8),
}

pub type Result<T> = std::result::Result<T, CoreError>;
