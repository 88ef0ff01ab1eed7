use solana_program::program_error::ProgramError;
use thiserror::Error;

/// Everything the escrow program can reject an operation with.
///
/// All variants except [`EscrowError::Program`] map to a stable
/// `ProgramError::Custom` code, see [`EscrowError::code`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EscrowError {
    // Configuration
    #[error("Expected amounts must both be greater than zero")]
    InvalidAmount,
    #[error("The two parties of a swap must be distinct")]
    IdenticalParties,
    #[error("The two mints of a swap must be distinct")]
    IdenticalMints,
    #[error("Account is not rent exempt")]
    NotRentExempt,
    #[error("No off-curve address exists for these seeds")]
    NonceSpaceExhausted,

    // Protocol state
    #[error("Escrow is already initialized")]
    AlreadyInitialized,
    #[error("Escrow is not initialized")]
    NotInitialized,
    #[error("This leg has already been deposited")]
    AlreadyDeposited,
    #[error("Both legs must be funded before the swap")]
    NotFullyFunded,
    #[error("Escrow has already been completed")]
    AlreadyCompleted,

    // Authorization
    #[error("Caller or account owner is not the expected party")]
    WrongParty,
    #[error("Token account holds the wrong mint")]
    WrongMint,
    #[error("Missing required signature")]
    MissingSignature,
    #[error("Account address does not match the derived address")]
    AddressMismatch,
    #[error("Vault is not a token account controlled by this escrow")]
    InvalidVault,

    // Decode
    #[error("Instruction payload is malformed")]
    MalformedPayload,
    #[error("Unknown operation tag")]
    UnknownOperation,
    #[error("Escrow account data is not a valid record")]
    InvalidRecord,

    // Transfer
    #[error("Source token account balance is below the agreed amount")]
    InsufficientBalance,

    #[error(transparent)]
    Program(#[from] ProgramError),
}

/// Coarse grouping of [`EscrowError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input detected before any state is read.
    Configuration,
    /// The record is not in a state that allows the operation. Re-read and retry.
    ProtocolState,
    /// The caller or an account is not who or what the record says.
    Authorization,
    /// Bytes that do not parse.
    Decode,
    /// The token movement itself cannot be carried out.
    Transfer,
    /// Surfaced by the runtime or a cross-program invocation.
    Runtime,
}

impl EscrowError {
    const ALL: [EscrowError; 19] = [
        EscrowError::InvalidAmount,
        EscrowError::IdenticalParties,
        EscrowError::IdenticalMints,
        EscrowError::NotRentExempt,
        EscrowError::NonceSpaceExhausted,
        EscrowError::AlreadyInitialized,
        EscrowError::NotInitialized,
        EscrowError::AlreadyDeposited,
        EscrowError::NotFullyFunded,
        EscrowError::AlreadyCompleted,
        EscrowError::WrongParty,
        EscrowError::WrongMint,
        EscrowError::MissingSignature,
        EscrowError::AddressMismatch,
        EscrowError::InvalidVault,
        EscrowError::MalformedPayload,
        EscrowError::UnknownOperation,
        EscrowError::InvalidRecord,
        EscrowError::InsufficientBalance,
    ];

    /// The `ProgramError::Custom` code for this error, `None` for runtime errors.
    pub fn code(&self) -> Option<u32> {
        let code = match self {
            EscrowError::InvalidAmount => 0,
            EscrowError::IdenticalParties => 1,
            EscrowError::IdenticalMints => 2,
            EscrowError::NotRentExempt => 3,
            EscrowError::NonceSpaceExhausted => 4,
            EscrowError::AlreadyInitialized => 5,
            EscrowError::NotInitialized => 6,
            EscrowError::AlreadyDeposited => 7,
            EscrowError::NotFullyFunded => 8,
            EscrowError::AlreadyCompleted => 9,
            EscrowError::WrongParty => 10,
            EscrowError::WrongMint => 11,
            EscrowError::MissingSignature => 12,
            EscrowError::AddressMismatch => 13,
            EscrowError::InvalidVault => 14,
            EscrowError::MalformedPayload => 15,
            EscrowError::UnknownOperation => 16,
            EscrowError::InvalidRecord => 17,
            EscrowError::InsufficientBalance => 18,
            EscrowError::Program(_) => return None,
        };
        Some(code)
    }

    /// Recovers the error from a `ProgramError::Custom` code read off a failed transaction.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.iter().find(|e| e.code() == Some(code)).cloned()
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EscrowError::InvalidAmount
            | EscrowError::IdenticalParties
            | EscrowError::IdenticalMints
            | EscrowError::NotRentExempt
            | EscrowError::NonceSpaceExhausted => ErrorKind::Configuration,
            EscrowError::AlreadyInitialized
            | EscrowError::NotInitialized
            | EscrowError::AlreadyDeposited
            | EscrowError::NotFullyFunded
            | EscrowError::AlreadyCompleted => ErrorKind::ProtocolState,
            EscrowError::WrongParty
            | EscrowError::WrongMint
            | EscrowError::MissingSignature
            | EscrowError::AddressMismatch
            | EscrowError::InvalidVault => ErrorKind::Authorization,
            EscrowError::MalformedPayload
            | EscrowError::UnknownOperation
            | EscrowError::InvalidRecord => ErrorKind::Decode,
            EscrowError::InsufficientBalance => ErrorKind::Transfer,
            EscrowError::Program(_) => ErrorKind::Runtime,
        }
    }
}

impl From<EscrowError> for ProgramError {
    fn from(e: EscrowError) -> Self {
        match e {
            EscrowError::Program(inner) => inner,
            other => ProgramError::Custom(other.code().unwrap_or(u32::MAX)),
        }
    }
}
