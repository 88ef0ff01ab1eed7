use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use solana_program::{
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
    pubkey::Pubkey,
};

use crate::{
    error::EscrowError,
    pda::{AddressRole, EscrowSeeds, Secret},
};

/// Status bits stored in the first byte of the record.
pub const STATUS_INITIALIZED: u8 = 0b0001;
pub const STATUS_X_DEPOSITED: u8 = 0b0010;
pub const STATUS_Y_DEPOSITED: u8 = 0b0100;
pub const STATUS_COMPLETED: u8 = 0b1000;

/// Lifecycle of one escrow instance.
///
/// Each state is a set of status bits and moving forward only ever adds bits.
/// The two deposits touch disjoint bits, so they can land in either order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowStatus {
    Uninitialized,
    Initialized,
    XDeposited,
    YDeposited,
    /// Both legs deposited, waiting for the swap.
    Funded,
    Completed,
}

impl EscrowStatus {
    pub fn to_bits(self) -> u8 {
        match self {
            EscrowStatus::Uninitialized => 0,
            EscrowStatus::Initialized => STATUS_INITIALIZED,
            EscrowStatus::XDeposited => STATUS_INITIALIZED | STATUS_X_DEPOSITED,
            EscrowStatus::YDeposited => STATUS_INITIALIZED | STATUS_Y_DEPOSITED,
            EscrowStatus::Funded => STATUS_INITIALIZED | STATUS_X_DEPOSITED | STATUS_Y_DEPOSITED,
            EscrowStatus::Completed => {
                STATUS_INITIALIZED | STATUS_X_DEPOSITED | STATUS_Y_DEPOSITED | STATUS_COMPLETED
            }
        }
    }

    pub fn from_bits(bits: u8) -> Result<Self, EscrowError> {
        const ALL: [EscrowStatus; 6] = [
            EscrowStatus::Uninitialized,
            EscrowStatus::Initialized,
            EscrowStatus::XDeposited,
            EscrowStatus::YDeposited,
            EscrowStatus::Funded,
            EscrowStatus::Completed,
        ];
        ALL.iter()
            .copied()
            .find(|s| s.to_bits() == bits)
            .ok_or(EscrowError::InvalidRecord)
    }

    pub fn is_deposited(self, leg: Leg) -> bool {
        self.to_bits() & leg.status_bit() != 0
    }

    /// The status after `leg` has been funded.
    pub fn with_deposit(self, leg: Leg) -> Result<Self, EscrowError> {
        Self::from_bits(self.to_bits() | leg.status_bit())
    }
}

/// One side of the swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    /// Funded by party A in mint X, received by party B.
    X,
    /// Funded by party B in mint Y, received by party A.
    Y,
}

impl Leg {
    pub fn vault_role(self) -> AddressRole {
        match self {
            Leg::X => AddressRole::VaultX,
            Leg::Y => AddressRole::VaultY,
        }
    }

    pub fn status_bit(self) -> u8 {
        match self {
            Leg::X => STATUS_X_DEPOSITED,
            Leg::Y => STATUS_Y_DEPOSITED,
        }
    }
}

/// The persisted terms and status of one swap.
///
/// Layout, little endian, fixed offsets:
///
/// | offset | len | field |
/// |---|---|---|
/// | 0 | 1 | status bits |
/// | 1 | 8 | expected_x_amount |
/// | 9 | 8 | expected_y_amount |
/// | 17 | 32 | party_a |
/// | 49 | 32 | party_b |
/// | 81 | 32 | mint_x |
/// | 113 | 32 | mint_y |
/// | 145 | 32 | vault_x |
/// | 177 | 32 | vault_y |
/// | 209 | 1 | escrow nonce |
/// | 210 | 1 | vault_x nonce |
/// | 211 | 1 | vault_y nonce |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Escrow {
    pub status: EscrowStatus,
    pub expected_x_amount: u64,
    pub expected_y_amount: u64,
    pub party_a: Pubkey,
    pub party_b: Pubkey,
    pub mint_x: Pubkey,
    pub mint_y: Pubkey,
    pub vault_x: Pubkey,
    pub vault_y: Pubkey,
    pub escrow_nonce: u8,
    pub vault_x_nonce: u8,
    pub vault_y_nonce: u8,
}

impl Default for Escrow {
    fn default() -> Self {
        Escrow {
            status: EscrowStatus::Uninitialized,
            expected_x_amount: 0,
            expected_y_amount: 0,
            party_a: Pubkey::default(),
            party_b: Pubkey::default(),
            mint_x: Pubkey::default(),
            mint_y: Pubkey::default(),
            vault_x: Pubkey::default(),
            vault_y: Pubkey::default(),
            escrow_nonce: 0,
            vault_x_nonce: 0,
            vault_y_nonce: 0,
        }
    }
}

impl Escrow {
    pub fn mint(&self, leg: Leg) -> &Pubkey {
        match leg {
            Leg::X => &self.mint_x,
            Leg::Y => &self.mint_y,
        }
    }

    pub fn expected_amount(&self, leg: Leg) -> u64 {
        match leg {
            Leg::X => self.expected_x_amount,
            Leg::Y => self.expected_y_amount,
        }
    }

    pub fn vault(&self, leg: Leg) -> &Pubkey {
        match leg {
            Leg::X => &self.vault_x,
            Leg::Y => &self.vault_y,
        }
    }

    pub fn vault_nonce(&self, leg: Leg) -> u8 {
        match leg {
            Leg::X => self.vault_x_nonce,
            Leg::Y => self.vault_y_nonce,
        }
    }

    /// The leg `party` funds, if it is one of the two parties.
    pub fn leg_of(&self, party: &Pubkey) -> Option<Leg> {
        if *party == self.party_a {
            Some(Leg::X)
        } else if *party == self.party_b {
            Some(Leg::Y)
        } else {
            None
        }
    }

    /// The derivation material for this record's addresses, given the secret.
    pub fn seeds(&self, secret: Secret) -> EscrowSeeds {
        EscrowSeeds {
            party_a: self.party_a,
            party_b: self.party_b,
            mint_x: self.mint_x,
            mint_y: self.mint_y,
            secret,
        }
    }

    /// Decodes account data. An all-zero account is an uninitialized record.
    pub fn from_account_data(data: &[u8]) -> Result<Self, EscrowError> {
        if data.len() != Self::LEN {
            return Err(EscrowError::InvalidRecord);
        }
        Self::unpack_from_slice(data).map_err(|_| EscrowError::InvalidRecord)
    }
}

impl Sealed for Escrow {}

impl IsInitialized for Escrow {
    fn is_initialized(&self) -> bool {
        self.status != EscrowStatus::Uninitialized
    }
}

impl Pack for Escrow {
    const LEN: usize = 212;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, Escrow::LEN];
        let (
            status,
            expected_x_amount,
            expected_y_amount,
            party_a,
            party_b,
            mint_x,
            mint_y,
            vault_x,
            vault_y,
            escrow_nonce,
            vault_x_nonce,
            vault_y_nonce,
        ) = array_refs![src, 1, 8, 8, 32, 32, 32, 32, 32, 32, 1, 1, 1];

        Ok(Escrow {
            status: EscrowStatus::from_bits(status[0])?,
            expected_x_amount: u64::from_le_bytes(*expected_x_amount),
            expected_y_amount: u64::from_le_bytes(*expected_y_amount),
            party_a: Pubkey::new_from_array(*party_a),
            party_b: Pubkey::new_from_array(*party_b),
            mint_x: Pubkey::new_from_array(*mint_x),
            mint_y: Pubkey::new_from_array(*mint_y),
            vault_x: Pubkey::new_from_array(*vault_x),
            vault_y: Pubkey::new_from_array(*vault_y),
            escrow_nonce: escrow_nonce[0],
            vault_x_nonce: vault_x_nonce[0],
            vault_y_nonce: vault_y_nonce[0],
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, Escrow::LEN];
        let (
            status_dst,
            expected_x_amount_dst,
            expected_y_amount_dst,
            party_a_dst,
            party_b_dst,
            mint_x_dst,
            mint_y_dst,
            vault_x_dst,
            vault_y_dst,
            escrow_nonce_dst,
            vault_x_nonce_dst,
            vault_y_nonce_dst,
        ) = mut_array_refs![dst, 1, 8, 8, 32, 32, 32, 32, 32, 32, 1, 1, 1];

        status_dst[0] = self.status.to_bits();
        *expected_x_amount_dst = self.expected_x_amount.to_le_bytes();
        *expected_y_amount_dst = self.expected_y_amount.to_le_bytes();
        party_a_dst.copy_from_slice(self.party_a.as_ref());
        party_b_dst.copy_from_slice(self.party_b.as_ref());
        mint_x_dst.copy_from_slice(self.mint_x.as_ref());
        mint_y_dst.copy_from_slice(self.mint_y.as_ref());
        vault_x_dst.copy_from_slice(self.vault_x.as_ref());
        vault_y_dst.copy_from_slice(self.vault_y.as_ref());
        escrow_nonce_dst[0] = self.escrow_nonce;
        vault_x_nonce_dst[0] = self.vault_x_nonce;
        vault_y_nonce_dst[0] = self.vault_y_nonce;
    }
}
