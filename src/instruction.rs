use std::convert::TryInto;
use std::mem::size_of;

use solana_program::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program, sysvar,
};

use crate::{
    error::EscrowError::{self, MalformedPayload, UnknownOperation},
    pda::{self, EscrowSeeds, Secret, SECRET_LEN},
    state::Leg,
};

/// Instructions understood by the escrow program.
///
/// Every payload is a one byte tag followed by fixed width, little endian fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowInstruction {
    /// Records the terms of a swap at the derived escrow address.
    ///
    /// Accounts expected:
    ///
    /// 0. `[writable, signer]` The initializer, one of the two parties. Pays for the record.
    /// 1. `[writable]` The escrow record, at the derived escrow address.
    /// 2. `[]` Party A, who funds leg X.
    /// 3. `[]` Party B, who funds leg Y.
    /// 4. `[]` Mint X.
    /// 5. `[]` Mint Y.
    /// 6. `[]` The rent sysvar.
    /// 7. `[]` The system program.
    Initialize {
        expected_x: u64,
        expected_y: u64,
        secret: Secret,
    },
    /// Moves the caller's leg into its vault, creating the vault on first use.
    ///
    /// Accounts expected:
    ///
    /// 0. `[writable, signer]` The depositing party. Pays for the vault.
    /// 1. `[writable]` The escrow record.
    /// 2. `[writable]` The depositor's token account holding the leg's mint.
    /// 3. `[writable]` The leg's vault, at the derived vault address.
    /// 4. `[]` The leg's mint.
    /// 5. `[]` The token program.
    /// 6. `[]` The rent sysvar.
    /// 7. `[]` The system program.
    Deposit { secret: Secret },
    /// Swaps both funded legs: vault X goes to party B, vault Y goes to party A.
    ///
    /// Accounts expected:
    ///
    /// 0. `[signer]` Either party.
    /// 1. `[writable]` The escrow record.
    /// 2. `[writable]` Vault X.
    /// 3. `[writable]` Vault Y.
    /// 4. `[writable]` Party A's token account for mint Y.
    /// 5. `[writable]` Party B's token account for mint X.
    /// 6. `[]` The token program.
    Withdraw { secret: Secret },
}

impl EscrowInstruction {
    pub const INITIALIZE_LEN: usize = 1 + 8 + 8 + SECRET_LEN;
    pub const SECRET_ONLY_LEN: usize = 1 + SECRET_LEN;

    /// Unpacks a byte buffer into an [EscrowInstruction].
    pub fn unpack(input: &[u8]) -> Result<Self, EscrowError> {
        let (&tag, rest) = input.split_first().ok_or(UnknownOperation)?;

        Ok(match tag {
            0 => {
                if input.len() != Self::INITIALIZE_LEN {
                    return Err(MalformedPayload);
                }
                let (expected_x, rest) = Self::unpack_u64(rest)?;
                let (expected_y, rest) = Self::unpack_u64(rest)?;
                Self::Initialize {
                    expected_x,
                    expected_y,
                    secret: Self::unpack_secret(rest)?,
                }
            }
            1 | 2 => {
                if input.len() != Self::SECRET_ONLY_LEN {
                    return Err(MalformedPayload);
                }
                let secret = Self::unpack_secret(rest)?;
                if tag == 1 {
                    Self::Deposit { secret }
                } else {
                    Self::Withdraw { secret }
                }
            }
            _ => return Err(UnknownOperation),
        })
    }

    /// Packs an [EscrowInstruction] into a byte buffer.
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::INITIALIZE_LEN);
        match self {
            Self::Initialize {
                expected_x,
                expected_y,
                secret,
            } => {
                buf.push(0);
                buf.extend_from_slice(&expected_x.to_le_bytes());
                buf.extend_from_slice(&expected_y.to_le_bytes());
                buf.extend_from_slice(secret.as_bytes());
            }
            Self::Deposit { secret } => {
                buf.push(1);
                buf.extend_from_slice(secret.as_bytes());
            }
            Self::Withdraw { secret } => {
                buf.push(2);
                buf.extend_from_slice(secret.as_bytes());
            }
        }
        buf
    }

    fn unpack_u64(input: &[u8]) -> Result<(u64, &[u8]), EscrowError> {
        if input.len() < size_of::<u64>() {
            return Err(MalformedPayload);
        }
        let (amount, rest) = input.split_at(size_of::<u64>());
        let amount = amount
            .try_into()
            .map(u64::from_le_bytes)
            .map_err(|_| MalformedPayload)?;
        Ok((amount, rest))
    }

    fn unpack_secret(input: &[u8]) -> Result<Secret, EscrowError> {
        let bytes: [u8; SECRET_LEN] = input.try_into().map_err(|_| MalformedPayload)?;
        Ok(Secret::from_bytes(bytes))
    }
}

/// The agreed terms of a swap, as supplied to `Initialize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Terms {
    pub party_a: Pubkey,
    pub party_b: Pubkey,
    pub mint_x: Pubkey,
    pub mint_y: Pubkey,
    pub expected_x: u64,
    pub expected_y: u64,
}

impl Terms {
    pub fn seeds(&self, secret: Secret) -> EscrowSeeds {
        EscrowSeeds {
            party_a: self.party_a,
            party_b: self.party_b,
            mint_x: self.mint_x,
            mint_y: self.mint_y,
            secret,
        }
    }
}

/// Creates an `Initialize` instruction.
pub fn initialize(
    program_id: &Pubkey,
    initializer: &Pubkey,
    terms: &Terms,
    secret: Secret,
) -> Result<Instruction, EscrowError> {
    let escrow = pda::derive(program_id, pda::AddressRole::Escrow, &terms.seeds(secret))?;
    let data = EscrowInstruction::Initialize {
        expected_x: terms.expected_x,
        expected_y: terms.expected_y,
        secret,
    }
    .pack();

    let accounts = vec![
        AccountMeta::new(*initializer, true),
        AccountMeta::new(*escrow.key(), false),
        AccountMeta::new_readonly(terms.party_a, false),
        AccountMeta::new_readonly(terms.party_b, false),
        AccountMeta::new_readonly(terms.mint_x, false),
        AccountMeta::new_readonly(terms.mint_y, false),
        AccountMeta::new_readonly(sysvar::rent::id(), false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Creates a `Deposit` instruction for `leg`, funded from `source`.
pub fn deposit(
    program_id: &Pubkey,
    depositor: &Pubkey,
    leg: Leg,
    source: &Pubkey,
    seeds: &EscrowSeeds,
) -> Result<Instruction, EscrowError> {
    let escrow = pda::derive(program_id, pda::AddressRole::Escrow, seeds)?;
    let mint = match leg {
        Leg::X => seeds.mint_x,
        Leg::Y => seeds.mint_y,
    };
    let vault = pda::derive(program_id, leg.vault_role(), seeds)?;
    let data = EscrowInstruction::Deposit {
        secret: seeds.secret,
    }
    .pack();

    let accounts = vec![
        AccountMeta::new(*depositor, true),
        AccountMeta::new(*escrow.key(), false),
        AccountMeta::new(*source, false),
        AccountMeta::new(*vault.key(), false),
        AccountMeta::new_readonly(mint, false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(sysvar::rent::id(), false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Creates a `Withdraw` instruction.
///
/// `party_a_receive` must hold mint Y and `party_b_receive` mint X.
pub fn withdraw(
    program_id: &Pubkey,
    caller: &Pubkey,
    seeds: &EscrowSeeds,
    party_a_receive: &Pubkey,
    party_b_receive: &Pubkey,
) -> Result<Instruction, EscrowError> {
    let addresses = pda::derive_all(program_id, seeds)?;
    let data = EscrowInstruction::Withdraw {
        secret: seeds.secret,
    }
    .pack();

    let accounts = vec![
        AccountMeta::new_readonly(*caller, true),
        AccountMeta::new(*addresses.escrow.key(), false),
        AccountMeta::new(*addresses.vault_x.key(), false),
        AccountMeta::new(*addresses.vault_y.key(), false),
        AccountMeta::new(*party_a_receive, false),
        AccountMeta::new(*party_b_receive, false),
        AccountMeta::new_readonly(spl_token::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}
