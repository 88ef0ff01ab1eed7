//! The escrow state machine, free of accounts and runtime calls.
//!
//! Each handler reads the current record and returns a [`Transition`]: the next
//! record plus the token movements that must accompany it. Nothing is written
//! until [`Transition::commit`] runs, and every check happens before that, so a
//! rejected operation leaves the record and all balances untouched.

use solana_program::{program_pack::IsInitialized, pubkey::Pubkey};

use crate::{
    error::EscrowError,
    instruction::Terms,
    pda::{AddressRole, EscrowAddresses, ProgramAddress},
    state::{Escrow, EscrowStatus, Leg},
};

/// Read-only view of an SPL token account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenHolding {
    pub address: Pubkey,
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
}

/// Who authorizes a token movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferAuthority {
    /// A party signing for its own token account.
    Owner(Pubkey),
    /// The program signing for a vault, as the escrow address.
    Escrow(ProgramAddress),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTransfer {
    pub source: Pubkey,
    pub destination: Pubkey,
    pub authority: TransferAuthority,
    pub amount: u64,
}

/// The external token-transfer capability.
pub trait TokenLedger {
    fn transfer(&mut self, transfer: &TokenTransfer) -> Result<(), EscrowError>;
}

/// The outcome of a successful handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub previous: EscrowStatus,
    pub record: Escrow,
    pub transfers: Vec<TokenTransfer>,
}

impl Transition {
    /// Executes the transfers in order, then hands the new record to `store`.
    ///
    /// Must run inside one all-or-nothing storage transaction: an error part way
    /// through leaves earlier transfers applied until that transaction is discarded.
    pub fn commit<L, S>(self, ledger: &mut L, store: S) -> Result<Escrow, EscrowError>
    where
        L: TokenLedger + ?Sized,
        S: FnOnce(&Escrow) -> Result<(), EscrowError>,
    {
        for transfer in &self.transfers {
            ledger.transfer(transfer)?;
        }
        store(&self.record)?;
        Ok(self.record)
    }
}

/// Records the terms of a new swap.
pub fn initialize(
    current: &Escrow,
    terms: &Terms,
    initializer: &Pubkey,
    addresses: &EscrowAddresses,
) -> Result<Transition, EscrowError> {
    if current.status != EscrowStatus::Uninitialized {
        return Err(EscrowError::AlreadyInitialized);
    }
    if terms.expected_x == 0 || terms.expected_y == 0 {
        return Err(EscrowError::InvalidAmount);
    }
    if terms.party_a == terms.party_b {
        return Err(EscrowError::IdenticalParties);
    }
    if terms.mint_x == terms.mint_y {
        return Err(EscrowError::IdenticalMints);
    }
    if *initializer != terms.party_a && *initializer != terms.party_b {
        return Err(EscrowError::WrongParty);
    }

    let record = Escrow {
        status: EscrowStatus::Initialized,
        expected_x_amount: terms.expected_x,
        expected_y_amount: terms.expected_y,
        party_a: terms.party_a,
        party_b: terms.party_b,
        mint_x: terms.mint_x,
        mint_y: terms.mint_y,
        vault_x: *addresses.vault_x.key(),
        vault_y: *addresses.vault_y.key(),
        escrow_nonce: addresses.escrow.nonce(),
        vault_x_nonce: addresses.vault_x.nonce(),
        vault_y_nonce: addresses.vault_y.nonce(),
    };

    Ok(Transition {
        previous: current.status,
        record,
        transfers: Vec::new(),
    })
}

/// The leg `depositor` funds, checked against the record's status.
pub fn deposit_leg(current: &Escrow, depositor: &Pubkey) -> Result<Leg, EscrowError> {
    if !current.is_initialized() {
        return Err(EscrowError::NotInitialized);
    }
    let leg = current.leg_of(depositor).ok_or(EscrowError::WrongParty)?;
    if current.status == EscrowStatus::Completed {
        return Err(EscrowError::AlreadyCompleted);
    }
    if current.status.is_deposited(leg) {
        return Err(EscrowError::AlreadyDeposited);
    }
    Ok(leg)
}

/// Moves the depositor's agreed amount into its leg's vault.
pub fn deposit(
    current: &Escrow,
    depositor: &Pubkey,
    source: &TokenHolding,
    vault: &ProgramAddress,
) -> Result<Transition, EscrowError> {
    let leg = deposit_leg(current, depositor)?;

    if source.owner != *depositor {
        return Err(EscrowError::WrongParty);
    }
    if source.mint != *current.mint(leg) {
        return Err(EscrowError::WrongMint);
    }
    let amount = current.expected_amount(leg);
    if source.amount < amount {
        return Err(EscrowError::InsufficientBalance);
    }
    if vault.key() != current.vault(leg) {
        return Err(EscrowError::AddressMismatch);
    }

    let record = Escrow {
        status: current.status.with_deposit(leg)?,
        ..*current
    };

    Ok(Transition {
        previous: current.status,
        record,
        transfers: vec![TokenTransfer {
            source: source.address,
            destination: *vault.key(),
            authority: TransferAuthority::Owner(*depositor),
            amount,
        }],
    })
}

/// Checks the record allows `caller` to trigger the swap.
pub fn withdraw_ready(current: &Escrow, caller: &Pubkey) -> Result<(), EscrowError> {
    if !current.is_initialized() {
        return Err(EscrowError::NotInitialized);
    }
    if current.leg_of(caller).is_none() {
        return Err(EscrowError::WrongParty);
    }
    match current.status {
        EscrowStatus::Completed => Err(EscrowError::AlreadyCompleted),
        EscrowStatus::Funded => Ok(()),
        _ => Err(EscrowError::NotFullyFunded),
    }
}

/// Releases both legs crosswise: vault X to party B, vault Y to party A.
pub fn withdraw(
    current: &Escrow,
    caller: &Pubkey,
    escrow: &ProgramAddress,
    vault_x: &TokenHolding,
    vault_y: &TokenHolding,
    party_a_receive: &TokenHolding,
    party_b_receive: &TokenHolding,
) -> Result<Transition, EscrowError> {
    withdraw_ready(current, caller)?;
    if escrow.role() != AddressRole::Escrow {
        return Err(EscrowError::AddressMismatch);
    }

    for (leg, vault) in [(Leg::X, vault_x), (Leg::Y, vault_y)].iter() {
        if vault.address != *current.vault(*leg) {
            return Err(EscrowError::AddressMismatch);
        }
        if vault.mint != *current.mint(*leg) || vault.owner != *escrow.key() {
            return Err(EscrowError::InvalidVault);
        }
        if vault.amount < current.expected_amount(*leg) {
            return Err(EscrowError::NotFullyFunded);
        }
    }

    // Each party receives the other's mint.
    if party_a_receive.owner != current.party_a || party_b_receive.owner != current.party_b {
        return Err(EscrowError::WrongParty);
    }
    if party_a_receive.mint != current.mint_y || party_b_receive.mint != current.mint_x {
        return Err(EscrowError::WrongMint);
    }

    let record = Escrow {
        status: EscrowStatus::Completed,
        ..*current
    };

    Ok(Transition {
        previous: current.status,
        record,
        transfers: vec![
            TokenTransfer {
                source: vault_x.address,
                destination: party_b_receive.address,
                authority: TransferAuthority::Escrow(*escrow),
                amount: vault_x.amount,
            },
            TokenTransfer {
                source: vault_y.address,
                destination: party_a_receive.address,
                authority: TransferAuthority::Escrow(*escrow),
                amount: vault_y.amount,
            },
        ],
    })
}
