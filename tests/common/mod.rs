#![allow(dead_code)]

use std::collections::HashMap;

use solana_program::pubkey::Pubkey;
use token_swap_escrow::{
    error::EscrowError,
    instruction::Terms,
    machine::{self, TokenHolding, TokenLedger, TokenTransfer, TransferAuthority},
    pda::{self, EscrowSeeds, Secret},
    state::{Escrow, Leg},
};

/// Token accounts keyed by address.
#[derive(Debug, Clone, Default)]
pub struct Tokens(pub HashMap<Pubkey, TokenHolding>);

impl TokenLedger for Tokens {
    fn transfer(&mut self, transfer: &TokenTransfer) -> Result<(), EscrowError> {
        let source = *self.0.get(&transfer.source).ok_or(EscrowError::InvalidVault)?;
        let destination = *self.0.get(&transfer.destination).ok_or(EscrowError::InvalidVault)?;

        let signer = match transfer.authority {
            TransferAuthority::Owner(owner) => owner,
            TransferAuthority::Escrow(escrow) => *escrow.key(),
        };
        if source.owner != signer {
            return Err(EscrowError::WrongParty);
        }
        if source.mint != destination.mint {
            return Err(EscrowError::WrongMint);
        }
        if source.amount < transfer.amount {
            return Err(EscrowError::InsufficientBalance);
        }

        self.0.get_mut(&transfer.source).unwrap().amount -= transfer.amount;
        self.0.get_mut(&transfer.destination).unwrap().amount += transfer.amount;
        Ok(())
    }
}

/// A ledger where each operation is one all-or-nothing transaction.
pub struct Chain {
    pub program_id: Pubkey,
    pub tokens: Tokens,
    pub records: HashMap<Pubkey, Escrow>,
}

impl Chain {
    pub fn new() -> Self {
        Chain {
            program_id: token_swap_escrow::id(),
            tokens: Tokens::default(),
            records: HashMap::new(),
        }
    }

    /// Creates a token account for `owner` holding `amount` of `mint`.
    pub fn token_account(&mut self, owner: Pubkey, mint: Pubkey, amount: u64) -> Pubkey {
        let address = Pubkey::new_unique();
        self.tokens.0.insert(
            address,
            TokenHolding {
                address,
                mint,
                owner,
                amount,
            },
        );
        address
    }

    pub fn balance(&self, account: &Pubkey) -> u64 {
        self.tokens.0.get(account).map(|h| h.amount).unwrap_or(0)
    }

    pub fn record(&self, seeds: &EscrowSeeds) -> Escrow {
        let escrow = pda::derive(&self.program_id, pda::AddressRole::Escrow, seeds).unwrap();
        self.records.get(escrow.key()).copied().unwrap_or_default()
    }

    /// Runs `f`, restoring every balance and record if it fails.
    pub fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut Chain) -> Result<T, EscrowError>,
    ) -> Result<T, EscrowError> {
        let tokens = self.tokens.clone();
        let records = self.records.clone();
        let result = f(self);
        if result.is_err() {
            self.tokens = tokens;
            self.records = records;
        }
        result
    }

    pub fn initialize(
        &mut self,
        initializer: Pubkey,
        terms: Terms,
        secret: Secret,
    ) -> Result<Escrow, EscrowError> {
        self.transaction(|chain| {
            let addresses = pda::derive_all(&chain.program_id, &terms.seeds(secret))?;
            let key = *addresses.escrow.key();
            let current = chain.records.get(&key).copied().unwrap_or_default();
            let transition = machine::initialize(&current, &terms, &initializer, &addresses)?;
            let records = &mut chain.records;
            transition.commit(&mut chain.tokens, |record| {
                records.insert(key, *record);
                Ok(())
            })
        })
    }

    pub fn deposit(
        &mut self,
        depositor: Pubkey,
        source: Pubkey,
        seeds: &EscrowSeeds,
    ) -> Result<Escrow, EscrowError> {
        let seeds = *seeds;
        self.transaction(|chain| {
            let addresses = pda::derive_all(&chain.program_id, &seeds)?;
            let key = *addresses.escrow.key();
            let current = chain.records.get(&key).copied().unwrap_or_default();
            let leg = machine::deposit_leg(&current, &depositor)?;
            let vault = match leg {
                Leg::X => addresses.vault_x,
                Leg::Y => addresses.vault_y,
            };
            let holding = *chain.tokens.0.get(&source).ok_or(EscrowError::InvalidVault)?;
            let transition = machine::deposit(&current, &depositor, &holding, &vault)?;

            // Vaults come into existence on first deposit.
            chain.tokens.0.entry(*vault.key()).or_insert(TokenHolding {
                address: *vault.key(),
                mint: *current.mint(leg),
                owner: key,
                amount: 0,
            });

            let records = &mut chain.records;
            transition.commit(&mut chain.tokens, |record| {
                records.insert(key, *record);
                Ok(())
            })
        })
    }

    pub fn withdraw(
        &mut self,
        caller: Pubkey,
        seeds: &EscrowSeeds,
        party_a_receive: Pubkey,
        party_b_receive: Pubkey,
    ) -> Result<Escrow, EscrowError> {
        let seeds = *seeds;
        self.transaction(|chain| {
            let addresses = pda::derive_all(&chain.program_id, &seeds)?;
            let key = *addresses.escrow.key();
            let current = chain.records.get(&key).copied().unwrap_or_default();
            machine::withdraw_ready(&current, &caller)?;

            let holding = |address: &Pubkey| {
                chain
                    .tokens
                    .0
                    .get(address)
                    .copied()
                    .ok_or(EscrowError::InvalidVault)
            };
            let transition = machine::withdraw(
                &current,
                &caller,
                &addresses.escrow,
                &holding(addresses.vault_x.key())?,
                &holding(addresses.vault_y.key())?,
                &holding(&party_a_receive)?,
                &holding(&party_b_receive)?,
            )?;

            let records = &mut chain.records;
            transition.commit(&mut chain.tokens, |record| {
                records.insert(key, *record);
                Ok(())
            })
        })
    }
}

/// Two parties, two mints and funded token accounts for each.
pub struct Swap {
    pub chain: Chain,
    pub terms: Terms,
    pub seeds: EscrowSeeds,
    pub a_x: Pubkey,
    pub a_y: Pubkey,
    pub b_x: Pubkey,
    pub b_y: Pubkey,
}

impl Swap {
    pub fn new(expected_x: u64, expected_y: u64, passphrase: &[u8]) -> Self {
        let mut chain = Chain::new();
        let terms = Terms {
            party_a: Pubkey::new_unique(),
            party_b: Pubkey::new_unique(),
            mint_x: Pubkey::new_unique(),
            mint_y: Pubkey::new_unique(),
            expected_x,
            expected_y,
        };
        let a_x = chain.token_account(terms.party_a, terms.mint_x, 100);
        let a_y = chain.token_account(terms.party_a, terms.mint_y, 0);
        let b_x = chain.token_account(terms.party_b, terms.mint_x, 0);
        let b_y = chain.token_account(terms.party_b, terms.mint_y, 100);
        let seeds = terms.seeds(Secret::from_passphrase(passphrase));
        Swap {
            chain,
            terms,
            seeds,
            a_x,
            a_y,
            b_x,
            b_y,
        }
    }

    pub fn vaults(&self) -> (Pubkey, Pubkey) {
        let addresses = pda::derive_all(&self.chain.program_id, &self.seeds).unwrap();
        (*addresses.vault_x.key(), *addresses.vault_y.key())
    }
}
