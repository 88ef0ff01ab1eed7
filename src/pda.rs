//! Derivation of the keyless addresses that make up one escrow instance.
//!
//! Seeds are `[tag, party_a, party_b, mint_x, mint_y, secret]`. The runtime's
//! program-address scheme appends the nonce and the program id, hashes, and
//! rejects results that land on the ed25519 curve, so no private key exists for
//! any address produced here.

use std::fmt;

use solana_program::pubkey::Pubkey;

use crate::error::EscrowError;

/// Width of the shared secret on the wire and in the seeds.
pub const SECRET_LEN: usize = 32;

pub const VAULT_X_SEED: &[u8] = b"vault_x";
pub const VAULT_Y_SEED: &[u8] = b"vault_y";
pub const ESCROW_SEED: &[u8] = b"escrow";

/// Out-of-band agreement key shared by both parties.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Secret([u8; SECRET_LEN]);

impl Secret {
    pub fn from_bytes(bytes: [u8; SECRET_LEN]) -> Self {
        Secret(bytes)
    }

    /// Canonical form of a passphrase: zero padded, or truncated, to 32 bytes.
    pub fn from_passphrase(passphrase: &[u8]) -> Self {
        let mut bytes = [0u8; SECRET_LEN];
        let len = passphrase.len().min(SECRET_LEN);
        bytes[..len].copy_from_slice(&passphrase[..len]);
        Secret(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SECRET_LEN] {
        &self.0
    }
}

// Keep the secret out of program logs.
impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

/// Which of the three per-escrow addresses is being derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressRole {
    VaultX,
    VaultY,
    Escrow,
}

impl AddressRole {
    pub fn seed(self) -> &'static [u8] {
        match self {
            AddressRole::VaultX => VAULT_X_SEED,
            AddressRole::VaultY => VAULT_Y_SEED,
            AddressRole::Escrow => ESCROW_SEED,
        }
    }
}

/// The material every address of one escrow instance is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscrowSeeds {
    pub party_a: Pubkey,
    pub party_b: Pubkey,
    pub mint_x: Pubkey,
    pub mint_y: Pubkey,
    pub secret: Secret,
}

impl EscrowSeeds {
    fn with_role(&self, role: AddressRole) -> [&[u8]; 6] {
        [
            role.seed(),
            self.party_a.as_ref(),
            self.party_b.as_ref(),
            self.mint_x.as_ref(),
            self.mint_y.as_ref(),
            self.secret.as_bytes(),
        ]
    }
}

/// An address owned by the program, with no private key behind it.
///
/// Only [`derive`] and [`verify`] produce one, so a signer's key can never be
/// passed where a vault or escrow address is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramAddress {
    key: Pubkey,
    nonce: u8,
    role: AddressRole,
}

impl ProgramAddress {
    pub fn key(&self) -> &Pubkey {
        &self.key
    }

    pub fn nonce(&self) -> u8 {
        self.nonce
    }

    pub fn role(&self) -> AddressRole {
        self.role
    }

    /// Runs `f` with the seeds that let the program sign as this address.
    pub fn with_signer_seeds<R>(&self, seeds: &EscrowSeeds, f: impl FnOnce(&[&[u8]]) -> R) -> R {
        let nonce = [self.nonce];
        let [tag, a, b, x, y, secret] = seeds.with_role(self.role);
        f(&[tag, a, b, x, y, secret, &nonce[..]])
    }
}

/// The three addresses of one escrow instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscrowAddresses {
    pub escrow: ProgramAddress,
    pub vault_x: ProgramAddress,
    pub vault_y: ProgramAddress,
}

/// Searches nonces from 255 downward for the first off-curve address.
pub fn derive(
    program_id: &Pubkey,
    role: AddressRole,
    seeds: &EscrowSeeds,
) -> Result<ProgramAddress, EscrowError> {
    let (key, nonce) = Pubkey::try_find_program_address(&seeds.with_role(role), program_id)
        .ok_or(EscrowError::NonceSpaceExhausted)?;
    Ok(ProgramAddress { key, nonce, role })
}

pub fn derive_all(
    program_id: &Pubkey,
    seeds: &EscrowSeeds,
) -> Result<EscrowAddresses, EscrowError> {
    Ok(EscrowAddresses {
        escrow: derive(program_id, AddressRole::Escrow, seeds)?,
        vault_x: derive(program_id, AddressRole::VaultX, seeds)?,
        vault_y: derive(program_id, AddressRole::VaultY, seeds)?,
    })
}

/// Recreates an address from a known nonce and checks it against `expected`.
///
/// A wrong secret lands here as `AddressMismatch`.
pub fn verify(
    program_id: &Pubkey,
    role: AddressRole,
    seeds: &EscrowSeeds,
    nonce: u8,
    expected: &Pubkey,
) -> Result<ProgramAddress, EscrowError> {
    let [tag, a, b, x, y, secret] = seeds.with_role(role);
    let key = Pubkey::create_program_address(&[tag, a, b, x, y, secret, &[nonce][..]], program_id)
        .map_err(|_| EscrowError::AddressMismatch)?;
    if key != *expected {
        return Err(EscrowError::AddressMismatch);
    }
    Ok(ProgramAddress { key, nonce, role })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeds() -> EscrowSeeds {
        EscrowSeeds {
            party_a: Pubkey::new_unique(),
            party_b: Pubkey::new_unique(),
            mint_x: Pubkey::new_unique(),
            mint_y: Pubkey::new_unique(),
            secret: Secret::from_passphrase(b"pw"),
        }
    }

    #[test]
    fn passphrase_is_padded_and_truncated() {
        let short = Secret::from_passphrase(b"pw");
        assert_eq!(&short.as_bytes()[..2], b"pw");
        assert!(short.as_bytes()[2..].iter().all(|b| *b == 0));

        let long = Secret::from_passphrase(&[7u8; 40]);
        assert_eq!(long.as_bytes(), &[7u8; SECRET_LEN]);
    }

    #[test]
    fn secret_is_not_printed() {
        let secret = Secret::from_passphrase(b"hunter2");
        assert_eq!(format!("{:?}", secret), "Secret(..)");
    }

    #[test]
    fn roles_derive_distinct_addresses() {
        let program_id = Pubkey::new_unique();
        let all = derive_all(&program_id, &seeds()).unwrap();
        assert_ne!(all.escrow.key(), all.vault_x.key());
        assert_ne!(all.escrow.key(), all.vault_y.key());
        assert_ne!(all.vault_x.key(), all.vault_y.key());
        assert_eq!(all.vault_y.role(), AddressRole::VaultY);
    }

    #[test]
    fn derived_addresses_are_off_curve() {
        let program_id = Pubkey::new_unique();
        let all = derive_all(&program_id, &seeds()).unwrap();
        assert!(!all.escrow.key().is_on_curve());
        assert!(!all.vault_x.key().is_on_curve());
    }

    #[test]
    fn verify_accepts_stored_nonce() {
        let program_id = Pubkey::new_unique();
        let seeds = seeds();
        let escrow = derive(&program_id, AddressRole::Escrow, &seeds).unwrap();
        let verified =
            verify(&program_id, AddressRole::Escrow, &seeds, escrow.nonce(), escrow.key()).unwrap();
        assert_eq!(verified, escrow);
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let program_id = Pubkey::new_unique();
        let seeds = seeds();
        let escrow = derive(&program_id, AddressRole::Escrow, &seeds).unwrap();
        let guessed = EscrowSeeds {
            secret: Secret::from_passphrase(b"guess"),
            ..seeds
        };
        assert_eq!(
            verify(&program_id, AddressRole::Escrow, &guessed, escrow.nonce(), escrow.key()),
            Err(EscrowError::AddressMismatch)
        );
    }

    #[test]
    fn signer_seeds_recreate_the_address() {
        let program_id = Pubkey::new_unique();
        let seeds = seeds();
        let vault = derive(&program_id, AddressRole::VaultX, &seeds).unwrap();
        let key = vault.with_signer_seeds(&seeds, |signer| {
            assert_eq!(signer.len(), 7);
            Pubkey::create_program_address(signer, &program_id).unwrap()
        });
        assert_eq!(&key, vault.key());
    }
}
