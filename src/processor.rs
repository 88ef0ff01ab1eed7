use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    system_instruction, system_program,
    sysvar::{rent::Rent, Sysvar},
};

use crate::{
    error::EscrowError,
    instruction::{EscrowInstruction, Terms},
    machine::{self, TokenHolding, TokenLedger, TokenTransfer, TransferAuthority, Transition},
    pda::{self, AddressRole, EscrowSeeds, ProgramAddress, Secret},
    state::Escrow,
};

pub struct Processor;
impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        Self::dispatch(program_id, accounts, instruction_data).map_err(|e| {
            msg!("Error: {}", e);
            e.into()
        })
    }

    fn dispatch(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> Result<(), EscrowError> {
        let instruction = EscrowInstruction::unpack(instruction_data)?;

        match instruction {
            EscrowInstruction::Initialize {
                expected_x,
                expected_y,
                secret,
            } => {
                msg!("Instruction: Initialize");
                Self::process_initialize(program_id, accounts, expected_x, expected_y, secret)
            }
            EscrowInstruction::Deposit { secret } => {
                msg!("Instruction: Deposit");
                Self::process_deposit(program_id, accounts, secret)
            }
            EscrowInstruction::Withdraw { secret } => {
                msg!("Instruction: Withdraw");
                Self::process_withdraw(program_id, accounts, secret)
            }
        }
    }

    fn process_initialize(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        expected_x: u64,
        expected_y: u64,
        secret: Secret,
    ) -> Result<(), EscrowError> {
        let account_info_iter = &mut accounts.iter();

        // INITIALIZER
        // Pays for the record and must be one of the parties.
        let initializer = next_account_info(account_info_iter)?;
        if !initializer.is_signer {
            return Err(EscrowError::MissingSignature);
        }

        let escrow_account = next_account_info(account_info_iter)?;
        let party_a = next_account_info(account_info_iter)?;
        let party_b = next_account_info(account_info_iter)?;
        let mint_x = next_account_info(account_info_iter)?;
        let mint_y = next_account_info(account_info_iter)?;
        let rent = &Rent::from_account_info(next_account_info(account_info_iter)?)?;
        let system_program_account = next_account_info(account_info_iter)?;
        if !system_program::check_id(system_program_account.key) {
            return Err(ProgramError::IncorrectProgramId.into());
        }

        // MINTS
        Self::check_mint(mint_x)?;
        Self::check_mint(mint_y)?;

        // ESCROW ACCOUNT
        // Must sit at the address derived from the terms and the secret.
        let terms = Terms {
            party_a: *party_a.key,
            party_b: *party_b.key,
            mint_x: *mint_x.key,
            mint_y: *mint_y.key,
            expected_x,
            expected_y,
        };
        let seeds = terms.seeds(secret);
        let addresses = pda::derive_all(program_id, &seeds)?;
        if addresses.escrow.key() != escrow_account.key {
            return Err(EscrowError::AddressMismatch);
        }

        let needs_account = escrow_account.data_is_empty();
        let current = if needs_account {
            Escrow::default()
        } else {
            Self::load_record(program_id, escrow_account)?
        };

        let transition = machine::initialize(&current, &terms, initializer.key, &addresses)?;

        if needs_account {
            msg!("Creating escrow record");
            Self::create_program_account(
                initializer,
                escrow_account,
                system_program_account,
                &addresses.escrow,
                &seeds,
                rent,
                Escrow::LEN,
                program_id,
            )?;
        } else if !rent.is_exempt(escrow_account.lamports(), escrow_account.data_len()) {
            return Err(EscrowError::NotRentExempt);
        }

        Self::store_record(escrow_account, &transition.record)?;
        Self::log_transition(&transition);
        Ok(())
    }

    fn process_deposit(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        secret: Secret,
    ) -> Result<(), EscrowError> {
        let account_info_iter = &mut accounts.iter();

        // DEPOSITOR
        // Signs the transfer out of its own token account and pays for the vault.
        let depositor = next_account_info(account_info_iter)?;
        if !depositor.is_signer {
            return Err(EscrowError::MissingSignature);
        }

        let escrow_account = next_account_info(account_info_iter)?;
        let source_account = next_account_info(account_info_iter)?;
        let vault_account = next_account_info(account_info_iter)?;
        let mint_account = next_account_info(account_info_iter)?;
        let token_program = next_account_info(account_info_iter)?;
        let rent_info = next_account_info(account_info_iter)?;
        let system_program_account = next_account_info(account_info_iter)?;
        Self::check_token_program(token_program)?;

        let current = Self::load_record(program_id, escrow_account)?;
        let leg = machine::deposit_leg(&current, depositor.key)?;

        // ADDRESSES
        // A wrong secret fails here, before anything moves.
        let seeds = current.seeds(secret);
        pda::verify(
            program_id,
            AddressRole::Escrow,
            &seeds,
            current.escrow_nonce,
            escrow_account.key,
        )?;
        let vault = pda::verify(
            program_id,
            leg.vault_role(),
            &seeds,
            current.vault_nonce(leg),
            vault_account.key,
        )?;
        if mint_account.key != current.mint(leg) {
            return Err(EscrowError::WrongMint);
        }

        let source = Self::token_holding(source_account)?;
        let transition = machine::deposit(&current, depositor.key, &source, &vault)?;

        // VAULT
        // Created on the first deposit of its leg, with the escrow as authority.
        if vault_account.data_is_empty() {
            msg!("Creating vault for leg {:?}", leg);
            let rent = &Rent::from_account_info(rent_info)?;
            Self::create_program_account(
                depositor,
                vault_account,
                system_program_account,
                &vault,
                &seeds,
                rent,
                spl_token::state::Account::LEN,
                &spl_token::id(),
            )?;
            invoke(
                &spl_token::instruction::initialize_account(
                    token_program.key,
                    vault_account.key,
                    mint_account.key,
                    escrow_account.key,
                )?,
                &[
                    vault_account.clone(),
                    mint_account.clone(),
                    escrow_account.clone(),
                    rent_info.clone(),
                    token_program.clone(),
                ],
            )?;
        } else {
            let existing = Self::token_holding(vault_account)?;
            if existing.mint != *current.mint(leg) || existing.owner != *escrow_account.key {
                return Err(EscrowError::InvalidVault);
            }
        }

        msg!("Transferring {} to vault", current.expected_amount(leg));
        let mut ledger = CpiLedger {
            token_program,
            accounts,
            seeds: &seeds,
        };
        Self::commit(transition, &mut ledger, escrow_account)
    }

    fn process_withdraw(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        secret: Secret,
    ) -> Result<(), EscrowError> {
        let account_info_iter = &mut accounts.iter();

        // CALLER
        // Either party can trigger the swap once both legs are in.
        let caller = next_account_info(account_info_iter)?;
        if !caller.is_signer {
            return Err(EscrowError::MissingSignature);
        }

        let escrow_account = next_account_info(account_info_iter)?;
        let vault_x_account = next_account_info(account_info_iter)?;
        let vault_y_account = next_account_info(account_info_iter)?;
        let party_a_receive = next_account_info(account_info_iter)?;
        let party_b_receive = next_account_info(account_info_iter)?;
        let token_program = next_account_info(account_info_iter)?;
        Self::check_token_program(token_program)?;

        let current = Self::load_record(program_id, escrow_account)?;
        machine::withdraw_ready(&current, caller.key)?;

        // ADDRESSES
        let seeds = current.seeds(secret);
        let escrow = pda::verify(
            program_id,
            AddressRole::Escrow,
            &seeds,
            current.escrow_nonce,
            escrow_account.key,
        )?;
        pda::verify(
            program_id,
            AddressRole::VaultX,
            &seeds,
            current.vault_x_nonce,
            vault_x_account.key,
        )?;
        pda::verify(
            program_id,
            AddressRole::VaultY,
            &seeds,
            current.vault_y_nonce,
            vault_y_account.key,
        )?;

        let transition = machine::withdraw(
            &current,
            caller.key,
            &escrow,
            &Self::token_holding(vault_x_account)?,
            &Self::token_holding(vault_y_account)?,
            &Self::token_holding(party_a_receive)?,
            &Self::token_holding(party_b_receive)?,
        )?;

        msg!("Swapping vault balances");
        let mut ledger = CpiLedger {
            token_program,
            accounts,
            seeds: &seeds,
        };
        Self::commit(transition, &mut ledger, escrow_account)
    }

    /// Runs the transition's transfers and persists its record.
    ///
    /// The surrounding transaction discards everything if any step fails.
    fn commit(
        transition: Transition,
        ledger: &mut CpiLedger,
        escrow_account: &AccountInfo,
    ) -> Result<(), EscrowError> {
        Self::log_transition(&transition);
        transition.commit(ledger, |record| Self::store_record(escrow_account, record))?;
        Ok(())
    }

    /// Turns the empty account at `address` into a rent-exempt account of `space`
    /// bytes owned by `owner`.
    ///
    /// Lamports already sent to the address are kept: the payer only tops up the
    /// difference, then the address allocates and assigns itself.
    #[allow(clippy::too_many_arguments)]
    fn create_program_account<'a>(
        payer: &AccountInfo<'a>,
        target: &AccountInfo<'a>,
        system_program_account: &AccountInfo<'a>,
        address: &ProgramAddress,
        seeds: &EscrowSeeds,
        rent: &Rent,
        space: usize,
        owner: &Pubkey,
    ) -> Result<(), EscrowError> {
        let required = rent.minimum_balance(space);
        if target.lamports() == 0 {
            let create = system_instruction::create_account(
                payer.key,
                target.key,
                required,
                space as u64,
                owner,
            );
            address.with_signer_seeds(seeds, |signer| {
                invoke_signed(
                    &create,
                    &[payer.clone(), target.clone(), system_program_account.clone()],
                    &[signer],
                )
            })?;
            return Ok(());
        }

        let top_up = required.saturating_sub(target.lamports());
        if top_up > 0 {
            invoke(
                &system_instruction::transfer(payer.key, target.key, top_up),
                &[payer.clone(), target.clone(), system_program_account.clone()],
            )?;
        }
        let accounts = [target.clone(), system_program_account.clone()];
        address.with_signer_seeds(seeds, |signer| {
            invoke_signed(
                &system_instruction::allocate(target.key, space as u64),
                &accounts,
                &[signer],
            )?;
            invoke_signed(
                &system_instruction::assign(target.key, owner),
                &accounts,
                &[signer],
            )
        })?;
        Ok(())
    }

    fn load_record(
        program_id: &Pubkey,
        escrow_account: &AccountInfo,
    ) -> Result<Escrow, EscrowError> {
        if escrow_account.owner != program_id {
            return Err(ProgramError::IncorrectProgramId.into());
        }
        Escrow::from_account_data(&escrow_account.data.borrow())
    }

    fn store_record(escrow_account: &AccountInfo, record: &Escrow) -> Result<(), EscrowError> {
        Escrow::pack(*record, &mut escrow_account.try_borrow_mut_data()?)?;
        Ok(())
    }

    fn token_holding(account: &AccountInfo) -> Result<TokenHolding, EscrowError> {
        if *account.owner != spl_token::id() {
            return Err(ProgramError::IncorrectProgramId.into());
        }
        let state = spl_token::state::Account::unpack(&account.data.borrow())?;
        Ok(TokenHolding {
            address: *account.key,
            mint: state.mint,
            owner: state.owner,
            amount: state.amount,
        })
    }

    fn check_mint(mint: &AccountInfo) -> Result<(), EscrowError> {
        if *mint.owner != spl_token::id() {
            return Err(ProgramError::IncorrectProgramId.into());
        }
        spl_token::state::Mint::unpack(&mint.data.borrow())?;
        Ok(())
    }

    fn check_token_program(token_program: &AccountInfo) -> Result<(), EscrowError> {
        if !spl_token::check_id(token_program.key) {
            return Err(ProgramError::IncorrectProgramId.into());
        }
        Ok(())
    }

    fn log_transition(transition: &Transition) {
        msg!(
            "Escrow status: {:?} -> {:?}",
            transition.previous,
            transition.record.status
        );
    }
}

/// Token transfers carried out by invoking the SPL Token program.
struct CpiLedger<'a, 'b> {
    token_program: &'b AccountInfo<'a>,
    accounts: &'b [AccountInfo<'a>],
    seeds: &'b EscrowSeeds,
}

impl<'a, 'b> CpiLedger<'a, 'b> {
    fn account(&self, key: &Pubkey) -> Result<&'b AccountInfo<'a>, EscrowError> {
        self.accounts
            .iter()
            .find(|account| account.key == key)
            .ok_or_else(|| ProgramError::NotEnoughAccountKeys.into())
    }
}

impl<'a, 'b> TokenLedger for CpiLedger<'a, 'b> {
    fn transfer(&mut self, transfer: &TokenTransfer) -> Result<(), EscrowError> {
        let source = self.account(&transfer.source)?;
        let destination = self.account(&transfer.destination)?;
        let authority_key = match &transfer.authority {
            TransferAuthority::Owner(owner) => *owner,
            TransferAuthority::Escrow(escrow) => *escrow.key(),
        };
        let authority = self.account(&authority_key)?;

        let ix = spl_token::instruction::transfer(
            self.token_program.key,
            source.key,
            destination.key,
            authority.key,
            &[],
            transfer.amount,
        )?;
        let infos = [
            source.clone(),
            destination.clone(),
            authority.clone(),
            self.token_program.clone(),
        ];

        match &transfer.authority {
            TransferAuthority::Owner(_) => invoke(&ix, &infos)?,
            TransferAuthority::Escrow(escrow) => escrow
                .with_signer_seeds(self.seeds, |signer| invoke_signed(&ix, &infos, &[signer]))?,
        }
        Ok(())
    }
}
