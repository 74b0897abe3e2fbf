//! # Vault Program Processor
//!
//! Instruction handlers. Every handler follows the same shape:
//!
//! 1. Resolve accounts by position and check each sits at the address it
//!    must (derived addresses are recomputed, never trusted).
//! 2. Load and decode records.
//! 3. Check authority, then lifecycle state, then time.
//! 4. Move lamports and write records through the invoke context.
//!
//! Any error aborts the whole transaction; the runtime discards every
//! mutation made before it.
//!
//! Handlers trace at `debug` only: they run before the runtime's post-checks
//! and may be retried, so the bank reports the committed outcome.

use trust_protocol::runtime::{InvokeContext, Program, ProgramError};
use trust_protocol::{minimum_balance, Pubkey};

use crate::error::VaultError;
use crate::instruction::VaultInstruction;
use crate::pda::{
    custody_from_bump, program_config_address, rewards_pool_address, vault_config_from_bump,
    VaultAddresses, CONFIG_SEED, REWARDS_SEED, STATE_SEED, VAULT_SEED,
};
use crate::rewards::{LinearRewards, RewardCalculator};
use crate::state::{AccountRecord, ConfigParams, ProgramConfig, VaultConfig, VaultStatus};
use crate::{CUSTODY_RESERVE, PROGRAM_ID};

/// The vault program.
#[derive(Debug, Default, Clone)]
pub struct VaultProgram<R = LinearRewards> {
    rewards: R,
}

impl VaultProgram<LinearRewards> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: RewardCalculator> VaultProgram<R> {
    /// Use a different reward formula.
    pub fn with_rewards(rewards: R) -> Self {
        Self { rewards }
    }
}

impl<R: RewardCalculator> Program for VaultProgram<R> {
    fn id(&self) -> Pubkey {
        PROGRAM_ID
    }

    fn name(&self) -> &'static str {
        "trust-vault"
    }

    fn process(&self, ctx: &mut InvokeContext, data: &[u8]) -> Result<(), ProgramError> {
        let instruction = VaultInstruction::unpack(data)?;
        let name = instruction.name();
        let result = match instruction {
            VaultInstruction::Initialize { lock_duration_secs } => initialize(ctx, lock_duration_secs),
            VaultInstruction::Deposit { amount } => deposit(ctx, amount),
            VaultInstruction::PrematureClose => premature_close(ctx),
            VaultInstruction::MatureClose => mature_close(ctx),
            VaultInstruction::ClaimRewards => claim_rewards(ctx, &self.rewards),
            VaultInstruction::InitializeConfig { params } => initialize_config(ctx, params),
            VaultInstruction::UpdateConfig { params, new_admin } => update_config(ctx, params, new_admin),
            VaultInstruction::FundRewards { amount } => fund_rewards(ctx, amount),
        };
        if let Err(e) = &result {
            tracing::debug!(instruction = name, error = %e, code = e.code(), "vault instruction failed");
        }
        result.map_err(ProgramError::from)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A vault record together with the checks every post-initialize handler
/// needs: right owner program, right address, right custody.
fn load_vault(ctx: &InvokeContext, vault_key: &Pubkey, custody: Option<&Pubkey>) -> Result<VaultConfig, VaultError> {
    let account = ctx.get(vault_key)?.ok_or(VaultError::VaultNotInitialized)?;
    if account.owner != PROGRAM_ID {
        return Err(VaultError::VaultNotInitialized);
    }
    let vault = VaultConfig::try_from_bytes(&account.data)?;
    if vault_config_from_bump(&vault.owner, vault.state_bump)? != *vault_key {
        return Err(VaultError::InvalidAccount);
    }
    if let Some(custody) = custody {
        if custody_from_bump(vault_key, vault.vault_bump)? != *custody {
            return Err(VaultError::InvalidAccount);
        }
    }
    Ok(vault)
}

/// Owner signed and the vault is still open. Authority first, so a stranger
/// learns nothing about a vault's state.
fn require_owner_active(ctx: &InvokeContext, vault: &VaultConfig) -> Result<(), VaultError> {
    if !ctx.is_signer(&vault.owner) {
        return Err(VaultError::Unauthorized);
    }
    if !vault.is_active() {
        return Err(VaultError::VaultNotActive);
    }
    Ok(())
}

/// The position-0 account must be the vault owner itself.
fn require_owner_account(owner_key: &Pubkey, vault: &VaultConfig) -> Result<(), VaultError> {
    if *owner_key != vault.owner {
        return Err(VaultError::Unauthorized);
    }
    Ok(())
}

fn load_config(ctx: &InvokeContext, config_key: &Pubkey) -> Result<ProgramConfig, VaultError> {
    let (expected, _) = program_config_address()?;
    if *config_key != expected {
        return Err(VaultError::InvalidAccount);
    }
    let account = ctx.get(config_key)?.ok_or(VaultError::ConfigNotInitialized)?;
    if account.owner != PROGRAM_ID {
        return Err(VaultError::ConfigNotInitialized);
    }
    ProgramConfig::try_from_bytes(&account.data)
}

fn store<T: AccountRecord>(ctx: &mut InvokeContext, key: &Pubkey, record: &T) -> Result<(), VaultError> {
    ctx.write_data(key, record.to_bytes()?)?;
    Ok(())
}

/// Sweep anything above `keep` lamports from a program account to `to`.
fn sweep_surplus(ctx: &mut InvokeContext, from: &Pubkey, to: &Pubkey, keep: u64) -> Result<(), VaultError> {
    let surplus = ctx.lamports(from)?.saturating_sub(keep);
    if surplus > 0 {
        ctx.transfer(from, to, surplus)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Vault lifecycle
// ---------------------------------------------------------------------------

fn initialize(ctx: &mut InvokeContext, lock_duration_secs: i64) -> Result<(), VaultError> {
    let [owner, vault_key, custody, config_key] = ctx.accounts::<4>()?;
    if !ctx.is_signer(&owner) {
        return Err(VaultError::Unauthorized);
    }
    let addresses = VaultAddresses::derive(&owner)?;
    if vault_key != addresses.vault_config || custody != addresses.custody {
        return Err(VaultError::InvalidAccount);
    }

    let taken = |key: &Pubkey| -> Result<bool, VaultError> {
        Ok(ctx
            .get(key)?
            .is_some_and(|a| !a.is_system_owned() || !a.data.is_empty()))
    };
    if taken(&vault_key)? || taken(&custody)? {
        return Err(VaultError::AlreadyInitialized);
    }

    let config = load_config(ctx, &config_key)?;
    if lock_duration_secs < 0 || lock_duration_secs > config.max_lock_duration_secs {
        return Err(VaultError::InvalidDuration);
    }

    let vault = VaultConfig {
        owner,
        lock_duration_secs,
        created_at: ctx.now(),
        principal_deposited: 0,
        status: VaultStatus::Active,
        state_bump: addresses.state_bump,
        vault_bump: addresses.vault_bump,
        rewards_claimed: 0,
    };
    let data = vault.to_bytes()?;
    let rent = minimum_balance(data.len());

    let needed = rent.checked_add(CUSTODY_RESERVE).ok_or(VaultError::ArithmeticOverflow)?;
    let prefunded = ctx.lamports(&vault_key)?.saturating_add(ctx.lamports(&custody)?);
    if ctx.lamports(&owner)?.saturating_add(prefunded) < needed {
        return Err(VaultError::InsufficientFunds);
    }

    ctx.create_pda_account(
        &owner,
        &vault_key,
        &[STATE_SEED, owner.as_ref(), &[addresses.state_bump]],
        data,
        rent,
    )?;
    ctx.create_pda_account(
        &owner,
        &custody,
        &[VAULT_SEED, vault_key.as_ref(), &[addresses.vault_bump]],
        Vec::new(),
        CUSTODY_RESERVE,
    )?;
    // Lamports parked at either address before it existed go back to the
    // owner; custody must start at exactly the reserve.
    sweep_surplus(ctx, &vault_key, &owner, rent)?;
    sweep_surplus(ctx, &custody, &owner, CUSTODY_RESERVE)?;

    ctx.log(format!(
        "initialize: owner={owner} lock={lock_duration_secs}s maturity={}",
        vault.maturity()?
    ));
    tracing::debug!(%owner, vault = %vault_key, lock_duration_secs, "vault initialized");
    Ok(())
}

fn deposit(ctx: &mut InvokeContext, amount: u64) -> Result<(), VaultError> {
    let [owner, vault_key, custody] = ctx.accounts::<3>()?;
    if amount == 0 {
        return Err(VaultError::InvalidAmount);
    }
    let mut vault = load_vault(ctx, &vault_key, Some(&custody))?;
    require_owner_account(&owner, &vault)?;
    require_owner_active(ctx, &vault)?;

    if ctx.lamports(&owner)? < amount {
        return Err(VaultError::InsufficientFunds);
    }
    vault.principal_deposited = vault
        .principal_deposited
        .checked_add(amount)
        .ok_or(VaultError::ArithmeticOverflow)?;
    ctx.transfer(&owner, &custody, amount)?;
    store(ctx, &vault_key, &vault)?;

    ctx.log(format!("deposit: {amount} lamports, principal={}", vault.principal_deposited));
    tracing::debug!(%owner, amount, principal = vault.principal_deposited, "vault deposit");
    Ok(())
}

fn premature_close(ctx: &mut InvokeContext) -> Result<(), VaultError> {
    let [owner, vault_key, custody, config_key] = ctx.accounts::<4>()?;
    // The admin closing their own vault leaves out the treasury slot.
    let treasury = match ctx.accounts::<5>() {
        Ok([.., treasury]) => treasury,
        Err(_) => owner,
    };
    let mut vault = load_vault(ctx, &vault_key, Some(&custody))?;
    require_owner_account(&owner, &vault)?;
    require_owner_active(ctx, &vault)?;

    let config = load_config(ctx, &config_key)?;
    if treasury != config.admin {
        return Err(VaultError::InvalidTreasury);
    }
    if ctx.get(&treasury)?.is_some_and(|a| !a.is_system_owned()) {
        return Err(VaultError::InvalidTreasury);
    }
    if vault.is_mature(ctx.now())? {
        return Err(VaultError::AlreadyMatured);
    }

    let principal = vault.principal_deposited;
    let penalty = config.penalty_for(principal);
    let balance = ctx.lamports(&custody)?;
    let refund = balance.checked_sub(penalty).ok_or(VaultError::ArithmeticOverflow)?;

    ctx.transfer(&custody, &treasury, penalty)?;
    ctx.transfer(&custody, &owner, refund)?;
    vault.close();
    store(ctx, &vault_key, &vault)?;

    ctx.log(format!("premature_close: penalty={penalty} refund={refund}"));
    tracing::debug!(%owner, principal, penalty, refund, "vault closed early");
    Ok(())
}

fn mature_close(ctx: &mut InvokeContext) -> Result<(), VaultError> {
    let [owner, vault_key, custody] = ctx.accounts::<3>()?;
    let mut vault = load_vault(ctx, &vault_key, Some(&custody))?;
    require_owner_account(&owner, &vault)?;
    require_owner_active(ctx, &vault)?;

    if !vault.is_mature(ctx.now())? {
        return Err(VaultError::NotMatureYet);
    }

    let payout = ctx.lamports(&custody)?;
    ctx.transfer(&custody, &owner, payout)?;
    vault.close();
    store(ctx, &vault_key, &vault)?;

    ctx.log(format!("mature_close: payout={payout}"));
    tracing::debug!(%owner, payout, "vault closed at maturity");
    Ok(())
}

fn claim_rewards<R: RewardCalculator>(ctx: &mut InvokeContext, rewards: &R) -> Result<(), VaultError> {
    let [owner, vault_key, config_key, pool] = ctx.accounts::<4>()?;
    let mut vault = load_vault(ctx, &vault_key, None)?;
    require_owner_account(&owner, &vault)?;
    require_owner_active(ctx, &vault)?;

    if !vault.is_mature(ctx.now())? {
        return Err(VaultError::NotYetEligible);
    }
    let config = load_config(ctx, &config_key)?;
    let (expected_pool, _) = rewards_pool_address()?;
    if pool != expected_pool {
        return Err(VaultError::InvalidAccount);
    }

    let entitled = rewards.entitlement(&vault, &config)?;
    let claimable = entitled.saturating_sub(vault.rewards_claimed);
    if claimable == 0 {
        return Err(VaultError::NothingToClaim);
    }

    let available = match ctx.get(&pool)? {
        Some(account) if account.owner == PROGRAM_ID => account.spendable(),
        _ => 0,
    };
    if claimable > available {
        return Err(VaultError::RewardsPoolDepleted);
    }

    ctx.transfer(&pool, &owner, claimable)?;
    vault.rewards_claimed = vault
        .rewards_claimed
        .checked_add(claimable)
        .ok_or(VaultError::ArithmeticOverflow)?;
    store(ctx, &vault_key, &vault)?;

    ctx.log(format!("claim_rewards: paid={claimable} total={}", vault.rewards_claimed));
    tracing::debug!(%owner, claimable, total = vault.rewards_claimed, "rewards claimed");
    Ok(())
}

// ---------------------------------------------------------------------------
// Administration
// ---------------------------------------------------------------------------

fn initialize_config(ctx: &mut InvokeContext, params: ConfigParams) -> Result<(), VaultError> {
    let [admin, config_key] = ctx.accounts::<2>()?;
    if !ctx.is_signer(&admin) {
        return Err(VaultError::Unauthorized);
    }
    let (expected, bump) = program_config_address()?;
    if config_key != expected {
        return Err(VaultError::InvalidAccount);
    }
    if ctx
        .get(&config_key)?
        .is_some_and(|a| !a.is_system_owned() || !a.data.is_empty())
    {
        return Err(VaultError::AlreadyInitialized);
    }
    params.validate()?;

    let config = ProgramConfig::new(admin, params, bump);
    let data = config.to_bytes()?;
    let rent = minimum_balance(data.len());
    ctx.create_pda_account(&admin, &config_key, &[CONFIG_SEED, &[bump]], data, rent)?;
    sweep_surplus(ctx, &config_key, &admin, rent)?;

    tracing::debug!(%admin, penalty_bps = params.penalty_bps, reward_rate_bps = params.reward_rate_bps, "program config initialized");
    Ok(())
}

fn update_config(ctx: &mut InvokeContext, params: ConfigParams, new_admin: Option<Pubkey>) -> Result<(), VaultError> {
    let [admin, config_key] = ctx.accounts::<2>()?;
    let mut config = load_config(ctx, &config_key)?;
    let authority = config.authorize(ctx.signer())?;
    if admin != *authority.admin() {
        return Err(VaultError::Unauthorized);
    }
    params.validate()?;
    // Off-curve keys can never sign, and a derived account can't hold penalties.
    if new_admin.is_some_and(|key| !key.is_on_curve()) {
        return Err(VaultError::InvalidConfig);
    }

    config.apply(&authority, params, new_admin);
    store(ctx, &config_key, &config)?;

    tracing::debug!(admin = %config.admin, penalty_bps = params.penalty_bps, reward_rate_bps = params.reward_rate_bps, "program config updated");
    Ok(())
}

fn fund_rewards(ctx: &mut InvokeContext, amount: u64) -> Result<(), VaultError> {
    let [funder, pool] = ctx.accounts::<2>()?;
    if amount == 0 {
        return Err(VaultError::InvalidAmount);
    }
    let (expected, bump) = rewards_pool_address()?;
    if pool != expected {
        return Err(VaultError::InvalidAccount);
    }

    let created = match ctx.get(&pool)? {
        Some(account) if account.owner == PROGRAM_ID => false,
        _ => {
            ctx.create_pda_account(&funder, &pool, &[REWARDS_SEED, &[bump]], Vec::new(), minimum_balance(0))?;
            true
        }
    };
    if ctx.lamports(&funder)? < amount {
        return Err(VaultError::InsufficientFunds);
    }
    ctx.transfer(&funder, &pool, amount)?;

    tracing::debug!(%funder, amount, created, "rewards pool funded");
    Ok(())
}
