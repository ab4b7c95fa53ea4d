use presale_core::Store;
use presale_store::{NewTokenReward, TokenRewardRecord};
use serde::Serialize;
use serde_json::json;

use crate::cli::{RewardFields, RewardsArgs, RewardsCommand};
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct RewardListData {
    rewards: Vec<TokenRewardRecord>,
}

pub fn run(args: &RewardsArgs, store: &Store) -> Result<CommandResult, CliError> {
    match &args.command {
        RewardsCommand::Add(fields) => {
            let reward = store.insert_token_reward(&new_reward(fields))?;
            Ok(CommandResult::ok(serde_json::to_value(reward)?))
        }
        RewardsCommand::List => {
            let rewards = store.token_rewards()?;
            Ok(CommandResult::ok(serde_json::to_value(RewardListData {
                rewards,
            })?))
        }
        RewardsCommand::Show(reference) => {
            let reward = store
                .token_reward(&reference.id)?
                .ok_or_else(|| not_found(&reference.id))?;
            Ok(CommandResult::ok(serde_json::to_value(reward)?))
        }
        RewardsCommand::Update(update) => {
            if !store.update_token_reward(&update.id, &new_reward(&update.fields))? {
                return Err(not_found(&update.id));
            }
            let reward = store
                .token_reward(&update.id)?
                .ok_or_else(|| not_found(&update.id))?;
            Ok(CommandResult::ok(serde_json::to_value(reward)?))
        }
        RewardsCommand::Delete(reference) => {
            if !store.delete_token_reward(&reference.id)? {
                return Err(not_found(&reference.id));
            }
            Ok(CommandResult::ok(json!({ "id": reference.id, "deleted": true })))
        }
    }
}

fn new_reward(fields: &RewardFields) -> NewTokenReward {
    NewTokenReward {
        purchase_band: fields.purchase_band,
        swap: fields.swap,
        deposit_amount: fields.deposit_amount,
        reward_bonus: fields.reward_bonus,
    }
}

fn not_found(id: &str) -> CliError {
    CliError::Command(format!("token reward '{id}' not found"))
}
