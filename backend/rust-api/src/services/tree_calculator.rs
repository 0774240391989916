use crate::error::{AppError, AppResult};
use crate::models::Difficulty;

/// kg CO2e of savings per tree
pub const KG_PER_TREE: f64 = 10.0;

/// Trees earned for staying under the monthly target: one per 10 kg saved.
pub fn monthly_trees_from_savings(target_emission: f64, actual_emission: f64) -> u32 {
    let savings = target_emission - actual_emission;
    if savings <= 0.0 || !savings.is_finite() {
        return 0;
    }
    (savings / KG_PER_TREE).floor() as u32
}

pub fn validate_tree_inputs(target_emission: f64, actual_emission: f64) -> AppResult<()> {
    if !target_emission.is_finite() || !actual_emission.is_finite() {
        return Err(AppError::invalid_input("Emissions must be valid numbers"));
    }
    if target_emission < 0.0 || actual_emission < 0.0 {
        return Err(AppError::invalid_input("Emissions cannot be negative"));
    }
    Ok(())
}

/// Default `rewards.trees` for a new challenge
pub fn difficulty_based_trees(difficulty: Difficulty) -> u32 {
    match difficulty {
        Difficulty::Easy => 1,
        Difficulty::Medium => 3,
        Difficulty::Hard => 5,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeReason {
    Savings,
    Challenge,
}

pub fn tree_earning_message(tree_count: u32, reason: TreeReason) -> Option<String> {
    if tree_count == 0 {
        return None;
    }

    let trees = if tree_count == 1 { "tree" } else { "trees" };
    let icons = "🌳".repeat(tree_count.min(5) as usize);

    let message = match reason {
        TreeReason::Savings => format!(
            "Congratulations! You earned {} {} {} by staying under your monthly target. Keep reducing emissions!",
            tree_count, trees, icons
        ),
        TreeReason::Challenge => format!(
            "Challenge completed! You earned {} {} {} for your achievement!",
            tree_count, trees, icons
        ),
    };
    Some(message)
}
