//! Write-time guards for recipes and follows.
//!
//! Every check here is pure. Callers run them before opening a write
//! transaction; uniqueness races are caught separately by store constraints.

use std::collections::HashSet;

use thiserror::Error;
use uuid::Uuid;

use crate::api::{IngredientAmount, RecipeDraft};

pub const MIN_AMOUNT: i64 = 1;
pub const MAX_AMOUNT: i64 = 3000;
pub const MIN_COOKING_TIME: i64 = 1;
pub const MAX_COOKING_TIME: i64 = 600;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("You can not subscribe to yourself")]
    SelfFollow,

    #[error("Add at least one ingredient")]
    EmptyIngredients,

    #[error("You have already added this ingredient (id {0})")]
    DuplicateIngredient(i64),

    #[error("The amount of ingredient must be from {} to {}.", MIN_AMOUNT, MAX_AMOUNT)]
    AmountRange { ingredient: i64, amount: i64 },

    #[error("The cooking time should be from {} to {} minutes.", MIN_COOKING_TIME, MAX_COOKING_TIME)]
    CookingTimeRange(i64),

    #[error("Add at least one tag")]
    EmptyTags,

    #[error("You have already added this tag (id {0})")]
    DuplicateTag(i64),

    #[error("Field '{0}' must not be blank")]
    Blank(&'static str),
}

pub fn validate_follow(follower: Uuid, author: Uuid) -> Result<(), ValidationError> {
    if follower == author {
        return Err(ValidationError::SelfFollow);
    }
    Ok(())
}

pub fn validate_ingredient_lines(lines: &[IngredientAmount]) -> Result<(), ValidationError> {
    if lines.is_empty() {
        return Err(ValidationError::EmptyIngredients);
    }

    let mut seen = HashSet::with_capacity(lines.len());
    for line in lines {
        if !seen.insert(line.id) {
            return Err(ValidationError::DuplicateIngredient(line.id));
        }
        if !(MIN_AMOUNT..=MAX_AMOUNT).contains(&line.amount) {
            return Err(ValidationError::AmountRange {
                ingredient: line.id,
                amount: line.amount,
            });
        }
    }
    Ok(())
}

pub fn validate_cooking_time(minutes: i64) -> Result<(), ValidationError> {
    if !(MIN_COOKING_TIME..=MAX_COOKING_TIME).contains(&minutes) {
        return Err(ValidationError::CookingTimeRange(minutes));
    }
    Ok(())
}

fn validate_tags(tags: &[i64]) -> Result<(), ValidationError> {
    if tags.is_empty() {
        return Err(ValidationError::EmptyTags);
    }
    let mut seen = HashSet::with_capacity(tags.len());
    for id in tags {
        if !seen.insert(*id) {
            return Err(ValidationError::DuplicateTag(*id));
        }
    }
    Ok(())
}

/// Full check of a recipe write model, in the order a client would fix them.
pub fn validate_recipe(draft: &RecipeDraft) -> Result<(), ValidationError> {
    if draft.name.trim().is_empty() {
        return Err(ValidationError::Blank("name"));
    }
    if draft.text.trim().is_empty() {
        return Err(ValidationError::Blank("text"));
    }
    validate_cooking_time(draft.cooking_time)?;
    validate_tags(&draft.tags)?;
    validate_ingredient_lines(&draft.ingredients)
}
