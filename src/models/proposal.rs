//! Proposal models and DTOs

use super::{parse_query_bool, parse_query_int, PageRequest, User};
use crate::chain::{ActionsPayload, U256};
use crate::error::{validation_error, AppError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::{Validate, ValidationError};

/// Decimal form of a uint256 without leading zeros, so `0042` and `42` name one proposal
pub fn canonical_onchain_id(raw: &str) -> Result<String, AppError> {
    U256::from_dec_str(raw)
        .map(|id| id.to_string())
        .map_err(|_| validation_error("onchain_id must be a decimal uint256"))
}

fn validate_onchain_id(value: &str) -> Result<(), ValidationError> {
    if U256::from_dec_str(value).is_err() || value.trim() != value {
        let mut err = ValidationError::new("onchain_id");
        err.message = Some("onchain_id must be a decimal uint256".into());
        return Err(err);
    }
    Ok(())
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value cannot be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Off-chain shadow of a Governor proposal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Proposal {
    pub id: i32,
    /// Decimal rendering of the uint256 proposal id
    pub onchain_id: String,
    pub title: String,
    pub description: String,
    pub published: bool,
    pub state: i32,
    #[serde(rename = "for")]
    pub for_votes: i64,
    #[serde(rename = "against")]
    pub against_votes: i64,
    #[serde(rename = "abstain")]
    pub abstain_votes: i64,
    #[serde(rename = "userId")]
    pub user_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Values for a new proposal row
#[derive(Debug, Clone, PartialEq)]
pub struct NewProposal {
    pub onchain_id: String,
    pub title: String,
    pub description: String,
    pub published: bool,
    pub state: i32,
    pub user_id: i32,
}

impl NewProposal {
    pub fn draft(onchain_id: String, title: String, description: String, user_id: i32) -> Self {
        Self {
            onchain_id,
            title,
            description,
            published: false,
            state: 0,
            user_id,
        }
    }
}

/// Partial update; `None` leaves the column untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProposalChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub published: Option<bool>,
    pub state: Option<i32>,
    pub for_votes: Option<i64>,
    pub against_votes: Option<i64>,
    pub abstain_votes: Option<i64>,
}

impl ProposalChanges {
    pub fn published() -> Self {
        Self {
            published: Some(true),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, proposal: &mut Proposal) {
        if let Some(title) = &self.title {
            proposal.title = title.clone();
        }
        if let Some(description) = &self.description {
            proposal.description = description.clone();
        }
        if let Some(published) = self.published {
            proposal.published = published;
        }
        if let Some(state) = self.state {
            proposal.state = state;
        }
        if let Some(v) = self.for_votes {
            proposal.for_votes = v;
        }
        if let Some(v) = self.against_votes {
            proposal.against_votes = v;
        }
        if let Some(v) = self.abstain_votes {
            proposal.abstain_votes = v;
        }
    }
}

/// List filters; every `None` matches everything
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProposalFilter {
    pub published: Option<bool>,
    pub state: Option<i32>,
    pub user_id: Option<i32>,
}

impl ProposalFilter {
    pub fn matches(&self, proposal: &Proposal) -> bool {
        self.published.map_or(true, |p| proposal.published == p)
            && self.state.map_or(true, |s| proposal.state == s)
            && self.user_id.map_or(true, |u| proposal.user_id == u)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalStats {
    pub total: i64,
    pub published: i64,
    pub drafts: i64,
    /// Row count per `state` value, keyed by the state number
    pub by_state: BTreeMap<String, i64>,
}

/// GET /api/proposals query string
#[derive(Debug, Default, Deserialize)]
pub struct ProposalListQuery {
    pub published: Option<String>,
    pub state: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ProposalListQuery {
    pub fn filter(&self) -> Result<ProposalFilter, AppError> {
        let state = parse_query_int("state", self.state.as_deref())?
            .map(|s| {
                i32::try_from(s)
                    .ok()
                    .filter(|s| (0..=7).contains(s))
                    .ok_or_else(|| validation_error("state must be between 0 and 7"))
            })
            .transpose()?;
        let user_id = parse_query_int("userId", self.user_id.as_deref())?
            .map(|u| i32::try_from(u).map_err(|_| validation_error("userId is out of range")))
            .transpose()?;

        Ok(ProposalFilter {
            published: parse_query_bool("published", self.published.as_deref())?,
            state,
            user_id,
        })
    }

    pub fn page(&self) -> Result<PageRequest, AppError> {
        PageRequest::parse(self.page.as_deref(), self.limit.as_deref())
    }
}

/// POST /api/proposals
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProposalRequest {
    #[validate(custom(function = "validate_onchain_id"))]
    pub onchain_id: String,
    #[validate(
        length(min = 1, max = 500, message = "Title must be between 1 and 500 characters"),
        custom(function = "validate_not_blank")
    )]
    pub title: String,
    #[validate(
        length(min = 1, message = "Description is required"),
        custom(function = "validate_not_blank")
    )]
    pub description: String,
    pub published: Option<bool>,
    #[validate(range(min = 0, max = 7, message = "State must be between 0 and 7"))]
    pub state: Option<i32>,
    #[serde(rename = "userId")]
    pub user_id: i32,
}

impl TryFrom<CreateProposalRequest> for NewProposal {
    type Error = AppError;

    fn try_from(req: CreateProposalRequest) -> Result<Self, AppError> {
        Ok(Self {
            onchain_id: canonical_onchain_id(&req.onchain_id)?,
            title: req.title,
            description: req.description,
            published: req.published.unwrap_or(false),
            state: req.state.unwrap_or(0),
            user_id: req.user_id,
        })
    }
}

/// PUT /api/proposals/{id}
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProposalRequest {
    #[validate(
        length(min = 1, max = 500, message = "Title must be between 1 and 500 characters"),
        custom(function = "validate_not_blank")
    )]
    pub title: Option<String>,
    #[validate(
        length(min = 1, message = "Description cannot be empty"),
        custom(function = "validate_not_blank")
    )]
    pub description: Option<String>,
    pub published: Option<bool>,
    #[validate(range(min = 0, max = 7, message = "State must be between 0 and 7"))]
    pub state: Option<i32>,
    #[serde(rename = "for")]
    #[validate(range(min = 0, message = "Vote counts cannot be negative"))]
    pub for_votes: Option<i64>,
    #[serde(rename = "against")]
    #[validate(range(min = 0, message = "Vote counts cannot be negative"))]
    pub against_votes: Option<i64>,
    #[serde(rename = "abstain")]
    #[validate(range(min = 0, message = "Vote counts cannot be negative"))]
    pub abstain_votes: Option<i64>,
}

impl From<UpdateProposalRequest> for ProposalChanges {
    fn from(req: UpdateProposalRequest) -> Self {
        Self {
            title: req.title,
            description: req.description,
            published: req.published,
            state: req.state,
            for_votes: req.for_votes,
            against_votes: req.against_votes,
            abstain_votes: req.abstain_votes,
        }
    }
}

/// PATCH /api/proposals/{id}/votes
#[derive(Debug, Default, Deserialize, Validate)]
#[validate(schema(function = "validate_any_vote"))]
pub struct UpdateVotesRequest {
    #[serde(rename = "for")]
    #[validate(range(min = 0, message = "Vote counts cannot be negative"))]
    pub for_votes: Option<i64>,
    #[serde(rename = "against")]
    #[validate(range(min = 0, message = "Vote counts cannot be negative"))]
    pub against_votes: Option<i64>,
    #[serde(rename = "abstain")]
    #[validate(range(min = 0, message = "Vote counts cannot be negative"))]
    pub abstain_votes: Option<i64>,
}

fn validate_any_vote(req: &UpdateVotesRequest) -> Result<(), ValidationError> {
    if req.for_votes.is_none() && req.against_votes.is_none() && req.abstain_votes.is_none() {
        let mut err = ValidationError::new("no_vote_fields");
        err.message = Some("At least one vote count (for, against, abstain) is required".into());
        return Err(err);
    }
    Ok(())
}

impl From<UpdateVotesRequest> for ProposalChanges {
    fn from(req: UpdateVotesRequest) -> Self {
        Self {
            for_votes: req.for_votes,
            against_votes: req.against_votes,
            abstain_votes: req.abstain_votes,
            ..Default::default()
        }
    }
}

/// POST /api/proposals/submit
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitProposalRequest {
    #[validate(
        length(min = 1, max = 500, message = "Title must be between 1 and 500 characters"),
        custom(function = "validate_not_blank")
    )]
    pub title: String,
    #[validate(
        length(min = 1, message = "Description is required"),
        custom(function = "validate_not_blank")
    )]
    pub description: String,
    /// Explicit actions; the signalling action is used when absent
    pub actions: Option<ActionsPayload>,
}

/// POST /api/proposals/{id}/submit
#[derive(Debug, Default, Deserialize)]
pub struct ResubmitProposalRequest {
    #[serde(default)]
    pub actions: Option<ActionsPayload>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Proposal {
        let now = Utc::now();
        Proposal {
            id: 1,
            onchain_id: "42".to_string(),
            title: "Test".to_string(),
            description: "Body".to_string(),
            published: false,
            state: 0,
            for_votes: 0,
            against_votes: 0,
            abstain_votes: 0,
            user_id: 7,
            user: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_proposal_json_field_names() {
        let json = serde_json::to_value(sample()).unwrap();
        for key in ["onchain_id", "for", "against", "abstain", "userId", "createdAt", "updatedAt"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        assert!(json.get("user").is_none());
    }

    #[test]
    fn test_changes_apply_only_present_fields() {
        let mut proposal = sample();
        let changes = ProposalChanges {
            published: Some(true),
            for_votes: Some(5),
            ..Default::default()
        };
        changes.apply(&mut proposal);

        assert!(proposal.published);
        assert_eq!(proposal.for_votes, 5);
        assert_eq!(proposal.title, "Test");
        assert!(ProposalChanges::default().is_empty());
        assert!(!changes.is_empty());
    }

    #[test]
    fn test_list_query_filter() {
        let query = ProposalListQuery {
            published: Some("false".to_string()),
            state: Some("1".to_string()),
            user_id: Some("7".to_string()),
            ..Default::default()
        };
        assert_eq!(
            query.filter().unwrap(),
            ProposalFilter {
                published: Some(false),
                state: Some(1),
                user_id: Some(7),
            }
        );

        let bad_state = ProposalListQuery {
            state: Some("9".to_string()),
            ..Default::default()
        };
        assert!(bad_state.filter().is_err());
    }

    #[test]
    fn test_filter_matches() {
        let proposal = sample();
        assert!(ProposalFilter::default().matches(&proposal));
        assert!(!ProposalFilter {
            published: Some(true),
            ..Default::default()
        }
        .matches(&proposal));
    }

    #[test]
    fn test_votes_request_requires_a_field() {
        assert!(UpdateVotesRequest::default().validate().is_err());
        let req: UpdateVotesRequest = serde_json::from_value(serde_json::json!({ "for": 3 })).unwrap();
        assert!(req.validate().is_ok());
        let negative: UpdateVotesRequest =
            serde_json::from_value(serde_json::json!({ "against": -1 })).unwrap();
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_create_request_validation() {
        let req: CreateProposalRequest = serde_json::from_value(serde_json::json!({
            "onchain_id": "0x12",
            "title": "Test",
            "description": "Body",
            "userId": 1
        }))
        .unwrap();
        assert!(req.validate().is_err());

        let req: CreateProposalRequest = serde_json::from_value(serde_json::json!({
            "onchain_id": "123",
            "title": "Test",
            "description": "Body",
            "state": 3,
            "userId": 1
        }))
        .unwrap();
        assert!(req.validate().is_ok());
        let new = NewProposal::try_from(req).unwrap();
        assert!(!new.published);
        assert_eq!(new.state, 3);
    }

    #[test]
    fn test_onchain_id_is_canonicalized() {
        assert_eq!(canonical_onchain_id("0042").unwrap(), "42");
        assert_eq!(canonical_onchain_id("000").unwrap(), "0");
        assert!(canonical_onchain_id("1".repeat(78).as_str()).is_err());

        let req: CreateProposalRequest = serde_json::from_value(serde_json::json!({
            "onchain_id": "0042",
            "title": "Test",
            "description": "Body",
            "userId": 1
        }))
        .unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(NewProposal::try_from(req).unwrap().onchain_id, "42");
    }

    #[test]
    fn test_blank_text_is_rejected() {
        let submit: SubmitProposalRequest = serde_json::from_value(serde_json::json!({
            "title": "   ",
            "description": "Body"
        }))
        .unwrap();
        assert!(submit.validate().is_err());

        let submit: SubmitProposalRequest = serde_json::from_value(serde_json::json!({
            "title": "Title",
            "description": "\n\t "
        }))
        .unwrap();
        assert!(submit.validate().is_err());

        let update: UpdateProposalRequest =
            serde_json::from_value(serde_json::json!({ "title": " " })).unwrap();
        assert!(update.validate().is_err());
        assert!(UpdateProposalRequest::default().validate().is_ok());
    }
}
