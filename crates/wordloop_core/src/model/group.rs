//! Group cycle bookkeeping types.
//!
//! # Responsibility
//! - Describe one drawn group, its members and their in-cycle progress.
//! - Describe overflow carry entries that outlive a group.
//!
//! # Invariants
//! - A group has at most `completion_target` committed members counted
//!   toward completion; it closes once that many are committed.
//! - Leftovers of a closed group are exactly its members that are neither
//!   committed nor skipped.

use crate::model::record::DailyKind;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of one group cycle.
pub type GroupId = Uuid;

/// Why a word was put into a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateRole {
    /// Never learned; no record exists.
    New,
    /// Record is due for review.
    Review,
    /// Left over from an earlier group of the same section.
    Carry,
}

impl CandidateRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Review => "review",
            Self::Carry => "carry",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "new" => Some(Self::New),
            "review" => Some(Self::Review),
            "carry" => Some(Self::Carry),
            _ => None,
        }
    }
}

/// One word proposed by the group selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub word_id: String,
    pub role: CandidateRole,
    /// Daily counter fed when this word commits.
    pub kind: DailyKind,
    /// Exposures accumulated in earlier cycles (carry only).
    pub prior_exposures: u32,
    /// Qualifying exposures accumulated in earlier cycles (carry only).
    pub prior_hits: u32,
}

/// Lifecycle state of a group cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Open,
    /// Closed because the completion target was reached.
    Completed,
    /// Closed because a newer draw replaced it.
    Abandoned,
    /// Closed on explicit request.
    Closed,
}

impl GroupStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
            Self::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(Self::Open),
            "completed" => Some(Self::Completed),
            "abandoned" => Some(Self::Abandoned),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

/// Progress of one word inside a group cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub word_id: String,
    pub role: CandidateRole,
    pub kind: DailyKind,
    /// Presentation order within the group.
    pub position: u32,
    /// All exposures, including those carried in.
    pub exposures: u32,
    /// Exposures that satisfied the commit policy.
    pub hits: u32,
    pub committed: bool,
    /// Marked as already known; excluded from completion and carry.
    pub skipped: bool,
}

impl GroupMember {
    pub fn is_pending(&self) -> bool {
        !self.committed && !self.skipped
    }
}

/// In-memory view of one group cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupState {
    pub group_id: GroupId,
    pub user_id: String,
    pub section_id: String,
    /// Size asked for by the caller.
    pub requested_size: u32,
    /// Committed words needed to close the group.
    pub completion_target: u32,
    pub status: GroupStatus,
    pub opened_on: NaiveDate,
    pub closed_on: Option<NaiveDate>,
    pub members: Vec<GroupMember>,
}

impl GroupState {
    /// Builds a fresh group from selector output.
    ///
    /// An empty candidate list yields a group that is already completed.
    pub fn open(
        user_id: impl Into<String>,
        section_id: impl Into<String>,
        requested_size: u32,
        candidates: &[Candidate],
        opened_on: NaiveDate,
    ) -> Self {
        let members: Vec<GroupMember> = candidates
            .iter()
            .enumerate()
            .map(|(position, candidate)| GroupMember {
                word_id: candidate.word_id.clone(),
                role: candidate.role,
                kind: candidate.kind,
                position: position as u32,
                exposures: candidate.prior_exposures,
                hits: candidate.prior_hits,
                committed: false,
                skipped: false,
            })
            .collect();
        let completion_target = requested_size.min(members.len() as u32);
        let (status, closed_on) = if members.is_empty() {
            (GroupStatus::Completed, Some(opened_on))
        } else {
            (GroupStatus::Open, None)
        };

        Self {
            group_id: Uuid::new_v4(),
            user_id: user_id.into(),
            section_id: section_id.into(),
            requested_size,
            completion_target,
            status,
            opened_on,
            closed_on,
            members,
        }
    }

    pub fn member(&self, word_id: &str) -> Option<&GroupMember> {
        self.members.iter().find(|member| member.word_id == word_id)
    }

    pub fn member_mut(&mut self, word_id: &str) -> Option<&mut GroupMember> {
        self.members
            .iter_mut()
            .find(|member| member.word_id == word_id)
    }

    pub fn committed_count(&self) -> u32 {
        self.members.iter().filter(|member| member.committed).count() as u32
    }

    pub fn pending_count(&self) -> u32 {
        self.members.iter().filter(|member| member.is_pending()).count() as u32
    }

    pub fn is_complete(&self) -> bool {
        self.committed_count() >= self.completion_target
    }

    /// Pending members as carry entries, in presentation order.
    pub fn leftovers(&self, carried_on: NaiveDate) -> Vec<CarryEntry> {
        let mut pending: Vec<&GroupMember> =
            self.members.iter().filter(|member| member.is_pending()).collect();
        pending.sort_by_key(|member| member.position);
        pending
            .into_iter()
            .enumerate()
            .map(|(position, member)| CarryEntry {
                word_id: member.word_id.clone(),
                kind: member.kind,
                exposures: member.exposures,
                hits: member.hits,
                position: position as u32,
                carried_on,
            })
            .collect()
    }
}

/// Word drawn into a group but not committed when the group closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarryEntry {
    pub word_id: String,
    pub kind: DailyKind,
    pub exposures: u32,
    pub hits: u32,
    /// Retry order for the next draw.
    pub position: u32,
    /// Last time this entry was written; drives expiry.
    pub carried_on: NaiveDate,
}

impl CarryEntry {
    /// Returns whether this entry is older than `expiry_days` on `today`.
    pub fn is_expired(&self, today: NaiveDate, expiry_days: u32) -> bool {
        match self
            .carried_on
            .checked_add_days(Days::new(u64::from(expiry_days)))
        {
            Some(deadline) => deadline < today,
            None => false,
        }
    }

    pub fn to_candidate(&self) -> Candidate {
        Candidate {
            word_id: self.word_id.clone(),
            role: CandidateRole::Carry,
            kind: self.kind,
            prior_exposures: self.exposures,
            prior_hits: self.hits,
        }
    }
}
