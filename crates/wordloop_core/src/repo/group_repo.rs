//! Group cycle persistence.
//!
//! # Responsibility
//! - Store group headers and per-member progress.
//! - Load a full [`GroupState`] by id or as the open group of a section.
//!
//! # Invariants
//! - At most one open group per (learner, section); a unique partial
//!   index rejects a second one.
//! - Members are loaded in presentation order.

use crate::model::group::{CandidateRole, GroupId, GroupMember, GroupState, GroupStatus};
use crate::model::record::DailyKind;
use crate::repo::{
    bool_to_int, date_to_db, parse_bool, parse_count, parse_date, RepoError, RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const GROUP_SELECT_SQL: &str = "SELECT
    group_id,
    user_id,
    section_id,
    requested_size,
    completion_target,
    status,
    opened_on,
    closed_on
FROM group_sessions";

pub trait GroupStore {
    fn get_group(&self, group_id: GroupId) -> RepoResult<Option<GroupState>>;
    fn find_open_group(&self, user_id: &str, section_id: &str) -> RepoResult<Option<GroupState>>;
    /// Inserts header and members.
    fn insert_group(&self, state: &GroupState) -> RepoResult<()>;
    /// Writes header fields that change over a cycle.
    fn update_group(&self, state: &GroupState) -> RepoResult<()>;
    fn save_member(&self, group_id: GroupId, member: &GroupMember) -> RepoResult<()>;
}

pub struct SqliteGroupStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGroupStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn load_group(&self, header: Option<GroupState>) -> RepoResult<Option<GroupState>> {
        let Some(mut state) = header else {
            return Ok(None);
        };
        state.members = self.load_members(state.group_id)?;
        Ok(Some(state))
    }

    fn load_members(&self, group_id: GroupId) -> RepoResult<Vec<GroupMember>> {
        let mut stmt = self.conn.prepare(
            "SELECT word_id, role, kind, position, exposures, hits, committed, skipped
             FROM group_members
             WHERE group_id = ?1
             ORDER BY position ASC;",
        )?;
        let mut rows = stmt.query([group_id.to_string()])?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            members.push(parse_member_row(row)?);
        }
        Ok(members)
    }

    fn query_header(&self, sql: &str, params: impl rusqlite::Params) -> RepoResult<Option<GroupState>> {
        let raw = self
            .conn
            .query_row(sql, params, |row| {
                Ok(RawGroup {
                    group_id: row.get("group_id")?,
                    user_id: row.get("user_id")?,
                    section_id: row.get("section_id")?,
                    requested_size: row.get("requested_size")?,
                    completion_target: row.get("completion_target")?,
                    status: row.get("status")?,
                    opened_on: row.get("opened_on")?,
                    closed_on: row.get("closed_on")?,
                })
            })
            .optional()?;
        raw.map(RawGroup::into_state).transpose()
    }
}

impl GroupStore for SqliteGroupStore<'_> {
    fn get_group(&self, group_id: GroupId) -> RepoResult<Option<GroupState>> {
        let header = self.query_header(
            &format!("{GROUP_SELECT_SQL} WHERE group_id = ?1;"),
            [group_id.to_string()],
        )?;
        self.load_group(header)
    }

    fn find_open_group(&self, user_id: &str, section_id: &str) -> RepoResult<Option<GroupState>> {
        let header = self.query_header(
            &format!(
                "{GROUP_SELECT_SQL}
                 WHERE user_id = ?1 AND section_id = ?2 AND status = 'open';"
            ),
            params![user_id, section_id],
        )?;
        self.load_group(header)
    }

    fn insert_group(&self, state: &GroupState) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO group_sessions (
                group_id,
                user_id,
                section_id,
                requested_size,
                completion_target,
                status,
                opened_on,
                closed_on
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                state.group_id.to_string(),
                state.user_id,
                state.section_id,
                i64::from(state.requested_size),
                i64::from(state.completion_target),
                state.status.as_str(),
                date_to_db(state.opened_on),
                state.closed_on.map(date_to_db),
            ],
        )?;

        let mut stmt = self.conn.prepare(
            "INSERT INTO group_members (
                group_id, word_id, role, kind, position, exposures, hits, committed, skipped
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
        )?;
        for member in &state.members {
            stmt.execute(params![
                state.group_id.to_string(),
                member.word_id,
                member.role.as_str(),
                member.kind.as_str(),
                i64::from(member.position),
                i64::from(member.exposures),
                i64::from(member.hits),
                bool_to_int(member.committed),
                bool_to_int(member.skipped),
            ])?;
        }
        Ok(())
    }

    fn update_group(&self, state: &GroupState) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE group_sessions
             SET completion_target = ?2, status = ?3, closed_on = ?4
             WHERE group_id = ?1;",
            params![
                state.group_id.to_string(),
                i64::from(state.completion_target),
                state.status.as_str(),
                state.closed_on.map(date_to_db),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("group", state.group_id.to_string()));
        }
        Ok(())
    }

    fn save_member(&self, group_id: GroupId, member: &GroupMember) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE group_members
             SET exposures = ?3, hits = ?4, committed = ?5, skipped = ?6
             WHERE group_id = ?1 AND word_id = ?2;",
            params![
                group_id.to_string(),
                member.word_id,
                i64::from(member.exposures),
                i64::from(member.hits),
                bool_to_int(member.committed),
                bool_to_int(member.skipped),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(
                "group member",
                format!("{group_id}/{}", member.word_id),
            ));
        }
        Ok(())
    }
}

struct RawGroup {
    group_id: String,
    user_id: String,
    section_id: String,
    requested_size: i64,
    completion_target: i64,
    status: String,
    opened_on: String,
    closed_on: Option<String>,
}

impl RawGroup {
    fn into_state(self) -> RepoResult<GroupState> {
        let group_id = Uuid::parse_str(&self.group_id).map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid uuid `{}` in group_sessions.group_id",
                self.group_id
            ))
        })?;
        let status = GroupStatus::parse(&self.status).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid status `{}` in group_sessions.status",
                self.status
            ))
        })?;
        let closed_on = match self.closed_on {
            Some(value) => Some(parse_date(&value, "group_sessions.closed_on")?),
            None => None,
        };

        Ok(GroupState {
            group_id,
            user_id: self.user_id,
            section_id: self.section_id,
            requested_size: parse_count(self.requested_size, "group_sessions.requested_size")?,
            completion_target: parse_count(
                self.completion_target,
                "group_sessions.completion_target",
            )?,
            status,
            opened_on: parse_date(&self.opened_on, "group_sessions.opened_on")?,
            closed_on,
            members: Vec::new(),
        })
    }
}

fn parse_member_row(row: &Row<'_>) -> RepoResult<GroupMember> {
    let role: String = row.get("role")?;
    let kind: String = row.get("kind")?;
    Ok(GroupMember {
        word_id: row.get("word_id")?,
        role: CandidateRole::parse(&role).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid role `{role}` in group_members.role"))
        })?,
        kind: DailyKind::parse(&kind).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid kind `{kind}` in group_members.kind"))
        })?,
        position: parse_count(row.get("position")?, "group_members.position")?,
        exposures: parse_count(row.get("exposures")?, "group_members.exposures")?,
        hits: parse_count(row.get("hits")?, "group_members.hits")?,
        committed: parse_bool(row.get("committed")?, "group_members.committed")?,
        skipped: parse_bool(row.get("skipped")?, "group_members.skipped")?,
    })
}
